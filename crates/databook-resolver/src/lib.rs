//! Cross-reference read paths over the relational and columnar stores.
//!
//! The resolver owns no data. Every call reads both stores and returns a
//! request-scoped merged view; a columnar failure degrades the view to
//! relational-only data and is reported through [`SourceStatus`].

use std::fmt;
use std::time::Duration;

use databook_core::partition::FALLBACK_WINDOW_YEARS;
use serde::Serialize;

pub mod links;
mod resolver;

pub use links::{
    base_epin, contract_keys_overlap, merge_contracts, notice_link_report, synthesize_contract,
    MergedContract, NoticeLinkReport,
};
pub use resolver::{
    ContractSpending, ContractView, PayeeMatch, Resolver, SolicitationLink, SolicitationView,
    VendorProfile, VendorTransactions, YearTotal,
};

pub const CRATE_NAME: &str = "databook-resolver";

/// Most transactions returned by any one read path.
pub const TRANSACTION_CAP: usize = 500;

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Upper bound on any one columnar query.
    pub columnar_timeout: Duration,
    /// Newest fiscal year known to hold data; discovered from the store when unset.
    pub max_data_fy: Option<i32>,
    /// Partitions scanned for vendor transaction history.
    pub history_years: i32,
    pub transaction_cap: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            columnar_timeout: Duration::from_secs(20),
            max_data_fy: None,
            history_years: FALLBACK_WINDOW_YEARS,
            transaction_cap: TRANSACTION_CAP,
        }
    }
}

/// Whether the columnar side contributed to a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceStatus {
    Available,
    Unavailable { reason: String },
}

impl SourceStatus {
    pub fn is_available(&self) -> bool {
        matches!(self, SourceStatus::Available)
    }
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceStatus::Available => f.write_str("available"),
            SourceStatus::Unavailable { reason } => write!(f, "unavailable: {reason}"),
        }
    }
}

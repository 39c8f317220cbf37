//! Core record types and provenance markers for the procurement databook.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod canonical;
pub mod partition;

pub use canonical::{
    canonicalize_id, canonicalize_money, fiscal_year, fiscal_year_of, parse_date, sortable_date,
    wildcard_stem,
};
pub use partition::{current_fiscal_year, partition_dir_name, PartitionWindow};

pub const CRATE_NAME: &str = "databook-core";

/// Registered supplier. Immutable after load apart from match annotations
/// written onto registrants that point back at it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vendor {
    pub passport_supplier_id: String,
    pub name: Option<String>,
    pub canonical_name: Option<String>,
    pub fms_vendor_code: Option<String>,
    pub duns_number: Option<String>,
    pub certification_type: Option<String>,
    pub ethnicity: Option<String>,
    pub business_category: Option<String>,
    pub corporate_structure: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agency {
    pub id: String,
    pub name: String,
}

/// Registered contract. `vendor_name` is free text; linkage to [`Vendor`] is
/// by name equality only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub ctr_id: String,
    pub contract_id: Option<String>,
    pub canonical_contract_id: Option<String>,
    pub epin: Option<String>,
    pub canonical_epin: Option<String>,
    pub title: Option<String>,
    pub agency: Option<String>,
    pub agency_id: Option<String>,
    pub vendor_name: Option<String>,
    pub program: Option<String>,
    pub procurement_method: Option<String>,
    pub contract_type: Option<String>,
    pub status: Option<String>,
    pub award_amount: f64,
    pub current_amount: f64,
    /// `MM/DD/YYYY` as published; synthetic contracts carry ISO dates.
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub industry: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solicitation {
    pub epin: String,
    pub canonical_epin: Option<String>,
    pub rfp_id: Option<String>,
    pub program: Option<String>,
    pub industry: Option<String>,
    pub procurement_name: Option<String>,
    pub agency: Option<String>,
    pub agency_id: Option<String>,
    pub rfx_status: Option<String>,
    pub release_date: Option<String>,
    pub due_date: Option<String>,
    pub main_commodity: Option<String>,
    pub procurement_method: Option<String>,
}

/// Doing-business registrant. `match_score` is 0.0 until the entity matcher
/// links it to a vendor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registrant {
    pub organization_name: String,
    pub canonical_name: Option<String>,
    pub ownership_structure_code: Option<String>,
    pub organization_phone: Option<String>,
    pub start_date: Option<String>,
    pub matched_vendor_id: Option<String>,
    pub match_score: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrantPerson {
    pub person_id: String,
    pub organization_name: Option<String>,
    pub canonical_org_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub relationship_code: Option<String>,
}

// PASSPort vendor reports. None of them carries a supplier id; each row
// names its vendor in free text and links by exact name equality.

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorEntitySummary {
    pub vendor_name: String,
    pub address_line_1: Option<String>,
    pub address_line_2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
    pub telephone: Option<String>,
    pub stock_symbol: Option<String>,
    pub for_profit: Option<String>,
    pub duns_number: Option<String>,
    pub gross_revenue: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorOtherName {
    pub vendor_name: String,
    pub name_type: Option<String>,
    pub other_name: Option<String>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorEvaluation {
    pub vendor_name: String,
    pub agency: Option<String>,
    pub contract_id: Option<String>,
    pub purpose: Option<String>,
    pub evaluation_date: Option<String>,
    pub period_start: Option<String>,
    pub period_end: Option<String>,
    pub overall_rating: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorPrincipal {
    pub vendor_name: String,
    pub principal_name: Option<String>,
    pub title: Option<String>,
    pub ownership_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorRelatedEntity {
    pub vendor_name: String,
    pub related_name: Option<String>,
    pub address_line_1: Option<String>,
    pub address_line_2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
    pub telephone: Option<String>,
    pub relationship: Option<String>,
}

/// Public-notice (City Record) entry. Only rows with a valid PIN are stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicNotice {
    pub request_id: String,
    pub pin: String,
    pub canonical_pin: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub agency_name: Option<String>,
    pub agency_id: Option<String>,
    pub type_of_notice: Option<String>,
    pub category: Option<String>,
    pub short_title: Option<String>,
    pub selection_method: Option<String>,
    pub section_name: Option<String>,
    pub due_date: Option<String>,
    pub contract_amount: Option<String>,
    pub vendor_name: Option<String>,
}

/// Column order shared by the feed parser, raw batch files and parquet partitions.
pub const TRANSACTION_COLUMNS: [&str; 13] = [
    "agency",
    "payee_name",
    "check_amount",
    "fiscal_year",
    "issue_date",
    "industry",
    "spending_category",
    "contract_id",
    "department",
    "expense_category",
    "budget_code",
    "sub_vendor",
    "associated_prime_vendor",
];

/// Spending transaction as held by the columnar store. Every field is kept
/// as published text; numeric reads go through [`Transaction::amount`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Transaction {
    pub agency: Option<String>,
    pub payee_name: Option<String>,
    pub check_amount: Option<String>,
    pub fiscal_year: Option<String>,
    pub issue_date: Option<String>,
    pub industry: Option<String>,
    pub spending_category: Option<String>,
    pub contract_id: Option<String>,
    pub department: Option<String>,
    pub expense_category: Option<String>,
    pub budget_code: Option<String>,
    pub sub_vendor: Option<String>,
    pub associated_prime_vendor: Option<String>,
}

impl Transaction {
    /// Safe numeric cast of `check_amount`; `None` when the text is not a number.
    pub fn amount(&self) -> Option<f64> {
        self.check_amount
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|v| v.is_finite())
    }

    pub fn canonical_contract_id(&self) -> Option<String> {
        canonicalize_id(self.contract_id.as_deref())
    }

    /// Partition this row belongs to: its own `fiscal_year` field, else the
    /// fiscal year of `issue_date`.
    pub fn partition_year(&self) -> Option<i32> {
        self.fiscal_year
            .as_deref()
            .and_then(|s| s.trim().parse::<i32>().ok())
            .or_else(|| self.issue_date.as_deref().and_then(fiscal_year_of))
    }

    pub fn field(&self, column: &str) -> Option<&str> {
        match column {
            "agency" => self.agency.as_deref(),
            "payee_name" => self.payee_name.as_deref(),
            "check_amount" => self.check_amount.as_deref(),
            "fiscal_year" => self.fiscal_year.as_deref(),
            "issue_date" => self.issue_date.as_deref(),
            "industry" => self.industry.as_deref(),
            "spending_category" => self.spending_category.as_deref(),
            "contract_id" => self.contract_id.as_deref(),
            "department" => self.department.as_deref(),
            "expense_category" => self.expense_category.as_deref(),
            "budget_code" => self.budget_code.as_deref(),
            "sub_vendor" => self.sub_vendor.as_deref(),
            "associated_prime_vendor" => self.associated_prime_vendor.as_deref(),
            _ => None,
        }
    }

    pub fn set_field(&mut self, column: &str, value: Option<String>) {
        let slot = match column {
            "agency" => &mut self.agency,
            "payee_name" => &mut self.payee_name,
            "check_amount" => &mut self.check_amount,
            "fiscal_year" => &mut self.fiscal_year,
            "issue_date" => &mut self.issue_date,
            "industry" => &mut self.industry,
            "spending_category" => &mut self.spending_category,
            "contract_id" => &mut self.contract_id,
            "department" => &mut self.department,
            "expense_category" => &mut self.expense_category,
            "budget_code" => &mut self.budget_code,
            "sub_vendor" => &mut self.sub_vendor,
            "associated_prime_vendor" => &mut self.associated_prime_vendor,
            _ => return,
        };
        *slot = value;
    }
}

/// Which source system(s) contributed a merged record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Relational contract register only.
    FirstSourceOnly,
    /// Transaction ledger only; the record is synthesized.
    SecondSourceOnly,
    BothSources,
}

impl Provenance {
    pub fn label(self) -> &'static str {
        match self {
            Provenance::FirstSourceOnly => "MOCS",
            Provenance::SecondSourceOnly => "Checkbook",
            Provenance::BothSources => "MOCS & Checkbook",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Persisted per-fiscal-year high-water mark of the transaction feed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IngestionWatermark {
    pub last_record_downloaded: u64,
    pub total_records: u64,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub chunks_completed: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_amount_is_a_safe_cast() {
        let mut tx = Transaction {
            check_amount: Some(" -1250.50 ".into()),
            ..Default::default()
        };
        assert_eq!(tx.amount(), Some(-1250.5));
        tx.check_amount = Some("n/a".into());
        assert_eq!(tx.amount(), None);
        tx.check_amount = None;
        assert_eq!(tx.amount(), None);
    }

    #[test]
    fn partition_year_prefers_explicit_field() {
        let tx = Transaction {
            fiscal_year: Some("2023".into()),
            issue_date: Some("2024-08-01".into()),
            ..Default::default()
        };
        assert_eq!(tx.partition_year(), Some(2023));

        let tx = Transaction {
            issue_date: Some("2024-08-01".into()),
            ..Default::default()
        };
        assert_eq!(tx.partition_year(), Some(2025));
    }

    #[test]
    fn field_accessors_cover_every_column() {
        let mut tx = Transaction::default();
        for column in TRANSACTION_COLUMNS {
            tx.set_field(column, Some(column.to_string()));
        }
        for column in TRANSACTION_COLUMNS {
            assert_eq!(tx.field(column), Some(column));
        }
    }

    #[test]
    fn watermark_reads_with_missing_optional_fields() {
        let parsed: IngestionWatermark =
            serde_json::from_str(r#"{"last_record_downloaded": 10, "total_records": 12}"#)
                .expect("parse");
        assert_eq!(parsed.last_record_downloaded, 10);
        assert!(parsed.chunks_completed.is_empty());
        assert!(parsed.last_updated.is_none());
    }

    #[test]
    fn provenance_labels() {
        assert_eq!(Provenance::BothSources.to_string(), "MOCS & Checkbook");
        assert_eq!(
            serde_json::to_string(&Provenance::SecondSourceOnly).expect("json"),
            "\"second_source_only\""
        );
    }
}

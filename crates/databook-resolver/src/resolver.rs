use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use databook_core::partition::FALLBACK_WINDOW_YEARS;
use databook_core::{
    canonicalize_id, current_fiscal_year, fiscal_year_of, sortable_date, wildcard_stem, Contract,
    PartitionWindow, Provenance, PublicNotice, Registrant, RegistrantPerson, Solicitation,
    Transaction, Vendor,
};
use databook_storage::{
    ColumnarError, RelationalStore, TransactionFilter, TransactionStore, VendorEnrichment,
};
use serde::Serialize;
use tracing::{debug, info_span, warn, Instrument};

use crate::links::{base_epin, merge_contracts, notice_link_report, synthesize_contract, MergedContract, NoticeLinkReport};
use crate::{ResolverConfig, SourceStatus};

/// Outcome of contract → solicitation resolution. Absence is a normal result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "link", rename_all = "snake_case")]
pub enum SolicitationLink {
    Exact { solicitation: Solicitation },
    /// Matched on the first ten characters of the contract's canonical EPIN.
    BasePrefix { key: String, solicitation: Solicitation },
    Absent,
}

impl SolicitationLink {
    pub fn solicitation(&self) -> Option<&Solicitation> {
        match self {
            SolicitationLink::Exact { solicitation }
            | SolicitationLink::BasePrefix { solicitation, .. } => Some(solicitation),
            SolicitationLink::Absent => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearTotal {
    pub fiscal_year: i32,
    pub total: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractSpending {
    /// Partitions scanned; `None` when the contract has no usable id.
    pub window: Option<PartitionWindow>,
    /// Newest fiscal year first.
    pub by_year: Vec<YearTotal>,
    pub total: f64,
    pub count: usize,
    /// Rows in the window whose contract key overlaps this contract's key,
    /// exact matches included. Decides the contract's provenance.
    pub linked: usize,
    /// Newest first, capped.
    pub transactions: Vec<Transaction>,
    pub columnar: SourceStatus,
}

impl ContractSpending {
    fn empty(window: Option<PartitionWindow>, columnar: SourceStatus) -> Self {
        Self {
            window,
            by_year: Vec::new(),
            total: 0.0,
            count: 0,
            linked: 0,
            transactions: Vec::new(),
            columnar,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractView {
    /// `None` when neither store knows the contract.
    pub contract: Option<Contract>,
    pub provenance: Option<Provenance>,
    pub solicitation: SolicitationLink,
    /// Contracts sharing the linked solicitation's EPIN prefix.
    pub related_contracts: i64,
    pub notices: Vec<PublicNotice>,
    pub vendor: Option<Vendor>,
    pub spending: ContractSpending,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolicitationView {
    pub solicitation: Solicitation,
    pub contracts: Vec<Contract>,
    pub notices: Vec<PublicNotice>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "tier", rename_all = "snake_case")]
pub enum PayeeMatch {
    Exact,
    /// Case-insensitive contains on the suffix-stripped vendor name.
    Wildcard { stem: String },
    NoMatch,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VendorTransactions {
    pub payee_match: PayeeMatch,
    /// Rows matched before the cap.
    pub total_matched: usize,
    pub transactions: Vec<Transaction>,
    pub columnar: SourceStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VendorProfile {
    pub vendor: Vendor,
    pub registrant: Option<Registrant>,
    pub people: Vec<RegistrantPerson>,
    /// PASSPort report rows filed under the vendor's exact name.
    pub enrichment: VendorEnrichment,
    pub contracts: Vec<MergedContract>,
    pub award_total: f64,
    pub award_count: usize,
    /// From transactions when any were found, else from contract start years.
    pub yearly_totals: Vec<YearTotal>,
    pub payee_match: PayeeMatch,
    pub columnar: SourceStatus,
}

pub struct Resolver {
    store: RelationalStore,
    transactions: Arc<dyn TransactionStore>,
    config: ResolverConfig,
    today: Option<NaiveDate>,
}

impl Resolver {
    pub fn new(
        store: RelationalStore,
        transactions: Arc<dyn TransactionStore>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            store,
            transactions,
            config,
            today: None,
        }
    }

    /// Pin "today" for fiscal-year arithmetic.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn store(&self) -> &RelationalStore {
        &self.store
    }

    pub async fn close(self) {
        self.store.close().await;
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }

    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, ColumnarError>>,
    ) -> Result<T, String> {
        match tokio::time::timeout(self.config.columnar_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(err.to_string()),
            Err(_) => Err(format!(
                "columnar query exceeded {}ms",
                self.config.columnar_timeout.as_millis()
            )),
        }
    }

    async fn scan(
        &self,
        window: PartitionWindow,
        filter: TransactionFilter,
    ) -> (Vec<Transaction>, SourceStatus) {
        if window.is_empty() {
            return (Vec::new(), SourceStatus::Available);
        }
        match self.bounded(self.transactions.scan(window, &filter)).await {
            Ok(rows) => (rows, SourceStatus::Available),
            Err(reason) => {
                warn!(%reason, first = window.first, last = window.last, "columnar source unavailable; relational data only");
                (Vec::new(), SourceStatus::Unavailable { reason })
            }
        }
    }

    /// Configured newest data year, else the store's, else the current fiscal year.
    pub async fn newest_with_data(&self) -> i32 {
        if let Some(fy) = self.config.max_data_fy {
            return fy;
        }
        let current = current_fiscal_year(self.today());
        match self.bounded(self.transactions.newest_fiscal_year()).await {
            Ok(Some(fy)) => fy,
            Ok(None) => current,
            Err(reason) => {
                warn!(%reason, "newest partition unknown; using current fiscal year");
                current
            }
        }
    }

    /// Exact canonical EPIN, then at most one retry on the base EPIN.
    pub async fn resolve_solicitation(&self, contract: &Contract) -> Result<SolicitationLink> {
        let Some(key) = contract.canonical_epin.as_deref() else {
            return Ok(SolicitationLink::Absent);
        };
        if let Some(solicitation) = self.store.solicitation_by_canonical_epin(key).await? {
            return Ok(SolicitationLink::Exact { solicitation });
        }
        if let Some(base) = base_epin(key) {
            if let Some(solicitation) = self.store.solicitation_by_canonical_epin(base).await? {
                return Ok(SolicitationLink::BasePrefix {
                    key: base.to_string(),
                    solicitation,
                });
            }
        }
        Ok(SolicitationLink::Absent)
    }

    /// Every contract whose canonical EPIN starts with the solicitation's.
    pub async fn contracts_for_solicitation(&self, solicitation: &Solicitation) -> Result<Vec<Contract>> {
        match solicitation.canonical_epin.as_deref() {
            Some(key) => self.store.contracts_with_epin_prefix(key).await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn solicitation_view(&self, epin: &str) -> Result<Option<SolicitationView>> {
        self.solicitation_view_inner(epin)
            .instrument(info_span!("resolve", op = "solicitation", epin))
            .await
    }

    async fn solicitation_view_inner(&self, epin: &str) -> Result<Option<SolicitationView>> {
        let solicitation = match self.store.solicitation_by_epin(epin).await? {
            Some(s) => Some(s),
            None => match canonicalize_id(Some(epin)) {
                Some(key) => self.store.solicitation_by_canonical_epin(&key).await?,
                None => None,
            },
        };
        let Some(solicitation) = solicitation else {
            return Ok(None);
        };
        let contracts = self.contracts_for_solicitation(&solicitation).await?;
        let notices = match solicitation.canonical_epin.as_deref() {
            Some(key) => self.store.notices_by_canonical_pin(key).await?,
            None => Vec::new(),
        };
        debug!(contracts = contracts.len(), notices = notices.len(), "solicitation resolved");
        Ok(Some(SolicitationView {
            solicitation,
            contracts,
            notices,
        }))
    }

    /// Spending against one contract, scanned only inside its partition window.
    /// Totals use exact-key rows; `linked` also counts rows whose key merely
    /// overlaps, the same rule the vendor profile merge applies.
    pub async fn contract_spending(&self, contract: &Contract) -> ContractSpending {
        let Some(key) = contract.canonical_contract_id.clone() else {
            return ContractSpending::empty(None, SourceStatus::Available);
        };
        let newest = self.newest_with_data().await;
        let window = PartitionWindow::for_contract(
            contract.start_date.as_deref(),
            contract.end_date.as_deref(),
            self.today(),
            newest,
        );
        let (rows, status) = self
            .scan(window, TransactionFilter::ContractKeyOverlap(key.clone()))
            .await;
        let linked = rows.len();
        let exact = rows
            .into_iter()
            .filter(|tx| tx.canonical_contract_id().as_deref() == Some(key.as_str()))
            .collect();
        ContractSpending {
            linked,
            ..summarize_spending(Some(window), exact, status, self.config.transaction_cap)
        }
    }

    /// Contract by CTR-ID, with its links. A contract missing from the
    /// relational store is synthesized from recent transactions when possible.
    pub async fn contract_view(&self, ctr_id: &str) -> Result<ContractView> {
        self.contract_view_inner(ctr_id)
            .instrument(info_span!("resolve", op = "contract", ctr_id))
            .await
    }

    async fn contract_view_inner(&self, ctr_id: &str) -> Result<ContractView> {
        match self.store.contract_by_ctr_id(ctr_id).await? {
            Some(contract) => self.relational_contract_view(contract).await,
            None => Ok(self.synthetic_contract_view(ctr_id).await),
        }
    }

    async fn relational_contract_view(&self, contract: Contract) -> Result<ContractView> {
        let solicitation = self.resolve_solicitation(&contract).await?;
        let related_contracts = match solicitation
            .solicitation()
            .and_then(|s| s.canonical_epin.as_deref())
        {
            Some(key) => self.store.count_contracts_with_epin_prefix(key).await?,
            None => 0,
        };
        let notices = match contract.canonical_epin.as_deref() {
            Some(key) => self.store.notices_by_canonical_pin(key).await?,
            None => Vec::new(),
        };
        let vendor = match contract.vendor_name.as_deref() {
            Some(name) => self.store.vendor_by_name(name).await?,
            None => None,
        };
        let spending = self.contract_spending(&contract).await;
        let provenance = if spending.linked > 0 {
            Provenance::BothSources
        } else {
            Provenance::FirstSourceOnly
        };
        Ok(ContractView {
            contract: Some(contract),
            provenance: Some(provenance),
            solicitation,
            related_contracts,
            notices,
            vendor,
            spending,
        })
    }

    async fn synthetic_contract_view(&self, contract_id: &str) -> ContractView {
        let not_found = |spending| ContractView {
            contract: None,
            provenance: None,
            solicitation: SolicitationLink::Absent,
            related_contracts: 0,
            notices: Vec::new(),
            vendor: None,
            spending,
        };
        let Some(key) = canonicalize_id(Some(contract_id)) else {
            return not_found(ContractSpending::empty(None, SourceStatus::Available));
        };
        let newest = self.newest_with_data().await;
        let window = PartitionWindow::most_recent(newest, self.today(), FALLBACK_WINDOW_YEARS);
        let (rows, status) = self
            .scan(window, TransactionFilter::ContractKey(key.clone()))
            .await;
        if rows.is_empty() {
            return not_found(ContractSpending::empty(Some(window), status));
        }
        let contract = synthesize_contract(&key, &rows.iter().collect::<Vec<_>>());
        ContractView {
            contract: Some(contract),
            provenance: Some(Provenance::SecondSourceOnly),
            solicitation: SolicitationLink::Absent,
            related_contracts: 0,
            notices: Vec::new(),
            vendor: None,
            spending: summarize_spending(Some(window), rows, status, self.config.transaction_cap),
        }
    }

    /// Payee-name match over the history window: exact first, then one
    /// wildcard tier on the suffix-stripped name.
    async fn payee_rows(&self, vendor_name: &str) -> (PayeeMatch, Vec<Transaction>, SourceStatus) {
        let newest = self.newest_with_data().await;
        let window = PartitionWindow::most_recent(newest, self.today(), self.config.history_years);
        let (rows, status) = self
            .scan(window, TransactionFilter::PayeeExact(vendor_name.to_string()))
            .await;
        if !status.is_available() {
            return (PayeeMatch::NoMatch, rows, status);
        }
        if !rows.is_empty() {
            return (PayeeMatch::Exact, rows, status);
        }
        let stem = wildcard_stem(vendor_name);
        if stem.is_empty() {
            return (PayeeMatch::NoMatch, rows, status);
        }
        let (rows, status) = self
            .scan(window, TransactionFilter::PayeeContains(stem.clone()))
            .await;
        if rows.is_empty() {
            (PayeeMatch::NoMatch, rows, status)
        } else {
            (PayeeMatch::Wildcard { stem }, rows, status)
        }
    }

    pub async fn vendor_transactions(&self, vendor_name: &str) -> VendorTransactions {
        let (payee_match, mut rows, columnar) = self
            .payee_rows(vendor_name)
            .instrument(info_span!("resolve", op = "vendor_transactions", vendor_name))
            .await;
        let total_matched = rows.len();
        newest_first(&mut rows);
        rows.truncate(self.config.transaction_cap);
        VendorTransactions {
            payee_match,
            total_matched,
            transactions: rows,
            columnar,
        }
    }

    pub async fn vendor_profile(&self, supplier_id: &str) -> Result<Option<VendorProfile>> {
        self.vendor_profile_inner(supplier_id)
            .instrument(info_span!("resolve", op = "vendor_profile", supplier_id))
            .await
    }

    async fn vendor_profile_inner(&self, supplier_id: &str) -> Result<Option<VendorProfile>> {
        let Some(vendor) = self.store.vendor_by_supplier_id(supplier_id).await? else {
            return Ok(None);
        };
        let registrant = self.store.registrant_for_vendor(supplier_id).await?;
        let people_key = registrant
            .as_ref()
            .and_then(|r| r.canonical_name.clone())
            .or_else(|| vendor.canonical_name.clone());
        let people = match people_key {
            Some(key) => self.store.people_by_canonical_org(&key).await?,
            None => Vec::new(),
        };

        let enrichment = match vendor.name.as_deref() {
            Some(name) => self.store.vendor_enrichment(name).await?,
            None => VendorEnrichment::default(),
        };

        let relational = match vendor.name.as_deref() {
            Some(name) => self.store.contracts_by_vendor_name(name).await?,
            None => Vec::new(),
        };
        let award_total = relational.iter().map(|c| c.award_amount).sum::<f64>();
        let award_count = relational.len();

        let (payee_match, rows, columnar) = match vendor.name.as_deref() {
            Some(name) => self.payee_rows(name).await,
            None => (PayeeMatch::NoMatch, Vec::new(), SourceStatus::Available),
        };
        let yearly_totals = if rows.is_empty() {
            yearly_totals(relational.iter().map(|c| {
                (
                    c.start_date.as_deref().and_then(fiscal_year_of),
                    c.award_amount,
                )
            }))
        } else {
            yearly_totals(rows.iter().map(|tx| (tx.partition_year(), tx.amount().unwrap_or(0.0))))
        };
        let contracts = merge_contracts(relational, &rows);

        Ok(Some(VendorProfile {
            vendor,
            registrant,
            people,
            enrichment,
            contracts,
            award_total,
            award_count,
            yearly_totals,
            payee_match,
            columnar,
        }))
    }

    pub async fn notice_report(&self, sample_limit: usize) -> Result<NoticeLinkReport> {
        let keys = self
            .store
            .notice_keys()
            .instrument(info_span!("resolve", op = "notice_report"))
            .await?;
        Ok(notice_link_report(&keys, sample_limit))
    }
}

fn summarize_spending(
    window: Option<PartitionWindow>,
    mut rows: Vec<Transaction>,
    columnar: SourceStatus,
    cap: usize,
) -> ContractSpending {
    let by_year = yearly_totals(
        rows.iter()
            .map(|tx| (tx.partition_year(), tx.amount().unwrap_or(0.0))),
    );
    let total = rows.iter().filter_map(Transaction::amount).sum::<f64>();
    let count = rows.len();
    newest_first(&mut rows);
    rows.truncate(cap);
    ContractSpending {
        window,
        by_year,
        total,
        count,
        linked: count,
        transactions: rows,
        columnar,
    }
}

/// Per-year totals, newest year first. Items without a year are left out.
fn yearly_totals(items: impl Iterator<Item = (Option<i32>, f64)>) -> Vec<YearTotal> {
    let mut years: BTreeMap<i32, (f64, usize)> = BTreeMap::new();
    for (year, amount) in items {
        if let Some(year) = year {
            let slot = years.entry(year).or_default();
            slot.0 += amount;
            slot.1 += 1;
        }
    }
    years
        .into_iter()
        .rev()
        .map(|(fiscal_year, (total, count))| YearTotal {
            fiscal_year,
            total,
            count,
        })
        .collect()
}

fn newest_first(rows: &mut [Transaction]) {
    rows.sort_by_cached_key(|tx| std::cmp::Reverse(sortable_date(tx.issue_date.as_deref())));
}

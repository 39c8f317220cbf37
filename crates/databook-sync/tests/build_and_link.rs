use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use databook_adapters::{FeedError, FeedPage, TransactionFeed};
use databook_core::{Provenance, Transaction};
use databook_resolver::{PayeeMatch, Resolver, ResolverConfig, SolicitationLink};
use databook_storage::{
    ArtifactStore, ParquetTransactionStore, PartitionWriter, RelationalStore, Table,
    TransactionStore, WatermarkStore,
};
use databook_sync::{build_databook, DatabookConfig, MergeOutcome, TransactionMerger};
use tempfile::TempDir;

fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures")
}

/// Fixed ledger served in pages, the way the spending API pages by record.
struct LedgerFeed {
    records: Vec<Transaction>,
}

#[async_trait]
impl TransactionFeed for LedgerFeed {
    async fn fetch_page(&self, _fiscal_year: i32, offset: u64, count: u64) -> Result<FeedPage, FeedError> {
        let start = (offset.saturating_sub(1) as usize).min(self.records.len());
        let end = (start + count as usize).min(self.records.len());
        Ok(FeedPage {
            total_records: self.records.len() as u64,
            transactions: self.records[start..end].to_vec(),
        })
    }
}

fn spend(payee: &str, contract: &str, date: &str, amount: &str) -> Transaction {
    Transaction {
        agency: Some("Department of Sanitation".into()),
        payee_name: Some(payee.into()),
        check_amount: Some(amount.into()),
        fiscal_year: Some("2025".into()),
        issue_date: Some(date.into()),
        contract_id: Some(contract.into()),
        ..Default::default()
    }
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 1).expect("date")
}

async fn workspace() -> (TempDir, DatabookConfig) {
    let dir = tempfile::tempdir().expect("tempdir");
    let extracts = fixtures_dir().join("extracts");
    for entry in std::fs::read_dir(&extracts).expect("fixtures") {
        let entry = entry.expect("entry");
        std::fs::copy(entry.path(), dir.path().join(entry.file_name())).expect("copy fixture");
    }
    let root = dir.path().to_path_buf();
    let config = DatabookConfig::from_lookup(|key| match key {
        "DATABOOK_WORKSPACE" => Some(root.display().to_string()),
        "DATABOOK_DB_PATH" => Some(root.join("databook.db").display().to_string()),
        "DATABOOK_DATA_DIR" => Some(root.join("data").display().to_string()),
        _ => None,
    });
    (dir, config)
}

fn merger(config: &DatabookConfig) -> TransactionMerger {
    let feed = LedgerFeed {
        records: vec![
            spend("ACME WIDGETS INC", "CT1-827-20248801234", "2024-09-12", "1200.00"),
            spend("ACME WIDGETS INC", "CT1-827-20248801234", "2025-01-15", "800.00"),
            spend("Acme Widgets of New York", "CT1-999-20250000001", "2025-03-03", "50.00"),
        ],
    };
    TransactionMerger::new(
        Arc::new(feed),
        WatermarkStore::new(config.raw_dir()),
        ArtifactStore::new(config.raw_dir()),
        PartitionWriter::new(config.parquet_dir()),
    )
    .with_page_size(2)
}

async fn resolver(config: &DatabookConfig, columnar: Arc<dyn TransactionStore>) -> Resolver {
    let store = RelationalStore::open(&config.db_path).await.expect("open");
    Resolver::new(store, columnar, ResolverConfig::default()).with_today(today())
}

#[tokio::test]
async fn build_merge_and_resolve_across_both_stores() {
    let (_dir, config) = workspace().await;

    let summary = build_databook(&config).await.expect("build");
    assert_eq!(summary.loads.len(), 11);
    assert_eq!(summary.matched.registrants, 3);
    assert_eq!(summary.matched.matched, 2);

    let outcome = merger(&config).run(2025, today()).await.expect("merge");
    let MergeOutcome::Committed(batch) = outcome else {
        panic!("expected a committed batch, got {outcome:?}");
    };
    assert_eq!((batch.first_record, batch.last_record), (1, 3));
    assert_eq!(batch.partitions, vec![2025]);
    assert!(matches!(
        merger(&config).run(2025, today()).await.expect("rerun"),
        MergeOutcome::UpToDate { local: 3, remote: 3 }
    ));

    let r = resolver(&config, Arc::new(ParquetTransactionStore::local(config.parquet_dir()))).await;
    assert_eq!(r.store().count(Table::PublicNotices).await.expect("count"), 3);
    assert_eq!(r.newest_with_data().await, 2025);

    let view = r.contract_view("CTR-1").await.expect("contract");
    assert!(matches!(&view.solicitation, SolicitationLink::BasePrefix { key, .. } if key == "8272400001"));
    assert_eq!(view.provenance, Some(Provenance::BothSources));
    assert_eq!(view.related_contracts, 1);
    assert_eq!(view.notices.len(), 1);
    assert_eq!(view.vendor.as_ref().map(|v| v.passport_supplier_id.as_str()), Some("S0001"));
    assert_eq!(view.spending.count, 2);
    assert_eq!(view.spending.total, 2000.0);

    let synthetic = r.contract_view("CT1-999-20250000001").await.expect("synthetic");
    assert_eq!(synthetic.provenance, Some(Provenance::SecondSourceOnly));
    assert_eq!(synthetic.contract.map(|c| c.award_amount), Some(50.0));

    let solicitation = r.solicitation_view("8272400001").await.expect("view").expect("found");
    assert_eq!(solicitation.contracts.len(), 1);
    assert_eq!(solicitation.notices.len(), 1);

    let profile = r.vendor_profile("S0001").await.expect("profile").expect("vendor");
    assert_eq!(
        profile.registrant.as_ref().map(|reg| reg.organization_name.as_str()),
        Some("ACME WIDGETS INC.")
    );
    assert_eq!(profile.people.len(), 2);
    let enrichment = &profile.enrichment;
    assert_eq!(
        enrichment.entity_summary.as_ref().and_then(|e| e.duns_number.as_deref()),
        Some("111111111")
    );
    assert_eq!(enrichment.other_names.len(), 2);
    assert_eq!(enrichment.evaluations.len(), 1);
    assert_eq!(enrichment.principals.len(), 2);
    assert_eq!(enrichment.related_entities[0].relationship.as_deref(), Some("Parent Company"));
    assert_eq!(profile.payee_match, PayeeMatch::Wildcard { stem: "ACME WIDGETS".into() });
    let provenance = profile.contracts.iter().map(|c| c.provenance).collect::<Vec<_>>();
    assert_eq!(provenance, vec![Provenance::SecondSourceOnly, Provenance::BothSources]);
    assert_eq!(profile.yearly_totals.len(), 1);
    assert_eq!(profile.yearly_totals[0].total, 2050.0);

    let report = r.notice_report(10).await.expect("report");
    assert_eq!(report.solicitations_matched, 1);
    assert_eq!(report.contracts_matched, 1);
    r.close().await;
}

#[tokio::test]
async fn unreadable_columnar_root_degrades_to_relational_views() {
    let (dir, config) = workspace().await;
    build_databook(&config).await.expect("build");

    let blocked = dir.path().join("not_a_directory");
    std::fs::write(&blocked, b"plain file").expect("write");
    let r = resolver(&config, Arc::new(ParquetTransactionStore::local(blocked))).await;

    let view = r.contract_view("CTR-2").await.expect("contract");
    assert!(matches!(view.solicitation, SolicitationLink::Exact { .. }));
    assert_eq!(view.provenance, Some(Provenance::FirstSourceOnly));
    assert!(!view.spending.columnar.is_available());

    let profile = r.vendor_profile("S0002").await.expect("profile").expect("vendor");
    assert_eq!(profile.contracts.len(), 1);
    assert_eq!(profile.payee_match, PayeeMatch::NoMatch);
    assert!(!profile.columnar.is_available());
    r.close().await;
}

//! Bulk Loader: extracts → canonical-augmented rows → insert-or-ignore batches.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use databook_adapters::{
    contract_from_record, entity_summary_from_record, evaluation_from_record, notice_from_record,
    other_name_from_record, person_from_record, principal_from_record, read_extract,
    registrant_from_record, related_entity_from_record, solicitation_from_record,
    vendor_from_record, DatasetKind, SourceExtract, SourceRecord,
};
use databook_core::Agency;
use databook_storage::RelationalStore;
use serde::Serialize;
use tracing::{info, info_span, warn, Instrument};

use crate::registry::DatasetRegistry;

/// Rows written per transaction.
pub const LOAD_BATCH_SIZE: usize = 5_000;

const PLACEHOLDER_PINS: [&str; 5] = [
    "NOPINFOUND",
    "SEE BELOW",
    "LINE 17 BELOW",
    "SEE LINE 17 BELOW",
    "LINE 17",
];

/// Public-notice PINs shorter than eight characters, placeholder text, or
/// nothing but zeros and dots are not identifiers.
pub fn is_valid_pin(raw: &str) -> bool {
    let pin = raw.trim();
    if pin.chars().count() < 8 {
        return false;
    }
    let upper = pin.to_uppercase();
    if PLACEHOLDER_PINS.contains(&upper.as_str()) {
        return false;
    }
    if pin.chars().all(|c| c == '0' || c == '.') {
        return false;
    }
    let lower = pin.to_lowercase();
    !(lower.starts_with("see ") || lower.starts_with("line "))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub dataset: DatasetKind,
    pub rows_read: usize,
    pub inserted: u64,
    /// Rows without a natural key.
    pub skipped: usize,
    /// Notice rows dropped for an invalid PIN.
    pub rejected_pins: usize,
    pub agencies_added: u64,
}

impl LoadReport {
    fn new(dataset: DatasetKind, rows_read: usize) -> Self {
        Self {
            dataset,
            rows_read,
            inserted: 0,
            skipped: 0,
            rejected_pins: 0,
            agencies_added: 0,
        }
    }
}

pub struct BulkLoader<'a> {
    store: &'a RelationalStore,
}

impl<'a> BulkLoader<'a> {
    pub fn new(store: &'a RelationalStore) -> Self {
        Self { store }
    }

    /// Load every enabled dataset in registry order, then build lookup
    /// indexes. Missing extract files are skipped with a warning.
    pub async fn load_all(
        &self,
        registry: &DatasetRegistry,
        workspace_root: &Path,
    ) -> Result<Vec<LoadReport>> {
        let mut reports = Vec::new();
        for entry in registry.enabled() {
            let path = workspace_root.join(&entry.path);
            if !path.exists() {
                warn!(dataset = %entry.dataset, path = %path.display(), "extract missing; skipping");
                continue;
            }
            reports.push(self.load_path(entry.dataset, &path).await?);
        }
        self.store
            .create_lookup_indexes()
            .await
            .context("creating lookup indexes")?;
        info!(datasets = reports.len(), "lookup indexes ready");
        Ok(reports)
    }

    pub async fn load_path(&self, kind: DatasetKind, path: &Path) -> Result<LoadReport> {
        let extract = read_extract(path, kind.key_column())
            .with_context(|| format!("reading {kind} extract"))?;
        self.load_extract(kind, &extract).await
    }

    pub async fn load_extract(&self, kind: DatasetKind, extract: &SourceExtract) -> Result<LoadReport> {
        let span = info_span!("bulk_load", dataset = %kind, path = %extract.path.display());
        async move {
            let report = match kind {
                DatasetKind::Vendors => self.load_vendors(extract).await?,
                DatasetKind::Solicitations => self.load_solicitations(extract).await?,
                DatasetKind::Contracts => self.load_contracts(extract).await?,
                DatasetKind::Registrants => self.load_registrants(extract).await?,
                DatasetKind::RegistrantPeople => self.load_people(extract).await?,
                DatasetKind::PublicNotices => self.load_notices(extract).await?,
                DatasetKind::VendorEntitySummary
                | DatasetKind::VendorOtherNames
                | DatasetKind::VendorEvaluations
                | DatasetKind::VendorPrincipals
                | DatasetKind::VendorRelatedEntities => self.load_vendor_report(kind, extract).await?,
            };
            info!(
                rows = report.rows_read,
                inserted = report.inserted,
                skipped = report.skipped,
                rejected_pins = report.rejected_pins,
                agencies_added = report.agencies_added,
                "dataset loaded"
            );
            Ok::<_, anyhow::Error>(report)
        }
        .instrument(span)
        .await
    }

    async fn load_vendors(&self, extract: &SourceExtract) -> Result<LoadReport> {
        let mut report = LoadReport::new(DatasetKind::Vendors, extract.len());
        let rows = extract.records.iter().filter_map(vendor_from_record).collect::<Vec<_>>();
        report.skipped = extract.len() - rows.len();
        for chunk in rows.chunks(LOAD_BATCH_SIZE) {
            report.inserted += self.store.insert_vendors(chunk).await?;
        }
        Ok(report)
    }

    async fn load_solicitations(&self, extract: &SourceExtract) -> Result<LoadReport> {
        let mut report = LoadReport::new(DatasetKind::Solicitations, extract.len());
        let rows = extract
            .records
            .iter()
            .filter_map(solicitation_from_record)
            .collect::<Vec<_>>();
        report.skipped = extract.len() - rows.len();
        let agencies = collect_agencies(
            rows.iter()
                .map(|s| (s.agency_id.as_deref(), s.agency.as_deref())),
        );
        for chunk in rows.chunks(LOAD_BATCH_SIZE) {
            report.inserted += self.store.insert_solicitations(chunk).await?;
        }
        report.agencies_added = self.store.upsert_agencies(&agencies).await?;
        Ok(report)
    }

    async fn load_contracts(&self, extract: &SourceExtract) -> Result<LoadReport> {
        let mut report = LoadReport::new(DatasetKind::Contracts, extract.len());
        let rows = extract
            .records
            .iter()
            .filter_map(contract_from_record)
            .collect::<Vec<_>>();
        report.skipped = extract.len() - rows.len();
        let agencies = collect_agencies(
            rows.iter()
                .map(|c| (c.agency_id.as_deref(), c.agency.as_deref())),
        );
        for chunk in rows.chunks(LOAD_BATCH_SIZE) {
            report.inserted += self.store.insert_contracts(chunk).await?;
        }
        report.agencies_added = self.store.upsert_agencies(&agencies).await?;
        Ok(report)
    }

    async fn load_registrants(&self, extract: &SourceExtract) -> Result<LoadReport> {
        let mut report = LoadReport::new(DatasetKind::Registrants, extract.len());
        let rows = extract
            .records
            .iter()
            .filter_map(registrant_from_record)
            .collect::<Vec<_>>();
        report.skipped = extract.len() - rows.len();
        for chunk in rows.chunks(LOAD_BATCH_SIZE) {
            report.inserted += self.store.insert_registrants(chunk).await?;
        }
        Ok(report)
    }

    async fn load_people(&self, extract: &SourceExtract) -> Result<LoadReport> {
        let mut report = LoadReport::new(DatasetKind::RegistrantPeople, extract.len());
        let rows = extract.records.iter().filter_map(person_from_record).collect::<Vec<_>>();
        report.skipped = extract.len() - rows.len();
        for chunk in rows.chunks(LOAD_BATCH_SIZE) {
            report.inserted += self.store.insert_people(chunk).await?;
        }
        Ok(report)
    }

    async fn load_notices(&self, extract: &SourceExtract) -> Result<LoadReport> {
        let mut report = LoadReport::new(DatasetKind::PublicNotices, extract.len());
        let mapped = extract.records.iter().filter_map(notice_from_record).collect::<Vec<_>>();
        report.skipped = extract.len() - mapped.len();
        let rows = mapped
            .into_iter()
            .filter(|n| is_valid_pin(&n.pin))
            .collect::<Vec<_>>();
        report.rejected_pins = extract.len() - report.skipped - rows.len();
        for chunk in rows.chunks(LOAD_BATCH_SIZE) {
            report.inserted += self.store.insert_notices(chunk).await?;
        }
        Ok(report)
    }

    /// PASSPort vendor reports: keyed by vendor name only, no side effects.
    async fn load_vendor_report(&self, kind: DatasetKind, extract: &SourceExtract) -> Result<LoadReport> {
        let mut report = LoadReport::new(kind, extract.len());
        match kind {
            DatasetKind::VendorEntitySummary => {
                let rows = mapped(extract, entity_summary_from_record, &mut report);
                for chunk in rows.chunks(LOAD_BATCH_SIZE) {
                    report.inserted += self.store.insert_entity_summaries(chunk).await?;
                }
            }
            DatasetKind::VendorOtherNames => {
                let rows = mapped(extract, other_name_from_record, &mut report);
                for chunk in rows.chunks(LOAD_BATCH_SIZE) {
                    report.inserted += self.store.insert_other_names(chunk).await?;
                }
            }
            DatasetKind::VendorEvaluations => {
                let rows = mapped(extract, evaluation_from_record, &mut report);
                for chunk in rows.chunks(LOAD_BATCH_SIZE) {
                    report.inserted += self.store.insert_evaluations(chunk).await?;
                }
            }
            DatasetKind::VendorPrincipals => {
                let rows = mapped(extract, principal_from_record, &mut report);
                for chunk in rows.chunks(LOAD_BATCH_SIZE) {
                    report.inserted += self.store.insert_principals(chunk).await?;
                }
            }
            DatasetKind::VendorRelatedEntities => {
                let rows = mapped(extract, related_entity_from_record, &mut report);
                for chunk in rows.chunks(LOAD_BATCH_SIZE) {
                    report.inserted += self.store.insert_related_entities(chunk).await?;
                }
            }
            other => anyhow::bail!("{other} is not a vendor report"),
        }
        Ok(report)
    }
}

/// Map every record, counting keyless rows as skipped.
fn mapped<T>(
    extract: &SourceExtract,
    map: fn(&SourceRecord) -> Option<T>,
    report: &mut LoadReport,
) -> Vec<T> {
    let rows = extract.records.iter().filter_map(map).collect::<Vec<_>>();
    report.skipped = extract.len() - rows.len();
    rows
}

/// Distinct `(id, name)` pairs in first-seen order; rows missing either half
/// contribute nothing.
fn collect_agencies<'r>(pairs: impl Iterator<Item = (Option<&'r str>, Option<&'r str>)>) -> Vec<Agency> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for (id, name) in pairs {
        let (Some(id), Some(name)) = (id, name) else {
            continue;
        };
        if seen.insert(id) {
            out.push(Agency {
                id: id.to_string(),
                name: name.to_string(),
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use databook_adapters::parse_extract;
    use databook_storage::Table;
    use tempfile::tempdir;

    fn extract(kind: DatasetKind, csv: &str) -> SourceExtract {
        parse_extract(csv.as_bytes(), Path::new("mem.csv"), kind.key_column()).expect("parse")
    }

    #[test]
    fn pin_validation_rejects_placeholders_and_short_values() {
        for bad in ["", "0000", "SEE BELOW", "AB", "0000.0000", "see line 17 below", "Line 5 of notice", "NoPinFound"] {
            assert!(!is_valid_pin(bad), "{bad} should be rejected");
        }
        for good in ["85826Y1251", "  85826Y1251001 ", "00000001"] {
            assert!(is_valid_pin(good), "{good} should be accepted");
        }
    }

    #[tokio::test]
    async fn loading_twice_keeps_row_counts() {
        let dir = tempdir().expect("tempdir");
        let store = RelationalStore::open(&dir.path().join("db.sqlite")).await.expect("open");
        let loader = BulkLoader::new(&store);
        let contracts = extract(
            DatasetKind::Contracts,
            "CTR-ID,Contract ID,EPIN,Agency,wegov-org-id,Vendor,Award Amount\n\
             C1,CT1-827-001,8272400001001,Sanitation,827,Acme,\"$1,000.00\"\n\
             C2,CT1-827-002,8272400001002,DSNY,827,Acme,N/A\n\
             ,CT1-827-003,8272400001003,Sanitation,827,Acme,5\n",
        );

        let first = loader.load_extract(DatasetKind::Contracts, &contracts).await.expect("first");
        assert_eq!(first.inserted, 2);
        assert_eq!(first.skipped, 1);
        assert_eq!(first.agencies_added, 1);

        let second = loader.load_extract(DatasetKind::Contracts, &contracts).await.expect("second");
        assert_eq!(second.inserted, 0);
        assert_eq!(store.count(Table::Contracts).await.expect("count"), 2);

        let c2 = store.contract_by_ctr_id("C2").await.expect("lookup").expect("c2");
        assert_eq!(c2.award_amount, 0.0);
        let agencies = store.agencies().await.expect("agencies");
        assert_eq!(agencies.len(), 1);
        assert_eq!(agencies[0].name, "Sanitation");
    }

    #[tokio::test]
    async fn invalid_pins_never_reach_the_store() {
        let dir = tempdir().expect("tempdir");
        let store = RelationalStore::open(&dir.path().join("db.sqlite")).await.expect("open");
        let notices = extract(
            DatasetKind::PublicNotices,
            "RequestID,PIN,ShortTitle\n\
             N1,85826Y1251,Tree care\n\
             N2,SEE BELOW,Placeholder\n\
             N3,0000,Zeros\n\
             N4,,Blank\n\
             ,85826Y1252,No request id\n",
        );
        let report = BulkLoader::new(&store)
            .load_extract(DatasetKind::PublicNotices, &notices)
            .await
            .expect("load");
        assert_eq!(report.inserted, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.rejected_pins, 3);
        assert_eq!(store.count(Table::PublicNotices).await.expect("count"), 1);
    }

    #[tokio::test]
    async fn vendor_reports_load_insert_or_ignore() {
        let dir = tempdir().expect("tempdir");
        let store = RelationalStore::open(&dir.path().join("db.sqlite")).await.expect("open");
        let loader = BulkLoader::new(&store);
        let principals = extract(
            DatasetKind::VendorPrincipals,
            "Vendor Name,Principal Name,Current Title,Principal Ownership Type\n\
             Acme Widgets Inc,Dana Reyes,President,Owner\n\
             Acme Widgets Inc,Lee Park,Treasurer,\n\
             ,Nobody,Clerk,\n",
        );

        let first = loader
            .load_extract(DatasetKind::VendorPrincipals, &principals)
            .await
            .expect("first");
        assert_eq!((first.inserted, first.skipped), (2, 1));
        let second = loader
            .load_extract(DatasetKind::VendorPrincipals, &principals)
            .await
            .expect("second");
        assert_eq!(second.inserted, 0);
        assert_eq!(store.count(Table::VendorPrincipals).await.expect("count"), 2);
    }

    #[tokio::test]
    async fn load_all_skips_missing_files_and_builds_indexes() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("vendor_data.csv"),
            "PASSPort Supplier-ID,Vendor Name\nS1,Acme Widgets Inc\n",
        )
        .expect("write vendors");
        let store = RelationalStore::open(&dir.path().join("db.sqlite")).await.expect("open");

        let reports = BulkLoader::new(&store)
            .load_all(&DatasetRegistry::builtin(), dir.path())
            .await
            .expect("load all");
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].dataset, DatasetKind::Vendors);
        assert_eq!(reports[0].inserted, 1);
    }
}

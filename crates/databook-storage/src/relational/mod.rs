//! SQLite-backed relational store. One handle is opened per job or request
//! and closed explicitly when the work is done.

use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

mod read;
mod schema;
mod sort;
mod write;

pub use read::{NoticeKeys, VendorEnrichment, VendorListing};
pub use write::RegistrantMatch;
pub use schema::{Table, LOOKUP_INDEXES};
pub use sort::{ContractSortKey, SortOrder, VendorSortKey};

#[derive(Debug, Clone)]
pub struct RelationalStore {
    pool: SqlitePool,
}

impl RelationalStore {
    /// Open (creating if missing) the database file and ensure the schema exists.
    pub async fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating database directory {}", parent.display()))?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .with_context(|| format!("parsing sqlite path {}", path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .with_context(|| format!("opening relational store {}", path.display()))?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(self) {
        self.pool.close().await;
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        for statement in schema::TABLES {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("creating relational schema")?;
        }
        Ok(())
    }

    /// Create every lookup index on canonical-key and free-text join columns.
    pub async fn create_lookup_indexes(&self) -> anyhow::Result<()> {
        for (name, table, column) in LOOKUP_INDEXES {
            let statement = format!("CREATE INDEX IF NOT EXISTS {name} ON {table}({column})");
            sqlx::query(&statement)
                .execute(&self.pool)
                .await
                .with_context(|| format!("creating index {name}"))?;
        }
        Ok(())
    }

    pub async fn count(&self, table: Table) -> anyhow::Result<i64> {
        let statement = format!("SELECT COUNT(*) FROM {}", table.as_str());
        let count: i64 = sqlx::query_scalar(&statement)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("counting {}", table.as_str()))?;
        Ok(count)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::RelationalStore;
    use databook_core::{Contract, Solicitation, Vendor};
    use tempfile::TempDir;

    pub async fn temp_store() -> (TempDir, RelationalStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = RelationalStore::open(&dir.path().join("databook.db"))
            .await
            .expect("open store");
        (dir, store)
    }

    pub fn vendor(id: &str, name: &str) -> Vendor {
        Vendor {
            passport_supplier_id: id.into(),
            name: Some(name.into()),
            canonical_name: databook_core::canonicalize_id(Some(name)),
            fms_vendor_code: None,
            duns_number: None,
            certification_type: None,
            ethnicity: None,
            business_category: None,
            corporate_structure: None,
        }
    }

    pub fn contract(ctr_id: &str, contract_id: &str, epin: &str, vendor: &str, amount: f64) -> Contract {
        Contract {
            ctr_id: ctr_id.into(),
            contract_id: Some(contract_id.into()),
            canonical_contract_id: databook_core::canonicalize_id(Some(contract_id)),
            epin: Some(epin.into()),
            canonical_epin: databook_core::canonicalize_id(Some(epin)),
            title: Some(format!("Services under {contract_id}")),
            agency: Some("Department of Sanitation".into()),
            agency_id: Some("827".into()),
            vendor_name: Some(vendor.into()),
            program: None,
            procurement_method: None,
            contract_type: None,
            status: Some("Registered".into()),
            award_amount: amount,
            current_amount: amount,
            start_date: Some("07/15/2022".into()),
            end_date: Some("06/30/2024".into()),
            industry: None,
        }
    }

    pub fn solicitation(epin: &str) -> Solicitation {
        Solicitation {
            epin: epin.into(),
            canonical_epin: databook_core::canonicalize_id(Some(epin)),
            rfp_id: None,
            program: None,
            industry: None,
            procurement_name: Some(format!("Procurement {epin}")),
            agency: Some("Department of Sanitation".into()),
            agency_id: Some("827".into()),
            rfx_status: Some("Closed".into()),
            release_date: None,
            due_date: None,
            main_commodity: None,
            procurement_method: None,
        }
    }
}

//! Batch jobs: bulk load, entity match, and the incremental transaction merge,
//! plus the environment config and optional scheduler that drive them.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use databook_adapters::CheckbookFeed;
use databook_core::current_fiscal_year;
use databook_storage::{
    ArtifactStore, HttpClientConfig, HttpFetcher, ParquetTransactionStore, PartitionWriter,
    RelationalStore, TransactionStore, WatermarkStore,
};
use serde::Serialize;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};
use uuid::Uuid;

pub mod loader;
pub mod matcher;
pub mod merger;
pub mod registry;

pub use loader::{is_valid_pin, BulkLoader, LoadReport};
pub use matcher::{match_registrants, run_entity_match, MatchReport, EXACT_MATCH_SCORE};
pub use merger::{CommittedBatch, MergeOutcome, MergeState, TransactionMerger, DEFAULT_PAGE_SIZE};
pub use registry::{DatasetEntry, DatasetRegistry};

pub const CRATE_NAME: &str = "databook-sync";

#[derive(Debug, Clone)]
pub struct DatabookConfig {
    pub db_path: PathBuf,
    pub workspace_root: PathBuf,
    pub data_dir: PathBuf,
    /// Opaque columnar mode flag: partitions addressed under `columnar_url`.
    pub use_remote_columnar: bool,
    pub columnar_url: String,
    pub max_data_fy: Option<i32>,
    pub checkbook_api_url: String,
    pub feed_page_size: u64,
    pub http_timeout_secs: u64,
    pub columnar_timeout_secs: u64,
    pub user_agent: String,
    pub scheduler_enabled: bool,
    pub update_cron: String,
}

impl DatabookConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let flag = |key: &str| {
            var(key)
                .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "True"))
                .unwrap_or(false)
        };
        Self {
            db_path: var("DATABOOK_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./databook.db")),
            workspace_root: var("DATABOOK_WORKSPACE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            data_dir: var("DATABOOK_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data_pipeline")),
            use_remote_columnar: flag("USE_S3_DATA"),
            columnar_url: var("DATABOOK_COLUMNAR_URL").unwrap_or_else(|| {
                "https://nyc-databook-spending.s3.amazonaws.com".to_string()
            }),
            max_data_fy: var("DATABOOK_MAX_DATA_FY").and_then(|v| v.trim().parse().ok()),
            checkbook_api_url: var("CHECKBOOK_API_URL")
                .unwrap_or_else(|| "https://www.checkbooknyc.com/api".to_string()),
            feed_page_size: var("DATABOOK_FEED_PAGE_SIZE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_PAGE_SIZE),
            http_timeout_secs: var("DATABOOK_HTTP_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            columnar_timeout_secs: var("DATABOOK_COLUMNAR_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(20),
            user_agent: var("DATABOOK_USER_AGENT")
                .unwrap_or_else(|| "databook-bot/0.1".to_string()),
            scheduler_enabled: flag("DATABOOK_SCHEDULER_ENABLED"),
            update_cron: var("DATABOOK_UPDATE_CRON").unwrap_or_else(|| "0 0 6 * * *".to_string()),
        }
    }

    /// Raw batch files and watermarks.
    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    /// Root of the local `fiscal_year=Y` partitions.
    pub fn parquet_dir(&self) -> PathBuf {
        self.data_dir.join("parquet")
    }

    pub fn http_fetcher(&self) -> Result<Arc<HttpFetcher>> {
        let fetcher = HttpFetcher::new(HttpClientConfig {
            timeout: Duration::from_secs(self.http_timeout_secs),
            user_agent: Some(self.user_agent.clone()),
            ..Default::default()
        })?;
        Ok(Arc::new(fetcher))
    }

    /// Columnar read handle for the configured mode.
    pub fn transaction_store(&self, http: Arc<HttpFetcher>) -> Arc<dyn TransactionStore> {
        if self.use_remote_columnar {
            Arc::new(ParquetTransactionStore::remote(self.columnar_url.clone(), http))
        } else {
            Arc::new(ParquetTransactionStore::local(self.parquet_dir()))
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildSummary {
    pub loads: Vec<LoadReport>,
    pub matched: MatchReport,
}

/// Full rebuild: load every enabled extract, index, then match registrants.
pub async fn build_databook(config: &DatabookConfig) -> Result<BuildSummary> {
    let registry = DatasetRegistry::load(&config.workspace_root).await?;
    let store = RelationalStore::open(&config.db_path).await?;
    let result = async {
        let loads = BulkLoader::new(&store)
            .load_all(&registry, &config.workspace_root)
            .await?;
        let matched = run_entity_match(&store).await?;
        Ok::<_, anyhow::Error>(BuildSummary { loads, matched })
    }
    .await;
    store.close().await;
    result
}

pub async fn run_match(config: &DatabookConfig) -> Result<MatchReport> {
    let store = RelationalStore::open(&config.db_path).await?;
    let result = run_entity_match(&store).await;
    store.close().await;
    result
}

pub fn build_merger(config: &DatabookConfig, run_id: Uuid) -> Result<TransactionMerger> {
    let feed = CheckbookFeed::new(config.http_fetcher()?, config.checkbook_api_url.clone(), run_id);
    Ok(TransactionMerger::new(
        Arc::new(feed),
        WatermarkStore::new(config.raw_dir()),
        ArtifactStore::new(config.raw_dir()),
        PartitionWriter::new(config.parquet_dir()),
    )
    .with_page_size(config.feed_page_size))
}

/// One merge run for `fiscal_year`, defaulting to the current fiscal year.
pub async fn run_update(config: &DatabookConfig, fiscal_year: Option<i32>) -> Result<MergeOutcome> {
    let run_id = Uuid::new_v4();
    let today = Utc::now().date_naive();
    let fiscal_year = fiscal_year.unwrap_or_else(|| current_fiscal_year(today));
    info!(%run_id, fiscal_year, "starting transaction update");
    build_merger(config, run_id)?.run(fiscal_year, today).await
}

/// In-process daily trigger for `run_update`, when enabled.
pub async fn maybe_build_scheduler(config: &DatabookConfig) -> Result<Option<JobScheduler>> {
    if !config.scheduler_enabled {
        return Ok(None);
    }

    let sched = JobScheduler::new().await.context("creating scheduler")?;
    let job_config = config.clone();
    let job = Job::new_async(config.update_cron.as_str(), move |_uuid, _l| {
        let config = job_config.clone();
        Box::pin(async move {
            match run_update(&config, None).await {
                Ok(outcome) => info!(?outcome, "scheduled update finished"),
                Err(err) => error!(error = format!("{err:#}"), "scheduled update failed"),
            }
        })
    })
    .with_context(|| format!("creating scheduler job for cron {}", config.update_cron))?;
    sched.add(job).await.context("adding scheduler job")?;
    Ok(Some(sched))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn config_defaults_and_overrides() {
        let defaults = DatabookConfig::from_lookup(|_| None);
        assert_eq!(defaults.db_path, PathBuf::from("./databook.db"));
        assert_eq!(defaults.parquet_dir(), PathBuf::from("./data_pipeline/parquet"));
        assert!(!defaults.use_remote_columnar);
        assert_eq!(defaults.max_data_fy, None);
        assert_eq!(defaults.feed_page_size, DEFAULT_PAGE_SIZE);

        let vars = HashMap::from([
            ("USE_S3_DATA", "true"),
            ("DATABOOK_MAX_DATA_FY", "2025"),
            ("DATABOOK_FEED_PAGE_SIZE", "not-a-number"),
            ("DATABOOK_DATA_DIR", "/srv/databook"),
        ]);
        let config = DatabookConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert!(config.use_remote_columnar);
        assert_eq!(config.max_data_fy, Some(2025));
        assert_eq!(config.feed_page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.raw_dir(), PathBuf::from("/srv/databook/raw"));
    }

    #[tokio::test]
    async fn scheduler_is_absent_unless_enabled() {
        let config = DatabookConfig::from_lookup(|_| None);
        assert!(maybe_build_scheduler(&config).await.expect("scheduler").is_none());
    }
}

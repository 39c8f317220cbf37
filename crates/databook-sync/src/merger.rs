//! Transactional Store Merger: pulls the feed delta past the per-year
//! watermark, writes an immutable raw batch, stages one partition file per
//! fiscal year, publishes them in the manifests once all are on disk, and only
//! then advances the watermark.
//!
//! Only one merge per fiscal year may run at a time. Callers (the scheduler
//! or whoever invokes `databook update`) serialize runs; two concurrent runs
//! for the same year would both fetch and append the same delta.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use databook_adapters::TransactionFeed;
use databook_core::{Transaction, TRANSACTION_COLUMNS};
use databook_storage::{ArtifactStore, PartitionWriter, WatermarkStore};
use serde::Serialize;
use tracing::{info, info_span, warn, Instrument};

/// Largest page requested from the feed.
pub const DEFAULT_PAGE_SIZE: u64 = 20_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MergeState {
    Idle,
    CheckingRemote,
    Downloading,
    Converting,
    Committed,
}

impl fmt::Display for MergeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MergeState::Idle => "idle",
            MergeState::CheckingRemote => "checking_remote",
            MergeState::Downloading => "downloading",
            MergeState::Converting => "converting",
            MergeState::Committed => "committed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MergeOutcome {
    /// Remote total did not exceed the watermark.
    UpToDate { local: u64, remote: u64 },
    Committed(CommittedBatch),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommittedBatch {
    pub first_record: u64,
    pub last_record: u64,
    pub rows: usize,
    pub raw_batch: PathBuf,
    /// Fiscal years that received a new partition file.
    pub partitions: Vec<i32>,
}

pub struct TransactionMerger {
    feed: Arc<dyn TransactionFeed>,
    watermarks: WatermarkStore,
    raw: ArtifactStore,
    partitions: PartitionWriter,
    page_size: u64,
}

impl TransactionMerger {
    pub fn new(
        feed: Arc<dyn TransactionFeed>,
        watermarks: WatermarkStore,
        raw: ArtifactStore,
        partitions: PartitionWriter,
    ) -> Self {
        Self {
            feed,
            watermarks,
            raw,
            partitions,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// One merge run for `fiscal_year`. Any error leaves the persisted
    /// watermark exactly as it was before the run.
    pub async fn run(&self, fiscal_year: i32, today: NaiveDate) -> Result<MergeOutcome> {
        self.run_inner(fiscal_year, today)
            .instrument(info_span!("merge_run", fiscal_year))
            .await
    }

    async fn run_inner(&self, fiscal_year: i32, today: NaiveDate) -> Result<MergeOutcome> {
        let mut watermark = self.watermarks.load(fiscal_year).await?;
        transition(MergeState::Idle);

        transition(MergeState::CheckingRemote);
        let remote = self
            .feed
            .fetch_page(fiscal_year, 1, 1)
            .await
            .context("checking remote record count")?
            .total_records;
        let local = watermark.last_record_downloaded;
        if remote <= local {
            info!(local, remote, "no new records");
            transition(MergeState::Idle);
            return Ok(MergeOutcome::UpToDate { local, remote });
        }

        transition(MergeState::Downloading);
        let first_record = local + 1;
        let rows = self.download(fiscal_year, first_record, remote).await?;
        if rows.is_empty() {
            warn!(local, remote, "feed reported new records but returned none");
            transition(MergeState::Idle);
            return Ok(MergeOutcome::UpToDate { local, remote });
        }
        let last_record = first_record + rows.len() as u64 - 1;

        transition(MergeState::Converting);
        let raw_relative =
            self.raw
                .batch_relative_path(fiscal_year, today, first_record, last_record, "csv");
        let stored = self
            .raw
            .store_bytes(&raw_relative, &encode_raw_batch(&rows)?)
            .await
            .context("writing raw batch")?;
        if stored.deduplicated {
            warn!(path = %stored.relative_path.display(), "raw batch already present; keeping existing file");
        }

        // Named by record range only, so a retry on another day overwrites
        // the file and manifest entry an earlier failed attempt left behind.
        let stem = format!("fy{fiscal_year}_update_{first_record}-{last_record}");
        let mut by_year: BTreeMap<i32, Vec<Transaction>> = BTreeMap::new();
        for row in &rows {
            let year = row.partition_year().unwrap_or(fiscal_year);
            by_year.entry(year).or_default().push(row.clone());
        }
        let mut staged = Vec::with_capacity(by_year.len());
        for (year, year_rows) in &by_year {
            let file = self
                .partitions
                .stage(*year, &stem, year_rows)
                .await
                .with_context(|| format!("writing partition file for fiscal year {year}"))?;
            info!(partition = year, file = %file.entry.path, rows = year_rows.len(), "partition file staged");
            staged.push(file);
        }
        self.partitions
            .publish(&staged, &format!("fy{fiscal_year}_update_{first_record}-"))
            .await
            .context("publishing partition manifests")?;
        let partitions = by_year.keys().copied().collect::<Vec<_>>();

        watermark.last_record_downloaded = last_record;
        watermark.total_records = remote;
        watermark.last_updated = Some(Utc::now());
        watermark
            .chunks_completed
            .push(stored.relative_path.display().to_string());
        self.watermarks
            .save(fiscal_year, &watermark)
            .await
            .context("saving watermark")?;
        transition(MergeState::Committed);
        info!(first_record, last_record, rows = rows.len(), "delta merged");

        Ok(MergeOutcome::Committed(CommittedBatch {
            first_record,
            last_record,
            rows: rows.len(),
            raw_batch: stored.relative_path,
            partitions,
        }))
    }

    /// Fetch records `first..=remote_total` in pages. A failed page fails the
    /// whole download.
    async fn download(
        &self,
        fiscal_year: i32,
        first: u64,
        remote_total: u64,
    ) -> Result<Vec<Transaction>> {
        let mut rows = Vec::new();
        let mut offset = first;
        while offset <= remote_total {
            let count = self.page_size.min(remote_total - offset + 1);
            let mut page = self
                .feed
                .fetch_page(fiscal_year, offset, count)
                .await
                .with_context(|| format!("fetching records {offset}..{}", offset + count - 1))?;
            page.transactions.truncate(count as usize);
            let received = page.transactions.len() as u64;
            info!(offset, requested = count, received, "page downloaded");
            if received == 0 {
                break;
            }
            rows.extend(page.transactions);
            offset += received;
        }
        Ok(rows)
    }
}

fn transition(state: MergeState) {
    info!(%state, "merge state");
}

/// Raw batch layout: header row of the transaction columns, one row per record.
pub fn encode_raw_batch(rows: &[Transaction]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(TRANSACTION_COLUMNS)
        .context("writing raw batch header")?;
    for row in rows {
        writer
            .write_record(TRANSACTION_COLUMNS.iter().map(|c| row.field(c).unwrap_or("")))
            .context("writing raw batch row")?;
    }
    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("flushing raw batch: {}", e.error()))
}

#[cfg(test)]
pub(crate) mod test_feed {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use databook_adapters::{FeedError, FeedPage, TransactionFeed};
    use databook_core::Transaction;

    /// In-memory feed over a growable record list. With `fail_from` set, any
    /// page reaching that record fails.
    #[derive(Default)]
    pub struct MemoryFeed {
        pub records: Mutex<Vec<Transaction>>,
        pub fail_from: Mutex<Option<u64>>,
        pub requests: Mutex<Vec<(u64, u64)>>,
    }

    impl MemoryFeed {
        pub fn with_records(records: Vec<Transaction>) -> Self {
            Self {
                records: Mutex::new(records),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl TransactionFeed for MemoryFeed {
        async fn fetch_page(
            &self,
            _fiscal_year: i32,
            offset: u64,
            count: u64,
        ) -> Result<FeedPage, FeedError> {
            self.requests.lock().expect("lock").push((offset, count));
            if self.fail_from.lock().expect("lock").is_some_and(|f| offset + count > f) {
                return Err(FeedError::Rejected(format!("injected failure at {offset}")));
            }
            let records = self.records.lock().expect("lock");
            let start = (offset.saturating_sub(1) as usize).min(records.len());
            let end = (start + count as usize).min(records.len());
            Ok(FeedPage {
                total_records: records.len() as u64,
                transactions: records[start..end].to_vec(),
            })
        }
    }

    pub fn tx(n: u64, fiscal_year: &str, contract: &str, payee: &str) -> Transaction {
        Transaction {
            agency: Some("Department of Sanitation".into()),
            payee_name: Some(payee.into()),
            check_amount: Some(format!("{}.00", n * 100)),
            fiscal_year: Some(fiscal_year.into()),
            issue_date: Some(format!("{}-01-{:02}", fiscal_year, (n % 28) + 1)),
            contract_id: Some(contract.into()),
            ..Default::default()
        }
    }
}

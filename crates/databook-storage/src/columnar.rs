//! Fiscal-year partitioned parquet store for spending transactions.
//!
//! Layout: `<root>/fiscal_year=<Y>/<file>.parquet` plus one `manifest.json` per
//! partition. Readers only see files listed in a manifest, and the manifest is
//! replaced atomically after the file it names is fully on disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use arrow_array::{Array, ArrayRef, RecordBatch, StringArray};
use arrow_schema::{DataType, Field as ArrowField, Schema};
use async_trait::async_trait;
use bytes::Bytes;
use databook_core::{partition_dir_name, PartitionWindow, Transaction, TRANSACTION_COLUMNS};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::artifact::{write_file_atomic, ArtifactStore};
use crate::http::{Endpoint, FetchError, HttpFetcher};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const MANIFEST_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionManifest {
    pub schema_version: u32,
    pub fiscal_year: i32,
    pub files: Vec<ParquetManifestFile>,
}

impl PartitionManifest {
    pub fn empty(fiscal_year: i32) -> Self {
        Self {
            schema_version: MANIFEST_SCHEMA_VERSION,
            fiscal_year,
            files: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParquetManifestFile {
    pub name: String,
    /// Relative to the partition directory.
    pub path: String,
    pub sha256: String,
    pub bytes: u64,
}

#[derive(Debug, Error)]
pub enum ColumnarError {
    #[error("reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("decoding parquet {path}: {source}")]
    Parquet {
        path: String,
        #[source]
        source: parquet::errors::ParquetError,
    },
    #[error("reading record batch from {path}: {source}")]
    Arrow {
        path: String,
        #[source]
        source: arrow_schema::ArrowError,
    },
    #[error("parsing manifest {path}: {source}")]
    Manifest {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("column {column} in {path} is not a string column")]
    ColumnType { path: String, column: String },
    #[error("remote partition fetch failed: {0}")]
    Fetch(#[from] FetchError),
}

/// Row predicate pushed into a partition scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionFilter {
    /// Payee name equals the value exactly.
    PayeeExact(String),
    /// Payee name contains the value, ignoring case, `.`/`,` and runs of
    /// whitespace.
    PayeeContains(String),
    /// Canonicalized contract field equals this canonical key.
    ContractKey(String),
    /// Canonicalized contract field equals this key, or one contains the other.
    ContractKeyOverlap(String),
}

impl TransactionFilter {
    pub fn matches(&self, tx: &Transaction) -> bool {
        match self {
            TransactionFilter::PayeeExact(name) => tx.payee_name.as_deref() == Some(name.as_str()),
            TransactionFilter::PayeeContains(needle) => {
                let needle = loose_name(needle);
                tx.payee_name
                    .as_deref()
                    .is_some_and(|payee| loose_name(payee).contains(&needle))
            }
            TransactionFilter::ContractKey(key) => {
                tx.canonical_contract_id().as_deref() == Some(key.as_str())
            }
            TransactionFilter::ContractKeyOverlap(key) => tx
                .canonical_contract_id()
                .is_some_and(|own| own.contains(key.as_str()) || key.contains(own.as_str())),
        }
    }
}

fn loose_name(name: &str) -> String {
    name.split_whitespace()
        .map(|token| {
            token
                .chars()
                .filter(|c| *c != '.' && *c != ',')
                .flat_map(char::to_uppercase)
                .collect::<String>()
        })
        .filter(|token| !token.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Read surface of the columnar store. Scans never leave the given window.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn scan(
        &self,
        window: PartitionWindow,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, ColumnarError>;

    /// Newest fiscal year with at least one committed partition file, if the
    /// store can tell.
    async fn newest_fiscal_year(&self) -> Result<Option<i32>, ColumnarError>;
}

#[derive(Debug, Clone)]
pub enum PartitionLocation {
    Local(PathBuf),
    Remote {
        base_url: String,
        http: Arc<HttpFetcher>,
    },
}

#[derive(Debug, Clone)]
pub struct ParquetTransactionStore {
    location: PartitionLocation,
}

impl ParquetTransactionStore {
    pub fn local(root: impl Into<PathBuf>) -> Self {
        Self {
            location: PartitionLocation::Local(root.into()),
        }
    }

    pub fn remote(base_url: impl Into<String>, http: Arc<HttpFetcher>) -> Self {
        Self {
            location: PartitionLocation::Remote {
                base_url: base_url.into().trim_end_matches('/').to_string(),
                http,
            },
        }
    }

    pub fn location(&self) -> &PartitionLocation {
        &self.location
    }

    /// Partition paths (directories or URLs) a scan of `window` touches.
    pub fn partition_paths(&self, window: PartitionWindow) -> Vec<String> {
        window.years().map(|fy| self.partition_path(fy)).collect()
    }

    fn partition_path(&self, fiscal_year: i32) -> String {
        match &self.location {
            PartitionLocation::Local(root) => root
                .join(partition_dir_name(fiscal_year))
                .display()
                .to_string(),
            PartitionLocation::Remote { base_url, .. } => {
                format!("{base_url}/{}", partition_dir_name(fiscal_year))
            }
        }
    }

    async fn read_object(&self, path: &str) -> Result<Option<Bytes>, ColumnarError> {
        match &self.location {
            PartitionLocation::Local(_) => match fs::read(path).await {
                Ok(bytes) => Ok(Some(Bytes::from(bytes))),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(source) => Err(ColumnarError::Io {
                    path: path.to_string(),
                    source,
                }),
            },
            PartitionLocation::Remote { http, .. } => {
                match http.get(Uuid::new_v4(), Endpoint::Columnar, path).await {
                    Ok(resp) => Ok(Some(Bytes::from(resp.body))),
                    Err(FetchError::Status { status: 403 | 404, .. }) => Ok(None),
                    Err(err) => Err(err.into()),
                }
            }
        }
    }

    async fn read_manifest(&self, fiscal_year: i32) -> Result<Option<PartitionManifest>, ColumnarError> {
        let path = format!("{}/{MANIFEST_FILE}", self.partition_path(fiscal_year));
        let Some(bytes) = self.read_object(&path).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| ColumnarError::Manifest { path, source })
    }
}

#[async_trait]
impl TransactionStore for ParquetTransactionStore {
    async fn scan(
        &self,
        window: PartitionWindow,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, ColumnarError> {
        let mut out = Vec::new();
        for fiscal_year in window.years() {
            let Some(manifest) = self.read_manifest(fiscal_year).await? else {
                continue;
            };
            let dir = self.partition_path(fiscal_year);
            for file in &manifest.files {
                let path = format!("{dir}/{}", file.path);
                let Some(bytes) = self.read_object(&path).await? else {
                    continue;
                };
                let rows = decode_transactions(bytes, &path)?;
                out.extend(rows.into_iter().filter(|tx| filter.matches(tx)));
            }
        }
        debug!(
            first = window.first,
            last = window.last,
            matched = out.len(),
            "columnar scan"
        );
        Ok(out)
    }

    async fn newest_fiscal_year(&self) -> Result<Option<i32>, ColumnarError> {
        let PartitionLocation::Local(root) = &self.location else {
            return Ok(None);
        };
        let mut entries = match fs::read_dir(root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ColumnarError::Io {
                    path: root.display().to_string(),
                    source,
                })
            }
        };
        let mut newest = None;
        loop {
            let entry = entries.next_entry().await.map_err(|source| ColumnarError::Io {
                path: root.display().to_string(),
                source,
            })?;
            let Some(entry) = entry else { break };
            let name = entry.file_name();
            let Some(fy) = name
                .to_str()
                .and_then(|n| n.strip_prefix("fiscal_year="))
                .and_then(|y| y.parse::<i32>().ok())
            else {
                continue;
            };
            let has_files = self
                .read_manifest(fy)
                .await?
                .is_some_and(|m| !m.files.is_empty());
            if has_files && newest.map_or(true, |n| fy > n) {
                newest = Some(fy);
            }
        }
        Ok(newest)
    }
}

fn transaction_schema() -> Arc<Schema> {
    Arc::new(Schema::new(
        TRANSACTION_COLUMNS
            .iter()
            .map(|name| ArrowField::new(*name, DataType::Utf8, true))
            .collect::<Vec<_>>(),
    ))
}

/// Serialize rows into one parquet file image with every column as nullable utf8.
pub fn encode_transactions(rows: &[Transaction]) -> anyhow::Result<Vec<u8>> {
    let columns = TRANSACTION_COLUMNS
        .iter()
        .map(|column| {
            Arc::new(StringArray::from(
                rows.iter().map(|tx| tx.field(column)).collect::<Vec<_>>(),
            )) as ArrayRef
        })
        .collect::<Vec<_>>();
    let batch = RecordBatch::try_new(transaction_schema(), columns)
        .context("building transactions record batch")?;

    let mut buf = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buf, batch.schema(), None)
        .context("opening parquet writer")?;
    writer.write(&batch).context("writing record batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(buf)
}

/// Read a parquet image back into transactions. Columns absent from the file
/// read as null.
pub fn decode_transactions(bytes: Bytes, path: &str) -> Result<Vec<Transaction>, ColumnarError> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(bytes)
        .and_then(|builder| builder.build())
        .map_err(|source| ColumnarError::Parquet {
            path: path.to_string(),
            source,
        })?;

    let mut out = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|source| ColumnarError::Arrow {
            path: path.to_string(),
            source,
        })?;
        let mut columns = Vec::with_capacity(TRANSACTION_COLUMNS.len());
        for column in TRANSACTION_COLUMNS {
            let array = match batch.column_by_name(column) {
                Some(array) => Some(array.as_any().downcast_ref::<StringArray>().ok_or_else(
                    || ColumnarError::ColumnType {
                        path: path.to_string(),
                        column: column.to_string(),
                    },
                )?),
                None => None,
            };
            columns.push((column, array));
        }
        for row in 0..batch.num_rows() {
            let mut tx = Transaction::default();
            for (column, array) in &columns {
                let value = array
                    .as_ref()
                    .filter(|a| !a.is_null(row))
                    .map(|a| a.value(row).to_string());
                tx.set_field(column, value);
            }
            out.push(tx);
        }
    }
    Ok(out)
}

/// A partition file fully on disk but not yet listed in a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub fiscal_year: i32,
    pub entry: ParquetManifestFile,
}

/// Writes parquet files into local partitions and publishes them in the
/// partition manifests. Published files are never rewritten in place.
#[derive(Debug, Clone)]
pub struct PartitionWriter {
    root: PathBuf,
}

impl PartitionWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self, fiscal_year: i32) -> PathBuf {
        self.root
            .join(partition_dir_name(fiscal_year))
            .join(MANIFEST_FILE)
    }

    pub async fn load_manifest(&self, fiscal_year: i32) -> anyhow::Result<PartitionManifest> {
        let path = self.manifest_path(fiscal_year);
        match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("parsing manifest {}", path.display())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Ok(PartitionManifest::empty(fiscal_year))
            }
            Err(err) => Err(err).with_context(|| format!("reading manifest {}", path.display())),
        }
    }

    /// Write `rows` as `<file_stem>.parquet` in the fiscal-year partition.
    /// No manifest lists the file yet, so readers cannot see it.
    pub async fn stage(
        &self,
        fiscal_year: i32,
        file_stem: &str,
        rows: &[Transaction],
    ) -> anyhow::Result<StagedFile> {
        let name = format!("{file_stem}.parquet");
        let path = self.root.join(partition_dir_name(fiscal_year)).join(&name);
        let bytes = encode_transactions(rows)
            .with_context(|| format!("encoding partition file {}", path.display()))?;
        write_file_atomic(&path, &bytes).await?;

        Ok(StagedFile {
            fiscal_year,
            entry: ParquetManifestFile {
                name: name.clone(),
                path: name,
                sha256: ArtifactStore::sha256_hex(&bytes),
                bytes: bytes.len() as u64,
            },
        })
    }

    /// List staged files in their partition manifests. Existing entries whose
    /// name starts with `supersedes` are dropped first, so a retried run
    /// replaces what an earlier attempt published instead of adding to it.
    pub async fn publish(&self, staged: &[StagedFile], supersedes: &str) -> anyhow::Result<()> {
        let mut by_year: BTreeMap<i32, Vec<&ParquetManifestFile>> = BTreeMap::new();
        for file in staged {
            by_year.entry(file.fiscal_year).or_default().push(&file.entry);
        }
        for (fiscal_year, entries) in by_year {
            let mut manifest = self.load_manifest(fiscal_year).await?;
            manifest.files.retain(|f| {
                !f.name.starts_with(supersedes) && entries.iter().all(|e| e.name != f.name)
            });
            manifest.files.extend(entries.into_iter().cloned());
            let manifest_bytes =
                serde_json::to_vec_pretty(&manifest).context("serializing partition manifest")?;
            write_file_atomic(&self.manifest_path(fiscal_year), &manifest_bytes)
                .await
                .with_context(|| format!("publishing manifest for fiscal year {fiscal_year}"))?;
        }
        Ok(())
    }

    /// Stage and publish one file.
    pub async fn append(
        &self,
        fiscal_year: i32,
        file_stem: &str,
        rows: &[Transaction],
    ) -> anyhow::Result<ParquetManifestFile> {
        let staged = self.stage(fiscal_year, file_stem, rows).await?;
        self.publish(std::slice::from_ref(&staged), &staged.entry.name)
            .await?;
        Ok(staged.entry)
    }
}

//! Storage handles for the procurement databook: the relational store, the
//! partitioned columnar store, raw batch artifacts, watermarks and HTTP.

pub mod artifact;
pub mod columnar;
pub mod http;
pub mod relational;
pub mod watermark;

pub use artifact::{write_file_atomic, ArtifactStore, StoredArtifact};
pub use columnar::{
    decode_transactions, encode_transactions, ColumnarError, ParquetManifestFile,
    ParquetTransactionStore, PartitionLocation, PartitionManifest, PartitionWriter, StagedFile,
    TransactionFilter, TransactionStore,
};
pub use http::{
    is_transient_error, is_transient_status, BackoffPolicy, Endpoint, FetchError, FetchRequest,
    FetchedResponse, HttpClientConfig, HttpFetcher,
};
pub use relational::{
    ContractSortKey, NoticeKeys, RegistrantMatch, RelationalStore, SortOrder, Table,
    VendorEnrichment, VendorListing, VendorSortKey,
};
pub use watermark::WatermarkStore;

pub const CRATE_NAME: &str = "databook-storage";

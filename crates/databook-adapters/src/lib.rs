//! Source adapters: CSV bulk extracts and the remote spending feed.

pub mod datasets;
pub mod extract;
pub mod feed;

pub use datasets::{
    contract_from_record, entity_summary_from_record, evaluation_from_record, notice_from_record,
    other_name_from_record, person_from_record, principal_from_record, registrant_from_record,
    related_entity_from_record, solicitation_from_record, vendor_from_record, DatasetKind,
};
pub use extract::{parse_extract, read_extract, ExtractError, SourceExtract, SourceRecord};
pub use feed::{
    parse_spending_response, spending_request_xml, CheckbookFeed, FeedError, FeedPage,
    TransactionFeed,
};

pub const CRATE_NAME: &str = "databook-adapters";

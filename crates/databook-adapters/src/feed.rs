//! Remote spending-transaction feed (Checkbook NYC XML API).

use std::sync::Arc;

use async_trait::async_trait;
use databook_core::{Transaction, TRANSACTION_COLUMNS};
use databook_storage::{Endpoint, FetchError, HttpFetcher};
use quick_xml::events::Event;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Http(#[from] FetchError),
    #[error("malformed feed payload: {0}")]
    Xml(String),
    #[error("feed payload has no record_count")]
    MissingRecordCount,
    #[error("feed rejected the request: {0}")]
    Rejected(String),
}

/// One page of the feed plus the total it reported at request time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FeedPage {
    pub total_records: u64,
    pub transactions: Vec<Transaction>,
}

#[async_trait]
pub trait TransactionFeed: Send + Sync {
    /// `count` records of fiscal year `fiscal_year`, starting at the 1-based
    /// record `offset`.
    async fn fetch_page(
        &self,
        fiscal_year: i32,
        offset: u64,
        count: u64,
    ) -> Result<FeedPage, FeedError>;
}

#[derive(Debug, Clone)]
pub struct CheckbookFeed {
    http: Arc<HttpFetcher>,
    api_url: String,
    run_id: Uuid,
}

impl CheckbookFeed {
    pub fn new(http: Arc<HttpFetcher>, api_url: impl Into<String>, run_id: Uuid) -> Self {
        Self {
            http,
            api_url: api_url.into(),
            run_id,
        }
    }
}

#[async_trait]
impl TransactionFeed for CheckbookFeed {
    async fn fetch_page(
        &self,
        fiscal_year: i32,
        offset: u64,
        count: u64,
    ) -> Result<FeedPage, FeedError> {
        let body = spending_request_xml(fiscal_year, offset, count);
        let resp = self
            .http
            .post(
                self.run_id,
                Endpoint::Feed,
                &self.api_url,
                "application/xml",
                body.as_bytes(),
            )
            .await?;
        let page = parse_spending_response(&resp.body)?;
        debug!(
            fiscal_year,
            offset,
            requested = count,
            received = page.transactions.len(),
            total = page.total_records,
            "feed page"
        );
        Ok(page)
    }
}

pub fn spending_request_xml(fiscal_year: i32, offset: u64, count: u64) -> String {
    let columns = TRANSACTION_COLUMNS
        .iter()
        .map(|c| format!("<column>{c}</column>"))
        .collect::<String>();
    format!(
        "<request>\
<type_of_data>Spending</type_of_data>\
<records_from>{offset}</records_from>\
<max_records>{count}</max_records>\
<search_criteria><criteria><name>fiscal_year</name><type>value</type><value>{fiscal_year}</value></criteria></search_criteria>\
<response_columns>{columns}</response_columns>\
</request>"
    )
}

/// Parse a spending response: `record_count`, the `status/result` verdict and
/// every `transaction` element. Unknown child elements are ignored.
pub fn parse_spending_response(xml: &[u8]) -> Result<FeedPage, FeedError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut total_records = None;
    let mut transactions = Vec::new();
    let mut current: Option<Transaction> = None;
    let mut element: Option<String> = None;
    let mut result: Option<String> = None;
    let mut messages: Vec<String> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if name == "transaction" {
                    current = Some(Transaction::default());
                }
                element = Some(name);
            }
            Ok(Event::Text(te)) => {
                let text = te
                    .unescape()
                    .map_err(|e| FeedError::Xml(e.to_string()))?
                    .into_owned();
                match element.as_deref() {
                    Some("record_count") => {
                        let count = text.trim().parse::<u64>().map_err(|_| {
                            FeedError::Xml(format!("record_count is not a number: {text}"))
                        })?;
                        total_records = Some(count);
                    }
                    Some("result") => result = Some(text),
                    Some("description") | Some("message") => messages.push(text),
                    Some(column) if TRANSACTION_COLUMNS.contains(&column) => {
                        if let Some(tx) = current.as_mut() {
                            tx.set_field(column, Some(text));
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"transaction" {
                    if let Some(tx) = current.take() {
                        transactions.push(tx);
                    }
                }
                element = None;
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(FeedError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    if result
        .as_deref()
        .is_some_and(|r| r.eq_ignore_ascii_case("failure"))
    {
        return Err(FeedError::Rejected(messages.join("; ")));
    }
    let total_records = total_records.ok_or(FeedError::MissingRecordCount)?;
    Ok(FeedPage {
        total_records,
        transactions,
    })
}

//! HTTP access to the two remote collaborators: the spending feed and the
//! remote partition bucket. Each endpoint gets its own concurrency limit and
//! transient failures are retried with capped exponential backoff.

use std::fmt;
use std::time::Duration;

use anyhow::Context;
use reqwest::StatusCode;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Paged XML spending API.
    Feed,
    /// Manifests and parquet objects under the remote partition root.
    Columnar,
}

impl Endpoint {
    pub fn as_str(self) -> &'static str {
        match self {
            Endpoint::Feed => "feed",
            Endpoint::Columnar => "columnar",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Throttling and server-side failures are worth another attempt.
pub fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

pub fn is_transient_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl BackoffPolicy {
    /// Delay before retry number `retry` (zero-based), or `None` once the
    /// retry budget is spent.
    pub fn next_delay(&self, retry: usize) -> Option<Duration> {
        if retry >= self.max_retries {
            return None;
        }
        let factor = 1u32.checked_shl(retry as u32).unwrap_or(u32::MAX);
        Some(self.base_delay.saturating_mul(factor).min(self.max_delay))
    }
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: Option<String>,
    /// The feed is paged sequentially; more than one in flight only adds load.
    pub feed_concurrency: usize,
    pub columnar_concurrency: usize,
    pub backoff: BackoffPolicy,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: None,
            feed_concurrency: 1,
            columnar_concurrency: 4,
            backoff: BackoffPolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub status: StatusCode,
    pub final_url: String,
    pub body: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("http status {status} for {url}")]
    Status { status: u16, url: String },
    #[error("http client is shutting down")]
    Closed,
}

/// One logical request, rebuilt for every attempt.
#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    pub endpoint: Endpoint,
    pub url: &'a str,
    /// `(content type, body)` for a POST; `None` for a GET.
    pub payload: Option<(&'a str, &'a [u8])>,
}

enum AttemptOutcome {
    Done(FetchedResponse),
    Transient(String, FetchError),
    Failed(FetchError),
}

#[derive(Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    feed_limit: Semaphore,
    columnar_limit: Semaphore,
    backoff: BackoffPolicy,
}

impl HttpFetcher {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        let client = builder.build().context("building reqwest client")?;

        Ok(Self {
            client,
            feed_limit: Semaphore::new(config.feed_concurrency.max(1)),
            columnar_limit: Semaphore::new(config.columnar_concurrency.max(1)),
            backoff: config.backoff,
        })
    }

    fn limit(&self, endpoint: Endpoint) -> &Semaphore {
        match endpoint {
            Endpoint::Feed => &self.feed_limit,
            Endpoint::Columnar => &self.columnar_limit,
        }
    }

    pub async fn get(
        &self,
        run_id: Uuid,
        endpoint: Endpoint,
        url: &str,
    ) -> Result<FetchedResponse, FetchError> {
        self.send(
            run_id,
            FetchRequest {
                endpoint,
                url,
                payload: None,
            },
        )
        .await
    }

    pub async fn post(
        &self,
        run_id: Uuid,
        endpoint: Endpoint,
        url: &str,
        content_type: &str,
        body: &[u8],
    ) -> Result<FetchedResponse, FetchError> {
        self.send(
            run_id,
            FetchRequest {
                endpoint,
                url,
                payload: Some((content_type, body)),
            },
        )
        .await
    }

    pub async fn send(
        &self,
        run_id: Uuid,
        request: FetchRequest<'_>,
    ) -> Result<FetchedResponse, FetchError> {
        let method = if request.payload.is_some() { "POST" } else { "GET" };
        let span = info_span!(
            "http_fetch",
            %run_id,
            endpoint = %request.endpoint,
            url = request.url,
            method
        );
        self.send_with_retries(request).instrument(span).await
    }

    async fn send_with_retries(&self, request: FetchRequest<'_>) -> Result<FetchedResponse, FetchError> {
        let _permit = self
            .limit(request.endpoint)
            .acquire()
            .await
            .map_err(|_| FetchError::Closed)?;

        let mut retry = 0;
        loop {
            match self.attempt(&request).await {
                AttemptOutcome::Done(resp) => return Ok(resp),
                AttemptOutcome::Failed(err) => return Err(err),
                AttemptOutcome::Transient(reason, err) => {
                    let Some(delay) = self.backoff.next_delay(retry) else {
                        return Err(err);
                    };
                    warn!(%reason, retry, delay_ms = delay.as_millis() as u64, "transient failure; retrying");
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
            }
        }
    }

    async fn attempt(&self, request: &FetchRequest<'_>) -> AttemptOutcome {
        let builder = match request.payload {
            None => self.client.get(request.url),
            Some((content_type, body)) => self
                .client
                .post(request.url)
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(body.to_vec()),
        };

        let resp = match builder.send().await {
            Ok(resp) => resp,
            Err(err) if is_transient_error(&err) => {
                return AttemptOutcome::Transient(err.to_string(), FetchError::Transport(err))
            }
            Err(err) => return AttemptOutcome::Failed(FetchError::Transport(err)),
        };

        let status = resp.status();
        let final_url = resp.url().to_string();
        if !status.is_success() {
            let err = FetchError::Status {
                status: status.as_u16(),
                url: final_url,
            };
            return if is_transient_status(status) {
                AttemptOutcome::Transient(format!("status {}", status.as_u16()), err)
            } else {
                AttemptOutcome::Failed(err)
            };
        }

        match resp.bytes().await {
            Ok(body) => {
                debug!(status = status.as_u16(), bytes = body.len(), "fetched");
                AttemptOutcome::Done(FetchedResponse {
                    status,
                    final_url,
                    body: body.to_vec(),
                })
            }
            Err(err) => AttemptOutcome::Failed(FetchError::Transport(err)),
        }
    }
}

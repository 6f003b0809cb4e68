//! Source image fetching.
//!
//! # Responsibilities
//! - Open a streaming GET to the source URL
//! - Reject non-HTTP(S) URLs and non-success statuses
//! - Reject sources whose declared length exceeds the limit
//!
//! # Design Decisions
//! - The body is handed over as a stream, never buffered here
//! - Total and connect timeouts are set on the client; a timed-out read
//!   surfaces as [`FetchError::Timeout`] from the stream itself

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::{BoxStream, StreamExt};
use reqwest::Client;
use thiserror::Error;

use crate::config::FetchConfig;

/// A stream of source image bytes.
pub type ByteStream = BoxStream<'static, Result<Bytes, FetchError>>;

/// Errors that can occur while fetching a source image.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("invalid source URL: {0}")]
    InvalidUrl(String),

    #[error("source request timed out")]
    Timeout,

    #[error("source request failed: {0}")]
    Request(String),

    #[error("source responded with status {0}")]
    Status(u16),

    #[error("source image too large: {size} bytes (max {max})")]
    TooLarge { size: u64, max: u64 },

    #[error("source stream failed: {0}")]
    Stream(String),
}

impl FetchError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::InvalidUrl(_) => "invalid_url",
            FetchError::Timeout => "timeout",
            FetchError::Request(_) => "request",
            FetchError::Status(_) => "status",
            FetchError::TooLarge { .. } => "too_large",
            FetchError::Stream(_) => "stream",
        }
    }
}

/// Streams bytes from a URL.
pub trait SourceFetcher: Send + Sync + 'static {
    fn fetch_stream(&self, url: &str) -> impl Future<Output = Result<ByteStream, FetchError>> + Send;
}

/// [`SourceFetcher`] over `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpSourceFetcher {
    client: Client,
    max_source_bytes: u64,
}

impl HttpSourceFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| FetchError::Request(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_source_bytes: config.max_source_bytes,
        })
    }
}

/// Parse `raw` and accept only `http` and `https` URLs.
pub fn parse_source_url(raw: &str) -> Result<url::Url, FetchError> {
    let url = url::Url::parse(raw).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(FetchError::InvalidUrl(format!(
            "unsupported scheme '{}', expected http or https",
            other
        ))),
    }
}

fn map_reqwest_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else if e.is_body() || e.is_decode() {
        FetchError::Stream(e.to_string())
    } else {
        FetchError::Request(e.to_string())
    }
}

impl SourceFetcher for HttpSourceFetcher {
    async fn fetch_stream(&self, url: &str) -> Result<ByteStream, FetchError> {
        let url = parse_source_url(url)?;

        tracing::debug!(url = %url, "Fetching source image");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(url = %url, status = %status, "Source responded with non-success status");
            return Err(FetchError::Status(status.as_u16()));
        }

        if let Some(length) = response.content_length() {
            if length > self.max_source_bytes {
                return Err(FetchError::TooLarge {
                    size: length,
                    max: self.max_source_bytes,
                });
            }
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(map_reqwest_error))
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_source_url_schemes() {
        assert!(parse_source_url("https://example.com/a.png").is_ok());
        assert!(parse_source_url("http://127.0.0.1:8080/a.png").is_ok());
        assert!(matches!(
            parse_source_url("file:///etc/passwd"),
            Err(FetchError::InvalidUrl(_))
        ));
        assert!(matches!(parse_source_url("a.png"), Err(FetchError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_invalid_url_fails_before_network() {
        let fetcher = HttpSourceFetcher::new(&FetchConfig::default()).unwrap();
        let result = fetcher.fetch_stream("ftp://example.com/a.png").await;
        assert!(matches!(result, Err(FetchError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_connection_refused_is_request_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let fetcher = HttpSourceFetcher::new(&FetchConfig::default()).unwrap();
        let result = fetcher.fetch_stream(&format!("http://{}/a.png", addr)).await;
        assert!(matches!(result, Err(FetchError::Request(_))));
    }
}

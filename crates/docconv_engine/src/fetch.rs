use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::StatusCode;

use crate::{FetchError, FetchFailure, FetchMetadata, FetchOutput, FetchResponse};

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub request_timeout: Duration,
    /// Redirect hops the converter follows, each re-checked against the SSRF guard.
    pub redirect_limit: usize,
    pub max_bytes: u64,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(5),
            redirect_limit: 10,
            max_bytes: 5 * 1024 * 1024,
            user_agent: concat!("docconv/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// One GET, no redirect following.
    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError>;
}

/// HTTP fetcher around one shared client; safe to use from many workers.
/// The client never follows redirects on its own.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
    max_bytes: u64,
}

impl ReqwestFetcher {
    pub fn new(settings: &FetchSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(settings.user_agent.as_str())
            .build()
            .map_err(|err| FetchError::new(FetchFailure::Network, err.to_string()))?;
        Ok(Self {
            client,
            max_bytes: settings.max_bytes,
        })
    }

    fn too_large(&self, url: &str, actual: u64) -> FetchError {
        FetchError::new(
            FetchFailure::TooLarge {
                max_bytes: self.max_bytes,
                actual: Some(actual),
            },
            format!(
                "failed to read body of {url}: response exceeds {} bytes",
                self.max_bytes
            ),
        )
    }
}

#[async_trait::async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| map_reqwest_error(url, err))?;

        let status = response.status();
        if status.is_redirection() {
            if let Some(location) = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
            {
                return Ok(FetchResponse::Redirect {
                    location: location.trim().to_string(),
                });
            }
        }
        if status != StatusCode::OK {
            return Err(FetchError::new(
                FetchFailure::HttpStatus(status.as_u16()),
                format!("failed to fetch URL {url}: HTTP status {}", status.as_u16()),
            ));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.max_bytes {
                return Err(self.too_large(url, content_len));
            }
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        // Content-Length can be absent or wrong, so the cap is enforced on the stream too.
        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|err| map_reqwest_error(url, err))?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.max_bytes {
                return Err(self.too_large(url, next_len));
            }
            bytes.extend_from_slice(&chunk);
        }

        let metadata = FetchMetadata {
            url: url.to_string(),
            final_url,
            content_type,
            byte_len: bytes.len() as u64,
        };

        Ok(FetchResponse::Page(FetchOutput { bytes, metadata }))
    }
}

fn map_reqwest_error(url: &str, err: reqwest::Error) -> FetchError {
    let message = format!("failed to fetch URL {url}: {err}");
    if err.is_timeout() {
        return FetchError::new(FetchFailure::Timeout, message);
    }
    FetchError::new(FetchFailure::Network, message)
}

//! Document fetching over HTTP.

use crate::config::DownloadConfig;
use crate::error::{DownloadError, Error, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

/// Fetches the body of one document
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// GET `url` and return the response body
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// [`DocumentFetcher`] backed by a shared `reqwest` client
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a client carrying the session headers and per-request timeout
    pub fn new(config: &DownloadConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                Error::config("download.headers", format!("invalid header name '{name}': {e}"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                Error::config("download.headers", format!("invalid value for '{name}': {e}"))
            })?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let fetch_failed = |reason: String| {
            Error::Download(DownloadError::FetchFailed {
                url: url.to_string(),
                reason,
            })
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_failed(format!("server returned status {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| fetch_failed(e.to_string()))?;
        Ok(body.to_vec())
    }
}

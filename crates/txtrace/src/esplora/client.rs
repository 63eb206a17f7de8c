//! HTTP client for Esplora `GET /tx/{txid}`.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;

use super::{ApiSource, EsploraTx, FetchError, TxLookup, TxStatus, CUSTOM_SOURCE_NAME};
use crate::error::{Error, Result};
use crate::txid::Txid;

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

const USER_AGENT_VALUE: &str = concat!("txtrace/", env!("CARGO_PKG_VERSION"));

/// Esplora REST client.
#[derive(Debug, Clone)]
pub struct EsploraClient {
    client: reqwest::Client,
    base_url: String,
    source_name: String,
}

impl EsploraClient {
    /// Create a client for one of the preset endpoints.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(source: ApiSource, timeout: Duration) -> Result<Self> {
        Self::build(source.base_url(), source.name(), timeout)
    }

    /// Create a client for a custom Esplora deployment.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self> {
        Self::build(base_url, CUSTOM_SOURCE_NAME, timeout)
    }

    fn build(base_url: &str, source_name: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .gzip(true)
            .build()
            .map_err(Error::HttpClient)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            source_name: source_name.to_string(),
        })
    }

    /// The base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of the transaction endpoint for `txid`.
    #[must_use]
    pub fn tx_url(&self, txid: &Txid) -> String {
        format!("{}/tx/{}", self.base_url, txid)
    }
}

fn classify(err: &reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout(err.to_string())
    } else if err.is_connect() || err.is_request() {
        FetchError::Connect(err.to_string())
    } else if err.is_decode() {
        FetchError::Decode(err.to_string())
    } else if let Some(status) = err.status() {
        FetchError::Status(status.as_u16())
    } else {
        FetchError::Other(err.to_string())
    }
}

#[async_trait::async_trait]
impl TxLookup for EsploraClient {
    fn source_name(&self) -> &str {
        &self.source_name
    }

    async fn fetch_status(&self, txid: &Txid) -> std::result::Result<TxStatus, FetchError> {
        let url = self.tx_url(txid);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| classify(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let tx: EsploraTx = response.json().await.map_err(|e| classify(&e))?;
        Ok(tx.status.unwrap_or_default())
    }
}

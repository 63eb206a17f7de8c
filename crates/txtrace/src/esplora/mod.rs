//! Esplora-compatible block explorer access.
//!
//! This module defines the [`TxLookup`] seam the enrichment pipeline talks
//! to, the HTTP implementation in [`client`], and the retry and pacing
//! helpers wrapped around it.

pub mod client;
pub mod rate_limit;
pub mod retry;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::error::Error;
use crate::txid::Txid;

pub use client::EsploraClient;
pub use rate_limit::RateLimiter;
pub use retry::{lookup_with_retry, RetryPolicy};

/// Label written to `api_source` when a custom base URL is in use.
pub const CUSTOM_SOURCE_NAME: &str = "custom";

/// Preset Esplora endpoints (Bitcoin mainnet).
///
/// Deserializing goes through [`FromStr`], so config files and environment
/// variables accept the same spellings as the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiSource {
    /// `https://blockstream.info/api`
    #[default]
    Blockstream,
    /// `https://mempool.space/api`
    Mempool,
}

impl ApiSource {
    /// All presets.
    pub const ALL: [ApiSource; 2] = [ApiSource::Blockstream, ApiSource::Mempool];

    /// Base URL of the preset.
    #[must_use]
    pub fn base_url(self) -> &'static str {
        match self {
            Self::Blockstream => "https://blockstream.info/api",
            Self::Mempool => "https://mempool.space/api",
        }
    }

    /// Name written to the `api_source` column.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Blockstream => "blockstream",
            Self::Mempool => "mempool",
        }
    }
}

impl fmt::Display for ApiSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ApiSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|source| source.name() == wanted)
            .ok_or_else(|| Error::UnknownApiSource {
                given: s.to_string(),
                valid: Self::ALL.iter().map(|source| source.name()).collect(),
            })
    }
}

impl<'de> Deserialize<'de> for ApiSource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// The `status` object of an Esplora transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct TxStatus {
    /// Whether the transaction is in a block.
    #[serde(default)]
    pub confirmed: bool,
    /// Height of the confirming block.
    #[serde(default)]
    pub block_height: Option<u64>,
    /// Hash of the confirming block.
    #[serde(default)]
    pub block_hash: Option<String>,
    /// Timestamp of the confirming block (unix seconds).
    #[serde(default)]
    pub block_time: Option<i64>,
}

/// The subset of an Esplora `GET /tx/{txid}` body that is read.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EsploraTx {
    /// Confirmation status; absent bodies count as unconfirmed.
    #[serde(default)]
    pub status: Option<TxStatus>,
}

/// A single failed request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The server answered with a non-success status.
    #[error("HTTP {0}")]
    Status(u16),

    /// The connection could not be established or broke.
    #[error("connection error: {0}")]
    Connect(String),

    /// The request timed out.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// Any other failure.
    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// Short name of the failure kind, used in `Unexpected:` messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Status(_) => "Status",
            Self::Connect(_) => "Connect",
            Self::Timeout(_) => "Timeout",
            Self::Decode(_) => "Decode",
            Self::Other(_) => "Other",
        }
    }
}

/// Something that can fetch the confirmation status of a transaction.
#[async_trait::async_trait]
pub trait TxLookup: Send + Sync {
    /// Name written to the `api_source` column.
    fn source_name(&self) -> &str;

    /// Fetch the status of one transaction.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] describing why the request failed.
    async fn fetch_status(&self, txid: &Txid) -> Result<TxStatus, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_source_from_str() {
        assert_eq!(
            "blockstream".parse::<ApiSource>().unwrap(),
            ApiSource::Blockstream
        );
        assert_eq!(" Mempool ".parse::<ApiSource>().unwrap(), ApiSource::Mempool);
    }

    #[test]
    fn test_api_source_unknown() {
        let err = "electrum".parse::<ApiSource>().unwrap_err();
        assert!(matches!(err, Error::UnknownApiSource { .. }));
        assert!(err.to_string().contains("mempool"));
    }

    #[test]
    fn test_api_source_base_urls() {
        assert_eq!(
            ApiSource::Blockstream.base_url(),
            "https://blockstream.info/api"
        );
        assert_eq!(ApiSource::Mempool.base_url(), "https://mempool.space/api");
    }

    #[test]
    fn test_api_source_default_and_display() {
        assert_eq!(ApiSource::default(), ApiSource::Blockstream);
        assert_eq!(ApiSource::Mempool.to_string(), "mempool");
    }

    #[test]
    fn test_api_source_serde_lowercase() {
        let json = serde_json::to_string(&ApiSource::Mempool).unwrap();
        assert_eq!(json, "\"mempool\"");
        let source: ApiSource = serde_json::from_str("\"blockstream\"").unwrap();
        assert_eq!(source, ApiSource::Blockstream);
    }

    #[test]
    fn test_api_source_deserialize_like_from_str() {
        let source: ApiSource = serde_json::from_str("\" MEMPOOL \"").unwrap();
        assert_eq!(source, ApiSource::Mempool);

        let err = serde_json::from_str::<ApiSource>("\"electrum\"").unwrap_err();
        assert!(err.to_string().contains("electrum"));
    }

    #[test]
    fn test_decode_confirmed_tx() {
        let body = r#"{
            "txid": "f4184fc596403b9d638783cf57adfe4c75c605f6356fbc91338530e9831e9e16",
            "version": 1,
            "fee": 0,
            "status": {
                "confirmed": true,
                "block_height": 170,
                "block_hash": "00000000d1145790a8694403d4063f323d499e655c83426834d4ce2f8dd4a2ee",
                "block_time": 1231731025
            }
        }"#;
        let tx: EsploraTx = serde_json::from_str(body).unwrap();
        let status = tx.status.unwrap();
        assert!(status.confirmed);
        assert_eq!(status.block_height, Some(170));
        assert_eq!(status.block_time, Some(1_231_731_025));
    }

    #[test]
    fn test_decode_unconfirmed_tx() {
        let tx: EsploraTx = serde_json::from_str(r#"{"status": {"confirmed": false}}"#).unwrap();
        let status = tx.status.unwrap();
        assert!(!status.confirmed);
        assert!(status.block_height.is_none());
    }

    #[test]
    fn test_decode_missing_status() {
        let tx: EsploraTx = serde_json::from_str(r#"{"txid": "abc"}"#).unwrap();
        assert!(tx.status.is_none());
    }

    #[test]
    fn test_fetch_error_kind() {
        assert_eq!(FetchError::Status(500).kind(), "Status");
        assert_eq!(FetchError::Decode("bad".into()).kind(), "Decode");
        assert_eq!(FetchError::Status(503).to_string(), "HTTP 503");
    }
}

//! Normalized Bitcoin transaction ids.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A transaction id, trimmed and lowercased.
///
/// Construction only normalizes; it does not require the id to be
/// well-formed, so that malformed ids from a dataset can still be reported
/// back in the results file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Txid(String);

fn txid_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9a-f]{64}$").expect("static txid pattern is valid"))
}

impl Txid {
    /// Normalize a raw cell value.
    ///
    /// Returns `None` when nothing is left after trimming.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_lowercase()))
        }
    }

    /// Whether this is a 64-character hex id.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        txid_regex().is_match(&self.0)
    }

    /// The normalized id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened form for log lines.
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..16).unwrap_or(&self.0)
    }
}

impl fmt::Display for Txid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Txid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TXID: &str = "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b";

    #[test]
    fn test_parse_trims_and_lowercases() {
        let raw = format!("  {}\t", TXID.to_uppercase());
        let txid = Txid::parse(&raw).unwrap();
        assert_eq!(txid.as_str(), TXID);
    }

    #[test]
    fn test_parse_rejects_blank() {
        assert!(Txid::parse("").is_none());
        assert!(Txid::parse("   ").is_none());
    }

    #[test]
    fn test_well_formed() {
        assert!(Txid::parse(TXID).unwrap().is_well_formed());
        assert!(!Txid::parse("deadbeef").unwrap().is_well_formed());
        assert!(!Txid::parse(&format!("{}zz", &TXID[..62]))
            .unwrap()
            .is_well_formed());
    }

    #[test]
    fn test_short() {
        let txid = Txid::parse(TXID).unwrap();
        assert_eq!(txid.short(), "4a5e1e4baab89f3a");
        assert_eq!(Txid::parse("abc").unwrap().short(), "abc");
    }

    #[test]
    fn test_serde_transparent() {
        let txid = Txid::parse(TXID).unwrap();
        let json = serde_json::to_string(&txid).unwrap();
        assert_eq!(json, format!("\"{TXID}\""));
    }
}

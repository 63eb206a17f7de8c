//! Exact BTC quantities.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Satoshis per bitcoin.
pub const SATS_PER_BTC: u64 = 100_000_000;

const DECIMALS: usize = 8;

/// Why an amount string was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseAmountError {
    /// Nothing to parse.
    #[error("empty amount")]
    Empty,
    /// Negative quantities are not transfers.
    #[error("negative amount")]
    Negative,
    /// Not a plain decimal number.
    #[error("not a decimal number")]
    Invalid,
    /// Larger than `u64::MAX` satoshis.
    #[error("amount too large")]
    Overflow,
}

/// A BTC quantity held as whole satoshis.
///
/// Parsing accepts plain decimals such as `14.994`, `0.5`, `.5` or `3.`.
/// Digits past the eighth decimal place are rounded half-up to the nearest
/// satoshi; spreadsheet exports often carry binary float noise there.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(u64);

impl Amount {
    /// Zero BTC.
    pub const ZERO: Amount = Amount(0);

    /// Build from satoshis.
    #[must_use]
    pub const fn from_sats(sats: u64) -> Self {
        Self(sats)
    }

    /// Value in satoshis.
    #[must_use]
    pub const fn sats(self) -> u64 {
        self.0
    }

    /// Sum, or `None` on overflow.
    #[must_use]
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Absolute difference.
    #[must_use]
    pub fn abs_diff(self, other: Amount) -> Amount {
        Amount(self.0.abs_diff(other.0))
    }
}

impl FromStr for Amount {
    type Err = ParseAmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseAmountError::Empty);
        }
        if s.starts_with('-') {
            return Err(ParseAmountError::Negative);
        }

        let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
        if whole.is_empty() && frac.is_empty() {
            return Err(ParseAmountError::Invalid);
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(ParseAmountError::Invalid);
        }

        let whole_sats = if whole.is_empty() {
            0
        } else {
            whole
                .parse::<u64>()
                .map_err(|_| ParseAmountError::Overflow)?
                .checked_mul(SATS_PER_BTC)
                .ok_or(ParseAmountError::Overflow)?
        };

        let (kept, rest) = frac.split_at(frac.len().min(DECIMALS));
        let mut frac_sats: u64 = 0;
        for digit in kept.bytes() {
            frac_sats = frac_sats * 10 + u64::from(digit - b'0');
        }
        for _ in kept.len()..DECIMALS {
            frac_sats *= 10;
        }
        if rest.as_bytes().first().is_some_and(|d| *d >= b'5') {
            frac_sats += 1;
        }

        whole_sats
            .checked_add(frac_sats)
            .map(Amount)
            .ok_or(ParseAmountError::Overflow)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:08}",
            self.0 / SATS_PER_BTC,
            self.0 % SATS_PER_BTC
        )
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

//! Log sequence numbers.
//!
//! An [`Lsn`] is a byte position in the logical WAL stream. Its canonical text form is two
//! upper-case hexadecimal numbers separated by a slash, `"<high>/<low>"`, where `high` are the
//! upper 32 bits and `low` the lower 32 bits of the position. This is the form used in history
//! files, backup sentinels and on the command line.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing an [`Lsn`] from text.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LsnParseError {
    /// The input does not contain the `/` separator.
    #[error("lsn {0:?} is missing the '/' separator")]
    MissingSeparator(String),

    /// One of the halves is not a valid 32-bit hexadecimal number.
    #[error("lsn {0:?} contains an invalid hexadecimal component")]
    InvalidHex(String),
}

/// A log sequence number, i.e. a byte offset into the WAL stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Lsn(pub u64);

impl Lsn {
    /// The zero position.
    pub const ZERO: Lsn = Lsn(0);

    /// Returns the raw byte position.
    pub fn get(self) -> u64 {
        self.0
    }

    /// Returns the position one byte before this one, or `None` at zero.
    pub fn checked_prev(self) -> Option<Lsn> {
        self.0.checked_sub(1).map(Lsn)
    }
}

impl From<u64> for Lsn {
    fn from(value: u64) -> Self {
        Lsn(value)
    }
}

impl fmt::Display for Lsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}/{:X}", self.0 >> 32, self.0 & 0xFFFF_FFFF)
    }
}

impl FromStr for Lsn {
    type Err = LsnParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (high, low) = s
            .split_once('/')
            .ok_or_else(|| LsnParseError::MissingSeparator(s.to_owned()))?;

        let parse_half = |half: &str| {
            if half.is_empty() || half.len() > 8 || !half.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(LsnParseError::InvalidHex(s.to_owned()));
            }
            u32::from_str_radix(half, 16).map_err(|_| LsnParseError::InvalidHex(s.to_owned()))
        };

        let high = parse_half(high)?;
        let low = parse_half(low)?;
        Ok(Lsn((u64::from(high) << 32) | u64::from(low)))
    }
}

impl Serialize for Lsn {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Lsn {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

//! Identifier generation and time helpers.
//!
//! Trace, span and event identifiers are random byte arrays rendered as
//! lowercase hex, matching the OTLP-JSON wire encoding. Session identifiers
//! are human-scannable `<epoch-millis>-<hex>` tokens.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Error returned when parsing a hex identifier fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid hex identifier: expected {expected} hex chars")]
pub struct ParseIdError {
    expected: usize,
}

fn decode_hex<const N: usize>(s: &str) -> Result<[u8; N], ParseIdError> {
    let err = ParseIdError { expected: N * 2 };
    if s.len() != N * 2 {
        return Err(err);
    }
    let mut bytes = [0u8; N];
    for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
        let hi = (chunk[0] as char).to_digit(16).ok_or(err.clone())?;
        let lo = (chunk[1] as char).to_digit(16).ok_or(err.clone())?;
        bytes[i] = ((hi << 4) | lo) as u8;
    }
    Ok(bytes)
}

fn write_hex(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    for b in bytes {
        write!(f, "{b:02x}")?;
    }
    Ok(())
}

macro_rules! hex_id {
    ($(#[$doc:meta])* $name:ident, $len:expr) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name([u8; $len]);

        impl $name {
            /// Generates a fresh random identifier.
            pub fn generate() -> Self {
                Self(rand::random::<[u8; $len]>())
            }

            /// Returns the raw identifier bytes.
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write_hex(f, &self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "("))?;
                write_hex(f, &self.0)?;
                write!(f, ")")
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                decode_hex::<$len>(s).map(Self)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_id!(
    /// A 16-byte trace identifier (32 hex characters on the wire).
    TraceId,
    16
);

hex_id!(
    /// An 8-byte span identifier (16 hex characters on the wire).
    SpanId,
    8
);

hex_id!(
    /// A 16-byte identifier for captured exceptions and messages.
    EventId,
    16
);

/// Generates a session identifier of the form `<epoch-millis>-<8 hex chars>`.
pub fn generate_session_id() -> String {
    format!("{}-{}", Utc::now().timestamp_millis(), random_hex(8))
}

/// Returns `len` random lowercase hex characters.
pub fn random_hex(len: usize) -> String {
    const HEX: &[u8] = b"0123456789abcdef";
    let mut rng = rand::thread_rng();
    (0..len).map(|_| HEX[rng.gen_range(0..16)] as char).collect()
}

/// Returns `len` random alphanumeric characters, for opaque device tokens.
pub fn random_token(len: usize) -> String {
    use rand::distributions::Alphanumeric;
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect()
}

/// Computes the span duration in whole milliseconds.
///
/// Negative intervals (clock skew, caller error) clamp to zero.
pub fn duration_ms(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end - start).num_milliseconds().max(0)
}

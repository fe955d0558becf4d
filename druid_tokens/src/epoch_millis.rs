//! Serde helpers for timestamps carried as epoch milliseconds
//!
//! The identity backend exchanges every date as milliseconds since the Unix
//! epoch. Internally, times are [`UnixTime`] seconds; sub-second precision
//! is truncated on decode.
//!
//! ```
//! use aliri_clock::UnixTime;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Stamp {
//!     #[serde(with = "druid_tokens::epoch_millis")]
//!     at: UnixTime,
//! }
//!
//! let stamp: Stamp = serde_json::from_str(r#"{"at":1700000000999}"#).unwrap();
//! assert_eq!(stamp.at, UnixTime(1_700_000_000));
//! ```

use aliri_clock::UnixTime;
use serde::{Deserialize, Deserializer, Serializer};

/// Serializes a time as epoch milliseconds
pub fn serialize<S: Serializer>(time: &UnixTime, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(time.0.saturating_mul(1000))
}

/// Deserializes epoch milliseconds into a time
pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<UnixTime, D::Error> {
    let millis = i64::deserialize(deserializer)?;
    Ok(from_millis(millis))
}

fn from_millis(millis: i64) -> UnixTime {
    // Dates before the epoch are clamped; they are always in the past anyway.
    UnixTime(u64::try_from(millis).unwrap_or(0) / 1000)
}

/// Optional variant, for use with `#[serde(default, with = "epoch_millis::option")]`
pub mod option {
    use super::*;

    /// Serializes an optional time as epoch milliseconds or `null`
    pub fn serialize<S: Serializer>(
        time: &Option<UnixTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match time {
            Some(time) => super::serialize(time, serializer),
            None => serializer.serialize_none(),
        }
    }

    /// Deserializes optional epoch milliseconds
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<UnixTime>, D::Error> {
        Ok(Option::<i64>::deserialize(deserializer)?.map(from_millis))
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Optional {
        #[serde(default, with = "super::option", skip_serializing_if = "Option::is_none")]
        at: Option<UnixTime>,
    }

    #[test]
    fn negative_millis_clamp_to_epoch() {
        assert_eq!(from_millis(-5_000), UnixTime(0));
    }

    #[test]
    fn missing_optional_field_decodes_as_none() {
        let decoded: Optional = serde_json::from_str("{}").unwrap();
        assert_eq!(decoded, Optional { at: None });
    }

    #[test]
    fn optional_field_is_written_in_millis() {
        let encoded = serde_json::to_string(&Optional {
            at: Some(UnixTime(1_700_000_000)),
        })
        .unwrap();
        assert_eq!(encoded, r#"{"at":1700000000000}"#);
    }
}

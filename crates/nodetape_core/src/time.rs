//! Time types for nodetape.
//!
//! Wall-clock timestamps are metadata only. Elapsed time is always measured
//! with a monotonic clock and stored as fractional seconds in artifacts.

use chrono::{DateTime, SecondsFormat, Utc};
use std::time::Duration;

/// Wall clock timestamp (UTC)
pub type Timestamp = DateTime<Utc>;

/// Current timestamp
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// RFC 3339 text with microsecond precision and a `Z` suffix
#[must_use]
pub fn to_rfc3339(ts: &Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse RFC 3339 text into a UTC timestamp
///
/// # Errors
///
/// Returns error if the text is not RFC 3339
pub fn parse_rfc3339(s: &str) -> Result<Timestamp, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

/// Add an elapsed duration to a timestamp, saturating on overflow
#[must_use]
pub fn advance(ts: &Timestamp, elapsed: Duration) -> Timestamp {
    chrono::Duration::from_std(elapsed)
        .ok()
        .and_then(|d| ts.checked_add_signed(d))
        .unwrap_or(*ts)
}

/// Serde adapter storing a `Duration` as fractional seconds
pub mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serialize as `f64` seconds
    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    /// Deserialize from `f64` seconds; negative or non-finite values become zero
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO))
    }
}

/// Serde adapter storing an `Option<Duration>` as optional fractional seconds
pub mod opt_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serialize as `f64` seconds or null
    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&d.as_secs_f64()),
            None => s.serialize_none(),
        }
    }

    /// Deserialize from optional `f64` seconds
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let secs = Option::<f64>::deserialize(d)?;
        Ok(secs.map(|s| Duration::try_from_secs_f64(s).unwrap_or(Duration::ZERO)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Timed {
        #[serde(with = "secs")]
        elapsed: Duration,
        #[serde(with = "opt_secs", default)]
        limit: Option<Duration>,
    }

    #[test]
    fn test_rfc3339_roundtrip() {
        let ts = Utc.with_ymd_and_hms(2025, 7, 8, 17, 0, 0).unwrap();
        let text = to_rfc3339(&ts);
        assert_eq!(text, "2025-07-08T17:00:00.000000Z");
        assert_eq!(parse_rfc3339(&text).unwrap(), ts);
    }

    #[test]
    fn test_parse_offset_normalizes_to_utc() {
        let parsed = parse_rfc3339("2025-07-08T19:00:00+02:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 7, 8, 17, 0, 0).unwrap());
    }

    #[test]
    fn test_advance() {
        let ts = Utc.with_ymd_and_hms(2025, 7, 8, 17, 0, 0).unwrap();
        let later = advance(&ts, Duration::from_millis(1500));
        assert_eq!((later - ts).num_milliseconds(), 1500);
    }

    #[test]
    fn test_secs_adapter() {
        let timed = Timed {
            elapsed: Duration::from_millis(250),
            limit: Some(Duration::from_secs(5)),
        };
        let json = serde_json::to_string(&timed).unwrap();
        assert_eq!(json, r#"{"elapsed":0.25,"limit":5.0}"#);
        let back: Timed = serde_json::from_str(&json).unwrap();
        assert_eq!(back, timed);
    }

    #[test]
    fn test_secs_adapter_rejects_negative_as_zero() {
        let back: Timed = serde_json::from_str(r#"{"elapsed":-1.0}"#).unwrap();
        assert_eq!(back.elapsed, Duration::ZERO);
        assert_eq!(back.limit, None);
    }
}

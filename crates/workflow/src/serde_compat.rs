//! Serde helpers for the persisted JSON shape.
//!
//! Workflows are stored by other tooling that writes `null` for empty
//! slices, maps and pointers, writes unset selectors as empty objects, and
//! writes unset timestamps either as `""` or as the zero instant.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Zero instant written for an unset timestamp
pub(crate) const ZERO_TIME: &str = "0001-01-01T00:00:00Z";

/// Deserialize `null` as `T::default()`
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Serialize an empty slice or map as `null`, the way unset collections are
/// written by the other tooling
pub(crate) fn empty_as_null<S, C>(value: &C, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    C: Serialize,
    for<'a> &'a C: IntoIterator,
{
    if value.into_iter().next().is_none() {
        serializer.serialize_none()
    } else {
        value.serialize(serializer)
    }
}

pub(crate) mod optional_time {
    use super::*;

    pub(crate) fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(time) => serializer.serialize_str(&time.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            None => serializer.serialize_str(ZERO_TIME),
        }
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") | Some(ZERO_TIME) => Ok(None),
            Some(text) => parse_time(text).map(Some).map_err(serde::de::Error::custom),
        }
    }

    fn parse_time(text: &str) -> Result<DateTime<Utc>, String> {
        if let Ok(time) = DateTime::parse_from_rfc3339(text) {
            return Ok(time.with_timezone(&Utc));
        }

        // Record-store format: "2024-05-01 08:30:00.123Z"
        NaiveDateTime::parse_from_str(text.trim_end_matches('Z'), "%Y-%m-%d %H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|e| format!("invalid timestamp '{}': {}", text, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[derive(Debug, Serialize, Deserialize)]
    struct Stamped {
        #[serde(default, with = "optional_time")]
        at: Option<DateTime<Utc>>,
        #[serde(default, deserialize_with = "null_as_default", serialize_with = "empty_as_null")]
        tags: Vec<String>,
    }

    #[test]
    fn test_unset_forms() {
        for json in [
            r#"{"at": null, "tags": null}"#,
            r#"{"at": "", "tags": null}"#,
            r#"{"at": "0001-01-01T00:00:00Z"}"#,
            r#"{}"#,
        ] {
            let s: Stamped = serde_json::from_str(json).unwrap();
            assert!(s.at.is_none(), "{}", json);
            assert!(s.tags.is_empty(), "{}", json);
        }
    }

    #[test]
    fn test_time_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();

        let s: Stamped = serde_json::from_str(r#"{"at": "2024-05-01T08:30:00Z"}"#).unwrap();
        assert_eq!(s.at, Some(expected));

        let s: Stamped = serde_json::from_str(r#"{"at": "2024-05-01 08:30:00.000Z"}"#).unwrap();
        assert_eq!(s.at, Some(expected));

        let bad: Result<Stamped, _> = serde_json::from_str(r#"{"at": "yesterday"}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_unset_time_serializes_as_zero_instant() {
        let json = serde_json::to_string(&Stamped { at: None, tags: vec![] }).unwrap();
        assert_eq!(json, r#"{"at":"0001-01-01T00:00:00Z","tags":null}"#);
    }

    #[test]
    fn test_non_empty_collection_serializes_as_is() {
        let stamped = Stamped {
            at: None,
            tags: vec!["renew".to_string()],
        };
        let json = serde_json::to_string(&stamped).unwrap();
        assert_eq!(json, r#"{"at":"0001-01-01T00:00:00Z","tags":["renew"]}"#);
    }
}

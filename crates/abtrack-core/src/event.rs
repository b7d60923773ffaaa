use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Bucket used for stored records that carry no variant label.
pub const UNKNOWN_VARIANT: &str = "UNKNOWN";

/// The two event kinds accepted at write time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    LogImpression,
    LogClick,
}

impl EventAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LogImpression => "log_impression",
            Self::LogClick => "log_click",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "log_impression" => Some(Self::LogImpression),
            "log_click" => Some(Self::LogClick),
            _ => None,
        }
    }
}

/// Render a timestamp in the stored form: UTC, millisecond precision, `Z` suffix.
///
/// Every timestamp in the store has the same width, so lexicographic order
/// equals chronological order and range queries can compare strings.
pub fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an RFC 3339 / ISO-8601 timestamp with any offset into UTC.
pub fn parse_ts(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

mod ts_millis {
    use chrono::{DateTime, Utc};
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_ts(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_ts(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp: {raw}")))
    }
}

/// A validated impression or click, as written to the store.
///
/// Field names on the wire are camelCase to match what clients send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub user_id: String,
    /// Assigned by the writer, never taken from the client.
    #[serde(with = "ts_millis")]
    pub ts: DateTime<Utc>,
    pub experiment_id: String,
    pub variant: String,
    pub action: EventAction,
    /// Expiry in epoch seconds. Absent when expiry is disabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
}

/// A stored event as returned by a range query.
///
/// Everything except the index key is optional: rows written by older clients
/// or imported by hand may lack fields, and aggregation must tolerate them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub experiment_id: String,
    pub ts: String,
    pub user_id: Option<String>,
    pub variant: Option<String>,
    pub action: Option<String>,
}

impl From<&Event> for EventRecord {
    fn from(event: &Event) -> Self {
        Self {
            experiment_id: event.experiment_id.clone(),
            ts: format_ts(&event.ts),
            user_id: Some(event.user_id.clone()),
            variant: Some(event.variant.clone()),
            action: Some(event.action.as_str().to_string()),
        }
    }
}

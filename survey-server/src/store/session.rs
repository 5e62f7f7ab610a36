//! Session record, partial progress updates and the merge policy

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use survey_common::time::to_iso8601;

/// Maximum length of a sanitized participant id
pub const MAX_PARTICIPANT_ID_LEN: usize = 64;

/// One answered survey item, kept as an opaque JSON object
///
/// The front end sends at least `index`, `manifest_index`, `audio`, `label`,
/// `filename` and `response`, usually with `participant_id` and `timestamp`.
pub type ResponseRecord = Map<String, Value>;

/// Strip everything outside `[A-Za-z0-9_-]` and cap the length
///
/// The result is safe to use as a file name. An empty result means the id
/// is unusable.
pub fn sanitize_participant_id(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .take(MAX_PARTICIPANT_ID_LEN)
        .collect()
}

/// Persisted progress of one participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub participant_id: String,
    /// Presentation order of manifest items
    #[serde(default)]
    pub order: Option<Vec<i64>>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub responses: Vec<ResponseRecord>,
    /// Survey progress cursor
    #[serde(default)]
    pub index: i64,
    #[serde(default)]
    pub completed: bool,
    /// ISO-8601 text, kept verbatim from older records
    #[serde(default, deserialize_with = "optional_scalar_text")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "optional_scalar_text")]
    pub updated_at: Option<String>,
}

impl Session {
    /// Fresh session shell as written by `ensure`
    pub fn new(participant_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            created_at: Some(to_iso8601(&now)),
            updated_at: Some(to_iso8601(&now)),
            ..Self::blank(participant_id)
        }
    }

    /// Merge base used when nothing is stored yet; carries no timestamps
    pub fn blank(participant_id: impl Into<String>) -> Self {
        Self {
            participant_id: participant_id.into(),
            order: None,
            responses: Vec::new(),
            index: 0,
            completed: false,
            created_at: None,
            updated_at: None,
        }
    }
}

/// Text of a JSON scalar; numbers and booleans are stringified, `null` is `None`
fn scalar_text<E: serde::de::Error>(value: Value) -> Result<Option<String>, E> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(E::custom(format!("expected a string, found {other}"))),
    }
}

fn optional_scalar_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    scalar_text(Value::deserialize(deserializer)?)
}

/// Participant id as sent by clients: a string, or a number coerced to text
pub fn participant_id_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalar_text::<D::Error>(Value::deserialize(deserializer)?)?.unwrap_or_default())
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<ResponseRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<ResponseRecord>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Partial update sent by the front end; absent or `null` fields keep the stored value
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProgressUpdate {
    /// Raw, unsanitized id
    #[serde(default, deserialize_with = "participant_id_text")]
    pub participant_id: String,
    #[serde(default)]
    pub order: Option<Vec<i64>>,
    /// Complete response array; replaces the stored one wholesale
    #[serde(default)]
    pub responses: Option<Vec<ResponseRecord>>,
    #[serde(default)]
    pub index: Option<i64>,
    #[serde(default)]
    pub completed: Option<bool>,
}

/// Apply `update` on top of `previous`
///
/// Per-field rules:
/// - `order`, `responses`, `index`: replaced when provided, kept otherwise
/// - `completed`: logical OR, so it never returns to `false`
/// - `created_at`: kept when present, else `now`
/// - `updated_at`: always `now`
pub fn merge(previous: Session, update: ProgressUpdate, now: DateTime<Utc>) -> Session {
    Session {
        participant_id: previous.participant_id,
        order: update.order.or(previous.order),
        responses: update.responses.unwrap_or(previous.responses),
        index: update.index.unwrap_or(previous.index),
        completed: update.completed.unwrap_or(false) || previous.completed,
        created_at: previous.created_at.or_else(|| Some(to_iso8601(&now))),
        updated_at: Some(to_iso8601(&now)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    }

    fn record(i: i64, response: &str) -> ResponseRecord {
        match json!({
            "index": i,
            "manifest_index": i * 2,
            "audio": format!("clips/{i}.wav"),
            "label": "hello",
            "filename": format!("{i}.wav"),
            "response": response,
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn advanced_session() -> Session {
        Session {
            participant_id: "p1".to_string(),
            order: Some(vec![2, 0, 1]),
            responses: vec![record(0, "yes"), record(1, "no")],
            index: 2,
            completed: false,
            created_at: Some(to_iso8601(&t0())),
            updated_at: Some(to_iso8601(&t0())),
        }
    }

    #[test]
    fn test_sanitize_strips_disallowed_characters() {
        assert_eq!(sanitize_participant_id("abc/../123"), "abc123");
        assert_eq!(sanitize_participant_id("P_01-x"), "P_01-x");
        assert_eq!(sanitize_participant_id("a b\tc\n"), "abc");
        assert_eq!(sanitize_participant_id("ünï©ode"), "node");
    }

    #[test]
    fn test_sanitize_truncates_to_64() {
        let raw = "x".repeat(100);
        let clean = sanitize_participant_id(&raw);
        assert_eq!(clean.len(), MAX_PARTICIPANT_ID_LEN);

        // Truncation counts only surviving characters
        let raw = format!("{}{}", "/".repeat(10), "y".repeat(70));
        assert_eq!(sanitize_participant_id(&raw), "y".repeat(64));
    }

    #[test]
    fn test_sanitize_can_be_empty() {
        assert_eq!(sanitize_participant_id(""), "");
        assert_eq!(sanitize_participant_id("../.."), "");
    }

    #[test]
    fn test_merge_empty_update_keeps_fields() {
        let now = t0() + Duration::minutes(5);
        let merged = merge(advanced_session(), ProgressUpdate::default(), now);

        assert_eq!(merged.order, Some(vec![2, 0, 1]));
        assert_eq!(merged.responses.len(), 2);
        assert_eq!(merged.index, 2);
        assert!(!merged.completed);
        assert_eq!(merged.created_at.as_deref(), Some("2024-06-01T09:00:00.000Z"));
        assert_eq!(merged.updated_at.as_deref(), Some("2024-06-01T09:05:00.000Z"));
    }

    #[test]
    fn test_merge_replaces_provided_fields() {
        let update = ProgressUpdate {
            participant_id: "p1".to_string(),
            order: Some(vec![0, 1, 2]),
            responses: Some(vec![record(0, "maybe")]),
            index: Some(7),
            completed: None,
        };
        let merged = merge(advanced_session(), update, t0());

        assert_eq!(merged.order, Some(vec![0, 1, 2]));
        // Full replace, not append
        assert_eq!(merged.responses, vec![record(0, "maybe")]);
        assert_eq!(merged.index, 7);
    }

    #[test]
    fn test_merge_completed_is_monotonic() {
        let mut done = advanced_session();
        done.completed = true;

        let explicit_false = ProgressUpdate {
            completed: Some(false),
            ..Default::default()
        };
        assert!(merge(done.clone(), explicit_false, t0()).completed);
        assert!(merge(done, ProgressUpdate::default(), t0()).completed);

        let set_true = ProgressUpdate {
            completed: Some(true),
            ..Default::default()
        };
        assert!(merge(advanced_session(), set_true, t0()).completed);
    }

    #[test]
    fn test_merge_on_blank_sets_created_at() {
        let now = t0();
        let merged = merge(Session::blank("p9"), ProgressUpdate::default(), now);
        assert_eq!(merged.participant_id, "p9");
        assert_eq!(merged.created_at, Some(to_iso8601(&now)));
        assert_eq!(merged.updated_at, merged.created_at);
        assert!(merged.responses.is_empty());
        assert!(merged.order.is_none());
    }

    #[test]
    fn test_update_null_fields_mean_absent() {
        let update: ProgressUpdate = serde_json::from_value(json!({
            "participant_id": "p1",
            "order": null,
            "responses": null,
            "index": null,
            "completed": null,
        }))
        .unwrap();
        let merged = merge(advanced_session(), update, t0());
        assert_eq!(merged.responses.len(), 2);
        assert_eq!(merged.order, Some(vec![2, 0, 1]));
        assert_eq!(merged.index, 2);
    }

    #[test]
    fn test_session_decodes_sparse_record() {
        let session: Session = serde_json::from_value(json!({
            "participant_id": "legacy",
            "responses": null,
        }))
        .unwrap();
        assert_eq!(session, Session::blank("legacy"));
    }

    #[test]
    fn test_session_rejects_missing_id() {
        assert!(serde_json::from_value::<Session>(json!({ "index": 3 })).is_err());
        assert!(serde_json::from_value::<Session>(json!({
            "participant_id": "p",
            "index": "three",
        }))
        .is_err());
    }

    #[test]
    fn test_session_serializes_all_fields() {
        let value = serde_json::to_value(Session::new("p2", t0())).unwrap();
        assert_eq!(
            value,
            json!({
                "participant_id": "p2",
                "order": null,
                "responses": [],
                "index": 0,
                "completed": false,
                "created_at": "2024-06-01T09:00:00.000Z",
                "updated_at": "2024-06-01T09:00:00.000Z",
            })
        );
    }

    #[test]
    fn test_session_keeps_non_rfc3339_timestamps_verbatim() {
        let session: Session = serde_json::from_value(json!({
            "participant_id": "p1",
            "completed": true,
            "created_at": "2024-06-01T09:00:00+0000",
            "updated_at": "2024-06-01T09:00:00.123456",
        }))
        .unwrap();
        assert!(session.completed);
        assert_eq!(session.created_at.as_deref(), Some("2024-06-01T09:00:00+0000"));

        let merged = merge(session, ProgressUpdate::default(), t0());
        assert_eq!(merged.created_at.as_deref(), Some("2024-06-01T09:00:00+0000"));
        assert!(merged.completed);
    }

    #[test]
    fn test_update_accepts_numeric_participant_id() {
        let update: ProgressUpdate =
            serde_json::from_value(json!({ "participant_id": 12345 })).unwrap();
        assert_eq!(update.participant_id, "12345");

        let update: ProgressUpdate =
            serde_json::from_value(json!({ "participant_id": null })).unwrap();
        assert_eq!(update.participant_id, "");

        assert!(serde_json::from_value::<ProgressUpdate>(json!({ "participant_id": ["a"] })).is_err());
    }
}

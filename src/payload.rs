//! Webhook payload normalization.
//!
//! Vendors and relays deliver memo events with inconsistent field names:
//! the transcription arrives as `transcription`, `text`, or `content`; the
//! summary as `summary`, `ai_summary`, or `notes`; and so on. This module
//! probes the aliases in a fixed order and produces the canonical [`Note`],
//! assigning a receipt timestamp and a generated recording id when the
//! payload provides none.
//!
//! A payload carrying neither a transcription nor a summary is rejected
//! before any side effect is attempted.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::index::short_hash;
use crate::models::Note;

/// Alias lists, probed in order. First non-empty value wins.
const TRANSCRIPTION_KEYS: &[&str] = &["transcription", "text", "content"];
const SUMMARY_KEYS: &[&str] = &["summary", "ai_summary", "notes"];
const TIMESTAMP_KEYS: &[&str] = &["timestamp", "created_at", "date"];
const RECORDING_ID_KEYS: &[&str] = &["recording_id", "id"];

/// Normalize a raw JSON payload into a canonical [`Note`].
///
/// `received_at` is used when the payload carries no parseable timestamp,
/// so a batch of requests in one test run normalizes deterministically.
pub fn normalize(payload: &Value, received_at: DateTime<Utc>) -> Result<Note> {
    let transcription = first_string(payload, TRANSCRIPTION_KEYS).unwrap_or_default();
    let summary = first_string(payload, SUMMARY_KEYS).unwrap_or_default();

    if transcription.trim().is_empty() && summary.trim().is_empty() {
        anyhow::bail!("payload must include a transcription or summary");
    }

    let timestamp = first_timestamp(payload).unwrap_or(received_at);

    let recording_id = first_string(payload, RECORDING_ID_KEYS)
        .unwrap_or_else(|| format!("rec_{}", Uuid::new_v4().simple()));

    let source = first_string(payload, &["source"]).unwrap_or_else(|| "webhook".to_string());

    let hash = short_hash(&recording_id, &timestamp.to_rfc3339());

    Ok(Note {
        recording_id,
        timestamp,
        summary,
        transcription,
        hash,
        source,
    })
}

fn first_string(payload: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        match payload.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => return Some(s.clone()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

fn first_timestamp(payload: &Value) -> Option<DateTime<Utc>> {
    for key in TIMESTAMP_KEYS {
        match payload.get(*key) {
            Some(Value::String(s)) => {
                if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
                    return Some(ts.with_timezone(&Utc));
                }
            }
            Some(Value::Number(n)) => {
                if let Some(epoch) = n.as_i64() {
                    // Heuristic: values past the year ~2286 in seconds are
                    // really milliseconds.
                    let parsed = if epoch > 10_000_000_000 {
                        DateTime::from_timestamp_millis(epoch)
                    } else {
                        DateTime::from_timestamp(epoch, 0)
                    };
                    if let Some(ts) = parsed {
                        return Some(ts);
                    }
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn received_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 4, 12, 0, 0).unwrap()
    }

    #[test]
    fn canonical_fields_pass_through() {
        let note = normalize(
            &json!({
                "recording_id": "rec_1",
                "timestamp": "2026-03-01T08:30:00Z",
                "summary": "Call dentist",
                "transcription": "Remember to call the dentist",
            }),
            received_at(),
        )
        .unwrap();

        assert_eq!(note.recording_id, "rec_1");
        assert_eq!(note.summary, "Call dentist");
        assert_eq!(note.timestamp.to_rfc3339(), "2026-03-01T08:30:00+00:00");
        assert_eq!(note.source, "webhook");
    }

    #[test]
    fn alias_fields_are_probed() {
        let note = normalize(
            &json!({
                "id": "abc",
                "created_at": "2026-03-01T08:30:00Z",
                "ai_summary": "Summary text",
                "text": "Transcript text",
            }),
            received_at(),
        )
        .unwrap();

        assert_eq!(note.recording_id, "abc");
        assert_eq!(note.summary, "Summary text");
        assert_eq!(note.transcription, "Transcript text");
    }

    #[test]
    fn missing_both_text_fields_rejected() {
        let err = normalize(&json!({"recording_id": "rec_1"}), received_at()).unwrap_err();
        assert!(err.to_string().contains("transcription or summary"));
    }

    #[test]
    fn blank_text_fields_rejected() {
        let err = normalize(
            &json!({"summary": "   ", "transcription": ""}),
            received_at(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("transcription or summary"));
    }

    #[test]
    fn summary_alone_is_enough() {
        let note = normalize(&json!({"summary": "Just a summary"}), received_at()).unwrap();
        assert_eq!(note.summary, "Just a summary");
        assert!(note.transcription.is_empty());
    }

    #[test]
    fn missing_timestamp_uses_receipt_time() {
        let note = normalize(&json!({"summary": "x"}), received_at()).unwrap();
        assert_eq!(note.timestamp, received_at());
    }

    #[test]
    fn epoch_millis_timestamp_parses() {
        let note = normalize(
            &json!({"summary": "x", "timestamp": 1772000000000i64}),
            received_at(),
        )
        .unwrap();
        assert_eq!(note.timestamp.timestamp_millis(), 1772000000000);
    }

    #[test]
    fn missing_recording_id_is_generated() {
        let note = normalize(&json!({"summary": "x"}), received_at()).unwrap();
        assert!(note.recording_id.starts_with("rec_"));
    }

    #[test]
    fn hash_is_deterministic_for_same_event() {
        let payload = json!({
            "recording_id": "rec_1",
            "timestamp": "2026-03-01T08:30:00Z",
            "summary": "x",
        });
        let a = normalize(&payload, received_at()).unwrap();
        let b = normalize(&payload, received_at()).unwrap();
        assert_eq!(a.hash, b.hash);
        assert!(a.hash.starts_with("p-"));
    }
}

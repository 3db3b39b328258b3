//! Helpers for constructing and parsing entry payloads.

use crate::index::types::{EntryMetadata, EntryRecord, EntryStatus};
use serde_json::{Map, Value};
use time::OffsetDateTime;

/// Build the payload object stored alongside each indexed entry.
pub(crate) fn build_entry_payload(record: &EntryRecord) -> Value {
    let mut payload = Map::new();
    payload.insert("entry_id".into(), Value::String(record.entry_id.clone()));
    payload.insert("key".into(), Value::String(record.key.clone()));
    payload.insert(
        "content_hash".into(),
        Value::String(record.content_hash.clone()),
    );
    payload.insert(
        "status".into(),
        Value::String(record.status.as_str().to_string()),
    );
    payload.insert("text".into(), Value::String(record.text.clone()));
    payload.insert(
        "ingested_at".into(),
        Value::String(record.ingested_at.clone()),
    );
    payload.insert(
        "uploaded_by".into(),
        Value::String(record.metadata.uploaded_by.clone()),
    );
    payload.insert(
        "filename".into(),
        Value::String(record.metadata.filename.clone()),
    );

    if let Some(storage_ref) = record
        .metadata
        .storage_ref
        .as_ref()
        .filter(|value| !value.is_empty())
    {
        payload.insert("storage_ref".into(), Value::String(storage_ref.clone()));
    }
    if let Some(category) = record
        .metadata
        .category
        .as_ref()
        .filter(|value| !value.trim().is_empty())
    {
        payload.insert("category".into(), Value::String(category.clone()));
    }

    Value::Object(payload)
}

/// Reconstruct an entry from a stored payload map.
///
/// Returns `None` when required fields are missing, which only happens for
/// points written by something other than this pipeline.
pub(crate) fn parse_entry_payload(payload: &Map<String, Value>) -> Option<EntryRecord> {
    let read_string = |key: &str| {
        payload
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    Some(EntryRecord {
        entry_id: read_string("entry_id")?,
        key: read_string("key")?,
        content_hash: read_string("content_hash")?,
        status: EntryStatus::parse(read_string("status")?.as_str()),
        text: read_string("text").unwrap_or_default(),
        metadata: EntryMetadata {
            storage_ref: read_string("storage_ref"),
            uploaded_by: read_string("uploaded_by").unwrap_or_default(),
            filename: read_string("filename").unwrap_or_default(),
            category: read_string("category"),
        },
        ingested_at: read_string("ingested_at").unwrap_or_default(),
    })
}

/// Current timestamp formatted for payload storage.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> EntryRecord {
        EntryRecord {
            entry_id: "entry-1".into(),
            key: "manual.pdf".into(),
            content_hash: "abc123".into(),
            status: EntryStatus::Ready,
            text: "extracted".into(),
            metadata: EntryMetadata {
                storage_ref: Some("blob-7".into()),
                uploaded_by: "org-1".into(),
                filename: "manual.pdf".into(),
                category: Some("guides".into()),
            },
            ingested_at: "2025-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn payload_round_trips_through_parse() {
        let record = sample_record();
        let payload = build_entry_payload(&record);
        let map = payload.as_object().expect("object payload");
        let parsed = parse_entry_payload(map).expect("parsed entry");
        assert_eq!(parsed, record);
    }

    #[test]
    fn optional_fields_are_omitted_when_empty() {
        let mut record = sample_record();
        record.metadata.storage_ref = None;
        record.metadata.category = Some("  ".into());

        let payload = build_entry_payload(&record);
        let map = payload.as_object().expect("object payload");
        assert!(!map.contains_key("storage_ref"));
        assert!(!map.contains_key("category"));
    }

    #[test]
    fn unknown_status_parses_as_error() {
        assert_eq!(EntryStatus::parse("corrupted"), EntryStatus::Error);
        assert_eq!(EntryStatus::parse("ready"), EntryStatus::Ready);
        assert_eq!(EntryStatus::parse("pending"), EntryStatus::Pending);
    }

    #[test]
    fn timestamp_is_rfc3339_like() {
        let ts = current_timestamp_rfc3339();
        assert!(ts.contains('T') && ts.ends_with('Z'));
    }

    #[test]
    fn payload_missing_required_fields_is_rejected() {
        let mut map = Map::new();
        map.insert("key".into(), Value::String("orphan".into()));
        assert!(parse_entry_payload(&map).is_none());
    }
}

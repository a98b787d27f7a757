use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::trace;
use uuid::Uuid;

use livecast_types::models::{NormalizedComment, UNKNOWN_AUTHOR};

/// Where an author's display name may live in an upstream record, tried
/// in order. The first non-blank string wins.
const AUTHOR_POINTERS: &[&str] = &[
    "/from/name",
    "/user/name",
    "/author/name",
    "/from",
    "/user",
    "/author",
    "/username",
];

const TIMESTAMP_POINTERS: &[&str] = &["/created_time", "/created_at"];

/// Graph API timestamps use a numeric offset without a colon (`+0000`).
const GRAPH_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// Normalize a page of upstream records, dropping those without a message.
/// Order is preserved.
pub fn normalize_batch(records: &[Value], fetched_at: DateTime<Utc>) -> Vec<NormalizedComment> {
    records
        .iter()
        .filter_map(|record| normalize(record, fetched_at))
        .collect()
}

/// Normalize one record. Returns `None` when it has no usable message.
pub fn normalize(record: &Value, fetched_at: DateTime<Utc>) -> Option<NormalizedComment> {
    let Some(message) = non_blank(record.get("message")) else {
        trace!("Skipping record without message: {}", truncate(&record.to_string(), 120));
        return None;
    };

    Some(NormalizedComment {
        author_name: author_name(record).unwrap_or(UNKNOWN_AUTHOR).to_string(),
        message: message.to_string(),
        created_at: created_at(record).unwrap_or(fetched_at),
        id: record_id(record).unwrap_or_else(|| Uuid::new_v4().to_string()),
    })
}

fn author_name(record: &Value) -> Option<&str> {
    AUTHOR_POINTERS
        .iter()
        .find_map(|pointer| non_blank(record.pointer(pointer)))
}

fn created_at(record: &Value) -> Option<DateTime<Utc>> {
    TIMESTAMP_POINTERS
        .iter()
        .filter_map(|pointer| record.pointer(pointer).and_then(Value::as_str))
        .find_map(parse_timestamp)
}

/// Accepts RFC 3339 and the Graph API's `+0000` offset form.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, GRAPH_TIME_FORMAT))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn record_id(record: &Value) -> Option<String> {
    match record.get("id")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn non_blank(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

pub(crate) fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn fetched_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 20, 0, 0).unwrap()
    }

    #[test]
    fn test_graph_record() {
        let record = json!({
            "id": "123_456",
            "from": { "name": "Maria", "id": "99" },
            "message": "Great stream!",
            "created_time": "2024-06-01T19:58:12+0000"
        });
        let c = normalize(&record, fetched_at()).unwrap();
        assert_eq!(c.author_name, "Maria");
        assert_eq!(c.message, "Great stream!");
        assert_eq!(c.id, "123_456");
        assert_eq!(c.created_at, Utc.with_ymd_and_hms(2024, 6, 1, 19, 58, 12).unwrap());
    }

    #[test]
    fn test_missing_author_uses_placeholder() {
        let record = json!({ "id": "1", "message": "hi" });
        let c = normalize(&record, fetched_at()).unwrap();
        assert_eq!(c.author_name, UNKNOWN_AUTHOR);
    }

    #[test]
    fn test_missing_message_is_dropped() {
        let records = vec![json!({ "message": "hi" }), json!({ "from": { "name": "Bo" } })];
        let batch = normalize_batch(&records, fetched_at());
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].message, "hi");
    }

    #[test]
    fn test_blank_or_non_string_message_is_dropped() {
        assert!(normalize(&json!({ "message": "   " }), fetched_at()).is_none());
        assert!(normalize(&json!({ "message": 42 }), fetched_at()).is_none());
        assert!(normalize(&json!({ "message": null }), fetched_at()).is_none());
        assert!(normalize(&json!("just a string"), fetched_at()).is_none());
    }

    #[test]
    fn test_author_strategies_in_order() {
        let user_nested = json!({ "message": "m", "user": { "name": "Uma" } });
        assert_eq!(normalize(&user_nested, fetched_at()).unwrap().author_name, "Uma");

        let author_nested = json!({ "message": "m", "author": { "name": "Ada" } });
        assert_eq!(normalize(&author_nested, fetched_at()).unwrap().author_name, "Ada");

        let flat = json!({ "message": "m", "author": "Flat" });
        assert_eq!(normalize(&flat, fetched_at()).unwrap().author_name, "Flat");

        let username = json!({ "message": "m", "username": "handle" });
        assert_eq!(normalize(&username, fetched_at()).unwrap().author_name, "handle");

        // `from.name` outranks everything else
        let both = json!({ "message": "m", "from": { "name": "First" }, "user": { "name": "Second" } });
        assert_eq!(normalize(&both, fetched_at()).unwrap().author_name, "First");

        // a blank name falls through to the next strategy
        let blank = json!({ "message": "m", "from": { "name": " " }, "username": "next" });
        assert_eq!(normalize(&blank, fetched_at()).unwrap().author_name, "next");
    }

    #[test]
    fn test_missing_id_is_generated_and_unique() {
        let record = json!({ "message": "no id" });
        let a = normalize(&record, fetched_at()).unwrap();
        let b = normalize(&record, fetched_at()).unwrap();
        assert!(!a.id.is_empty());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_numeric_id() {
        let c = normalize(&json!({ "message": "m", "id": 17 }), fetched_at()).unwrap();
        assert_eq!(c.id, "17");
    }

    #[test]
    fn test_timestamp_fallbacks() {
        let rfc = json!({ "message": "m", "created_at": "2024-06-01T18:00:00Z" });
        assert_eq!(
            normalize(&rfc, fetched_at()).unwrap().created_at,
            Utc.with_ymd_and_hms(2024, 6, 1, 18, 0, 0).unwrap()
        );

        let garbage = json!({ "message": "m", "created_time": "yesterday" });
        assert_eq!(normalize(&garbage, fetched_at()).unwrap().created_at, fetched_at());

        let missing = json!({ "message": "m" });
        assert_eq!(normalize(&missing, fetched_at()).unwrap().created_at, fetched_at());
    }

    #[test]
    fn test_order_preserved() {
        let records = vec![
            json!({ "id": "a", "message": "1" }),
            json!({ "id": "skip" }),
            json!({ "id": "b", "message": "2" }),
            json!({ "id": "c", "message": "3" }),
        ];
        let ids: Vec<String> = normalize_batch(&records, fetched_at())
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("short", 50), "short");
    }
}

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use logtrail_types::LogRecord;

use crate::normalize::{DEFAULT_MAX_DEPTH, Normalizer};

/// Key fields surfaced from a record's decoded payloads for a detail view
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordSummary {
    /// Transaction identifier carried in the request payload
    pub transaction: Option<String>,

    /// Human-readable message from the response payload
    pub message: Option<String>,

    /// Attachment URLs embedded in the comment field
    pub attachments: Vec<String>,
}

impl RecordSummary {
    /// Pull the interesting fields out of a record's payloads.
    ///
    /// Payloads are normalized first, so fields buried under stringified
    /// JSON layers are still found. Nothing here fails: a payload that
    /// cannot be decoded simply contributes no fields.
    pub fn extract(record: &LogRecord) -> Self {
        let request = Normalizer::decode(&record.request, DEFAULT_MAX_DEPTH);
        let response = Normalizer::decode(&record.response, DEFAULT_MAX_DEPTH);

        Self {
            transaction: string_field(&request, "transaction"),
            message: string_field(&response, "message"),
            attachments: extract_urls(&record.comment),
        }
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key)?.as_str().map(str::to_string)
}

/// Find image attachment URLs in free text
pub fn extract_urls(text: &str) -> Vec<String> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)https?://[^\s,"]+\.(?:png|jpe?g)"#).expect("static pattern")
    });

    pattern
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_from_stringified_payloads() {
        let mut record = LogRecord::new(1, "2024-03-01T10:00:00Z");
        record.request = r#"{"transaction":"tx-991","resultData":"{\"step\":2}"}"#.to_string();
        record.response = "\"{\\\"message\\\":\\\"approved\\\"}\"".to_string();

        let summary = RecordSummary::extract(&record);
        assert_eq!(summary.transaction.as_deref(), Some("tx-991"));
        assert_eq!(summary.message.as_deref(), Some("approved"));
    }

    #[test]
    fn test_undecodable_payloads_contribute_nothing() {
        let mut record = LogRecord::new(2, "2024-03-01T10:00:00Z");
        record.request = "not json".to_string();

        let summary = RecordSummary::extract(&record);
        assert_eq!(summary.transaction, None);
        assert_eq!(summary.message, None);
    }

    #[test]
    fn test_extract_urls() {
        let comment = "front: https://cdn.example.com/a.png, back: https://cdn.example.com/b.JPEG done";
        let urls = extract_urls(comment);
        assert_eq!(
            urls,
            vec![
                "https://cdn.example.com/a.png",
                "https://cdn.example.com/b.JPEG"
            ]
        );

        assert!(extract_urls("no links here").is_empty());
    }
}

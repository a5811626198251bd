use std::sync::OnceLock;

use logtrail_types::LogRecord;

/// Raw embedded dataset, structurally identical to a live response
const RAW: &str = include_str!("fallback.json");

/// The static record set served whenever live data is unavailable.
///
/// Parsed once on first use. The browsing surface must never show nothing
/// usable, so this set always exists.
pub fn fallback_records() -> &'static [LogRecord] {
    static RECORDS: OnceLock<Vec<LogRecord>> = OnceLock::new();
    RECORDS.get_or_init(|| serde_json::from_str(RAW).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_dataset_decodes() {
        let records = fallback_records();
        assert!(!records.is_empty());
        // Ids must be unique within the set
        let mut ids: Vec<u64> = records.iter().map(|r| r.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), records.len());
    }

    #[test]
    fn test_dataset_has_browseable_fields() {
        let records = fallback_records();
        assert!(records.iter().all(|r| r.timestamp().is_some()));
        assert!(records.iter().any(|r| !r.comment.is_empty()));
    }
}

use logtrail_types::{FilterSpec, LogRecord};

/// Distinct values observed in the loaded record set, used to populate
/// selectable filter choices
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterOptions {
    pub gateways: Vec<String>,
    pub apis: Vec<String>,
    pub statuses: Vec<String>,
}

/// Apply a filter spec to a record set.
///
/// Pure: the input is not mutated and its order is preserved. A record
/// passes when all active predicates match; empty predicates are wildcards.
pub fn apply(records: &[LogRecord], spec: &FilterSpec) -> Vec<LogRecord> {
    records
        .iter()
        .filter(|record| matches(record, spec))
        .cloned()
        .collect()
}

/// Check a single record against every active predicate.
///
/// Missing or malformed fields never panic; they simply fail to match.
pub fn matches(record: &LogRecord, spec: &FilterSpec) -> bool {
    if !spec.search.is_empty() {
        let needle = spec.search.to_lowercase();
        let haystack = [
            record.id.to_string(),
            record.session_id.clone(),
            record.request.clone(),
            record.response.clone(),
            record.comment.clone(),
        ]
        .join(" ")
        .to_lowercase();

        if !haystack.contains(&needle) {
            return false;
        }
    }

    if !spec.gateway.is_empty() && record.gateway != spec.gateway {
        return false;
    }

    if !spec.api.is_empty() && record.api != spec.api {
        return false;
    }

    if !spec.status.is_empty() && record.code.as_display() != spec.status {
        return false;
    }

    if spec.date_from.is_some() || spec.date_to.is_some() {
        // A record without a parseable timestamp cannot satisfy a date bound
        let Some(ts) = record.timestamp() else {
            return false;
        };
        if spec.date_from.is_some_and(|from| ts < from) {
            return false;
        }
        if spec.date_to.is_some_and(|to| ts > to) {
            return false;
        }
    }

    true
}

/// Derive the distinct, non-empty field values from the loaded set.
///
/// Reflects only what is currently loaded, not a server-wide vocabulary.
/// First-seen order is preserved.
pub fn filter_options(records: &[LogRecord]) -> FilterOptions {
    let mut options = FilterOptions::default();

    for record in records {
        push_distinct(&mut options.gateways, &record.gateway);
        push_distinct(&mut options.apis, &record.api);
        push_distinct(&mut options.statuses, &record.code.as_display());
    }

    options
}

fn push_distinct(values: &mut Vec<String>, value: &str) {
    if !value.is_empty() && !values.iter().any(|v| v == value) {
        values.push(value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logtrail_types::StatusCode;

    fn record(id: u64, gateway: &str, code: i64) -> LogRecord {
        let mut r = LogRecord::new(id, "2024-03-01T10:00:00Z");
        r.gateway = gateway.to_string();
        r.api = "LOG".to_string();
        r.code = StatusCode::Number(code);
        r.session_id = format!("session-{id}");
        r
    }

    #[test]
    fn test_gateway_filter() {
        let records = vec![record(1, "A", 200), record(2, "B", 404)];
        let spec = FilterSpec {
            gateway: "A".into(),
            ..Default::default()
        };

        let out = apply(&records, &spec);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, 1);
    }

    #[test]
    fn test_wildcard_spec_returns_input_unchanged() {
        let records = vec![record(3, "A", 200), record(1, "B", 404), record(2, "A", 500)];
        let out = apply(&records, &FilterSpec::default());

        let ids: Vec<u64> = out.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn test_filter_idempotent() {
        let records = vec![record(1, "A", 200), record(2, "B", 404), record(3, "A", 200)];
        let spec = FilterSpec {
            gateway: "A".into(),
            status: "200".into(),
            ..Default::default()
        };

        let once = apply(&records, &spec);
        let twice = apply(&once, &spec);
        assert_eq!(once.len(), twice.len());
        assert!(once.iter().zip(&twice).all(|(a, b)| a.id == b.id));
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let mut r = record(1, "A", 200);
        r.comment = "Retry after TIMEOUT".to_string();
        let records = vec![r, record(2, "A", 200)];

        let spec = FilterSpec {
            search: "timeout".into(),
            ..Default::default()
        };
        let out = apply(&records, &spec);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, 1);
    }

    #[test]
    fn test_search_covers_id_and_session() {
        let records = vec![record(42, "A", 200), record(7, "A", 200)];

        let by_id = apply(
            &records,
            &FilterSpec {
                search: "42".into(),
                ..Default::default()
            },
        );
        assert_eq!(by_id.len(), 1);

        let by_session = apply(
            &records,
            &FilterSpec {
                search: "session-7".into(),
                ..Default::default()
            },
        );
        assert_eq!(by_session.len(), 1);
        assert_eq!(by_session[0].id, 7);
    }

    #[test]
    fn test_status_compared_as_string() {
        let mut textual = record(1, "A", 0);
        textual.code = StatusCode::Text("404".into());
        let records = vec![textual, record(2, "A", 404), record(3, "A", 200)];

        let spec = FilterSpec {
            status: "404".into(),
            ..Default::default()
        };
        assert_eq!(apply(&records, &spec).len(), 2);
    }

    #[test]
    fn test_date_bounds_inclusive() {
        let records = vec![
            LogRecord::new(1, "2024-03-01T10:00:00Z"),
            LogRecord::new(2, "2024-03-02T10:00:00Z"),
            LogRecord::new(3, "2024-03-03T10:00:00Z"),
        ];
        let spec = FilterSpec {
            date_from: records[0].timestamp(),
            date_to: records[1].timestamp(),
            ..Default::default()
        };

        let ids: Vec<u64> = apply(&records, &spec).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_undated_record_fails_date_bound() {
        let records = vec![LogRecord::new(1, "garbage")];
        let spec = FilterSpec {
            date_from: LogRecord::new(0, "2024-01-01T00:00:00Z").timestamp(),
            ..Default::default()
        };
        assert!(apply(&records, &spec).is_empty());
    }

    #[test]
    fn test_filter_options_distinct_non_empty() {
        let mut undated = record(4, "", 0);
        undated.code = StatusCode::default();
        undated.api = String::new();

        let records = vec![record(1, "A", 200), record(2, "B", 404), record(3, "A", 200), undated];
        let options = filter_options(&records);

        assert_eq!(options.gateways, vec!["A", "B"]);
        assert_eq!(options.apis, vec!["LOG"]);
        assert_eq!(options.statuses, vec!["200", "404"]);
    }
}

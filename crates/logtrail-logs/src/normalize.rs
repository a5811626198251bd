use serde_json::{Map, Value};

/// Default recursion limit for nested stringified payloads
pub const DEFAULT_MAX_DEPTH: usize = 5;

/// Decoder for payloads that may be JSON-encoded strings nested to
/// arbitrary depth.
///
/// Gateways log `request` and `response` bodies as strings, and some of
/// them stringify an already-stringified body one or more times. The
/// normalizer peels those layers off so the rest of the pipeline sees a
/// plain structured value. It never fails: anything that was never valid
/// JSON comes back unchanged as a string.
pub struct Normalizer;

impl Normalizer {
    /// Decode a raw payload string into a structured value.
    ///
    /// `max_depth` bounds recursion so malformed or adversarial input
    /// terminates; past the limit the value is returned as-is.
    pub fn decode(input: &str, max_depth: usize) -> Value {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed == "\"\"" {
            return Value::Null;
        }

        // Strip one layer of enclosing quotes before the first parse attempt
        let clean = if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
            &trimmed[1..trimmed.len() - 1]
        } else {
            trimmed
        };

        // If the quote-stripped form does not parse (the inner text may
        // still carry escape sequences), fall back to the full input.
        let parsed = serde_json::from_str::<Value>(clean)
            .or_else(|_| serde_json::from_str::<Value>(trimmed));
        let Ok(parsed) = parsed else {
            // Never was valid JSON, pass through unchanged
            return Value::String(input.to_string());
        };

        Self::decode_value(parsed, max_depth)
    }

    /// Apply the same decoding to an already-parsed value.
    ///
    /// Re-applying to its own output is a no-op.
    pub fn decode_value(value: Value, max_depth: usize) -> Value {
        match value {
            // A string that still looks object/array shaped, or is itself a
            // quoted JSON literal, gets one more pass
            Value::String(s) if max_depth > 0 && looks_encoded(&s) => {
                Self::decode(&s, max_depth - 1)
            }
            // Decode JSON-shaped string leaves of a non-array object;
            // arrays are deliberately not walked field-by-field
            Value::Object(map) => {
                let decoded: Map<String, Value> = map
                    .into_iter()
                    .map(|(key, v)| match v {
                        Value::String(s) if max_depth > 0 && looks_like_json(&s) => {
                            (key, Self::decode(&s, max_depth - 1))
                        }
                        other => (key, other),
                    })
                    .collect();
                Value::Object(decoded)
            }
            other => other,
        }
    }

    /// Render a decoded value for display
    pub fn pretty(value: &Value) -> String {
        match value {
            Value::Null => "no data".to_string(),
            Value::String(s) => s.clone(),
            other => serde_json::to_string_pretty(other).unwrap_or_default(),
        }
    }
}

/// Check if a string is shaped like a JSON object or array
fn looks_like_json(s: &str) -> bool {
    let t = s.trim();
    (t.starts_with('{') && t.ends_with('}')) || (t.starts_with('[') && t.ends_with(']'))
}

/// Shaped like JSON, or wrapped in another quote layer entirely
fn looks_encoded(s: &str) -> bool {
    let t = s.trim();
    looks_like_json(t) || (t.len() >= 2 && t.starts_with('"') && t.ends_with('"'))
}

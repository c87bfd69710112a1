//! # Sanitized JSON Columns
//!
//! A JSON column whose every non-null write passes through a sanitizer
//! fixed when the column is declared.
//!
//! ```text
//! write(None | null) ─────────────────────────────────► NULL
//! write(Some(v))     ──► sanitizer(v) ──► serde_json ──► TEXT
//!                            │
//!                            └── Err(Rejected) ──► nothing stored
//!
//! read(TEXT)         ──► serde_json ──► value   (no transformation)
//! ```

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Failures of a sanitized column.
#[derive(Debug, Error)]
pub enum SanitizeError {
    /// The sanitizer refused the payload.
    #[error("Payload rejected: {reason}")]
    Rejected { reason: String },

    #[error("Invalid JSON payload: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SanitizeError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        SanitizeError::Rejected {
            reason: reason.into(),
        }
    }
}

/// A pure, deterministic payload transformation.
pub type Sanitizer = Arc<dyn Fn(Value) -> Result<Value, SanitizeError> + Send + Sync>;

/// A JSON column with a fixed sanitizer.
#[derive(Clone)]
pub struct SanitizedJson {
    column: &'static str,
    sanitizer: Sanitizer,
}

impl SanitizedJson {
    pub fn new<F>(column: &'static str, sanitizer: F) -> Self
    where
        F: Fn(Value) -> Result<Value, SanitizeError> + Send + Sync + 'static,
    {
        SanitizedJson {
            column,
            sanitizer: Arc::new(sanitizer),
        }
    }

    pub fn column(&self) -> &'static str {
        self.column
    }

    /// Write path: returns exactly what must be stored.
    ///
    /// `None` and JSON `null` bypass the sanitizer and store NULL.
    pub fn sanitize(&self, value: Option<Value>) -> Result<Option<Value>, SanitizeError> {
        match value {
            None | Some(Value::Null) => Ok(None),
            Some(payload) => {
                let clean = (self.sanitizer)(payload)?;
                debug!(column = self.column, "Payload sanitized");
                Ok(Some(clean))
            }
        }
    }

    /// Sanitizes and serializes to the stored TEXT form.
    pub fn encode(&self, value: Option<&Value>) -> Result<Option<String>, SanitizeError> {
        match self.sanitize(value.cloned())? {
            Some(clean) => Ok(Some(serde_json::to_string(&clean)?)),
            None => Ok(None),
        }
    }

    /// Parses the stored TEXT form. NULL (or stored `null`) reads as `None`.
    pub fn decode(&self, stored: Option<&str>) -> Result<Option<Value>, SanitizeError> {
        match stored {
            None => Ok(None),
            Some(text) => match serde_json::from_str(text)? {
                Value::Null => Ok(None),
                value => Ok(Some(value)),
            },
        }
    }
}

impl fmt::Debug for SanitizedJson {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SanitizedJson")
            .field("column", &self.column)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Built-in Sanitizers
// =============================================================================

pub mod sanitizers {
    use serde_json::{Map, Value};

    use super::SanitizeError;

    /// List of ISO 3166 alpha-2 codes: trimmed, uppercased, de-duplicated
    /// in first-seen order.
    pub fn country_codes(value: Value) -> Result<Value, SanitizeError> {
        let Value::Array(items) = value else {
            return Err(SanitizeError::rejected("countries must be a list"));
        };

        let mut codes: Vec<Value> = Vec::with_capacity(items.len());
        for item in items {
            let Value::String(raw) = item else {
                return Err(SanitizeError::rejected("country code must be a string"));
            };

            let code = raw.trim().to_ascii_uppercase();
            if code.len() != 2 || !code.chars().all(|c| c.is_ascii_uppercase()) {
                return Err(SanitizeError::rejected(format!(
                    "invalid country code '{}'",
                    raw
                )));
            }

            let code = Value::String(code);
            if !codes.contains(&code) {
                codes.push(code);
            }
        }

        Ok(Value::Array(codes))
    }

    /// Key/value metadata: must be an object; `null` entries are dropped;
    /// keys must be non-empty and free of control characters.
    pub fn metadata(value: Value) -> Result<Value, SanitizeError> {
        let Value::Object(entries) = value else {
            return Err(SanitizeError::rejected("metadata must be an object"));
        };

        let mut clean = Map::with_capacity(entries.len());
        for (key, entry) in entries {
            let key_trimmed = key.trim();
            if key_trimmed.is_empty() || key_trimmed.chars().any(char::is_control) {
                return Err(SanitizeError::rejected(format!(
                    "invalid metadata key {:?}",
                    key
                )));
            }
            if entry.is_null() {
                continue;
            }
            clean.insert(key_trimmed.to_string(), entry);
        }

        Ok(Value::Object(clean))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_null_bypasses_sanitizer() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let column = SanitizedJson::new("data", move |value| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(value)
        });

        assert_eq!(column.sanitize(None).unwrap(), None);
        assert_eq!(column.sanitize(Some(Value::Null)).unwrap(), None);
        assert_eq!(column.encode(None).unwrap(), None);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_stores_sanitizer_output() {
        let column = SanitizedJson::new("data", |_| Ok(json!({"clean": true})));

        let stored = column.encode(Some(&json!({"dirty": "<script>"}))).unwrap();
        assert_eq!(stored.as_deref(), Some(r#"{"clean":true}"#));
        assert_eq!(
            column.decode(stored.as_deref()).unwrap(),
            Some(json!({"clean": true}))
        );
    }

    #[test]
    fn test_rejection_propagates() {
        let column = SanitizedJson::new("countries", sanitizers::country_codes);
        let err = column.encode(Some(&json!(["PL", "Poland"]))).unwrap_err();
        assert!(matches!(err, SanitizeError::Rejected { .. }));
    }

    #[test]
    fn test_decode_is_untransformed() {
        let column = SanitizedJson::new("countries", sanitizers::country_codes);

        // Would be rejected on write, but reads never sanitize.
        assert_eq!(
            column.decode(Some(r#"["pl"]"#)).unwrap(),
            Some(json!(["pl"]))
        );
        assert_eq!(column.decode(Some("null")).unwrap(), None);
        assert_eq!(column.decode(None).unwrap(), None);
        assert!(matches!(
            column.decode(Some("{not json")),
            Err(SanitizeError::Serialization(_))
        ));
    }

    #[test]
    fn test_country_codes() {
        assert_eq!(
            sanitizers::country_codes(json!([" pl", "DE", "PL", "us"])).unwrap(),
            json!(["PL", "DE", "US"])
        );
        assert_eq!(sanitizers::country_codes(json!([])).unwrap(), json!([]));
        assert!(sanitizers::country_codes(json!("PL")).is_err());
        assert!(sanitizers::country_codes(json!([1])).is_err());
        assert!(sanitizers::country_codes(json!(["P1"])).is_err());
    }

    #[test]
    fn test_metadata() {
        assert_eq!(
            sanitizers::metadata(json!({" source ": "api", "drop": null, "n": 1})).unwrap(),
            json!({"source": "api", "n": 1})
        );
        assert!(sanitizers::metadata(json!(["a"])).is_err());
        assert!(sanitizers::metadata(json!({"": 1})).is_err());
        assert!(sanitizers::metadata(json!({"bad\nkey": 1})).is_err());
    }
}

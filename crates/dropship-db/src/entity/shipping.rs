//! Shipping zone row.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::fields::{sanitizers, SanitizedJson};

/// A named set of countries shipped to under the same methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShippingZone {
    pub id: String,
    pub name: String,
    /// JSON list of two-letter country codes; `None` is stored as NULL.
    pub countries: Option<Value>,
    pub is_default: bool,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShippingZone {
    pub fn new(name: impl Into<String>, countries: Option<Value>) -> Self {
        let now = Utc::now();
        ShippingZone {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            countries,
            is_default: false,
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn countries_column() -> &'static SanitizedJson {
        static COLUMN: OnceLock<SanitizedJson> = OnceLock::new();
        COLUMN.get_or_init(|| SanitizedJson::new("countries", sanitizers::country_codes))
    }

    /// Country codes as strings; non-string entries are skipped.
    pub fn country_codes(&self) -> Vec<String> {
        match &self.countries {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn covers(&self, country: &str) -> bool {
        let country = country.trim();
        self.country_codes()
            .iter()
            .any(|code| code.eq_ignore_ascii_case(country))
    }
}

//! # Field Mapping
//!
//! Adapters between flat stored columns and domain values.
//!
//! - [`composite`] - money columns read and written as `Amount` / `TaxedAmount`
//! - [`sanitized`] - JSON columns that run a sanitizer on every write

pub mod composite;
pub mod sanitized;

pub use composite::{
    ColumnAccess, ColumnValue, CompositeField, FieldError, FieldKind, FieldSet, MoneyField,
    TaxedMoneyField,
};
pub use sanitized::{sanitizers, SanitizeError, SanitizedJson, Sanitizer};

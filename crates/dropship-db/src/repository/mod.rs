//! # Repository Module
//!
//! Row-level operations for the host entities.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  caller                                                                │
//! │    │  let mut s = db.session(writer_allowed).await?;                   │
//! │    │  db.orders().insert(&mut s, &order).await?;                       │
//! │    ▼                                                                    │
//! │  OrderRepository                                                       │
//! │  ├── validate amounts against NUMERIC(max_digits, decimal_places)      │
//! │  ├── encode sanitized JSON columns                                     │
//! │  └── SQL through the Session ──► access guard ──► SQLite               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Repositories hold no connection. The caller picks the session, and with
//! it the pool and the transaction boundary.
//!
//! ## Available Repositories
//!
//! - [`OrderRepository`] - orders with composite shipping prices
//! - [`ShippingZoneRepository`] - zones with sanitized country lists

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::error::{DbError, DbResult};
use crate::fields::{SanitizeError, SanitizedJson};

pub mod order;
pub mod shipping;

pub use order::OrderRepository;
pub use shipping::ShippingZoneRepository;

/// Canonical TEXT form of a stored amount.
pub(crate) fn decimal_to_text(value: Option<Decimal>) -> Option<String> {
    value.map(|value| value.to_string())
}

/// Reads a TEXT decimal column.
pub(crate) fn get_decimal(row: &SqliteRow, column: &str) -> DbResult<Option<Decimal>> {
    let text: Option<String> = row.try_get(column)?;
    text.map(|text| Decimal::from_str(text.trim()).map_err(|e| DbError::decode(column, e)))
        .transpose()
}

/// Reads a sanitized JSON column.
pub(crate) fn get_json(
    row: &SqliteRow,
    column: &SanitizedJson,
) -> DbResult<Option<Value>> {
    let text: Option<String> = row.try_get(column.column())?;
    Ok(column.decode(text.as_deref())?)
}

/// Serializes an already-sanitized payload to its stored TEXT form.
pub(crate) fn to_text(value: Option<&Value>) -> DbResult<Option<String>> {
    value
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| DbError::from(SanitizeError::from(e)))
}

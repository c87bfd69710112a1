//! # Monetary Values
//!
//! `MonetaryValue` is the dynamically-typed form of the two value objects.
//! Composite field descriptors hand it out and accept it back, so a setter
//! can tell "wrong kind of money" apart from "no money".

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{MoneyError, MoneyResult};
use crate::money::{Amount, Currency};
use crate::taxed::TaxedAmount;

/// Either an `Amount` or a `TaxedAmount`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MonetaryValue {
    Amount(Amount),
    Taxed(TaxedAmount),
}

/// Which value object a `MonetaryValue` (or a field) carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MonetaryKind {
    Amount,
    Taxed,
}

impl MonetaryKind {
    /// Name used in `TypeMismatch` errors.
    pub const fn name(self) -> &'static str {
        match self {
            MonetaryKind::Amount => "Amount",
            MonetaryKind::Taxed => "TaxedAmount",
        }
    }
}

impl fmt::Display for MonetaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl MonetaryValue {
    /// Returns the kind of value object held.
    pub fn kind(&self) -> MonetaryKind {
        match self {
            MonetaryValue::Amount(_) => MonetaryKind::Amount,
            MonetaryValue::Taxed(_) => MonetaryKind::Taxed,
        }
    }

    /// Returns the currency of the held value.
    pub fn currency(&self) -> &Currency {
        match self {
            MonetaryValue::Amount(a) => a.currency(),
            MonetaryValue::Taxed(t) => t.currency(),
        }
    }

    /// Returns the inner `Amount`, or `TypeMismatch`.
    pub fn into_amount(self) -> MoneyResult<Amount> {
        match self {
            MonetaryValue::Amount(a) => Ok(a),
            other => Err(other.mismatch(MonetaryKind::Amount)),
        }
    }

    /// Returns the inner `TaxedAmount`, or `TypeMismatch`.
    pub fn into_taxed(self) -> MoneyResult<TaxedAmount> {
        match self {
            MonetaryValue::Taxed(t) => Ok(t),
            other => Err(other.mismatch(MonetaryKind::Taxed)),
        }
    }

    /// Adds two values of the same kind and currency.
    pub fn add(&self, other: &MonetaryValue) -> MoneyResult<MonetaryValue> {
        match (self, other) {
            (MonetaryValue::Amount(a), MonetaryValue::Amount(b)) => a.add(b).map(Into::into),
            (MonetaryValue::Taxed(a), MonetaryValue::Taxed(b)) => a.add(b).map(Into::into),
            _ => Err(other.mismatch(self.kind())),
        }
    }

    /// Subtracts a value of the same kind and currency.
    pub fn subtract(&self, other: &MonetaryValue) -> MoneyResult<MonetaryValue> {
        match (self, other) {
            (MonetaryValue::Amount(a), MonetaryValue::Amount(b)) => a.subtract(b).map(Into::into),
            (MonetaryValue::Taxed(a), MonetaryValue::Taxed(b)) => a.subtract(b).map(Into::into),
            _ => Err(other.mismatch(self.kind())),
        }
    }

    fn mismatch(&self, expected: MonetaryKind) -> MoneyError {
        MoneyError::TypeMismatch {
            expected: expected.name(),
            found: self.kind().name(),
        }
    }
}

impl From<Amount> for MonetaryValue {
    fn from(amount: Amount) -> Self {
        MonetaryValue::Amount(amount)
    }
}

impl From<TaxedAmount> for MonetaryValue {
    fn from(taxed: TaxedAmount) -> Self {
        MonetaryValue::Taxed(taxed)
    }
}

impl fmt::Display for MonetaryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonetaryValue::Amount(a) => a.fmt(f),
            MonetaryValue::Taxed(t) => t.fmt(f),
        }
    }
}

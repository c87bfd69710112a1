//! # Error Types
//!
//! Domain-specific error types for dropship-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  dropship-core errors (this file)                                      │
//! │  ├── MoneyError       - Monetary arithmetic violations                 │
//! │  └── ValidationError  - Amount/currency shape failures                 │
//! │                                                                         │
//! │  dropship-db errors (separate crate)                                   │
//! │  ├── FieldError       - Composite column mapping failures              │
//! │  └── DbError          - Storage + UnsafeWriterAccess                   │
//! │                                                                         │
//! │  Flow: MoneyError → FieldError → DbError → API layer (out of scope)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Every `MoneyError` is a programming error: callers never retry it
//! 3. Errors are enum variants, never String

use thiserror::Error;

// =============================================================================
// Money Error
// =============================================================================

/// Monetary arithmetic errors.
///
/// None of these are expected under correct usage. They are raised at the
/// violating call and never coerced into a "best effort" result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    /// Binary operation on two different currencies.
    ///
    /// ## When This Occurs
    /// ```text
    /// Amount(10, "USD").add(Amount(5, "EUR"))
    ///      │
    ///      ▼
    /// CurrencyMismatch { left: "USD", right: "EUR" }
    /// ```
    #[error("Currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: String, right: String },

    /// Operand of the wrong kind (e.g. a string scalar, or a TaxedAmount
    /// where an Amount was expected).
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// Division by a zero scalar.
    #[error("Division by zero")]
    DivisionByZero,

    /// Result does not fit the 28-digit decimal range.
    #[error("Arithmetic overflow in {operation}")]
    Overflow { operation: &'static str },

    /// Input could not be read as a decimal number.
    #[error("Invalid amount '{input}': {reason}")]
    InvalidAmount { input: String, reason: String },
}

impl MoneyError {
    /// Creates a CurrencyMismatch error from two currency codes.
    pub fn currency_mismatch(left: impl Into<String>, right: impl Into<String>) -> Self {
        MoneyError::CurrencyMismatch {
            left: left.into(),
            right: right.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Used before persisting so that a value which would not fit its column
/// is rejected at the call site rather than truncated by storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Invalid format (e.g., currency code with digits).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// More significant digits than the column allows.
    #[error("{field} has {digits} digits, at most {max} allowed")]
    TooManyDigits { field: String, digits: u32, max: u32 },

    /// More fractional digits than the column allows.
    #[error("{field} has {places} decimal places, at most {max} allowed")]
    TooManyDecimalPlaces { field: String, places: u32, max: u32 },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with MoneyError.
pub type MoneyResult<T> = Result<T, MoneyError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = MoneyError::currency_mismatch("USD", "EUR");
        assert_eq!(err.to_string(), "Currency mismatch: USD vs EUR");

        let err = MoneyError::TypeMismatch {
            expected: "number",
            found: "string",
        };
        assert_eq!(err.to_string(), "Type mismatch: expected number, found string");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::TooManyDecimalPlaces {
            field: "amount".to_string(),
            places: 3,
            max: 2,
        };
        assert_eq!(
            err.to_string(),
            "amount has 3 decimal places, at most 2 allowed"
        );
    }
}

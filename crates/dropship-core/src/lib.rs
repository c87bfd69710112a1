//! # dropship-core: Monetary Value Model
//!
//! This crate is the **heart** of the Dropship monetary layer. It contains
//! the value objects every price, total and tax flows through, as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Dropship Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            HTTP handlers / CRUD (out of scope)                  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ dropship-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌─────────────┐  ┌───────────┐  ┌──────────┐  │   │
//! │  │   │   money   │  │    taxed    │  │   value   │  │validation│  │   │
//! │  │   │  Amount   │  │ TaxedAmount │  │ Monetary  │  │ currency │  │   │
//! │  │   │ Currency  │  │  TaxRate    │  │  Value    │  │ precision│  │   │
//! │  │   └───────────┘  └─────────────┘  └───────────┘  └──────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │       dropship-db (composite columns, guarded sessions)         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - `Amount` and `Currency` with checked arithmetic
//! - [`taxed`] - `TaxedAmount` (net/gross pair) and `TaxRate`
//! - [`value`] - `MonetaryValue`, the dynamically-typed form of both
//! - [`error`] - Domain error types
//! - [`validation`] - Currency and precision checks
//!
//! ## Design Principles
//!
//! 1. **Immutable**: every operation returns a new value
//! 2. **Checked**: currency mismatches are errors, never coerced
//! 3. **Decimal**: base-10 arithmetic end to end, no floats after construction
//!
//! ## Example Usage
//!
//! ```rust
//! use dropship_core::{Amount, TaxedAmount};
//!
//! let net = Amount::new(100, "usd");
//! let gross = Amount::new(107, "USD");
//! let price = TaxedAmount::new(net, gross).unwrap();
//!
//! assert_eq!(price.tax().unwrap(), Amount::new(7, "USD"));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod taxed;
pub mod validation;
pub mod value;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{MoneyError, MoneyResult, ValidationError};
pub use money::{Amount, Currency, Scalar};
pub use taxed::{TaxRate, TaxedAmount};
pub use value::{MonetaryKind, MonetaryValue};

/// Re-exported so callers can name amounts without a direct dependency.
pub use rust_decimal::Decimal;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Length of a currency code column (ISO 4217 alpha codes).
pub const DEFAULT_CURRENCY_CODE_LENGTH: usize = 3;

/// Total digits of a stored amount: `NUMERIC(12, 2)`.
pub const DEFAULT_MAX_DIGITS: u32 = 12;

/// Fractional digits of a stored amount: `NUMERIC(12, 2)`.
pub const DEFAULT_DECIMAL_PLACES: u32 = 2;

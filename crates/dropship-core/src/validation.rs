//! # Validation Module
//!
//! Shape checks for currency codes and stored amounts.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: API layer (out of scope)                                     │
//! │  └── Request shape, user-facing messages                               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Currency code shape                                               │
//! │  └── Amount fits NUMERIC(max_digits, decimal_places)                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Repositories call Layer 2 before every write                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Amounts are never rounded here. A value with too many decimal places is
//! rejected; the caller decides how to round (see `Amount::quantize`).

use rust_decimal::Decimal;

use crate::error::ValidationError;
use crate::money::Amount;
use crate::taxed::TaxRate;
use crate::DEFAULT_CURRENCY_CODE_LENGTH;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Currency Validators
// =============================================================================

/// Validates a currency code.
///
/// ## Rules
/// - Must not be empty
/// - Exactly `DEFAULT_CURRENCY_CODE_LENGTH` (3) ASCII letters
///
/// ## Example
/// ```rust
/// use dropship_core::validation::validate_currency_code;
///
/// assert!(validate_currency_code("USD").is_ok());
/// assert!(validate_currency_code("usd").is_ok());
/// assert!(validate_currency_code("US").is_err());
/// assert!(validate_currency_code("U5D").is_err());
/// ```
pub fn validate_currency_code(code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "currency".to_string(),
        });
    }

    if code.chars().count() != DEFAULT_CURRENCY_CODE_LENGTH
        || !code.chars().all(|c| c.is_ascii_alphabetic())
    {
        return Err(ValidationError::InvalidFormat {
            field: "currency".to_string(),
            reason: format!("must be {} ASCII letters", DEFAULT_CURRENCY_CODE_LENGTH),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates that a value fits a `NUMERIC(max_digits, decimal_places)` column.
///
/// ## Rules
/// - At most `max_digits - decimal_places` digits before the point
/// - At most `decimal_places` significant digits after the point
///   (trailing zeros do not count: `10.500` fits two places)
///
/// ## Example
/// ```rust
/// use dropship_core::validation::validate_amount_precision;
/// use rust_decimal::Decimal;
/// use std::str::FromStr;
///
/// let ok = Decimal::from_str("9999999999.99").unwrap();
/// assert!(validate_amount_precision("amount", ok, 12, 2).is_ok());
///
/// let too_big = Decimal::from_str("10000000000").unwrap();
/// assert!(validate_amount_precision("amount", too_big, 12, 2).is_err());
/// ```
pub fn validate_amount_precision(
    field: &str,
    value: Decimal,
    max_digits: u32,
    decimal_places: u32,
) -> ValidationResult<()> {
    let normalized = value.normalize();

    let places = normalized.scale();
    if places > decimal_places {
        return Err(ValidationError::TooManyDecimalPlaces {
            field: field.to_string(),
            places,
            max: decimal_places,
        });
    }

    let integer_part = normalized.trunc().abs();
    let integer_digits = if integer_part.is_zero() {
        0
    } else {
        integer_part.normalize().to_string().len() as u32
    };
    let max_integer_digits = max_digits.saturating_sub(decimal_places);
    if integer_digits > max_integer_digits {
        return Err(ValidationError::TooManyDigits {
            field: field.to_string(),
            digits: integer_digits + places,
            max: max_digits,
        });
    }

    Ok(())
}

/// Validates an `Amount` before it is written: currency shape plus precision.
pub fn validate_amount(
    field: &str,
    amount: &Amount,
    max_digits: u32,
    decimal_places: u32,
) -> ValidationResult<()> {
    validate_currency_code(amount.currency().code())?;
    validate_amount_precision(field, amount.value(), max_digits, decimal_places)
}

/// Validates a tax rate.
///
/// ## Rules
/// - Between 0 and 1 (0 % to 100 %)
/// - Fits `NUMERIC(5, 4)`
pub fn validate_tax_rate(rate: TaxRate) -> ValidationResult<()> {
    let fraction = rate.fraction();

    if fraction < Decimal::ZERO || fraction > Decimal::ONE {
        return Err(ValidationError::InvalidFormat {
            field: "tax_rate".to_string(),
            reason: "must be between 0 and 1".to_string(),
        });
    }

    validate_amount_precision("tax_rate", fraction, 5, 4)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_validate_currency_code() {
        assert!(validate_currency_code("USD").is_ok());
        assert!(validate_currency_code(" eur ").is_ok());

        assert!(validate_currency_code("").is_err());
        assert!(validate_currency_code("   ").is_err());
        assert!(validate_currency_code("USDT").is_err());
        assert!(validate_currency_code("U$D").is_err());
    }

    #[test]
    fn test_precision_decimal_places() {
        assert!(validate_amount_precision("a", dec!(10.50), 12, 2).is_ok());
        assert!(validate_amount_precision("a", dec!(10.500), 12, 2).is_ok());
        assert_eq!(
            validate_amount_precision("a", dec!(10.505), 12, 2),
            Err(ValidationError::TooManyDecimalPlaces {
                field: "a".to_string(),
                places: 3,
                max: 2
            })
        );
    }

    #[test]
    fn test_precision_integer_digits() {
        assert!(validate_amount_precision("a", dec!(0), 12, 2).is_ok());
        assert!(validate_amount_precision("a", dec!(0.99), 12, 2).is_ok());
        assert!(validate_amount_precision("a", dec!(9999999999), 12, 2).is_ok());
        assert!(validate_amount_precision("a", dec!(-9999999999.99), 12, 2).is_ok());
        assert!(matches!(
            validate_amount_precision("a", dec!(10000000000), 12, 2),
            Err(ValidationError::TooManyDigits { .. })
        ));
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount("price", &Amount::new(dec!(19.99), "usd"), 12, 2).is_ok());
        assert!(validate_amount("price", &Amount::new(dec!(19.99), "DOLLAR"), 12, 2).is_err());
    }

    #[test]
    fn test_validate_tax_rate() {
        assert!(validate_tax_rate(TaxRate::from_bps(825)).is_ok());
        assert!(validate_tax_rate(TaxRate::zero()).is_ok());
        assert!(validate_tax_rate(TaxRate::from_fraction(dec!(1.5))).is_err());
        assert!(validate_tax_rate(TaxRate::from_fraction(dec!(-0.1))).is_err());
        assert!(validate_tax_rate(TaxRate::from_fraction(dec!(0.12345))).is_err());
    }
}

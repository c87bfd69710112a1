//! # Money Module
//!
//! Provides the `Amount` type: an immutable (value, currency) pair with
//! currency-checked arithmetic.
//!
//! ## Why Decimal + Currency?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE TWO CLASSIC MONEY BUGS                                             │
//! │                                                                         │
//! │  1. Binary floating point:                                              │
//! │       0.1 + 0.2 = 0.30000000000000004  ❌                               │
//! │     → every value is a base-10 Decimal; floats are converted through    │
//! │       their shortest decimal string ("0.1"), never bit-for-bit.         │
//! │                                                                         │
//! │  2. Silent cross-currency math:                                         │
//! │       10 USD + 5 EUR = 15 ???          ❌                               │
//! │     → every binary operation checks currencies and fails with           │
//! │       CurrencyMismatch instead of guessing.                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use dropship_core::money::Amount;
//!
//! let price = Amount::new(10, "usd");
//! let total = price.add(&Amount::new(5, "USD")).unwrap();
//! assert_eq!(total, Amount::new(15, "USD"));
//! assert_eq!(total.to_string(), "15 USD");
//!
//! // Different currencies never mix
//! assert!(price.add(&Amount::new(5, "EUR")).is_err());
//! ```

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{MoneyError, MoneyResult};

// =============================================================================
// Currency
// =============================================================================

/// An uppercase currency code such as `USD`.
///
/// Construction never fails: the code is trimmed and uppercased. Shape checks
/// (three ASCII letters) live in [`crate::validation::validate_currency_code`]
/// so that reading stored rows never rejects legacy data.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    /// Creates a currency from any code, uppercasing it.
    pub fn new(code: impl AsRef<str>) -> Self {
        Currency(code.as_ref().trim().to_uppercase())
    }

    /// Returns the uppercase code.
    #[inline]
    pub fn code(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Currency {
    fn from(code: &str) -> Self {
        Currency::new(code)
    }
}

impl From<String> for Currency {
    fn from(code: String) -> Self {
        Currency::new(code)
    }
}

impl From<&Currency> for Currency {
    fn from(currency: &Currency) -> Self {
        currency.clone()
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.0
    }
}

// =============================================================================
// Scalar
// =============================================================================

/// A numeric operand accepted by `Amount::from_scalar`, `multiply` and `divide`.
///
/// ## Accepted Inputs
/// ```text
/// i32 / i64 / u32 / u64 / Decimal  → exact
/// f32 / f64                         → via shortest decimal string (0.1 → "0.1")
/// serde_json::Value::Number         → via its textual form
/// serde_json::Value (anything else) → TypeMismatch
/// ```
pub trait Scalar {
    /// Converts the operand to a `Decimal`.
    fn to_decimal(&self) -> MoneyResult<Decimal>;
}

macro_rules! exact_scalar {
    ($($ty:ty),*) => {
        $(
            impl Scalar for $ty {
                #[inline]
                fn to_decimal(&self) -> MoneyResult<Decimal> {
                    Ok(Decimal::from(*self))
                }
            }
        )*
    };
}

exact_scalar!(i32, i64, u32, u64);

impl Scalar for Decimal {
    #[inline]
    fn to_decimal(&self) -> MoneyResult<Decimal> {
        Ok(*self)
    }
}

impl Scalar for f64 {
    fn to_decimal(&self) -> MoneyResult<Decimal> {
        if !self.is_finite() {
            return Err(MoneyError::InvalidAmount {
                input: self.to_string(),
                reason: "not a finite number".to_string(),
            });
        }
        // Display for f64 never uses exponent notation and yields the
        // shortest string that round-trips, i.e. the "intended" decimal.
        parse_decimal(&self.to_string())
    }
}

impl Scalar for f32 {
    fn to_decimal(&self) -> MoneyResult<Decimal> {
        if !self.is_finite() {
            return Err(MoneyError::InvalidAmount {
                input: self.to_string(),
                reason: "not a finite number".to_string(),
            });
        }
        parse_decimal(&self.to_string())
    }
}

impl Scalar for serde_json::Value {
    fn to_decimal(&self) -> MoneyResult<Decimal> {
        use serde_json::Value;

        match self {
            Value::Number(n) => parse_decimal(&n.to_string()),
            Value::Null => Err(type_mismatch("null")),
            Value::Bool(_) => Err(type_mismatch("bool")),
            Value::String(_) => Err(type_mismatch("string")),
            Value::Array(_) => Err(type_mismatch("array")),
            Value::Object(_) => Err(type_mismatch("object")),
        }
    }
}

impl<T: Scalar + ?Sized> Scalar for &T {
    #[inline]
    fn to_decimal(&self) -> MoneyResult<Decimal> {
        (**self).to_decimal()
    }
}

fn type_mismatch(found: &'static str) -> MoneyError {
    MoneyError::TypeMismatch {
        expected: "number",
        found,
    }
}

/// Parses decimal text, accepting plain (`"10.50"`) and scientific (`"1e-2"`) forms.
pub(crate) fn parse_decimal(input: &str) -> MoneyResult<Decimal> {
    let text = input.trim();

    let parsed = if text.contains(['e', 'E']) {
        Decimal::from_scientific(text)
    } else {
        Decimal::from_str(text)
    };

    parsed.map_err(|e| MoneyError::InvalidAmount {
        input: input.to_string(),
        reason: e.to_string(),
    })
}

// =============================================================================
// Amount
// =============================================================================

/// A monetary amount in a specific currency.
///
/// ## Design Decisions
/// - **Decimal value**: full precision is kept; nothing is rounded implicitly
/// - **Immutable**: every operation returns a new `Amount`
/// - **Checked**: binary operations return `MoneyResult` instead of panicking
///
/// ## Where Amount is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  order.shipping_price_net_amount ─┐                                    │
/// │  order.currency ──────────────────┴─► MoneyField ─► Amount             │
/// │                                                       │                 │
/// │                     add / subtract / multiply / divide ▼                │
/// │                                                    Amount ─► columns    │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Amount {
    value: Decimal,
    currency: Currency,
}

impl Amount {
    /// Creates an amount from an exact value (integer or `Decimal`).
    ///
    /// ## Example
    /// ```rust
    /// use dropship_core::money::Amount;
    ///
    /// let a = Amount::new(10, "usd");
    /// assert_eq!(a.currency().code(), "USD");
    /// ```
    pub fn new(value: impl Into<Decimal>, currency: impl Into<Currency>) -> Self {
        Amount {
            value: value.into(),
            currency: currency.into(),
        }
    }

    /// Creates an amount from decimal text such as `"19.99"`.
    ///
    /// ## Example
    /// ```rust
    /// use dropship_core::money::Amount;
    ///
    /// let a = Amount::parse("19.99", "EUR").unwrap();
    /// assert_eq!(a.to_string(), "19.99 EUR");
    /// assert!(Amount::parse("nineteen", "EUR").is_err());
    /// ```
    pub fn parse(text: &str, currency: impl Into<Currency>) -> MoneyResult<Self> {
        Ok(Amount::new(parse_decimal(text)?, currency))
    }

    /// Creates an amount from any [`Scalar`], including floats.
    ///
    /// ## Example
    /// ```rust
    /// use dropship_core::money::Amount;
    ///
    /// let a = Amount::from_scalar(0.1_f64, "usd").unwrap();
    /// assert_eq!(a.to_string(), "0.1 USD");
    /// ```
    pub fn from_scalar(value: impl Scalar, currency: impl Into<Currency>) -> MoneyResult<Self> {
        Ok(Amount::new(value.to_decimal()?, currency))
    }

    /// Returns zero in the given currency.
    pub fn zero(currency: impl Into<Currency>) -> Self {
        Amount::new(Decimal::ZERO, currency)
    }

    /// Returns the decimal value.
    #[inline]
    pub fn value(&self) -> Decimal {
        self.value
    }

    /// Returns the currency.
    #[inline]
    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    /// Checks if the value is zero.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    /// Checks if the value is greater than zero.
    #[inline]
    pub fn is_positive(&self) -> bool {
        self.value > Decimal::ZERO
    }

    /// Checks if the value is less than zero.
    #[inline]
    pub fn is_negative(&self) -> bool {
        self.value < Decimal::ZERO
    }

    /// Returns the absolute value.
    pub fn abs(&self) -> Self {
        Amount::new(self.value.abs(), &self.currency)
    }

    /// Returns the amount with its sign flipped (refunds, credits).
    pub fn negate(&self) -> Self {
        Amount::new(-self.value, &self.currency)
    }

    /// Fails with `CurrencyMismatch` unless both amounts share a currency.
    pub fn ensure_same_currency(&self, other: &Amount) -> MoneyResult<()> {
        if self.currency != other.currency {
            return Err(MoneyError::currency_mismatch(
                self.currency.code(),
                other.currency.code(),
            ));
        }
        Ok(())
    }

    /// Adds two amounts of the same currency.
    pub fn add(&self, other: &Amount) -> MoneyResult<Amount> {
        self.ensure_same_currency(other)?;
        let value = self
            .value
            .checked_add(other.value)
            .ok_or(MoneyError::Overflow { operation: "add" })?;
        Ok(Amount::new(value, &self.currency))
    }

    /// Subtracts an amount of the same currency.
    pub fn subtract(&self, other: &Amount) -> MoneyResult<Amount> {
        self.ensure_same_currency(other)?;
        let value = self
            .value
            .checked_sub(other.value)
            .ok_or(MoneyError::Overflow {
                operation: "subtract",
            })?;
        Ok(Amount::new(value, &self.currency))
    }

    /// Multiplies by a numeric scalar (quantity, rate, factor).
    ///
    /// ## Example
    /// ```rust
    /// use dropship_core::money::Amount;
    ///
    /// let unit = Amount::parse("2.99", "USD").unwrap();
    /// assert_eq!(unit.multiply(3).unwrap(), Amount::parse("8.97", "USD").unwrap());
    /// ```
    pub fn multiply(&self, scalar: impl Scalar) -> MoneyResult<Amount> {
        let factor = scalar.to_decimal()?;
        let value = self
            .value
            .checked_mul(factor)
            .ok_or(MoneyError::Overflow {
                operation: "multiply",
            })?;
        Ok(Amount::new(value, &self.currency))
    }

    /// Divides by a numeric scalar. No rounding is applied to the quotient.
    pub fn divide(&self, scalar: impl Scalar) -> MoneyResult<Amount> {
        let divisor = scalar.to_decimal()?;
        if divisor.is_zero() {
            return Err(MoneyError::DivisionByZero);
        }
        let value = self
            .value
            .checked_div(divisor)
            .ok_or(MoneyError::Overflow {
                operation: "divide",
            })?;
        Ok(Amount::new(value, &self.currency))
    }

    /// Rounds to `places` fractional digits using Bankers Rounding.
    ///
    /// ## Bankers Rounding
    /// ```text
    /// 0.125 → 0.12   (midpoint, 2 is even)
    /// 0.135 → 0.14   (midpoint, 4 is even)
    /// 0.126 → 0.13   (not a midpoint)
    /// ```
    /// Midpoints alternate direction, so millions of roundings carry no
    /// systematic bias.
    pub fn round_dp(&self, places: u32) -> Amount {
        Amount::new(
            self.value
                .round_dp_with_strategy(places, RoundingStrategy::MidpointNearestEven),
            &self.currency,
        )
    }

    /// Rounds to the default storage precision and pads the scale, so that
    /// `10` becomes `10.00`.
    pub fn quantize(&self, places: u32) -> Amount {
        let mut rounded = self.round_dp(places);
        rounded.value.rescale(places);
        rounded
    }
}

/// `"<value> <currency>"` at full stored precision.
impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.currency)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_construct_normalizes_currency() {
        let a = Amount::new(10, " usd ");
        assert_eq!(a.currency().code(), "USD");
        assert_eq!(a.value(), dec!(10));
    }

    #[test]
    fn test_construct_from_every_numeric_form() {
        assert_eq!(Amount::from_scalar(7_i64, "USD").unwrap().value(), dec!(7));
        assert_eq!(Amount::parse("7.25", "USD").unwrap().value(), dec!(7.25));
        assert_eq!(Amount::from_scalar(7.25_f64, "USD").unwrap().value(), dec!(7.25));
        assert_eq!(Amount::from_scalar(dec!(7.25), "USD").unwrap().value(), dec!(7.25));
    }

    #[test]
    fn test_float_goes_through_decimal_text() {
        // 0.1 is not representable in binary; the decimal form is what we keep.
        let a = Amount::from_scalar(0.1_f64, "USD").unwrap();
        assert_eq!(a.value(), dec!(0.1));

        let sum = Amount::from_scalar(0.1_f64, "USD")
            .unwrap()
            .add(&Amount::from_scalar(0.2_f64, "USD").unwrap())
            .unwrap();
        assert_eq!(sum.value(), dec!(0.3));
    }

    #[test]
    fn test_non_finite_float_is_rejected() {
        let err = Amount::from_scalar(f64::NAN, "USD").unwrap_err();
        assert!(matches!(err, MoneyError::InvalidAmount { .. }));
    }

    #[test]
    fn test_add_normalized_currencies() {
        let total = Amount::new(10, "usd").add(&Amount::new(5, "USD")).unwrap();
        assert_eq!(total, Amount::new(15, "USD"));
    }

    #[test]
    fn test_add_currency_mismatch() {
        let err = Amount::new(10, "USD")
            .add(&Amount::new(5, "EUR"))
            .unwrap_err();
        assert_eq!(err, MoneyError::currency_mismatch("USD", "EUR"));

        let err = Amount::new(10, "USD")
            .subtract(&Amount::new(5, "EUR"))
            .unwrap_err();
        assert!(matches!(err, MoneyError::CurrencyMismatch { .. }));
    }

    #[test]
    fn test_add_then_subtract_round_trips() {
        let samples = [
            (dec!(0), dec!(0)),
            (dec!(10.50), dec!(0.01)),
            (dec!(-3.3333), dec!(99999.999)),
            (dec!(1234567.89), dec!(-1234567.89)),
        ];
        for (a, b) in samples {
            let a = Amount::new(a, "USD");
            let b = Amount::new(b, "USD");
            assert_eq!(a.add(&b).unwrap().subtract(&b).unwrap(), a);
        }
    }

    #[test]
    fn test_multiply_and_divide() {
        let a = Amount::parse("10.00", "USD").unwrap();
        assert_eq!(a.multiply(3).unwrap().value(), dec!(30));
        assert_eq!(a.multiply(0.5_f64).unwrap().value(), dec!(5));
        assert_eq!(a.divide(4).unwrap().value(), dec!(2.5));
        // Full precision: no rounding at division time
        assert_eq!(
            a.divide(3).unwrap().value(),
            dec!(10) / dec!(3)
        );
    }

    #[test]
    fn test_divide_by_zero() {
        let a = Amount::new(10, "USD");
        assert_eq!(a.divide(0).unwrap_err(), MoneyError::DivisionByZero);
        assert_eq!(a.divide(dec!(0.00)).unwrap_err(), MoneyError::DivisionByZero);
    }

    #[test]
    fn test_non_numeric_json_scalar() {
        let a = Amount::new(10, "USD");
        let err = a.multiply(serde_json::json!("3")).unwrap_err();
        assert_eq!(
            err,
            MoneyError::TypeMismatch {
                expected: "number",
                found: "string"
            }
        );
        assert_eq!(a.multiply(serde_json::json!(3)).unwrap().value(), dec!(30));
    }

    #[test]
    fn test_equality_is_exact() {
        assert_eq!(Amount::new(10, "USD"), Amount::parse("10.00", "usd").unwrap());
        assert_ne!(Amount::new(10, "USD"), Amount::new(10, "EUR"));
        assert_ne!(Amount::parse("10.001", "USD").unwrap(), Amount::new(10, "USD"));
    }

    #[test]
    fn test_display_keeps_full_precision() {
        assert_eq!(Amount::parse("10.50", "usd").unwrap().to_string(), "10.50 USD");
        assert_eq!(Amount::parse("0.0001", "EUR").unwrap().to_string(), "0.0001 EUR");
        assert_eq!(Amount::new(-5, "GBP").to_string(), "-5 GBP");
    }

    #[test]
    fn test_rounding_is_bankers() {
        assert_eq!(Amount::parse("0.125", "USD").unwrap().round_dp(2).value(), dec!(0.12));
        assert_eq!(Amount::parse("0.135", "USD").unwrap().round_dp(2).value(), dec!(0.14));
        assert_eq!(Amount::new(10, "USD").quantize(2).to_string(), "10.00 USD");
    }

    #[test]
    fn test_sign_helpers() {
        let refund = Amount::new(-550, "USD");
        assert!(refund.is_negative());
        assert_eq!(refund.abs(), Amount::new(550, "USD"));
        assert_eq!(refund.negate(), Amount::new(550, "USD"));
        assert!(Amount::zero("USD").is_zero());
    }

    #[test]
    fn test_serde_round_trip_uppercases() {
        let a: Amount = serde_json::from_str(r#"{"value":"12.30","currency":"eur"}"#).unwrap();
        assert_eq!(a, Amount::parse("12.30", "EUR").unwrap());
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, r#"{"value":"12.30","currency":"EUR"}"#);
    }
}

//! # Taxed Amounts
//!
//! `TaxedAmount` pairs a net and a gross [`Amount`] in one currency; the tax
//! is whatever lies between them.
//!
//! ## Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  TaxedAmount                                                            │
//! │    net   = 100.00 USD ─┐                                               │
//! │    gross = 107.00 USD ─┴─► tax = gross - net = 7.00 USD (derived)      │
//! │    currency = USD        (derived from net, checked against gross)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `tax` is recomputed on every access: the inputs are immutable, so there
//! is nothing to keep in sync.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{MoneyError, MoneyResult};
use crate::money::{Amount, Currency};

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate stored as a decimal fraction (`0.0825` = 8.25 %).
///
/// Matches the `NUMERIC(5, 4)` tax-rate columns on order rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaxRate(Decimal);

impl TaxRate {
    /// Creates a rate from a fraction (`0.07` = 7 %).
    #[inline]
    pub const fn from_fraction(fraction: Decimal) -> Self {
        TaxRate(fraction)
    }

    /// Creates a rate from a percentage (`7` = 7 %).
    pub fn from_percentage(pct: Decimal) -> Self {
        TaxRate(pct / Decimal::ONE_HUNDRED)
    }

    /// Creates a rate from basis points (`825` = 8.25 %).
    pub fn from_bps(bps: u32) -> Self {
        TaxRate(Decimal::new(i64::from(bps), 4))
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(Decimal::ZERO)
    }

    /// Returns the rate as a fraction.
    #[inline]
    pub fn fraction(&self) -> Decimal {
        self.0
    }

    /// Checks if the rate is zero.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    fn multiplier(&self) -> MoneyResult<Decimal> {
        Decimal::ONE
            .checked_add(self.0)
            .ok_or(MoneyError::Overflow {
                operation: "tax multiplier",
            })
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

impl fmt::Display for TaxRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.checked_mul(Decimal::ONE_HUNDRED) {
            Some(percent) => write!(f, "{}%", percent.normalize()),
            // Too large to scale; show the raw fraction instead.
            None => write!(f, "{}", self.0.normalize()),
        }
    }
}

// =============================================================================
// Taxed Amount
// =============================================================================

/// A net/gross pair sharing one currency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawTaxedAmount")]
pub struct TaxedAmount {
    net: Amount,
    gross: Amount,
}

#[derive(Deserialize)]
struct RawTaxedAmount {
    net: Amount,
    gross: Amount,
}

impl TryFrom<RawTaxedAmount> for TaxedAmount {
    type Error = MoneyError;

    fn try_from(raw: RawTaxedAmount) -> MoneyResult<Self> {
        TaxedAmount::new(raw.net, raw.gross)
    }
}

impl TaxedAmount {
    /// Creates a taxed amount, failing with `CurrencyMismatch` when net and
    /// gross disagree on currency.
    ///
    /// ## Example
    /// ```rust
    /// use dropship_core::{Amount, TaxedAmount};
    ///
    /// let price = TaxedAmount::new(Amount::new(100, "USD"), Amount::new(107, "USD")).unwrap();
    /// assert_eq!(price.tax().unwrap(), Amount::new(7, "USD"));
    ///
    /// assert!(TaxedAmount::new(Amount::new(100, "USD"), Amount::new(107, "EUR")).is_err());
    /// ```
    pub fn new(net: Amount, gross: Amount) -> MoneyResult<Self> {
        net.ensure_same_currency(&gross)?;
        Ok(TaxedAmount { net, gross })
    }

    /// An untaxed price: net and gross are the same amount.
    pub fn from_untaxed(amount: Amount) -> Self {
        TaxedAmount {
            net: amount.clone(),
            gross: amount,
        }
    }

    /// Zero net and gross in the given currency.
    pub fn zero(currency: impl Into<Currency>) -> Self {
        TaxedAmount::from_untaxed(Amount::zero(currency))
    }

    /// Derives gross from net: `gross = round(net × (1 + rate), places)`.
    ///
    /// ## Example
    /// ```rust
    /// use dropship_core::{Amount, TaxRate, TaxedAmount};
    ///
    /// let net = Amount::parse("10.00", "USD").unwrap();
    /// let taxed = TaxedAmount::from_net(net, TaxRate::from_bps(825), 2).unwrap();
    /// // 10.00 × 1.0825 = 10.825 → 10.82 (midpoint rounds to even)
    /// assert_eq!(taxed.gross(), &Amount::parse("10.82", "USD").unwrap());
    /// ```
    pub fn from_net(net: Amount, rate: TaxRate, places: u32) -> MoneyResult<Self> {
        let gross = net.multiply(rate.multiplier()?)?.round_dp(places);
        TaxedAmount::new(net, gross)
    }

    /// Derives net from gross: `net = round(gross / (1 + rate), places)`.
    pub fn from_gross(gross: Amount, rate: TaxRate, places: u32) -> MoneyResult<Self> {
        let net = gross.divide(rate.multiplier()?)?.round_dp(places);
        TaxedAmount::new(net, gross)
    }

    /// Returns the net amount.
    #[inline]
    pub fn net(&self) -> &Amount {
        &self.net
    }

    /// Returns the gross amount.
    #[inline]
    pub fn gross(&self) -> &Amount {
        &self.gross
    }

    /// Returns the shared currency.
    #[inline]
    pub fn currency(&self) -> &Currency {
        self.net.currency()
    }

    /// Returns `gross - net` in the shared currency.
    ///
    /// Fails with `Overflow` when the difference does not fit a `Decimal`.
    pub fn tax(&self) -> MoneyResult<Amount> {
        self.gross.subtract(&self.net)
    }

    /// Componentwise addition.
    pub fn add(&self, other: &TaxedAmount) -> MoneyResult<TaxedAmount> {
        self.net.ensure_same_currency(&other.net)?;
        Ok(TaxedAmount {
            net: self.net.add(&other.net)?,
            gross: self.gross.add(&other.gross)?,
        })
    }

    /// Componentwise subtraction.
    pub fn subtract(&self, other: &TaxedAmount) -> MoneyResult<TaxedAmount> {
        self.net.ensure_same_currency(&other.net)?;
        Ok(TaxedAmount {
            net: self.net.subtract(&other.net)?,
            gross: self.gross.subtract(&other.gross)?,
        })
    }

    /// Rounds net and gross independently with Bankers Rounding.
    pub fn round_dp(&self, places: u32) -> TaxedAmount {
        TaxedAmount {
            net: self.net.round_dp(places),
            gross: self.gross.round_dp(places),
        }
    }
}

impl fmt::Display for TaxedAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} net / {} gross", self.net, self.gross)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

//! Order row with composite shipping and total prices.
//!
//! Every money column of an order shares the single `currency` column, so
//! clearing any one composite field (writing `None`) clears the currency
//! and every other field then reads as absent.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use dropship_core::{Amount, Currency, TaxRate, TaxedAmount};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::fields::{
    sanitizers, ColumnAccess, ColumnValue, FieldError, FieldSet, MoneyField, SanitizedJson,
    TaxedMoneyField,
};

// =============================================================================
// Order Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Draft,
    Unconfirmed,
    Unfulfilled,
    PartiallyFulfilled,
    Fulfilled,
    Canceled,
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Unfulfilled
    }
}

// =============================================================================
// Order
// =============================================================================

/// An order as stored in the `orders` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub number: i64,
    pub status: OrderStatus,
    pub currency: Option<String>,
    pub shipping_price_net_amount: Option<Decimal>,
    pub shipping_price_gross_amount: Option<Decimal>,
    pub base_shipping_price_amount: Option<Decimal>,
    pub undiscounted_base_shipping_price_amount: Option<Decimal>,
    pub total_net_amount: Option<Decimal>,
    pub shipping_tax_rate: Option<Decimal>,
    /// Public metadata object. The column is `NOT NULL DEFAULT '{}'`, so a
    /// JSON `null` here is stored (and read back) as `{}`.
    pub metadata: Value,
    /// Same storage rule as [`Order::metadata`].
    pub private_metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub const SHIPPING_PRICE_NET: MoneyField =
        MoneyField::new("shipping_price_net_amount", "currency");
    pub const SHIPPING_PRICE_GROSS: MoneyField =
        MoneyField::new("shipping_price_gross_amount", "currency");
    pub const SHIPPING_PRICE: TaxedMoneyField = TaxedMoneyField::new(
        "shipping_price_net_amount",
        "shipping_price_gross_amount",
        "currency",
    );
    pub const BASE_SHIPPING_PRICE: MoneyField =
        MoneyField::new("base_shipping_price_amount", "currency");
    pub const UNDISCOUNTED_BASE_SHIPPING_PRICE: MoneyField =
        MoneyField::new("undiscounted_base_shipping_price_amount", "currency");
    pub const TOTAL_NET: MoneyField = MoneyField::new("total_net_amount", "currency");

    /// New order in `currency` with every amount at zero.
    pub fn new(number: i64, currency: impl Into<Currency>) -> Self {
        let currency: Currency = currency.into();
        let now = Utc::now();
        Order {
            id: Uuid::new_v4().to_string(),
            number,
            status: OrderStatus::default(),
            currency: Some(currency.code().to_string()),
            shipping_price_net_amount: Some(Decimal::ZERO),
            shipping_price_gross_amount: Some(Decimal::ZERO),
            base_shipping_price_amount: Some(Decimal::ZERO),
            undiscounted_base_shipping_price_amount: Some(Decimal::ZERO),
            total_net_amount: Some(Decimal::ZERO),
            shipping_tax_rate: None,
            metadata: json!({}),
            private_metadata: json!({}),
            created_at: now,
            updated_at: now,
        }
    }

    /// Composite fields in declaration order.
    pub fn fields() -> &'static FieldSet {
        static FIELDS: OnceLock<FieldSet> = OnceLock::new();
        FIELDS.get_or_init(|| {
            FieldSet::new()
                .money("shipping_price_net", Self::SHIPPING_PRICE_NET)
                .money("shipping_price_gross", Self::SHIPPING_PRICE_GROSS)
                .taxed("shipping_price", Self::SHIPPING_PRICE)
                .money("base_shipping_price", Self::BASE_SHIPPING_PRICE)
                .money(
                    "undiscounted_base_shipping_price",
                    Self::UNDISCOUNTED_BASE_SHIPPING_PRICE,
                )
                .money("total_net", Self::TOTAL_NET)
        })
    }

    pub fn metadata_column() -> &'static SanitizedJson {
        static COLUMN: OnceLock<SanitizedJson> = OnceLock::new();
        COLUMN.get_or_init(|| SanitizedJson::new("metadata", sanitizers::metadata))
    }

    pub fn private_metadata_column() -> &'static SanitizedJson {
        static COLUMN: OnceLock<SanitizedJson> = OnceLock::new();
        COLUMN.get_or_init(|| SanitizedJson::new("private_metadata", sanitizers::metadata))
    }

    pub fn shipping_price(&self) -> Result<Option<TaxedAmount>, FieldError> {
        Self::SHIPPING_PRICE.read(self)
    }

    pub fn set_shipping_price(&mut self, price: Option<&TaxedAmount>) -> Result<(), FieldError> {
        Self::SHIPPING_PRICE.write(self, price)
    }

    pub fn shipping_price_net(&self) -> Result<Option<Amount>, FieldError> {
        Self::SHIPPING_PRICE_NET.read(self)
    }

    pub fn shipping_price_gross(&self) -> Result<Option<Amount>, FieldError> {
        Self::SHIPPING_PRICE_GROSS.read(self)
    }

    pub fn base_shipping_price(&self) -> Result<Option<Amount>, FieldError> {
        Self::BASE_SHIPPING_PRICE.read(self)
    }

    pub fn set_base_shipping_price(&mut self, price: Option<&Amount>) -> Result<(), FieldError> {
        Self::BASE_SHIPPING_PRICE.write(self, price)
    }

    pub fn undiscounted_base_shipping_price(&self) -> Result<Option<Amount>, FieldError> {
        Self::UNDISCOUNTED_BASE_SHIPPING_PRICE.read(self)
    }

    pub fn set_undiscounted_base_shipping_price(
        &mut self,
        price: Option<&Amount>,
    ) -> Result<(), FieldError> {
        Self::UNDISCOUNTED_BASE_SHIPPING_PRICE.write(self, price)
    }

    pub fn total_net(&self) -> Result<Option<Amount>, FieldError> {
        Self::TOTAL_NET.read(self)
    }

    pub fn set_total_net(&mut self, total: Option<&Amount>) -> Result<(), FieldError> {
        Self::TOTAL_NET.write(self, total)
    }

    pub fn shipping_tax_rate(&self) -> Option<TaxRate> {
        self.shipping_tax_rate.map(TaxRate::from_fraction)
    }

    /// Sets the shipping price from its net side and a tax rate.
    pub fn apply_shipping(
        &mut self,
        net: Amount,
        rate: TaxRate,
        decimal_places: u32,
    ) -> Result<TaxedAmount, FieldError> {
        let price = TaxedAmount::from_net(net, rate, decimal_places)?;
        self.set_shipping_price(Some(&price))?;
        self.shipping_tax_rate = Some(rate.fraction());
        Ok(price)
    }
}

fn unknown(name: &str) -> FieldError {
    FieldError::UnknownColumn {
        column: name.to_string(),
    }
}

impl ColumnAccess for Order {
    fn column(&self, name: &str) -> Result<ColumnValue, FieldError> {
        Ok(match name {
            "currency" => self.currency.clone().into(),
            "shipping_price_net_amount" => self.shipping_price_net_amount.into(),
            "shipping_price_gross_amount" => self.shipping_price_gross_amount.into(),
            "base_shipping_price_amount" => self.base_shipping_price_amount.into(),
            "undiscounted_base_shipping_price_amount" => {
                self.undiscounted_base_shipping_price_amount.into()
            }
            "total_net_amount" => self.total_net_amount.into(),
            _ => return Err(unknown(name)),
        })
    }

    fn set_column(&mut self, name: &str, value: ColumnValue) -> Result<(), FieldError> {
        match name {
            "currency" => self.currency = value.into_text(name)?,
            "shipping_price_net_amount" => {
                self.shipping_price_net_amount = value.into_decimal(name)?
            }
            "shipping_price_gross_amount" => {
                self.shipping_price_gross_amount = value.into_decimal(name)?
            }
            "base_shipping_price_amount" => {
                self.base_shipping_price_amount = value.into_decimal(name)?
            }
            "undiscounted_base_shipping_price_amount" => {
                self.undiscounted_base_shipping_price_amount = value.into_decimal(name)?
            }
            "total_net_amount" => self.total_net_amount = value.into_decimal(name)?,
            _ => return Err(unknown(name)),
        }
        Ok(())
    }
}

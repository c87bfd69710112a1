//! # Composite Money Fields
//!
//! Presents flat scalar columns as one monetary value.
//!
//! ## Mapping
//! ```text
//! ┌────────────────────────────────────────────────────────────────────────┐
//! │  Entity columns                         Domain value                   │
//! │                                                                        │
//! │  total_net_amount = 12.50  ┐                                           │
//! │  currency         = "USD"  ┴──MoneyField──► Some(Amount(12.50 USD))    │
//! │                                                                        │
//! │  shipping_price_net_amount   = 10.00 ┐                                 │
//! │  shipping_price_gross_amount = 10.80 ├─TaxedMoneyField─► Some(Taxed…)  │
//! │  currency                    = "USD" ┘                                 │
//! │                                                                        │
//! │  any backing column NULL (or "" currency) ───────────────► None        │
//! │  write(None) ──────────────────────────► every backing column NULL     │
//! └────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Entities expose their columns through [`ColumnAccess`]; descriptors never
//! reach into an entity any other way. A currency is never defaulted: an
//! amount without a currency reads as absent.

use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};

use dropship_core::{Amount, MonetaryKind, MonetaryValue, MoneyError, TaxedAmount};
use rust_decimal::Decimal;
use thiserror::Error;

/// Next creation sequence number handed to a [`CompositeField`].
static CREATION_COUNTER: AtomicUsize = AtomicUsize::new(0);

// =============================================================================
// Errors
// =============================================================================

/// Failures of composite column mapping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    /// The entity has no column with this name.
    #[error("Unknown column: {column}")]
    UnknownColumn { column: String },

    /// No composite field with this name is declared on the entity.
    #[error("Unknown field: {field}")]
    UnknownField { field: String },

    /// The column holds a value of the wrong scalar type.
    #[error("Column {column} expects {expected}")]
    ColumnType {
        column: String,
        expected: &'static str,
    },

    /// A value of the wrong monetary kind was assigned to a field.
    #[error("Field {field} expects {expected}, got {found}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error(transparent)]
    Money(#[from] MoneyError),
}

// =============================================================================
// Column Access
// =============================================================================

/// A raw column value as seen by the mapping layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnValue {
    Null,
    Decimal(Decimal),
    Text(String),
}

impl ColumnValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ColumnValue::Null)
    }

    /// Reads a numeric column; `Null` reads as `None`.
    pub fn into_decimal(self, column: &str) -> Result<Option<Decimal>, FieldError> {
        match self {
            ColumnValue::Null => Ok(None),
            ColumnValue::Decimal(value) => Ok(Some(value)),
            ColumnValue::Text(_) => Err(FieldError::ColumnType {
                column: column.to_string(),
                expected: "decimal",
            }),
        }
    }

    /// Reads a text column; `Null` and blank text read as `None`.
    pub fn into_text(self, column: &str) -> Result<Option<String>, FieldError> {
        match self {
            ColumnValue::Null => Ok(None),
            ColumnValue::Text(text) if text.trim().is_empty() => Ok(None),
            ColumnValue::Text(text) => Ok(Some(text)),
            ColumnValue::Decimal(_) => Err(FieldError::ColumnType {
                column: column.to_string(),
                expected: "text",
            }),
        }
    }
}

impl From<Option<Decimal>> for ColumnValue {
    fn from(value: Option<Decimal>) -> Self {
        value.map_or(ColumnValue::Null, ColumnValue::Decimal)
    }
}

impl From<Option<String>> for ColumnValue {
    fn from(value: Option<String>) -> Self {
        value.map_or(ColumnValue::Null, ColumnValue::Text)
    }
}

/// Named access to an entity's persisted scalar columns.
///
/// Implemented by hand on each host entity so the mapping layer never needs
/// reflection.
pub trait ColumnAccess {
    fn column(&self, name: &str) -> Result<ColumnValue, FieldError>;

    fn set_column(&mut self, name: &str, value: ColumnValue) -> Result<(), FieldError>;
}

/// Fails on the first column the entity does not have, before any write.
fn ensure_columns<E>(entity: &E, names: &[&'static str]) -> Result<(), FieldError>
where
    E: ColumnAccess + ?Sized,
{
    names.iter().try_for_each(|name| entity.column(name).map(|_| ()))
}

// =============================================================================
// Descriptors
// =============================================================================

/// `amount + currency` mapped to an [`Amount`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoneyField {
    pub amount_column: &'static str,
    pub currency_column: &'static str,
}

impl MoneyField {
    pub const fn new(amount_column: &'static str, currency_column: &'static str) -> Self {
        MoneyField {
            amount_column,
            currency_column,
        }
    }

    pub fn columns(&self) -> Vec<&'static str> {
        vec![self.amount_column, self.currency_column]
    }

    /// Assembles the amount, or `None` if any backing column is empty.
    pub fn read<E>(&self, entity: &E) -> Result<Option<Amount>, FieldError>
    where
        E: ColumnAccess + ?Sized,
    {
        let amount = entity
            .column(self.amount_column)?
            .into_decimal(self.amount_column)?;
        let currency = entity
            .column(self.currency_column)?
            .into_text(self.currency_column)?;

        Ok(match (amount, currency) {
            (Some(amount), Some(currency)) => Some(Amount::new(amount, currency)),
            _ => None,
        })
    }

    /// Decomposes `value` into the backing columns; `None` nulls them all.
    pub fn write<E>(&self, entity: &mut E, value: Option<&Amount>) -> Result<(), FieldError>
    where
        E: ColumnAccess + ?Sized,
    {
        let (amount, currency) = match value {
            Some(amount) => (
                ColumnValue::Decimal(amount.value()),
                ColumnValue::Text(amount.currency().code().to_string()),
            ),
            None => (ColumnValue::Null, ColumnValue::Null),
        };

        ensure_columns(entity, &[self.amount_column, self.currency_column])?;
        entity.set_column(self.amount_column, amount)?;
        entity.set_column(self.currency_column, currency)
    }
}

/// `net + gross + currency` mapped to a [`TaxedAmount`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaxedMoneyField {
    pub net_column: &'static str,
    pub gross_column: &'static str,
    pub currency_column: &'static str,
}

impl TaxedMoneyField {
    pub const fn new(
        net_column: &'static str,
        gross_column: &'static str,
        currency_column: &'static str,
    ) -> Self {
        TaxedMoneyField {
            net_column,
            gross_column,
            currency_column,
        }
    }

    pub fn columns(&self) -> Vec<&'static str> {
        vec![self.net_column, self.gross_column, self.currency_column]
    }

    pub fn read<E>(&self, entity: &E) -> Result<Option<TaxedAmount>, FieldError>
    where
        E: ColumnAccess + ?Sized,
    {
        let net = entity.column(self.net_column)?.into_decimal(self.net_column)?;
        let gross = entity
            .column(self.gross_column)?
            .into_decimal(self.gross_column)?;
        let currency = entity
            .column(self.currency_column)?
            .into_text(self.currency_column)?;

        match (net, gross, currency) {
            (Some(net), Some(gross), Some(currency)) => {
                let taxed = TaxedAmount::new(
                    Amount::new(net, currency.as_str()),
                    Amount::new(gross, currency.as_str()),
                )?;
                Ok(Some(taxed))
            }
            _ => Ok(None),
        }
    }

    pub fn write<E>(&self, entity: &mut E, value: Option<&TaxedAmount>) -> Result<(), FieldError>
    where
        E: ColumnAccess + ?Sized,
    {
        let (net, gross, currency) = match value {
            Some(taxed) => (
                ColumnValue::Decimal(taxed.net().value()),
                ColumnValue::Decimal(taxed.gross().value()),
                ColumnValue::Text(taxed.currency().code().to_string()),
            ),
            None => (ColumnValue::Null, ColumnValue::Null, ColumnValue::Null),
        };

        ensure_columns(entity, &[self.net_column, self.gross_column, self.currency_column])?;
        entity.set_column(self.net_column, net)?;
        entity.set_column(self.gross_column, gross)?;
        entity.set_column(self.currency_column, currency)
    }
}

/// The two descriptor shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Money(MoneyField),
    Taxed(TaxedMoneyField),
}

/// A named virtual attribute on an entity.
///
/// Fields are ordered, compared and hashed by their creation sequence
/// number, which is unique for the life of the process.
#[derive(Debug, Clone)]
pub struct CompositeField {
    name: &'static str,
    sequence: usize,
    kind: FieldKind,
}

impl CompositeField {
    pub fn new(name: &'static str, kind: FieldKind) -> Self {
        CompositeField {
            name,
            sequence: CREATION_COUNTER.fetch_add(1, Ordering::Relaxed),
            kind,
        }
    }

    pub fn money(name: &'static str, field: MoneyField) -> Self {
        Self::new(name, FieldKind::Money(field))
    }

    pub fn taxed(name: &'static str, field: TaxedMoneyField) -> Self {
        Self::new(name, FieldKind::Taxed(field))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Creation sequence number.
    pub fn sequence(&self) -> usize {
        self.sequence
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Monetary kind this field reads and accepts.
    pub fn value_kind(&self) -> MonetaryKind {
        match self.kind {
            FieldKind::Money(_) => MonetaryKind::Amount,
            FieldKind::Taxed(_) => MonetaryKind::Taxed,
        }
    }

    /// Backing column names.
    pub fn columns(&self) -> Vec<&'static str> {
        match &self.kind {
            FieldKind::Money(field) => field.columns(),
            FieldKind::Taxed(field) => field.columns(),
        }
    }

    pub fn read<E>(&self, entity: &E) -> Result<Option<MonetaryValue>, FieldError>
    where
        E: ColumnAccess + ?Sized,
    {
        Ok(match &self.kind {
            FieldKind::Money(field) => field.read(entity)?.map(MonetaryValue::Amount),
            FieldKind::Taxed(field) => field.read(entity)?.map(MonetaryValue::Taxed),
        })
    }

    /// Writes a dynamically-typed value.
    ///
    /// Fails with [`FieldError::TypeMismatch`] if `value` is not the kind
    /// this field holds.
    pub fn write<E>(&self, entity: &mut E, value: Option<&MonetaryValue>) -> Result<(), FieldError>
    where
        E: ColumnAccess + ?Sized,
    {
        match (&self.kind, value) {
            (FieldKind::Money(field), None) => field.write(entity, None),
            (FieldKind::Taxed(field), None) => field.write(entity, None),
            (FieldKind::Money(field), Some(MonetaryValue::Amount(amount))) => {
                field.write(entity, Some(amount))
            }
            (FieldKind::Taxed(field), Some(MonetaryValue::Taxed(taxed))) => {
                field.write(entity, Some(taxed))
            }
            (_, Some(other)) => Err(FieldError::TypeMismatch {
                field: self.name.to_string(),
                expected: self.value_kind().name(),
                found: other.kind().name(),
            }),
        }
    }
}

impl PartialEq for CompositeField {
    fn eq(&self, other: &Self) -> bool {
        self.sequence == other.sequence
    }
}

impl Eq for CompositeField {}

impl PartialOrd for CompositeField {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for CompositeField {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.sequence.cmp(&other.sequence)
    }
}

impl Hash for CompositeField {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.sequence.hash(state);
    }
}

impl fmt::Display for CompositeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.columns().join(", "))
    }
}

// =============================================================================
// Field Set
// =============================================================================

/// The composite fields of one entity type, in declaration order.
///
/// ## Example
/// ```rust,ignore
/// static FIELDS: OnceLock<FieldSet> = OnceLock::new();
///
/// let fields = FIELDS.get_or_init(|| {
///     FieldSet::new()
///         .money("total_net", MoneyField::new("total_net_amount", "currency"))
///         .taxed("shipping_price", TaxedMoneyField::new("net", "gross", "currency"))
/// });
/// ```
#[derive(Debug, Clone, Default)]
pub struct FieldSet {
    fields: Vec<CompositeField>,
}

impl FieldSet {
    pub fn new() -> Self {
        FieldSet::default()
    }

    /// Declares a field. Declaration order is enumeration order.
    pub fn with(mut self, field: CompositeField) -> Self {
        self.fields.push(field);
        self.fields.sort();
        self
    }

    pub fn money(self, name: &'static str, field: MoneyField) -> Self {
        self.with(CompositeField::money(name, field))
    }

    pub fn taxed(self, name: &'static str, field: TaxedMoneyField) -> Self {
        self.with(CompositeField::taxed(name, field))
    }

    /// The descriptor itself, for introspection.
    pub fn get(&self, name: &str) -> Option<&CompositeField> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompositeField> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn require(&self, name: &str) -> Result<&CompositeField, FieldError> {
        self.get(name).ok_or_else(|| FieldError::UnknownField {
            field: name.to_string(),
        })
    }

    /// Reads a field by name.
    pub fn read<E>(&self, entity: &E, name: &str) -> Result<Option<MonetaryValue>, FieldError>
    where
        E: ColumnAccess + ?Sized,
    {
        self.require(name)?.read(entity)
    }

    /// Writes a field by name.
    pub fn write<E>(
        &self,
        entity: &mut E,
        name: &str,
        value: Option<&MonetaryValue>,
    ) -> Result<(), FieldError>
    where
        E: ColumnAccess + ?Sized,
    {
        self.require(name)?.write(entity, value)
    }

    /// Reads every field in declaration order.
    pub fn read_all<E>(
        &self,
        entity: &E,
    ) -> Result<Vec<(&'static str, Option<MonetaryValue>)>, FieldError>
    where
        E: ColumnAccess + ?Sized,
    {
        self.fields
            .iter()
            .map(|field| Ok((field.name, field.read(entity)?)))
            .collect()
    }
}

impl<'a> IntoIterator for &'a FieldSet {
    type Item = &'a CompositeField;
    type IntoIter = std::slice::Iter<'a, CompositeField>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

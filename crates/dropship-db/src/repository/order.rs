//! # Order Repository
//!
//! Persists [`Order`] rows. Every write validates the money columns against
//! the configured `NUMERIC(max_digits, decimal_places)` width and passes the
//! metadata columns through their sanitizer.

use chrono::{DateTime, Utc};
use dropship_core::validation::{validate_amount_precision, validate_currency_code, validate_tax_rate};
use dropship_core::{TaxRate, TaxedAmount};
use serde_json::json;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::debug;

use crate::entity::{Order, OrderStatus};
use crate::error::{DbError, DbResult};
use crate::fields::{ColumnAccess, ColumnValue};
use crate::repository::{decimal_to_text, get_decimal, get_json, to_text};
use crate::session::Session;

const ORDER_COLUMNS: &str = "id, number, status, currency, \
     shipping_price_net_amount, shipping_price_gross_amount, \
     base_shipping_price_amount, undiscounted_base_shipping_price_amount, \
     total_net_amount, shipping_tax_rate, metadata, private_metadata, \
     created_at, updated_at";

/// Repository for order rows.
///
/// ## Usage
/// ```rust,ignore
/// let orders = db.orders();
///
/// let mut session = db.session(true).await?;
/// let stored = orders.insert(&mut session, &Order::new(1, "USD")).await?;
/// session.commit().await?;
/// ```
#[derive(Debug, Clone, Copy)]
pub struct OrderRepository {
    max_digits: u32,
    decimal_places: u32,
}

impl OrderRepository {
    pub fn new(max_digits: u32, decimal_places: u32) -> Self {
        OrderRepository {
            max_digits,
            decimal_places,
        }
    }

    /// Checks currency, every money column and the tax rate.
    pub fn validate(&self, order: &Order) -> DbResult<()> {
        if let Some(currency) = &order.currency {
            validate_currency_code(currency)?;
        }

        for field in Order::fields() {
            for column in field.columns() {
                if let ColumnValue::Decimal(value) = order.column(column)? {
                    validate_amount_precision(column, value, self.max_digits, self.decimal_places)?;
                }
            }
        }

        if let Some(rate) = order.shipping_tax_rate() {
            validate_tax_rate(rate)?;
        }

        Ok(())
    }

    /// Inserts an order and returns it as stored (metadata sanitized).
    pub async fn insert(&self, session: &mut Session, order: &Order) -> DbResult<Order> {
        let stored = self.prepare(order)?;
        debug!(id = %stored.id, number = stored.number, "Inserting order");

        session
            .execute(
                sqlx::query(
                    "INSERT INTO orders (id, number, status, currency, \
                     shipping_price_net_amount, shipping_price_gross_amount, \
                     base_shipping_price_amount, undiscounted_base_shipping_price_amount, \
                     total_net_amount, shipping_tax_rate, metadata, private_metadata, \
                     created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                )
                .bind(stored.id.clone())
                .bind(stored.number)
                .bind(stored.status)
                .bind(stored.currency.clone())
                .bind(decimal_to_text(stored.shipping_price_net_amount))
                .bind(decimal_to_text(stored.shipping_price_gross_amount))
                .bind(decimal_to_text(stored.base_shipping_price_amount))
                .bind(decimal_to_text(stored.undiscounted_base_shipping_price_amount))
                .bind(decimal_to_text(stored.total_net_amount))
                .bind(decimal_to_text(stored.shipping_tax_rate))
                .bind(encode_metadata(&stored, false)?)
                .bind(encode_metadata(&stored, true)?)
                .bind(stored.created_at)
                .bind(stored.updated_at),
            )
            .await?;

        Ok(stored)
    }

    /// Writes every column of an existing order; returns it as stored.
    pub async fn update(&self, session: &mut Session, order: &Order) -> DbResult<Order> {
        let mut stored = self.prepare(order)?;
        stored.updated_at = Utc::now();
        debug!(id = %stored.id, "Updating order");

        let affected = session
            .execute(
                sqlx::query(
                    "UPDATE orders SET number = ?2, status = ?3, currency = ?4, \
                     shipping_price_net_amount = ?5, shipping_price_gross_amount = ?6, \
                     base_shipping_price_amount = ?7, \
                     undiscounted_base_shipping_price_amount = ?8, \
                     total_net_amount = ?9, shipping_tax_rate = ?10, \
                     metadata = ?11, private_metadata = ?12, updated_at = ?13 \
                     WHERE id = ?1",
                )
                .bind(stored.id.clone())
                .bind(stored.number)
                .bind(stored.status)
                .bind(stored.currency.clone())
                .bind(decimal_to_text(stored.shipping_price_net_amount))
                .bind(decimal_to_text(stored.shipping_price_gross_amount))
                .bind(decimal_to_text(stored.base_shipping_price_amount))
                .bind(decimal_to_text(stored.undiscounted_base_shipping_price_amount))
                .bind(decimal_to_text(stored.total_net_amount))
                .bind(decimal_to_text(stored.shipping_tax_rate))
                .bind(encode_metadata(&stored, false)?)
                .bind(encode_metadata(&stored, true)?)
                .bind(stored.updated_at),
            )
            .await?;

        if affected == 0 {
            return Err(DbError::not_found("Order", stored.id));
        }
        Ok(stored)
    }

    /// Replaces the shipping price (and its tax rate) of an order.
    ///
    /// `None` clears the price; because orders share one currency column,
    /// that also clears the currency.
    pub async fn update_shipping_price(
        &self,
        session: &mut Session,
        id: &str,
        price: Option<&TaxedAmount>,
        rate: Option<TaxRate>,
    ) -> DbResult<Order> {
        let mut order = self.get(session, id).await?;
        order.set_shipping_price(price)?;
        order.shipping_tax_rate = rate.map(|rate| rate.fraction());
        self.update(session, &order).await
    }

    /// Gets an order by ID.
    pub async fn get_by_id(&self, session: &mut Session, id: &str) -> DbResult<Option<Order>> {
        let sql = format!("SELECT {} FROM orders WHERE id = ?1", ORDER_COLUMNS);
        let row = session
            .fetch_optional(sqlx::query(&sql).bind(id))
            .await?;

        row.as_ref().map(order_from_row).transpose()
    }

    /// Gets an order by ID, failing with `NotFound` if missing.
    pub async fn get(&self, session: &mut Session, id: &str) -> DbResult<Order> {
        self.get_by_id(session, id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", id))
    }

    /// Lists orders by number.
    pub async fn list(&self, session: &mut Session, limit: u32) -> DbResult<Vec<Order>> {
        let sql = format!("SELECT {} FROM orders ORDER BY number LIMIT ?1", ORDER_COLUMNS);
        let rows = session.fetch_all(sqlx::query(&sql).bind(limit)).await?;

        debug!(count = rows.len(), "Listed orders");
        rows.iter().map(order_from_row).collect()
    }

    /// Validated copy with sanitized metadata.
    fn prepare(&self, order: &Order) -> DbResult<Order> {
        self.validate(order)?;

        // Metadata columns are NOT NULL: a null payload becomes `{}`.
        let mut stored = order.clone();
        stored.metadata = Order::metadata_column()
            .sanitize(Some(order.metadata.clone()))?
            .unwrap_or_else(|| json!({}));
        stored.private_metadata = Order::private_metadata_column()
            .sanitize(Some(order.private_metadata.clone()))?
            .unwrap_or_else(|| json!({}));
        Ok(stored)
    }
}

/// Stored TEXT of an already-sanitized metadata column.
fn encode_metadata(order: &Order, private: bool) -> DbResult<String> {
    let value = if private {
        &order.private_metadata
    } else {
        &order.metadata
    };
    Ok(to_text(Some(value))?.unwrap_or_else(|| "{}".to_string()))
}

fn order_from_row(row: &SqliteRow) -> DbResult<Order> {
    let status: OrderStatus = row.try_get("status")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

    Ok(Order {
        id: row.try_get("id")?,
        number: row.try_get("number")?,
        status,
        currency: row.try_get("currency")?,
        shipping_price_net_amount: get_decimal(row, "shipping_price_net_amount")?,
        shipping_price_gross_amount: get_decimal(row, "shipping_price_gross_amount")?,
        base_shipping_price_amount: get_decimal(row, "base_shipping_price_amount")?,
        undiscounted_base_shipping_price_amount: get_decimal(
            row,
            "undiscounted_base_shipping_price_amount",
        )?,
        total_net_amount: get_decimal(row, "total_net_amount")?,
        shipping_tax_rate: get_decimal(row, "shipping_tax_rate")?,
        metadata: get_json(row, Order::metadata_column())?.unwrap_or_else(|| json!({})),
        private_metadata: get_json(row, Order::private_metadata_column())?
            .unwrap_or_else(|| json!({})),
        created_at,
        updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::allow_writer;
    use crate::pool::tests::test_db;
    use dropship_core::{Amount, ValidationError};
    use rust_decimal_macros::dec;

    fn repo() -> OrderRepository {
        OrderRepository::new(12, 2)
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = test_db().await;
        let mut order = Order::new(1001, "usd");
        order
            .apply_shipping(Amount::new(dec!(10.00), "USD"), TaxRate::from_bps(825), 2)
            .unwrap();
        order.metadata = json!({"source": "api", "empty": null});

        let mut session = db.session(true).await.unwrap();
        let stored = repo().insert(&mut session, &order).await.unwrap();
        session.commit().await.unwrap();

        assert_eq!(stored.metadata, json!({"source": "api"}));

        let mut session = db.session(false).await.unwrap();
        let loaded = repo().get(&mut session, &order.id).await.unwrap();

        assert_eq!(loaded.number, 1001);
        assert_eq!(loaded.status, OrderStatus::Unfulfilled);
        assert_eq!(loaded.shipping_price().unwrap(), order.shipping_price().unwrap());
        assert_eq!(loaded.shipping_tax_rate(), Some(TaxRate::from_bps(825)));
        assert_eq!(loaded.total_net().unwrap(), Some(Amount::zero("USD")));
        assert_eq!(loaded.metadata, json!({"source": "api"}));
    }

    #[tokio::test]
    async fn test_null_metadata_is_stored_as_empty_object() {
        let db = test_db().await;
        let mut order = Order::new(1002, "USD");
        order.metadata = serde_json::Value::Null;
        order.private_metadata = serde_json::Value::Null;

        let mut session = db.session(true).await.unwrap();
        let stored = repo().insert(&mut session, &order).await.unwrap();
        assert_eq!(stored.metadata, json!({}));
        assert_eq!(stored.private_metadata, json!({}));

        let loaded = repo().get(&mut session, &order.id).await.unwrap();
        assert_eq!(loaded.metadata, json!({}));
        assert_eq!(loaded.private_metadata, json!({}));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let db = test_db().await;
        let mut session = db.session(false).await.unwrap();

        assert!(repo().get_by_id(&mut session, "nope").await.unwrap().is_none());
        assert!(matches!(
            repo().get(&mut session, "nope").await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_clear_shipping_price_persists_nulls() {
        let db = test_db().await;
        let order = Order::new(1, "USD");

        let mut session = db.session(true).await.unwrap();
        repo().insert(&mut session, &order).await.unwrap();
        let updated = repo()
            .update_shipping_price(&mut session, &order.id, None, None)
            .await
            .unwrap();
        session.commit().await.unwrap();
        assert_eq!(updated.shipping_price().unwrap(), None);

        let mut session = db.session(false).await.unwrap();
        let row = session
            .fetch_one(
                sqlx::query(
                    "SELECT shipping_price_net_amount, shipping_price_gross_amount, currency \
                     FROM orders WHERE id = ?1",
                )
                .bind(&order.id),
            )
            .await
            .unwrap();
        let net: Option<String> = row.get(0);
        let gross: Option<String> = row.get(1);
        let currency: Option<String> = row.get(2);
        assert_eq!((net, gross, currency), (None, None, None));

        let loaded = repo().get(&mut session, &order.id).await.unwrap();
        assert_eq!(loaded.shipping_price().unwrap(), None);
    }

    #[tokio::test]
    async fn test_replica_update_requires_writer_scope() {
        let db = test_db().await;
        let order = Order::new(7, "USD");
        let price = TaxedAmount::from_untaxed(Amount::new(dec!(5), "USD"));

        let mut session = db.session(true).await.unwrap();
        repo().insert(&mut session, &order).await.unwrap();
        session.commit().await.unwrap();

        let mut session = db.session(false).await.unwrap();
        let err = repo()
            .update_shipping_price(&mut session, &order.id, Some(&price), None)
            .await
            .unwrap_err();
        assert!(err.as_unsafe_writer_access().is_some());
        drop(session);

        let updated = allow_writer(async {
            let mut session = db.session(false).await?;
            let updated = repo()
                .update_shipping_price(&mut session, &order.id, Some(&price), None)
                .await?;
            session.commit().await?;
            Ok::<_, DbError>(updated)
        })
        .await
        .unwrap();

        assert_eq!(updated.shipping_price().unwrap(), Some(price));
    }

    #[tokio::test]
    async fn test_precision_is_validated_before_write() {
        let db = test_db().await;
        let mut order = Order::new(1, "USD");
        order.total_net_amount = Some(dec!(1.005));

        let mut session = db.session(true).await.unwrap();
        let err = repo().insert(&mut session, &order).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Validation(ValidationError::TooManyDecimalPlaces { .. })
        ));

        order.total_net_amount = Some(dec!(10000000000));
        assert!(matches!(
            repo().insert(&mut session, &order).await,
            Err(DbError::Validation(ValidationError::TooManyDigits { .. }))
        ));
    }

    #[tokio::test]
    async fn test_metadata_sanitizer_rejects() {
        let db = test_db().await;
        let mut order = Order::new(1, "USD");
        order.metadata = json!(["not", "an", "object"]);

        let mut session = db.session(true).await.unwrap();
        assert!(matches!(
            repo().insert(&mut session, &order).await,
            Err(DbError::Sanitize(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_number() {
        let db = test_db().await;
        let mut session = db.session(true).await.unwrap();

        repo().insert(&mut session, &Order::new(1, "USD")).await.unwrap();
        assert!(matches!(
            repo().insert(&mut session, &Order::new(1, "USD")).await,
            Err(DbError::UniqueViolation { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_orders() {
        let db = test_db().await;
        let mut session = db.session(true).await.unwrap();
        for number in [3, 1, 2] {
            repo().insert(&mut session, &Order::new(number, "EUR")).await.unwrap();
        }

        let listed = repo().list(&mut session, 10).await.unwrap();
        let numbers: Vec<_> = listed.iter().map(|o| o.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }
}

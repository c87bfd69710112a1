//! # Shipping Zone Repository
//!
//! Persists [`ShippingZone`] rows. The country list is written through the
//! `country_codes` sanitizer; `None` is stored as NULL unchanged.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::debug;

use crate::entity::ShippingZone;
use crate::error::{DbError, DbResult};
use crate::repository::{get_json, to_text};
use crate::session::Session;

const ZONE_COLUMNS: &str = "id, name, countries, is_default, description, created_at, updated_at";

/// Repository for shipping zones.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShippingZoneRepository;

impl ShippingZoneRepository {
    pub fn new() -> Self {
        ShippingZoneRepository
    }

    /// Inserts a zone and returns it as stored (countries sanitized).
    pub async fn insert(
        &self,
        session: &mut Session,
        zone: &ShippingZone,
    ) -> DbResult<ShippingZone> {
        let column = ShippingZone::countries_column();
        let mut stored = zone.clone();
        stored.countries = column.sanitize(zone.countries.clone())?;
        let countries = to_text(stored.countries.as_ref())?;

        debug!(id = %stored.id, name = %stored.name, "Inserting shipping zone");

        session
            .execute(
                sqlx::query(
                    "INSERT INTO shipping_zones \
                     (id, name, countries, is_default, description, created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )
                .bind(stored.id.clone())
                .bind(stored.name.clone())
                .bind(countries)
                .bind(stored.is_default)
                .bind(stored.description.clone())
                .bind(stored.created_at)
                .bind(stored.updated_at),
            )
            .await?;

        Ok(stored)
    }

    /// Replaces the country list; returns the stored (sanitized) list.
    pub async fn update_countries(
        &self,
        session: &mut Session,
        id: &str,
        countries: Option<Value>,
    ) -> DbResult<Option<Value>> {
        let column = ShippingZone::countries_column();
        let clean = column.sanitize(countries)?;
        let encoded = to_text(clean.as_ref())?;

        let affected = session
            .execute(
                sqlx::query(
                    "UPDATE shipping_zones SET countries = ?2, updated_at = ?3 WHERE id = ?1",
                )
                .bind(id)
                .bind(encoded)
                .bind(Utc::now()),
            )
            .await?;

        if affected == 0 {
            return Err(DbError::not_found("ShippingZone", id));
        }
        Ok(clean)
    }

    pub async fn get_by_id(
        &self,
        session: &mut Session,
        id: &str,
    ) -> DbResult<Option<ShippingZone>> {
        let sql = format!("SELECT {} FROM shipping_zones WHERE id = ?1", ZONE_COLUMNS);
        let row = session.fetch_optional(sqlx::query(&sql).bind(id)).await?;
        row.as_ref().map(zone_from_row).transpose()
    }

    /// Lists zones by name.
    pub async fn list(&self, session: &mut Session) -> DbResult<Vec<ShippingZone>> {
        let sql = format!("SELECT {} FROM shipping_zones ORDER BY name", ZONE_COLUMNS);
        let rows = session.fetch_all(sqlx::query(&sql)).await?;
        rows.iter().map(zone_from_row).collect()
    }
}

fn zone_from_row(row: &SqliteRow) -> DbResult<ShippingZone> {
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

    Ok(ShippingZone {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        countries: get_json(row, ShippingZone::countries_column())?,
        is_default: row.try_get("is_default")?,
        description: row.try_get("description")?,
        created_at,
        updated_at,
    })
}

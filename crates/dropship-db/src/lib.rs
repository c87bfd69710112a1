//! # dropship-db: Database Layer for Dropship
//!
//! Writer/replica connection pools, the access guard that keeps writes off
//! the replica, and the column mapping that stores monetary values as flat
//! SQLite columns.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Dropship Data Flow                               │
//! │                                                                         │
//! │  Handler / background job (out of scope)                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   dropship-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │  ┌────────────┐  ┌────────────┐  ┌────────────┐  ┌──────────┐  │   │
//! │  │  │  Database  │  │   guard    │  │   fields   │  │repository│  │   │
//! │  │  │ (pool.rs)  │  │            │  │            │  │          │  │   │
//! │  │  │ writer +   │─►│ Session    │  │ MoneyField │◄─│ Orders   │  │   │
//! │  │  │ replica    │  │ allow_     │  │ TaxedMoney │  │ Shipping │  │   │
//! │  │  │ pools      │  │  writer()  │  │ Sanitized  │  │  zones   │  │   │
//! │  │  └────────────┘  └────────────┘  └────────────┘  └──────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (writer file, replica file or shared in-memory database)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - `DbConfig` from code or environment
//! - [`pool`] - writer/replica pools and session acquisition
//! - [`guard`] - writer scopes and statement checks
//! - [`session`] - guarded, scoped transactions
//! - [`fields`] - composite money columns and sanitized JSON columns
//! - [`entity`] - `Order` and `ShippingZone` rows
//! - [`repository`] - row operations on a caller-supplied session
//! - [`migrations`] - embedded schema migrations
//! - [`error`] - database error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dropship_db::{allow_writer, Database, DbConfig};
//!
//! let db = Database::new(DbConfig::from_env()?).await?;
//!
//! // Reads go to the replica.
//! let mut session = db.session(false).await?;
//! let orders = db.orders().list(&mut session, 20).await?;
//!
//! // A deliberate write through a replica-bound path.
//! allow_writer(async {
//!     let mut session = db.session(false).await?;
//!     db.orders().update(&mut session, &order).await?;
//!     session.commit().await
//! })
//! .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod entity;
pub mod error;
pub mod fields;
pub mod guard;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod session;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, DbConfig};
pub use entity::{Order, OrderStatus, ShippingZone};
pub use error::{DbError, DbResult};
pub use fields::{
    ColumnAccess, ColumnValue, CompositeField, FieldError, FieldSet, MoneyField, SanitizeError,
    SanitizedJson, TaxedMoneyField,
};
pub use guard::{
    allow_writer, allow_writer_sync, scope_state, Role, ScopeState, StatementKind,
    UnsafeWriterAccess, TRACE_LIMIT,
};
pub use pool::Database;
pub use session::Session;

// Repository re-exports for convenience
pub use repository::{OrderRepository, ShippingZoneRepository};

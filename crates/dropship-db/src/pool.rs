//! # Writer/Replica Pools
//!
//! Connection pool creation and session acquisition.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database (created once)                            │
//! │                                                                         │
//! │  DbConfig::from_env() / DbConfig::new(url)                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await ← both pools + migrations on the writer   │
//! │       │                                                                 │
//! │       ├──────────────────────────────┐                                  │
//! │       ▼                              ▼                                  │
//! │  ┌──────────────────┐     ┌──────────────────┐                         │
//! │  │  writer pool     │     │  replica pool    │                         │
//! │  │  (DATABASE_URL)  │     │  (REPLICA_URL)   │                         │
//! │  └────────┬─────────┘     └────────┬─────────┘                         │
//! │           │ session(true)          │ session(false)                    │
//! │           ▼                        ▼                                    │
//! │     Session{Writer}          Session{Replica} ── guard checks writes   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `Database` is cheap to clone and is passed explicitly to whatever needs
//! it; there is no global pool.
//!
//! ## WAL Mode
//! File databases run in WAL mode so readers on the replica pool never
//! block the writer.

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::{debug, error, info};

use crate::config::DbConfig;
use crate::error::{DbError, DbResult};
use crate::guard::Role;
use crate::migrations;
use crate::repository::{OrderRepository, ShippingZoneRepository};
use crate::session::Session;

// =============================================================================
// Release Counters
// =============================================================================

#[derive(Debug, Default)]
struct ReleaseCounters {
    writer: AtomicU64,
    replica: AtomicU64,
}

impl ReleaseCounters {
    fn counter(&self, role: Role) -> &AtomicU64 {
        match role {
            Role::Writer => &self.writer,
            Role::Replica => &self.replica,
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Writer and replica pools plus the configuration they were built from.
///
/// ## Usage
/// ```rust,ignore
/// let db = Database::new(DbConfig::from_env()?).await?;
///
/// let mut session = db.session(false).await?;          // replica
/// let rows = session.fetch_all(sqlx::query("SELECT id FROM orders")).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    writer: SqlitePool,
    replica: SqlitePool,
    config: DbConfig,
    released: Arc<ReleaseCounters>,
}

impl Database {
    /// Creates both connection pools.
    ///
    /// ## What This Does
    /// 1. Validates the configuration
    /// 2. Opens the writer pool (file created if missing)
    /// 3. Opens the replica pool (writer URL when no replica is configured)
    /// 4. Runs migrations on the writer (if enabled)
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        config.validate()?;

        info!(
            writer = %config.writer_url,
            replica = %config.effective_replica_url(),
            "Initializing database connections"
        );

        let released = Arc::new(ReleaseCounters::default());
        let writer = connect(&config, &config.writer_url, Role::Writer, &released).await?;
        let replica = connect(
            &config,
            config.effective_replica_url(),
            Role::Replica,
            &released,
        )
        .await?;

        info!(
            max_connections = config.max_connections,
            "Database pools created"
        );

        let db = Database {
            writer,
            replica,
            config,
            released,
        };

        if db.config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Configuration the pools were built from.
    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    /// Raw pool for a role.
    ///
    /// Queries run directly on the pool bypass the access guard; prefer
    /// [`Database::session`].
    pub fn pool(&self, role: Role) -> &SqlitePool {
        match role {
            Role::Writer => &self.writer,
            Role::Replica => &self.replica,
        }
    }

    /// Acquires a session: writer-bound if `writer_allowed`, else replica-bound.
    ///
    /// The session holds one connection and an open transaction until it is
    /// committed, rolled back or dropped.
    pub async fn session(&self, writer_allowed: bool) -> DbResult<Session> {
        let role = Role::for_writer_allowed(writer_allowed);
        debug!(role = %role, "Acquiring session");
        let tx = self.pool(role).begin().await?;
        Ok(Session::new(role, tx))
    }

    /// Runs `f` with a fresh session.
    ///
    /// ## Behavior
    /// - `Ok`: the session is returned to the pool as `f` left it. Commit
    ///   explicitly inside `f` to persist anything.
    /// - `Err`: the session is rolled back, the error is logged and returned.
    /// - Cancellation: dropping the returned future drops the session, which
    ///   rolls back and releases the connection.
    ///
    /// ## Example
    /// ```rust,ignore
    /// db.with_session(true, |session| Box::pin(async move {
    ///     session.execute(sqlx::query("DELETE FROM orders")).await?;
    ///     session.commit().await
    /// }))
    /// .await?;
    /// ```
    pub async fn with_session<T, F>(&self, writer_allowed: bool, f: F) -> DbResult<T>
    where
        F: for<'s> FnOnce(&'s mut Session) -> BoxFuture<'s, DbResult<T>>,
    {
        let mut session = self.session(writer_allowed).await?;

        match f(&mut session).await {
            Ok(value) => Ok(value),
            Err(err) => {
                error!(role = %session.role(), error = %err, "Database error, rolling back");
                if session.is_open() {
                    if let Err(rollback_err) = session.rollback().await {
                        error!(error = %rollback_err, "Rollback failed");
                    }
                }
                Err(err)
            }
        }
    }

    /// Returns the order repository, validating at the configured precision.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let mut session = db.session(false).await?;
    /// let recent = db.orders().list(&mut session, 20).await?;
    /// ```
    pub fn orders(&self) -> OrderRepository {
        OrderRepository::new(self.config.max_digits, self.config.decimal_places)
    }

    /// Returns the shipping zone repository.
    pub fn shipping_zones(&self) -> ShippingZoneRepository {
        ShippingZoneRepository::new()
    }

    /// Runs all pending migrations on the writer.
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running database migrations");
        migrations::run_migrations(&self.writer).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// Returns `(total, applied)` migration counts of the writer.
    pub async fn migration_status(&self) -> DbResult<(usize, usize)> {
        migrations::migration_status(&self.writer).await
    }

    /// Number of connections returned to the pool of `role` so far.
    pub fn connections_released(&self, role: Role) -> u64 {
        self.released.counter(role).load(Ordering::Relaxed)
    }

    /// Checks that both pools can execute queries.
    pub async fn health_check(&self) -> bool {
        let writer = sqlx::query("SELECT 1").execute(&self.writer).await.is_ok();
        let replica = sqlx::query("SELECT 1").execute(&self.replica).await.is_ok();
        writer && replica
    }

    /// Closes both pools. Sessions acquired afterwards fail.
    pub async fn close(&self) {
        info!("Closing database connection pools");
        self.writer.close().await;
        self.replica.close().await;
    }
}

/// Opens one pool with the shared SQLite tuning.
async fn connect(
    config: &DbConfig,
    url: &str,
    role: Role,
    released: &Arc<ReleaseCounters>,
) -> DbResult<SqlitePool> {
    let in_memory = url.contains("mode=memory") || url.contains(":memory:");

    let mut options = SqliteConnectOptions::from_str(url)
        .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        // NORMAL synchronous: safe from corruption, may lose the last commit on crash
        .synchronous(SqliteSynchronous::Normal)
        // SQLite has foreign keys disabled by default
        .foreign_keys(true)
        .create_if_missing(true);

    if !in_memory {
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    debug!(role = %role, "Connection options configured");

    let counters = Arc::clone(released);
    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connect_timeout)
        .idle_timeout(Some(config.idle_timeout))
        .after_release(move |_conn, _meta| {
            counters.counter(role).fetch_add(1, Ordering::Relaxed);
            Box::pin(async { Ok(true) })
        })
        .connect_with(options)
        .await
        .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

    info!(role = %role, "Pool created");
    Ok(pool)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use std::time::Duration;

    use super::*;
    use crate::guard::{allow_writer, scope_state, ScopeState};
    use sqlx::Row;

    /// Routes logs to the test harness; `RUST_LOG=dropship_db=debug` shows them.
    pub(crate) fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    /// Fresh file-backed database under the temp dir; writer and replica
    /// share the file.
    pub(crate) async fn test_db() -> Database {
        init_tracing();
        let path = std::env::temp_dir().join(format!("dropship-{}.db", uuid::Uuid::new_v4()));
        let config = DbConfig::new(format!("sqlite://{}", path.display()));
        Database::new(config).await.unwrap()
    }

    async fn count_orders(db: &Database) -> i64 {
        let mut session = db.session(false).await.unwrap();
        let row = session
            .fetch_one(sqlx::query("SELECT COUNT(*) AS n FROM orders"))
            .await
            .unwrap();
        row.get("n")
    }

    async fn wait_for_release(db: &Database, role: Role, expected: u64) -> u64 {
        for _ in 0..100 {
            if db.connections_released(role) >= expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        db.connections_released(role)
    }

    const INSERT_ORDER: &str =
        "INSERT INTO orders (id, number, status, currency, created_at, updated_at) \
         VALUES (?1, ?2, 'unfulfilled', 'USD', datetime('now'), datetime('now'))";

    #[tokio::test]
    async fn test_in_memory_database() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.health_check().await);

        let (total, applied) = db.migration_status().await.unwrap();
        assert_eq!(total, applied);
        assert!(total >= 1);
    }

    #[tokio::test]
    async fn test_session_roles() {
        let db = test_db().await;
        assert_eq!(db.session(true).await.unwrap().role(), Role::Writer);
        assert_eq!(db.session(false).await.unwrap().role(), Role::Replica);
    }

    #[tokio::test]
    async fn test_replica_update_without_scope_fails() {
        let db = test_db().await;
        let mut session = db.session(false).await.unwrap();

        let err = session
            .execute(sqlx::query("UPDATE orders SET status = 'paid'"))
            .await
            .unwrap_err();

        let violation = err.as_unsafe_writer_access().expect("guard violation");
        assert_eq!(violation.role(), Role::Replica);
        assert!(violation.statement().starts_with("UPDATE orders"));
    }

    #[tokio::test]
    async fn test_replica_batch_hiding_a_delete_fails() {
        let db = test_db().await;

        let mut writer = db.session(true).await.unwrap();
        writer
            .execute(sqlx::query(INSERT_ORDER).bind("o-1").bind(1_i64))
            .await
            .unwrap();
        writer.commit().await.unwrap();

        let mut replica = db.session(false).await.unwrap();
        let err = replica
            .execute(sqlx::query("SELECT 1; DELETE FROM orders"))
            .await
            .unwrap_err();
        assert!(err.as_unsafe_writer_access().is_some());
        replica.commit().await.unwrap();

        let mut reader = db.session(false).await.unwrap();
        let row = reader
            .fetch_one(sqlx::query("SELECT COUNT(*) AS n FROM orders"))
            .await
            .unwrap();
        assert_eq!(row.get::<i64, _>("n"), 1);
    }

    #[tokio::test]
    async fn test_writer_update_inside_scope_succeeds() {
        let db = test_db().await;

        allow_writer(async {
            let mut session = db.session(true).await.unwrap();
            session
                .execute(sqlx::query(INSERT_ORDER).bind("o-1").bind(1_i64))
                .await
                .unwrap();
            let affected = session
                .execute(sqlx::query("UPDATE orders SET status = 'paid'"))
                .await
                .unwrap();
            assert_eq!(affected, 1);
            session.commit().await.unwrap();
        })
        .await;

        assert_eq!(count_orders(&db).await, 1);
    }

    #[tokio::test]
    async fn test_replica_write_allowed_inside_scope() {
        let db = test_db().await;

        let affected = allow_writer(async {
            let mut session = db.session(false).await?;
            let n = session
                .execute(sqlx::query(INSERT_ORDER).bind("o-1").bind(1_i64))
                .await?;
            session.commit().await?;
            Ok::<_, DbError>(n)
        })
        .await
        .unwrap();

        assert_eq!(affected, 1);
        assert_eq!(scope_state(), ScopeState::Idle);
    }

    #[tokio::test]
    async fn test_nothing_committed_implicitly() {
        let db = test_db().await;

        {
            let mut session = db.session(true).await.unwrap();
            session
                .execute(sqlx::query(INSERT_ORDER).bind("o-1").bind(1_i64))
                .await
                .unwrap();
            // dropped without commit
        }

        assert_eq!(count_orders(&db).await, 0);
    }

    #[tokio::test]
    async fn test_closed_session_rejects_use() {
        let db = test_db().await;
        let mut session = db.session(true).await.unwrap();
        session.commit().await.unwrap();

        assert!(!session.is_open());
        assert!(matches!(
            session.execute(sqlx::query("SELECT 1")).await,
            Err(DbError::SessionClosed)
        ));
        assert!(matches!(session.commit().await, Err(DbError::SessionClosed)));
        assert!(matches!(session.rollback().await, Err(DbError::SessionClosed)));
    }

    #[tokio::test]
    async fn test_with_session_rolls_back_on_error() {
        let db = test_db().await;

        let result: DbResult<()> = db
            .with_session(true, |session| {
                Box::pin(async move {
                    session
                        .execute(sqlx::query(INSERT_ORDER).bind("o-1").bind(1_i64))
                        .await?;
                    Err(DbError::Internal("boom".to_string()))
                })
            })
            .await;

        assert!(matches!(result, Err(DbError::Internal(_))));
        assert_eq!(count_orders(&db).await, 0);
    }

    #[tokio::test]
    async fn test_with_session_commit_persists() {
        let db = test_db().await;

        db.with_session(true, |session| {
            Box::pin(async move {
                session
                    .execute(sqlx::query(INSERT_ORDER).bind("o-1").bind(1_i64))
                    .await?;
                session.commit().await
            })
        })
        .await
        .unwrap();

        assert_eq!(count_orders(&db).await, 1);
    }

    #[tokio::test]
    async fn test_connection_released_once_per_session() {
        let db = test_db().await;
        // Let the migration connection finish returning to the pool.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let before = db.connections_released(Role::Writer);

        // success path
        db.with_session(true, |session| Box::pin(async move { session.commit().await }))
            .await
            .unwrap();
        assert_eq!(wait_for_release(&db, Role::Writer, before + 1).await, before + 1);

        // error path
        let _ = db
            .with_session(true, |_session| {
                Box::pin(async move { Err::<(), _>(DbError::Internal("boom".to_string())) })
            })
            .await;
        assert_eq!(wait_for_release(&db, Role::Writer, before + 2).await, before + 2);

        // cancellation path
        let pending = db.with_session(true, |_session| {
            Box::pin(async move {
                std::future::pending::<()>().await;
                Ok(())
            })
        });
        let timed_out = tokio::time::timeout(Duration::from_millis(50), pending).await;
        assert!(timed_out.is_err());
        assert_eq!(wait_for_release(&db, Role::Writer, before + 3).await, before + 3);

        // Nothing else went back to the pool.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(db.connections_released(Role::Writer), before + 3);
    }

    #[tokio::test]
    async fn test_guard_violation_inside_with_session() {
        let db = test_db().await;

        let result: DbResult<u64> = db
            .with_session(false, |session| {
                Box::pin(async move { session.execute(sqlx::query("DELETE FROM orders")).await })
            })
            .await;

        assert!(matches!(result, Err(DbError::UnsafeWriterAccess(_))));
    }

    #[tokio::test]
    async fn test_closed_pool_rejects_sessions() {
        let db = test_db().await;
        db.close().await;

        assert!(!db.health_check().await);
        assert!(db.session(true).await.is_err());
    }
}

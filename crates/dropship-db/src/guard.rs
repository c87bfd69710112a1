//! # Reader/Writer Access Guard
//!
//! Stops mutating statements from reaching a replica-bound session unless
//! the calling task has explicitly opened a writer scope.
//!
//! ## State Machine (per task)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │        allow_writer(..)                  allow_writer(..) (nested)     │
//! │   Idle ────────────────► WriterScopeActive{1} ─────────────► {2}       │
//! │    ▲                          │      ▲                        │         │
//! │    │  outermost scope exits   │      │   inner scope exits    │         │
//! │    └──────────────────────────┘      └────────────────────────┘         │
//! │                                                                         │
//! │  Exit happens on every path: return, `?`, panic unwind, or the         │
//! │  future being dropped (cancellation).                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Why a task-local depth
//!
//! The marker lives in a `tokio::task_local!` slot. Each scope installs
//! `depth + 1` for exactly the extent of the wrapped future or closure and
//! the runtime restores the previous value when it ends. Concurrent requests
//! run as separate tasks and never observe each other's scope, and a task
//! spawned from inside a scope starts `Idle`.
//!
//! ## Statement classification
//! ```text
//! SELECT / VALUES / EXPLAIN          → Read
//! PRAGMA name  (no assignment)       → Read
//! BEGIN / COMMIT / ROLLBACK / ...    → Read   (transaction control)
//! WITH ... SELECT                    → Read
//! WITH ... INSERT / UPDATE / DELETE  → Write
//! everything else                    → Write  (fail closed)
//! ```

use std::backtrace::Backtrace;
use std::fmt;
use std::future::Future;

use thiserror::Error;
use tracing::{debug, warn};

/// Maximum number of stack frames kept in an [`UnsafeWriterAccess`] trace.
pub const TRACE_LIMIT: usize = 20;

/// Message carried by every guard violation.
pub const UNSAFE_WRITER_ACCESS_MSG: &str = "Unsafe access to the writer database detected. \
     Wrap the call in `allow_writer(..)` or acquire a writer session";

tokio::task_local! {
    static WRITER_SCOPE_DEPTH: usize;
}

// =============================================================================
// Roles and Scope State
// =============================================================================

/// Which pool a session is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Primary, mutable store.
    Writer,
    /// Read replica.
    Replica,
}

impl Role {
    /// Role for a `writer_allowed` flag.
    pub fn for_writer_allowed(writer_allowed: bool) -> Self {
        if writer_allowed {
            Role::Writer
        } else {
            Role::Replica
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Writer => "writer",
            Role::Replica => "replica",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Writer-scope state of the current task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    Idle,
    WriterScopeActive { depth: usize },
}

impl ScopeState {
    pub fn is_active(&self) -> bool {
        matches!(self, ScopeState::WriterScopeActive { .. })
    }
}

/// Current nesting depth of writer scopes in this task (0 when idle).
pub fn writer_scope_depth() -> usize {
    WRITER_SCOPE_DEPTH.try_with(|depth| *depth).unwrap_or(0)
}

/// Reports whether the current task is inside a writer scope.
pub fn scope_state() -> ScopeState {
    match writer_scope_depth() {
        0 => ScopeState::Idle,
        depth => ScopeState::WriterScopeActive { depth },
    }
}

// =============================================================================
// Writer Scopes
// =============================================================================

/// Runs `future` inside a writer scope.
///
/// Replica-bound sessions used while `future` runs may execute mutating
/// statements. Scopes nest; the task returns to `Idle` only when the
/// outermost scope finishes.
///
/// ## Example
/// ```rust,ignore
/// let affected = allow_writer(async {
///     let mut session = db.session(false).await?;
///     let n = session.execute(sqlx::query("UPDATE orders SET status = 'paid'")).await?;
///     session.commit().await?;
///     Ok::<_, DbError>(n)
/// })
/// .await?;
/// ```
pub async fn allow_writer<F>(future: F) -> F::Output
where
    F: Future,
{
    let depth = writer_scope_depth() + 1;
    debug!(depth, "Entering writer scope");
    let output = WRITER_SCOPE_DEPTH.scope(depth, future).await;
    debug!(depth, "Left writer scope");
    output
}

/// Runs `f` inside a writer scope (blocking variant of [`allow_writer`]).
pub fn allow_writer_sync<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    let depth = writer_scope_depth() + 1;
    debug!(depth, "Entering writer scope");
    let output = WRITER_SCOPE_DEPTH.sync_scope(depth, f);
    debug!(depth, "Left writer scope");
    output
}

// =============================================================================
// Statement Classification
// =============================================================================

/// Whether a statement reads or mutates data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Read,
    Write,
}

impl StatementKind {
    /// Classifies SQL text. SQLite runs every statement of a `;`-separated
    /// batch, so the text is a write if any of its statements is.
    pub fn classify(sql: &str) -> Self {
        let mut statements = split_statements(sql)
            .into_iter()
            .filter(|statement| !skip_comments(statement).is_empty())
            .peekable();

        if statements.peek().is_none() {
            return StatementKind::Write;
        }
        if statements.any(|statement| Self::classify_one(statement).is_write()) {
            StatementKind::Write
        } else {
            StatementKind::Read
        }
    }

    /// Classifies a single statement by its leading keyword.
    fn classify_one(sql: &str) -> Self {
        let body = skip_comments(sql);
        let keyword = leading_keyword(body);

        match keyword.as_str() {
            "SELECT" | "VALUES" | "EXPLAIN" => StatementKind::Read,
            "BEGIN" | "COMMIT" | "END" | "ROLLBACK" | "SAVEPOINT" | "RELEASE" => {
                StatementKind::Read
            }
            "PRAGMA" if !body.contains('=') => StatementKind::Read,
            "WITH" => {
                let modifies = words(body)
                    .any(|word| matches!(word.as_str(), "INSERT" | "UPDATE" | "DELETE" | "REPLACE"));
                if modifies {
                    StatementKind::Write
                } else {
                    StatementKind::Read
                }
            }
            _ => StatementKind::Write,
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(self, StatementKind::Write)
    }
}

/// Strips leading whitespace, `-- line` and `/* block */` comments.
fn skip_comments(mut sql: &str) -> &str {
    loop {
        sql = sql.trim_start();
        if let Some(rest) = sql.strip_prefix("--") {
            sql = rest.split_once('\n').map_or("", |(_, tail)| tail);
        } else if let Some(rest) = sql.strip_prefix("/*") {
            sql = rest.split_once("*/").map_or("", |(_, tail)| tail);
        } else {
            return sql;
        }
    }
}

/// Splits on `;` outside quoted text and comments.
fn split_statements(sql: &str) -> Vec<&str> {
    let bytes = sql.as_bytes();
    let mut statements = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"' | b'`') => {
                // A doubled quote is an escaped quote and keeps the literal open.
                i += 1;
                while i < bytes.len() {
                    if bytes[i] == quote {
                        if bytes.get(i + 1) == Some(&quote) {
                            i += 1;
                        } else {
                            break;
                        }
                    }
                    i += 1;
                }
            }
            b'[' => {
                while i < bytes.len() && bytes[i] != b']' {
                    i += 1;
                }
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                    i += 1;
                }
                i += 1;
            }
            b';' => {
                statements.push(&sql[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    if start < sql.len() {
        statements.push(&sql[start..]);
    }
    statements
}

fn leading_keyword(sql: &str) -> String {
    sql.chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase()
}

fn words(sql: &str) -> impl Iterator<Item = String> + '_ {
    sql.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|word| !word.is_empty())
        .map(|word| word.to_ascii_uppercase())
}

// =============================================================================
// Violation
// =============================================================================

/// A mutating statement was sent to a replica-bound session outside a
/// writer scope.
#[derive(Debug, Clone, Error)]
#[error("{message} ({role} session, statement: {statement})")]
pub struct UnsafeWriterAccess {
    message: String,
    role: Role,
    statement: String,
    trace: Vec<String>,
}

impl UnsafeWriterAccess {
    fn capture(role: Role, statement: &str) -> Self {
        UnsafeWriterAccess {
            message: UNSAFE_WRITER_ACCESS_MSG.to_string(),
            role,
            statement: statement.trim().to_string(),
            trace: capture_trace(TRACE_LIMIT),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// The offending SQL text.
    pub fn statement(&self) -> &str {
        &self.statement
    }

    /// Call stack at the violating call, at most [`TRACE_LIMIT`] frames.
    ///
    /// Frames are empty when the binary carries no symbols.
    pub fn trace(&self) -> &[String] {
        &self.trace
    }
}

/// Captures the current call stack as one string per frame.
fn capture_trace(limit: usize) -> Vec<String> {
    let rendered = Backtrace::force_capture().to_string();
    let mut frames: Vec<String> = Vec::new();

    for line in rendered.lines() {
        let trimmed = line.trim();
        let starts_frame = trimmed
            .split_once(':')
            .is_some_and(|(index, _)| !index.is_empty() && index.chars().all(|c| c.is_ascii_digit()));

        if starts_frame {
            frames.push(trimmed.to_string());
        } else if let Some(frame) = frames.last_mut() {
            frame.push(' ');
            frame.push_str(trimmed);
        }
    }

    frames
        .into_iter()
        .filter(|frame| !frame.contains("backtrace") && !frame.contains("capture_trace"))
        .take(limit)
        .collect()
}

// =============================================================================
// Guard Check
// =============================================================================

/// Checks a statement against the session role and the task's scope state.
///
/// ## Returns
/// * `Ok(kind)` - the statement may run
/// * `Err(UnsafeWriterAccess)` - mutating statement on a replica session
///   with no writer scope active
pub fn check_access(role: Role, sql: &str) -> Result<StatementKind, UnsafeWriterAccess> {
    let kind = StatementKind::classify(sql);
    let state = scope_state();

    if role == Role::Replica && kind.is_write() && !state.is_active() {
        let violation = UnsafeWriterAccess::capture(role, sql);
        warn!(
            role = %role,
            statement = %violation.statement(),
            trace = %violation.trace().join("\n"),
            "{}",
            UNSAFE_WRITER_ACCESS_MSG
        );
        return Err(violation);
    }

    debug!(role = %role, kind = ?kind, scope = ?state, "Statement allowed");
    Ok(kind)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_reads() {
        assert_eq!(StatementKind::classify("SELECT 1"), StatementKind::Read);
        assert_eq!(StatementKind::classify("  select * from orders"), StatementKind::Read);
        assert_eq!(
            StatementKind::classify("-- lookup\nSELECT id FROM orders"),
            StatementKind::Read
        );
        assert_eq!(
            StatementKind::classify("/* hint */ SELECT id FROM orders"),
            StatementKind::Read
        );
        assert_eq!(
            StatementKind::classify("WITH t AS (SELECT 1) SELECT * FROM t"),
            StatementKind::Read
        );
        assert_eq!(StatementKind::classify("PRAGMA foreign_keys"), StatementKind::Read);
    }

    #[test]
    fn test_classify_writes() {
        assert_eq!(
            StatementKind::classify("UPDATE orders SET status = 'paid'"),
            StatementKind::Write
        );
        assert_eq!(StatementKind::classify("insert into t values (1)"), StatementKind::Write);
        assert_eq!(StatementKind::classify("DELETE FROM t"), StatementKind::Write);
        assert_eq!(
            StatementKind::classify("WITH t AS (SELECT 1) DELETE FROM orders"),
            StatementKind::Write
        );
        assert_eq!(StatementKind::classify("PRAGMA user_version = 3"), StatementKind::Write);
        assert_eq!(StatementKind::classify("CREATE TABLE x (id INT)"), StatementKind::Write);
        assert_eq!(StatementKind::classify(""), StatementKind::Write);
        assert_eq!(StatementKind::classify("-- only a comment"), StatementKind::Write);
    }

    #[test]
    fn test_classify_batches() {
        assert_eq!(
            StatementKind::classify("SELECT 1; DELETE FROM orders"),
            StatementKind::Write
        );
        assert_eq!(
            StatementKind::classify("select 1;\n  -- cleanup\n  update orders set status = 'x'"),
            StatementKind::Write
        );
        assert_eq!(StatementKind::classify("SELECT 1; SELECT 2;"), StatementKind::Read);
        assert_eq!(StatementKind::classify("SELECT 1;"), StatementKind::Read);
        // Separators inside literals and comments do not split.
        assert_eq!(
            StatementKind::classify("SELECT ';DELETE FROM orders' AS s"),
            StatementKind::Read
        );
        assert_eq!(
            StatementKind::classify("SELECT 'it''s; DROP TABLE orders' FROM t"),
            StatementKind::Read
        );
        assert_eq!(
            StatementKind::classify("SELECT 1 /* ; DELETE */ FROM t -- ; DROP"),
            StatementKind::Read
        );
        assert_eq!(
            StatementKind::classify("SELECT \"a;b\" FROM t; INSERT INTO t VALUES (1)"),
            StatementKind::Write
        );
    }

    #[test]
    fn test_idle_outside_scope() {
        assert_eq!(scope_state(), ScopeState::Idle);
        assert_eq!(writer_scope_depth(), 0);
    }

    #[test]
    fn test_replica_write_outside_scope_is_rejected() {
        let err = check_access(Role::Replica, "UPDATE orders SET status = 'x'").unwrap_err();

        assert_eq!(err.role(), Role::Replica);
        assert_eq!(err.statement(), "UPDATE orders SET status = 'x'");
        assert_eq!(err.message(), UNSAFE_WRITER_ACCESS_MSG);
        assert!(err.trace().len() <= TRACE_LIMIT);
    }

    #[test]
    fn test_reads_and_writer_sessions_pass() {
        assert_eq!(
            check_access(Role::Replica, "SELECT 1").unwrap(),
            StatementKind::Read
        );
        assert_eq!(
            check_access(Role::Writer, "DELETE FROM orders").unwrap(),
            StatementKind::Write
        );
    }

    #[test]
    fn test_replica_batch_with_write_is_rejected() {
        let err = check_access(Role::Replica, "SELECT 1; DELETE FROM orders").unwrap_err();
        assert_eq!(err.role(), Role::Replica);
        assert!(check_access(Role::Replica, "SELECT 1; SELECT 2").is_ok());
    }

    #[test]
    fn test_sync_scope_allows_replica_write() {
        let result = allow_writer_sync(|| check_access(Role::Replica, "DELETE FROM orders"));
        assert!(result.is_ok());
        assert_eq!(scope_state(), ScopeState::Idle);
    }

    #[tokio::test]
    async fn test_nested_scopes_act_as_one() {
        allow_writer(async {
            assert_eq!(scope_state(), ScopeState::WriterScopeActive { depth: 1 });

            allow_writer(async {
                assert_eq!(scope_state(), ScopeState::WriterScopeActive { depth: 2 });
            })
            .await;

            // Inner exit must not clear the outer scope.
            assert_eq!(scope_state(), ScopeState::WriterScopeActive { depth: 1 });
            assert!(check_access(Role::Replica, "UPDATE t SET a = 1").is_ok());
        })
        .await;

        assert_eq!(scope_state(), ScopeState::Idle);
        assert!(check_access(Role::Replica, "UPDATE t SET a = 1").is_err());
    }

    #[tokio::test]
    async fn test_scope_cleared_after_error() {
        let result: Result<(), &str> = allow_writer(async {
            assert!(scope_state().is_active());
            Err("boom")
        })
        .await;

        assert!(result.is_err());
        assert_eq!(scope_state(), ScopeState::Idle);
    }

    #[tokio::test]
    async fn test_cancelled_inner_scope_restores_outer_depth() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let inner_depth = Arc::new(AtomicUsize::new(0));

        allow_writer(async {
            let (tx, rx) = tokio::sync::oneshot::channel::<()>();
            let seen = Arc::clone(&inner_depth);
            let inner = allow_writer(async move {
                seen.store(writer_scope_depth(), Ordering::SeqCst);
                let _ = rx.await;
            });

            // Poll the inner scope once, then drop it mid-flight.
            tokio::select! {
                biased;
                _ = inner => unreachable!("inner scope cannot finish before the sender fires"),
                _ = async {} => {}
            }
            drop(tx);

            assert_eq!(inner_depth.load(Ordering::SeqCst), 2);
            assert_eq!(scope_state(), ScopeState::WriterScopeActive { depth: 1 });
            assert!(check_access(Role::Replica, "DELETE FROM orders").is_ok());
        })
        .await;

        assert_eq!(scope_state(), ScopeState::Idle);
    }

    #[tokio::test]
    async fn test_scope_does_not_leak_into_spawned_tasks() {
        let seen = allow_writer(async {
            tokio::spawn(async { scope_state() }).await.unwrap()
        })
        .await;

        assert_eq!(seen, ScopeState::Idle);
    }

    #[tokio::test]
    async fn test_concurrent_tasks_are_isolated() {
        let scoped = tokio::spawn(allow_writer(async {
            tokio::task::yield_now().await;
            scope_state()
        }));
        let plain = tokio::spawn(async {
            tokio::task::yield_now().await;
            scope_state()
        });

        assert!(scoped.await.unwrap().is_active());
        assert_eq!(plain.await.unwrap(), ScopeState::Idle);
    }
}

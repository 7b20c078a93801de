//! Database seam: the trait the engine talks to, its error type and backends
//!
//! The engine never owns a connection directly. Every lookup and write goes
//! through [`Database`], which lets the same phase code run against SQL
//! Server, a SQLite copy of the schema, or a script recorder.

pub mod mssql;
pub mod script;
pub mod sqlite;

#[cfg(test)]
pub mod testing;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::config::{Backend, DatabaseSettings};
use crate::sql::{SqlDialect, Statement};
use crate::value::Value;

/// Kind of constraint that rejected a write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityKind {
    /// Primary key or unique index already holds the value
    Duplicate,
    /// Foreign key points at a row that does not exist
    MissingReference,
    /// NOT NULL, CHECK and similar
    Other,
}

/// Database failure, classified for the phase runners
#[derive(Debug, Clone)]
pub enum DbError {
    /// Constraint violation on a single statement
    Integrity { kind: IntegrityKind, message: String },
    /// Database unreachable or connection lost
    Connectivity(String),
    /// Anything else the server rejected (syntax, unknown column, ...)
    Query(String),
}

impl DbError {
    pub fn is_duplicate(&self) -> bool {
        matches!(
            self,
            DbError::Integrity {
                kind: IntegrityKind::Duplicate,
                ..
            }
        )
    }

    pub fn is_missing_reference(&self) -> bool {
        matches!(
            self,
            DbError::Integrity {
                kind: IntegrityKind::MissingReference,
                ..
            }
        )
    }

    pub fn is_connectivity(&self) -> bool {
        matches!(self, DbError::Connectivity(_))
    }
}

impl std::fmt::Display for DbError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DbError::Integrity { kind, message } => {
                let label = match kind {
                    IntegrityKind::Duplicate => "duplicate key",
                    IntegrityKind::MissingReference => "missing referenced row",
                    IntegrityKind::Other => "constraint violation",
                };
                write!(f, "{}: {}", label, message)
            }
            DbError::Connectivity(message) => write!(f, "database unreachable: {}", message),
            DbError::Query(message) => write!(f, "query failed: {}", message),
        }
    }
}

impl std::error::Error for DbError {}

/// Connection used by a session
///
/// Implementations serialize access internally; a phase runner holds the
/// transaction from `begin` to `commit`/`rollback`, and statements issued in
/// between run inside it.
#[async_trait]
pub trait Database: Send + Sync {
    fn dialect(&self) -> SqlDialect;

    /// Run a query and return every row as positional values
    async fn fetch_all(&self, statement: &Statement) -> Result<Vec<Vec<Value>>, DbError>;

    /// Run a write or control statement, returning affected rows when known
    async fn execute(&self, statement: &Statement) -> Result<u64, DbError>;

    async fn begin(&self) -> Result<(), DbError>;

    async fn commit(&self) -> Result<(), DbError>;

    async fn rollback(&self) -> Result<(), DbError>;
}

/// First column of every row as an integer id, in database order
pub async fn fetch_ids(db: &dyn Database, statement: &Statement) -> Result<Vec<i64>, DbError> {
    let rows = db.fetch_all(statement).await?;
    Ok(rows
        .iter()
        .filter_map(|row| row.first().and_then(Value::as_int))
        .collect())
}

/// Single integer scalar such as `MAX(...)`; `None` when the table is empty
pub async fn fetch_max(db: &dyn Database, statement: &Statement) -> Result<Option<i64>, DbError> {
    Ok(fetch_ids(db, statement).await?.into_iter().next())
}

/// First column of every row as text
pub async fn fetch_strings(db: &dyn Database, statement: &Statement) -> Result<Vec<String>, DbError> {
    let rows = db.fetch_all(statement).await?;
    Ok(rows
        .iter()
        .filter_map(|row| row.first().and_then(Value::canonical))
        .collect())
}

/// Open the configured backend
pub async fn connect(settings: &DatabaseSettings) -> Result<Box<dyn Database>> {
    let url = settings
        .url
        .as_deref()
        .context("No database connection configured (set [database].url or IMM_DATABASE_URL)")?;

    match settings.backend {
        Backend::Sqlite => {
            let db = sqlite::SqliteDatabase::connect(url)
                .await
                .with_context(|| format!("Failed to open SQLite database: {}", url))?;
            Ok(Box::new(db))
        }
        Backend::Mssql => {
            let db = mssql::MssqlDatabase::connect(url, settings.password.as_deref())
                .await
                .context("Failed to connect to SQL Server")?;
            Ok(Box::new(db))
        }
    }
}

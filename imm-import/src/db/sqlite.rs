//! SQLite backend on sqlx

use async_trait::async_trait;
use sqlx::error::ErrorKind;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool, Transaction, TypeInfo, ValueRef};
use tokio::sync::Mutex;

use super::{Database, DbError, IntegrityKind};
use crate::sql::{SqlDialect, Statement};
use crate::value::Value;

/// SQLite database, optionally inside an open transaction
pub struct SqliteDatabase {
    pool: SqlitePool,
    tx: Mutex<Option<Transaction<'static, Sqlite>>>,
}

impl SqliteDatabase {
    /// Open a database by URL, e.g. `sqlite://collections.db` or `sqlite::memory:`
    ///
    /// A single pooled connection keeps in-memory databases alive and matches
    /// the single-writer session model.
    pub async fn connect(url: &str) -> Result<Self, DbError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect(url)
            .await
            .map_err(classify)?;
        log::debug!("Opened SQLite database {}", url);
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            tx: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::Sqlite
    }

    async fn fetch_all(&self, statement: &Statement) -> Result<Vec<Vec<Value>>, DbError> {
        let mut guard = self.tx.lock().await;
        let query = bind_all(sqlx::query(&statement.sql), &statement.params);
        let rows = match guard.as_mut() {
            Some(tx) => query.fetch_all(&mut **tx).await,
            None => query.fetch_all(&self.pool).await,
        }
        .map_err(classify)?;

        rows.iter().map(decode_row).collect()
    }

    async fn execute(&self, statement: &Statement) -> Result<u64, DbError> {
        let mut guard = self.tx.lock().await;
        let query = bind_all(sqlx::query(&statement.sql), &statement.params);
        let result = match guard.as_mut() {
            Some(tx) => query.execute(&mut **tx).await,
            None => query.execute(&self.pool).await,
        }
        .map_err(classify)?;

        Ok(result.rows_affected())
    }

    async fn begin(&self) -> Result<(), DbError> {
        let mut guard = self.tx.lock().await;
        if guard.is_some() {
            return Err(DbError::Query("transaction already open".into()));
        }
        *guard = Some(self.pool.begin().await.map_err(classify)?);
        Ok(())
    }

    async fn commit(&self) -> Result<(), DbError> {
        let tx = self.tx.lock().await.take();
        match tx {
            Some(tx) => tx.commit().await.map_err(classify),
            None => Err(DbError::Query("no open transaction to commit".into())),
        }
    }

    async fn rollback(&self) -> Result<(), DbError> {
        let tx = self.tx.lock().await.take();
        match tx {
            Some(tx) => tx.rollback().await.map_err(classify),
            None => Ok(()),
        }
    }
}

fn bind_all<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &'q [Value],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            Value::Null => query.bind(None::<String>),
            Value::String(s) => query.bind(s.as_str()),
            Value::Int(i) => query.bind(*i),
            Value::Float(f) => query.bind(*f),
            Value::Bool(b) => query.bind(*b),
            Value::Date(d) => query.bind(d.format("%Y-%m-%d").to_string()),
            Value::DateTime(dt) => query.bind(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        };
    }
    query
}

/// Decode by the storage class of each value, since computed columns carry no declared type
fn decode_row(row: &SqliteRow) -> Result<Vec<Value>, DbError> {
    let mut values = Vec::with_capacity(row.len());
    for idx in 0..row.len() {
        let raw = row.try_get_raw(idx).map_err(classify)?;
        if raw.is_null() {
            values.push(Value::Null);
            continue;
        }
        let storage = raw.type_info().name().to_string();
        let value = match storage.as_str() {
            "INTEGER" | "BOOLEAN" => Value::Int(row.try_get_unchecked::<i64, _>(idx).map_err(classify)?),
            "REAL" | "NUMERIC" => Value::Float(row.try_get_unchecked::<f64, _>(idx).map_err(classify)?),
            "BLOB" => {
                let bytes = row.try_get_unchecked::<Vec<u8>, _>(idx).map_err(classify)?;
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            }
            _ => Value::String(row.try_get_unchecked::<String, _>(idx).map_err(classify)?),
        };
        values.push(value);
    }
    Ok(values)
}

fn classify(err: sqlx::Error) -> DbError {
    match &err {
        sqlx::Error::Database(db_err) => {
            let kind = match db_err.kind() {
                ErrorKind::UniqueViolation => Some(IntegrityKind::Duplicate),
                ErrorKind::ForeignKeyViolation => Some(IntegrityKind::MissingReference),
                ErrorKind::NotNullViolation | ErrorKind::CheckViolation => Some(IntegrityKind::Other),
                _ => None,
            };
            match kind {
                Some(kind) => DbError::Integrity {
                    kind,
                    message: db_err.message().to_string(),
                },
                None => DbError::Query(db_err.message().to_string()),
            }
        }
        sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            DbError::Connectivity(err.to_string())
        }
        _ => DbError::Query(err.to_string()),
    }
}

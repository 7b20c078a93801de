//! SQL Server backend on tiberius

use std::borrow::Cow;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use tiberius::{AuthMethod, Client, ColumnData, Config, ToSql};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use super::{Database, DbError, IntegrityKind};
use crate::sql::{SqlDialect, Statement};
use crate::value::Value;

/// Server error numbers the importer distinguishes
mod codes {
    pub const UNIQUE_INDEX: u32 = 2601;
    pub const PRIMARY_KEY: u32 = 2627;
    pub const FOREIGN_KEY: u32 = 547;
    pub const NOT_NULL: u32 = 515;
}

/// SQL Server connection
///
/// Parameterless statements go out as plain batches so that session settings
/// such as `SET IDENTITY_INSERT` outlive the statement that set them.
pub struct MssqlDatabase {
    client: Mutex<Client<Compat<TcpStream>>>,
}

impl MssqlDatabase {
    /// Connect with an ADO.NET connection string
    ///
    /// `password` fills in a missing `Password=` entry when given.
    pub async fn connect(ado: &str, password: Option<&str>) -> Result<Self, DbError> {
        let mut config = Config::from_ado_string(ado).map_err(classify)?;
        if let Some(password) = password {
            let user = ado_value(ado, &["user id", "uid", "user"]).unwrap_or_default();
            config.authentication(AuthMethod::sql_server(user, password));
        }

        let tcp = TcpStream::connect(config.get_addr())
            .await
            .map_err(|e| DbError::Connectivity(e.to_string()))?;
        tcp.set_nodelay(true)
            .map_err(|e| DbError::Connectivity(e.to_string()))?;

        let client = Client::connect(config, tcp.compat_write())
            .await
            .map_err(classify)?;

        log::debug!("Connected to SQL Server");
        Ok(Self {
            client: Mutex::new(client),
        })
    }

    async fn batch(&self, sql: &str) -> Result<(), DbError> {
        let mut client = self.client.lock().await;
        client
            .simple_query(sql)
            .await
            .map_err(classify)?
            .into_results()
            .await
            .map_err(classify)?;
        Ok(())
    }
}

#[async_trait]
impl Database for MssqlDatabase {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::Mssql
    }

    async fn fetch_all(&self, statement: &Statement) -> Result<Vec<Vec<Value>>, DbError> {
        let sql = number_placeholders(&statement.sql);
        let params: Vec<MssqlParam> = statement.params.iter().map(MssqlParam::from).collect();
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p as &dyn ToSql).collect();

        let mut client = self.client.lock().await;
        let rows = client
            .query(sql, &param_refs[..])
            .await
            .map_err(classify)?
            .into_first_result()
            .await
            .map_err(classify)?;

        Ok(rows
            .into_iter()
            .map(|row| row.into_iter().map(column_data_to_value).collect())
            .collect())
    }

    async fn execute(&self, statement: &Statement) -> Result<u64, DbError> {
        if statement.params.is_empty() {
            self.batch(&statement.sql).await?;
            return Ok(0);
        }

        let sql = number_placeholders(&statement.sql);
        let params: Vec<MssqlParam> = statement.params.iter().map(MssqlParam::from).collect();
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p as &dyn ToSql).collect();

        let mut client = self.client.lock().await;
        let result = client.execute(sql, &param_refs[..]).await.map_err(classify)?;
        Ok(result.total())
    }

    async fn begin(&self) -> Result<(), DbError> {
        self.batch("BEGIN TRANSACTION").await
    }

    async fn commit(&self) -> Result<(), DbError> {
        self.batch("COMMIT TRANSACTION").await
    }

    async fn rollback(&self) -> Result<(), DbError> {
        self.batch("IF @@TRANCOUNT > 0 ROLLBACK TRANSACTION").await
    }
}

/// Rewrite `?` placeholders to `@P1`, `@P2`, ... outside string literals
fn number_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut in_quote = false;
    let mut n = 0;
    for ch in sql.chars() {
        match ch {
            '\'' => {
                in_quote = !in_quote;
                out.push(ch);
            }
            '?' if !in_quote => {
                n += 1;
                out.push_str(&format!("@P{}", n));
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Case-insensitive lookup of a key in an ADO.NET connection string
fn ado_value(ado: &str, keys: &[&str]) -> Option<String> {
    ado.split(';').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        let key = key.trim().to_ascii_lowercase();
        keys.contains(&key.as_str()).then(|| value.trim().to_string())
    })
}

/// Owned parameter handed to tiberius
#[derive(Debug)]
enum MssqlParam {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl From<&Value> for MssqlParam {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => MssqlParam::Null,
            Value::Bool(b) => MssqlParam::Bool(*b),
            Value::Int(i) => MssqlParam::I64(*i),
            Value::Float(f) => MssqlParam::F64(*f),
            Value::String(s) => MssqlParam::String(s.clone()),
            Value::Date(d) => MssqlParam::Date(*d),
            Value::DateTime(dt) => MssqlParam::DateTime(*dt),
        }
    }
}

impl ToSql for MssqlParam {
    fn to_sql(&self) -> ColumnData<'_> {
        match self {
            MssqlParam::Null => ColumnData::I32(None),
            MssqlParam::Bool(v) => ColumnData::Bit(Some(*v)),
            MssqlParam::I64(v) => ColumnData::I64(Some(*v)),
            MssqlParam::F64(v) => ColumnData::F64(Some(*v)),
            MssqlParam::String(v) => ColumnData::String(Some(Cow::Borrowed(v.as_str()))),
            MssqlParam::Date(v) => v.to_sql(),
            MssqlParam::DateTime(v) => v.to_sql(),
        }
    }
}

fn days_after(year: i32, days: i64) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 1, 1).map(|base| base + Duration::days(days))
}

fn column_data_to_value(data: ColumnData<'static>) -> Value {
    match data {
        ColumnData::Bit(v) => v.map(Value::Bool).unwrap_or(Value::Null),
        ColumnData::U8(v) => v.map(|n| Value::Int(n as i64)).unwrap_or(Value::Null),
        ColumnData::I16(v) => v.map(|n| Value::Int(n as i64)).unwrap_or(Value::Null),
        ColumnData::I32(v) => v.map(|n| Value::Int(n as i64)).unwrap_or(Value::Null),
        ColumnData::I64(v) => v.map(Value::Int).unwrap_or(Value::Null),
        ColumnData::F32(v) => v.map(|n| Value::Float(n as f64)).unwrap_or(Value::Null),
        ColumnData::F64(v) => v.map(Value::Float).unwrap_or(Value::Null),
        ColumnData::String(v) => v.map(|s| Value::String(s.into_owned())).unwrap_or(Value::Null),
        ColumnData::Guid(v) => v.map(|g| Value::String(g.to_string())).unwrap_or(Value::Null),
        ColumnData::Numeric(v) => v
            .map(|n| {
                let f: f64 = n.into();
                Value::number(f)
            })
            .unwrap_or(Value::Null),
        ColumnData::DateTime(v) => v
            .and_then(|dt| {
                let date = days_after(1900, dt.days() as i64)?;
                let secs = (dt.seconds_fragments() as f64 / 300.0) as u32;
                let time = NaiveTime::from_num_seconds_from_midnight_opt(secs, 0)?;
                Some(Value::timestamp(date.and_time(time)))
            })
            .unwrap_or(Value::Null),
        ColumnData::SmallDateTime(v) => v
            .and_then(|dt| {
                let date = days_after(1900, dt.days() as i64)?;
                let time = NaiveTime::from_num_seconds_from_midnight_opt(dt.seconds_fragments() as u32 * 60, 0)?;
                Some(Value::timestamp(date.and_time(time)))
            })
            .unwrap_or(Value::Null),
        ColumnData::DateTime2(v) => v
            .and_then(|dt| {
                let date = days_after(1, dt.date().days() as i64)?;
                let increments = dt.time().increments();
                let time = NaiveTime::from_num_seconds_from_midnight_opt(
                    (increments / 10_000_000) as u32,
                    ((increments % 10_000_000) * 100) as u32,
                )?;
                Some(Value::timestamp(date.and_time(time)))
            })
            .unwrap_or(Value::Null),
        ColumnData::Date(v) => v
            .and_then(|d| days_after(1, d.days() as i64))
            .map(Value::Date)
            .unwrap_or(Value::Null),
        ColumnData::Xml(v) => v
            .map(|x| Value::String(x.into_owned().into_string()))
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn classify(err: tiberius::error::Error) -> DbError {
    match &err {
        tiberius::error::Error::Server(token) => {
            let kind = match token.code() {
                codes::UNIQUE_INDEX | codes::PRIMARY_KEY => Some(IntegrityKind::Duplicate),
                codes::FOREIGN_KEY => Some(IntegrityKind::MissingReference),
                codes::NOT_NULL => Some(IntegrityKind::Other),
                _ => None,
            };
            match kind {
                Some(kind) => DbError::Integrity {
                    kind,
                    message: token.message().to_string(),
                },
                None => DbError::Query(token.message().to_string()),
            }
        }
        tiberius::error::Error::Io { .. }
        | tiberius::error::Error::Tls(_)
        | tiberius::error::Error::Routing { .. } => DbError::Connectivity(err.to_string()),
        _ => DbError::Query(err.to_string()),
    }
}

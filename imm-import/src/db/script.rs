//! Records writes as a SQL script instead of executing them

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{Database, DbError};
use crate::sql::{SqlDialect, Statement};
use crate::value::Value;

/// Wraps a reading connection; lookups hit the database, writes land in the script
///
/// Constraint violations cannot be detected here, so every recorded write
/// counts as successful.
pub struct ScriptRecorder {
    reader: Box<dyn Database>,
    dialect: SqlDialect,
    lines: Mutex<Vec<String>>,
}

impl ScriptRecorder {
    pub fn new(reader: Box<dyn Database>, dialect: SqlDialect) -> Self {
        Self {
            reader,
            dialect,
            lines: Mutex::new(Vec::new()),
        }
    }

    /// Number of statements recorded so far
    pub async fn len(&self) -> usize {
        self.lines.lock().await.len()
    }

    pub async fn script(&self) -> String {
        let lines = self.lines.lock().await;
        let mut out = String::new();
        for line in lines.iter() {
            out.push_str(line);
            out.push_str(";\n");
        }
        let separator = self.dialect.batch_separator();
        if !separator.is_empty() && !lines.is_empty() {
            out.push_str(separator);
            out.push('\n');
        }
        out
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let script = self.script().await;
        tokio::fs::write(path, script)
            .await
            .with_context(|| format!("Failed to write SQL script: {}", path.display()))?;
        log::info!("SQL script written to: {}", path.display());
        Ok(())
    }

    async fn record(&self, statement: &Statement) {
        let rendered = statement.render(self.dialect);
        log::debug!("Recorded: {}", rendered);
        self.lines.lock().await.push(rendered);
    }
}

#[async_trait]
impl Database for ScriptRecorder {
    fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    async fn fetch_all(&self, statement: &Statement) -> Result<Vec<Vec<Value>>, DbError> {
        self.reader.fetch_all(statement).await
    }

    async fn execute(&self, statement: &Statement) -> Result<u64, DbError> {
        self.record(statement).await;
        Ok(1)
    }

    async fn begin(&self) -> Result<(), DbError> {
        self.record(&Statement::new("BEGIN TRANSACTION")).await;
        Ok(())
    }

    async fn commit(&self) -> Result<(), DbError> {
        self.record(&Statement::new("COMMIT TRANSACTION")).await;
        Ok(())
    }

    async fn rollback(&self) -> Result<(), DbError> {
        self.record(&Statement::new("ROLLBACK TRANSACTION")).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::{count, fixture_db, seed};

    #[tokio::test]
    async fn test_reads_pass_through_and_writes_are_recorded() {
        let reader = fixture_db().await;
        seed(&reader, "INSERT INTO Person (person_id, search_name) VALUES (3, 'Meg Sugrue')").await;
        let recorder = ScriptRecorder::new(Box::new(reader), SqlDialect::Mssql);

        let rows = recorder
            .fetch_all(&Statement::new("SELECT person_id FROM Person WHERE search_name = ?").bind("Meg Sugrue"))
            .await
            .unwrap();
        assert_eq!(rows, vec![vec![Value::Int(3)]]);

        recorder.begin().await.unwrap();
        recorder
            .execute(&Statement::new("INSERT INTO Person (person_id, search_name) VALUES (?, ?)").bind(4).bind("Sean O'Brien"))
            .await
            .unwrap();
        recorder.commit().await.unwrap();

        let script = recorder.script().await;
        assert_eq!(
            script,
            "BEGIN TRANSACTION;\nINSERT INTO Person (person_id, search_name) VALUES (4, 'Sean O''Brien');\nCOMMIT TRANSACTION;\nGO\n"
        );
        assert_eq!(recorder.len().await, 3);
    }

    #[tokio::test]
    async fn test_recorded_writes_do_not_touch_database() {
        let reader = fixture_db().await;
        let recorder = ScriptRecorder::new(Box::new(reader), SqlDialect::Mssql);
        recorder
            .execute(&Statement::new("INSERT INTO Person (person_id, search_name) VALUES (?, ?)").bind(1).bind("Evan Harley"))
            .await
            .unwrap();
        let rows = recorder
            .fetch_all(&Statement::new("SELECT COUNT(*) FROM Person"))
            .await
            .unwrap();
        assert_eq!(rows[0][0], Value::Int(0));
    }

    #[tokio::test]
    async fn test_fixture_count_helper() {
        let db = fixture_db().await;
        assert_eq!(count(&db, "Item").await, 0);
    }
}

//! Dialect differences between SQL Server and SQLite

use serde::{Deserialize, Serialize};

use super::Statement;
use crate::discipline::Discipline;

/// Target SQL dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    Mssql,
    Sqlite,
}

impl SqlDialect {
    /// Operator joining a line break into a string literal
    pub fn newline_concat(&self) -> &'static str {
        match self {
            SqlDialect::Mssql => " + CHAR(13) + CHAR(10) + ",
            SqlDialect::Sqlite => " || char(10) || ",
        }
    }

    /// `ENABLE`/`DISABLE TRIGGER`; SQLite has no trigger switch
    pub fn trigger(&self, name: &str, table: &str, enabled: bool) -> Option<Statement> {
        match self {
            SqlDialect::Mssql => {
                let verb = if enabled { "ENABLE" } else { "DISABLE" };
                Some(Statement::new(format!("{} TRIGGER {} ON {}", verb, name, table)))
            }
            SqlDialect::Sqlite => None,
        }
    }

    /// `SET IDENTITY_INSERT`; SQLite accepts explicit keys without it
    pub fn identity_insert(&self, table: &str, on: bool) -> Option<Statement> {
        match self {
            SqlDialect::Mssql => Some(Statement::new(format!(
                "SET IDENTITY_INSERT {} {}",
                table,
                if on { "ON" } else { "OFF" }
            ))),
            SqlDialect::Sqlite => None,
        }
    }

    pub fn savepoint(&self, name: &str) -> Statement {
        match self {
            SqlDialect::Mssql => Statement::new(format!("SAVE TRANSACTION {}", name)),
            SqlDialect::Sqlite => Statement::new(format!("SAVEPOINT {}", name)),
        }
    }

    pub fn rollback_to_savepoint(&self, name: &str) -> Statement {
        match self {
            SqlDialect::Mssql => Statement::new(format!("ROLLBACK TRANSACTION {}", name)),
            SqlDialect::Sqlite => Statement::new(format!("ROLLBACK TO SAVEPOINT {}", name)),
        }
    }

    /// SQL Server savepoints are released by the enclosing commit
    pub fn release_savepoint(&self, name: &str) -> Option<Statement> {
        match self {
            SqlDialect::Mssql => None,
            SqlDialect::Sqlite => Some(Statement::new(format!("RELEASE SAVEPOINT {}", name))),
        }
    }

    /// Rebuild of the denormalized scientific names after a taxonomy load
    pub fn build_scientific_names(&self, discipline: Discipline) -> Option<Statement> {
        match self {
            SqlDialect::Mssql => Some(
                Statement::new("EXEC BuildAllScientificNames @discipline_cd = ?")
                    .bind(discipline.code()),
            ),
            SqlDialect::Sqlite => None,
        }
    }

    /// Statement terminator used in scripts
    pub fn batch_separator(&self) -> &'static str {
        match self {
            SqlDialect::Mssql => "GO",
            SqlDialect::Sqlite => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_statements() {
        let disable = SqlDialect::Mssql.trigger("create_sname", "Taxon", false).unwrap();
        assert_eq!(disable.sql, "DISABLE TRIGGER create_sname ON Taxon");
        assert!(SqlDialect::Sqlite.trigger("create_sname", "Taxon", true).is_none());
    }

    #[test]
    fn test_identity_insert() {
        let on = SqlDialect::Mssql.identity_insert("Taxonomy", true).unwrap();
        assert_eq!(on.sql, "SET IDENTITY_INSERT Taxonomy ON");
        assert!(SqlDialect::Sqlite.identity_insert("Taxonomy", true).is_none());
    }

    #[test]
    fn test_savepoints() {
        assert_eq!(SqlDialect::Sqlite.savepoint("row_4").sql, "SAVEPOINT row_4");
        assert_eq!(
            SqlDialect::Mssql.rollback_to_savepoint("row_4").sql,
            "ROLLBACK TRANSACTION row_4"
        );
        assert!(SqlDialect::Mssql.release_savepoint("row_4").is_none());
    }
}

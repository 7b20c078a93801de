//! Trigger and identity-insert switching around bulk writes

use crate::config::TriggerSettings;
use crate::sql::{SqlDialect, Statement};

/// Something that can be switched for the duration of a phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// The configured trigger set
    Triggers,
    /// `IDENTITY_INSERT` on one table
    Identity(String),
}

/// Tracks what is switched off so every change is issued exactly once
///
/// SQL Server allows `IDENTITY_INSERT` on a single table per session, so
/// switching it on for a new table first switches the previous one off.
#[derive(Debug)]
pub struct IntegrityToggle {
    dialect: SqlDialect,
    triggers: Vec<TriggerSettings>,
    triggers_disabled: bool,
    identity_table: Option<String>,
}

impl IntegrityToggle {
    pub fn new(dialect: SqlDialect, triggers: Vec<TriggerSettings>) -> Self {
        Self {
            dialect,
            triggers,
            triggers_disabled: false,
            identity_table: None,
        }
    }

    pub fn triggers_disabled(&self) -> bool {
        self.triggers_disabled
    }

    pub fn identity_table(&self) -> Option<&str> {
        self.identity_table.as_deref()
    }

    pub fn disable_triggers(&mut self) -> Vec<Statement> {
        if self.triggers_disabled {
            return Vec::new();
        }
        self.triggers_disabled = true;
        self.trigger_statements(false)
    }

    pub fn enable_triggers(&mut self) -> Vec<Statement> {
        if !self.triggers_disabled {
            return Vec::new();
        }
        self.triggers_disabled = false;
        self.trigger_statements(true)
    }

    fn trigger_statements(&self, enabled: bool) -> Vec<Statement> {
        self.triggers
            .iter()
            .filter_map(|t| self.dialect.trigger(&t.name, &t.table, enabled))
            .collect()
    }

    pub fn identity_on(&mut self, table: &str) -> Vec<Statement> {
        if self.identity_table.as_deref() == Some(table) {
            return Vec::new();
        }
        let mut statements = self.identity_off();
        statements.extend(self.dialect.identity_insert(table, true));
        self.identity_table = Some(table.to_string());
        statements
    }

    pub fn identity_off(&mut self) -> Vec<Statement> {
        match self.identity_table.take() {
            Some(table) => self.dialect.identity_insert(&table, false).into_iter().collect(),
            None => Vec::new(),
        }
    }

    /// Flip a scope to its other state
    pub fn toggle(&mut self, scope: &Scope) -> Vec<Statement> {
        match scope {
            Scope::Triggers if self.triggers_disabled => self.enable_triggers(),
            Scope::Triggers => self.disable_triggers(),
            Scope::Identity(table) if self.identity_table.as_deref() == Some(table.as_str()) => {
                self.identity_off()
            }
            Scope::Identity(table) => self.identity_on(table),
        }
    }

    /// Restore everything to its normal state
    pub fn release_all(&mut self) -> Vec<Statement> {
        let mut statements = self.identity_off();
        statements.extend(self.enable_triggers());
        statements
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triggers() -> Vec<TriggerSettings> {
        vec![
            TriggerSettings {
                name: "create_sname".into(),
                table: "Taxon".into(),
            },
            TriggerSettings {
                name: "clear_item_name".into(),
                table: "Taxonomy".into(),
            },
        ]
    }

    fn sql(statements: &[Statement]) -> Vec<String> {
        statements.iter().map(|s| s.render(SqlDialect::Mssql)).collect()
    }

    #[test]
    fn test_disable_is_paired_and_idempotent() {
        let mut toggle = IntegrityToggle::new(SqlDialect::Mssql, triggers());
        assert_eq!(
            sql(&toggle.disable_triggers()),
            vec!["DISABLE TRIGGER create_sname ON Taxon", "DISABLE TRIGGER clear_item_name ON Taxonomy"]
        );
        assert!(toggle.disable_triggers().is_empty());
        assert_eq!(toggle.enable_triggers().len(), 2);
        assert!(toggle.enable_triggers().is_empty());
    }

    #[test]
    fn test_identity_switches_previous_table_off() {
        let mut toggle = IntegrityToggle::new(SqlDialect::Mssql, Vec::new());
        assert_eq!(sql(&toggle.identity_on("GeographicSite")), vec!["SET IDENTITY_INSERT GeographicSite ON"]);
        assert!(toggle.identity_on("GeographicSite").is_empty());
        assert_eq!(
            sql(&toggle.identity_on("CollectionEvent")),
            vec![
                "SET IDENTITY_INSERT GeographicSite OFF",
                "SET IDENTITY_INSERT CollectionEvent ON"
            ]
        );
        assert_eq!(toggle.identity_table(), Some("CollectionEvent"));
    }

    #[test]
    fn test_toggle_and_release() {
        let mut toggle = IntegrityToggle::new(SqlDialect::Mssql, triggers());
        toggle.toggle(&Scope::Triggers);
        assert!(toggle.triggers_disabled());
        toggle.toggle(&Scope::Identity("Taxonomy".into()));
        let released = sql(&toggle.release_all());
        assert_eq!(released[0], "SET IDENTITY_INSERT Taxonomy OFF");
        assert_eq!(released.len(), 3);
        assert!(!toggle.triggers_disabled());
        assert!(toggle.release_all().is_empty());
    }

    #[test]
    fn test_sqlite_tracks_state_without_statements() {
        let mut toggle = IntegrityToggle::new(SqlDialect::Sqlite, triggers());
        assert!(toggle.disable_triggers().is_empty());
        assert!(toggle.triggers_disabled());
        assert!(toggle.identity_on("Taxonomy").is_empty());
        assert_eq!(toggle.identity_table(), Some("Taxonomy"));
    }
}

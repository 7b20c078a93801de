//! Site/event identifier -> database key cache

use std::collections::HashMap;

use crate::db::{Database, DbError, fetch_max};
use crate::schema::tables::{EntityTable, PrimaryKey};
use crate::sql::Statement;

/// Resolves spreadsheet site/event numbers to primary keys
///
/// Keys written in this session are recorded directly; anything else is
/// looked up once and cached. Misses are not cached.
#[derive(Debug, Default)]
pub struct SiteEventIndex {
    ids: HashMap<(PrimaryKey, String), i64>,
}

impl SiteEventIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, table: &EntityTable, identifier: &str, id: i64) {
        self.ids.insert((table.key, identifier.trim().to_string()), id);
    }

    pub async fn lookup(
        &mut self,
        db: &dyn Database,
        table: &EntityTable,
        identifier: &str,
    ) -> Result<Option<i64>, DbError> {
        let identifier = identifier.trim();
        if let Some(id) = self.ids.get(&(table.key, identifier.to_string())) {
            return Ok(Some(*id));
        }

        let statement = Statement::new(format!(
            "SELECT {} FROM {} WHERE {} = ?",
            table.key.column, table.key.table, table.identifier
        ))
        .bind(identifier);
        let found = fetch_max(db, &statement).await?;
        if let Some(id) = found {
            self.ids.insert((table.key, identifier.to_string()), id);
        }
        Ok(found)
    }
}

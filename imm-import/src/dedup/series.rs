//! Identifier series: `<prefix><number>` continuing past the database maximum

use anyhow::{Context, Result};

use crate::db::{Database, fetch_strings};
use crate::discipline::Area;
use crate::schema::tables::EntityTable;
use crate::session::ImportSession;
use crate::sql::Statement;

/// Next identifier to mint for one prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdSeries {
    pub prefix: String,
    pub next: i64,
}

impl IdSeries {
    pub fn new(prefix: impl Into<String>, next: i64) -> Self {
        Self {
            prefix: prefix.into(),
            next,
        }
    }

    /// Series continuing after the largest suffix among `existing`
    pub fn after<'a>(prefix: &str, existing: impl IntoIterator<Item = &'a str>) -> Self {
        let mut series = Self::new(prefix, 1);
        for identifier in existing {
            series.observe(identifier);
        }
        series
    }

    /// Numeric part of an identifier with this prefix
    pub fn suffix(&self, identifier: &str) -> Option<i64> {
        identifier.trim().strip_prefix(self.prefix.as_str())?.trim().parse().ok()
    }

    /// Account for an identifier that already exists
    pub fn observe(&mut self, identifier: &str) {
        if let Some(n) = self.suffix(identifier) {
            self.next = self.next.max(n + 1);
        }
    }

    pub fn mint(&mut self) -> String {
        let identifier = format!("{}{}", self.prefix, self.next);
        self.next += 1;
        identifier
    }
}

fn natural_prefix_column(table: &EntityTable) -> &'static str {
    if table.key.table == "GeographicSite" {
        "geo_site_prefix"
    } else {
        "coll_event_prefix"
    }
}

/// Prefix for the table: `NHDisciplineType` for natural history, config otherwise
pub async fn prefix_for(db: &dyn Database, session: &ImportSession, table: &EntityTable) -> Result<String> {
    match session.area() {
        Area::Natural => {
            let column = natural_prefix_column(table);
            let statement = Statement::new(format!(
                "SELECT {} FROM NHDisciplineType WHERE discipline_cd = ?",
                column
            ))
            .bind(session.discipline.code());
            let prefixes = fetch_strings(db, &statement).await?;
            prefixes.into_iter().next().with_context(|| {
                format!(
                    "No {} in NHDisciplineType for discipline '{}'",
                    column,
                    session.discipline.code()
                )
            })
        }
        Area::Human => Ok(if table.key.table == "ArchaeologicalSite" {
            session.prefixes.archaeological_site.clone()
        } else {
            session.prefixes.archaeological_event.clone()
        }),
    }
}

/// Series for a site or event table, starting one past the largest stored number
///
/// Natural-history tables only count the session discipline's identifiers.
pub async fn series_for(db: &dyn Database, session: &ImportSession, table: &EntityTable) -> Result<IdSeries> {
    let prefix = prefix_for(db, session, table).await?;
    let mut statement = Statement::new(format!(
        "SELECT {} FROM {} WHERE {} LIKE ?",
        table.identifier, table.key.table, table.identifier
    ))
    .bind(format!("{}%", prefix));
    // Natural-history numbering runs per discipline
    if session.area() == Area::Natural {
        statement.sql.push_str(" AND discipline_cd = ?");
        statement = statement.bind(session.discipline.code());
    }
    let existing = fetch_strings(db, &statement)
        .await
        .with_context(|| format!("Failed to read existing {} identifiers", table.key.table))?;

    let series = IdSeries::after(&prefix, existing.iter().map(String::as_str));
    log::info!(
        "{} identifiers continue at {}{}",
        table.key.table,
        series.prefix,
        series.next
    );
    Ok(series)
}

//! Sites phase: sites (with their notes), events, then the links between them

use std::collections::HashMap;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use super::summary::{Phase, PhaseOutcome, PhaseSummary};
use super::{RowError, begin_phase, execute_all, finish_phase, open_row, present, settle_row};
use crate::db::{Database, DbError};
use crate::discipline::Area;
use crate::schema::Category;
use crate::schema::tables::{EntityTable, event_table, is_identity, link_table, site_table};
use crate::session::ImportSession;
use crate::sheet::Sheet;
use crate::sql::{InsertBuilder, Statement};
use crate::value::Value;

/// Distinct identifiers in first-seen order with the rows that carry them
fn group_rows(sheet: &Sheet, id_column: usize) -> Vec<(String, Vec<usize>)> {
    let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for row in 0..sheet.row_count() {
        let Some(identifier) = present(sheet.cell(row, id_column)) else {
            continue;
        };
        match positions.get(&identifier) {
            Some(&idx) => groups[idx].1.push(row),
            None => {
                positions.insert(identifier.clone(), groups.len());
                groups.push((identifier, vec![row]));
            }
        }
    }
    groups
}

pub(super) async fn run(
    db: &dyn Database,
    session: &mut ImportSession,
    sheet: &Sheet,
    cancel: &CancellationToken,
) -> Result<PhaseSummary> {
    let mut summary = PhaseSummary::new(Phase::Sites);
    let result = match begin_phase(db, session).await {
        Ok(()) => write_all(db, session, sheet, cancel, &mut summary).await,
        Err(e) => Err(e),
    };
    finish_phase(db, session, summary, result).await
}

async fn write_all(
    db: &dyn Database,
    session: &mut ImportSession,
    sheet: &Sheet,
    cancel: &CancellationToken,
    summary: &mut PhaseSummary,
) -> Result<PhaseOutcome, DbError> {
    let area = session.area();
    for table in [site_table(area), event_table(area)] {
        let outcome = write_entities(db, session, sheet, &table, cancel, summary).await?;
        if outcome != PhaseOutcome::Completed {
            return Ok(outcome);
        }
    }
    write_links(db, session, sheet, cancel, summary).await
}

async fn write_entities(
    db: &dyn Database,
    session: &mut ImportSession,
    sheet: &Sheet,
    table: &EntityTable,
    cancel: &CancellationToken,
    summary: &mut PhaseSummary,
) -> Result<PhaseOutcome, DbError> {
    let Some(id_column) = session.columns.find(&table.identifier_qualifier()) else {
        log::info!("No {} column, skipping {}", table.identifier_qualifier(), table.key.table);
        return Ok(PhaseOutcome::Completed);
    };
    if is_identity(table.key.table) {
        execute_all(db, session.toggle.identity_on(table.key.table)).await?;
    }

    let groups = group_rows(sheet, id_column);
    log::info!("{}: {} distinct identifier(s)", table.key.table, groups.len());
    for (identifier, rows) in &groups {
        if cancel.is_cancelled() {
            log::warn!("{} import cancelled at {}", table.key.table, identifier);
            return Ok(PhaseOutcome::Cancelled);
        }
        open_row(db, session).await?;
        let result = write_entity(db, session, sheet, table, id_column, identifier, rows).await;
        let display = Sheet::display_row(rows[0]);
        if let Some(outcome) = settle_row(db, session, summary, display, identifier, result).await? {
            return Ok(outcome);
        }
    }
    Ok(PhaseOutcome::Completed)
}

/// Insert one site or event from the first row carrying its identifier
async fn write_entity(
    db: &dyn Database,
    session: &mut ImportSession,
    sheet: &Sheet,
    table: &EntityTable,
    id_column: usize,
    identifier: &str,
    rows: &[usize],
) -> Result<usize, RowError> {
    let stage = table.key.table;
    let existing = session
        .index
        .lookup(db, table, identifier)
        .await
        .map_err(|e| RowError::from_db(Phase::Sites, stage, e))?;
    if existing.is_some() {
        return Err(RowError::skip(stage, "already in the database"));
    }

    let id = session
        .next_id(db, table.key)
        .await
        .map_err(|e| RowError::from_db(Phase::Sites, stage, e))?;
    let category = if table.category == Category::Sites {
        Category::SiteImport
    } else {
        table.category
    };

    let mut insert = InsertBuilder::new(stage);
    insert
        .set(table.key.column, id)
        .set(table.identifier, identifier)
        .set("discipline_cd", session.discipline.code());
    let first = rows[0];
    for &col in session.columns.resolve(category) {
        if col == id_column || session.columns.table(col) != stage {
            continue;
        }
        let value = sheet.cell(first, col);
        if present(value).is_some() {
            insert.set(session.columns.destination_column(col), value.clone());
        }
    }
    db.execute(&insert.build())
        .await
        .map_err(|e| RowError::from_db(Phase::Sites, stage, e))?;
    let mut written = 1;

    if table.category == Category::Sites && session.area() == Area::Natural {
        for note in site_notes(session, sheet, id, rows) {
            db.execute(&note)
                .await
                .map_err(|e| RowError::from_db(Phase::Sites, "GeoSiteNote", e))?;
            written += 1;
        }
    }

    session.index.record(table, identifier, id);
    Ok(written)
}

/// One `GeoSiteNote` per distinct non-empty note among the site's rows
fn site_notes(session: &ImportSession, sheet: &Sheet, site_id: i64, rows: &[usize]) -> Vec<Statement> {
    let columns = session.columns.resolve(Category::GeoSiteNote);
    let mut seen: Vec<Vec<Option<String>>> = Vec::new();
    let mut statements = Vec::new();

    for &row in rows {
        let tuple: Vec<Option<String>> = columns.iter().map(|&col| present(sheet.cell(row, col))).collect();
        if tuple.iter().all(Option::is_none) || seen.contains(&tuple) {
            continue;
        }
        seen.push(tuple);

        let mut insert = InsertBuilder::new("GeoSiteNote");
        insert.set("geo_site_id", site_id);
        for &col in columns {
            let value = sheet.cell(row, col);
            if !value.is_null() {
                insert.set(session.columns.destination_column(col), value.clone());
            }
        }
        statements.push(insert.build());
    }
    statements
}

async fn write_links(
    db: &dyn Database,
    session: &mut ImportSession,
    sheet: &Sheet,
    cancel: &CancellationToken,
    summary: &mut PhaseSummary,
) -> Result<PhaseOutcome, DbError> {
    let area = session.area();
    let (sites, events) = (site_table(area), event_table(area));
    let (Some(site_col), Some(event_col)) = (
        session.columns.find(&sites.identifier_qualifier()),
        session.columns.find(&events.identifier_qualifier()),
    ) else {
        return Ok(PhaseOutcome::Completed);
    };

    let mut pairs: Vec<(usize, String, String)> = Vec::new();
    for row in 0..sheet.row_count() {
        let (Some(site), Some(event)) = (present(sheet.cell(row, site_col)), present(sheet.cell(row, event_col)))
        else {
            continue;
        };
        if !pairs.iter().any(|(_, s, e)| *s == site && *e == event) {
            pairs.push((row, site, event));
        }
    }

    for (row, site, event) in &pairs {
        if cancel.is_cancelled() {
            log::warn!("Site/event links cancelled at {} / {}", site, event);
            return Ok(PhaseOutcome::Cancelled);
        }
        open_row(db, session).await?;
        let result = write_link(db, session, &sites, &events, site, event).await;
        let key = format!("{} / {}", site, event);
        if let Some(outcome) = settle_row(db, session, summary, Sheet::display_row(*row), &key, result).await? {
            return Ok(outcome);
        }
    }
    Ok(PhaseOutcome::Completed)
}

async fn write_link(
    db: &dyn Database,
    session: &mut ImportSession,
    sites: &EntityTable,
    events: &EntityTable,
    site: &str,
    event: &str,
) -> Result<usize, RowError> {
    let (link, site_key, event_key) = link_table(session.area());
    let resolve = |e: DbError| RowError::from_db(Phase::Sites, link, e);

    let site_id = session
        .index
        .lookup(db, sites, site)
        .await
        .map_err(resolve)?
        .ok_or_else(|| RowError::fail(link, format!("site '{}' is not in the database", site)))?;
    let event_id = session
        .index
        .lookup(db, events, event)
        .await
        .map_err(resolve)?
        .ok_or_else(|| RowError::fail(link, format!("event '{}' is not in the database", event)))?;

    let exists = Statement::new(format!(
        "SELECT 1 FROM {} WHERE {} = ? AND {} = ?",
        link, site_key, event_key
    ))
    .bind(site_id)
    .bind(event_id);
    if !db.fetch_all(&exists).await.map_err(resolve)?.is_empty() {
        return Ok(0);
    }

    let mut insert = InsertBuilder::new(link);
    insert.set(site_key, site_id).set(event_key, event_id);
    db.execute(&insert.build()).await.map_err(resolve)?;
    Ok(1)
}

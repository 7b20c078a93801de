//! Specimen phase: one statement chain per row, driven by the table descriptors

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use super::summary::{Disposition, Phase, PhaseOutcome, PhaseSummary};
use super::{CATALOGUE_QUALIFIER, RowError, begin_phase, execute_all, find_item, finish_phase, open_row, present, settle_row};
use crate::db::{Database, DbError};
use crate::discipline::Area;
use crate::schema::tables::{
    EmitRule, ITEM, PrimaryKey, TableDescriptor, event_table, is_identity, site_table, specimen_stages,
};
use crate::session::ImportSession;
use crate::sheet::Sheet;
use crate::sql::{InsertBuilder, Statement, UpdateBuilder};
use crate::value::Value;

/// Statement for one stage of a row, with the extra key minted for it
#[derive(Debug, Clone)]
pub struct StageInsert {
    pub statement: Statement,
    pub allocated: Option<(PrimaryKey, i64)>,
}

pub(super) async fn run(
    db: &dyn Database,
    session: &mut ImportSession,
    sheet: &Sheet,
    update: bool,
    cancel: &CancellationToken,
) -> Result<PhaseSummary> {
    let catalogue = session.columns.require(CATALOGUE_QUALIFIER)?;
    let mut summary = PhaseSummary::new(Phase::Specimens);

    let result = match begin_phase(db, session).await {
        Ok(()) => write_specimens(db, session, sheet, catalogue, update, cancel, &mut summary).await,
        Err(e) => Err(e),
    };
    let summary = finish_phase(db, session, summary, result).await?;

    if !update && session.area() == Area::Natural && summary.imported > 0 && !summary.is_aborted() {
        if let Some(statement) = db.dialect().build_scientific_names(session.discipline) {
            match db.execute(&statement).await {
                Ok(_) => log::info!("Rebuilt scientific names for {}", session.discipline.code()),
                Err(e) => log::warn!("Failed to rebuild scientific names: {}", e),
            }
        }
    }
    Ok(summary)
}

async fn write_specimens(
    db: &dyn Database,
    session: &mut ImportSession,
    sheet: &Sheet,
    catalogue: usize,
    update: bool,
    cancel: &CancellationToken,
    summary: &mut PhaseSummary,
) -> Result<PhaseOutcome, DbError> {
    let stages = specimen_stages(session.discipline);
    if update {
        let skipped: Vec<String> = stages
            .iter()
            .filter(|s| !s.updatable)
            .map(|s| s.table_name(session.discipline))
            .collect();
        log::info!("Update mode leaves {} untouched", skipped.join(", "));
    } else {
        for key in stages.iter().filter_map(|s| s.allocated_key) {
            if is_identity(key.table) {
                execute_all(db, session.toggle.identity_on(key.table)).await?;
            }
        }
    }

    for row in 0..sheet.row_count() {
        if cancel.is_cancelled() {
            log::warn!("Specimen import cancelled at row {}", Sheet::display_row(row));
            return Ok(PhaseOutcome::Cancelled);
        }
        let display = Sheet::display_row(row);
        let Some(catalogue_num) = present(sheet.cell(row, catalogue)) else {
            summary.record(display, "", "Item", Disposition::Failed, "no catalogue number");
            continue;
        };

        open_row(db, session).await?;
        let result = if update {
            update_row(db, session, sheet, row, &catalogue_num).await
        } else {
            insert_row(db, session, sheet, row, &catalogue_num).await
        };
        if let Some(outcome) = settle_row(db, session, summary, display, &catalogue_num, result).await? {
            return Ok(outcome);
        }
    }
    Ok(PhaseOutcome::Completed)
}

async fn insert_row(
    db: &dyn Database,
    session: &mut ImportSession,
    sheet: &Sheet,
    row: usize,
    catalogue_num: &str,
) -> Result<usize, RowError> {
    let existing = find_item(db, catalogue_num)
        .await
        .map_err(|e| RowError::from_db(Phase::Specimens, "Item", e))?;
    if existing.is_some() {
        return Err(RowError::skip("Item", "catalogue number already imported"));
    }
    let item_id = session
        .next_id(db, ITEM)
        .await
        .map_err(|e| RowError::from_db(Phase::Specimens, "Item", e))?;

    let mut written = 0;
    let mut taxonomy_id = None;
    for stage in specimen_stages(session.discipline) {
        let table = stage.table_name(session.discipline);
        let Some(insert) = build_stage(db, session, sheet, row, stage, item_id).await? else {
            continue;
        };
        db.execute(&insert.statement)
            .await
            .map_err(|e| RowError::from_db(Phase::Specimens, &table, e))?;
        written += 1;
        if let Some((key, id)) = insert.allocated {
            if key.table == "Taxonomy" {
                taxonomy_id = Some(id);
            }
        }
    }

    session.record_item(row, item_id);
    if let Some(id) = taxonomy_id {
        session.record_taxonomy(row, id);
    }
    log::debug!("Row {}: item {} written with {} statement(s)", Sheet::display_row(row), item_id, written);
    Ok(written)
}

async fn update_row(
    db: &dyn Database,
    session: &mut ImportSession,
    sheet: &Sheet,
    row: usize,
    catalogue_num: &str,
) -> Result<usize, RowError> {
    let item_id = find_item(db, catalogue_num)
        .await
        .map_err(|e| RowError::from_db(Phase::Specimens, "Item", e))?
        .ok_or_else(|| RowError::fail("Item", "no item with this catalogue number"))?;

    let mut written = 0;
    for stage in specimen_stages(session.discipline).iter().filter(|s| s.updatable) {
        let table = stage.table_name(session.discipline);
        let Some(values) = stage_values(db, session, sheet, row, stage).await? else {
            continue;
        };
        let mut update = UpdateBuilder::new(table.as_str(), "item_id", item_id);
        for (column, value) in values {
            update.set(&column, value);
        }
        if update.is_empty() {
            continue;
        }
        db.execute(&update.build())
            .await
            .map_err(|e| RowError::from_db(Phase::Specimens, &table, e))?;
        written += 1;
    }

    session.record_item(row, item_id);
    Ok(written)
}

/// Insert for one stage of a row; `None` when the stage's emit rule skips it
///
/// Adds `item_id`, the stage's pre-assigned key and its sequence number to
/// the columns from [`stage_values`].
pub async fn build_stage(
    db: &dyn Database,
    session: &mut ImportSession,
    sheet: &Sheet,
    row: usize,
    stage: &TableDescriptor,
    item_id: i64,
) -> Result<Option<StageInsert>, RowError> {
    let table = stage.table_name(session.discipline);
    let Some(values) = stage_values(db, session, sheet, row, stage).await? else {
        return Ok(None);
    };

    let mut insert = InsertBuilder::new(table.as_str());
    let mut allocated = None;
    if let Some(key) = stage.allocated_key {
        let id = session
            .next_id(db, key)
            .await
            .map_err(|e| RowError::from_db(Phase::Specimens, &table, e))?;
        insert.set(key.column, id);
        allocated = Some((key, id));
    }
    insert.set("item_id", item_id);
    for (column, value) in values {
        insert.set(&column, value);
    }
    if let Some(column) = stage.sequence {
        let seq = session
            .sequences
            .next_row(db, &table, item_id)
            .await
            .map_err(|e| RowError::from_db(Phase::Specimens, &table, e))?;
        insert.set(column, seq);
    }

    Ok(Some(StageInsert {
        statement: insert.build(),
        allocated,
    }))
}

/// Column values a stage writes for a row, or `None` when it emits nothing
///
/// Null cells are dropped. Columns ending in `_id` must hold a single
/// integer. Defaults fill the columns the sheet did not provide.
async fn stage_values(
    db: &dyn Database,
    session: &mut ImportSession,
    sheet: &Sheet,
    row: usize,
    stage: &TableDescriptor,
) -> Result<Option<Vec<(String, Value)>>, RowError> {
    let table = stage.table_name(session.discipline);
    let columns = stage
        .category
        .map(|c| session.columns.resolve(c).to_vec())
        .unwrap_or_default();

    let emit = match stage.emit {
        EmitRule::Always => true,
        EmitRule::WhenSheetHasColumns => !columns.is_empty(),
        EmitRule::WhenRowHasValues => columns.iter().any(|&col| present(sheet.cell(row, col)).is_some()),
    };
    if !emit {
        return Ok(None);
    }

    let mut values: Vec<(String, Value)> = Vec::new();
    for &col in &columns {
        let value = sheet.cell(row, col);
        if present(value).is_none() {
            continue;
        }
        let destination = session.columns.destination_column(col).to_string();
        let value = if destination.ends_with("_id") {
            let id = value.as_int().ok_or_else(|| {
                RowError::fail(
                    &table,
                    format!("'{}' in '{}' is not an id", value, session.columns.label(col)),
                )
            })?;
            Value::Int(id)
        } else {
            value.clone()
        };
        values.push((destination, value));
    }

    if stage.site_event_keys {
        let area = session.area();
        for entity in [site_table(area), event_table(area)] {
            let Some(col) = session.columns.find(&entity.identifier_qualifier()) else {
                continue;
            };
            let Some(identifier) = present(sheet.cell(row, col)) else {
                continue;
            };
            let id = session
                .index
                .lookup(db, &entity, &identifier)
                .await
                .map_err(|e| RowError::from_db(Phase::Specimens, &table, e))?
                .ok_or_else(|| {
                    RowError::abort(
                        &table,
                        format!("{} '{}' is not in the database", entity.key.table, identifier),
                    )
                })?;
            values.push((entity.key.column.to_string(), Value::Int(id)));
        }
    }

    for (column, fill) in stage.defaults {
        if !values.iter().any(|(c, _)| c == column) {
            values.push((column.to_string(), fill.value(session.discipline)));
        }
    }
    Ok(Some(values))
}

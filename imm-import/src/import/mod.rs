//! Write phases: sites and events, specimens, person links
//!
//! Each phase runs in one transaction with the configured triggers switched
//! off. Every row (or site/event) runs inside a savepoint, so a row that is
//! skipped or fails leaves nothing behind while earlier rows stay written.

mod persons;
mod sites;
mod specimens;
mod summary;

pub use specimens::{StageInsert, build_stage};
pub use summary::{Disposition, Phase, PhaseOutcome, PhaseSummary, RowFailure, write_report};

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use crate::db::{Database, DbError, fetch_max};
use crate::discipline::Discipline;
use crate::session::ImportSession;
use crate::sheet::Sheet;
use crate::sql::Statement;
use crate::value::Value;

const ROW_SAVEPOINT: &str = "imm_row";

/// Qualifier of the column every specimen row is keyed by
pub const CATALOGUE_QUALIFIER: &str = "Item.catalogue_num";

#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Rewrite existing items instead of inserting new ones
    pub update: bool,
    pub phases: Vec<Phase>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            update: false,
            phases: vec![Phase::Sites, Phase::Specimens, Phase::Persons],
        }
    }
}

impl ImportOptions {
    /// Requested phases that apply to the discipline, in run order
    pub fn phases_for(&self, discipline: Discipline) -> Vec<Phase> {
        let mut phases: Vec<Phase> = self
            .phases
            .iter()
            .copied()
            .filter(|phase| match phase {
                Phase::Sites => !self.update && !discipline.is_history(),
                Phase::Specimens => true,
                Phase::Persons => !self.update,
            })
            .collect();
        phases.sort();
        phases.dedup();
        phases
    }
}

/// Run the requested phases in order, stopping after a cancelled or aborted one
///
/// Errors are returned only for failures that end the run outright: a lost
/// connection, a failed commit, or a template missing a required column.
pub async fn run_import(
    db: &dyn Database,
    session: &mut ImportSession,
    sheet: &Sheet,
    options: &ImportOptions,
    cancel: &CancellationToken,
) -> Result<Vec<PhaseSummary>> {
    let mut summaries = Vec::new();

    for phase in options.phases_for(session.discipline) {
        if cancel.is_cancelled() {
            log::warn!("Cancelled before the {} phase", phase);
            break;
        }
        log::info!("Starting {} phase ({} rows)", phase, sheet.row_count());

        let summary = match phase {
            Phase::Sites => sites::run(db, session, sheet, cancel).await?,
            Phase::Specimens => specimens::run(db, session, sheet, options.update, cancel).await?,
            Phase::Persons => persons::run(db, session, sheet, cancel).await?,
        };
        let stop = summary.outcome != PhaseOutcome::Completed;
        summaries.push(summary);
        if stop {
            break;
        }
    }

    Ok(summaries)
}

/// Why a row's chain stopped
#[derive(Debug)]
pub enum RowError {
    /// Left out on purpose (already present); the phase continues
    Skip { stage: String, reason: String },
    /// Could not be written; the phase continues
    Fail { stage: String, reason: String },
    /// A prerequisite is missing; the phase is rolled back
    Abort { stage: String, reason: String },
    /// The connection is gone
    Fatal(DbError),
}

impl RowError {
    pub fn skip(stage: &str, reason: impl Into<String>) -> Self {
        RowError::Skip {
            stage: stage.to_string(),
            reason: reason.into(),
        }
    }

    pub fn fail(stage: &str, reason: impl Into<String>) -> Self {
        RowError::Fail {
            stage: stage.to_string(),
            reason: reason.into(),
        }
    }

    pub fn abort(stage: &str, reason: impl Into<String>) -> Self {
        RowError::Abort {
            stage: stage.to_string(),
            reason: reason.into(),
        }
    }

    /// Classify a database error raised while writing `stage`
    ///
    /// Duplicates skip the row. A missing referenced row aborts the specimen
    /// phase; elsewhere it fails the row.
    pub fn from_db(phase: Phase, stage: &str, err: DbError) -> Self {
        if err.is_connectivity() {
            RowError::Fatal(err)
        } else if err.is_duplicate() {
            RowError::skip(stage, err.to_string())
        } else if err.is_missing_reference() && phase == Phase::Specimens {
            RowError::abort(stage, err.to_string())
        } else {
            RowError::fail(stage, err.to_string())
        }
    }
}

/// Trimmed text of a cell, `None` for null or blank
fn present(value: &Value) -> Option<String> {
    value.canonical().filter(|text| !text.is_empty())
}

/// `item_id` of a catalogue number already in the database
async fn find_item(db: &dyn Database, catalogue_num: &str) -> Result<Option<i64>, DbError> {
    let statement = Statement::new("SELECT item_id FROM Item WHERE catalogue_num = ?").bind(catalogue_num);
    fetch_max(db, &statement).await
}

async fn execute_all(db: &dyn Database, statements: Vec<Statement>) -> Result<(), DbError> {
    for statement in statements {
        db.execute(&statement).await?;
    }
    Ok(())
}

async fn begin_phase(db: &dyn Database, session: &mut ImportSession) -> Result<(), DbError> {
    db.begin().await?;
    execute_all(db, session.toggle.disable_triggers()).await
}

/// Roll the phase back and restore triggers and identity insert, logging failures
async fn rollback_phase(db: &dyn Database, session: &mut ImportSession) {
    if let Err(e) = db.rollback().await {
        log::error!("Rollback failed: {}", e);
    }
    for statement in session.toggle.release_all() {
        if let Err(e) = db.execute(&statement).await {
            log::warn!("Failed to run '{}' after rollback: {}", statement.sql, e);
        }
    }
}

/// Commit or roll back according to how the phase body ended
async fn finish_phase(
    db: &dyn Database,
    session: &mut ImportSession,
    mut summary: PhaseSummary,
    result: Result<PhaseOutcome, DbError>,
) -> Result<PhaseSummary> {
    let phase = summary.phase;
    match result {
        Ok(PhaseOutcome::Aborted(reason)) => {
            rollback_phase(db, session).await;
            log::error!("{} phase aborted and rolled back: {}", phase, reason);
            summary.imported = 0;
            summary.statements = 0;
            summary.outcome = PhaseOutcome::Aborted(reason);
            Ok(summary)
        }
        Ok(outcome) => {
            if let Err(e) = execute_all(db, session.toggle.release_all()).await {
                rollback_phase(db, session).await;
                return Err(anyhow::Error::new(e))
                    .with_context(|| format!("Failed to restore triggers after the {} phase", phase));
            }
            db.commit()
                .await
                .with_context(|| format!("Failed to commit the {} phase", phase))?;
            log::info!(
                "{} phase committed: {} imported, {} skipped, {} failed",
                phase,
                summary.imported,
                summary.skipped(),
                summary.failed()
            );
            summary.outcome = outcome;
            Ok(summary)
        }
        Err(e) => {
            rollback_phase(db, session).await;
            Err(anyhow::Error::new(e)).with_context(|| format!("The {} phase failed and was rolled back", phase))
        }
    }
}

async fn open_row(db: &dyn Database, session: &mut ImportSession) -> Result<(), DbError> {
    db.execute(&db.dialect().savepoint(ROW_SAVEPOINT)).await?;
    session.sequences.begin_row();
    Ok(())
}

async fn close_row(db: &dyn Database, session: &mut ImportSession, keep: bool) -> Result<(), DbError> {
    let dialect = db.dialect();
    if keep {
        session.sequences.commit_row();
    } else {
        session.sequences.rollback_row();
        db.execute(&dialect.rollback_to_savepoint(ROW_SAVEPOINT)).await?;
    }
    if let Some(release) = dialect.release_savepoint(ROW_SAVEPOINT) {
        db.execute(&release).await?;
    }
    Ok(())
}

/// Close a row opened with `open_row` and account for it
///
/// `Ok(written)` keeps the row. Returns the outcome that ends the phase, if any.
async fn settle_row(
    db: &dyn Database,
    session: &mut ImportSession,
    summary: &mut PhaseSummary,
    row: usize,
    key: &str,
    result: Result<usize, RowError>,
) -> Result<Option<PhaseOutcome>, DbError> {
    match result {
        Ok(written) => {
            close_row(db, session, true).await?;
            summary.statements += written;
            if written > 0 {
                summary.imported += 1;
            }
            Ok(None)
        }
        Err(RowError::Skip { stage, reason }) => {
            close_row(db, session, false).await?;
            summary.record(row, key, &stage, Disposition::Skipped, reason);
            Ok(None)
        }
        Err(RowError::Fail { stage, reason }) => {
            close_row(db, session, false).await?;
            summary.record(row, key, &stage, Disposition::Failed, reason);
            Ok(None)
        }
        Err(RowError::Abort { stage, reason }) => {
            session.sequences.rollback_row();
            summary.record(row, key, &stage, Disposition::Failed, reason.clone());
            Ok(Some(PhaseOutcome::Aborted(format!("row {} ({}): {}", row, key, reason))))
        }
        Err(RowError::Fatal(e)) => {
            session.sequences.rollback_row();
            Err(e)
        }
    }
}

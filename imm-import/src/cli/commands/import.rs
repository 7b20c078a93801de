//! `import`: run the write phases against the database or into a script

use anyhow::{Context, Result};
use colored::*;
use dialoguer::Confirm;
use is_terminal::IsTerminal;
use tokio_util::sync::CancellationToken;

use crate::cli::ImportArgs;
use crate::config::Settings;
use crate::db::script::ScriptRecorder;
use crate::db::{self, Database};
use crate::discipline::Discipline;
use crate::import::{ImportOptions, PhaseOutcome, PhaseSummary, run_import, write_report};
use crate::session::ImportSession;
use crate::sheet::{Sheet, read_workbook};
use crate::sql::SqlDialect;

pub async fn handle_import_command(
    args: ImportArgs,
    settings: &Settings,
    discipline: Discipline,
    cancel: CancellationToken,
) -> Result<()> {
    let workbook = read_workbook(&args.file, &settings.template_sheet)?;
    let sheet = workbook.template;
    let options = ImportOptions {
        update: args.update,
        phases: args.phase.phases(),
    };
    let reader = db::connect(&settings.database).await?;

    let summaries = match &args.script {
        Some(path) => {
            let recorder = ScriptRecorder::new(reader, SqlDialect::Mssql);
            let summaries = run(&recorder, &sheet, discipline, settings, &options, &cancel).await?;
            recorder.save(path).await?;
            println!(
                "{} {} ({} statements)",
                "SQL script:".bright_green().bold(),
                path.display(),
                recorder.len().await
            );
            summaries
        }
        None => {
            if !args.yes && std::io::stdin().is_terminal() && !confirm(&sheet, discipline, &options)? {
                println!("{}", "Import cancelled".yellow());
                return Ok(());
            }
            run(reader.as_ref(), &sheet, discipline, settings, &options, &cancel).await?
        }
    };

    for summary in &summaries {
        summary.print();
    }
    if let Some(path) = &args.report {
        write_report(&summaries, path)?;
        println!("{} {}", "Failure report:".bright_green().bold(), path.display());
    }
    if let Some(aborted) = summaries.iter().find(|s| s.is_aborted()) {
        anyhow::bail!("The {} phase was aborted and rolled back", aborted.phase);
    }
    if summaries.iter().any(|s| s.outcome == PhaseOutcome::Cancelled) {
        println!("{}", "Stopped early; rerun to continue where it left off".yellow());
    }
    Ok(())
}

fn confirm(sheet: &Sheet, discipline: Discipline, options: &ImportOptions) -> Result<bool> {
    let verb = if options.update { "Update" } else { "Import" };
    let phases: Vec<&str> = options.phases_for(discipline).iter().map(|p| p.name()).collect();
    Confirm::new()
        .with_prompt(format!(
            "{} {} {} row(s) ({})?",
            verb,
            sheet.row_count(),
            discipline.full_name(),
            phases.join(", ")
        ))
        .default(false)
        .interact()
        .context("Failed to read confirmation")
}

async fn run(
    db: &dyn Database,
    sheet: &Sheet,
    discipline: Discipline,
    settings: &Settings,
    options: &ImportOptions,
    cancel: &CancellationToken,
) -> Result<Vec<PhaseSummary>> {
    let mut session = ImportSession::for_sheet(sheet, discipline, settings, db.dialect())?;
    run_import(db, &mut session, sheet, options, cancel).await
}

//! Per-phase results and the CSV failure report

use std::path::Path;

use anyhow::{Context, Result};
use colored::*;
use csv::Writer;

/// Write phase, in run order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    /// Sites, site notes, events and their links
    Sites,
    /// Items and the tables hanging off them
    Specimens,
    /// Collector, determinavit and preparator links
    Persons,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Sites => "sites",
            Phase::Specimens => "specimens",
            Phase::Persons => "persons",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseOutcome {
    Completed,
    /// Stopped between rows; completed rows were committed
    Cancelled,
    /// Rolled back
    Aborted(String),
}

/// Whether a row was left out on purpose or could not be written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Skipped,
    Failed,
}

impl Disposition {
    pub fn name(&self) -> &'static str {
        match self {
            Disposition::Skipped => "skipped",
            Disposition::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFailure {
    /// Spreadsheet row number
    pub row: usize,
    /// Catalogue number, site or event number
    pub key: String,
    /// Table being written when the row stopped
    pub stage: String,
    pub disposition: Disposition,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct PhaseSummary {
    pub phase: Phase,
    /// Data statements executed (or recorded)
    pub statements: usize,
    /// Rows or entities written
    pub imported: usize,
    pub failures: Vec<RowFailure>,
    pub outcome: PhaseOutcome,
}

impl PhaseSummary {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            statements: 0,
            imported: 0,
            failures: Vec::new(),
            outcome: PhaseOutcome::Completed,
        }
    }

    pub fn record(&mut self, row: usize, key: &str, stage: &str, disposition: Disposition, reason: impl Into<String>) {
        let reason = reason.into();
        match disposition {
            Disposition::Skipped => log::info!("Row {} ({}) skipped at {}: {}", row, key, stage, reason),
            Disposition::Failed => log::warn!("Row {} ({}) failed at {}: {}", row, key, stage, reason),
        }
        self.failures.push(RowFailure {
            row,
            key: key.to_string(),
            stage: stage.to_string(),
            disposition,
            reason,
        });
    }

    pub fn skipped(&self) -> usize {
        self.count(Disposition::Skipped)
    }

    pub fn failed(&self) -> usize {
        self.count(Disposition::Failed)
    }

    fn count(&self, disposition: Disposition) -> usize {
        self.failures.iter().filter(|f| f.disposition == disposition).count()
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.outcome, PhaseOutcome::Aborted(_))
    }

    /// Print a short coloured report to stdout
    pub fn print(&self) {
        let outcome = match &self.outcome {
            PhaseOutcome::Completed => "completed".green().bold(),
            PhaseOutcome::Cancelled => "cancelled".yellow().bold(),
            PhaseOutcome::Aborted(_) => "aborted".red().bold(),
        };
        println!("{} {}", self.phase.name().cyan().bold(), outcome);
        println!(
            "  {} imported, {} skipped, {} failed, {} statement(s)",
            self.imported.to_string().green(),
            self.skipped().to_string().yellow(),
            self.failed().to_string().red(),
            self.statements
        );
        if let PhaseOutcome::Aborted(reason) = &self.outcome {
            println!("  {}", reason.red());
        }
        for failure in self.failures.iter().filter(|f| f.disposition == Disposition::Failed) {
            println!(
                "  row {} {}: {} ({})",
                failure.row,
                failure.key.bold(),
                failure.reason,
                failure.stage.dimmed()
            );
        }
    }
}

/// Write every skipped and failed row of every phase as CSV
pub fn write_report(summaries: &[PhaseSummary], path: &Path) -> Result<()> {
    let mut wtr = Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;

    wtr.write_record(["phase", "row", "key", "stage", "disposition", "reason"])
        .context("Failed to write CSV header")?;

    for summary in summaries {
        for failure in &summary.failures {
            wtr.write_record([
                summary.phase.name(),
                &failure.row.to_string(),
                &failure.key,
                &failure.stage,
                failure.disposition.name(),
                &failure.reason,
            ])
            .with_context(|| format!("Failed to write report row {}", failure.row))?;
        }
    }

    wtr.flush().context("Failed to flush CSV writer")?;
    log::info!("Failure report written to: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts() {
        let mut summary = PhaseSummary::new(Phase::Specimens);
        summary.record(4, "974-00001", "Item", Disposition::Skipped, "already imported");
        summary.record(5, "974-00002", "Taxonomy", Disposition::Failed, "'NEW?' is not an id");
        summary.record(6, "974-00003", "Item", Disposition::Skipped, "duplicate key");
        assert_eq!(summary.skipped(), 2);
        assert_eq!(summary.failed(), 1);
        assert!(!summary.is_aborted());
    }

    #[test]
    fn test_write_report() {
        let mut summary = PhaseSummary::new(Phase::Persons);
        summary.record(9, "974-00004", "Collector", Disposition::Failed, "no event, number \"E1\"");
        let path = std::env::temp_dir().join(format!("imm-import-{}.csv", uuid::Uuid::new_v4()));

        write_report(&[summary], &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("phase,row,key,stage,disposition,reason"));
        assert_eq!(
            lines.next(),
            Some("persons,9,974-00004,Collector,failed,\"no event, number \"\"E1\"\"\"")
        );
    }
}

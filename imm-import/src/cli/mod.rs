//! Command-line interface

pub mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::discipline::Discipline;
use crate::import::Phase;

#[derive(Parser)]
#[command(
    name = "imm-import",
    about = "Prepare IMM template spreadsheets and import them into the collections database",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Discipline code of the spreadsheet (inv, bot, history, archeolg, ...)
    #[arg(long, short = 'd', global = true, value_enum)]
    pub discipline: Option<Discipline>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show how the template's columns are classified
    Columns(ColumnsArgs),

    /// Resolve references and generate site/event numbers
    Prepare(PrepareArgs),

    /// Fill ID columns from the reviewed reference tabs
    AddIds(AddIdsArgs),

    /// Write the spreadsheet into the database
    Import(ImportArgs),
}

#[derive(Args, Debug)]
pub struct ColumnsArgs {
    /// Template workbook (.xlsx)
    pub file: PathBuf,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct PrepareArgs {
    /// Template workbook (.xlsx)
    pub file: PathBuf,

    /// Output workbook (defaults to <file>_prepared.xlsx)
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct AddIdsArgs {
    /// Prepared and reviewed workbook (.xlsx)
    pub file: PathBuf,

    /// Output workbook (defaults to <file>_ids.xlsx)
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Annotated workbook (.xlsx)
    pub file: PathBuf,

    /// Phase to run
    #[arg(long, value_enum, default_value = "all")]
    pub phase: PhaseArg,

    /// Update existing items matched by catalogue number instead of inserting
    #[arg(long)]
    pub update: bool,

    /// Record the statements as a SQL Server script instead of executing them
    #[arg(long)]
    pub script: Option<PathBuf>,

    /// Write skipped and failed rows to a CSV file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Do not ask for confirmation
    #[arg(long, short)]
    pub yes: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PhaseArg {
    All,
    Sites,
    Specimens,
    Persons,
}

impl PhaseArg {
    pub fn phases(&self) -> Vec<Phase> {
        match self {
            PhaseArg::All => vec![Phase::Sites, Phase::Specimens, Phase::Persons],
            PhaseArg::Sites => vec![Phase::Sites],
            PhaseArg::Specimens => vec![Phase::Specimens],
            PhaseArg::Persons => vec![Phase::Persons],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_import_command() {
        let cli = Cli::try_parse_from([
            "imm-import",
            "--discipline",
            "inv",
            "import",
            "specimens.xlsx",
            "--phase",
            "specimens",
            "--report",
            "failures.csv",
            "--yes",
        ])
        .unwrap();
        assert_eq!(cli.discipline, Some(Discipline::Inv));
        match cli.command {
            Commands::Import(args) => {
                assert_eq!(args.phase.phases(), vec![Phase::Specimens]);
                assert_eq!(args.report, Some(PathBuf::from("failures.csv")));
                assert!(args.yes);
                assert!(!args.update);
            }
            _ => panic!("expected import command"),
        }
    }

    #[test]
    fn test_unknown_discipline_rejected() {
        let result = Cli::try_parse_from(["imm-import", "-d", "zoo", "columns", "t.xlsx"]);
        assert!(result.is_err());
    }
}

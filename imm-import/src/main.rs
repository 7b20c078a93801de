use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use is_terminal::IsTerminal;
use tokio_util::sync::CancellationToken;

use imm_import::cli::commands::{add_ids, columns, import, prepare};
use imm_import::cli::{Cli, Commands};
use imm_import::config::{self, Backend, Settings};

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();
}

/// Ask for the SQL Server password when none was configured
fn ensure_password(settings: &mut Settings) -> Result<()> {
    if settings.database.backend != Backend::Mssql || settings.database.password.is_some() {
        return Ok(());
    }
    if !std::io::stdin().is_terminal() {
        return Ok(());
    }
    let password = rpassword::prompt_password("Database password: ").context("Failed to read password")?;
    if !password.is_empty() {
        settings.database.password = Some(password);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_logging();

    let cli = Cli::parse();
    if cli.no_color {
        colored::control::set_override(false);
    }

    let mut settings = config::load(cli.config.as_deref())?;
    let discipline = cli
        .discipline
        .context("--discipline is required (e.g. --discipline inv)")?;

    let result = match cli.command {
        Commands::Columns(args) => columns::handle_columns_command(args, &settings, discipline),
        Commands::AddIds(args) => add_ids::handle_add_ids_command(args, &settings, discipline),
        Commands::Prepare(args) => {
            ensure_password(&mut settings)?;
            prepare::handle_prepare_command(args, &settings, discipline).await
        }
        Commands::Import(args) => {
            ensure_password(&mut settings)?;
            let cancel = CancellationToken::new();
            let on_ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::warn!("Interrupt received, stopping after the current row");
                    on_ctrl_c.cancel();
                }
            });
            import::handle_import_command(args, &settings, discipline, cancel).await
        }
    };

    if let Err(e) = &result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
    Ok(())
}

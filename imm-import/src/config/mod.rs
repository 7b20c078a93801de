//! Configuration loaded from TOML with environment overrides
//!
//! Lookup order: `--config <path>`, then `<config_dir>/imm-import/config.toml`,
//! then built-in defaults. `IMM_DATABASE_URL` and `IMM_DATABASE_PASSWORD`
//! override the `[database]` section (a `.env` file is honoured).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const APP_DIR: &str = "imm-import";
pub const CONFIG_FILE: &str = "config.toml";
pub const ENV_DATABASE_URL: &str = "IMM_DATABASE_URL";
pub const ENV_DATABASE_PASSWORD: &str = "IMM_DATABASE_PASSWORD";

/// Top-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Name of the template sheet in the workbook
    pub template_sheet: String,
    pub database: DatabaseSettings,
    pub lookup: LookupSettings,
    pub prefixes: PrefixSettings,
    /// Triggers disabled for the duration of each write phase
    pub triggers: Vec<TriggerSettings>,
}

/// Database backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Mssql,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub backend: Backend,
    /// ADO.NET string for SQL Server, `sqlite://` URL for SQLite
    pub url: Option<String>,
    /// Never read from the file; filled from the environment or a prompt
    #[serde(skip)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupSettings {
    /// Maximum reference lookups in flight
    pub concurrency: usize,
}

/// Identifier prefixes for the human-history area
///
/// Natural-history prefixes come from `NHDisciplineType` in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefixSettings {
    pub archaeological_site: String,
    pub archaeological_event: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerSettings {
    pub name: String,
    pub table: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            template_sheet: "IMM_template".to_string(),
            database: DatabaseSettings::default(),
            lookup: LookupSettings::default(),
            prefixes: PrefixSettings::default(),
            triggers: default_triggers(),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            backend: Backend::Mssql,
            url: None,
            password: None,
        }
    }
}

impl Default for LookupSettings {
    fn default() -> Self {
        Self { concurrency: 8 }
    }
}

impl Default for PrefixSettings {
    fn default() -> Self {
        Self {
            archaeological_site: "AS".to_string(),
            archaeological_event: "CE".to_string(),
        }
    }
}

fn default_triggers() -> Vec<TriggerSettings> {
    [
        ("create_sname", "Taxon"),
        ("set_is_component", "Component"),
        ("set_qualified_name", "Taxonomy"),
        ("clear_item_name", "Taxonomy"),
        ("update_person_search_name", "Person"),
        ("update_artist_search_name", "Artist"),
        ("create_location_code", "Location"),
    ]
    .into_iter()
    .map(|(name, table)| TriggerSettings {
        name: name.to_string(),
        table: table.to_string(),
    })
    .collect()
}

/// Default config file location
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

/// Load settings from an explicit path or the default location, then apply the environment
pub fn load(path: Option<&Path>) -> Result<Settings> {
    let mut settings = match path {
        Some(path) => read_file(path)?,
        None => match default_path() {
            Some(path) if path.exists() => read_file(&path)?,
            _ => {
                log::debug!("No config file found, using defaults");
                Settings::default()
            }
        },
    };

    settings.apply_env(|key| std::env::var(key).ok());
    settings.validate()?;
    Ok(settings)
}

fn read_file(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let settings: Settings = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    log::info!("Loaded config from {}", path.display());
    Ok(settings)
}

impl Settings {
    /// Apply environment overrides through a lookup function
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var(ENV_DATABASE_URL).filter(|v| !v.trim().is_empty()) {
            self.database.url = Some(url);
        }
        if let Some(password) = var(ENV_DATABASE_PASSWORD).filter(|v| !v.is_empty()) {
            self.database.password = Some(password);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.lookup.concurrency == 0 {
            anyhow::bail!("[lookup].concurrency must be at least 1");
        }
        if self.template_sheet.trim().is_empty() {
            anyhow::bail!("template_sheet must not be empty");
        }
        for (field, prefix) in [
            ("archaeological_site", &self.prefixes.archaeological_site),
            ("archaeological_event", &self.prefixes.archaeological_event),
        ] {
            if prefix.is_empty() || prefix.chars().any(|c| c.is_ascii_digit()) {
                anyhow::bail!("[prefixes].{} must be non-empty and contain no digits", field);
            }
        }
        Ok(())
    }
}

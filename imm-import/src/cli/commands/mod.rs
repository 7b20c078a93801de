//! Command handlers

pub mod add_ids;
pub mod columns;
pub mod import;
pub mod prepare;

use std::path::{Path, PathBuf};

/// `<dir>/<stem>_<suffix>.xlsx` next to the input
pub fn default_output(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "template".to_string());
    input.with_file_name(format!("{}_{}.xlsx", stem, suffix))
}

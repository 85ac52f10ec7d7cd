//! Command implementations for the strata CLI.
//!
//! Each command module provides a `run` function that executes the command logic.

pub mod run;
pub mod scan;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};

/// Canonicalize a codebase path and check that it is a directory.
pub fn resolve_root(path: &Path) -> Result<PathBuf> {
    let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !root.exists() {
        anyhow::bail!("Path does not exist: {}", root.display());
    }
    if !root.is_dir() {
        anyhow::bail!("Path is not a directory: {}", root.display());
    }
    Ok(root)
}

/// Spinner on stderr; hidden when `quiet`.
pub fn create_spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    }
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));
    spinner
}

//! Scan command - inventory of the files a run would read.

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use strata_core::scanner::{scan_directory, ScanResult, SkipReason};

use super::resolve_root;
use crate::config::StrataConfig;
use crate::output::{format_bytes, Output, OutputFormat, TableDisplay, TableOutput};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub root: String,
    pub total_bytes: u64,
    pub total_lines: u64,
    pub by_language: BTreeMap<String, usize>,
    #[serde(flatten)]
    pub result: ScanResult,
}

impl ScanReport {
    pub fn new(root: &Path, result: ScanResult) -> Self {
        let mut by_language = BTreeMap::new();
        for file in &result.files {
            *by_language.entry(file.language.clone()).or_insert(0) += 1;
        }
        Self {
            root: root.display().to_string(),
            total_bytes: result.files.iter().map(|f| f.size_bytes).sum(),
            total_lines: result.files.iter().map(|f| u64::from(f.lines)).sum(),
            by_language,
            result,
        }
    }
}

impl TableDisplay for ScanReport {
    fn to_table(&self) -> String {
        let mut out = format!("{} {}\n", "Scanned".green().bold(), self.root);
        out.push_str(&TableOutput::key_value(&[
            ("Files", self.result.files.len().to_string()),
            ("Skipped", self.result.skipped.len().to_string()),
            ("Filtered", self.result.filtered_count.to_string()),
            ("Lines", self.total_lines.to_string()),
            ("Size", format_bytes(self.total_bytes)),
            ("Duration", format!("{:.1} ms", self.result.duration_ms)),
        ]));

        let languages: Vec<Vec<String>> = self
            .by_language
            .iter()
            .map(|(lang, count)| vec![lang.clone(), count.to_string()])
            .collect();
        out.push('\n');
        out.push_str(&TableOutput::from_rows(&["Language", "Files"], &languages));

        if !self.result.skipped.is_empty() {
            let skipped: Vec<Vec<String>> = self
                .result
                .skipped
                .iter()
                .map(|s| {
                    let reason = match s.reason {
                        SkipReason::TooLarge => "too large",
                        SkipReason::Unreadable => "unreadable",
                    };
                    vec![s.path.clone(), reason.to_string(), format_bytes(s.size_bytes)]
                })
                .collect();
            out.push_str(&format!("\n{}\n", "Skipped files".yellow().bold()));
            out.push_str(&TableOutput::from_rows(&["Path", "Reason", "Size"], &skipped));
        }
        out
    }
}

pub fn run(path: &Path, exclude: &[String], config: &StrataConfig, format: OutputFormat) -> Result<()> {
    let root = resolve_root(path)?;
    let mut options = config.scan_options();
    options.exclude.extend(exclude.iter().cloned());

    let result = scan_directory(&root, &options)
        .with_context(|| format!("Failed to scan {}", root.display()))?;
    tracing::info!(files = result.files.len(), skipped = result.skipped.len(), "scan complete");

    Output::new(ScanReport::new(&root, result), format).render()
}

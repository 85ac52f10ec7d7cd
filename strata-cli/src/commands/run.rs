//! Run command - scan, analyze, enrich, export and scaffold a codebase.

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

use strata_core::codegen::{render_app, render_artifact, ArtifactKind};
use strata_core::exporter::{FileSummaryDocument, KnowledgeDocument};
use strata_core::pipeline::UnitOutcome;
use strata_core::scanner::{scan_directory, ScannedFile, SkipReason, SkippedFile};
use strata_core::types::{Enrichment, SourceUnit};
use strata_core::AnalysisRun;
use strata_llm::{CallOutcome, Enricher, Orchestrator, ProviderKind, UsageDocument, UsageLog};

use super::{create_spinner, resolve_root};
use crate::config::StrataConfig;
use crate::output::{TableDisplay, TableOutput};
use crate::writer::OutputWriter;

/// Command-line inputs of `strata run`.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub codebase: PathBuf,
    pub out: PathBuf,
    pub provider: Option<ProviderKind>,
    pub exclude: Vec<String>,
    pub max_file_size_kb: Option<u64>,
    pub threads: Option<usize>,
    pub no_enrich: bool,
    pub quiet: bool,
}

/// What a run did, printed at the end.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub codebase: String,
    pub output_dir: String,
    pub files_discovered: usize,
    pub files_parsed: usize,
    pub config_files: usize,
    pub files_skipped: usize,
    pub skip_reasons: BTreeMap<String, usize>,
    pub classes: usize,
    pub classes_by_category: BTreeMap<String, usize>,
    pub edges: usize,
    pub cycles: usize,
    pub routers: usize,
    pub stubs: usize,
    pub files_written: usize,
    pub enriched: bool,
    pub provider: String,
    pub provider_calls: usize,
    pub fallback_calls: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub duration_ms: u128,
}

impl TableDisplay for RunSummary {
    fn to_table(&self) -> String {
        let mut out = format!(
            "{} {} -> {}\n",
            "Converted".green().bold(),
            self.codebase,
            self.output_dir
        );

        let reasons = if self.skip_reasons.is_empty() {
            String::new()
        } else {
            let parts: Vec<String> = self
                .skip_reasons
                .iter()
                .map(|(reason, n)| format!("{} {}", n, reason))
                .collect();
            format!(" ({})", parts.join(", "))
        };
        let provider = if self.enriched {
            self.provider.clone()
        } else {
            "disabled".to_string()
        };

        out.push_str(&TableOutput::key_value(&[
            ("Files discovered", self.files_discovered.to_string()),
            ("Parsed", self.files_parsed.to_string()),
            ("Config files", self.config_files.to_string()),
            ("Skipped", format!("{}{}", self.files_skipped, reasons)),
            ("Classes", self.classes.to_string()),
            ("Dependency edges", self.edges.to_string()),
            ("Cycles", self.cycles.to_string()),
            ("Routers", self.routers.to_string()),
            ("Service/DAO stubs", self.stubs.to_string()),
            ("Files written", self.files_written.to_string()),
            ("Provider", provider),
            ("Provider calls", self.provider_calls.to_string()),
            ("Fallback calls", self.fallback_calls.to_string()),
            (
                "Tokens (in/out)",
                format!("{} / {}", self.input_tokens, self.output_tokens),
            ),
            ("Duration", format!("{} ms", self.duration_ms)),
        ]));

        let categories: Vec<Vec<String>> = self
            .classes_by_category
            .iter()
            .map(|(category, n)| vec![category.clone(), n.to_string()])
            .collect();
        out.push('\n');
        out.push_str(&TableOutput::from_rows(&["Category", "Classes"], &categories));
        out
    }
}

pub async fn run(options: RunOptions, mut config: StrataConfig) -> Result<RunSummary> {
    let start = Instant::now();
    let root = resolve_root(&options.codebase)?;

    if let Some(provider) = options.provider {
        config.llm.provider = provider;
    }
    config.scanner.exclude.extend(options.exclude.iter().cloned());
    if let Some(kb) = options.max_file_size_kb {
        config.scanner.max_file_size_kb = kb;
    }

    let spinner = create_spinner(options.quiet);

    // Step 1: scan
    spinner.set_message("Scanning codebase...");
    let scan = scan_directory(&root, &config.scan_options())
        .with_context(|| format!("Failed to scan {}", root.display()))?;
    info!(
        files = scan.files.len(),
        skipped = scan.skipped.len(),
        filtered = scan.filtered_count,
        "scan complete"
    );

    let (units, unreadable) = read_units(&root, &scan.files);
    if units.is_empty() {
        spinner.finish_and_clear();
        anyhow::bail!("No source files found in {}", root.display());
    }
    let mut skipped = scan.skipped.clone();
    skipped.extend(unreadable);

    // Step 2: parse, score and resolve
    spinner.set_message(format!("Analyzing {} files...", units.len()));
    let mut analysis = AnalysisRun::new().with_threads(options.threads);
    analysis.offer_all(&units)?;
    analysis.finalize()?;
    let graph = analysis
        .graph()
        .context("Analysis finished without a knowledge graph")?;
    for failure in analysis.failures() {
        warn!(path = %failure.path, line = failure.line, "{}", failure.message);
    }

    // Step 3: optional enrichment
    let orchestrator = if options.no_enrich {
        None
    } else {
        Some(
            Orchestrator::from_settings(&config.provider_settings())
                .with_retry_policy(config.retry_policy())
                .with_max_concurrency(config.llm.max_concurrency)
                .with_token_budget(config.llm.token_budget),
        )
    };
    let enrichment = match &orchestrator {
        Some(orchestrator) => {
            spinner.set_message(format!(
                "Enriching {} classes via {}...",
                graph.class_count(),
                orchestrator.provider_name()
            ));
            Enricher::new(orchestrator, config.enrich_options())
                .enrich(graph)
                .await
        }
        None => Enrichment::default(),
    };

    // Step 4: knowledge documents
    spinner.set_message("Writing knowledge documents...");
    let mut writer = OutputWriter::new(&options.out)?;
    let usage = match &orchestrator {
        Some(o) => UsageDocument::build(
            o.provider_name(),
            o.model_name(),
            o.token_budget(),
            o.usage(),
        ),
        None => UsageDocument::build("none", "none", None, &UsageLog::new()),
    };
    writer.write_document(
        "knowledge.json",
        &KnowledgeDocument::build(graph, &enrichment),
    )?;
    writer.write_document(
        "files.json",
        &FileSummaryDocument::build(&scan.files, &skipped, analysis.reports(), graph),
    )?;
    writer.write_document("usage.json", &usage)?;

    let mut summary = RunSummary {
        codebase: root.display().to_string(),
        output_dir: writer.root().display().to_string(),
        files_discovered: scan.files.len() + scan.skipped.len(),
        files_parsed: analysis.parsed_count(),
        config_files: analysis
            .reports()
            .iter()
            .filter(|r| matches!(r.outcome, UnitOutcome::Config))
            .count(),
        files_skipped: skipped.len() + analysis.skipped_count(),
        skip_reasons: skip_reasons(&skipped, analysis.skipped_count()),
        classes: graph.class_count(),
        classes_by_category: graph
            .category_counts()
            .into_iter()
            .map(|(c, n)| (c.to_string(), n))
            .collect(),
        edges: graph.edge_count(),
        cycles: graph.cycles().len(),
        enriched: orchestrator.is_some(),
        provider: usage.provider.clone(),
        provider_calls: usage.totals.calls,
        fallback_calls: usage.totals.fallback_count,
        input_tokens: usage.totals.input_tokens,
        output_tokens: usage.totals.output_tokens,
        ..Default::default()
    };
    if let Some(o) = &orchestrator {
        let failures = o.usage().count(CallOutcome::Failure);
        if failures > 0 {
            warn!(failures, "some provider calls failed and were answered offline");
        }
    }

    // Step 5: scaffolding
    spinner.set_message("Generating Express scaffold...");
    let artifacts = analysis.generate()?;
    for artifact in &artifacts {
        writer.write_rendered(&render_artifact(artifact))?;
    }
    writer.write_rendered(&render_app(&artifacts))?;

    summary.routers = artifacts
        .iter()
        .filter(|a| a.kind == ArtifactKind::Router)
        .count();
    summary.stubs = artifacts.len() - summary.routers;
    summary.files_written = writer.written().len();
    summary.duration_ms = start.elapsed().as_millis();

    spinner.finish_and_clear();
    info!(
        artifacts = artifacts.len(),
        duration_ms = summary.duration_ms as u64,
        "run complete"
    );
    Ok(summary)
}

/// Read every scanned file. Files that vanish or cannot be read between
/// scan and read are reported as skipped.
fn read_units(root: &Path, files: &[ScannedFile]) -> (Vec<SourceUnit>, Vec<SkippedFile>) {
    let mut units = Vec::with_capacity(files.len());
    let mut unreadable = Vec::new();
    for file in files {
        match fs::read(root.join(&file.path)) {
            Ok(bytes) => units.push(SourceUnit::new(
                file.path.clone(),
                String::from_utf8_lossy(&bytes).into_owned(),
            )),
            Err(e) => {
                warn!(path = %file.path, error = %e, "failed to read file");
                unreadable.push(SkippedFile {
                    path: file.path.clone(),
                    reason: SkipReason::Unreadable,
                    size_bytes: file.size_bytes,
                });
            }
        }
    }
    (units, unreadable)
}

fn skip_reasons(skipped: &[SkippedFile], parse_failures: usize) -> BTreeMap<String, usize> {
    let mut reasons = BTreeMap::new();
    for file in skipped {
        let reason = match file.reason {
            SkipReason::TooLarge => "too large",
            SkipReason::Unreadable => "unreadable",
        };
        *reasons.entry(reason.to_string()).or_insert(0) += 1;
    }
    if parse_failures > 0 {
        reasons.insert("parse error".to_string(), parse_failures);
    }
    reasons
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_skip_reasons() {
        let skipped = vec![
            SkippedFile {
                path: "Big.java".to_string(),
                reason: SkipReason::TooLarge,
                size_bytes: 10,
            },
            SkippedFile {
                path: "Gone.java".to_string(),
                reason: SkipReason::Unreadable,
                size_bytes: 0,
            },
        ];
        let reasons = skip_reasons(&skipped, 2);
        assert_eq!(reasons.get("too large"), Some(&1));
        assert_eq!(reasons.get("unreadable"), Some(&1));
        assert_eq!(reasons.get("parse error"), Some(&2));
    }

    #[test]
    fn test_read_units_reports_missing_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("A.java"), "class A {}").unwrap();
        let files = vec![
            ScannedFile {
                path: "A.java".to_string(),
                language: "java".to_string(),
                ..Default::default()
            },
            ScannedFile {
                path: "B.java".to_string(),
                language: "java".to_string(),
                ..Default::default()
            },
        ];
        let (units, unreadable) = read_units(dir.path(), &files);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].text, "class A {}");
        assert_eq!(unreadable[0].path, "B.java");
    }

    #[tokio::test]
    async fn test_run_offline() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(
            src.join("OrderController.java"),
            "package shop;\n@RestController\n@RequestMapping(\"/orders\")\npublic class OrderController {\n    private OrderService orderService;\n    @GetMapping(\"/{id}\")\n    public String get(@PathVariable Long id) { return orderService.find(id); }\n}\n",
        )
        .unwrap();
        fs::write(
            src.join("OrderService.java"),
            "package shop;\npublic class OrderService { public String find(Long id) { return null; } }\n",
        )
        .unwrap();

        let out = dir.path().join("out");
        let options = RunOptions {
            codebase: src,
            out: out.clone(),
            quiet: true,
            ..Default::default()
        };
        let summary = run(options, StrataConfig::default()).await.unwrap();

        assert_eq!(summary.files_parsed, 2);
        assert_eq!(summary.classes, 2);
        assert_eq!(summary.edges, 1);
        assert_eq!(summary.routers, 1);
        assert_eq!(summary.stubs, 1);
        assert!(summary.enriched);
        assert_eq!(summary.provider, "local");
        assert!(out.join("knowledge/knowledge.json").exists());
        assert!(out.join("converted/controllers/OrderController.js").exists());
        assert!(out.join("converted/services/OrderService.js").exists());
        assert!(out.join("converted/app.js").exists());
    }
}

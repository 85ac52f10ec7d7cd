//! JSON persistence documents.
//!
//! Field names are camelCase and stable across runs so that two runs over
//! the same codebase can be diffed.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::graph::KnowledgeGraph;
use crate::pipeline::{UnitOutcome, UnitReport};
use crate::scanner::{ScannedFile, SkippedFile};
use crate::types::{Category, ClassInfo, ComplexityLabel, Enrichment, SourceKind};

/// Overview used when no provider produced one.
pub const DEFAULT_OVERVIEW: &str = "Auto-generated overview. Use an LLM provider to enrich.";

/// `knowledge.json`: classes, methods, complexity and dependencies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeDocument {
    pub project_overview: String,
    pub modules: Vec<ModuleEntry>,
    pub edges: Vec<EdgeEntry>,
    pub cycles: Vec<Vec<String>>,
    pub external_type_usage: BTreeMap<String, usize>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleEntry {
    pub name: String,
    pub qualified_name: String,
    pub package: Option<String>,
    pub category: Category,
    pub file: String,
    pub description: String,
    pub annotations: Vec<String>,
    /// Qualified names of referenced classes.
    pub dependencies: Vec<String>,
    pub fields: Vec<FieldEntry>,
    pub methods: Vec<MethodEntry>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub declared_type: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodEntry {
    pub name: String,
    pub signature: String,
    pub description: String,
    pub complexity: ComplexityLabel,
    pub complexity_score: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeEntry {
    pub from: String,
    pub to: String,
}

impl KnowledgeDocument {
    pub fn build(graph: &KnowledgeGraph, enrichment: &Enrichment) -> Self {
        let modules = graph
            .classes()
            .iter()
            .map(|(fqn, class)| module_entry(graph, fqn, class, enrichment.description(fqn)))
            .collect();

        Self {
            project_overview: enrichment
                .overview
                .clone()
                .unwrap_or_else(|| DEFAULT_OVERVIEW.to_string()),
            modules,
            edges: graph
                .edges()
                .iter()
                .map(|e| EdgeEntry {
                    from: e.from.clone(),
                    to: e.to.clone(),
                })
                .collect(),
            cycles: graph.cycles(),
            external_type_usage: graph.external_type_usage().clone(),
        }
    }
}

fn module_entry(graph: &KnowledgeGraph, fqn: &str, class: &ClassInfo, description: &str) -> ModuleEntry {
    ModuleEntry {
        name: class.name.clone(),
        qualified_name: fqn.to_string(),
        package: class.package.clone(),
        category: class.category,
        file: class.path.clone(),
        description: description.to_string(),
        annotations: class.annotations.clone(),
        dependencies: graph
            .dependencies_of(fqn)
            .into_iter()
            .map(str::to_string)
            .collect(),
        fields: class
            .fields
            .iter()
            .map(|f| FieldEntry {
                name: f.name.clone(),
                declared_type: f.declared_type.clone(),
            })
            .collect(),
        methods: class
            .methods
            .iter()
            .map(|m| MethodEntry {
                name: m.name.clone(),
                signature: m.signature(),
                description: String::new(),
                complexity: m.complexity.label(),
                complexity_score: m.complexity.value(),
            })
            .collect(),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Parsed,
    Failed,
    Skipped,
    Config,
}

/// `files.json`: one entry per discovered file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSummaryDocument {
    pub files: Vec<FileEntry>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub path: String,
    pub kind: SourceKind,
    pub size_bytes: u64,
    pub hash: Option<String>,
    pub status: FileStatus,
    pub error: Option<String>,
    /// Qualified names of the classes the file declares.
    pub classes: Vec<String>,
    pub method_count: usize,
    pub max_complexity: u32,
}

impl FileSummaryDocument {
    /// Join scanner facts, per-unit outcomes and the graph, sorted by path.
    pub fn build(
        scanned: &[ScannedFile],
        skipped: &[SkippedFile],
        reports: &[UnitReport],
        graph: &KnowledgeGraph,
    ) -> Self {
        let facts: HashMap<&str, &ScannedFile> = scanned.iter().map(|f| (f.path.as_str(), f)).collect();

        let mut by_file: HashMap<&str, Vec<(&String, &ClassInfo)>> = HashMap::new();
        for (fqn, class) in graph.classes() {
            by_file.entry(class.path.as_str()).or_default().push((fqn, class));
        }

        let mut files: Vec<FileEntry> = reports
            .iter()
            .map(|report| {
                let fact = facts.get(report.path.as_str());
                let classes = by_file.get(report.path.as_str()).cloned().unwrap_or_default();
                let (status, error) = match &report.outcome {
                    UnitOutcome::Parsed { .. } => (FileStatus::Parsed, None),
                    UnitOutcome::Failed(e) => (FileStatus::Failed, Some(e.to_string())),
                    UnitOutcome::Config => (FileStatus::Config, None),
                };
                FileEntry {
                    path: report.path.clone(),
                    kind: report.kind,
                    size_bytes: fact.map(|f| f.size_bytes).unwrap_or(0),
                    hash: fact.and_then(|f| f.hash.clone()),
                    status,
                    error,
                    classes: classes.iter().map(|(fqn, _)| fqn.to_string()).collect(),
                    method_count: classes.iter().map(|(_, c)| c.declared_methods().count()).sum(),
                    max_complexity: classes
                        .iter()
                        .map(|(_, c)| c.max_complexity().value())
                        .max()
                        .unwrap_or(0),
                }
            })
            .collect();

        files.extend(skipped.iter().map(|s| FileEntry {
            path: s.path.clone(),
            kind: SourceKind::detect(&s.path),
            size_bytes: s.size_bytes,
            hash: None,
            status: FileStatus::Skipped,
            error: Some(format!("{:?}", s.reason)),
            classes: Vec::new(),
            method_count: 0,
            max_complexity: 0,
        }));

        files.sort_by(|a, b| a.path.cmp(&b.path));
        Self { files }
    }
}

/// Serialize a document, pretty-printed or compact.
pub fn export<T: Serialize>(document: &T, pretty: bool) -> Result<String, serde_json::Error> {
    if pretty {
        serde_json::to_string_pretty(document)
    } else {
        serde_json::to_string(document)
    }
}

//! Per-run state machine.
//!
//! ```text
//! Collecting --finalize()--> Resolving --> Finalized --generate()--> Generating --> Done
//! ```
//!
//! Source units are offered while `Collecting`; each is parsed on the rayon
//! pool and merged into the knowledge graph builder. Finalizing is the
//! barrier after which dependency edges exist and the graph is frozen.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::codegen::{self, ConversionArtifact};
use crate::error::{ParseError, ResolutionError};
use crate::graph::{KnowledgeGraph, KnowledgeGraphBuilder};
use crate::parser;
use crate::types::{ClassInfo, SourceKind, SourceUnit};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunPhase {
    Collecting,
    Resolving,
    Finalized,
    Generating,
    Done,
}

impl RunPhase {
    fn can_advance_to(self, next: RunPhase) -> bool {
        matches!(
            (self, next),
            (RunPhase::Collecting, RunPhase::Resolving)
                | (RunPhase::Resolving, RunPhase::Finalized)
                | (RunPhase::Finalized, RunPhase::Generating)
                | (RunPhase::Generating, RunPhase::Done)
        )
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunPhase::Collecting => "collecting",
            RunPhase::Resolving => "resolving",
            RunPhase::Finalized => "finalized",
            RunPhase::Generating => "generating",
            RunPhase::Done => "done",
        };
        f.write_str(s)
    }
}

/// What happened to one offered unit.
#[derive(Clone, Debug, PartialEq)]
pub enum UnitOutcome {
    /// Parsed; the unit declared this many classes.
    Parsed { classes: usize, methods: usize },
    /// Excluded from the graph.
    Failed(ParseError),
    /// Recorded but never parsed.
    Config,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UnitReport {
    pub path: String,
    pub kind: SourceKind,
    pub outcome: UnitOutcome,
}

impl UnitReport {
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, UnitOutcome::Failed(_))
    }
}

/// Drives one analysis run from source units to conversion artifacts.
#[derive(Debug)]
pub struct AnalysisRun {
    phase: RunPhase,
    builder: Option<KnowledgeGraphBuilder>,
    graph: Option<KnowledgeGraph>,
    reports: Vec<UnitReport>,
    num_threads: Option<usize>,
}

impl Default for AnalysisRun {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisRun {
    pub fn new() -> Self {
        Self {
            phase: RunPhase::Collecting,
            builder: Some(KnowledgeGraphBuilder::new()),
            graph: None,
            reports: Vec::new(),
            num_threads: None,
        }
    }

    /// Parse on a dedicated pool of `n` threads instead of the global one.
    pub fn with_threads(mut self, n: Option<usize>) -> Self {
        self.num_threads = n.filter(|&n| n > 0);
        self
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Offer one unit. Only legal while collecting.
    pub fn offer(&mut self, unit: &SourceUnit) -> Result<(), ResolutionError> {
        self.offer_all(std::slice::from_ref(unit))
    }

    /// Parse a batch of units in parallel and merge their classes.
    ///
    /// Parse failures are recorded against the unit and never abort the run.
    pub fn offer_all(&mut self, units: &[SourceUnit]) -> Result<(), ResolutionError> {
        let builder = match (&self.phase, &self.builder) {
            (RunPhase::Collecting, Some(builder)) => builder,
            _ => {
                return Err(ResolutionError::InvalidTransition {
                    from: self.phase,
                    to: RunPhase::Collecting,
                })
            }
        };

        let process = |unit: &SourceUnit| -> UnitReport {
            let outcome = match unit.kind {
                SourceKind::Config => UnitOutcome::Config,
                SourceKind::Source => match parser::parse_unit(unit) {
                    Ok(classes) => {
                        let outcome = UnitOutcome::Parsed {
                            classes: classes.len(),
                            methods: count_methods(&classes),
                        };
                        builder.merge_all(classes);
                        outcome
                    }
                    Err(e) => {
                        tracing::warn!(path = %e.path, line = e.line, "Skipping file: {}", e.message);
                        UnitOutcome::Failed(e)
                    }
                },
            };
            UnitReport {
                path: unit.path.clone(),
                kind: unit.kind,
                outcome,
            }
        };

        let pool = self.num_threads.and_then(|n| {
            rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| tracing::warn!("Falling back to the global thread pool: {}", e))
                .ok()
        });
        let reports: Vec<UnitReport> = match pool {
            Some(pool) => pool.install(|| units.par_iter().map(process).collect()),
            None => units.par_iter().map(process).collect(),
        };

        self.reports.extend(reports);
        Ok(())
    }

    /// Resolve categories and edges, then freeze the graph.
    ///
    /// Fails only if nothing was ever offered. A run where every unit failed
    /// to parse still finalizes, with an empty graph.
    pub fn finalize(&mut self) -> Result<&KnowledgeGraph, ResolutionError> {
        if self.phase == RunPhase::Collecting && self.reports.is_empty() {
            return Err(ResolutionError::NoSourceUnits);
        }
        self.advance(RunPhase::Resolving)?;

        let builder = self.builder.take().ok_or(ResolutionError::InvalidTransition {
            from: RunPhase::Resolving,
            to: RunPhase::Finalized,
        })?;
        let graph = builder.finalize();
        tracing::info!(
            classes = graph.class_count(),
            edges = graph.edge_count(),
            "Knowledge graph finalized"
        );

        self.advance(RunPhase::Finalized)?;
        let graph: &KnowledgeGraph = self.graph.insert(graph);
        Ok(graph)
    }

    /// Produce conversion artifacts from the finalized graph.
    pub fn generate(&mut self) -> Result<Vec<ConversionArtifact>, ResolutionError> {
        self.advance(RunPhase::Generating)?;
        let artifacts = match &self.graph {
            Some(graph) => codegen::generate(graph),
            None => {
                return Err(ResolutionError::InvalidTransition {
                    from: RunPhase::Generating,
                    to: RunPhase::Done,
                })
            }
        };
        self.advance(RunPhase::Done)?;
        Ok(artifacts)
    }

    /// The finalized graph, once resolution has completed.
    pub fn graph(&self) -> Option<&KnowledgeGraph> {
        self.graph.as_ref()
    }

    pub fn reports(&self) -> &[UnitReport] {
        &self.reports
    }

    pub fn failures(&self) -> impl Iterator<Item = &ParseError> {
        self.reports.iter().filter_map(|r| match &r.outcome {
            UnitOutcome::Failed(e) => Some(e),
            _ => None,
        })
    }

    pub fn skipped_count(&self) -> usize {
        self.reports.iter().filter(|r| r.is_failure()).count()
    }

    pub fn parsed_count(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, UnitOutcome::Parsed { .. }))
            .count()
    }

    fn advance(&mut self, next: RunPhase) -> Result<(), ResolutionError> {
        if !self.phase.can_advance_to(next) {
            return Err(ResolutionError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        tracing::debug!(from = %self.phase, to = %next, "Run phase change");
        self.phase = next;
        Ok(())
    }
}

fn count_methods(classes: &[ClassInfo]) -> usize {
    classes.iter().map(|c| c.declared_methods().count()).sum()
}

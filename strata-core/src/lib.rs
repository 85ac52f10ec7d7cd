//! Strata core - structural analysis and scaffolding engine for Java codebases.
//!
//! This crate turns Java sources into a knowledge graph of classes, methods,
//! complexity scores and dependencies, and plans Express scaffolding from it.
//!
//! # Features
//!
//! - **Parallel parsing**: Parse compilation units concurrently using Rayon
//! - **Cyclomatic complexity**: McCabe score per method
//! - **Layer classification**: Controller, Service, DAO, Entity, Other
//! - **Dependency graph**: petgraph-backed queries and cycle detection
//! - **Token chunking**: overlapping, token-bounded slices for LLM prompts
//! - **Code generation**: routers and service stubs as Express JavaScript
//!
//! # Usage
//!
//! ```no_run
//! use strata_core::pipeline::AnalysisRun;
//! use strata_core::types::SourceUnit;
//!
//! let units = vec![SourceUnit::new("OrderController.java", "public class OrderController {}")];
//! let mut run = AnalysisRun::new();
//! run.offer_all(&units)?;
//! run.finalize()?;
//! let artifacts = run.generate()?;
//! # Ok::<(), strata_core::error::ResolutionError>(())
//! ```

pub mod chunker;
pub mod codegen;
pub mod error;
pub mod exporter;
pub mod graph;
pub mod parser;
pub mod pipeline;
pub mod reducer;
pub mod resolver;
pub mod scanner;
pub mod types;

pub use error::{ChunkError, ParseError, ResolutionError, ScanError};
pub use graph::{KnowledgeGraph, KnowledgeGraphBuilder};
pub use pipeline::{AnalysisRun, RunPhase};

/// Get the version of strata-core.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

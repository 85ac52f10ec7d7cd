//! Error types for strata-core.

use thiserror::Error;

use crate::pipeline::RunPhase;

/// A single compilation unit could not be turned into a structural record.
///
/// Recoverable: the caller records it and excludes the file from the graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{path}:{line}: {message}")]
pub struct ParseError {
    pub path: String,
    /// 1-based, best effort. `0` when no position is known.
    pub line: u32,
    pub message: String,
}

impl ParseError {
    pub fn new(path: impl Into<String>, line: u32, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            line,
            message: message.into(),
        }
    }
}

/// Invariant violations raised while resolving or driving a run.
///
/// These indicate a programming error and abort the run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("illegal run transition: {from:?} -> {to:?}")]
    InvalidTransition { from: RunPhase, to: RunPhase },

    #[error("cannot finalize a run that was offered no source units")]
    NoSourceUnits,
}

/// Invalid chunking parameters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkError {
    #[error("target token count must be greater than zero")]
    ZeroTarget,

    #[error("overlap ({overlap}) must be smaller than target ({target})")]
    OverlapTooLarge { target: usize, overlap: usize },
}

/// Directory scanning failures.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Path does not exist: {0}")]
    MissingRoot(String),

    #[error("Invalid exclude pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

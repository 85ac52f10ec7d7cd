//! Persistence documents handed to the reporting side.

pub mod json;

pub use json::{export, FileSummaryDocument, KnowledgeDocument};

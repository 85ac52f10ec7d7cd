//! Source model builder.
//!
//! Turns one Java compilation unit into the structural records of the
//! classes it declares, using the tree-sitter Java grammar.

use crate::error::ParseError;
use crate::types::{ClassInfo, SourceKind, SourceUnit};

pub mod annotations;
pub mod java;

mod helpers;

pub use annotations::AnnotationRef;

/// Parse a source unit.
///
/// Config units carry no classes and always succeed with an empty list.
pub fn parse_unit(unit: &SourceUnit) -> Result<Vec<ClassInfo>, ParseError> {
    match unit.kind {
        SourceKind::Source => java::parse(&unit.text, &unit.path),
        SourceKind::Config => Ok(Vec::new()),
    }
}

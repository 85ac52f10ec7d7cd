//! Complexity metrics over the Java AST.

pub mod complexity;

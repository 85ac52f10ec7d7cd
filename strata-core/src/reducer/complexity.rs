//! Cyclomatic complexity calculation.
//!
//! Calculates McCabe cyclomatic complexity by counting decision points
//! in the Java AST: `1 + branches + loops + short-circuit operators`.

use once_cell::sync::Lazy;
use std::collections::HashSet;
use tree_sitter::{Node, Parser};

use crate::types::ComplexityScore;

/// Node kinds that always add one decision point.
static DECISION_POINTS: Lazy<HashSet<&str>> = Lazy::new(|| {
    HashSet::from([
        "if_statement", // also covers `else if`, which nests an if_statement
        "for_statement",
        "enhanced_for_statement",
        "while_statement",
        "do_statement",
        "catch_clause",
    ])
});

/// Binary operators that count as decision points.
static DECISION_OPERATORS: Lazy<HashSet<&str>> = Lazy::new(|| HashSet::from(["&&", "||"]));

/// Calculate cyclomatic complexity for a method body node.
///
/// A missing body (abstract or interface method) scores 1.
pub fn score_body(body: Option<&Node>, source: &str) -> ComplexityScore {
    match body {
        Some(node) => ComplexityScore::from_decision_points(count_decision_points(node, source)),
        None => ComplexityScore::BASE,
    }
}

/// Calculate cyclomatic complexity for a standalone method body such as
/// `{ if (a && b) { ... } }`.
///
/// Bodies that do not parse score 1 rather than failing.
pub fn score_body_source(body: &str) -> ComplexityScore {
    let wrapped = format!("class __Body {{ void __body() {} }}", body);
    let mut parser = Parser::new();
    if parser
        .set_language(&tree_sitter_java::LANGUAGE.into())
        .is_err()
    {
        return ComplexityScore::BASE;
    }
    let Some(tree) = parser.parse(&wrapped, None) else {
        return ComplexityScore::BASE;
    };
    let root = tree.root_node();
    if root.has_error() {
        return ComplexityScore::BASE;
    }
    match find_first(&root, "block") {
        Some(block) => score_body(Some(&block), &wrapped),
        None => ComplexityScore::BASE,
    }
}

fn count_decision_points(node: &Node, source: &str) -> u32 {
    let mut points = 0u32;

    fn is_decision_operator(node: &Node, source: &str) -> bool {
        match node.child_by_field_name("operator") {
            Some(op) => op
                .utf8_text(source.as_bytes())
                .map(|text| DECISION_OPERATORS.contains(text))
                .unwrap_or(false),
            None => false,
        }
    }

    fn is_case_label(node: &Node) -> bool {
        node.child(0).map(|c| c.kind() == "case").unwrap_or(false)
    }

    fn traverse(node: &Node, source: &str, points: &mut u32) {
        let kind = node.kind();
        if DECISION_POINTS.contains(kind)
            || (kind == "switch_label" && is_case_label(node))
            || (kind == "binary_expression" && is_decision_operator(node, source))
        {
            *points += 1;
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            traverse(&child, source, points);
        }
    }

    traverse(node, source, &mut points);
    points
}

fn find_first<'a>(node: &Node<'a>, kind: &str) -> Option<Node<'a>> {
    if node.kind() == kind {
        return Some(*node);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = find_first(&child, kind) {
            return Some(found);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(body: &str) -> u32 {
        score_body_source(body).value()
    }

    #[test]
    fn test_straight_line_body() {
        assert_eq!(score("{ int x = 1; return; }"), 1);
        assert_eq!(score("{}"), 1);
    }

    #[test]
    fn test_if_else_if() {
        // if + else-if = 2 decision points; the plain else adds nothing
        let body = "{ if (a) { x(); } else if (b) { y(); } else { z(); } }";
        assert_eq!(score(body), 3);
    }

    #[test]
    fn test_loops() {
        let body = r#"{
            for (int i = 0; i < n; i++) { }
            for (String s : items) { }
            while (running) { }
            do { tick(); } while (again);
        }"#;
        assert_eq!(score(body), 5);
    }

    #[test]
    fn test_switch_cases_and_default() {
        let body = r#"{
            switch (kind) {
                case 1: a(); break;
                case 2: b(); break;
                default: c();
            }
        }"#;
        assert_eq!(score(body), 3);
    }

    #[test]
    fn test_catch_clauses() {
        let body = r#"{
            try { run(); }
            catch (IllegalStateException e) { }
            catch (RuntimeException e) { }
            finally { close(); }
        }"#;
        assert_eq!(score(body), 3);
    }

    #[test]
    fn test_short_circuit_operators() {
        // if + && + || = 3
        let body = "{ if (a && b || c) { run(); } }";
        assert_eq!(score(body), 4);
    }

    #[test]
    fn test_bitwise_and_comparison_not_counted() {
        let body = "{ int m = a & b | c; boolean q = a == b; }";
        assert_eq!(score(body), 1);
    }

    #[test]
    fn test_unparseable_body_scores_one() {
        assert_eq!(score("{ if (a { }"), 1);
    }
}

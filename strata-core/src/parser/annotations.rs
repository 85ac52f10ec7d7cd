//! Best-effort decomposition of raw annotation text.
//!
//! The parser keeps every annotation verbatim. This module pulls out the
//! pieces that route mapping cares about: the annotation name, a path
//! literal and a `method = RequestMethod.X` value. Anything it cannot read
//! unambiguously decomposes to "no match", never to an error.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::BindingSource;

static HEAD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^@\s*([A-Za-z_][\w.]*)\s*").unwrap());
static KEY_VALUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([A-Za-z_]\w*)\s*=\s*(.*)$").unwrap());
static STRING_LITERAL: Lazy<Regex> = Lazy::new(|| Regex::new(r#"^"((?:[^"\\]|\\.)*)"$"#).unwrap());

/// Structured view of one annotation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AnnotationRef {
    /// Simple name without `@` or package qualifier, e.g. `GetMapping`.
    pub name: String,
    /// Path literal from the positional, `value` or `path` argument.
    pub path: Option<String>,
    /// Lowercase verb from `method = RequestMethod.X`.
    pub request_method: Option<String>,
}

impl AnnotationRef {
    /// Decompose raw annotation text such as `@GetMapping("/orders/{id}")`.
    ///
    /// Returns `None` only when the text is not an annotation at all.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let head = HEAD.captures(raw)?;
        let qualified = head.get(1)?.as_str();
        let name = qualified.rsplit('.').next().unwrap_or(qualified).to_string();
        let mut annotation = AnnotationRef {
            name,
            ..Default::default()
        };

        let rest = raw[head.get(0)?.end()..].trim();
        let Some(args) = rest.strip_prefix('(').and_then(|r| r.strip_suffix(')')) else {
            return Some(annotation);
        };
        if !quotes_balanced(args) {
            return Some(annotation);
        }

        let mut paths: Vec<String> = Vec::new();
        let mut methods: Vec<String> = Vec::new();
        let mut ambiguous = false;

        for argument in split_top_level(args, ',') {
            let argument = argument.trim();
            if argument.is_empty() {
                continue;
            }
            let (key, value) = match KEY_VALUE.captures(argument) {
                Some(kv) if !starts_with_literal(argument) => (
                    kv.get(1).map(|m| m.as_str()).unwrap_or("value"),
                    kv.get(2).map(|m| m.as_str()).unwrap_or(""),
                ),
                _ => ("value", argument),
            };
            match key {
                "value" | "path" => match string_values(value) {
                    Some(values) if values.len() == 1 => paths.extend(values),
                    Some(values) if values.is_empty() => {}
                    _ => ambiguous = true,
                },
                "method" => {
                    let verbs = enum_values(value);
                    if verbs.len() == 1 {
                        methods.extend(verbs);
                    }
                }
                _ => {}
            }
        }

        paths.dedup();
        if !ambiguous && paths.len() == 1 {
            annotation.path = paths.pop();
        }
        if methods.len() == 1 {
            annotation.request_method = methods.pop().map(|m| m.to_lowercase());
        }
        Some(annotation)
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }
}

/// Binding source declared by a parameter's annotations.
pub fn binding_source(annotations: &[String]) -> BindingSource {
    for raw in annotations {
        if let Some(annotation) = AnnotationRef::parse(raw) {
            match annotation.name.as_str() {
                "PathVariable" | "PathParam" => return BindingSource::Path,
                "RequestParam" | "QueryParam" => return BindingSource::Query,
                "RequestBody" => return BindingSource::Body,
                _ => {}
            }
        }
    }
    BindingSource::None
}

/// True when every unescaped double quote has a partner.
fn quotes_balanced(text: &str) -> bool {
    let mut count = 0usize;
    let mut escaped = false;
    for ch in text.chars() {
        match ch {
            '\\' if !escaped => {
                escaped = true;
                continue;
            }
            '"' if !escaped => count += 1,
            _ => {}
        }
        escaped = false;
    }
    count % 2 == 0
}

fn starts_with_literal(text: &str) -> bool {
    text.starts_with('"') || text.starts_with('{')
}

/// Split on `separator` outside string literals, braces and parentheses.
fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    let mut start = 0;

    for (i, ch) in text.char_indices() {
        if in_string {
            match ch {
                '\\' if !escaped => {
                    escaped = true;
                    continue;
                }
                '"' if !escaped => in_string = false,
                _ => {}
            }
            escaped = false;
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' | '(' => depth += 1,
            '}' | ')' => depth -= 1,
            c if c == separator && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Literal strings in `"a"` or `{"a", "b"}`; `None` for anything else.
fn string_values(value: &str) -> Option<Vec<String>> {
    let value = value.trim();
    let items = match value.strip_prefix('{').and_then(|v| v.strip_suffix('}')) {
        Some(inner) => split_top_level(inner, ','),
        None => vec![value],
    };

    let mut out = Vec::new();
    for item in items {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        let literal = STRING_LITERAL.captures(item)?;
        out.push(literal.get(1)?.as_str().to_string());
    }
    Some(out)
}

/// Trailing identifiers of `RequestMethod.X` or `{RequestMethod.X, ...}`.
fn enum_values(value: &str) -> Vec<String> {
    let value = value.trim();
    let inner = value
        .strip_prefix('{')
        .and_then(|v| v.strip_suffix('}'))
        .unwrap_or(value);
    split_top_level(inner, ',')
        .into_iter()
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| item.rsplit('.').next().unwrap_or(item).to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_annotation() {
        let a = AnnotationRef::parse("@RestController").unwrap();
        assert_eq!(a.name, "RestController");
        assert_eq!(a.path, None);
    }

    #[test]
    fn test_qualified_name_is_shortened() {
        let a = AnnotationRef::parse("@org.springframework.stereotype.Service").unwrap();
        assert_eq!(a.name, "Service");
    }

    #[test]
    fn test_positional_path() {
        let a = AnnotationRef::parse(r#"@GetMapping("/orders/{id}")"#).unwrap();
        assert_eq!(a.name, "GetMapping");
        assert_eq!(a.path.as_deref(), Some("/orders/{id}"));
    }

    #[test]
    fn test_keyed_path_and_method() {
        let a = AnnotationRef::parse(
            r#"@RequestMapping(value = "/orders", method = RequestMethod.POST)"#,
        )
        .unwrap();
        assert_eq!(a.path.as_deref(), Some("/orders"));
        assert_eq!(a.request_method.as_deref(), Some("post"));
    }

    #[test]
    fn test_array_with_single_path() {
        let a = AnnotationRef::parse(r#"@RequestMapping(path = {"/api/v1"})"#).unwrap();
        assert_eq!(a.path.as_deref(), Some("/api/v1"));
    }

    #[test]
    fn test_multiple_paths_are_ambiguous() {
        let a = AnnotationRef::parse(r#"@GetMapping({"/a", "/b"})"#).unwrap();
        assert_eq!(a.path, None);
    }

    #[test]
    fn test_unbalanced_literal_is_no_match() {
        let a = AnnotationRef::parse(r#"@GetMapping("/broken)"#).unwrap();
        assert_eq!(a.name, "GetMapping");
        assert_eq!(a.path, None);
    }

    #[test]
    fn test_constant_reference_is_no_match() {
        let a = AnnotationRef::parse("@GetMapping(Routes.ORDERS)").unwrap();
        assert_eq!(a.path, None);
    }

    #[test]
    fn test_comma_inside_literal() {
        let a = AnnotationRef::parse(r#"@GetMapping(value = "/a,b", produces = "application/json")"#)
            .unwrap();
        assert_eq!(a.path.as_deref(), Some("/a,b"));
    }

    #[test]
    fn test_not_an_annotation() {
        assert!(AnnotationRef::parse("public").is_none());
    }

    #[test]
    fn test_binding_source() {
        assert_eq!(
            binding_source(&[r#"@PathVariable("id")"#.to_string()]),
            BindingSource::Path
        );
        assert_eq!(
            binding_source(&["@RequestParam(required = false)".to_string()]),
            BindingSource::Query
        );
        assert_eq!(
            binding_source(&["@Valid".to_string(), "@RequestBody".to_string()]),
            BindingSource::Body
        );
        assert_eq!(binding_source(&[]), BindingSource::None);
    }
}

//! Route derivation for controller methods.
//!
//! Paths come from mapping-annotation literals when present; otherwise a
//! slug is derived from the class and method names.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::parser::AnnotationRef;
use crate::types::{ClassInfo, MethodInfo};

/// Annotations that carry a route path.
const MAPPING_ANNOTATIONS: &[&str] = &[
    "RequestMapping",
    "GetMapping",
    "PostMapping",
    "PutMapping",
    "DeleteMapping",
    "PatchMapping",
    "Path",
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpVerb {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpVerb {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVerb::Get => "get",
            HttpVerb::Post => "post",
            HttpVerb::Put => "put",
            HttpVerb::Delete => "delete",
            HttpVerb::Patch => "patch",
        }
    }

    fn from_method_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "get" => Some(HttpVerb::Get),
            "post" => Some(HttpVerb::Post),
            "put" => Some(HttpVerb::Put),
            "delete" => Some(HttpVerb::Delete),
            "patch" => Some(HttpVerb::Patch),
            _ => None,
        }
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `getCategoryById` → `get-category-by-id`, `OrderDAO` → `order-dao`.
pub fn kebab_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == '-' || c == '.' || c == '$' {
            if !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
            continue;
        }
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).map(|n| n.is_lowercase()).unwrap_or(false);
            let boundary = prev.is_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_uppercase() && next_is_lower);
            if boundary && !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
        }
        out.extend(c.to_lowercase());
    }
    out.trim_end_matches('-').to_string()
}

/// HTTP verb from a method's mapping annotations, `get` when none is recognized.
pub fn http_verb(method: &MethodInfo) -> HttpVerb {
    for annotation in method.annotations.iter().filter_map(|a| AnnotationRef::parse(a)) {
        let verb = match annotation.name.as_str() {
            "GetMapping" => Some(HttpVerb::Get),
            "PostMapping" => Some(HttpVerb::Post),
            "PutMapping" => Some(HttpVerb::Put),
            "DeleteMapping" => Some(HttpVerb::Delete),
            "PatchMapping" => Some(HttpVerb::Patch),
            "RequestMapping" => Some(
                annotation
                    .request_method
                    .as_deref()
                    .and_then(HttpVerb::from_method_name)
                    .unwrap_or_default(),
            ),
            // JAX-RS style
            other => HttpVerb::from_method_name(other).filter(|_| other.chars().all(|c| c.is_ascii_uppercase())),
        };
        if let Some(verb) = verb {
            return verb;
        }
    }
    HttpVerb::default()
}

/// Path literal of the first mapping annotation that carries one.
pub fn mapping_path(annotations: &[String]) -> Option<String> {
    annotations
        .iter()
        .filter_map(|a| AnnotationRef::parse(a))
        .filter(|a| MAPPING_ANNOTATIONS.contains(&a.name.as_str()))
        .find_map(|a| a.path)
}

/// Route path for `method` on `class`, and whether it came from an annotation.
///
/// A method literal is appended to the class-level base path and counts as
/// annotation-derived. A class base alone is followed by the kebab-cased
/// method name; the method part is a guess, so the path is reported as
/// heuristic. Without any literal the path is `/<kebab class>/<kebab method>`.
pub fn route_path(class: &ClassInfo, method: &MethodInfo) -> (String, bool) {
    let base = mapping_path(&class.annotations);
    match (base, mapping_path(&method.annotations)) {
        (base, Some(path)) => (join_paths(base.as_deref().unwrap_or(""), &path), true),
        (Some(base), None) => (join_paths(&base, &kebab_case(&method.name)), false),
        (None, None) => (
            format!(
                "/{}/{}",
                kebab_case(class.simple_name()),
                kebab_case(&method.name)
            ),
            false,
        ),
    }
}

/// Join two path fragments with exactly one `/` between them and a leading `/`.
pub fn join_paths(base: &str, path: &str) -> String {
    let base = base.trim_matches('/');
    let path = path.trim_start_matches('/');
    let joined = match (base.is_empty(), path.is_empty()) {
        (true, true) => String::new(),
        (true, false) => path.to_string(),
        (false, true) => base.to_string(),
        (false, false) => format!("{}/{}", base, path),
    };
    format!("/{}", joined)
}

/// Express-style path: `{id}` → `:id`, regex constraints dropped.
pub fn express_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut rest = path;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        match rest[open..].find('}') {
            Some(close) => {
                let inner = &rest[open + 1..open + close];
                let name = inner.split(':').next().unwrap_or(inner).trim();
                out.push(':');
                out.push_str(name);
                rest = &rest[open + close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

//! Data models for the structural record of a Java codebase.
//!
//! These types describe what the source model builder extracts from one
//! compilation unit (classes, methods, fields, annotations) and what the
//! knowledge graph stores after resolution.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Kind of an input file, decided from its extension.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Java source that goes through the parser.
    #[default]
    Source,
    /// Build or configuration file (xml, properties, yaml, ...). Recorded, never parsed.
    Config,
}

impl SourceKind {
    /// Detect the kind from a file path.
    pub fn detect(path: &str) -> Self {
        let is_java = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("java"))
            .unwrap_or(false);
        if is_java {
            SourceKind::Source
        } else {
            SourceKind::Config
        }
    }
}

/// One input file. Immutable once read.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SourceUnit {
    pub path: String,
    pub text: String,
    pub kind: SourceKind,
}

impl SourceUnit {
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        let path = path.into();
        let kind = SourceKind::detect(&path);
        Self {
            path,
            text: text.into(),
            kind,
        }
    }
}

/// Architectural layer of a class.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Controller,
    Service,
    #[serde(rename = "DAO")]
    Dao,
    Entity,
    #[default]
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Controller => "Controller",
            Category::Service => "Service",
            Category::Dao => "DAO",
            Category::Entity => "Entity",
            Category::Other => "Other",
        }
    }

    /// All categories in reporting order.
    pub fn all() -> [Category; 5] {
        [
            Category::Controller,
            Category::Service,
            Category::Dao,
            Category::Entity,
            Category::Other,
        ]
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an HTTP handler reads a parameter from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingSource {
    Path,
    Query,
    Body,
    #[default]
    None,
}

/// Cyclomatic complexity of one method body. Always `>= 1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComplexityScore(u32);

impl ComplexityScore {
    /// Score of a body with no decision points.
    pub const BASE: ComplexityScore = ComplexityScore(1);

    /// Build a score from a decision point count.
    pub fn from_decision_points(points: u32) -> Self {
        ComplexityScore(points.saturating_add(1))
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    /// Derived label; never stored on its own.
    pub fn label(&self) -> ComplexityLabel {
        match self.0 {
            0..=5 => ComplexityLabel::Low,
            6..=10 => ComplexityLabel::Medium,
            _ => ComplexityLabel::High,
        }
    }
}

impl Default for ComplexityScore {
    fn default() -> Self {
        Self::BASE
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComplexityLabel {
    Low,
    Medium,
    High,
}

impl fmt::Display for ComplexityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComplexityLabel::Low => "Low",
            ComplexityLabel::Medium => "Medium",
            ComplexityLabel::High => "High",
        };
        f.write_str(s)
    }
}

/// A method or constructor parameter.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterInfo {
    pub name: String,
    pub declared_type: String,
    /// Inferred from `@PathVariable`, `@RequestParam`, `@RequestBody`.
    pub binding: BindingSource,
    pub annotations: Vec<String>,
    pub is_variadic: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodKind {
    #[default]
    Method,
    Constructor,
}

/// A method (or constructor) declaration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodInfo {
    pub name: String,
    pub kind: MethodKind,
    pub parameters: Vec<ParameterInfo>,
    /// Declared return type; `void` when none, empty for constructors.
    pub return_type: String,
    pub modifiers: Vec<String>,
    pub annotations: Vec<String>,
    pub complexity: ComplexityScore,
    /// Declared `public`, or an interface member.
    pub is_public: bool,
    pub start_line: u32,
    pub end_line: u32,
}

impl MethodInfo {
    pub fn is_constructor(&self) -> bool {
        self.kind == MethodKind::Constructor
    }

    /// Readable one-line signature, e.g. `public Order find(Long id)`.
    pub fn signature(&self) -> String {
        let params = self
            .parameters
            .iter()
            .map(|p| format!("{} {}", p.declared_type, p.name))
            .collect::<Vec<_>>()
            .join(", ");
        let visibility = if self.is_public { "public " } else { "" };
        if self.is_constructor() {
            format!("{}{}({})", visibility, self.name, params)
        } else {
            format!("{}{} {}({})", visibility, self.return_type, self.name, params)
        }
    }
}

/// A field declaration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub name: String,
    pub declared_type: String,
    pub annotations: Vec<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassKind {
    #[default]
    Class,
    Interface,
    Enum,
    Record,
}

/// A class, interface, enum or record declaration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassInfo {
    /// Simple name; nested types are `Outer.Inner`.
    pub name: String,
    pub package: Option<String>,
    /// Path of the source unit the class was declared in.
    pub path: String,
    pub kind: ClassKind,
    /// Assigned during resolution; `Other` until then.
    pub category: Category,
    pub methods: Vec<MethodInfo>,
    pub fields: Vec<FieldInfo>,
    /// Raw annotation text, verbatim and in declaration order.
    pub annotations: Vec<String>,
    pub modifiers: Vec<String>,
    pub bases: Vec<String>,
    /// Imports of the enclosing compilation unit.
    pub imports: Vec<String>,
    pub start_line: u32,
    pub end_line: u32,
}

impl ClassInfo {
    /// `package.Name`, or just the name in the default package.
    pub fn qualified_name(&self) -> String {
        match &self.package {
            Some(pkg) if !pkg.is_empty() => format!("{}.{}", pkg, self.name),
            _ => self.name.clone(),
        }
    }

    /// Last segment of the (possibly nested) name.
    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// Methods that are not constructors.
    pub fn declared_methods(&self) -> impl Iterator<Item = &MethodInfo> {
        self.methods.iter().filter(|m| !m.is_constructor())
    }

    /// Declared types of fields, parameters and return values.
    pub fn signature_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.fields.iter().map(|f| f.declared_type.as_str()).collect();
        for method in &self.methods {
            if !method.return_type.is_empty() {
                types.push(method.return_type.as_str());
            }
            types.extend(method.parameters.iter().map(|p| p.declared_type.as_str()));
        }
        types
    }

    pub fn max_complexity(&self) -> ComplexityScore {
        self.methods
            .iter()
            .map(|m| m.complexity)
            .max()
            .unwrap_or_default()
    }
}

/// Directed reference from one known class to another, by qualified name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub from: String,
    pub to: String,
}

impl DependencyEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Natural-language descriptions attached to a finalized graph.
///
/// Produced by the optional enrichment step. Kept apart from the graph,
/// which stays immutable once finalized.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    pub overview: Option<String>,
    /// Keyed by qualified class name.
    pub descriptions: std::collections::BTreeMap<String, String>,
}

impl Enrichment {
    pub fn description(&self, fqn: &str) -> &str {
        self.descriptions.get(fqn).map(String::as_str).unwrap_or("")
    }
}

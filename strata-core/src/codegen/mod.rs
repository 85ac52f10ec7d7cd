//! Mapping & codegen engine.
//!
//! Reads the finalized knowledge graph and plans one artifact per
//! Controller (a router) and per Service or DAO (a stub). Planning is pure;
//! [`render`] turns plans into JavaScript text and the caller writes files.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::graph::KnowledgeGraph;
use crate::parser::annotations::binding_source;
use crate::types::{BindingSource, Category, ClassInfo, ComplexityScore, MethodInfo, ParameterInfo};

pub mod render;
pub mod routes;

pub use render::{render_app, render_artifact, RenderedFile};
pub use routes::{http_verb, kebab_case, route_path, HttpVerb};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    Router,
    ServiceStub,
}

/// One parameter as the generated code will receive it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamBinding {
    pub name: String,
    pub declared_type: String,
    /// Never `None`: unannotated parameters read from the body.
    pub source: BindingSource,
}

impl ParamBinding {
    fn from_parameter(param: &ParameterInfo) -> Self {
        let source = match param.binding {
            BindingSource::None => match binding_source(&param.annotations) {
                BindingSource::None => BindingSource::Body,
                explicit => explicit,
            },
            explicit => explicit,
        };
        Self {
            name: param.name.clone(),
            declared_type: param.declared_type.clone(),
            source,
        }
    }
}

/// One HTTP route of a router artifact.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteBinding {
    pub method_name: String,
    pub verb: HttpVerb,
    /// Path as written in the source (`{id}` placeholders kept).
    pub path: String,
    pub from_annotation: bool,
    /// In declaration order.
    pub params: Vec<ParamBinding>,
    pub return_type: String,
}

/// One placeholder method of a stub artifact.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodStub {
    pub name: String,
    pub params: Vec<ParamBinding>,
    pub return_type: String,
    pub complexity: ComplexityScore,
}

impl MethodStub {
    fn from_method(method: &MethodInfo) -> Self {
        Self {
            name: method.name.clone(),
            params: method.parameters.iter().map(ParamBinding::from_parameter).collect(),
            return_type: method.return_type.clone(),
            complexity: method.complexity,
        }
    }
}

/// Class a router's handlers call into.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delegate {
    pub name: String,
    pub category: Category,
    /// Qualified name when the delegate is a class of the graph.
    pub class_name: Option<String>,
    /// File stem of the delegate's stub.
    pub module_name: String,
}

impl Delegate {
    /// Module path relative to `controllers/`.
    pub fn require_path(&self) -> String {
        let dir = match self.category {
            Category::Dao => "daos",
            _ => "services",
        };
        format!("../{}/{}", dir, self.module_name)
    }
}

/// Plan for one generated file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionArtifact {
    pub kind: ArtifactKind,
    pub category: Category,
    /// Qualified name of the source class.
    pub class_name: String,
    pub simple_name: String,
    /// File stem, unique within `target_dir`.
    pub module_name: String,
    /// Source file of the class.
    pub source_path: String,
    /// Router only. Ordered as the methods are declared.
    pub routes: Vec<RouteBinding>,
    /// Stub only. Ordered as the methods are declared.
    pub methods: Vec<MethodStub>,
    /// Router only.
    pub delegate: Option<Delegate>,
}

impl ConversionArtifact {
    /// Output directory for this artifact: `controllers`, `services` or `daos`.
    pub fn target_dir(&self) -> &'static str {
        match (self.kind, self.category) {
            (ArtifactKind::Router, _) => "controllers",
            (ArtifactKind::ServiceStub, Category::Dao) => "daos",
            (ArtifactKind::ServiceStub, _) => "services",
        }
    }

    /// File name, e.g. `OrderController.js`.
    pub fn file_name(&self) -> String {
        format!("{}.js", self.module_name)
    }

    /// Path relative to the conversion root.
    pub fn relative_path(&self) -> String {
        format!("{}/{}", self.target_dir(), self.file_name())
    }
}

/// Plan every artifact the graph calls for, routers first.
pub fn generate(graph: &KnowledgeGraph) -> Vec<ConversionArtifact> {
    let mut artifacts: Vec<ConversionArtifact> = graph
        .by_category(Category::Controller)
        .map(|class| router_artifact(graph, class))
        .collect();
    for category in [Category::Service, Category::Dao] {
        artifacts.extend(graph.by_category(category).map(stub_artifact));
    }
    assign_module_names(&mut artifacts);
    tracing::debug!(count = artifacts.len(), "Planned conversion artifacts");
    artifacts
}

fn router_artifact(graph: &KnowledgeGraph, class: &ClassInfo) -> ConversionArtifact {
    let routes = class
        .declared_methods()
        .filter(|m| m.is_public)
        .map(|method| {
            let (path, from_annotation) = route_path(class, method);
            RouteBinding {
                method_name: method.name.clone(),
                verb: http_verb(method),
                path,
                from_annotation,
                params: method.parameters.iter().map(ParamBinding::from_parameter).collect(),
                return_type: method.return_type.clone(),
            }
        })
        .collect();

    ConversionArtifact {
        kind: ArtifactKind::Router,
        category: class.category,
        class_name: class.qualified_name(),
        simple_name: class.simple_name().to_string(),
        module_name: default_module_name(class.simple_name()),
        source_path: class.path.clone(),
        routes,
        methods: Vec::new(),
        delegate: Some(delegate_for(graph, class)),
    }
}

fn stub_artifact(class: &ClassInfo) -> ConversionArtifact {
    ConversionArtifact {
        kind: ArtifactKind::ServiceStub,
        category: class.category,
        class_name: class.qualified_name(),
        simple_name: class.simple_name().to_string(),
        module_name: default_module_name(class.simple_name()),
        source_path: class.path.clone(),
        routes: Vec::new(),
        methods: class.declared_methods().map(MethodStub::from_method).collect(),
        delegate: None,
    }
}

/// The first Service dependency wins, then the first DAO dependency, then
/// the conventional `FooController` → `FooService` pairing.
fn delegate_for(graph: &KnowledgeGraph, class: &ClassInfo) -> Delegate {
    let dependencies = graph.dependencies_of(&class.qualified_name());
    for wanted in [Category::Service, Category::Dao] {
        let found = dependencies
            .iter()
            .filter_map(|fqn| graph.class(fqn))
            .find(|dep| dep.category == wanted);
        if let Some(dep) = found {
            return Delegate {
                name: dep.simple_name().to_string(),
                category: dep.category,
                class_name: Some(dep.qualified_name()),
                module_name: default_module_name(dep.simple_name()),
            };
        }
    }
    let name = class.simple_name();
    let base = name
        .strip_suffix("Controller")
        .filter(|b| !b.is_empty())
        .unwrap_or(name);
    let name = format!("{}Service", base);
    Delegate {
        module_name: default_module_name(&name),
        name,
        category: Category::Service,
        class_name: None,
    }
}

fn default_module_name(simple_name: &str) -> String {
    simple_name.replace('.', "_")
}

/// Give every artifact a file stem no other artifact in the same directory
/// uses. Stems that collide (case-insensitively) fall back to the qualified
/// name, e.g. `a_UserController`. Delegates follow their stub's stem.
fn assign_module_names(artifacts: &mut [ConversionArtifact]) {
    let mut counts: HashMap<(&'static str, String), usize> = HashMap::new();
    for artifact in artifacts.iter() {
        let key = (artifact.target_dir(), artifact.module_name.to_lowercase());
        *counts.entry(key).or_insert(0) += 1;
    }

    let mut stems: HashMap<String, String> = HashMap::new();
    for artifact in artifacts.iter_mut() {
        let key = (artifact.target_dir(), artifact.module_name.to_lowercase());
        if counts.get(&key).copied().unwrap_or(0) > 1 {
            artifact.module_name = artifact.class_name.replace('.', "_");
            tracing::debug!(
                class = %artifact.class_name,
                module = %artifact.module_name,
                "Disambiguated artifact file name"
            );
        }
        stems.insert(artifact.class_name.clone(), artifact.module_name.clone());
    }

    for artifact in artifacts.iter_mut() {
        if let Some(delegate) = artifact.delegate.as_mut() {
            let stem = delegate.class_name.as_ref().and_then(|fqn| stems.get(fqn));
            if let Some(stem) = stem {
                delegate.module_name = stem.clone();
            }
        }
    }
}

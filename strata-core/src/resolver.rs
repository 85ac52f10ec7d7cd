//! Category and dependency resolution.
//!
//! Classification is total: every class gets exactly one category, with an
//! explicit framework annotation beating a name suffix, and `Other` as the
//! default. Dependency inference runs once over the complete class set, so
//! forward references between files resolve regardless of parse order.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::parser::AnnotationRef;
use crate::types::{Category, ClassInfo, DependencyEdge};

static TYPE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z_$][\w$]*(?:\.[A-Za-z_$][\w$]*)*").unwrap());

/// Names that appear in declared types but never name a class.
const NON_CLASS_TYPES: &[&str] = &[
    "void", "boolean", "byte", "char", "short", "int", "long", "float", "double", "var",
    "extends", "super", "final",
];

/// Classify a class by annotation, then by name suffix.
pub fn classify(class: &ClassInfo) -> Category {
    category_from_annotations(&class.annotations)
        .or_else(|| category_from_name(class.simple_name()))
        .unwrap_or(Category::Other)
}

/// Category implied by a Spring/JPA stereotype annotation.
pub fn category_from_annotations(annotations: &[String]) -> Option<Category> {
    annotations
        .iter()
        .filter_map(|raw| AnnotationRef::parse(raw))
        .find_map(|annotation| match annotation.name.as_str() {
            "RestController" | "Controller" => Some(Category::Controller),
            "Service" => Some(Category::Service),
            "Repository" | "Mapper" => Some(Category::Dao),
            "Entity" | "Table" | "Document" | "Embeddable" | "MappedSuperclass" => {
                Some(Category::Entity)
            }
            _ => None,
        })
}

/// Category implied by a conventional class-name suffix.
///
/// A trailing `Impl` is ignored, so `OrderServiceImpl` reads as a service.
pub fn category_from_name(name: &str) -> Option<Category> {
    let base = name.strip_suffix("Impl").filter(|b| !b.is_empty()).unwrap_or(name);
    let lower = base.to_ascii_lowercase();
    if lower.ends_with("controller") {
        Some(Category::Controller)
    } else if lower.ends_with("service") {
        Some(Category::Service)
    } else if lower.ends_with("dao") || lower.ends_with("repository") {
        Some(Category::Dao)
    } else {
        None
    }
}

/// Class-like names referenced by a declared type string.
///
/// `Map<String, List<com.acme.Order>>` yields `Map`, `String`, `List`,
/// `com.acme.Order`. Primitives and wildcard keywords are dropped.
pub fn referenced_type_names(declared_type: &str) -> Vec<&str> {
    TYPE_NAME
        .find_iter(declared_type)
        .map(|m| m.as_str())
        .filter(|name| !NON_CLASS_TYPES.contains(name))
        .collect()
}

/// Result of the dependency pass.
#[derive(Clone, Debug, Default)]
pub struct Resolution {
    pub edges: BTreeSet<DependencyEdge>,
    /// References to types outside the graph, by simple name.
    pub external_usage: BTreeMap<String, usize>,
}

/// Lookup from simple name to the qualified names that share it.
struct TypeIndex<'a> {
    by_simple: HashMap<&'a str, Vec<&'a str>>,
    qualified: BTreeSet<&'a str>,
}

impl<'a> TypeIndex<'a> {
    fn build(classes: &'a BTreeMap<String, ClassInfo>) -> Self {
        let mut by_simple: HashMap<&str, Vec<&str>> = HashMap::new();
        for (fqn, class) in classes {
            by_simple.entry(class.simple_name()).or_default().push(fqn.as_str());
        }
        Self {
            by_simple,
            qualified: classes.keys().map(String::as_str).collect(),
        }
    }

    /// Resolve a referenced name as seen from `from`.
    ///
    /// Qualified names must match exactly. Simple names that are shared by
    /// several classes prefer the referencing class's package, then an
    /// explicit import, then a wildcard import, then the first by name.
    fn resolve(&self, name: &str, from: &ClassInfo) -> Option<&'a str> {
        if !name.contains('.') {
            return self.resolve_simple(name, from);
        }
        if let Some(hit) = self.qualified.get(name) {
            return Some(*hit);
        }
        // `Outer.Inner` written from outside, known to us as `pkg.Outer.Inner`
        let tail = name.rsplit('.').next().unwrap_or(name);
        let suffix = format!(".{}", name);
        let candidates = self.by_simple.get(tail)?;
        if let Some(hit) = candidates.iter().find(|fqn| fqn.ends_with(&suffix)) {
            return Some(*hit);
        }
        let package_qualified = name
            .chars()
            .next()
            .map(|c| c.is_ascii_lowercase())
            .unwrap_or(false);
        if package_qualified {
            None
        } else {
            self.resolve_simple(tail, from)
        }
    }

    fn resolve_simple(&self, simple: &str, from: &ClassInfo) -> Option<&'a str> {
        let candidates = self.by_simple.get(simple)?;
        if candidates.len() == 1 {
            return Some(candidates[0]);
        }

        let package = from.package.as_deref().unwrap_or("");
        let owner_of = |fqn: &str| -> String {
            fqn.strip_suffix(simple)
                .unwrap_or(fqn)
                .trim_end_matches('.')
                .to_string()
        };

        let same_package = candidates.iter().find(|fqn| owner_of(fqn) == package);
        let imported = || {
            candidates
                .iter()
                .find(|fqn| from.imports.iter().any(|i| i.as_str() == **fqn))
        };
        let wildcard = || {
            candidates.iter().find(|fqn| {
                from.imports.iter().any(|i| {
                    i.strip_suffix(".*")
                        .map(|pkg| owner_of(fqn) == pkg)
                        .unwrap_or(false)
                })
            })
        };

        same_package
            .or_else(imported)
            .or_else(wildcard)
            .or_else(|| candidates.iter().min())
            .copied()
    }
}

/// Compute dependency edges over the complete class set.
///
/// An edge `(A, B)` is added when a field, parameter or return type of `A`
/// names class `B` of the same set. Self references are dropped; the edge
/// set never holds the same `(from, to)` pair twice.
pub fn resolve_dependencies(classes: &BTreeMap<String, ClassInfo>) -> Resolution {
    let index = TypeIndex::build(classes);
    let mut resolution = Resolution::default();

    for (fqn, class) in classes {
        for declared in class.signature_types() {
            for name in referenced_type_names(declared) {
                match index.resolve(name, class) {
                    Some(target) if target != fqn.as_str() => {
                        resolution.edges.insert(DependencyEdge::new(fqn.as_str(), target));
                    }
                    Some(_) => {}
                    None if is_type_variable(name) => {}
                    None => {
                        let simple = name.rsplit('.').next().unwrap_or(name);
                        *resolution.external_usage.entry(simple.to_string()).or_insert(0) += 1;
                    }
                }
            }
        }
    }

    resolution
}

/// `T`, `E`, `K`: generic parameters rather than real types.
fn is_type_variable(name: &str) -> bool {
    name.len() == 1 && name.chars().all(|c| c.is_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FieldInfo, MethodInfo, ParameterInfo};

    fn class(pkg: &str, name: &str) -> ClassInfo {
        ClassInfo {
            name: name.to_string(),
            package: Some(pkg.to_string()),
            path: format!("{}.java", name),
            ..Default::default()
        }
    }

    fn with_field(mut c: ClassInfo, ty: &str) -> ClassInfo {
        c.fields.push(FieldInfo {
            name: "f".to_string(),
            declared_type: ty.to_string(),
            ..Default::default()
        });
        c
    }

    fn index(classes: Vec<ClassInfo>) -> BTreeMap<String, ClassInfo> {
        classes.into_iter().map(|c| (c.qualified_name(), c)).collect()
    }

    #[test]
    fn test_name_suffix_classification() {
        assert_eq!(classify(&class("a", "OrderDAO")), Category::Dao);
        assert_eq!(classify(&class("a", "OrderDao")), Category::Dao);
        assert_eq!(classify(&class("a", "OrderRepository")), Category::Dao);
        assert_eq!(classify(&class("a", "CategoryController")), Category::Controller);
        assert_eq!(classify(&class("a", "BillingService")), Category::Service);
        assert_eq!(classify(&class("a", "BillingServiceImpl")), Category::Service);
        assert_eq!(classify(&class("a", "Helper")), Category::Other);
        assert_eq!(classify(&class("a", "Impl")), Category::Other);
    }

    #[test]
    fn test_annotation_beats_name() {
        let mut c = class("a", "OrderService");
        c.annotations.push("@RestController".to_string());
        assert_eq!(classify(&c), Category::Controller);

        let mut e = class("a", "Order");
        e.annotations.push("@Entity".to_string());
        e.annotations.push("@Table(name = \"orders\")".to_string());
        assert_eq!(classify(&e), Category::Entity);

        let mut r = class("a", "Orders");
        r.annotations.push("@org.springframework.stereotype.Repository".to_string());
        assert_eq!(classify(&r), Category::Dao);
    }

    #[test]
    fn test_referenced_type_names() {
        assert_eq!(
            referenced_type_names("Map<String, List<com.acme.Order>>"),
            vec!["Map", "String", "List", "com.acme.Order"]
        );
        assert_eq!(referenced_type_names("int[]"), Vec::<&str>::new());
        assert_eq!(referenced_type_names("List<? extends Item>"), vec!["List", "Item"]);
    }

    #[test]
    fn test_edges_from_fields_params_and_returns() {
        let mut service = with_field(class("shop", "OrderService"), "OrderDAO");
        service.methods.push(MethodInfo {
            name: "find".to_string(),
            return_type: "Optional<Order>".to_string(),
            parameters: vec![ParameterInfo {
                name: "customer".to_string(),
                declared_type: "Customer".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        });
        let classes = index(vec![
            service,
            class("shop", "OrderDAO"),
            class("shop", "Order"),
            class("shop", "Customer"),
        ]);

        let resolution = resolve_dependencies(&classes);
        let edges: Vec<_> = resolution
            .edges
            .iter()
            .map(|e| (e.from.as_str(), e.to.as_str()))
            .collect();
        assert_eq!(
            edges,
            vec![
                ("shop.OrderService", "shop.Customer"),
                ("shop.OrderService", "shop.Order"),
                ("shop.OrderService", "shop.OrderDAO"),
            ]
        );
        assert_eq!(resolution.external_usage.get("Optional"), Some(&1));
    }

    #[test]
    fn test_self_reference_is_not_an_edge() {
        let node = with_field(class("tree", "Node"), "List<Node>");
        let resolution = resolve_dependencies(&index(vec![node]));
        assert!(resolution.edges.is_empty());
        assert_eq!(resolution.external_usage.get("List"), Some(&1));
    }

    #[test]
    fn test_same_package_wins_for_shared_simple_names() {
        let user = with_field(class("billing", "Invoice"), "Account");
        let classes = index(vec![
            user,
            class("billing", "Account"),
            class("crm", "Account"),
        ]);
        let resolution = resolve_dependencies(&classes);
        assert!(resolution
            .edges
            .contains(&DependencyEdge::new("billing.Invoice", "billing.Account")));
        assert_eq!(resolution.edges.len(), 1);
    }

    #[test]
    fn test_explicit_import_disambiguates() {
        let mut user = with_field(class("web", "AccountController"), "Account");
        user.imports.push("crm.Account".to_string());
        let classes = index(vec![
            user,
            class("billing", "Account"),
            class("crm", "Account"),
        ]);
        let resolution = resolve_dependencies(&classes);
        assert!(resolution
            .edges
            .contains(&DependencyEdge::new("web.AccountController", "crm.Account")));
    }

    #[test]
    fn test_type_variables_are_ignored() {
        let generic = with_field(class("a", "Box"), "T");
        let resolution = resolve_dependencies(&index(vec![generic]));
        assert!(resolution.external_usage.is_empty());
    }
}

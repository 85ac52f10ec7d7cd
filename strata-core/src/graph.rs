//! Knowledge graph powered by petgraph.
//!
//! Construction happens in two steps:
//!
//! ```text
//! workers --merge()--> KnowledgeGraphBuilder --finalize()--> KnowledgeGraph
//! ```
//!
//! The builder accepts concurrent, order-independent merges keyed by
//! `(file path, class name)`. Finalizing classifies every class, resolves
//! dependency edges over the complete class set and loads them into an
//! in-memory petgraph `DiGraph` for traversal queries. The finalized graph
//! is immutable.

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

use crate::resolver;
use crate::types::{Category, ClassInfo, DependencyEdge};

/// Merge key: the declaring file and the class name within it.
pub type ClassKey = (String, String);

/// Accumulates parsed classes before resolution.
#[derive(Debug, Default)]
pub struct KnowledgeGraphBuilder {
    classes: Mutex<BTreeMap<ClassKey, ClassInfo>>,
}

impl KnowledgeGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a class on `(path, name)`.
    ///
    /// Safe to call from several workers at once. Merging the same class
    /// twice leaves one entry.
    pub fn merge(&self, class: ClassInfo) {
        let key = (class.path.clone(), class.name.clone());
        let mut classes = match self.classes.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Knowledge graph mutex was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        classes.insert(key, class);
    }

    /// Merge every class of one source unit.
    pub fn merge_all(&self, classes: impl IntoIterator<Item = ClassInfo>) {
        for class in classes {
            self.merge(class);
        }
    }

    pub fn len(&self) -> usize {
        match self.classes.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Classify, resolve dependencies and freeze the graph.
    pub fn finalize(self) -> KnowledgeGraph {
        let entries = match self.classes.into_inner() {
            Ok(entries) => entries,
            Err(poisoned) => {
                tracing::warn!("Knowledge graph mutex was poisoned, recovering");
                poisoned.into_inner()
            }
        };

        let mut classes: BTreeMap<String, ClassInfo> = BTreeMap::new();
        for (_, mut class) in entries {
            class.category = resolver::classify(&class);
            let fqn = class.qualified_name();
            if let Some(existing) = classes.get(&fqn) {
                tracing::warn!(
                    class = %fqn,
                    kept = %existing.path,
                    ignored = %class.path,
                    "Class declared in more than one file"
                );
                continue;
            }
            classes.insert(fqn, class);
        }

        let resolution = resolver::resolve_dependencies(&classes);
        KnowledgeGraph::new(classes, resolution.edges, resolution.external_usage)
    }
}

/// The finalized, read-only knowledge graph.
#[derive(Debug, Clone)]
pub struct KnowledgeGraph {
    classes: BTreeMap<String, ClassInfo>,
    edges: BTreeSet<DependencyEdge>,
    external_usage: BTreeMap<String, usize>,
    graph: DiGraph<String, ()>,
    node_map: HashMap<String, NodeIndex>,
}

impl KnowledgeGraph {
    /// Build a graph from resolved parts.
    ///
    /// Edges whose endpoints are not in `classes` are dropped.
    pub fn new(
        classes: BTreeMap<String, ClassInfo>,
        edges: BTreeSet<DependencyEdge>,
        external_usage: BTreeMap<String, usize>,
    ) -> Self {
        let mut graph = DiGraph::new();
        let mut node_map = HashMap::with_capacity(classes.len());

        for fqn in classes.keys() {
            let idx = graph.add_node(fqn.clone());
            node_map.insert(fqn.clone(), idx);
        }

        let edges: BTreeSet<DependencyEdge> = edges
            .into_iter()
            .filter(|e| node_map.contains_key(&e.from) && node_map.contains_key(&e.to))
            .collect();
        for edge in &edges {
            graph.add_edge(node_map[&edge.from], node_map[&edge.to], ());
        }

        Self {
            classes,
            edges,
            external_usage,
            graph,
            node_map,
        }
    }

    /// Classes keyed by qualified name.
    pub fn classes(&self) -> &BTreeMap<String, ClassInfo> {
        &self.classes
    }

    pub fn class(&self, fqn: &str) -> Option<&ClassInfo> {
        self.classes.get(fqn)
    }

    pub fn edges(&self) -> &BTreeSet<DependencyEdge> {
        &self.edges
    }

    /// References to library types, by simple name.
    pub fn external_type_usage(&self) -> &BTreeMap<String, usize> {
        &self.external_usage
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Classes of one category, in qualified-name order.
    pub fn by_category(&self, category: Category) -> impl Iterator<Item = &ClassInfo> {
        self.classes.values().filter(move |c| c.category == category)
    }

    pub fn category_counts(&self) -> BTreeMap<Category, usize> {
        let mut counts = BTreeMap::new();
        for class in self.classes.values() {
            *counts.entry(class.category).or_insert(0) += 1;
        }
        counts
    }

    /// Classes `fqn` references directly.
    pub fn dependencies_of(&self, fqn: &str) -> Vec<&str> {
        self.neighbors(fqn, Direction::Outgoing)
    }

    /// Classes that reference `fqn` directly.
    pub fn dependents_of(&self, fqn: &str) -> Vec<&str> {
        self.neighbors(fqn, Direction::Incoming)
    }

    /// Strongly connected components with more than one class.
    ///
    /// Uses Kosaraju's algorithm: O(V + E). Each cycle is sorted, and the
    /// list of cycles is sorted by first member.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let mut cycles: Vec<Vec<String>> = kosaraju_scc(&self.graph)
            .into_iter()
            .filter(|scc| scc.len() > 1)
            .map(|scc| {
                let mut members: Vec<String> =
                    scc.into_iter().map(|idx| self.graph[idx].clone()).collect();
                members.sort();
                members
            })
            .collect();
        cycles.sort();
        cycles
    }

    fn neighbors(&self, fqn: &str, direction: Direction) -> Vec<&str> {
        let Some(&idx) = self.node_map.get(fqn) else {
            return Vec::new();
        };
        let mut result: Vec<&str> = self
            .graph
            .neighbors_directed(idx, direction)
            .map(|n| self.graph[n].as_str())
            .collect();
        result.sort_unstable();
        result.dedup();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldInfo;
    use std::sync::Arc;

    fn class(path: &str, name: &str, field_types: &[&str]) -> ClassInfo {
        ClassInfo {
            name: name.to_string(),
            package: Some("shop".to_string()),
            path: path.to_string(),
            fields: field_types
                .iter()
                .enumerate()
                .map(|(i, ty)| FieldInfo {
                    name: format!("f{}", i),
                    declared_type: ty.to_string(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    fn create_test_graph() -> KnowledgeGraph {
        // A -> B -> C -> A (cycle), B -> D
        let builder = KnowledgeGraphBuilder::new();
        builder.merge(class("A.java", "A", &["B"]));
        builder.merge(class("B.java", "B", &["C", "D"]));
        builder.merge(class("C.java", "C", &["A"]));
        builder.merge(class("D.java", "D", &[]));
        builder.finalize()
    }

    #[test]
    fn test_merge_is_idempotent() {
        let builder = KnowledgeGraphBuilder::new();
        builder.merge(class("OrderService.java", "OrderService", &["OrderDAO"]));
        builder.merge(class("OrderDAO.java", "OrderDAO", &[]));
        builder.merge(class("OrderService.java", "OrderService", &["OrderDAO"]));
        assert_eq!(builder.len(), 2);

        let graph = builder.finalize();
        assert_eq!(graph.class_count(), 2);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_merge_overwrites_on_key() {
        let builder = KnowledgeGraphBuilder::new();
        builder.merge(class("A.java", "A", &[]));
        builder.merge(class("A.java", "A", &["B"]));
        builder.merge(class("B.java", "B", &[]));
        let graph = builder.finalize();
        assert_eq!(graph.dependencies_of("shop.A"), vec!["shop.B"]);
    }

    #[test]
    fn test_merge_order_does_not_matter() {
        let a = KnowledgeGraphBuilder::new();
        a.merge(class("X.java", "X", &["Y"]));
        a.merge(class("Y.java", "Y", &[]));
        let b = KnowledgeGraphBuilder::new();
        b.merge(class("Y.java", "Y", &[]));
        b.merge(class("X.java", "X", &["Y"]));

        let (a, b) = (a.finalize(), b.finalize());
        assert_eq!(a.edges(), b.edges());
        assert_eq!(a.classes(), b.classes());
    }

    #[test]
    fn test_concurrent_merges() {
        let builder = Arc::new(KnowledgeGraphBuilder::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let builder = Arc::clone(&builder);
                std::thread::spawn(move || {
                    for j in 0..25 {
                        let name = format!("C{}", (i * 25 + j) % 100);
                        builder.merge(class(&format!("{}.java", name), &name, &[]));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(builder.len(), 100);
    }

    #[test]
    fn test_finalize_classifies() {
        let builder = KnowledgeGraphBuilder::new();
        builder.merge(class("OrderDAO.java", "OrderDAO", &[]));
        builder.merge(class("Helper.java", "Helper", &[]));
        let graph = builder.finalize();
        assert_eq!(graph.class("shop.OrderDAO").unwrap().category, Category::Dao);
        assert_eq!(graph.class("shop.Helper").unwrap().category, Category::Other);
        assert_eq!(graph.category_counts().get(&Category::Dao), Some(&1));
    }

    #[test]
    fn test_cycle_detection() {
        let graph = create_test_graph();
        let cycles = graph.cycles();
        assert_eq!(cycles, vec![vec!["shop.A", "shop.B", "shop.C"]]);
    }

    #[test]
    fn test_no_cycles() {
        let builder = KnowledgeGraphBuilder::new();
        builder.merge(class("A.java", "A", &["B"]));
        builder.merge(class("B.java", "B", &[]));
        assert!(builder.finalize().cycles().is_empty());
    }

    #[test]
    fn test_dependencies_and_dependents() {
        let graph = create_test_graph();
        assert_eq!(graph.dependencies_of("shop.B"), vec!["shop.C", "shop.D"]);
        assert_eq!(graph.dependents_of("shop.D"), vec!["shop.B"]);
        assert!(graph.dependencies_of("shop.Missing").is_empty());
    }

    #[test]
    fn test_edges_to_unknown_classes_are_dropped() {
        let mut edges = BTreeSet::new();
        edges.insert(DependencyEdge::new("a.A", "a.Ghost"));
        let mut classes = BTreeMap::new();
        classes.insert(
            "a.A".to_string(),
            ClassInfo {
                name: "A".to_string(),
                package: Some("a".to_string()),
                ..Default::default()
            },
        );
        let graph = KnowledgeGraph::new(classes, edges, BTreeMap::new());
        assert_eq!(graph.edge_count(), 0);
    }
}

//! Graph documents: typed nodes and edges extracted from one text unit.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reference to a node by kind and identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeRef {
    pub kind: String,
    pub id: String,
}

impl NodeRef {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

impl std::fmt::Display for NodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}:{})", self.id, self.kind)
    }
}

/// A typed graph node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Node kind (becomes the store label).
    pub kind: String,
    /// Identifier, unique per kind (stored as the `id` property).
    pub id: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl Node {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn node_ref(&self) -> NodeRef {
        NodeRef::new(self.kind.clone(), self.id.clone())
    }
}

/// A typed, directed edge between two nodes of the same document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub kind: String,
    pub source: NodeRef,
    pub target: NodeRef,
}

impl Edge {
    pub fn new(kind: impl Into<String>, source: NodeRef, target: NodeRef) -> Self {
        Self {
            kind: kind.into(),
            source,
            target,
        }
    }
}

/// Nodes and edges produced from one source text unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    /// The text unit this document was extracted from.
    #[serde(default)]
    pub source: String,
}

impl GraphDocument {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            source: source.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn contains_node(&self, node: &NodeRef) -> bool {
        self.nodes
            .iter()
            .any(|n| n.kind == node.kind && n.id == node.id)
    }

    /// Edges whose source or target is not a node of this document.
    pub fn dangling_edges(&self) -> Vec<&Edge> {
        self.edges
            .iter()
            .filter(|e| !self.contains_node(&e.source) || !self.contains_node(&e.target))
            .collect()
    }
}

/// Closed set of permitted node or relationship kinds.
///
/// An empty list places no constraint on that category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowList {
    kinds: Vec<String>,
}

impl AllowList {
    pub fn new<I, S>(kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for k in kinds {
            let k = k.into().trim().to_string();
            if !k.is_empty() && !out.contains(&k) {
                out.push(k);
            }
        }
        Self { kinds: out }
    }

    /// Parse a comma-separated list (`"Person, Title"`).
    pub fn parse(list: &str) -> Self {
        Self::new(list.split(','))
    }

    pub fn is_unconstrained(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn kinds(&self) -> &[String] {
        &self.kinds
    }

    /// Canonical spelling of `kind` if it is allowed (case-insensitive).
    /// Unconstrained lists return the trimmed input.
    pub fn resolve(&self, kind: &str) -> Option<String> {
        let kind = kind.trim();
        if kind.is_empty() {
            return None;
        }
        if self.is_unconstrained() {
            return Some(kind.to_string());
        }
        self.kinds
            .iter()
            .find(|k| k.eq_ignore_ascii_case(kind))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list_resolves_case_insensitively() {
        let list = AllowList::parse("Person, Title ,Person");
        assert_eq!(list.kinds(), &["Person".to_string(), "Title".to_string()]);
        assert_eq!(list.resolve("person").as_deref(), Some("Person"));
        assert_eq!(list.resolve(" TITLE ").as_deref(), Some("Title"));
        assert_eq!(list.resolve("Group"), None);
    }

    #[test]
    fn empty_allow_list_is_unconstrained() {
        let list = AllowList::default();
        assert!(list.is_unconstrained());
        assert_eq!(list.resolve("Anything").as_deref(), Some("Anything"));
        assert_eq!(list.resolve("  "), None);
    }

    #[test]
    fn dangling_edges_are_reported() {
        let mut doc = GraphDocument::new("text");
        doc.nodes.push(Node::new("Person", "John"));
        doc.edges.push(Edge::new(
            "TITLE",
            NodeRef::new("Person", "John"),
            NodeRef::new("Title", "Director"),
        ));
        assert_eq!(doc.dangling_edges().len(), 1);
        doc.nodes.push(Node::new("Title", "Director"));
        assert!(doc.dangling_edges().is_empty());
    }
}

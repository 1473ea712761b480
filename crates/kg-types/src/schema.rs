//! Schema snapshot: labels, relationship types, and properties known to the store.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Property name -> property type name (e.g. `STRING`).
pub type PropertyTypes = BTreeMap<String, String>;

/// Observed `(:From)-[:TYPE]->(:To)` combination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationshipPattern {
    pub from: String,
    pub kind: String,
    pub to: String,
}

impl RelationshipPattern {
    pub fn new(from: impl Into<String>, kind: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            kind: kind.into(),
            to: to.into(),
        }
    }
}

/// Point-in-time description of the graph schema.
///
/// Replaced wholesale on every refresh; passed by reference to whoever needs it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    /// Node label -> property types.
    #[serde(default)]
    pub node_labels: BTreeMap<String, PropertyTypes>,
    /// Relationship type -> property types.
    #[serde(default)]
    pub relationship_types: BTreeMap<String, PropertyTypes>,
    #[serde(default)]
    pub relationships: BTreeSet<RelationshipPattern>,
}

impl SchemaSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.node_labels.is_empty() && self.relationship_types.is_empty()
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.node_labels.contains_key(label)
    }

    pub fn has_relationship_type(&self, kind: &str) -> bool {
        self.relationship_types.contains_key(kind)
    }

    /// Record a node label with its property types (merged into existing entries).
    pub fn add_label(&mut self, label: &str, properties: impl IntoIterator<Item = (String, String)>) {
        self.node_labels
            .entry(label.to_string())
            .or_default()
            .extend(properties);
    }

    /// Record a relationship type with its property types.
    pub fn add_relationship_type(
        &mut self,
        kind: &str,
        properties: impl IntoIterator<Item = (String, String)>,
    ) {
        self.relationship_types
            .entry(kind.to_string())
            .or_default()
            .extend(properties);
    }

    /// Render the schema as prompt text.
    pub fn text(&self) -> String {
        let mut out = String::from("Node properties are the following:\n");
        for (label, props) in &self.node_labels {
            out.push_str(&format!("{} {}\n", label, render_properties(props)));
        }
        out.push_str("Relationship properties are the following:\n");
        for (kind, props) in &self.relationship_types {
            if !props.is_empty() {
                out.push_str(&format!("{} {}\n", kind, render_properties(props)));
            }
        }
        out.push_str("The relationships are the following:\n");
        for rel in &self.relationships {
            out.push_str(&format!("(:{})-[:{}]->(:{})\n", rel.from, rel.kind, rel.to));
        }
        out
    }
}

impl std::fmt::Display for SchemaSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text())
    }
}

fn render_properties(props: &PropertyTypes) -> String {
    let parts: Vec<String> = props
        .iter()
        .map(|(name, ty)| format!("{}: {}", name, ty))
        .collect();
    format!("{{{}}}", parts.join(", "))
}

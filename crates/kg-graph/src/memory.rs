//! In-memory graph store evaluating a Cypher subset.

use crate::cypher::{
    self, Action, Comparison, Condition, Direction, Expr, NodePattern, PathPattern, RelPattern,
    ReturnItem, Statement,
};
use kg_types::{
    GraphDocument, GraphStore, GraphStoreError, NodeRef, Record, RelationshipPattern,
    SchemaSnapshot,
};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct StoredNode {
    label: String,
    /// Always contains `id`.
    properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
struct StoredEdge {
    kind: String,
    from: u64,
    to: u64,
}

#[derive(Debug, Default)]
struct GraphData {
    nodes: BTreeMap<u64, StoredNode>,
    edges: BTreeMap<u64, StoredEdge>,
    next_id: u64,
}

impl GraphData {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn find_node(&self, node: &NodeRef) -> Option<u64> {
        self.nodes
            .iter()
            .find(|(_, n)| {
                n.label == node.kind && n.properties.get("id").map(String::as_str) == Some(&node.id)
            })
            .map(|(key, _)| *key)
    }

    fn schema(&self) -> SchemaSnapshot {
        let mut schema = SchemaSnapshot::new();
        for node in self.nodes.values() {
            schema.add_label(
                &node.label,
                node.properties
                    .keys()
                    .map(|k| (k.clone(), "STRING".to_string())),
            );
        }
        for edge in self.edges.values() {
            schema.add_relationship_type(&edge.kind, []);
            if let (Some(from), Some(to)) = (self.nodes.get(&edge.from), self.nodes.get(&edge.to)) {
                schema.relationships.insert(RelationshipPattern::new(
                    from.label.clone(),
                    edge.kind.clone(),
                    to.label.clone(),
                ));
            }
        }
        schema
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Node(u64),
    Edge(u64),
}

type Bindings = HashMap<String, Bound>;

/// In-memory implementation of GraphStore.
///
/// Nodes merge on `(label, id)`, edges on `(type, from, to)`. Queries go through
/// [`cypher::parse`]; statements outside the supported subset fail with
/// [`GraphStoreError::Query`].
pub struct InMemoryGraphStore {
    data: Arc<RwLock<GraphData>>,
    /// Cached snapshot; replaced by `refresh_schema`.
    schema: Arc<RwLock<SchemaSnapshot>>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(GraphData::default())),
            schema: Arc::new(RwLock::new(SchemaSnapshot::new())),
        }
    }

    pub async fn node_count(&self) -> usize {
        self.data.read().await.nodes.len()
    }

    pub async fn edge_count(&self) -> usize {
        self.data.read().await.edges.len()
    }
}

impl Default for InMemoryGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn query(&self, cypher: &str) -> Result<Vec<Record>, GraphStoreError> {
        let stmt = cypher::parse(cypher).map_err(|e| GraphStoreError::Query(e.to_string()))?;
        match &stmt.action {
            Action::Return { .. } => {
                let data = self.data.read().await;
                evaluate_return(&data, &stmt)
            }
            Action::Delete { detach, variables } => {
                let mut data = self.data.write().await;
                let rows = match_all(&data, &stmt);
                delete_bound(&mut data, &rows, variables, *detach)?;
                Ok(Vec::new())
            }
        }
    }

    async fn add_graph_documents(
        &self,
        documents: &[GraphDocument],
    ) -> Result<(), GraphStoreError> {
        let mut data = self.data.write().await;
        for doc in documents {
            for node in &doc.nodes {
                match data.find_node(&node.node_ref()) {
                    Some(key) => {
                        if let Some(existing) = data.nodes.get_mut(&key) {
                            existing
                                .properties
                                .extend(node.properties.iter().map(|(k, v)| (k.clone(), v.clone())));
                        }
                    }
                    None => {
                        let mut properties = node.properties.clone();
                        properties.insert("id".to_string(), node.id.clone());
                        let key = data.allocate_id();
                        data.nodes.insert(
                            key,
                            StoredNode {
                                label: node.kind.clone(),
                                properties,
                            },
                        );
                    }
                }
            }
            for edge in &doc.edges {
                let from = data.find_node(&edge.source).ok_or_else(|| {
                    GraphStoreError::Other(format!("edge source not found: {}", edge.source))
                })?;
                let to = data.find_node(&edge.target).ok_or_else(|| {
                    GraphStoreError::Other(format!("edge target not found: {}", edge.target))
                })?;
                let exists = data
                    .edges
                    .values()
                    .any(|e| e.kind == edge.kind && e.from == from && e.to == to);
                if !exists {
                    let key = data.allocate_id();
                    data.edges.insert(
                        key,
                        StoredEdge {
                            kind: edge.kind.clone(),
                            from,
                            to,
                        },
                    );
                }
            }
        }
        Ok(())
    }

    async fn refresh_schema(&self) -> Result<SchemaSnapshot, GraphStoreError> {
        let snapshot = self.data.read().await.schema();
        *self.schema.write().await = snapshot.clone();
        Ok(snapshot)
    }

    async fn schema(&self) -> SchemaSnapshot {
        self.schema.read().await.clone()
    }
}

// ============================================================================
// Matching
// ============================================================================

fn match_all(data: &GraphData, stmt: &Statement) -> Vec<Bindings> {
    let mut rows = vec![Bindings::new()];
    for path in &stmt.patterns {
        rows = rows
            .iter()
            .flat_map(|row| match_path(data, path, row))
            .collect();
    }
    rows.retain(|row| stmt.conditions.iter().all(|c| condition_holds(data, row, c)));
    rows
}

fn match_path(data: &GraphData, path: &PathPattern, row: &Bindings) -> Vec<Bindings> {
    let mut out = Vec::new();
    for key in candidates(data, &path.start, row) {
        let mut next = row.clone();
        if let Some(v) = &path.start.variable {
            next.insert(v.clone(), Bound::Node(key));
        }
        extend_hops(data, &path.hops, key, next, &mut HashSet::new(), &mut out);
    }
    out
}

fn extend_hops(
    data: &GraphData,
    hops: &[(RelPattern, NodePattern)],
    current: u64,
    row: Bindings,
    used_edges: &mut HashSet<u64>,
    out: &mut Vec<Bindings>,
) {
    let Some(((rel, node), rest)) = hops.split_first() else {
        out.push(row);
        return;
    };
    for (edge_key, edge) in &data.edges {
        if used_edges.contains(edge_key) {
            continue;
        }
        if !rel.kinds.is_empty() && !rel.kinds.iter().any(|k| *k == edge.kind) {
            continue;
        }
        let neighbor = match rel.direction {
            Direction::Outgoing if edge.from == current => edge.to,
            Direction::Incoming if edge.to == current => edge.from,
            Direction::Either if edge.from == current => edge.to,
            Direction::Either if edge.to == current => edge.from,
            _ => continue,
        };
        if let Some(v) = &rel.variable {
            match row.get(v) {
                Some(Bound::Edge(k)) if k == edge_key => {}
                Some(_) => continue,
                None => {}
            }
        }
        if !node_matches(data, node, neighbor, &row) {
            continue;
        }
        let mut next = row.clone();
        if let Some(v) = &rel.variable {
            next.insert(v.clone(), Bound::Edge(*edge_key));
        }
        if let Some(v) = &node.variable {
            next.insert(v.clone(), Bound::Node(neighbor));
        }
        used_edges.insert(*edge_key);
        extend_hops(data, rest, neighbor, next, used_edges, out);
        used_edges.remove(edge_key);
    }
}

fn candidates(data: &GraphData, pattern: &NodePattern, row: &Bindings) -> Vec<u64> {
    data.nodes
        .keys()
        .copied()
        .filter(|key| node_matches(data, pattern, *key, row))
        .collect()
}

fn node_matches(data: &GraphData, pattern: &NodePattern, key: u64, row: &Bindings) -> bool {
    if let Some(v) = &pattern.variable {
        match row.get(v) {
            Some(Bound::Node(bound)) if *bound != key => return false,
            Some(Bound::Edge(_)) => return false,
            _ => {}
        }
    }
    let Some(node) = data.nodes.get(&key) else {
        return false;
    };
    if let Some(label) = &pattern.label {
        if node.label != *label {
            return false;
        }
    }
    pattern.properties.iter().all(|(k, v)| {
        node.properties
            .get(k)
            .is_some_and(|stored| literal_eq(stored, v))
    })
}

fn literal_eq(stored: &str, literal: &Value) -> bool {
    match literal {
        Value::String(s) => stored == s,
        Value::Null => false,
        other => stored == other.to_string(),
    }
}

fn condition_holds(data: &GraphData, row: &Bindings, cond: &Condition) -> bool {
    let stored = match row.get(&cond.variable) {
        Some(Bound::Node(key)) => data
            .nodes
            .get(key)
            .and_then(|n| n.properties.get(&cond.property)),
        _ => None,
    };
    match (cond.op, stored) {
        (Comparison::Eq, Some(s)) => literal_eq(s, &cond.value),
        (Comparison::Neq, Some(s)) => !literal_eq(s, &cond.value),
        (Comparison::Contains, Some(s)) => match &cond.value {
            Value::String(needle) => s.contains(needle.as_str()),
            _ => false,
        },
        (_, None) => false,
    }
}

// ============================================================================
// Projection
// ============================================================================

fn evaluate_return(data: &GraphData, stmt: &Statement) -> Result<Vec<Record>, GraphStoreError> {
    let Action::Return {
        distinct,
        items,
        limit,
    } = &stmt.action
    else {
        return Ok(Vec::new());
    };
    let rows = match_all(data, stmt);

    let mut records = if items.iter().any(|i| i.expr.is_aggregate()) {
        aggregate(data, &rows, items)?
    } else {
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut record = Record::new();
            for item in items {
                record.insert(item.column.clone(), project(data, row, &item.expr)?);
            }
            out.push(record);
        }
        out
    };

    if *distinct {
        let mut seen = HashSet::new();
        records.retain(|r| seen.insert(Value::Object(r.clone()).to_string()));
    }
    if let Some(n) = limit {
        records.truncate(*n);
    }
    Ok(records)
}

/// Group rows by the non-aggregate items, in first-seen order.
fn aggregate(
    data: &GraphData,
    rows: &[Bindings],
    items: &[ReturnItem],
) -> Result<Vec<Record>, GraphStoreError> {
    let keys: Vec<&ReturnItem> = items.iter().filter(|i| !i.expr.is_aggregate()).collect();
    let mut groups: Vec<(Vec<Value>, usize)> = Vec::new();
    for row in rows {
        let mut key = Vec::with_capacity(keys.len());
        for item in &keys {
            key.push(project(data, row, &item.expr)?);
        }
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, count)) => *count += 1,
            None => groups.push((key, 1)),
        }
    }
    if groups.is_empty() && keys.is_empty() {
        groups.push((Vec::new(), 0));
    }

    let mut out = Vec::with_capacity(groups.len());
    for (key, count) in groups {
        let mut key_values = key.into_iter();
        let mut record = Record::new();
        for item in items {
            let value = if item.expr.is_aggregate() {
                Value::from(count)
            } else {
                key_values.next().unwrap_or(Value::Null)
            };
            record.insert(item.column.clone(), value);
        }
        out.push(record);
    }
    Ok(out)
}

fn project(data: &GraphData, row: &Bindings, expr: &Expr) -> Result<Value, GraphStoreError> {
    let bound = |v: &str| {
        row.get(v)
            .copied()
            .ok_or_else(|| GraphStoreError::Query(format!("variable `{}` not defined", v)))
    };
    let node = |key: u64| {
        data.nodes
            .get(&key)
            .ok_or_else(|| GraphStoreError::Other(format!("dangling node reference {}", key)))
    };
    let edge = |key: u64| {
        data.edges
            .get(&key)
            .ok_or_else(|| GraphStoreError::Other(format!("dangling edge reference {}", key)))
    };

    Ok(match expr {
        Expr::Property(v, prop) => match bound(v)? {
            Bound::Node(key) => node(key)?
                .properties
                .get(prop)
                .map(|s| Value::String(s.clone()))
                .unwrap_or(Value::Null),
            Bound::Edge(_) => Value::Null,
        },
        Expr::Variable(v) | Expr::Properties(v) => match bound(v)? {
            Bound::Node(key) => properties_value(&node(key)?.properties),
            Bound::Edge(_) => Value::Object(serde_json::Map::new()),
        },
        Expr::Labels(v) => match bound(v)? {
            Bound::Node(key) => Value::Array(vec![Value::String(node(key)?.label.clone())]),
            Bound::Edge(_) => {
                return Err(GraphStoreError::Query(format!(
                    "labels() expects a node, `{}` is a relationship",
                    v
                )))
            }
        },
        Expr::Type(v) => match bound(v)? {
            Bound::Edge(key) => Value::String(edge(key)?.kind.clone()),
            Bound::Node(_) => {
                return Err(GraphStoreError::Query(format!(
                    "type() expects a relationship, `{}` is a node",
                    v
                )))
            }
        },
        Expr::Keys(v) => match bound(v)? {
            Bound::Node(key) => Value::Array(
                node(key)?
                    .properties
                    .keys()
                    .map(|k| Value::String(k.clone()))
                    .collect(),
            ),
            Bound::Edge(_) => Value::Array(Vec::new()),
        },
        Expr::Count(_) => {
            return Err(GraphStoreError::Other(
                "aggregate evaluated per row".to_string(),
            ))
        }
    })
}

fn properties_value(props: &BTreeMap<String, String>) -> Value {
    Value::Object(
        props
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

fn delete_bound(
    data: &mut GraphData,
    rows: &[Bindings],
    variables: &[String],
    detach: bool,
) -> Result<(), GraphStoreError> {
    let mut nodes = HashSet::new();
    let mut edges = HashSet::new();
    for row in rows {
        for v in variables {
            match row.get(v) {
                Some(Bound::Node(key)) => {
                    nodes.insert(*key);
                }
                Some(Bound::Edge(key)) => {
                    edges.insert(*key);
                }
                None => {}
            }
        }
    }
    let attached: Vec<u64> = data
        .edges
        .iter()
        .filter(|(_, e)| nodes.contains(&e.from) || nodes.contains(&e.to))
        .map(|(key, _)| *key)
        .collect();
    if !detach && attached.iter().any(|key| !edges.contains(key)) {
        return Err(GraphStoreError::Query(
            "cannot delete node with relationships; use DETACH DELETE".to_string(),
        ));
    }
    for key in attached.into_iter().chain(edges) {
        data.edges.remove(&key);
    }
    for key in nodes {
        data.nodes.remove(&key);
    }
    Ok(())
}

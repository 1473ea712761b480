//! Bolt-protocol graph store (Memgraph, Neo4j) backed by `neo4rs`.

use kg_types::{
    Edge, GraphDocument, GraphStore, GraphStoreError, Record, RelationshipPattern, SchemaSnapshot,
};
use neo4rs::{query, Graph, Query};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

const NODE_PROPERTIES_QUERY: &str =
    "MATCH (n) UNWIND labels(n) AS label UNWIND keys(n) AS key RETURN DISTINCT label, key";
const RELATIONSHIP_TYPES_QUERY: &str = "MATCH ()-[r]->() RETURN DISTINCT type(r) AS kind";
const RELATIONSHIP_PATTERNS_QUERY: &str = "MATCH (a)-[r]->(b) UNWIND labels(a) AS source \
     UNWIND labels(b) AS target RETURN DISTINCT source, type(r) AS kind, target";

/// GraphStore over a Bolt connection.
pub struct BoltGraphStore {
    graph: Arc<Graph>,
    schema: Arc<RwLock<SchemaSnapshot>>,
}

impl BoltGraphStore {
    /// Connect and load the initial schema snapshot.
    pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Self, GraphStoreError> {
        let graph = Graph::new(uri, user, password)
            .await
            .map_err(|e| GraphStoreError::Connection(format!("{}: {}", uri, e)))?;
        let store = Self {
            graph: Arc::new(graph),
            schema: Arc::new(RwLock::new(SchemaSnapshot::new())),
        };
        store.refresh_schema().await?;
        tracing::info!(uri = %uri, "connected to graph store");
        Ok(store)
    }

    /// Connect using GRAPH_URI, GRAPH_USERNAME and GRAPH_PASSWORD.
    pub async fn from_env() -> Result<Self, GraphStoreError> {
        let uri =
            std::env::var("GRAPH_URI").unwrap_or_else(|_| "bolt://localhost:7687".to_string());
        let user = std::env::var("GRAPH_USERNAME").unwrap_or_default();
        let password = std::env::var("GRAPH_PASSWORD").unwrap_or_default();
        Self::connect(&uri, &user, &password).await
    }

    async fn rows(&self, q: Query) -> Result<Vec<neo4rs::Row>, GraphStoreError> {
        let mut result = self
            .graph
            .execute(q)
            .await
            .map_err(|e| GraphStoreError::Query(e.to_string()))?;
        let mut rows = Vec::new();
        while let Some(row) = result
            .next()
            .await
            .map_err(|e| GraphStoreError::Query(e.to_string()))?
        {
            rows.push(row);
        }
        Ok(rows)
    }

    async fn run(&self, q: Query) -> Result<(), GraphStoreError> {
        self.graph
            .run(q)
            .await
            .map_err(|e| GraphStoreError::Query(e.to_string()))
    }
}

/// Backtick-quote a label or relationship type.
fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn merge_node_statement(kind: &str) -> String {
    format!(
        "MERGE (n:{} {{id: $id}}) SET n += $props",
        quote_identifier(kind)
    )
}

fn merge_edge_statement(edge: &Edge) -> String {
    format!(
        "MATCH (a:{} {{id: $source}}), (b:{} {{id: $target}}) MERGE (a)-[:{}]->(b)",
        quote_identifier(&edge.source.kind),
        quote_identifier(&edge.target.kind),
        quote_identifier(&edge.kind)
    )
}

fn column(row: &neo4rs::Row, name: &str) -> Result<String, GraphStoreError> {
    row.get::<String>(name)
        .map_err(|e| GraphStoreError::Other(format!("schema column {}: {}", name, e)))
}

#[async_trait::async_trait]
impl GraphStore for BoltGraphStore {
    async fn query(&self, cypher: &str) -> Result<Vec<Record>, GraphStoreError> {
        let rows = self.rows(query(cypher)).await?;
        rows.iter()
            .map(|row| {
                row.to::<Record>()
                    .map_err(|e| GraphStoreError::Query(format!("decode row: {}", e)))
            })
            .collect()
    }

    async fn add_graph_documents(
        &self,
        documents: &[GraphDocument],
    ) -> Result<(), GraphStoreError> {
        for doc in documents {
            for node in &doc.nodes {
                let props: HashMap<String, String> = node
                    .properties
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                let q = query(&merge_node_statement(&node.kind))
                    .param("id", node.id.clone())
                    .param("props", props);
                self.run(q).await?;
            }
            for edge in &doc.edges {
                let q = query(&merge_edge_statement(edge))
                    .param("source", edge.source.id.clone())
                    .param("target", edge.target.id.clone());
                self.run(q).await?;
            }
        }
        Ok(())
    }

    async fn refresh_schema(&self) -> Result<SchemaSnapshot, GraphStoreError> {
        let mut snapshot = SchemaSnapshot::new();
        for row in self.rows(query(NODE_PROPERTIES_QUERY)).await? {
            let label = column(&row, "label")?;
            let key = column(&row, "key")?;
            snapshot.add_label(&label, [(key, "STRING".to_string())]);
        }
        for row in self.rows(query(RELATIONSHIP_TYPES_QUERY)).await? {
            snapshot.add_relationship_type(&column(&row, "kind")?, []);
        }
        for row in self.rows(query(RELATIONSHIP_PATTERNS_QUERY)).await? {
            snapshot.relationships.insert(RelationshipPattern::new(
                column(&row, "source")?,
                column(&row, "kind")?,
                column(&row, "target")?,
            ));
        }
        *self.schema.write().await = snapshot.clone();
        Ok(snapshot)
    }

    async fn schema(&self) -> SchemaSnapshot {
        self.schema.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_backtick_quoted() {
        assert_eq!(quote_identifier("Person"), "`Person`");
        assert_eq!(quote_identifier("we`ird"), "`we``ird`");
    }

    #[test]
    fn node_writes_merge_on_label_and_id() {
        assert_eq!(
            merge_node_statement("Title"),
            "MERGE (n:`Title` {id: $id}) SET n += $props"
        );
    }

    #[test]
    fn edge_writes_match_both_endpoints_then_merge() {
        let edge = Edge::new(
            "TITLE",
            kg_types::NodeRef::new("Person", "John"),
            kg_types::NodeRef::new("Title", "Director"),
        );
        assert_eq!(
            merge_edge_statement(&edge),
            "MATCH (a:`Person` {id: $source}), (b:`Title` {id: $target}) MERGE (a)-[:`TITLE`]->(b)"
        );
    }
}

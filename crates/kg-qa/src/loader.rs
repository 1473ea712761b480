//! Graph loading: rebuild the store from extracted documents.

use kg_types::{GraphDocument, GraphStore, GraphStoreError, LoadReport};
use std::sync::Arc;

/// Removes every node and relationship.
pub const DELETE_ALL_QUERY: &str = "MATCH (n) DETACH DELETE n";

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to clear graph: {0}")]
    Clear(#[source] GraphStoreError),
    #[error("failed to write graph documents: {0}")]
    Write(#[source] GraphStoreError),
    #[error("failed to refresh schema: {0}")]
    Schema(#[source] GraphStoreError),
}

/// Replaces the store's contents with a set of documents.
pub struct GraphLoader {
    store: Arc<dyn GraphStore>,
}

impl GraphLoader {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Delete everything, write `documents`, refresh the schema. Stops at the first failing step.
    pub async fn load(&self, documents: &[GraphDocument]) -> Result<LoadReport, LoadError> {
        self.store
            .query(DELETE_ALL_QUERY)
            .await
            .map_err(LoadError::Clear)?;
        self.store
            .add_graph_documents(documents)
            .await
            .map_err(LoadError::Write)?;
        let schema = self
            .store
            .refresh_schema()
            .await
            .map_err(LoadError::Schema)?;

        let report = LoadReport {
            nodes_written: documents.iter().map(|d| d.nodes.len()).sum(),
            edges_written: documents.iter().map(|d| d.edges.len()).sum(),
            schema,
        };
        tracing::info!(
            documents = documents.len(),
            nodes = report.nodes_written,
            edges = report.edges_written,
            labels = report.schema.node_labels.len(),
            "graph rebuilt"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kg_graph::InMemoryGraphStore;
    use kg_types::{Edge, Node, NodeRef};

    fn doc(person: &str, title: &str) -> GraphDocument {
        let mut doc = GraphDocument::new("text");
        doc.nodes.push(Node::new("Person", person));
        doc.nodes.push(Node::new("Title", title));
        doc.edges.push(Edge::new(
            "TITLE",
            NodeRef::new("Person", person),
            NodeRef::new("Title", title),
        ));
        doc
    }

    #[tokio::test]
    async fn second_load_replaces_first() {
        let store = Arc::new(InMemoryGraphStore::new());
        let loader = GraphLoader::new(store.clone());

        loader.load(&[doc("John", "Director")]).await.unwrap();
        assert_eq!(store.node_count().await, 2);

        let report = loader.load(&[doc("Jane", "CMO")]).await.unwrap();
        assert_eq!(store.node_count().await, 2);
        assert_eq!(store.edge_count().await, 1);
        assert_eq!(report.nodes_written, 2);
        assert_eq!(report.edges_written, 1);

        let rows = store.query("MATCH (p:Person) RETURN p.id").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["p.id"], "Jane");
    }

    #[tokio::test]
    async fn load_refreshes_schema() {
        let store = Arc::new(InMemoryGraphStore::new());
        let loader = GraphLoader::new(store.clone());
        assert!(store.schema().await.is_empty());

        let report = loader.load(&[doc("John", "Director")]).await.unwrap();
        let schema = store.schema().await;
        assert_eq!(schema, report.schema);
        assert!(schema.has_label("Person"));
        assert!(schema.has_relationship_type("TITLE"));
    }

    #[tokio::test]
    async fn loading_nothing_empties_the_graph() {
        let store = Arc::new(InMemoryGraphStore::new());
        let loader = GraphLoader::new(store.clone());
        loader.load(&[doc("John", "Director")]).await.unwrap();

        let report = loader.load(&[]).await.unwrap();
        assert_eq!(store.node_count().await, 0);
        assert!(report.schema.is_empty());
    }
}

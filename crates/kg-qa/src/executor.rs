//! Query execution. Failures become context text; nothing propagates.

use crate::validate::{check_query_labels, SchemaMismatch};
use kg_types::{GraphStore, GraphStoreError, QueryResult};
use std::sync::Arc;

/// Output of the execution stage.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Ran(QueryResult),
    /// No query was generated, so the store was not called. Carries the generation failure.
    NotRun(String),
}

#[derive(Debug, thiserror::Error)]
enum ExecutionError {
    #[error(transparent)]
    Schema(#[from] SchemaMismatch),
    #[error(transparent)]
    Store(#[from] GraphStoreError),
}

/// Runs candidate queries against the store.
pub struct QueryExecutor {
    store: Arc<dyn GraphStore>,
    validate: bool,
}

impl QueryExecutor {
    pub fn new(store: Arc<dyn GraphStore>, validate: bool) -> Self {
        Self { store, validate }
    }

    pub async fn execute(&self, query: &str) -> QueryResult {
        match self.try_execute(query).await {
            Ok(records) => {
                tracing::debug!(records = records.len(), "query executed");
                QueryResult::Records(records)
            }
            Err(e) => {
                tracing::warn!(error = %e, query = %query, "query execution failed");
                QueryResult::Failed(format!("Query execution failed: {}", e))
            }
        }
    }

    async fn try_execute(&self, query: &str) -> Result<Vec<kg_types::Record>, ExecutionError> {
        if self.validate {
            // An empty schema has nothing to check against; the store answers with no rows.
            let schema = self.store.schema().await;
            if !schema.is_empty() {
                check_query_labels(query, &schema)?;
            }
        }
        Ok(self.store.query(query).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kg_graph::InMemoryGraphStore;
    use kg_types::{Edge, GraphDocument, Node, NodeRef};

    async fn loaded_store() -> Arc<InMemoryGraphStore> {
        let store = Arc::new(InMemoryGraphStore::new());
        let mut doc = GraphDocument::new("text");
        doc.nodes.push(Node::new("Person", "John"));
        doc.nodes.push(Node::new("Title", "Director"));
        doc.edges.push(Edge::new(
            "TITLE",
            NodeRef::new("Person", "John"),
            NodeRef::new("Title", "Director"),
        ));
        store.add_graph_documents(&[doc]).await.unwrap();
        store.refresh_schema().await.unwrap();
        store
    }

    #[tokio::test]
    async fn records_are_returned() {
        let executor = QueryExecutor::new(loaded_store().await, true);
        let result = executor
            .execute("MATCH (p:Person {id: 'John'})-[:TITLE]->(t:Title) RETURN t.id")
            .await;
        assert_eq!(result.to_context(), r#"[{"t.id":"Director"}]"#);
    }

    #[tokio::test]
    async fn invalid_query_becomes_failed_context() {
        let executor = QueryExecutor::new(loaded_store().await, true);
        let result = executor.execute("this is not cypher").await;
        match result {
            QueryResult::Failed(msg) => assert!(msg.starts_with("Query execution failed: ")),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn schema_mismatch_skips_the_store() {
        let store = loaded_store().await;
        let executor = QueryExecutor::new(store.clone(), true);
        let result = executor
            .execute("MATCH (n:Company) DETACH DELETE n")
            .await;
        assert!(result.is_failed());
        assert!(result.to_context().contains("Company"));
        assert_eq!(store.node_count().await, 2);
    }

    #[tokio::test]
    async fn validation_can_be_disabled() {
        let executor = QueryExecutor::new(loaded_store().await, false);
        let result = executor.execute("MATCH (c:Company) RETURN c.id").await;
        assert_eq!(result, QueryResult::Records(Vec::new()));
    }

    #[tokio::test]
    async fn empty_store_yields_no_records() {
        let executor = QueryExecutor::new(Arc::new(InMemoryGraphStore::new()), true);
        let result = executor
            .execute("MATCH (p:Person)-[:TITLE]->(t:Title) RETURN t.id")
            .await;
        assert_eq!(result.to_context(), "[]");
    }
}

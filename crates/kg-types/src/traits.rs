//! Traits for graph store backends.

use crate::{GraphDocument, Record, SchemaSnapshot};
use async_trait::async_trait;

/// Graph store abstraction: query execution plus schema introspection.
///
/// The store owns all graph state. Callers only keep the schema snapshot it hands out.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Execute a Cypher statement and collect every result record.
    async fn query(&self, cypher: &str) -> Result<Vec<Record>, GraphStoreError>;

    /// Write nodes and edges of the given documents (merging on `(kind, id)`).
    async fn add_graph_documents(&self, documents: &[GraphDocument])
        -> Result<(), GraphStoreError>;

    /// Recompute the schema from current contents and cache it.
    async fn refresh_schema(&self) -> Result<SchemaSnapshot, GraphStoreError>;

    /// Last cached schema snapshot.
    async fn schema(&self) -> SchemaSnapshot;
}

#[derive(Debug, thiserror::Error)]
pub enum GraphStoreError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("query error: {0}")]
    Query(String),
    #[error("graph store error: {0}")]
    Other(String),
}

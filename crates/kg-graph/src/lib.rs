//! Graph store implementations.

pub mod cypher;
mod memory;

#[cfg(feature = "bolt")]
mod bolt;

pub use kg_types::{GraphStore, GraphStoreError, Record, SchemaSnapshot};
pub use memory::InMemoryGraphStore;

#[cfg(feature = "bolt")]
pub use bolt::BoltGraphStore;

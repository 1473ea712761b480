//! Core types and traits for graph-grounded question answering.
//!
//! Graph documents, schema snapshots, QA outcomes, the graph store trait, and the
//! request/response DTOs served by `kg-api`.

mod document;
mod dto;
mod qa;
mod schema;
mod traits;

pub use document::*;
pub use dto::*;
pub use qa::*;
pub use schema::*;
pub use traits::*;

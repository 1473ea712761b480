//! Graph QA API: HTTP surface over the build/ask pipeline.

pub mod server;

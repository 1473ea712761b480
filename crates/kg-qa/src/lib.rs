//! Graph-grounded question answering.
//!
//! Building a graph: extract documents from text, then rebuild the store from them.
//! Answering a question: synthesize a Cypher query from the schema, run it, and phrase an
//! answer from the records. Per-question stages degrade instead of failing.

mod answer;
mod answerer;
mod config;
mod executor;
mod loader;
mod pipeline;
mod synth;
pub mod validate;

pub use answer::{build_qa_prompt, AnswerSynthesizer};
pub use answerer::{QuestionAnswerer, TwoStageAnswerer};
pub use config::{default_few_shot_examples, QaConfig};
pub use executor::{ExecutionOutcome, QueryExecutor};
pub use loader::{GraphLoader, LoadError, DELETE_ALL_QUERY};
pub use pipeline::{GraphQaPipeline, PipelineError};
pub use synth::{build_cypher_prompt, QueryCandidate, QuerySynthesizer};
pub use validate::{check_query_labels, SchemaMismatch};

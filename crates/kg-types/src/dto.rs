//! Request and response DTOs for the HTTP API.

use crate::{GraphDocument, QaOutcome, Record, SchemaSnapshot};
use serde::{Deserialize, Serialize};

/// Base response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseResponse<T> {
    #[serde(default = "default_code")]
    pub code: i32,
    pub message: String,
    #[serde(default)]
    pub data: Option<T>,
}

fn default_code() -> i32 {
    200
}

impl<T> BaseResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: 200,
            message: "Success".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

/// Build-graph request: extract from `text` and rebuild the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildGraphRequest {
    pub text: String,
    /// Allowed node kinds; configured defaults when absent.
    #[serde(default)]
    pub allowed_nodes: Option<Vec<String>>,
    /// Allowed relationship kinds; configured defaults when absent.
    #[serde(default)]
    pub allowed_relationships: Option<Vec<String>>,
}

/// Summary of one graph load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadReport {
    pub nodes_written: usize,
    pub edges_written: usize,
    pub schema: SchemaSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildGraphData {
    pub documents: Vec<GraphDocument>,
    pub report: LoadReport,
}

pub type BuildGraphResponse = BaseResponse<BuildGraphData>;

/// Ask request: one natural-language question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

pub type AskResponse = BaseResponse<QaOutcome>;

/// Raw query request (inspection/debugging).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawQueryRequest {
    pub query: String,
}

pub type RawQueryResponse = BaseResponse<Vec<Record>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaData {
    pub text: String,
    pub snapshot: SchemaSnapshot,
}

pub type SchemaResponse = BaseResponse<SchemaData>;

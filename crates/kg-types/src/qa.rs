//! Question-answering values: few-shot examples, query results, outcomes.

use serde::{Deserialize, Serialize};

/// One result row: field name -> value.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Fixed question/query pair embedded into every synthesis prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FewShotExample {
    pub question: String,
    pub query: String,
}

impl FewShotExample {
    pub fn new(question: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            query: query.into(),
        }
    }
}

/// Result of executing one query against the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "value")]
pub enum QueryResult {
    /// Ordered result records.
    Records(Vec<Record>),
    /// Execution failed; carries a readable description.
    Failed(String),
}

impl QueryResult {
    pub fn is_failed(&self) -> bool {
        matches!(self, QueryResult::Failed(_))
    }

    /// Render as the context string handed to the answer stage.
    pub fn to_context(&self) -> String {
        match self {
            QueryResult::Records(records) => {
                serde_json::to_string(records).unwrap_or_else(|e| format!("{:?}: {}", records, e))
            }
            QueryResult::Failed(msg) => msg.clone(),
        }
    }
}

/// Outcome of answering one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaOutcome {
    pub answer: String,
    /// Generated query; absent when generation failed.
    #[serde(default)]
    pub cypher_query: Option<String>,
    /// Stringified query result or error description.
    #[serde(default)]
    pub context: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_render_as_json_context() {
        let mut row = Record::new();
        row.insert(
            "t.id".to_string(),
            serde_json::Value::String("Director".to_string()),
        );
        let result = QueryResult::Records(vec![row]);
        assert_eq!(result.to_context(), r#"[{"t.id":"Director"}]"#);
        assert_eq!(QueryResult::Records(Vec::new()).to_context(), "[]");
    }

    #[test]
    fn failure_renders_its_message() {
        let result = QueryResult::Failed("Query execution failed: boom".to_string());
        assert!(result.is_failed());
        assert_eq!(result.to_context(), "Query execution failed: boom");
    }
}

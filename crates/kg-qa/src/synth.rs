//! Query synthesis: question + schema + examples -> Cypher.

use kg_llm::LLMClient;
use kg_types::{FewShotExample, SchemaSnapshot};
use std::sync::Arc;

const CYPHER_PREAMBLE: &str = "You are a Cypher query expert. Given a schema and a question, \
you must create a syntactically correct Cypher query to answer the question.
You must respond with ONLY the query, with no other text, explanation, or context.
You must use the provided node and relationship labels and property names from the schema.";

/// Output of the query synthesis stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryCandidate {
    /// Trimmed model output, taken as the query.
    Generated(String),
    /// Generation failed; carries the readable description.
    GenerationFailed(String),
}

fn render_example(question: &str, query: &str) -> String {
    format!("User input: {}\nCypher query: {}\n\n", question, query)
}

/// Full synthesis prompt. The question goes last with an empty query continuation.
pub fn build_cypher_prompt(
    question: &str,
    schema: &SchemaSnapshot,
    examples: &[FewShotExample],
) -> String {
    let examples: String = examples
        .iter()
        .map(|e| render_example(&e.question, &e.query))
        .collect();
    format!(
        "{}\n\nHere is the schema:\n{}\n\nHere are some examples:\n\n{}User input: {}\nCypher query: ",
        CYPHER_PREAMBLE,
        schema.text(),
        examples,
        question
    )
}

/// Asks the LLM for one Cypher query per question.
pub struct QuerySynthesizer {
    llm: Arc<dyn LLMClient>,
    examples: Vec<FewShotExample>,
}

impl QuerySynthesizer {
    pub fn new(llm: Arc<dyn LLMClient>, examples: Vec<FewShotExample>) -> Self {
        Self { llm, examples }
    }

    pub async fn synthesize(&self, question: &str, schema: &SchemaSnapshot) -> QueryCandidate {
        let prompt = build_cypher_prompt(question, schema, &self.examples);
        tracing::debug!(prompt = %prompt, "cypher prompt");
        match self.llm.complete(&prompt).await {
            Ok(text) => QueryCandidate::Generated(text.trim().to_string()),
            Err(e) => {
                tracing::warn!(error = %e, "query generation failed");
                QueryCandidate::GenerationFailed(format!("Failed to generate query: {}", e))
            }
        }
    }
}

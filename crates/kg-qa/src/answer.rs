//! Answer synthesis from query context.

use kg_llm::LLMClient;
use std::sync::Arc;

const QA_PREAMBLE: &str = "You are a helpful assistant that answers user questions based on the context provided.
If the context is empty, say you don't know the answer.
Use only the information provided in the context to answer the question.
Your answer should be concise and directly answer the question.";

/// Answer prompt; `context` and `question` are embedded verbatim.
pub fn build_qa_prompt(question: &str, context: &str) -> String {
    format!(
        "{}\n\nContext:\n{}\n\nQuestion: {}\n\nAnswer:",
        QA_PREAMBLE, context, question
    )
}

pub struct AnswerSynthesizer {
    llm: Arc<dyn LLMClient>,
}

impl AnswerSynthesizer {
    pub fn new(llm: Arc<dyn LLMClient>) -> Self {
        Self { llm }
    }

    /// Trimmed model answer, or the failure description.
    pub async fn synthesize(&self, question: &str, context: &str) -> String {
        let prompt = build_qa_prompt(question, context);
        tracing::debug!(prompt = %prompt, "qa prompt");
        match self.llm.complete(&prompt).await {
            Ok(answer) => answer.trim().to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "answer generation failed");
                format!("Failed to generate answer: {}", e)
            }
        }
    }
}

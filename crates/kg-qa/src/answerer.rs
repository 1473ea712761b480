//! Question answering over the graph store.

use crate::answer::AnswerSynthesizer;
use crate::executor::{ExecutionOutcome, QueryExecutor};
use crate::synth::{QueryCandidate, QuerySynthesizer};
use crate::QaConfig;
use async_trait::async_trait;
use kg_llm::LLMClient;
use kg_types::{GraphStore, QaOutcome};
use std::sync::Arc;

/// Answers one natural-language question. Never fails; degraded stages show up in the outcome.
#[async_trait]
pub trait QuestionAnswerer: Send + Sync {
    async fn answer(&self, question: &str) -> QaOutcome;
}

/// Query synthesis, execution, then answer synthesis.
///
/// Every stage runs for every question; a failed stage hands a degraded value to the next.
pub struct TwoStageAnswerer {
    store: Arc<dyn GraphStore>,
    synthesizer: QuerySynthesizer,
    executor: QueryExecutor,
    answerer: AnswerSynthesizer,
}

impl TwoStageAnswerer {
    pub fn new(llm: Arc<dyn LLMClient>, store: Arc<dyn GraphStore>, config: &QaConfig) -> Self {
        Self {
            synthesizer: QuerySynthesizer::new(llm.clone(), config.few_shot_examples.clone()),
            executor: QueryExecutor::new(store.clone(), config.validate_queries),
            answerer: AnswerSynthesizer::new(llm),
            store,
        }
    }
}

#[async_trait]
impl QuestionAnswerer for TwoStageAnswerer {
    async fn answer(&self, question: &str) -> QaOutcome {
        tracing::debug!(stage = "synthesize_query", question = %question, "qa stage");
        let schema = self.store.schema().await;
        let candidate = self.synthesizer.synthesize(question, &schema).await;

        tracing::debug!(stage = "execute_query", "qa stage");
        let (cypher_query, outcome) = match candidate {
            QueryCandidate::Generated(query) => {
                let result = self.executor.execute(&query).await;
                (Some(query), ExecutionOutcome::Ran(result))
            }
            QueryCandidate::GenerationFailed(description) => {
                (None, ExecutionOutcome::NotRun(description))
            }
        };

        tracing::debug!(stage = "synthesize_answer", "qa stage");
        let result = match outcome {
            ExecutionOutcome::Ran(result) => {
                let context = result.to_context();
                QaOutcome {
                    answer: self.answerer.synthesize(question, &context).await,
                    cypher_query,
                    context,
                }
            }
            ExecutionOutcome::NotRun(description) => QaOutcome {
                answer: description,
                cypher_query,
                context: String::new(),
            },
        };

        tracing::debug!(stage = "done", "qa stage");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kg_graph::InMemoryGraphStore;
    use kg_llm::{LLMError, MockLLMClient};

    #[tokio::test]
    async fn generation_failure_skips_store_and_second_call() {
        let llm = Arc::new(MockLLMClient::new(|_| {
            Err(LLMError::Api("unavailable".to_string()))
        }));
        let store = Arc::new(InMemoryGraphStore::new());
        let answerer = TwoStageAnswerer::new(llm.clone(), store, &QaConfig::default());

        let outcome = answerer.answer("What is John's title?").await;
        assert!(outcome.answer.starts_with("Failed to generate query: "));
        assert_eq!(outcome.cypher_query, None);
        assert_eq!(outcome.context, "");
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn generated_query_is_reported() {
        let llm = Arc::new(MockLLMClient::new(|prompt| {
            if prompt.starts_with("You are a Cypher query expert.") {
                Ok("MATCH (p:Person)-[:TITLE]->(t:Title) RETURN t.id".to_string())
            } else {
                Ok("I don't know.".to_string())
            }
        }));
        let store = Arc::new(InMemoryGraphStore::new());
        let answerer = TwoStageAnswerer::new(llm.clone(), store, &QaConfig::default());

        let outcome = answerer.answer("What is John's title?").await;
        assert_eq!(
            outcome.cypher_query.as_deref(),
            Some("MATCH (p:Person)-[:TITLE]->(t:Title) RETURN t.id")
        );
        assert_eq!(outcome.context, "[]");
        assert_eq!(outcome.answer, "I don't know.");
        assert_eq!(llm.call_count(), 2);
    }
}

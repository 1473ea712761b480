//! GraphQaPipeline: build a graph from text, answer questions over it.

use crate::answerer::{QuestionAnswerer, TwoStageAnswerer};
use crate::loader::{GraphLoader, LoadError};
use crate::QaConfig;
use kg_llm::{EntityExtractor, ExtractorError, LLMClient, LLMGraphTransformer};
use kg_types::{AllowList, GraphDocument, GraphStore, LoadReport, QaOutcome};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Setup failures. Per-question failures never surface here.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("graph extraction failed: {0}")]
    Extraction(#[from] ExtractorError),
    #[error("graph load failed: {0}")]
    Load(#[from] LoadError),
}

pub struct GraphQaPipeline {
    extractor: Arc<dyn EntityExtractor>,
    store: Arc<dyn GraphStore>,
    loader: GraphLoader,
    answerer: Arc<dyn QuestionAnswerer>,
    config: QaConfig,
    /// Held across extract + load so concurrent builds cannot interleave their store writes.
    build_lock: Mutex<()>,
}

impl GraphQaPipeline {
    pub fn new(
        extractor: Arc<dyn EntityExtractor>,
        store: Arc<dyn GraphStore>,
        answerer: Arc<dyn QuestionAnswerer>,
        config: QaConfig,
    ) -> Self {
        Self {
            extractor,
            loader: GraphLoader::new(store.clone()),
            store,
            answerer,
            config,
            build_lock: Mutex::new(()),
        }
    }

    /// One LLM for extraction and both QA stages.
    pub fn from_llm(llm: Arc<dyn LLMClient>, store: Arc<dyn GraphStore>, config: QaConfig) -> Self {
        let extractor = Arc::new(LLMGraphTransformer::new(llm.clone()));
        let answerer = Arc::new(TwoStageAnswerer::new(llm, store.clone(), &config));
        Self::new(extractor, store, answerer, config)
    }

    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    /// Extract documents from `text` and rebuild the store from them.
    pub async fn build_graph(
        &self,
        text: &str,
        allowed_nodes: &AllowList,
        allowed_relationships: &AllowList,
    ) -> Result<Vec<GraphDocument>, PipelineError> {
        let (documents, _) = self
            .build_graph_with_report(
                text,
                Some(allowed_nodes.clone()),
                Some(allowed_relationships.clone()),
            )
            .await?;
        Ok(documents)
    }

    /// Like [`build_graph`](Self::build_graph); missing allow-lists use the configured defaults.
    pub async fn build_graph_with_report(
        &self,
        text: &str,
        allowed_nodes: Option<AllowList>,
        allowed_relationships: Option<AllowList>,
    ) -> Result<(Vec<GraphDocument>, LoadReport), PipelineError> {
        let constraints = self
            .config
            .constraints_with(allowed_nodes, allowed_relationships);
        tracing::info!(
            extractor = self.extractor.name(),
            chars = text.len(),
            "building graph"
        );
        let _guard = self.build_lock.lock().await;
        let documents = self.extractor.extract(text, &constraints).await?;
        let report = self.loader.load(&documents).await?;
        Ok((documents, report))
    }

    pub async fn answer_question(&self, question: &str) -> QaOutcome {
        let outcome = self.answerer.answer(question).await;
        tracing::info!(
            question = %question,
            cypher = outcome.cypher_query.as_deref().unwrap_or(""),
            "question answered"
        );
        outcome
    }
}

//! Graph QA REST API server: /graph/build, /qa/ask.

use kg_api::server::{self, AppState};
use kg_graph::InMemoryGraphStore;
use kg_llm::OpenAiLLMClient;
use kg_qa::{GraphQaPipeline, QaConfig};
use kg_types::GraphStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

async fn graph_store() -> Result<Arc<dyn GraphStore>, Box<dyn std::error::Error + Send + Sync>> {
    let backend = std::env::var("GRAPH_BACKEND").unwrap_or_else(|_| "memory".to_string());
    match backend.as_str() {
        "memory" => Ok(Arc::new(InMemoryGraphStore::new())),
        #[cfg(feature = "bolt")]
        "bolt" => Ok(Arc::new(kg_graph::BoltGraphStore::from_env().await?)),
        other => Err(format!("unsupported GRAPH_BACKEND: {}", other).into()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let llm = OpenAiLLMClient::from_env()
        .ok_or("LLM_API_KEY must be set when LLM_API_URL points at api.openai.com")?;
    tracing::info!(model = %llm.model(), "using LLM");
    let store = graph_store().await?;
    let config = QaConfig::from_env();

    let pipeline = GraphQaPipeline::from_llm(Arc::new(llm), store, config);
    let app = server::router(Arc::new(AppState::new(pipeline)));
    let addr: SocketAddr = std::env::var("KGQA_LISTEN")
        .unwrap_or_else(|_| "0.0.0.0:8002".to_string())
        .parse()?;
    tracing::info!("Graph QA API listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(addr).await?,
        app.into_make_service(),
    )
    .await?;
    Ok(())
}

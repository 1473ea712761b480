//! Axum server and routes.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use kg_qa::GraphQaPipeline;
use kg_types::{
    AllowList, AskRequest, AskResponse, BaseResponse, BuildGraphData, BuildGraphRequest,
    BuildGraphResponse, GraphStore, RawQueryRequest, RawQueryResponse, SchemaData, SchemaResponse,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub struct AppState {
    pub pipeline: Arc<GraphQaPipeline>,
}

impl AppState {
    pub fn new(pipeline: GraphQaPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/graph/build", post(handle_build))
        .route("/graph/schema", get(handle_schema))
        .route("/graph/query", post(handle_query))
        .route("/qa/ask", post(handle_ask))
        .route("/health", get(handle_health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn allow_list(kinds: Option<Vec<String>>) -> Option<AllowList> {
    kinds.map(AllowList::new)
}

async fn handle_build(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BuildGraphRequest>,
) -> Json<BuildGraphResponse> {
    if req.text.trim().is_empty() {
        return Json(BaseResponse::error(400, "text must not be empty"));
    }
    let result = state
        .pipeline
        .build_graph_with_report(
            &req.text,
            allow_list(req.allowed_nodes),
            allow_list(req.allowed_relationships),
        )
        .await;
    match result {
        Ok((documents, report)) => Json(BaseResponse::ok(BuildGraphData { documents, report })),
        Err(e) => {
            tracing::error!(error = %e, "graph build failed");
            Json(BaseResponse::error(500, e.to_string()))
        }
    }
}

async fn handle_ask(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AskRequest>,
) -> Json<AskResponse> {
    let question = req.question.trim();
    if question.is_empty() {
        return Json(BaseResponse::error(400, "question must not be empty"));
    }
    Json(BaseResponse::ok(state.pipeline.answer_question(question).await))
}

async fn handle_schema(State(state): State<Arc<AppState>>) -> Json<SchemaResponse> {
    let snapshot = state.pipeline.store().schema().await;
    Json(BaseResponse::ok(SchemaData {
        text: snapshot.text(),
        snapshot,
    }))
}

async fn handle_query(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RawQueryRequest>,
) -> Json<RawQueryResponse> {
    match state.pipeline.store().query(&req.query).await {
        Ok(records) => Json(BaseResponse::ok(records)),
        Err(e) => Json(BaseResponse::error(500, e.to_string())),
    }
}

async fn handle_health() -> &'static str {
    "ok"
}

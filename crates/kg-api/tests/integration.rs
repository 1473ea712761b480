//! Integration tests: build, ask, schema, raw query, input validation.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use kg_api::server::{self, AppState};
use kg_graph::InMemoryGraphStore;
use kg_llm::{LLMError, MockLLMClient};
use kg_qa::{GraphQaPipeline, QaConfig};
use serde_json::json;
use std::sync::Arc;
use tower::util::ServiceExt;

const SAMPLE_TEXT: &str = "John's title is Director of the Digital Marketing Group. \
John belongs to the Digital Marketing Group. John works with Jane whose title is Chief \
Marketing Officer. Jane belongs to the Executive Group.";

const EXTRACTION: &str = r#"{
  "nodes": [
    {"id": "John", "type": "Person"},
    {"id": "Jane", "type": "Person"},
    {"id": "Director of the Digital Marketing Group", "type": "Title"},
    {"id": "Chief Marketing Officer", "type": "Title"},
    {"id": "Digital Marketing Group", "type": "Group"},
    {"id": "Executive Group", "type": "Group"}
  ],
  "relationships": [
    {"source": "John", "source_type": "Person", "target": "Director of the Digital Marketing Group", "target_type": "Title", "type": "TITLE"},
    {"source": "John", "source_type": "Person", "target": "Digital Marketing Group", "target_type": "Group", "type": "GROUP"},
    {"source": "John", "source_type": "Person", "target": "Jane", "target_type": "Person", "type": "COLLABORATES"},
    {"source": "Jane", "source_type": "Person", "target": "Chief Marketing Officer", "target_type": "Title", "type": "TITLE"},
    {"source": "Jane", "source_type": "Person", "target": "Executive Group", "target_type": "Group", "type": "GROUP"},
    {"source": "Jane", "source_type": "Person", "target": "Acme", "target_type": "Company", "type": "WORKS_AT"}
  ]
}"#;

fn scripted_llm() -> MockLLMClient {
    MockLLMClient::new(|prompt| {
        if prompt.starts_with("You are a top-tier algorithm") {
            Ok(EXTRACTION.to_string())
        } else if prompt.starts_with("You are a Cypher query expert.") {
            if prompt.ends_with("User input: Who does John collaborate with?\nCypher query: ") {
                Ok("MATCH (p:Person {id: 'John'})-[:COLLABORATES]->(c:Person) RETURN c.id".to_string())
            } else {
                Ok("MATCH (p:Person {id: 'John'})-[:TITLE]->(t:Title) RETURN t.id".to_string())
            }
        } else if prompt.contains(r#"[{"c.id":"Jane"}]"#) {
            Ok("John collaborates with Jane.".to_string())
        } else if prompt.contains("Director of the Digital Marketing Group") {
            Ok("Director of the Digital Marketing Group".to_string())
        } else {
            Ok("I don't know the answer.".to_string())
        }
    })
}

fn test_app_with(llm: MockLLMClient) -> axum::Router {
    let store = Arc::new(InMemoryGraphStore::new());
    let pipeline = GraphQaPipeline::from_llm(Arc::new(llm), store, QaConfig::default());
    server::router(Arc::new(AppState::new(pipeline)))
}

fn test_app() -> axum::Router {
    test_app_with(scripted_llm())
}

async fn post_json(app: &axum::Router, uri: &str, body: serde_json::Value) -> serde_json::Value {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

async fn get_json(app: &axum::Router, uri: &str) -> serde_json::Value {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn build_then_ask() {
    let app = test_app();
    let j = post_json(&app, "/graph/build", json!({ "text": SAMPLE_TEXT })).await;
    assert_eq!(j["code"], 200);
    let report = &j["data"]["report"];
    assert_eq!(report["nodes_written"], 6);
    assert_eq!(report["edges_written"], 5);

    let j = post_json(&app, "/qa/ask", json!({ "question": "What is John's title?" })).await;
    assert_eq!(j["code"], 200);
    assert_eq!(
        j["data"]["cypher_query"],
        "MATCH (p:Person {id: 'John'})-[:TITLE]->(t:Title) RETURN t.id"
    );
    assert_eq!(
        j["data"]["context"],
        r#"[{"t.id":"Director of the Digital Marketing Group"}]"#
    );
    assert_eq!(j["data"]["answer"], "Director of the Digital Marketing Group");

    let j = post_json(
        &app,
        "/qa/ask",
        json!({ "question": "Who does John collaborate with?" }),
    )
    .await;
    assert_eq!(j["data"]["answer"], "John collaborates with Jane.");
}

#[tokio::test]
async fn request_allow_lists_restrict_extraction() {
    let app = test_app();
    let j = post_json(
        &app,
        "/graph/build",
        json!({
            "text": SAMPLE_TEXT,
            "allowed_nodes": ["Person", "Title"],
            "allowed_relationships": ["TITLE"]
        }),
    )
    .await;
    assert_eq!(j["code"], 200);
    let nodes = j["data"]["documents"][0]["nodes"].as_array().unwrap();
    assert!(nodes.iter().all(|n| n["kind"] == "Person" || n["kind"] == "Title"));
    let edges = j["data"]["documents"][0]["edges"].as_array().unwrap();
    assert_eq!(edges.len(), 2);
    assert!(edges.iter().all(|e| e["kind"] == "TITLE"));
}

#[tokio::test]
async fn schema_and_raw_query_reflect_build() {
    let app = test_app();
    let j = get_json(&app, "/graph/schema").await;
    assert_eq!(j["code"], 200);
    assert!(!j["data"]["text"].as_str().unwrap().contains("Person"));

    post_json(&app, "/graph/build", json!({ "text": SAMPLE_TEXT })).await;

    let j = get_json(&app, "/graph/schema").await;
    let text = j["data"]["text"].as_str().unwrap();
    assert!(text.contains("Person {id: STRING}"));
    assert!(text.contains("(:Person)-[:COLLABORATES]->(:Person)"));

    let j = post_json(
        &app,
        "/graph/query",
        json!({ "query": "MATCH (n) RETURN count(n) AS nodes" }),
    )
    .await;
    assert_eq!(j["data"][0]["nodes"], 6);
}

#[tokio::test]
async fn ask_on_empty_graph_says_unknown() {
    let app = test_app();
    let j = post_json(&app, "/qa/ask", json!({ "question": "What is John's title?" })).await;
    assert_eq!(j["code"], 200);
    assert_eq!(j["data"]["context"], "[]");
    assert_eq!(j["data"]["answer"], "I don't know the answer.");
}

#[tokio::test]
async fn empty_inputs_are_rejected() {
    let app = test_app();
    let j = post_json(&app, "/qa/ask", json!({ "question": "   " })).await;
    assert_eq!(j["code"], 400);
    assert!(j["data"].is_null());

    let j = post_json(&app, "/graph/build", json!({ "text": "" })).await;
    assert_eq!(j["code"], 400);
}

#[tokio::test]
async fn llm_outage_fails_build_but_not_ask() {
    let app = test_app_with(MockLLMClient::new(|_| {
        Err(LLMError::Api("service unavailable".to_string()))
    }));

    let j = post_json(&app, "/graph/build", json!({ "text": SAMPLE_TEXT })).await;
    assert_eq!(j["code"], 500);
    assert!(j["message"].as_str().unwrap().contains("service unavailable"));

    let j = post_json(&app, "/qa/ask", json!({ "question": "What is John's title?" })).await;
    assert_eq!(j["code"], 200);
    assert!(j["data"]["answer"]
        .as_str()
        .unwrap()
        .starts_with("Failed to generate query: "));
    assert!(j["data"]["cypher_query"].is_null());
}

#[tokio::test]
async fn invalid_raw_query_reports_error() {
    let app = test_app();
    let j = post_json(&app, "/graph/query", json!({ "query": "NOT A QUERY" })).await;
    assert_eq!(j["code"], 500);
}

#[tokio::test]
async fn health_ok() {
    let app = test_app();
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"ok");
}

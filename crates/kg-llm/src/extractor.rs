//! LLM-backed graph extraction.
//!
//! Turns one text unit into a [`GraphDocument`] whose node and relationship kinds are
//! restricted to caller-supplied allow-lists. Model output is never trusted as-is: it goes
//! through [`conform_to_allow_list`] before anything reaches a store.

use crate::{LLMClient, LLMError, Message};
use async_trait::async_trait;
use kg_types::{AllowList, Edge, GraphDocument, Node, NodeRef};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// What to do with kinds outside the allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutOfVocabulary {
    /// Discard the offending node or edge (and edges touching a discarded node).
    #[default]
    Drop,
    /// Fail the whole extraction.
    Reject,
}

impl OutOfVocabulary {
    /// Parse `drop` / `reject` (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop" => Some(Self::Drop),
            "reject" => Some(Self::Reject),
            _ => None,
        }
    }
}

/// Allow-lists plus the out-of-vocabulary policy for one extraction.
#[derive(Debug, Clone, Default)]
pub struct ExtractionConstraints {
    pub allowed_nodes: AllowList,
    pub allowed_relationships: AllowList,
    pub out_of_vocabulary: OutOfVocabulary,
}

impl ExtractionConstraints {
    pub fn new(allowed_nodes: AllowList, allowed_relationships: AllowList) -> Self {
        Self {
            allowed_nodes,
            allowed_relationships,
            out_of_vocabulary: OutOfVocabulary::default(),
        }
    }

    pub fn with_policy(mut self, policy: OutOfVocabulary) -> Self {
        self.out_of_vocabulary = policy;
        self
    }
}

/// Errors that can occur during graph extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractorError {
    #[error("LLM call failed: {0}")]
    Llm(#[from] LLMError),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("{category} kind `{kind}` is not in the allow-list")]
    OutOfVocabulary { category: &'static str, kind: String },
}

/// Trait for text-to-graph extraction.
#[async_trait]
pub trait EntityExtractor: Send + Sync {
    /// Extract zero or more graph documents from one text unit.
    async fn extract(
        &self,
        text: &str,
        constraints: &ExtractionConstraints,
    ) -> Result<Vec<GraphDocument>, ExtractorError>;

    /// Get the name/identifier of this extractor.
    fn name(&self) -> &str;
}

/// Node as emitted by the model.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractedNode {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

/// Relationship as emitted by the model.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractedRelationship {
    pub source: String,
    pub source_type: String,
    pub target: String,
    pub target_type: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Raw model output, before allow-list enforcement.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractedGraph {
    #[serde(default)]
    pub nodes: Vec<ExtractedNode>,
    #[serde(default)]
    pub relationships: Vec<ExtractedRelationship>,
}

const SYSTEM_PROMPT: &str = r#"You are a top-tier algorithm designed for extracting information in structured formats to build a knowledge graph.
Capture as much information from the text as possible without adding anything that is not explicitly stated.

Nodes represent entities and concepts. Each node has:
- "id": the entity name exactly as a human would read it in the text (e.g. "John", not "person_1")
- "type": the kind of entity
- "properties": optional key/value attributes stated in the text

Relationships connect two nodes. Each relationship has:
- "source" and "source_type": id and type of the start node
- "target" and "target_type": id and type of the end node
- "type": the relationship kind, in UPPER_SNAKE_CASE

Always refer to an entity with the same id throughout.

Output format:
{
    "nodes": [{"id": "...", "type": "...", "properties": {}}],
    "relationships": [{"source": "...", "source_type": "...", "target": "...", "target_type": "...", "type": "..."}]
}

Only output valid JSON, no additional text.
"#;

/// Entity extractor that asks an LLM for nodes and relationships.
pub struct LLMGraphTransformer {
    llm: Arc<dyn LLMClient>,
}

impl LLMGraphTransformer {
    pub fn new(llm: Arc<dyn LLMClient>) -> Self {
        Self { llm }
    }

    /// System prompt with the allow-lists spelled out.
    fn build_system_prompt(constraints: &ExtractionConstraints) -> String {
        let mut prompt = SYSTEM_PROMPT.to_string();
        if !constraints.allowed_nodes.is_unconstrained() {
            prompt.push_str(&format!(
                "\nAllowed node types: {}. Use only these types.\n",
                constraints.allowed_nodes.kinds().join(", ")
            ));
        }
        if !constraints.allowed_relationships.is_unconstrained() {
            prompt.push_str(&format!(
                "Allowed relationship types: {}. Use only these types.\n",
                constraints.allowed_relationships.kinds().join(", ")
            ));
        }
        prompt
    }

    fn build_user_prompt(text: &str) -> String {
        format!(
            r#"Extract the knowledge graph from this text:

{}

Respond with JSON only.
"#,
            text
        )
    }

    /// Parse the raw JSON response from the model.
    fn parse_response(response: &str) -> Result<ExtractedGraph, ExtractorError> {
        let json_str = extract_json_from_text(response).ok_or_else(|| {
            ExtractorError::InvalidResponse("No JSON found in response".to_string())
        })?;

        serde_json::from_str(json_str)
            .map_err(|e| ExtractorError::InvalidResponse(format!("JSON parse error: {}", e)))
    }
}

#[async_trait]
impl EntityExtractor for LLMGraphTransformer {
    async fn extract(
        &self,
        text: &str,
        constraints: &ExtractionConstraints,
    ) -> Result<Vec<GraphDocument>, ExtractorError> {
        let messages = vec![
            Message::system(Self::build_system_prompt(constraints)),
            Message::user(Self::build_user_prompt(text)),
        ];
        let content = self.llm.complete_with_messages(&messages).await?;
        tracing::debug!(response = %content, "graph extraction response");

        let raw = Self::parse_response(&content)?;
        let document = conform_to_allow_list(raw, text, constraints)?;
        if let Some(ref doc) = document {
            tracing::info!(
                nodes = doc.nodes.len(),
                edges = doc.edges.len(),
                "extracted graph document"
            );
        } else {
            tracing::warn!("extraction produced no usable nodes or relationships");
        }
        Ok(document.into_iter().collect())
    }

    fn name(&self) -> &str {
        "llm-graph-transformer"
    }
}

// ============================================================================
// Allow-list enforcement
// ============================================================================

/// Relationship kinds are compared in UPPER_SNAKE_CASE.
fn normalize_relationship_kind(kind: &str) -> String {
    kind.trim().replace([' ', '-'], "_").to_uppercase()
}

fn property_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Resolve `kind` or apply the out-of-vocabulary policy. `Ok(None)` means "drop".
fn resolve_kind(
    list: &AllowList,
    kind: &str,
    category: &'static str,
    policy: OutOfVocabulary,
) -> Result<Option<String>, ExtractorError> {
    match list.resolve(kind) {
        Some(k) => Ok(Some(k)),
        None => match policy {
            OutOfVocabulary::Reject => Err(ExtractorError::OutOfVocabulary {
                category,
                kind: kind.to_string(),
            }),
            OutOfVocabulary::Drop => {
                tracing::warn!(category, kind = %kind, "dropping out-of-vocabulary kind");
                Ok(None)
            }
        },
    }
}

/// Enforce allow-lists on raw model output and build a document.
///
/// Kinds are rewritten to the allow-list's spelling; unknown kinds are dropped or rejected
/// according to the policy. Relationship endpoints missing from the node list are added,
/// so the result never contains dangling edges. Returns `None` when nothing survives.
pub fn conform_to_allow_list(
    raw: ExtractedGraph,
    source: &str,
    constraints: &ExtractionConstraints,
) -> Result<Option<GraphDocument>, ExtractorError> {
    let policy = constraints.out_of_vocabulary;
    let mut doc = GraphDocument::new(source);

    fn upsert(doc: &mut GraphDocument, node: Node) {
        match doc
            .nodes
            .iter_mut()
            .find(|n| n.kind == node.kind && n.id == node.id)
        {
            Some(existing) => existing.properties.extend(node.properties),
            None => doc.nodes.push(node),
        }
    }

    for raw_node in raw.nodes {
        let id = raw_node.id.trim();
        if id.is_empty() {
            tracing::warn!(kind = %raw_node.kind, "dropping node without id");
            continue;
        }
        let Some(kind) = resolve_kind(&constraints.allowed_nodes, &raw_node.kind, "node", policy)?
        else {
            continue;
        };
        let mut node = Node::new(kind, id);
        node.properties = raw_node
            .properties
            .into_iter()
            .filter(|(k, _)| k != "id")
            .map(|(k, v)| (k, property_to_string(v)))
            .collect();
        upsert(&mut doc, node);
    }

    for rel in raw.relationships {
        let kind = normalize_relationship_kind(&rel.kind);
        let Some(kind) = resolve_kind(
            &constraints.allowed_relationships,
            &kind,
            "relationship",
            policy,
        )?
        else {
            continue;
        };
        let Some(source_kind) =
            resolve_kind(&constraints.allowed_nodes, &rel.source_type, "node", policy)?
        else {
            continue;
        };
        let Some(target_kind) =
            resolve_kind(&constraints.allowed_nodes, &rel.target_type, "node", policy)?
        else {
            continue;
        };
        let (source_id, target_id) = (rel.source.trim(), rel.target.trim());
        if source_id.is_empty() || target_id.is_empty() {
            tracing::warn!(kind = %kind, "dropping relationship with empty endpoint");
            continue;
        }

        let source_ref = NodeRef::new(source_kind, source_id);
        let target_ref = NodeRef::new(target_kind, target_id);
        for endpoint in [&source_ref, &target_ref] {
            if !doc.contains_node(endpoint) {
                doc.nodes
                    .push(Node::new(endpoint.kind.clone(), endpoint.id.clone()));
            }
        }
        let edge = Edge::new(kind, source_ref, target_ref);
        if !doc.edges.contains(&edge) {
            doc.edges.push(edge);
        }
    }

    if doc.is_empty() {
        return Ok(None);
    }
    Ok(Some(doc))
}

/// Try to extract a JSON object from a text that might have extra text around it.
fn extract_json_from_text(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;

    if start < end {
        Some(&text[start..=end])
    } else {
        None
    }
}

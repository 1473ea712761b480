//! Pipeline configuration.

use kg_llm::{ExtractionConstraints, OutOfVocabulary};
use kg_types::{AllowList, FewShotExample};

const DEFAULT_ALLOWED_NODES: &str = "Person,Title,Group";
const DEFAULT_ALLOWED_RELATIONSHIPS: &str = "TITLE,COLLABORATES,GROUP";

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct QaConfig {
    /// Node kinds used when a build request names none.
    pub allowed_nodes: AllowList,
    /// Relationship kinds used when a build request names none.
    pub allowed_relationships: AllowList,
    pub out_of_vocabulary: OutOfVocabulary,
    /// Examples embedded into every query synthesis prompt, in order.
    pub few_shot_examples: Vec<FewShotExample>,
    /// Check generated queries against the schema before running them.
    pub validate_queries: bool,
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            allowed_nodes: AllowList::parse(DEFAULT_ALLOWED_NODES),
            allowed_relationships: AllowList::parse(DEFAULT_ALLOWED_RELATIONSHIPS),
            out_of_vocabulary: OutOfVocabulary::default(),
            few_shot_examples: default_few_shot_examples(),
            validate_queries: true,
        }
    }
}

impl QaConfig {
    /// Read KGQA_ALLOWED_NODES, KGQA_ALLOWED_RELATIONSHIPS, KGQA_VALIDATE_QUERIES and
    /// KGQA_OUT_OF_VOCABULARY; unset or unparseable values keep their defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(nodes) = std::env::var("KGQA_ALLOWED_NODES") {
            config.allowed_nodes = AllowList::parse(&nodes);
        }
        if let Ok(rels) = std::env::var("KGQA_ALLOWED_RELATIONSHIPS") {
            config.allowed_relationships = AllowList::parse(&rels);
        }
        if let Ok(v) = std::env::var("KGQA_VALIDATE_QUERIES") {
            match v.trim().to_ascii_lowercase().as_str() {
                "0" | "false" | "no" | "off" => config.validate_queries = false,
                "1" | "true" | "yes" | "on" => config.validate_queries = true,
                other => tracing::warn!(value = %other, "ignoring KGQA_VALIDATE_QUERIES"),
            }
        }
        if let Ok(v) = std::env::var("KGQA_OUT_OF_VOCABULARY") {
            match OutOfVocabulary::parse(&v) {
                Some(policy) => config.out_of_vocabulary = policy,
                None => tracing::warn!(value = %v, "ignoring KGQA_OUT_OF_VOCABULARY"),
            }
        }
        config
    }

    /// Extraction constraints from the configured allow-lists.
    pub fn constraints(&self) -> ExtractionConstraints {
        self.constraints_with(None, None)
    }

    /// Extraction constraints with per-request allow-lists; `None` falls back to the defaults.
    pub fn constraints_with(
        &self,
        allowed_nodes: Option<AllowList>,
        allowed_relationships: Option<AllowList>,
    ) -> ExtractionConstraints {
        ExtractionConstraints::new(
            allowed_nodes.unwrap_or_else(|| self.allowed_nodes.clone()),
            allowed_relationships.unwrap_or_else(|| self.allowed_relationships.clone()),
        )
        .with_policy(self.out_of_vocabulary)
    }
}

/// The stock examples for the Person/Title/Group vocabulary.
pub fn default_few_shot_examples() -> Vec<FewShotExample> {
    vec![
        FewShotExample::new(
            "What is John's title?",
            "MATCH (p:Person {id: 'John'})-[:TITLE]->(t:Title) RETURN t.id",
        ),
        FewShotExample::new(
            "Who does John collaborate with?",
            "MATCH (p:Person {id: 'John'})-[:COLLABORATES]->(c:Person) RETURN c.id",
        ),
        FewShotExample::new(
            "What is Jane's title?",
            "MATCH (p:Person {id: 'Jane'})-[:TITLE]->(t:Title) RETURN t.id",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_person_title_group() {
        let config = QaConfig::default();
        assert_eq!(config.allowed_nodes.kinds(), &["Person", "Title", "Group"]);
        assert_eq!(
            config.allowed_relationships.kinds(),
            &["TITLE", "COLLABORATES", "GROUP"]
        );
        assert!(config.validate_queries);
        assert_eq!(config.few_shot_examples.len(), 3);
    }

    #[test]
    fn request_allow_lists_override_defaults() {
        let config = QaConfig::default();
        let c = config.constraints_with(Some(AllowList::new(["Company"])), None);
        assert_eq!(c.allowed_nodes.kinds(), &["Company"]);
        assert_eq!(c.allowed_relationships, config.allowed_relationships);
    }
}

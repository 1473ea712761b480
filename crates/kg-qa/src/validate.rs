//! Static check of generated queries against the schema snapshot.
//!
//! Only labels and relationship types are checked; property names and query structure are
//! left to the store.

use kg_types::SchemaSnapshot;
use regex::Regex;
use std::sync::OnceLock;

/// A query names labels or relationship types the schema does not know.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "query does not match the graph schema (unknown labels: [{}], unknown relationship types: [{}])",
    .unknown_labels.join(", "),
    .unknown_relationship_types.join(", ")
)]
pub struct SchemaMismatch {
    pub unknown_labels: Vec<String>,
    pub unknown_relationship_types: Vec<String>,
}

struct Patterns {
    string_literal: Regex,
    // `(n:A:B`, `(:Label`
    node_labels: Regex,
    // `WHERE n:Label`, `AND n:A:B`
    label_predicate: Regex,
    // one name inside a label chain
    label: Regex,
    // `[r:A|B`, `[:A|:B*1..2`
    relationship: Regex,
}

fn patterns() -> Option<&'static Patterns> {
    static PATTERNS: OnceLock<Option<Patterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            let chain = r"((?::\s*(?:`[^`]+`|[A-Za-z_]\w*)\s*)+)";
            Some(Patterns {
                string_literal: Regex::new(r#"'(?:[^'\\]|\\.)*'|"(?:[^"\\]|\\.)*""#).ok()?,
                node_labels: Regex::new(&format!(r"\(\s*(?:[A-Za-z_]\w*)?\s*{}", chain)).ok()?,
                label_predicate: Regex::new(&format!(
                    r"(?i)\b(?:WHERE|AND|OR|XOR|NOT)\s+[A-Za-z_]\w*\s*{}",
                    chain
                ))
                .ok()?,
                label: Regex::new(r"`[^`]+`|[A-Za-z_]\w*").ok()?,
                relationship: Regex::new(r"\[\s*(?:[A-Za-z_]\w*)?\s*:\s*([^\]\{\*]+)").ok()?,
            })
        })
        .as_ref()
}

fn unquote(name: &str) -> String {
    name.trim()
        .trim_start_matches(':')
        .trim()
        .trim_matches('`')
        .to_string()
}

fn push_unique(out: &mut Vec<String>, name: String) {
    if !name.is_empty() && !out.contains(&name) {
        out.push(name);
    }
}

/// Check every node label and relationship type named in `query` against `schema`.
pub fn check_query_labels(query: &str, schema: &SchemaSnapshot) -> Result<(), SchemaMismatch> {
    let Some(patterns) = patterns() else {
        return Ok(());
    };
    let stripped = patterns.string_literal.replace_all(query, "''");

    let mut unknown_labels = Vec::new();
    let chains = patterns
        .node_labels
        .captures_iter(&stripped)
        .chain(patterns.label_predicate.captures_iter(&stripped));
    for cap in chains {
        for name in patterns.label.find_iter(&cap[1]) {
            let label = unquote(name.as_str());
            if !schema.has_label(&label) {
                push_unique(&mut unknown_labels, label);
            }
        }
    }

    let mut unknown_relationship_types = Vec::new();
    for cap in patterns.relationship.captures_iter(&stripped) {
        for kind in cap[1].split('|').map(unquote) {
            if !schema.has_relationship_type(&kind) {
                push_unique(&mut unknown_relationship_types, kind);
            }
        }
    }

    if unknown_labels.is_empty() && unknown_relationship_types.is_empty() {
        Ok(())
    } else {
        Err(SchemaMismatch {
            unknown_labels,
            unknown_relationship_types,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> SchemaSnapshot {
        let mut schema = SchemaSnapshot::new();
        schema.add_label("Person", [("id".to_string(), "STRING".to_string())]);
        schema.add_label("Title", [("id".to_string(), "STRING".to_string())]);
        schema.add_relationship_type("TITLE", []);
        schema.add_relationship_type("COLLABORATES", []);
        schema
    }

    #[test]
    fn known_labels_pass() {
        let q = "MATCH (p:Person {id: 'John'})-[:TITLE]->(t:Title) RETURN t.id";
        assert_eq!(check_query_labels(q, &schema()), Ok(()));
        let q = "MATCH (p:`Person`)-[r:TITLE|:COLLABORATES*1..2]-(x) RETURN count(x)";
        assert_eq!(check_query_labels(q, &schema()), Ok(()));
    }

    #[test]
    fn unknown_names_are_reported() {
        let q = "MATCH (p:Person)-[:WORKS_AT]->(c:Company), (:Company)-[:TITLE|OWNS]->(x) RETURN c";
        let err = check_query_labels(q, &schema()).unwrap_err();
        assert_eq!(err.unknown_labels, vec!["Company"]);
        assert_eq!(err.unknown_relationship_types, vec!["WORKS_AT", "OWNS"]);
        assert!(err.to_string().contains("Company"));
    }

    #[test]
    fn string_literals_are_ignored() {
        let q = "MATCH (p:Person) WHERE p.id = '(x:Ghost)-[:HAUNTS]' RETURN p.id";
        assert_eq!(check_query_labels(q, &schema()), Ok(()));
    }

    #[test]
    fn unlabelled_patterns_pass() {
        assert_eq!(check_query_labels("MATCH (n) RETURN n", &SchemaSnapshot::new()), Ok(()));
        assert_eq!(
            check_query_labels("MATCH (a)-[r]->(b) RETURN type(r)", &SchemaSnapshot::new()),
            Ok(())
        );
    }

    #[test]
    fn every_label_in_a_chain_is_checked() {
        let err = check_query_labels("MATCH (p:Person:Ghost) RETURN p.id", &schema()).unwrap_err();
        assert_eq!(err.unknown_labels, vec!["Ghost"]);
        assert_eq!(
            check_query_labels("MATCH (p:Person:`Title`) RETURN p.id", &schema()),
            Ok(())
        );
    }

    #[test]
    fn where_label_predicates_are_checked() {
        let err = check_query_labels("MATCH (p) WHERE p:Ghost RETURN p.id", &schema()).unwrap_err();
        assert_eq!(err.unknown_labels, vec!["Ghost"]);
        let err = check_query_labels(
            "MATCH (p) WHERE p.id = 'John' and not p:Title:Phantom RETURN p.id",
            &schema(),
        )
        .unwrap_err();
        assert_eq!(err.unknown_labels, vec!["Phantom"]);
        assert_eq!(
            check_query_labels("MATCH (p) WHERE p:Person RETURN p.id", &schema()),
            Ok(())
        );
    }
}

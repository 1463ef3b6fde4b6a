//! SPARQL 1.1 Query Results JSON Format (`application/sparql-results+json`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sparqled_autocomplete::term::{LiteralAnnotation, Term};

pub const SPARQL_RESULTS_JSON: &str = "application/sparql-results+json";

/// One solution: variable name (without `?`) to bound value.
pub type Binding = BTreeMap<String, RdfValue>;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SparqlResults {
    #[serde(default)]
    pub head: Head,
    #[serde(default)]
    pub results: ResultSet,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Head {
    #[serde(default)]
    pub vars: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResultSet {
    #[serde(default)]
    pub bindings: Vec<Binding>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ValueKind {
    Uri,
    Literal,
    /// Legacy spelling emitted by some endpoints (e.g. Virtuoso).
    TypedLiteral,
    Bnode,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RdfValue {
    #[serde(rename = "type")]
    pub kind: ValueKind,
    pub value: String,
    #[serde(rename = "xml:lang", default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
}

impl RdfValue {
    pub fn uri(value: impl Into<String>) -> Self {
        Self {
            kind: ValueKind::Uri,
            value: value.into(),
            lang: None,
            datatype: None,
        }
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Self {
            kind: ValueKind::Literal,
            value: value.into(),
            lang: None,
            datatype: None,
        }
    }

    pub fn typed_literal(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self {
            kind: ValueKind::Literal,
            value: value.into(),
            lang: None,
            datatype: Some(datatype.into()),
        }
    }

    pub fn bnode(value: impl Into<String>) -> Self {
        Self {
            kind: ValueKind::Bnode,
            value: value.into(),
            lang: None,
            datatype: None,
        }
    }

    /// The value as a query term; `None` for blank nodes, which cannot be
    /// referenced from another query.
    pub fn to_term(&self) -> Option<Term> {
        match self.kind {
            ValueKind::Uri => Some(Term::iri(self.value.clone())),
            ValueKind::Bnode => None,
            ValueKind::Literal | ValueKind::TypedLiteral => {
                let annotation = match (&self.lang, &self.datatype) {
                    (Some(lang), _) => LiteralAnnotation::Lang(lang.clone()),
                    (None, Some(datatype)) => LiteralAnnotation::Datatype(datatype.clone()),
                    (None, None) => LiteralAnnotation::Plain,
                };
                Some(Term::Literal {
                    lexical: self.value.clone(),
                    annotation,
                })
            }
        }
    }
}

impl std::fmt::Display for RdfValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_term() {
            Some(term) => write!(f, "{term}"),
            None => write!(f, "_:{}", self.value),
        }
    }
}

pub fn decode(body: &str) -> Result<SparqlResults, serde_json::Error> {
    serde_json::from_str(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_w3c_results() {
        let body = r#"{
            "head": { "vars": ["POF", "count"] },
            "results": { "bindings": [
                {
                    "POF": { "type": "uri", "value": "http://xmlns.com/foaf/0.1/name" },
                    "count": { "type": "typed-literal", "datatype": "http://www.w3.org/2001/XMLSchema#integer", "value": "42" }
                },
                {
                    "POF": { "type": "literal", "xml:lang": "en", "value": "Alice" }
                },
                {
                    "POF": { "type": "bnode", "value": "b0" }
                }
            ] }
        }"#;
        let results = decode(body).expect("decode");
        assert_eq!(results.head.vars, vec!["POF", "count"]);
        let bindings = &results.results.bindings;
        assert_eq!(bindings.len(), 3);
        assert_eq!(bindings[0]["POF"], RdfValue::uri("http://xmlns.com/foaf/0.1/name"));
        assert_eq!(bindings[0]["count"].kind, ValueKind::TypedLiteral);
        assert_eq!(bindings[0]["count"].value, "42");
        assert_eq!(bindings[1]["POF"].lang.as_deref(), Some("en"));
        assert_eq!(bindings[2]["POF"].kind, ValueKind::Bnode);
    }

    #[test]
    fn values_render_as_query_terms() {
        assert_eq!(RdfValue::uri("http://a/b").to_string(), "<http://a/b>");
        assert_eq!(RdfValue::literal("say \"x\"").to_string(), r#""say \"x\"""#);
        let mut lang = RdfValue::literal("chat");
        lang.lang = Some("fr".to_string());
        assert_eq!(lang.to_string(), r#""chat"@fr"#);
        assert_eq!(
            RdfValue::typed_literal("7", "http://www.w3.org/2001/XMLSchema#integer").to_string(),
            "7"
        );
        assert!(RdfValue::bnode("b1").to_term().is_none());
    }

    #[test]
    fn missing_sections_default_to_empty() {
        let results = decode("{}").expect("decode");
        assert!(results.results.bindings.is_empty());
    }
}

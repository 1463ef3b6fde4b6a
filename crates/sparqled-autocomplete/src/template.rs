//! Recommendation query templates.
//!
//! A template is a Handlebars document with these slots:
//!
//! - `tps`: the triple patterns, each with `s`, `p`, `o` and `leaf`
//! - `pof`: the projection expression for the focus (`?POF` or a path concat)
//! - `pof_subject`: subject of the first pattern whose object is `?POF`
//! - `keyword`: optional case-insensitive substring filter
//! - `prefix`: optional IRI prefix the candidates must start with
//! - `prefixes`: the declared prefixes, each with `label` and `iri`
//!
//! Output is not HTML-escaped: `<` and `"` are meaningful in SPARQL.

use handlebars::Handlebars;
use serde::Serialize;
use thiserror::Error;

/// The default recommendation query.
pub const DEFAULT_TEMPLATE: &str = r#"SELECT DISTINCT {{pof}}
WHERE {
{{#each tps}}
    {{s}} {{p}} {{o}} .
{{/each}}
{{#if keyword}}
    FILTER regex(?POF, "{{keyword}}", "i")
{{/if}}
{{#if prefix}}
    FILTER strstarts(str(?POF), "{{prefix}}")
{{/if}}
}
LIMIT 10
"#;

/// Recommendation query that also counts how often each candidate occurs.
pub const COUNTING_TEMPLATE: &str = r#"SELECT ?POF (count(?POF) AS ?count)
WHERE {
{{#each tps}}
    {{s}} {{p}} {{o}} .
{{/each}}
{{#if keyword}}
    FILTER regex(?POF, "{{keyword}}", "i")
{{/if}}
{{#if prefix}}
    FILTER strstarts(str(?POF), "{{prefix}}")
{{/if}}
}
GROUP BY ?POF
"#;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("invalid recommendation template: {0}")]
    Compile(String),
    #[error("failed to render recommendation template: {0}")]
    Render(String),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PatternSlot {
    pub s: String,
    pub p: String,
    pub o: String,
    pub leaf: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PrefixSlot {
    pub label: String,
    pub iri: String,
}

/// Values bound into a template for one render.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TemplateContext {
    pub tps: Vec<PatternSlot>,
    pub pof: String,
    pub pof_subject: Option<String>,
    pub keyword: Option<String>,
    pub prefix: Option<String>,
    pub prefixes: Vec<PrefixSlot>,
}

/// A compiled-once, render-many recommendation template.
#[derive(Debug, Clone)]
pub struct RecommendationTemplate {
    source: String,
    registry: Handlebars<'static>,
}

const TEMPLATE_NAME: &str = "recommendation";

fn registry() -> Handlebars<'static> {
    let mut registry = Handlebars::new();
    registry.register_escape_fn(handlebars::no_escape);
    registry
}

impl RecommendationTemplate {
    /// Compile `source`, failing early on malformed Handlebars.
    pub fn new(source: impl Into<String>) -> Result<Self, TemplateError> {
        let source = source.into();
        let mut registry = registry();
        registry
            .register_template_string(TEMPLATE_NAME, &source)
            .map_err(|e| TemplateError::Compile(e.to_string()))?;
        Ok(Self { source, registry })
    }

    /// Template projecting `?count` next to `?POF`, for popularity ranking.
    pub fn counting() -> Self {
        Self::builtin(COUNTING_TEMPLATE)
    }

    fn builtin(source: &'static str) -> Self {
        Self::new(source).expect("built-in recommendation template compiles")
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn render(&self, context: &TemplateContext) -> Result<String, TemplateError> {
        self.registry
            .render(TEMPLATE_NAME, context)
            .map_err(|e| TemplateError::Render(e.to_string()))
    }
}

impl Default for RecommendationTemplate {
    fn default() -> Self {
        Self::builtin(DEFAULT_TEMPLATE)
    }
}

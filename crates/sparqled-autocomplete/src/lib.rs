//! Sparqled autocompletion
//!
//! Given a `SELECT` query in which the user marked the position to complete
//! with `<` (the Point Of Focus), this crate extracts the part of the graph
//! pattern connected to that position and synthesises a query returning
//! candidate terms for it, bound to `?POF`.
//!
//! ```text
//! SELECT * { ?s a <http://xmlns.com/foaf/0.1/Person> ; < }
//! ```
//!
//! yields a `PREDICATE` recommendation whose query is
//!
//! ```text
//! SELECT DISTINCT ?POF
//! WHERE {
//!     ?s a <http://xmlns.com/foaf/0.1/Person> .
//!     ?s ?POF ?FillVar .
//! }
//! LIMIT 10
//! ```
//!
//! The pipeline is `parse → trim → expand path → classify → render`; see
//! [`Scope`].

pub mod parser;
pub mod scope;
pub mod template;
pub mod term;

use thiserror::Error;

pub use parser::{parse_query, ParseError, ScopeBuilder, MAX_PATH_LENGTH};
pub use scope::{path_pof, Recommendation, RecommendationType, Scope, TriplePattern};
pub use template::{RecommendationTemplate, TemplateError, COUNTING_TEMPLATE, DEFAULT_TEMPLATE};
pub use term::{LiteralAnnotation, PropertyPath, Term};

#[derive(Debug, Error)]
pub enum AutocompleteError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// Parse `query` and build its recommendation with `template`.
pub fn recommend(
    query: &str,
    template: RecommendationTemplate,
) -> Result<Recommendation, AutocompleteError> {
    let mut scope = Scope::with_template(template);
    scope.parse(query)?;
    Ok(scope.recommend()?)
}

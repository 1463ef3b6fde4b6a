//! Popularity ranking of recommendations.
//!
//! Ranking runs in two phases against the same endpoint:
//!
//! 1. the recommendation query for the user's query is executed; candidate
//!    counts are summed and the `TOP_K` most frequent candidates kept;
//! 2. those candidates are bound with `VALUES ?POF { ... }` and re-counted
//!    over the focus patterns of the evaluation graph.
//!
//! The outcome summarises the phase-2 counts (min, max, mean) together with
//! the wall-clock time of phase 1.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Serialize;
use sparqled_autocomplete::{
    AutocompleteError, RecommendationTemplate, RecommendationType, Scope, TemplateError,
};
use thiserror::Error;

use crate::endpoint::{Endpoint, EndpointError};
use crate::results::{Binding, RdfValue};

/// Number of candidates carried over to the popularity pass.
pub const TOP_K: usize = 10;

const FOCUS: &str = "POF";
const COUNT: &str = "count";

#[derive(Debug, Error)]
pub enum RankError {
    #[error(transparent)]
    Autocomplete(#[from] AutocompleteError),
    #[error(transparent)]
    Endpoint(#[from] EndpointError),
    #[error("binding {index} has a non-integer ?count `{value}`")]
    InvalidCount { index: usize, value: String },
}

impl From<TemplateError> for RankError {
    fn from(err: TemplateError) -> Self {
        RankError::Autocomplete(AutocompleteError::Template(err))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub value: RdfValue,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Measurement {
    Ranked {
        kind: RecommendationType,
        min: u64,
        max: u64,
        mean: f64,
        /// Phase-1 execution time.
        elapsed: Duration,
        /// Phase-1 top candidates, most frequent first.
        top: Vec<Candidate>,
    },
    /// Phase 1 returned no usable candidate, or phase 2 returned no count.
    NoCandidates {
        kind: RecommendationType,
        elapsed: Duration,
    },
}

impl Measurement {
    pub fn elapsed(&self) -> Duration {
        match self {
            Measurement::Ranked { elapsed, .. } | Measurement::NoCandidates { elapsed, .. } => {
                *elapsed
            }
        }
    }
}

fn binding_count(index: usize, binding: &Binding) -> Result<u64, RankError> {
    match binding.get(COUNT) {
        None => Ok(1),
        Some(value) => value
            .value
            .trim()
            .parse::<u64>()
            .map_err(|_| RankError::InvalidCount {
                index,
                value: value.value.clone(),
            }),
    }
}

/// Sum counts per candidate and order them by decreasing count.
///
/// Candidates with equal counts keep the order in which they were first seen.
/// Bindings without `?POF` are ignored.
pub fn rank_candidates(bindings: &[Binding]) -> Result<Vec<Candidate>, RankError> {
    let mut ranked: Vec<Candidate> = Vec::new();
    let mut index_of: HashMap<RdfValue, usize> = HashMap::new();

    for (index, binding) in bindings.iter().enumerate() {
        let count = binding_count(index, binding)?;
        let Some(value) = binding.get(FOCUS) else {
            tracing::warn!(binding = index, "binding without ?POF ignored");
            continue;
        };
        match index_of.get(value) {
            Some(&slot) => ranked[slot].count += count,
            None => {
                index_of.insert(value.clone(), ranked.len());
                ranked.push(Candidate {
                    value: value.clone(),
                    count,
                });
            }
        }
    }

    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    Ok(ranked)
}

/// `VALUES ?POF { ... }` for the given candidates; blank nodes are skipped.
///
/// Braces are written as `\u` escapes so the block can be embedded in a
/// Handlebars template.
pub fn values_block(candidates: &[Candidate]) -> Option<String> {
    let terms: Vec<String> = candidates
        .iter()
        .filter_map(|candidate| match candidate.value.to_term() {
            Some(term) => Some(escape_braces(&term.to_string())),
            None => {
                tracing::warn!(value = %candidate.value, "blank node candidate skipped");
                None
            }
        })
        .collect();
    if terms.is_empty() {
        return None;
    }
    Some(format!("VALUES ?{FOCUS} {{ {} }}", terms.join(" ")))
}

fn escape_braces(text: &str) -> String {
    text.replace('{', "\\u007B").replace('}', "\\u007D")
}

/// Template of the phase-2 query: `values` then the focus patterns.
pub fn popularity_template(
    graph: Option<&str>,
    values: &str,
) -> Result<RecommendationTemplate, TemplateError> {
    let from = graph
        .map(|g| format!("FROM <{}>\n", escape_braces(g)))
        .unwrap_or_default();
    RecommendationTemplate::new(format!(
        "SELECT ?{FOCUS} (count(?{FOCUS}) AS ?{COUNT})\n{from}WHERE {{\n    {values}\n{{{{#each tps}}}}\n    {{{{s}}}} {{{{p}}}} {{{{o}}}} .\n{{{{/each}}}}\n}}\nGROUP BY ?{FOCUS}\n"
    ))
}

fn summarize(counts: &[u64]) -> Option<(u64, u64, f64)> {
    let min = *counts.iter().min()?;
    let max = *counts.iter().max()?;
    let mean = counts.iter().sum::<u64>() as f64 / counts.len() as f64;
    Some((min, max, mean))
}

/// Rank the recommendations of `query` and measure their popularity.
///
/// `template` renders the phase-1 query and should project `?count` next to
/// `?POF` (see [`RecommendationTemplate::counting`]); without `?count` each
/// binding counts once. `graph` is the dataset of the phase-2 pass.
pub fn measure<E: Endpoint + ?Sized>(
    endpoint: &E,
    graph: Option<&str>,
    query: &str,
    template: RecommendationTemplate,
) -> Result<Measurement, RankError> {
    let mut scope = Scope::with_template(template);
    scope.parse(query).map_err(AutocompleteError::from)?;
    let recommendation = scope.recommend()?;
    let kind = recommendation.kind;

    let started = Instant::now();
    let bindings = endpoint.select(&recommendation.query)?;
    let elapsed = started.elapsed();

    let mut ranked = rank_candidates(&bindings)?;
    ranked.truncate(TOP_K);
    tracing::info!(
        kind = %kind,
        bindings = bindings.len(),
        top = ranked.len(),
        elapsed_ms = elapsed.as_millis() as u64,
        "phase 1: ranked recommendations"
    );

    let Some(values) = values_block(&ranked) else {
        return Ok(Measurement::NoCandidates { kind, elapsed });
    };

    scope.set_template(popularity_template(graph, &values)?);
    let popularity_query = scope.render()?;
    let popularity = endpoint.select(&popularity_query)?;
    let counts = popularity
        .iter()
        .enumerate()
        .map(|(index, binding)| binding_count(index, binding))
        .collect::<Result<Vec<_>, _>>()?;
    tracing::info!(counts = ?counts, "phase 2: popularity of top recommendations");

    Ok(match summarize(&counts) {
        Some((min, max, mean)) => Measurement::Ranked {
            kind,
            min,
            max,
            mean,
            elapsed,
            top: ranked,
        },
        None => Measurement::NoCandidates { kind, elapsed },
    })
}

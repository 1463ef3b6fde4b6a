//! The focus graph of one completion request.
//!
//! A [`Scope`] accumulates the triple patterns emitted while parsing a query,
//! then goes through `trim → expand path → classify → render` to produce the
//! query that retrieves recommendations for the Point Of Focus.
//!
//! For example, in
//!
//! ```text
//! SELECT * {
//!     ?s1 a <http://xmlns.com/foaf/0.1/Person> ; < .
//!     ?s2 ?p ?o
//! }
//! ```
//!
//! the `<` marks the focus: the user is completing a predicate of `?s1`.
//! `?s2 ?p ?o` is not connected to the focus and is trimmed away.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::parser::{self, ParseError, ScopeBuilder};
use crate::template::{PatternSlot, PrefixSlot, RecommendationTemplate, TemplateContext, TemplateError};
use crate::term::{Term, ANON_VARIABLE_PREFIX, FOCUS_VARIABLE};

/// The kind of term being completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationType {
    None,
    Class,
    Predicate,
    Path,
    Subject,
    Object,
}

impl std::fmt::Display for RecommendationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RecommendationType::None => "NONE",
            RecommendationType::Class => "CLASS",
            RecommendationType::Predicate => "PREDICATE",
            RecommendationType::Path => "PATH",
            RecommendationType::Subject => "SUBJECT",
            RecommendationType::Object => "OBJECT",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TriplePattern {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
    /// The object is not the subject of any pattern in the scope.
    pub leaf: bool,
}

impl TriplePattern {
    pub fn new(subject: Term, predicate: Term, object: Term) -> Self {
        Self {
            subject,
            predicate,
            object,
            leaf: false,
        }
    }

    fn touches(&self, reached: &HashSet<String>) -> bool {
        reached.contains(&self.subject.node_key())
            || reached.contains(&self.predicate.node_key())
            || reached.contains(&self.object.node_key())
    }

    fn extend(&self, reached: &mut HashSet<String>) {
        reached.insert(self.subject.node_key());
        reached.insert(self.predicate.node_key());
        reached.insert(self.object.node_key());
    }
}

impl std::fmt::Display for TriplePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {} .", self.subject, self.predicate, self.object)
    }
}

/// The in-progress triple while the parser walks predicate and object lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct PartialTriple {
    subject: Option<Term>,
    predicate: Option<Term>,
    object: Option<Term>,
}

/// Outcome of the recommendation pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub kind: RecommendationType,
    pub query: String,
}

#[derive(Debug, Clone)]
pub struct Scope {
    current: PartialTriple,
    patterns: Vec<TriplePattern>,
    prefixes: BTreeMap<String, String>,
    keyword: Option<String>,
    prefix: Option<String>,
    path_length: usize,
    pof: String,
    template: RecommendationTemplate,
    anon_counter: usize,
    prepared: bool,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

fn default_pof() -> String {
    format!("?{FOCUS_VARIABLE}")
}

/// Projection of a recommended path of `path_length` hops, e.g. for two hops:
///
/// `(concat("<", ?POF1, ">", " / ", "<", ?POF2, ">") as ?POF)`
pub fn path_pof(path_length: usize) -> String {
    let hops = (1..=path_length)
        .map(|i| format!("\"<\", ?{FOCUS_VARIABLE}{i}, \">\""))
        .collect::<Vec<_>>()
        .join(", \" / \", ");
    format!("(concat({hops}) as ?{FOCUS_VARIABLE})")
}

impl Scope {
    pub fn new() -> Self {
        Self::with_template(RecommendationTemplate::default())
    }

    pub fn with_template(template: RecommendationTemplate) -> Self {
        Self {
            current: PartialTriple::default(),
            patterns: Vec::new(),
            prefixes: BTreeMap::new(),
            keyword: None,
            prefix: None,
            path_length: 0,
            pof: default_pof(),
            template,
            anon_counter: 0,
            prepared: false,
        }
    }

    pub fn patterns(&self) -> &[TriplePattern] {
        &self.patterns
    }

    pub fn prefixes(&self) -> &BTreeMap<String, String> {
        &self.prefixes
    }

    pub fn keyword(&self) -> Option<&str> {
        self.keyword.as_deref()
    }

    /// Resolved IRI the candidates must start with (`label:<`).
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn path_length(&self) -> usize {
        self.path_length
    }

    pub fn pof(&self) -> &str {
        &self.pof
    }

    pub fn template(&self) -> &RecommendationTemplate {
        &self.template
    }

    pub fn set_template(&mut self, template: RecommendationTemplate) {
        self.template = template;
    }

    /// Populate the scope from `text`.
    ///
    /// On failure the scope is reset: a failed parse never leaves patterns
    /// behind for the next request.
    pub fn parse(&mut self, text: &str) -> Result<(), ParseError> {
        let result = parser::parse_query(text, self);
        match &result {
            Ok(()) => tracing::debug!(
                patterns = self.patterns.len(),
                path_length = self.path_length,
                keyword = ?self.keyword,
                prefix = ?self.prefix,
                "parsed autocompletion query"
            ),
            Err(err) => {
                tracing::debug!(error = %err, "autocompletion query rejected");
                self.reset();
            }
        }
        result
    }

    /// Clear all per-request state; the template is kept.
    pub fn reset(&mut self) {
        self.current = PartialTriple::default();
        self.patterns.clear();
        self.prefixes.clear();
        self.keyword = None;
        self.prefix = None;
        self.path_length = 0;
        self.pof = default_pof();
        self.anon_counter = 0;
        self.prepared = false;
    }

    /// Variables that seed the reachability set: `?POF` and the hop
    /// variables of an expanded path.
    fn focus_keys(&self) -> HashSet<String> {
        let mut keys = HashSet::new();
        keys.insert(Term::focus().node_key());
        for hop in 1..=self.path_length {
            keys.insert(Term::path_hop(hop).node_key());
        }
        keys
    }

    /// Keep only the patterns of the connected component containing the focus.
    ///
    /// Relative order of the kept patterns is preserved.
    pub fn trim_to_scope(&mut self) {
        let mut reached = self.focus_keys();
        let mut size = 0;
        while size != reached.len() {
            size = reached.len();
            for tp in &self.patterns {
                if tp.touches(&reached) {
                    tp.extend(&mut reached);
                }
            }
        }

        let before = self.patterns.len();
        self.patterns.retain(|tp| tp.touches(&reached));
        tracing::debug!(
            kept = self.patterns.len(),
            dropped = before - self.patterns.len(),
            "trimmed scope to focus component"
        );
    }

    /// Rewrite the focused predicate into a chain of `path_length` hops.
    ///
    /// The focused pattern becomes the last hop; intermediate hops are
    /// appended after the existing patterns.
    pub fn add_intermediate_path(&mut self) {
        if self.path_length == 0 {
            return;
        }
        let Some(index) = self.patterns.iter().position(|tp| tp.predicate.is_focus()) else {
            return;
        };

        let subject = self.patterns[index].subject.clone();
        let stem = format!(
            "{}{}",
            subject.stem(),
            self.patterns[index].object.stem()
        );

        let mut inter = subject;
        for hop in 1..self.path_length {
            let next = Term::variable(format!("{stem}{hop}"));
            self.patterns
                .push(TriplePattern::new(inter, Term::path_hop(hop), next.clone()));
            inter = next;
        }

        let last = &mut self.patterns[index];
        last.subject = inter;
        last.predicate = Term::path_hop(self.path_length);
        self.pof = path_pof(self.path_length);
        tracing::debug!(hops = self.path_length, "expanded focus into path");
    }

    fn mark_leaves(&mut self) {
        let subjects: HashSet<String> = self
            .patterns
            .iter()
            .map(|tp| tp.subject.node_key())
            .collect();
        for tp in &mut self.patterns {
            tp.leaf = !subjects.contains(&tp.object.node_key());
        }
    }

    /// Decide what kind of term is being completed.
    ///
    /// First match wins, scanning patterns in order.
    pub fn recommendation_type(&self) -> RecommendationType {
        if self.path_length != 0 {
            return RecommendationType::Path;
        }
        for tp in &self.patterns {
            if tp.predicate.is_focus() {
                return RecommendationType::Predicate;
            }
            if tp.predicate.is_type_predicate() && tp.object.is_focus() {
                return RecommendationType::Class;
            }
            if tp.object.is_focus() {
                return RecommendationType::Object;
            }
            if tp.subject.is_focus() {
                return RecommendationType::Subject;
            }
        }
        RecommendationType::None
    }

    fn template_context(&self) -> TemplateContext {
        TemplateContext {
            tps: self
                .patterns
                .iter()
                .map(|tp| PatternSlot {
                    s: tp.subject.to_string(),
                    p: tp.predicate.to_string(),
                    o: tp.object.to_string(),
                    leaf: tp.leaf,
                })
                .collect(),
            pof: self.pof.clone(),
            pof_subject: self
                .patterns
                .iter()
                .find(|tp| tp.object.is_focus())
                .map(|tp| tp.subject.to_string()),
            keyword: self.keyword.clone(),
            prefix: self.prefix.clone(),
            prefixes: self
                .prefixes
                .iter()
                .map(|(label, iri)| PrefixSlot {
                    label: label.clone(),
                    iri: iri.clone(),
                })
                .collect(),
        }
    }

    /// Render the scope through its template, as it currently stands.
    pub fn render(&self) -> Result<String, TemplateError> {
        self.template.render(&self.template_context())
    }

    /// Trim, expand the path and mark leaves. Runs once per parse.
    pub fn prepare(&mut self) {
        if self.prepared {
            return;
        }
        self.trim_to_scope();
        self.add_intermediate_path();
        self.mark_leaves();
        self.prepared = true;
    }

    /// The query retrieving recommendations, bound to `?POF`.
    pub fn recommendation_query(&mut self) -> Result<String, TemplateError> {
        self.prepare();
        self.render()
    }

    pub fn recommend(&mut self) -> Result<Recommendation, TemplateError> {
        let query = self.recommendation_query()?;
        Ok(Recommendation {
            kind: self.recommendation_type(),
            query,
        })
    }
}

impl ScopeBuilder for Scope {
    fn declare_prefix(&mut self, label: &str, iri: &str) {
        self.prefixes.insert(label.to_string(), iri.to_string());
    }

    fn resolve_prefix(&self, label: &str) -> Option<&str> {
        self.prefixes.get(label).map(String::as_str)
    }

    fn set_subject(&mut self, subject: Term) {
        self.current.subject = Some(subject);
    }

    fn set_predicate(&mut self, predicate: Term) {
        self.current.predicate = Some(predicate);
    }

    fn set_object(&mut self, object: Term) {
        self.current.object = Some(object);
    }

    fn add_triple_pattern(&mut self) -> bool {
        let (Some(s), Some(p), Some(o)) = (
            self.current.subject.clone(),
            self.current.predicate.clone(),
            self.current.object.take(),
        ) else {
            return false;
        };
        self.patterns.push(TriplePattern::new(s, p, o));
        self.prepared = false;
        true
    }

    fn set_keyword(&mut self, keyword: &str) {
        if !keyword.is_empty() {
            self.keyword = Some(keyword.to_string());
        }
    }

    fn set_prefix(&mut self, iri: &str) {
        self.prefix = Some(iri.to_string());
    }

    fn set_path_length(&mut self, length: usize) {
        self.path_length = length;
    }

    fn fresh_variable(&mut self) -> Term {
        self.anon_counter += 1;
        Term::variable(format!("{ANON_VARIABLE_PREFIX}{}", self.anon_counter))
    }
}

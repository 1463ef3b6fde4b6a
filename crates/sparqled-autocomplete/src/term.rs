//! RDF terms as they appear in triple patterns.
//!
//! Terms are a tagged union rather than raw strings: the parser decides what a
//! token is once, and everything downstream (trimming, classification,
//! rendering) matches on the variant instead of sniffing leading characters.
//!
//! Prefixed names are resolved when they are constructed, so a `Term` always
//! knows its absolute IRI and renders without depending on `PREFIX`
//! declarations.

use std::fmt;

/// Name of the reserved Point Of Focus variable (`?POF`).
pub const FOCUS_VARIABLE: &str = "POF";

/// Object variable used when the user stopped right after a focused predicate.
pub const FILL_VARIABLE: &str = "FillVar";

/// Prefix of the variables introduced when desugaring blank nodes, collections
/// and path sequences.
pub const ANON_VARIABLE_PREFIX: &str = "_anon";

pub const RDF_TYPE_IRI: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const RDF_FIRST_IRI: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#first";
pub const RDF_REST_IRI: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#rest";
pub const RDF_NIL_IRI: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#nil";

pub const XSD_INTEGER_IRI: &str = "http://www.w3.org/2001/XMLSchema#integer";
pub const XSD_DECIMAL_IRI: &str = "http://www.w3.org/2001/XMLSchema#decimal";
pub const XSD_DOUBLE_IRI: &str = "http://www.w3.org/2001/XMLSchema#double";
pub const XSD_BOOLEAN_IRI: &str = "http://www.w3.org/2001/XMLSchema#boolean";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    /// `?name` (a `$name` in the input is normalised to `?name`).
    Variable(String),
    /// `<value>`
    Iri(String),
    /// `prefix:local`, already resolved to `iri`.
    PrefixedName {
        prefix: String,
        local: String,
        iri: String,
    },
    Literal {
        lexical: String,
        annotation: LiteralAnnotation,
    },
    /// `_:label`
    BlankNode(String),
    /// The `a` keyword.
    RdfType,
    /// A property path that cannot be flattened into a single triple
    /// (an alternative).
    Path(Box<PropertyPath>),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LiteralAnnotation {
    Plain,
    Lang(String),
    Datatype(String),
}

/// Property path as written in a verb position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyPath {
    Predicate(Term),
    Inverse(Box<PropertyPath>),
    Sequence(Vec<PropertyPath>),
    Alternative(Vec<PropertyPath>),
}

impl Term {
    pub fn variable(name: impl Into<String>) -> Self {
        Term::Variable(name.into())
    }

    pub fn iri(value: impl Into<String>) -> Self {
        Term::Iri(value.into())
    }

    pub fn plain_literal(lexical: impl Into<String>) -> Self {
        Term::Literal {
            lexical: lexical.into(),
            annotation: LiteralAnnotation::Plain,
        }
    }

    pub fn typed_literal(lexical: impl Into<String>, datatype: impl Into<String>) -> Self {
        Term::Literal {
            lexical: lexical.into(),
            annotation: LiteralAnnotation::Datatype(datatype.into()),
        }
    }

    /// `?POF`
    pub fn focus() -> Self {
        Term::Variable(FOCUS_VARIABLE.to_string())
    }

    /// `?POF<hop>`, the predicate variable of one hop of a recommended path.
    pub fn path_hop(hop: usize) -> Self {
        Term::Variable(format!("{FOCUS_VARIABLE}{hop}"))
    }

    /// `?FillVar`
    pub fn fill() -> Self {
        Term::Variable(FILL_VARIABLE.to_string())
    }

    pub fn is_focus(&self) -> bool {
        matches!(self, Term::Variable(name) if name == FOCUS_VARIABLE)
    }

    /// True for `a` and for an explicit `rdf:type` IRI.
    pub fn is_type_predicate(&self) -> bool {
        match self {
            Term::RdfType => true,
            Term::Iri(iri) | Term::PrefixedName { iri, .. } => iri == RDF_TYPE_IRI,
            _ => false,
        }
    }

    /// Absolute IRI for IRI-valued terms.
    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Term::Iri(iri) | Term::PrefixedName { iri, .. } => Some(iri),
            Term::RdfType => Some(RDF_TYPE_IRI),
            _ => None,
        }
    }

    /// Identity of the term as a graph node.
    ///
    /// Two terms denote the same node iff their keys are equal; a prefixed
    /// name and the IRI it expands to share a key.
    pub fn node_key(&self) -> String {
        self.to_string()
    }

    /// Name fragment used to derive synthetic path variables.
    pub fn stem(&self) -> String {
        match self {
            Term::Variable(name) => name.clone(),
            other => other
                .to_string()
                .chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .collect(),
        }
    }
}

fn is_bare_literal(lexical: &str, datatype: &str) -> bool {
    match datatype {
        XSD_BOOLEAN_IRI => lexical == "true" || lexical == "false",
        XSD_INTEGER_IRI | XSD_DECIMAL_IRI | XSD_DOUBLE_IRI => {
            let digits = lexical.trim_start_matches(['+', '-']);
            !digits.is_empty()
                && digits.chars().any(|c| c.is_ascii_digit())
                && digits
                    .chars()
                    .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
                && !digits.starts_with(['e', 'E'])
        }
        _ => false,
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, lexical: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in lexical.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c => write!(f, "{c}")?,
        }
    }
    f.write_str("\"")
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Variable(name) => write!(f, "?{name}"),
            Term::Iri(iri) | Term::PrefixedName { iri, .. } => write!(f, "<{iri}>"),
            Term::Literal {
                lexical,
                annotation,
            } => match annotation {
                LiteralAnnotation::Plain => write_quoted(f, lexical),
                LiteralAnnotation::Lang(lang) => {
                    write_quoted(f, lexical)?;
                    write!(f, "@{lang}")
                }
                LiteralAnnotation::Datatype(dt) if is_bare_literal(lexical, dt) => {
                    f.write_str(lexical)
                }
                LiteralAnnotation::Datatype(dt) => {
                    write_quoted(f, lexical)?;
                    write!(f, "^^<{dt}>")
                }
            },
            Term::BlankNode(label) => write!(f, "_:{label}"),
            Term::RdfType => f.write_str("a"),
            Term::Path(path) => write!(f, "{path}"),
        }
    }
}

impl PropertyPath {
    fn is_compound(&self) -> bool {
        matches!(self, PropertyPath::Sequence(_) | PropertyPath::Alternative(_))
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyPath::Predicate(term) => write!(f, "{term}"),
            PropertyPath::Inverse(inner) if inner.is_compound() => write!(f, "^({inner})"),
            PropertyPath::Inverse(inner) => write!(f, "^{inner}"),
            PropertyPath::Sequence(steps) => {
                for (i, step) in steps.iter().enumerate() {
                    if i > 0 {
                        f.write_str("/")?;
                    }
                    match step {
                        PropertyPath::Alternative(_) => write!(f, "({step})")?,
                        _ => write!(f, "{step}")?,
                    }
                }
                Ok(())
            }
            PropertyPath::Alternative(options) => {
                f.write_str("(")?;
                for (i, option) in options.iter().enumerate() {
                    if i > 0 {
                        f.write_str("|")?;
                    }
                    write!(f, "{option}")?;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixed_name_shares_node_key_with_its_iri() {
        let pname = Term::PrefixedName {
            prefix: "ex".to_string(),
            local: "knows".to_string(),
            iri: "http://example.org/knows".to_string(),
        };
        assert_eq!(pname.node_key(), Term::iri("http://example.org/knows").node_key());
    }

    #[test]
    fn numeric_literals_render_bare() {
        assert_eq!(Term::typed_literal("42", XSD_INTEGER_IRI).to_string(), "42");
        assert_eq!(Term::typed_literal("-1.5e3", XSD_DOUBLE_IRI).to_string(), "-1.5e3");
        assert_eq!(
            Term::typed_literal("abc", XSD_INTEGER_IRI).to_string(),
            "\"abc\"^^<http://www.w3.org/2001/XMLSchema#integer>"
        );
    }

    #[test]
    fn literals_escape_quotes() {
        assert_eq!(Term::plain_literal("say \"hi\"").to_string(), r#""say \"hi\"""#);
    }

    #[test]
    fn type_predicate_detection() {
        assert!(Term::RdfType.is_type_predicate());
        assert!(Term::iri(RDF_TYPE_IRI).is_type_predicate());
        assert!(!Term::iri("http://example.org/p").is_type_predicate());
    }

    #[test]
    fn stem_of_iri_keeps_alphanumerics() {
        assert_eq!(Term::iri("aaa").stem(), "aaa");
        assert_eq!(Term::variable("s").stem(), "s");
    }

    #[test]
    fn alternative_path_renders_in_parens() {
        let path = PropertyPath::Alternative(vec![
            PropertyPath::Predicate(Term::iri("p1")),
            PropertyPath::Inverse(Box::new(PropertyPath::Predicate(Term::iri("p2")))),
        ]);
        assert_eq!(Term::Path(Box::new(path)).to_string(), "(<p1>|^<p2>)");
    }
}

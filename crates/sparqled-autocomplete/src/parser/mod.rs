//! Parser for SELECT queries carrying a Point Of Focus marker.
//!
//! The grammar is a practical subset of SPARQL 1.1 `SELECT`, extended with the
//! focus marker `<` (and its `keyword<`, `label:<` and `N/<` variants).
//! Productions are hand-written recursive descent; tokens come from the `nom`
//! terminals in [`lexer`].
//!
//! The parser does not build a tree. Each triple it recognises is pushed into
//! a [`ScopeBuilder`] as it is read, which is all the autocompletion pipeline
//! needs.
//!
//! Supported:
//! - `BASE` / `PREFIX` prologue
//! - `SELECT [DISTINCT|REDUCED]` with `*`, variables or `(expr AS ?v)`
//! - `FROM` / `FROM NAMED`, optional `WHERE`
//! - group graph patterns: triples, nested groups, `UNION`, `OPTIONAL`,
//!   `MINUS`, `GRAPH`, `SERVICE`
//! - `FILTER`, `BIND` and `VALUES` (accepted, contribute no patterns)
//! - `GROUP BY`, `HAVING`, `ORDER BY`, `LIMIT`, `OFFSET` in any order
//! - property paths built from `^`, `/` and `|`
//! - blank node property lists `[ ... ]` and collections `( ... )`

mod lexer;

use thiserror::Error;

use crate::term::{
    LiteralAnnotation, PropertyPath, Term, RDF_FIRST_IRI, RDF_NIL_IRI, RDF_REST_IRI,
    XSD_BOOLEAN_IRI, XSD_DECIMAL_IRI, XSD_DOUBLE_IRI, XSD_INTEGER_IRI,
};

use lexer::{FocusHint, NumericKind};

/// Receiver of parse events.
///
/// A triple is emitted by setting its three components and calling
/// [`ScopeBuilder::add_triple_pattern`].
pub trait ScopeBuilder {
    fn declare_prefix(&mut self, label: &str, iri: &str);

    fn resolve_prefix(&self, label: &str) -> Option<&str>;

    fn set_subject(&mut self, subject: Term);

    fn set_predicate(&mut self, predicate: Term);

    fn set_object(&mut self, object: Term);

    /// Commit the current triple. Returns `false` if a component is missing.
    fn add_triple_pattern(&mut self) -> bool;

    fn set_keyword(&mut self, keyword: &str);

    /// Resolved IRI of the `label:<` namespace.
    fn set_prefix(&mut self, iri: &str);

    fn set_path_length(&mut self, length: usize);

    /// A variable not occurring in the user's query.
    fn fresh_variable(&mut self) -> Term;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("syntax error at line {line}, column {column}: {message}")]
    Syntax {
        offset: usize,
        line: usize,
        column: usize,
        message: String,
    },
    #[error("undeclared prefix `{label}:` at line {line}, column {column}")]
    UnresolvedPrefix {
        label: String,
        offset: usize,
        line: usize,
        column: usize,
    },
}

impl ParseError {
    pub fn line(&self) -> usize {
        match self {
            ParseError::Syntax { line, .. } | ParseError::UnresolvedPrefix { line, .. } => *line,
        }
    }

    pub fn column(&self) -> usize {
        match self {
            ParseError::Syntax { column, .. } | ParseError::UnresolvedPrefix { column, .. } => {
                *column
            }
        }
    }
}

/// Parse `text`, streaming its triple patterns into `builder`.
///
/// On error the builder may hold a partial result; callers reset it.
pub fn parse_query<B: ScopeBuilder>(text: &str, builder: &mut B) -> Result<(), ParseError> {
    Parser::new(text, builder).query()
}

/// Longest path accepted by the `N/<` marker.
pub const MAX_PATH_LENGTH: usize = 8;

/// Keywords that open a non-triples member of a group graph pattern.
const GROUP_KEYWORDS: &[&str] = &[
    "OPTIONAL", "MINUS", "GRAPH", "SERVICE", "FILTER", "BIND", "VALUES", "UNION",
];

/// Keywords that open a solution modifier.
const MODIFIER_KEYWORDS: &[&str] = &["GROUP", "HAVING", "ORDER", "LIMIT", "OFFSET", "VALUES"];

fn contains_focus(path: &PropertyPath) -> bool {
    match path {
        PropertyPath::Predicate(term) => term.is_focus(),
        PropertyPath::Inverse(inner) => contains_focus(inner),
        PropertyPath::Sequence(steps) | PropertyPath::Alternative(steps) => {
            steps.iter().any(contains_focus)
        }
    }
}

/// True when the path's last hop is the focus, so the object may be omitted.
fn ends_in_focus(path: &PropertyPath) -> bool {
    match path {
        PropertyPath::Predicate(term) => term.is_focus(),
        PropertyPath::Sequence(steps) => steps.last().is_some_and(ends_in_focus),
        _ => false,
    }
}

struct Parser<'t, 'b, B> {
    text: &'t str,
    rest: &'t str,
    builder: &'b mut B,
    focus_seen: bool,
}

impl<'t, 'b, B: ScopeBuilder> Parser<'t, 'b, B> {
    fn new(text: &'t str, builder: &'b mut B) -> Self {
        Self {
            text,
            rest: text,
            builder,
            focus_seen: false,
        }
    }

    // ========================================================================
    // Cursor
    // ========================================================================

    fn offset(&self) -> usize {
        self.text.len() - self.rest.len()
    }

    fn position(&self, offset: usize) -> (usize, usize) {
        let before = &self.text[..offset];
        let line = before.matches('\n').count() + 1;
        let column = before
            .rsplit('\n')
            .next()
            .map_or(0, |tail| tail.chars().count())
            + 1;
        (line, column)
    }

    fn error_at(&self, offset: usize, message: impl Into<String>) -> ParseError {
        let (line, column) = self.position(offset);
        ParseError::Syntax {
            offset,
            line,
            column,
            message: message.into(),
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        self.error_at(self.offset(), message)
    }

    fn unresolved(&self, label: &str, offset: usize) -> ParseError {
        let (line, column) = self.position(offset);
        ParseError::UnresolvedPrefix {
            label: label.to_string(),
            offset,
            line,
            column,
        }
    }

    fn skip_ws(&mut self) {
        self.rest = lexer::skip_trivia(self.rest);
    }

    /// Run a terminal at the cursor, advancing only on success.
    fn attempt<O>(&mut self, mut parser: impl FnMut(&'t str) -> nom::IResult<&'t str, O>) -> Option<O> {
        match parser(self.rest) {
            Ok((rest, out)) => {
                self.rest = rest;
                Some(out)
            }
            Err(_) => None,
        }
    }

    fn token<O>(&mut self, parser: impl FnMut(&'t str) -> nom::IResult<&'t str, O>) -> Option<O> {
        self.skip_ws();
        self.attempt(parser)
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.rest.chars().next()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.rest = &self.rest[c.len_utf8()..];
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char, what: &str) -> Result<(), ParseError> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.error(format!("expected {what}")))
        }
    }

    fn eat_keyword(&mut self, kw: &'static str) -> bool {
        self.token(lexer::keyword(kw)).is_some()
    }

    fn expect_keyword(&mut self, kw: &'static str) -> Result<(), ParseError> {
        if self.eat_keyword(kw) {
            Ok(())
        } else {
            Err(self.error(format!("expected {kw}")))
        }
    }

    fn at_any_keyword(&mut self, keywords: &[&'static str]) -> bool {
        self.skip_ws();
        keywords
            .iter()
            .any(|&kw| lexer::keyword(kw)(self.rest).is_ok())
    }

    /// Skip to the matching `close`; the opening delimiter is already consumed.
    ///
    /// String literals and IRIs are skipped whole so delimiters inside them
    /// do not count.
    fn skip_balanced(&mut self, open: char, close: char) -> Result<(), ParseError> {
        let start = self.offset().saturating_sub(open.len_utf8());
        let mut depth = 1usize;
        loop {
            self.skip_ws();
            if self.attempt(lexer::string_literal).is_some() || self.attempt(lexer::iriref).is_some() {
                continue;
            }
            let Some(c) = self.rest.chars().next() else {
                return Err(self.error_at(start, format!("unbalanced '{open}'")));
            };
            self.rest = &self.rest[c.len_utf8()..];
            if c == open {
                depth += 1;
            } else if c == close {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
        }
    }

    // ========================================================================
    // Query
    // ========================================================================

    fn query(&mut self) -> Result<(), ParseError> {
        self.prologue()?;
        self.expect_keyword("SELECT")?;
        self.select_clause()?;
        while self.eat_keyword("FROM") {
            self.eat_keyword("NAMED");
            self.iri()?;
        }
        self.eat_keyword("WHERE");
        self.expect('{', "'{' opening the WHERE clause")?;
        self.group_graph_pattern()?;
        self.solution_modifiers()?;
        self.skip_ws();
        if !self.rest.is_empty() {
            return Err(self.error("unexpected input after the end of the query"));
        }
        Ok(())
    }

    fn prologue(&mut self) -> Result<(), ParseError> {
        loop {
            if self.eat_keyword("BASE") {
                self.token(lexer::iriref)
                    .ok_or_else(|| self.error("expected IRI after BASE"))?;
            } else if self.eat_keyword("PREFIX") {
                let label = self
                    .token(lexer::pname_ns)
                    .ok_or_else(|| self.error("expected `label:` after PREFIX"))?;
                let iri = self
                    .token(lexer::iriref)
                    .ok_or_else(|| self.error("expected IRI in PREFIX declaration"))?;
                self.builder.declare_prefix(label, iri);
            } else {
                return Ok(());
            }
        }
    }

    fn select_clause(&mut self) -> Result<(), ParseError> {
        if !self.eat_keyword("DISTINCT") {
            self.eat_keyword("REDUCED");
        }
        if self.eat('*') {
            return Ok(());
        }
        let mut projected = 0;
        loop {
            if self.token(lexer::variable).is_some() {
                projected += 1;
            } else if self.eat('(') {
                self.skip_balanced('(', ')')?;
                projected += 1;
            } else {
                break;
            }
        }
        if projected == 0 {
            return Err(self.error("expected '*' or a projection after SELECT"));
        }
        Ok(())
    }

    fn solution_modifiers(&mut self) -> Result<(), ParseError> {
        loop {
            if self.eat_keyword("GROUP") {
                self.expect_keyword("BY")?;
                self.conditions("GROUP BY")?;
            } else if self.eat_keyword("HAVING") {
                self.conditions("HAVING")?;
            } else if self.eat_keyword("ORDER") {
                self.expect_keyword("BY")?;
                self.conditions("ORDER BY")?;
            } else if self.eat_keyword("LIMIT") {
                self.integer("LIMIT")?;
            } else if self.eat_keyword("OFFSET") {
                self.integer("OFFSET")?;
            } else if self.eat_keyword("VALUES") {
                self.data_block()?;
            } else {
                return Ok(());
            }
        }
    }

    fn conditions(&mut self, clause: &str) -> Result<(), ParseError> {
        let mut count = 0;
        loop {
            if !self.eat_keyword("ASC") {
                self.eat_keyword("DESC");
            }
            if self.token(lexer::variable).is_some() {
                count += 1;
            } else if self.eat('(') {
                self.skip_balanced('(', ')')?;
                count += 1;
            } else if self.at_any_keyword(MODIFIER_KEYWORDS) {
                break;
            } else if self.call_name() {
                self.expect('(', "'(' after function name")?;
                self.skip_balanced('(', ')')?;
                count += 1;
            } else {
                break;
            }
        }
        if count == 0 {
            return Err(self.error(format!("expected a condition after {clause}")));
        }
        Ok(())
    }

    /// A builtin or IRI function name.
    fn call_name(&mut self) -> bool {
        self.token(lexer::iriref).is_some()
            || self.attempt(lexer::pname_ln).is_some()
            || self.attempt(lexer::function_name).is_some()
    }

    fn integer(&mut self, clause: &str) -> Result<(), ParseError> {
        self.token(nom::character::complete::digit1)
            .map(|_| ())
            .ok_or_else(|| self.error(format!("expected an integer after {clause}")))
    }

    // ========================================================================
    // Graph patterns
    // ========================================================================

    /// Members up to and including the closing `}`; the `{` is consumed.
    fn group_graph_pattern(&mut self) -> Result<(), ParseError> {
        let mut needs_separator = false;
        loop {
            let Some(c) = self.peek() else {
                return Err(self.error("expected '}' closing the group graph pattern"));
            };
            match c {
                '}' => {
                    self.rest = &self.rest[1..];
                    return Ok(());
                }
                '.' => {
                    self.rest = &self.rest[1..];
                    needs_separator = false;
                }
                '{' => {
                    self.rest = &self.rest[1..];
                    self.group_or_union()?;
                    needs_separator = false;
                }
                _ => {
                    if self.graph_pattern_not_triples()? {
                        needs_separator = false;
                        continue;
                    }
                    if needs_separator {
                        return Err(self.error("expected '.' between triple patterns"));
                    }
                    self.triples_same_subject()?;
                    needs_separator = !self.eat('.');
                }
            }
        }
    }

    fn group_or_union(&mut self) -> Result<(), ParseError> {
        self.group_graph_pattern()?;
        while self.eat_keyword("UNION") {
            self.expect('{', "'{' after UNION")?;
            self.group_graph_pattern()?;
        }
        Ok(())
    }

    /// Returns `false` when the cursor is not on a keyword-introduced member.
    fn graph_pattern_not_triples(&mut self) -> Result<bool, ParseError> {
        if self.eat_keyword("OPTIONAL") || self.eat_keyword("MINUS") {
            self.expect('{', "'{'")?;
            self.group_graph_pattern()?;
        } else if self.eat_keyword("GRAPH") {
            self.var_or_iri()?;
            self.expect('{', "'{' after GRAPH name")?;
            self.group_graph_pattern()?;
        } else if self.eat_keyword("SERVICE") {
            self.eat_keyword("SILENT");
            self.var_or_iri()?;
            self.expect('{', "'{' after SERVICE endpoint")?;
            self.group_graph_pattern()?;
        } else if self.eat_keyword("FILTER") {
            self.constraint()?;
        } else if self.eat_keyword("BIND") {
            self.expect('(', "'(' after BIND")?;
            self.skip_balanced('(', ')')?;
        } else if self.eat_keyword("VALUES") {
            self.data_block()?;
        } else {
            return Ok(false);
        }
        Ok(true)
    }

    fn constraint(&mut self) -> Result<(), ParseError> {
        if self.eat('(') {
            return self.skip_balanced('(', ')');
        }
        let negated = self.eat_keyword("NOT");
        if self.eat_keyword("EXISTS") {
            self.expect('{', "'{' after EXISTS")?;
            return self.skip_balanced('{', '}');
        }
        if negated {
            return Err(self.error("expected EXISTS after NOT"));
        }
        if self.call_name() {
            self.expect('(', "'(' after function name")?;
            return self.skip_balanced('(', ')');
        }
        Err(self.error("expected a constraint after FILTER"))
    }

    fn data_block(&mut self) -> Result<(), ParseError> {
        if self.eat('(') {
            self.skip_balanced('(', ')')?;
        } else if self.token(lexer::variable).is_none() {
            return Err(self.error("expected variables after VALUES"));
        }
        self.expect('{', "'{' opening VALUES data")?;
        self.skip_balanced('{', '}')
    }

    // ========================================================================
    // Triples
    // ========================================================================

    fn triples_same_subject(&mut self) -> Result<(), ParseError> {
        self.skip_ws();
        let start = self.offset();
        if let Some(hint) = self.attempt(lexer::focus_marker) {
            self.register_focus(hint, start)?;
            return self.property_list_not_empty(&Term::focus());
        }
        if self.eat('[') {
            let node = self.builder.fresh_variable();
            if self.eat(']') {
                return self.property_list_not_empty(&node);
            }
            self.property_list_not_empty(&node)?;
            self.expect(']', "']' closing the blank node")?;
            return self.property_list(&node);
        }
        if self.eat('(') {
            let head = self.collection()?;
            return self.property_list(&head);
        }
        let subject = self.var_or_term()?;
        self.property_list_not_empty(&subject)
    }

    fn at_list_end(&mut self) -> bool {
        matches!(
            self.peek(),
            None | Some('.' | ';' | ',' | '}' | ']' | ')' | '{')
        ) || self.at_any_keyword(GROUP_KEYWORDS)
    }

    fn property_list_not_empty(&mut self, subject: &Term) -> Result<(), ParseError> {
        if self.at_list_end() {
            return Err(self.error("expected a predicate"));
        }
        self.property_list(subject)
    }

    fn property_list(&mut self, subject: &Term) -> Result<(), ParseError> {
        while !self.at_list_end() {
            self.verb_object_list(subject)?;
            if !self.eat(';') {
                break;
            }
            while self.eat(';') {}
        }
        Ok(())
    }

    fn verb_object_list(&mut self, subject: &Term) -> Result<(), ParseError> {
        self.skip_ws();
        let start = self.offset();
        let path = if let Some(digits) = self.attempt(lexer::path_length) {
            let length = match digits.parse::<usize>() {
                Ok(0) => return Err(self.error_at(start, "path length must be at least 1")),
                Ok(length) if length <= MAX_PATH_LENGTH => length,
                _ => {
                    return Err(self.error_at(
                        start,
                        format!("path length must be at most {MAX_PATH_LENGTH}"),
                    ))
                }
            };
            self.builder.set_path_length(length);
            let marker = self.offset();
            let hint = self
                .attempt(lexer::focus_marker)
                .ok_or_else(|| self.error("expected a point of focus after the path length"))?;
            self.register_focus(hint, marker)?;
            PropertyPath::Predicate(Term::focus())
        } else {
            self.path()?
        };

        if ends_in_focus(&path) && self.at_list_end() {
            return self.emit_path(subject, &path, &Term::fill());
        }
        self.object_list(subject, &path)
    }

    fn object_list(&mut self, subject: &Term, path: &PropertyPath) -> Result<(), ParseError> {
        loop {
            let object = self.object()?;
            self.emit_path(subject, path, &object)?;
            if !self.eat(',') {
                return Ok(());
            }
        }
    }

    fn object(&mut self) -> Result<Term, ParseError> {
        self.skip_ws();
        let start = self.offset();
        if let Some(hint) = self.attempt(lexer::focus_marker) {
            self.register_focus(hint, start)?;
            return Ok(Term::focus());
        }
        if self.eat('[') {
            let node = self.builder.fresh_variable();
            if !self.eat(']') {
                self.property_list_not_empty(&node)?;
                self.expect(']', "']' closing the blank node")?;
            }
            return Ok(node);
        }
        if self.eat('(') {
            return self.collection();
        }
        self.var_or_term()
    }

    /// `( item ... )`, desugared into an `rdf:first`/`rdf:rest` chain.
    /// The `(` is consumed; returns the list head.
    fn collection(&mut self) -> Result<Term, ParseError> {
        let mut items = Vec::new();
        while !self.eat(')') {
            if self.peek().is_none() {
                return Err(self.error("expected ')' closing the collection"));
            }
            items.push(self.object()?);
        }
        if items.is_empty() {
            return Ok(Term::iri(RDF_NIL_IRI));
        }

        let mut nodes = Vec::with_capacity(items.len());
        for _ in 0..items.len() {
            nodes.push(self.builder.fresh_variable());
        }
        let first = Term::iri(RDF_FIRST_IRI);
        let rest = Term::iri(RDF_REST_IRI);
        let nil = Term::iri(RDF_NIL_IRI);
        for (i, item) in items.iter().enumerate() {
            self.emit(&nodes[i], &first, item)?;
            self.emit(&nodes[i], &rest, nodes.get(i + 1).unwrap_or(&nil))?;
        }
        Ok(nodes[0].clone())
    }

    // ========================================================================
    // Property paths
    // ========================================================================

    fn path(&mut self) -> Result<PropertyPath, ParseError> {
        self.skip_ws();
        let start = self.offset();
        let mut options = vec![self.path_sequence()?];
        while self.eat('|') {
            options.push(self.path_sequence()?);
        }
        if options.len() == 1 {
            return Ok(options.remove(0));
        }
        if options.iter().any(contains_focus) {
            return Err(self.error_at(
                start,
                "a point of focus cannot appear inside an alternative path",
            ));
        }
        Ok(PropertyPath::Alternative(options))
    }

    fn path_sequence(&mut self) -> Result<PropertyPath, ParseError> {
        let mut steps = vec![self.path_elt_or_inverse()?];
        while self.eat('/') {
            steps.push(self.path_elt_or_inverse()?);
        }
        if steps.len() == 1 {
            return Ok(steps.remove(0));
        }
        Ok(PropertyPath::Sequence(steps))
    }

    fn path_elt_or_inverse(&mut self) -> Result<PropertyPath, ParseError> {
        self.skip_ws();
        let start = self.offset();
        if self.eat('^') {
            let inner = self.path_elt()?;
            if contains_focus(&inner) {
                return Err(self.error_at(
                    start,
                    "a point of focus cannot appear inside an inverse path",
                ));
            }
            return Ok(PropertyPath::Inverse(Box::new(inner)));
        }
        self.path_elt()
    }

    fn path_elt(&mut self) -> Result<PropertyPath, ParseError> {
        let primary = self.path_primary()?;
        let mut chars = self.rest.chars();
        let modifier = match (chars.next(), chars.next()) {
            (Some('*'), _) => true,
            (Some('+'), next) => !next.is_some_and(|c| c.is_ascii_digit()),
            (Some('?'), next) => !next.is_some_and(|c| c.is_alphanumeric() || c == '_'),
            _ => false,
        };
        if modifier {
            return Err(self.error("repetition path operators (*, +, ?) are not supported"));
        }
        Ok(primary)
    }

    fn path_primary(&mut self) -> Result<PropertyPath, ParseError> {
        self.skip_ws();
        let start = self.offset();
        if let Some(hint) = self.attempt(lexer::focus_marker) {
            self.register_focus(hint, start)?;
            return Ok(PropertyPath::Predicate(Term::focus()));
        }
        if self.attempt(lexer::rdf_type).is_some() {
            return Ok(PropertyPath::Predicate(Term::RdfType));
        }
        if self.eat('(') {
            let inner = self.path()?;
            self.expect(')', "')' closing the path group")?;
            return Ok(inner);
        }
        if self.rest.starts_with('!') {
            return Err(self.error("negated property sets are not supported"));
        }
        if let Some(name) = self.attempt(lexer::variable) {
            return Ok(PropertyPath::Predicate(Term::variable(name)));
        }
        match self.iri_opt()? {
            Some(iri) => Ok(PropertyPath::Predicate(iri)),
            None => Err(self.error("expected a predicate")),
        }
    }

    // ========================================================================
    // Terms
    // ========================================================================

    fn var_or_iri(&mut self) -> Result<Term, ParseError> {
        if let Some(name) = self.token(lexer::variable) {
            return Ok(Term::variable(name));
        }
        self.iri()
    }

    fn var_or_term(&mut self) -> Result<Term, ParseError> {
        self.skip_ws();
        if let Some(name) = self.attempt(lexer::variable) {
            return Ok(Term::variable(name));
        }
        if let Some(label) = self.attempt(lexer::blank_node_label) {
            return Ok(Term::BlankNode(label.to_string()));
        }
        if let Some(lexical) = self.attempt(lexer::string_literal) {
            return self.literal_annotation(lexical);
        }
        if let Some((lexical, kind)) = self.attempt(lexer::numeric_literal) {
            let datatype = match kind {
                NumericKind::Integer => XSD_INTEGER_IRI,
                NumericKind::Decimal => XSD_DECIMAL_IRI,
                NumericKind::Double => XSD_DOUBLE_IRI,
            };
            return Ok(Term::typed_literal(lexical, datatype));
        }
        if let Some(lexical) = self.attempt(lexer::boolean_literal) {
            return Ok(Term::typed_literal(lexical, XSD_BOOLEAN_IRI));
        }
        match self.iri_opt()? {
            Some(iri) => Ok(iri),
            None => Err(self.error("expected a term")),
        }
    }

    fn literal_annotation(&mut self, lexical: String) -> Result<Term, ParseError> {
        if let Some(lang) = self.attempt(lexer::lang_tag) {
            return Ok(Term::Literal {
                lexical,
                annotation: LiteralAnnotation::Lang(lang.to_string()),
            });
        }
        if let Some(after) = self.rest.strip_prefix("^^") {
            self.rest = after;
            let datatype = self.iri()?;
            let datatype = datatype
                .as_iri()
                .map(str::to_string)
                .ok_or_else(|| self.error("expected a datatype IRI"))?;
            return Ok(Term::typed_literal(lexical, datatype));
        }
        Ok(Term::plain_literal(lexical))
    }

    fn iri(&mut self) -> Result<Term, ParseError> {
        match self.iri_opt()? {
            Some(iri) => Ok(iri),
            None => Err(self.error("expected an IRI")),
        }
    }

    fn iri_opt(&mut self) -> Result<Option<Term>, ParseError> {
        self.skip_ws();
        if let Some(iri) = self.attempt(lexer::iriref) {
            return Ok(Some(Term::iri(iri)));
        }
        let start = self.offset();
        if let Some((label, local)) = self.attempt(lexer::pname_ln) {
            return self.resolve(label, local, start).map(Some);
        }
        if let Some(label) = self.attempt(lexer::pname_ns) {
            return self.resolve(label, "", start).map(Some);
        }
        Ok(None)
    }

    fn resolve(&self, label: &str, local: &str, offset: usize) -> Result<Term, ParseError> {
        match self.builder.resolve_prefix(label) {
            Some(namespace) => Ok(Term::PrefixedName {
                prefix: label.to_string(),
                local: local.to_string(),
                iri: format!("{namespace}{local}"),
            }),
            None => Err(self.unresolved(label, offset)),
        }
    }

    // ========================================================================
    // Emission
    // ========================================================================

    fn register_focus(&mut self, hint: FocusHint<'t>, offset: usize) -> Result<(), ParseError> {
        if self.focus_seen {
            return Err(self.error_at(offset, "a query may contain only one point of focus"));
        }
        self.focus_seen = true;
        match hint {
            FocusHint::Bare => {}
            FocusHint::Keyword(keyword) => self.builder.set_keyword(keyword),
            FocusHint::Prefix(label) => {
                let iri = self
                    .builder
                    .resolve_prefix(label)
                    .map(str::to_string)
                    .ok_or_else(|| self.unresolved(label, offset))?;
                self.builder.set_prefix(&iri);
            }
        }
        Ok(())
    }

    fn emit(&mut self, subject: &Term, predicate: &Term, object: &Term) -> Result<(), ParseError> {
        self.builder.set_subject(subject.clone());
        self.builder.set_predicate(predicate.clone());
        self.builder.set_object(object.clone());
        if self.builder.add_triple_pattern() {
            Ok(())
        } else {
            Err(self.error("incomplete triple pattern"))
        }
    }

    /// Emit `subject path object`, flattening sequences and inverses.
    fn emit_path(
        &mut self,
        subject: &Term,
        path: &PropertyPath,
        object: &Term,
    ) -> Result<(), ParseError> {
        match path {
            PropertyPath::Predicate(predicate) => self.emit(subject, predicate, object),
            PropertyPath::Inverse(inner) => self.emit_path(object, inner, subject),
            PropertyPath::Sequence(steps) => {
                let Some((last, init)) = steps.split_last() else {
                    return Ok(());
                };
                let mut current = subject.clone();
                for step in init {
                    let next = self.builder.fresh_variable();
                    self.emit_path(&current, step, &next)?;
                    current = next;
                }
                self.emit_path(&current, last, object)
            }
            PropertyPath::Alternative(_) => {
                self.emit(subject, &Term::Path(Box::new(path.clone())), object)
            }
        }
    }
}

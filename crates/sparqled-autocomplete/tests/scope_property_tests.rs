use std::collections::HashSet;

use proptest::prelude::*;
use sparqled_autocomplete::{RecommendationType, Scope, ScopeBuilder, Term, TriplePattern};

fn node() -> impl Strategy<Value = Term> {
    prop_oneof![
        (0u8..5).prop_map(|i| Term::variable(format!("v{i}"))),
        (0u8..3).prop_map(|i| Term::iri(format!("http://example.org/n{i}"))),
    ]
}

fn predicate() -> impl Strategy<Value = Term> {
    prop_oneof![
        Just(Term::RdfType),
        (0u8..3).prop_map(|i| Term::variable(format!("p{i}"))),
        (0u8..3).prop_map(|i| Term::iri(format!("http://example.org/p{i}"))),
    ]
}

fn plain_pattern() -> impl Strategy<Value = (Term, Term, Term)> {
    (node(), predicate(), node())
}

/// A pattern holding the focus in one of its four shapes.
fn focus_pattern() -> impl Strategy<Value = ((Term, Term, Term), RecommendationType)> {
    prop_oneof![
        node().prop_map(|s| ((s, Term::focus(), Term::fill()), RecommendationType::Predicate)),
        node().prop_map(|s| ((s, Term::RdfType, Term::focus()), RecommendationType::Class)),
        (node(), (0u8..3).prop_map(|i| Term::iri(format!("http://example.org/p{i}"))))
            .prop_map(|(s, p)| ((s, p, Term::focus()), RecommendationType::Object)),
        (predicate(), node())
            .prop_map(|(p, o)| ((Term::focus(), p, o), RecommendationType::Subject)),
    ]
}

fn scope_of(patterns: &[(Term, Term, Term)]) -> Scope {
    let mut scope = Scope::new();
    for (s, p, o) in patterns {
        scope.set_subject(s.clone());
        scope.set_predicate(p.clone());
        scope.set_object(o.clone());
        assert!(scope.add_triple_pattern());
    }
    scope
}

fn keys(tp: &TriplePattern) -> [String; 3] {
    [
        tp.subject.node_key(),
        tp.predicate.node_key(),
        tp.object.node_key(),
    ]
}

fn query_text(patterns: &[(Term, Term, Term)]) -> String {
    let body: Vec<String> = patterns
        .iter()
        .map(|(s, p, o)| format!("{s} {p} {o} ."))
        .collect();
    format!("SELECT * WHERE {{\n{}\n}}", body.join("\n"))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn trimming_is_idempotent(
        mut patterns in proptest::collection::vec(plain_pattern(), 0..12),
        (focus, _) in focus_pattern(),
        at in 0usize..12,
    ) {
        let at = at.min(patterns.len());
        patterns.insert(at, focus);
        let mut scope = scope_of(&patterns);
        scope.trim_to_scope();
        let once = scope.patterns().to_vec();
        scope.trim_to_scope();
        prop_assert_eq!(scope.patterns(), once.as_slice());
    }

    #[test]
    fn trimming_keeps_exactly_the_focus_component(
        mut patterns in proptest::collection::vec(plain_pattern(), 0..12),
        (focus, _) in focus_pattern(),
        at in 0usize..12,
    ) {
        let at = at.min(patterns.len());
        patterns.insert(at, focus);
        let mut scope = scope_of(&patterns);
        let before = scope.patterns().to_vec();
        scope.trim_to_scope();
        let kept = scope.patterns().to_vec();

        let mut reached: HashSet<String> = HashSet::new();
        reached.insert(Term::focus().node_key());
        for tp in &kept {
            reached.extend(keys(tp));
        }

        // Kept patterns form a subsequence of the input.
        let mut remaining = before.iter();
        for tp in &kept {
            prop_assert!(remaining.any(|candidate| candidate == tp));
        }

        for tp in &before {
            let touches = keys(tp).iter().any(|k| reached.contains(k));
            let is_kept = kept.contains(tp);
            prop_assert_eq!(touches, is_kept, "pattern {}", tp);
        }
    }

    #[test]
    fn classification_ignores_pattern_order(
        patterns in proptest::collection::vec(plain_pattern(), 0..8),
        (focus, expected) in focus_pattern(),
        seed in any::<u64>(),
    ) {
        let mut all = patterns;
        all.push(focus);
        let forward = scope_of(&all).recommendation_type();

        let len = all.len();
        all.rotate_left((seed as usize) % len);
        all.reverse();
        let shuffled = scope_of(&all).recommendation_type();

        prop_assert_eq!(forward, expected);
        prop_assert_eq!(shuffled, expected);
    }

    #[test]
    fn rendering_is_deterministic(
        patterns in proptest::collection::vec(plain_pattern(), 0..8),
        (focus, _) in focus_pattern(),
    ) {
        let mut all = patterns;
        all.push(focus);
        let mut scope = scope_of(&all);
        let first = scope.recommendation_query().expect("render");
        let second = scope.recommendation_query().expect("render");
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(scope.clone().render().expect("render"), first);
    }

    #[test]
    fn printed_patterns_parse_back(
        patterns in proptest::collection::vec(plain_pattern(), 1..8),
    ) {
        let mut scope = Scope::new();
        scope.parse(&query_text(&patterns)).expect("generated query parses");
        let parsed: Vec<(Term, Term, Term)> = scope
            .patterns()
            .iter()
            .map(|tp| (tp.subject.clone(), tp.predicate.clone(), tp.object.clone()))
            .collect();
        prop_assert_eq!(parsed, patterns);
    }
}

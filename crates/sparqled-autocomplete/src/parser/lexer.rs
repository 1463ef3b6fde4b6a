//! Lexical terminals of the query profile.
//!
//! Every function here is a `nom` parser over `&str`; none of them skip
//! leading whitespace (the production layer does that) so adjacency-sensitive
//! forms like `label:<` or `3/<` can be recognised exactly.

use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not, tag, tag_no_case, take_while, take_while1},
    character::complete::{char as pchar, digit0, digit1, one_of, satisfy},
    combinator::{map, not, opt, peek, recognize, value},
    error::{Error, ErrorKind},
    sequence::{delimited, pair, preceded, terminated, tuple},
    Err as NomErr, IResult,
};

/// How the user qualified the Point Of Focus marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FocusHint<'a> {
    /// A bare `<`.
    Bare,
    /// `keyword<`
    Keyword(&'a str),
    /// `label:<`
    Prefix(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum NumericKind {
    Integer,
    Decimal,
    Double,
}

fn fail<'a, O>(input: &'a str, kind: ErrorKind) -> IResult<&'a str, O> {
    Err(NomErr::Error(Error::new(input, kind)))
}

pub(crate) fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

fn is_varname_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_iri_char(c: char) -> bool {
    c > ' ' && !matches!(c, '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\')
}

/// `<...>`, returning the IRI between the brackets.
pub(crate) fn iriref(input: &str) -> IResult<&str, &str> {
    delimited(pchar('<'), take_while(is_iri_char), pchar('>'))(input)
}

/// `label` of a `label:` namespace (possibly empty).
pub(crate) fn pname_ns(input: &str) -> IResult<&str, &str> {
    terminated(pn_prefix, pchar(':'))(input)
}

fn pn_prefix(input: &str) -> IResult<&str, &str> {
    let parsed: IResult<&str, Option<&str>> = opt(recognize(pair(
        satisfy(|c| c.is_alphabetic()),
        take_while(|c: char| is_name_char(c) || c == '.'),
    )))(input);
    let (_, raw) = parsed?;
    let label = raw.unwrap_or("").trim_end_matches('.');
    Ok((&input[label.len()..], label))
}

/// `label:local`, returning `(label, local)`.
pub(crate) fn pname_ln(input: &str) -> IResult<&str, (&str, &str)> {
    let (rest, label) = pname_ns(input)?;
    let parsed: IResult<&str, &str> = recognize(pair(
        satisfy(|c| is_varname_char(c) || c == ':' || c == '%'),
        take_while(|c: char| is_name_char(c) || matches!(c, '.' | ':' | '%')),
    ))(rest);
    let (_, raw) = parsed?;
    let local = raw.trim_end_matches('.');
    Ok((&rest[local.len()..], (label, local)))
}

/// `?name` or `$name`, returning the name.
pub(crate) fn variable(input: &str) -> IResult<&str, &str> {
    preceded(one_of("?$"), take_while1(is_varname_char))(input)
}

/// `_:label`
pub(crate) fn blank_node_label(input: &str) -> IResult<&str, &str> {
    preceded(tag("_:"), take_while1(|c: char| is_name_char(c) || c == '.'))(input)
        .map(|(_, label)| {
            let label = label.trim_end_matches('.');
            (&input[2 + label.len()..], label)
        })
}

/// A `<` that does not open a complete IRI.
fn bare_marker(input: &str) -> IResult<&str, ()> {
    if iriref(input).is_ok() {
        return fail(input, ErrorKind::Verify);
    }
    value((), pchar('<'))(input)
}

fn marker_keyword(input: &str) -> IResult<&str, &str> {
    take_while1(is_name_char)(input)
}

/// The Point Of Focus marker, with an optional keyword or prefix glued to it.
pub(crate) fn focus_marker(input: &str) -> IResult<&str, FocusHint<'_>> {
    alt((
        map(terminated(pname_ns, bare_marker), FocusHint::Prefix),
        map(terminated(marker_keyword, bare_marker), FocusHint::Keyword),
        map(bare_marker, |_| FocusHint::Bare),
    ))(input)
}

/// `N/` directly in front of a focus marker.
pub(crate) fn path_length(input: &str) -> IResult<&str, &str> {
    terminated(digit1, tuple((pchar('/'), peek(focus_marker))))(input)
}

/// Case-insensitive keyword that is neither the prefix of a longer name nor
/// the hint of a focus marker (`union<`).
pub(crate) fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(
        tag_no_case(kw),
        pair(not(satisfy(|c| is_name_char(c) || c == ':')), not(bare_marker)),
    )
}

/// Name of a builtin call such as `regex` or `COUNT`.
pub(crate) fn function_name(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_alphabetic()),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(input)
}

/// The `a` shortcut for `rdf:type`.
pub(crate) fn rdf_type(input: &str) -> IResult<&str, ()> {
    value((), terminated(pchar('a'), not(satisfy(|c| is_name_char(c) || c == ':'))))(input)
}

fn short_string(quote: char) -> impl FnMut(&str) -> IResult<&str, String> {
    move |input: &str| {
        let stop = if quote == '"' { "\\\"\n\r" } else { "\\'\n\r" };
        let esc = escaped_transform(
            is_not(stop),
            '\\',
            alt((
                value("\\", tag("\\")),
                value("\"", tag("\"")),
                value("'", tag("'")),
                value("\n", tag("n")),
                value("\t", tag("t")),
                value("\r", tag("r")),
                value("\u{8}", tag("b")),
                value("\u{c}", tag("f")),
            )),
        );
        delimited(pchar(quote), map(opt(esc), Option::unwrap_or_default), pchar(quote))(input)
    }
}

fn long_string(delim: &'static str) -> impl FnMut(&str) -> IResult<&str, String> {
    move |input: &str| {
        let opened: IResult<&str, &str> = tag(delim)(input);
        let (body, _) = opened?;
        let mut out = String::new();
        let mut chars = body.char_indices();
        while let Some((idx, c)) = chars.next() {
            if body[idx..].starts_with(delim) {
                return Ok((&body[idx + delim.len()..], out));
            }
            if c == '\\' {
                match chars.next() {
                    Some((_, 'n')) => out.push('\n'),
                    Some((_, 't')) => out.push('\t'),
                    Some((_, 'r')) => out.push('\r'),
                    Some((_, 'b')) => out.push('\u{8}'),
                    Some((_, 'f')) => out.push('\u{c}'),
                    Some((_, other)) => out.push(other),
                    None => break,
                }
            } else {
                out.push(c);
            }
        }
        fail(input, ErrorKind::Eof)
    }
}

/// Any of the four string literal forms, unescaped.
pub(crate) fn string_literal(input: &str) -> IResult<&str, String> {
    alt((
        long_string("\"\"\""),
        long_string("'''"),
        short_string('"'),
        short_string('\''),
    ))(input)
}

/// `@en`, `@en-GB`
pub(crate) fn lang_tag(input: &str) -> IResult<&str, &str> {
    preceded(
        pchar('@'),
        recognize(pair(
            take_while1(|c: char| c.is_ascii_alphabetic()),
            take_while(|c: char| c.is_ascii_alphanumeric() || c == '-'),
        )),
    )(input)
}

/// Signed integer, decimal or double literal.
pub(crate) fn numeric_literal(input: &str) -> IResult<&str, (&str, NumericKind)> {
    let parsed: IResult<&str, (Option<char>, &str, Option<&str>, Option<(char, Option<char>, &str)>)> =
        tuple((
            opt(one_of("+-")),
            digit0,
            opt(preceded(pchar('.'), digit1)),
            opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
        ))(input);
    let (rest, (_, int, frac, exp)) = parsed?;
    if int.is_empty() && frac.is_none() {
        return fail(input, ErrorKind::Digit);
    }
    let kind = if exp.is_some() {
        NumericKind::Double
    } else if frac.is_some() {
        NumericKind::Decimal
    } else {
        NumericKind::Integer
    };
    let lexical = &input[..input.len() - rest.len()];
    Ok((rest, (lexical, kind)))
}

/// `true` / `false`
pub(crate) fn boolean_literal(input: &str) -> IResult<&str, &str> {
    terminated(alt((tag("true"), tag("false"))), not(satisfy(is_name_char)))(input)
}

/// Whitespace and `#` comments.
pub(crate) fn skip_trivia(input: &str) -> &str {
    let mut rest = input;
    loop {
        let trimmed = rest.trim_start();
        if let Some(comment) = trimmed.strip_prefix('#') {
            rest = match comment.find('\n') {
                Some(end) => &comment[end + 1..],
                None => "",
            };
        } else {
            return trimmed;
        }
    }
}

//! Turn turtle edits into SPARQL Update documents.
use std::{collections::HashMap, fmt::Write};

use oxrdf::{vocab::xsd, BlankNode, Subject, Term, Triple};

use crate::turtle::{self, ParseError, PrefixMap};

/// Server-managed containment predicate. Never written back.
pub const LDP_CONTAINS: &str = "http://www.w3.org/ns/ldp#contains";

/// Build a `DELETE { } INSERT { } WHERE { }` update that replaces the
/// statements of `old` with those of `new`. Without `old` the delete block
/// is empty, which is what creating metadata looks like.
///
/// Statements about the document itself are written about `<>`. Blank
/// nodes of `old` become variables, bound by an `OPTIONAL` pattern in the
/// otherwise empty `WHERE` clause.
///
/// ```
/// use fcrepo::{sparql::build_update_patch, turtle::PrefixMap};
///
/// let patch = build_update_patch(
///     "<> dc:title \"Y\" .",
///     Some("<> dc:title \"X\" ."),
///     &PrefixMap::default_global(),
/// )
/// .unwrap();
///
/// assert!(patch.contains("PREFIX dc: <http://purl.org/dc/elements/1.1/>"));
/// assert!(patch.contains("<> <http://purl.org/dc/elements/1.1/title> \"X\" ."));
/// assert!(patch.trim_end().ends_with("WHERE { }"));
/// ```
///
/// # Errors
///
/// Malformed turtle in either document. Nothing is rendered in that case.
pub fn build_update_patch(
    new: &str,
    old: Option<&str>,
    global: &PrefixMap,
) -> Result<String, ParseError> {
    let insert = turtle::parse(new, global)?;
    let delete = old.map(|old| turtle::parse(old, global)).transpose()?;

    let header: PrefixMap = insert
        .prefixes
        .iter()
        .chain(global.iter().filter(|(k, _)| !insert.prefixes.contains_key(k)))
        .collect();
    let inserted: Vec<&Triple> = kept(&insert.triples).collect();
    let deleted: Vec<&Triple> = delete
        .as_ref()
        .map(|d| kept(&d.triples).collect())
        .unwrap_or_default();

    let mut out = String::new();
    // writing to a String cannot fail
    let _ = render(&mut out, &header, &deleted, &inserted);

    Ok(out)
}

fn kept(triples: &[Triple]) -> impl Iterator<Item = &Triple> {
    triples
        .iter()
        .filter(|t| t.predicate.as_str() != LDP_CONTAINS)
}

fn render(
    out: &mut String,
    header: &PrefixMap,
    delete: &[&Triple],
    insert: &[&Triple],
) -> std::fmt::Result {
    for (name, iri) in header.iter() {
        writeln!(out, "PREFIX {name}: <{iri}>")?;
    }

    let mut variables = Variables::default();

    writeln!(out, "\nDELETE {{")?;
    for triple in delete {
        writeln!(out, "  {}", variables.render(triple))?;
    }
    writeln!(out, "}}\nINSERT {{")?;
    for triple in insert {
        writeln!(out, "  {}", render_triple(triple))?;
    }
    writeln!(out, "}}")?;

    let bound: Vec<&&Triple> = delete.iter().filter(|t| has_blank_node(t)).collect();
    if bound.is_empty() {
        return writeln!(out, "WHERE {{ }}");
    }

    writeln!(out, "WHERE {{\n  OPTIONAL {{")?;
    for triple in bound {
        writeln!(out, "    {}", variables.render(triple))?;
    }
    writeln!(out, "  }}\n}}")
}

fn has_blank_node(triple: &Triple) -> bool {
    matches!(triple.subject, Subject::BlankNode(_)) || matches!(triple.object, Term::BlankNode(_))
}

/// Names blank nodes `?b0`, `?b1`, ... in order of appearance.
#[derive(Default)]
struct Variables(HashMap<BlankNode, usize>);

impl Variables {
    fn name(&mut self, node: &BlankNode) -> String {
        let next = self.0.len();
        format!("?b{}", self.0.entry(node.clone()).or_insert(next))
    }

    fn render(&mut self, triple: &Triple) -> String {
        let subject = match &triple.subject {
            Subject::BlankNode(node) => self.name(node),
            subject => render_subject(subject),
        };
        let object = match &triple.object {
            Term::BlankNode(node) => self.name(node),
            object => render_object(object),
        };

        format!("{subject} <{}> {object} .", triple.predicate.as_str())
    }
}

fn render_subject(subject: &Subject) -> String {
    match subject {
        Subject::NamedNode(node) => format!("<{}>", turtle::relative_to_document(node.as_str())),
        Subject::BlankNode(node) => node.to_string(),
    }
}

fn render_object(object: &Term) -> String {
    match object {
        Term::NamedNode(node) => format!("<{}>", turtle::relative_to_document(node.as_str())),
        Term::BlankNode(node) => node.to_string(),
        Term::Literal(literal) => {
            let value = turtle::escape_literal(literal.value());
            match literal.language() {
                Some(lang) => format!("\"{value}\"@{lang}"),
                None if literal.datatype() == xsd::STRING => format!("\"{value}\""),
                None => format!("\"{value}\"^^<{}>", literal.datatype().as_str()),
            }
        }
    }
}

/// Render one statement. References to the document itself come out as
/// `<>` and blank nodes keep their labels. Plain strings are written
/// without a datatype.
#[must_use]
pub fn render_triple(triple: &Triple) -> String {
    format!(
        "{} <{}> {} .",
        render_subject(&triple.subject),
        triple.predicate.as_str(),
        render_object(&triple.object)
    )
}

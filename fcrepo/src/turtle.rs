//! Turtle parsing on top of [`oxttl`].
//!
//! Documents are parsed against [`DOCUMENT_BASE`], so `<>` and other
//! relative references can be written back out the way they were written.
use once_cell::sync::Lazy;
use oxrdf::Triple;
use oxttl::{TurtleParseError, TurtleParser};
use regex::Regex;
use serde::{
    de::{MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};

/// `rdf:type`, written `a` in turtle.
pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

/// Base IRI relative references are resolved against while parsing.
pub const DOCUMENT_BASE: &str = "http://document.invalid/";

/// Ordered mapping from prefix name to namespace IRI.
///
/// Insertion order is kept, which is also the order prefixes are written
/// back out in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefixMap {
    entries: Vec<(String, String)>,
}

impl PrefixMap {
    /// An empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefixes every fresh configuration starts out with.
    #[must_use]
    pub fn default_global() -> Self {
        [
            ("dc", "http://purl.org/dc/elements/1.1/"),
            ("foaf", "http://xmlns.com/foaf/0.1/"),
        ]
        .into_iter()
        .collect()
    }

    /// Namespace bound to `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Whether `name` is bound.
    #[must_use]
    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Bind `name`. Rebinding keeps the original position.
    pub fn insert(&mut self, name: impl Into<String>, iri: impl Into<String>) {
        let name = name.into();
        let iri = iri.into();

        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = iri,
            None => self.entries.push((name, iri)),
        }
    }

    /// Unbind `name`, returning its namespace.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self.entries.iter().position(|(k, _)| k == name)?;
        Some(self.entries.remove(index).1)
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no bindings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render as turtle `@prefix` directives.
    #[must_use]
    pub fn to_turtle(&self) -> String {
        self.iter()
            .map(|(k, v)| format!("@prefix {k}: <{v}> .\n"))
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PrefixMap {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl Serialize for PrefixMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (k, v) in self.iter() {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PrefixMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PrefixMapVisitor;

        impl<'de> Visitor<'de> for PrefixMapVisitor {
            type Value = PrefixMap;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a map of prefix names to namespace IRIs")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map = PrefixMap::new();
                while let Some((k, v)) = access.next_entry::<String, String>()? {
                    map.insert(k, v);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(PrefixMapVisitor)
    }
}

/// Escape a lexical form for use inside a double quoted string.
#[must_use]
pub fn escape_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

/// Turn an IRI produced by [`parse`] back into the reference the document
/// used, if it was relative to the document itself.
///
/// ```
/// use fcrepo::turtle::{relative_to_document, DOCUMENT_BASE};
///
/// assert_eq!(relative_to_document(DOCUMENT_BASE), "");
/// assert_eq!(relative_to_document("http://document.invalid/#me"), "#me");
/// assert_eq!(relative_to_document("http://x/y"), "http://x/y");
/// ```
#[must_use]
pub fn relative_to_document(iri: &str) -> &str {
    iri.strip_prefix(DOCUMENT_BASE).unwrap_or(iri)
}

/// A parsed turtle document.
#[derive(Debug, Clone, Default)]
pub struct Document {
    /// Prefixes declared by the document itself, in declaration order.
    pub prefixes: PrefixMap,
    /// Statements in document order.
    pub triples: Vec<Triple>,
}

/// Malformed turtle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("turtle syntax error on line {line}: {message}")]
pub struct ParseError {
    /// One-based line number.
    pub line: usize,
    /// What went wrong.
    pub message: String,
}

impl From<TurtleParseError> for ParseError {
    fn from(e: TurtleParseError) -> Self {
        match e {
            TurtleParseError::Syntax(e) => Self {
                line: usize::try_from(e.location().start.line)
                    .map_or(usize::MAX, |line| line.saturating_add(1)),
                message: e.message().to_owned(),
            },
            TurtleParseError::Io(e) => Self {
                line: 1,
                message: e.to_string(),
            },
        }
    }
}

static PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:@prefix|(?i:prefix))\s+([^\s:]*):\s*<([^>]*)>").unwrap()
});

/// Parse a turtle document. Prefixed names the document does not declare
/// are looked up in `fallback`.
///
/// ```
/// use fcrepo::turtle::{parse, PrefixMap};
/// use oxrdf::Term;
///
/// let doc = parse("<> dc:title \"Hello\"@en .", &PrefixMap::default_global()).unwrap();
///
/// assert_eq!(doc.triples[0].predicate.as_str(), "http://purl.org/dc/elements/1.1/title");
/// assert!(matches!(&doc.triples[0].object, Term::Literal(l) if l.value() == "Hello"));
/// ```
///
/// # Errors
///
/// Fails on the first syntax error, reporting its line.
pub fn parse(src: &str, fallback: &PrefixMap) -> Result<Document, ParseError> {
    let mut parser = TurtleParser::new()
        .with_base_iri(DOCUMENT_BASE)
        .map_err(|e| invalid_iri(DOCUMENT_BASE, &e))?;

    for (name, iri) in fallback.iter() {
        parser = parser
            .with_prefix(name, iri)
            .map_err(|e| invalid_iri(iri, &e))?;
    }

    let triples = parser
        .for_reader(src.as_bytes())
        .collect::<Result<Vec<_>, _>>()?;

    let prefixes = PREFIX_RE
        .captures_iter(src)
        .map(|c| (c[1].to_owned(), c[2].to_owned()))
        .collect();

    Ok(Document { prefixes, triples })
}

fn invalid_iri(iri: &str, e: &impl std::fmt::Display) -> ParseError {
    ParseError {
        line: 1,
        message: format!("invalid prefix IRI <{iri}>: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use oxrdf::{Literal, NamedNode, Subject, Term};

    use super::*;

    fn parse_plain(src: &str) -> Document {
        parse(src, &PrefixMap::new()).unwrap()
    }

    fn iri(iri: &str) -> Term {
        NamedNode::new_unchecked(iri).into()
    }

    #[test]
    fn prefixes_and_lists() {
        let doc = parse_plain(
            r#"
            @prefix dc: <http://purl.org/dc/elements/1.1/> .
            PREFIX ex: <http://example.org/ns#>

            # a comment
            <> a ex:Thing ;
               dc:title "One", "Two" ;
               ex:count 3 ;
               .
            "#,
        );

        assert_eq!(
            doc.prefixes.iter().collect::<Vec<_>>(),
            vec![
                ("dc", "http://purl.org/dc/elements/1.1/"),
                ("ex", "http://example.org/ns#")
            ]
        );
        assert_eq!(doc.triples.len(), 4);
        assert_eq!(doc.triples[0].predicate.as_str(), RDF_TYPE);
        assert_eq!(doc.triples[0].object, iri("http://example.org/ns#Thing"));
        assert_eq!(doc.triples[2].object, Literal::new_simple_literal("Two").into());
        assert!(doc
            .triples
            .iter()
            .all(|t| t.subject == Subject::from(NamedNode::new_unchecked(DOCUMENT_BASE))));
    }

    #[test]
    fn nested_descriptions() {
        let doc = parse_plain(
            "@prefix schema: <http://schema.org/> .\n\
             <> schema:author [ schema:name \"Ann\" ] ;\n\
                schema:keywords ( \"a\" \"b\" ) .",
        );

        let author = doc
            .triples
            .iter()
            .find(|t| t.predicate.as_str() == "http://schema.org/author")
            .unwrap();
        let Term::BlankNode(node) = &author.object else {
            panic!("author should be a blank node");
        };
        assert!(doc
            .triples
            .iter()
            .any(|t| t.subject == Subject::from(node.clone())
                && t.object == Literal::new_simple_literal("Ann").into()));
    }

    #[test]
    fn document_prefix_shadows_fallback() {
        let fallback: PrefixMap = [("dc", "http://wrong/")].into_iter().collect();
        let doc = parse(
            "@prefix dc: <http://purl.org/dc/elements/1.1/> .\n<> dc:title \"x\" .",
            &fallback,
        )
        .unwrap();

        assert_eq!(
            doc.triples[0].predicate.as_str(),
            "http://purl.org/dc/elements/1.1/title"
        );
        assert_eq!(doc.prefixes.len(), 1);
    }

    #[test]
    fn base_resolution() {
        let doc = parse_plain("<> <http://x/p> <b>, <#frag> .");

        assert_eq!(doc.triples[0].object, iri("http://document.invalid/b"));
        assert_eq!(relative_to_document("http://document.invalid/#frag"), "#frag");

        let doc = parse_plain("@base <http://localhost:8080/rest/a/> .\n<> <http://x/p> <b> .");
        assert_eq!(doc.triples[0].object, iri("http://localhost:8080/rest/a/b"));
    }

    #[test]
    fn errors_report_line() {
        let err = parse(
            "<> <http://x/p> \"ok\" .\n\n<> nope:title \"x\" .",
            &PrefixMap::new(),
        )
        .unwrap_err();
        assert_eq!(err.line, 3);

        let err = parse("<> <http://x/p> .", &PrefixMap::new()).unwrap_err();
        assert_eq!(err.line, 1);
    }

    #[test]
    fn prefix_map_serde_keeps_order() {
        let map: PrefixMap = serde_json::from_str(r#"{"z":"http://z/","a":"http://a/"}"#).unwrap();

        assert_eq!(map.iter().map(|(k, _)| k).collect::<Vec<_>>(), vec!["z", "a"]);
        assert_eq!(
            serde_json::to_string(&map).unwrap(),
            r#"{"z":"http://z/","a":"http://a/"}"#
        );
    }

    #[test]
    fn literals_are_escaped() {
        assert_eq!(escape_literal("a\"b\nc"), "a\\\"b\\nc");
    }
}

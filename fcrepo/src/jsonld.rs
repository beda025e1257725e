//! Just enough expanded JSON-LD to read containment and ACLs.
use serde_json::{Map, Value};

pub(crate) type Node = Map<String, Value>;

/// Top-level nodes of an expanded document, which is either an array of
/// nodes or an object with a `@graph`.
pub(crate) fn nodes(doc: &Value) -> impl Iterator<Item = &Node> {
    let items: &[Value] = match doc {
        Value::Array(items) => items,
        Value::Object(obj) => match obj.get("@graph") {
            Some(Value::Array(items)) => items,
            _ => std::slice::from_ref(doc),
        },
        _ => &[],
    };

    items.iter().filter_map(Value::as_object)
}

/// The first node whose `@id` satisfies `is_subject`, falling back to the
/// first node.
pub(crate) fn subject(doc: &Value, is_subject: impl Fn(&str) -> bool) -> Option<&Node> {
    nodes(doc)
        .find(|node| node_id(node).map_or(false, &is_subject))
        .or_else(|| nodes(doc).next())
}

pub(crate) fn node_id(node: &Node) -> Option<&str> {
    node.get("@id")?.as_str()
}

fn objects<'a>(node: &'a Node, predicate: &str) -> impl Iterator<Item = &'a Node> {
    let values: &[Value] = match node.get(predicate) {
        Some(Value::Array(values)) => values,
        Some(value) => std::slice::from_ref(value),
        None => &[],
    };

    values.iter().filter_map(Value::as_object)
}

/// `@id`s of the objects of `predicate`.
pub(crate) fn ids<'a>(node: &'a Node, predicate: &str) -> impl Iterator<Item = &'a str> {
    objects(node, predicate).filter_map(|o| o.get("@id")?.as_str())
}

/// `@value`s, or `@id`s for IRI objects, of `predicate`.
pub(crate) fn values<'a>(node: &'a Node, predicate: &str) -> impl Iterator<Item = &'a str> {
    objects(node, predicate).filter_map(|o| o.get("@value").or_else(|| o.get("@id"))?.as_str())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn subject_by_id_or_first() {
        let doc = json!([
            { "@id": "http://h/rest/a/fcr:metadata" },
            { "@id": "http://h/rest/a", "p": [{ "@value": "v" }, { "@id": "http://x" }] }
        ]);

        let a = subject(&doc, |id| id == "http://h/rest/a").unwrap();
        assert_eq!(values(a, "p").collect::<Vec<_>>(), ["v", "http://x"]);
        assert_eq!(ids(a, "p").collect::<Vec<_>>(), ["http://x"]);

        let first = subject(&doc, |id| id == "http://other").unwrap();
        assert_eq!(node_id(first), Some("http://h/rest/a/fcr:metadata"));
    }

    #[test]
    fn graph_documents() {
        let doc = json!({ "@graph": [{ "@id": "x" }, { "@id": "y" }] });
        assert_eq!(nodes(&doc).count(), 2);

        let single = json!({ "@id": "x" });
        assert_eq!(nodes(&single).count(), 1);
        assert_eq!(nodes(&json!("nope")).count(), 0);
    }
}

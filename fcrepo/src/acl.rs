//! Web Access Control authorizations, indexed by the paths they protect.
//!
//! The tree is rebuilt from the repository on every walk (see
//! [`walk_tree`](crate::tree::walk_tree)) and never cached.
use std::{
    collections::{BTreeMap, BTreeSet},
    str::FromStr,
};

use serde::{ser::SerializeMap, Serialize, Serializer};
use serde_json::Value;
use strum::{Display, EnumString};
use tracing::trace;

use crate::{api::Endpoint, jsonld, path::RemotePath};

/// `acl:accessTo`
pub const ACL_ACCESS_TO: &str = "http://www.w3.org/ns/auth/acl#accessTo";

/// `acl:agent`
pub const ACL_AGENT: &str = "http://www.w3.org/ns/auth/acl#agent";

/// `acl:mode`
pub const ACL_MODE: &str = "http://www.w3.org/ns/auth/acl#mode";

/// Where authorizations are stored.
pub const ACL_ROOT: &str = "/acl";

/// Access modes that matter to this client. Other modes are ignored.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, Serialize,
)]
pub enum AccessMode {
    /// `acl:Read`
    Read,
    /// `acl:Write`
    Write,
}

/// Who may do what, as declared by one ACL resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AclDeclaration {
    /// The ACL resource the declaration came from.
    #[serde(rename = "_def")]
    pub defined_at: RemotePath,
    /// Agent names or IRIs.
    #[serde(rename = "_agents")]
    pub agents: Vec<String>,
    /// Granted modes.
    #[serde(rename = "_modes")]
    pub modes: BTreeSet<AccessMode>,
}

/// A declaration together with the path it protects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclStatement {
    /// Protected path.
    pub target: RemotePath,
    /// The declaration.
    pub declaration: AclDeclaration,
}

/// Read every authorization in an expanded JSON-LD ACL document. Each
/// `acl:accessTo` target yields one statement; targets outside the
/// repository are skipped.
#[must_use]
pub fn parse_statements(
    doc: &Value,
    defined_at: &RemotePath,
    endpoint: &Endpoint,
    tx: Option<&str>,
) -> Vec<AclStatement> {
    let mut statements = Vec::new();

    for node in jsonld::nodes(doc) {
        let targets: Vec<RemotePath> = jsonld::ids(node, ACL_ACCESS_TO)
            .filter_map(|uri| endpoint.remote_path(uri, tx))
            .collect();

        if targets.is_empty() {
            continue;
        }

        let declaration = AclDeclaration {
            defined_at: defined_at.clone(),
            agents: jsonld::values(node, ACL_AGENT).map(str::to_owned).collect(),
            modes: jsonld::ids(node, ACL_MODE)
                .filter_map(|iri| AccessMode::from_str(iri.rsplit('#').next()?).ok())
                .collect(),
        };

        statements.extend(targets.into_iter().map(|target| AclStatement {
            target,
            declaration: declaration.clone(),
        }));
    }

    statements
}

/// One node of an [`AclTree`].
///
/// Serializes its declaration as `_def`, `_agents` and `_modes` next to
/// its children. Child segments starting with `_` get another `_` in front
/// so they never collide with those keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AclNode {
    declaration: Option<AclDeclaration>,
    children: BTreeMap<String, AclNode>,
}

impl Serialize for AclNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;

        if let Some(declaration) = &self.declaration {
            map.serialize_entry("_def", &declaration.defined_at)?;
            map.serialize_entry("_agents", &declaration.agents)?;
            map.serialize_entry("_modes", &declaration.modes)?;
        }

        for (segment, child) in &self.children {
            if segment.starts_with('_') {
                map.serialize_entry(&format!("_{segment}"), child)?;
            } else {
                map.serialize_entry(segment, child)?;
            }
        }

        map.end()
    }
}

impl AclNode {
    /// The declaration made exactly at this node.
    #[must_use]
    pub fn declaration(&self) -> Option<&AclDeclaration> {
        self.declaration.as_ref()
    }

    /// A child by segment.
    #[must_use]
    pub fn child(&self, segment: &str) -> Option<&AclNode> {
        self.children.get(segment)
    }

    /// Child segments.
    pub fn children(&self) -> impl Iterator<Item = (&str, &AclNode)> {
        self.children.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Effective rights of one agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Access {
    /// May read.
    pub read: bool,
    /// May write.
    pub write: bool,
}

impl std::fmt::Display for Access {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.read, self.write) {
            (true, true) => write!(f, "read, write"),
            (true, false) => write!(f, "read"),
            (false, true) => write!(f, "write"),
            (false, false) => Ok(()),
        }
    }
}

/// Path-indexed tree of authorizations. Serializes as `{"/": root}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AclTree {
    root: AclNode,
}

impl AclTree {
    /// An empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a statement at its target, replacing any earlier declaration
    /// for the same path.
    pub fn insert(&mut self, statement: AclStatement) {
        trace!(target = %statement.target, def = %statement.declaration.defined_at, "acl");

        let mut node = &mut self.root;
        for segment in statement.target.segments() {
            node = node.children.entry(segment.to_owned()).or_default();
        }

        node.declaration = Some(statement.declaration);
    }

    /// The root node.
    #[must_use]
    pub fn root(&self) -> &AclNode {
        &self.root
    }

    /// The node exactly at `path`.
    #[must_use]
    pub fn node(&self, path: &RemotePath) -> Option<&AclNode> {
        path.segments()
            .try_fold(&self.root, |node, segment| node.child(segment))
    }

    /// The ACL resource declaring the node exactly at `path`.
    #[must_use]
    pub fn definition(&self, path: &RemotePath) -> Option<&RemotePath> {
        Some(&self.node(path)?.declaration()?.defined_at)
    }

    /// Effective access at `path`: the declaration of the nearest declaring
    /// node between the root and `path` (inclusive) applies in full.
    ///
    /// ```
    /// use std::collections::BTreeSet;
    /// use fcrepo::{acl::*, path::RemotePath};
    ///
    /// let mut tree = AclTree::new();
    /// tree.insert(AclStatement {
    ///     target: RemotePath::normalize("/secure"),
    ///     declaration: AclDeclaration {
    ///         defined_at: RemotePath::normalize("/acl/secure"),
    ///         agents: vec!["U".into()],
    ///         modes: BTreeSet::from([AccessMode::Read, AccessMode::Write]),
    ///     },
    /// });
    ///
    /// let access = tree.access(&RemotePath::normalize("/secure/sub"));
    /// assert_eq!(access["U"], Access { read: true, write: true });
    /// assert!(tree.access(&RemotePath::normalize("/public")).is_empty());
    /// ```
    #[must_use]
    pub fn access(&self, path: &RemotePath) -> BTreeMap<String, Access> {
        let mut nearest = self.root.declaration();
        let mut node = &self.root;

        for segment in path.segments() {
            match node.child(segment) {
                Some(child) => {
                    node = child;
                    if let Some(declaration) = child.declaration() {
                        nearest = Some(declaration);
                    }
                }
                None => break,
            }
        }

        let Some(declaration) = nearest else {
            return BTreeMap::new();
        };

        let access = Access {
            read: declaration.modes.contains(&AccessMode::Read),
            write: declaration.modes.contains(&AccessMode::Write),
        };

        declaration
            .agents
            .iter()
            .map(|agent| (agent.clone(), access))
            .collect()
    }
}

impl FromIterator<AclStatement> for AclTree {
    fn from_iter<T: IntoIterator<Item = AclStatement>>(iter: T) -> Self {
        let mut tree = Self::new();
        for statement in iter {
            tree.insert(statement);
        }
        tree
    }
}

impl Serialize for AclTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("/", &self.root)?;
        map.end()
    }
}

/// Where a new ACL for `path` is created.
#[must_use]
pub fn acl_path_for(path: &RemotePath) -> RemotePath {
    RemotePath::normalize(&format!("{ACL_ROOT}{path}"))
}

/// Starting point for a new ACL protecting `target`.
#[must_use]
pub fn template(target_url: &str) -> String {
    format!(
        "@prefix acl: <http://www.w3.org/ns/auth/acl#> .\n\
         \n\
         <> a acl:Authorization ;\n  \
           acl:accessTo <{target_url}> ;\n  \
           acl:agent \"admin\" ;\n  \
           acl:mode acl:Read, acl:Write .\n"
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn statement(target: &str, def: &str, agents: &[&str], modes: &[AccessMode]) -> AclStatement {
        AclStatement {
            target: RemotePath::normalize(target),
            declaration: AclDeclaration {
                defined_at: RemotePath::normalize(def),
                agents: agents.iter().map(|a| (*a).to_owned()).collect(),
                modes: modes.iter().copied().collect(),
            },
        }
    }

    #[test]
    fn nearest_declaration_wins_entirely() {
        let tree: AclTree = [
            statement("/", "/acl/root", &["admin"], &[AccessMode::Read, AccessMode::Write]),
            statement("/a", "/acl/a", &["U"], &[AccessMode::Read]),
            statement("/a/b/c", "/acl/c", &["V"], &[AccessMode::Write]),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            tree.access(&RemotePath::root()),
            BTreeMap::from([("admin".into(), Access { read: true, write: true })])
        );
        assert_eq!(
            tree.access(&RemotePath::normalize("/a/b")),
            BTreeMap::from([("U".into(), Access { read: true, write: false })])
        );
        assert_eq!(
            tree.access(&RemotePath::normalize("/a/b/c/d")),
            BTreeMap::from([("V".into(), Access { read: false, write: true })])
        );
        assert_eq!(
            tree.access(&RemotePath::normalize("/z")),
            BTreeMap::from([("admin".into(), Access { read: true, write: true })])
        );
    }

    #[test]
    fn later_declarations_replace_earlier_ones() {
        let tree: AclTree = [
            statement("/a", "/acl/one", &["U"], &[AccessMode::Read]),
            statement("/a", "/acl/two", &["V"], &[AccessMode::Write]),
        ]
        .into_iter()
        .collect();

        let a = RemotePath::normalize("/a");
        assert_eq!(tree.definition(&a).unwrap().as_str(), "/acl/two");
        assert_eq!(tree.access(&a).keys().collect::<Vec<_>>(), ["V"]);
        assert_eq!(tree.definition(&RemotePath::normalize("/a/b")), None);
    }

    #[test]
    fn dump_shape() {
        let tree: AclTree = [statement("/secure", "/acl/s", &["U"], &[AccessMode::Write, AccessMode::Read])]
            .into_iter()
            .collect();

        assert_eq!(
            serde_json::to_value(&tree).unwrap(),
            json!({
                "/": {
                    "secure": {
                        "_def": "/acl/s",
                        "_agents": ["U"],
                        "_modes": ["Read", "Write"],
                    }
                }
            })
        );
    }

    #[test]
    fn reserved_looking_segments_are_escaped() {
        let tree: AclTree = [
            statement("/_def", "/acl/a", &["U"], &[AccessMode::Read]),
            statement("/__x", "/acl/b", &["V"], &[AccessMode::Read]),
        ]
        .into_iter()
        .collect();

        let dump = serde_json::to_value(&tree).unwrap();
        assert!(dump["/"].get("_def").is_none());
        assert_eq!(dump["/"]["__def"]["_def"], "/acl/a");
        assert_eq!(dump["/"]["___x"]["_agents"], json!(["V"]));
    }

    #[test]
    fn parse_expanded_acl() {
        let endpoint = Endpoint::new("http://h", "/rest").unwrap();
        let doc = json!([
            {
                "@id": "http://h/rest/acl/a",
                "http://www.w3.org/ns/auth/acl#accessTo": [
                    { "@id": "http://h/rest/secure" },
                    { "@id": "http://h/rest/other" },
                ],
                "http://www.w3.org/ns/auth/acl#agent": [
                    { "@value": "U" },
                    { "@id": "http://x/people#v" },
                ],
                "http://www.w3.org/ns/auth/acl#mode": [
                    { "@id": "http://www.w3.org/ns/auth/acl#Read" },
                    { "@id": "http://www.w3.org/ns/auth/acl#Control" },
                ],
            },
            { "@id": "http://h/rest/acl/a#unrelated" },
        ]);

        let statements = parse_statements(&doc, &RemotePath::normalize("/acl/a"), &endpoint, None);
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].target.as_str(), "/secure");
        assert_eq!(statements[1].target.as_str(), "/other");
        assert_eq!(statements[0].declaration.agents, ["U", "http://x/people#v"]);
        assert_eq!(
            statements[0].declaration.modes,
            BTreeSet::from([AccessMode::Read])
        );
    }

    #[test]
    fn new_acl_location_and_template() {
        assert_eq!(
            acl_path_for(&RemotePath::normalize("/secure/sub")).as_str(),
            "/acl/secure/sub"
        );
        assert_eq!(acl_path_for(&RemotePath::root()).as_str(), "/acl");

        let template = template("http://h/rest/secure");
        assert!(template.contains("acl:accessTo <http://h/rest/secure>"));
        crate::turtle::parse(&template, &crate::turtle::PrefixMap::new()).unwrap();
    }
}

//! Depth-first walks over the remote hierarchy.
use std::collections::HashSet;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::{
    acl::{AclStatement, AclTree},
    errors::Error,
    location::Children,
    path::RemotePath,
};

/// A remote hierarchy that can be listed and asked for authorizations.
#[async_trait]
pub trait RemoteTree: Send + Sync {
    /// List the members of a resource.
    async fn list_children(&self, path: &RemotePath) -> crate::Result<Children>;

    /// Authorizations declared by the ACL resource at `path`.
    async fn acl_declarations(&self, path: &RemotePath) -> crate::Result<Vec<AclStatement>>;
}

/// A pre-order walk driven one step at a time. Each step lists exactly one
/// resource, so at most one request is in flight. Paths are only ever
/// visited once; meeting one again is an error. Members outside the root
/// are skipped.
#[derive(Debug)]
pub struct Walker<'a, T: ?Sized> {
    source: &'a T,
    root: RemotePath,
    stack: Vec<RemotePath>,
    visited: HashSet<RemotePath>,
}

impl<'a, T: RemoteTree + ?Sized> Walker<'a, T> {
    /// Start walking at `root`.
    pub fn new(source: &'a T, root: RemotePath) -> Self {
        Self {
            source,
            visited: HashSet::from([root.clone()]),
            stack: vec![root.clone()],
            root,
        }
    }

    /// List the next resource.
    ///
    /// # Errors
    ///
    /// - listing failed
    /// - [`Error::CycleDetected`] when a member points back at an already
    ///   visited path
    pub async fn step(&mut self) -> crate::Result<Option<(RemotePath, Children)>> {
        let Some(path) = self.stack.pop() else {
            return Ok(None);
        };

        let children = self.source.list_children(&path).await?;

        for name in children.names().iter().rev() {
            let child = path.join(name);

            if child != self.root && !child.is_descendant_of(&self.root) {
                warn!(%path, %child, "skipping member outside the walked tree");
                continue;
            }

            if !self.visited.insert(child.clone()) {
                return Err(Error::CycleDetected(child));
            }

            self.stack.push(child);
        }

        Ok(Some((path, children)))
    }
}

/// Build the authorization tree from every ACL resource below `root`.
/// Nothing is returned unless the whole walk succeeds.
///
/// # Errors
///
/// - any listing or ACL request failed
/// - [`Error::CycleDetected`]
#[instrument(skip(source))]
pub async fn walk_tree<T: RemoteTree + ?Sized>(source: &T, root: &RemotePath) -> crate::Result<AclTree> {
    let mut walker = Walker::new(source, root.clone());
    let mut tree = AclTree::new();
    let mut visited = 0_usize;

    while let Some((path, children)) = walker.step().await? {
        visited += 1;

        if children.is_binary() {
            continue;
        }

        for statement in source.acl_declarations(&path).await? {
            tree.insert(statement);
        }
    }

    debug!(visited, "acl walk complete");

    Ok(tree)
}

#[cfg(test)]
mod tests {
    use std::{
        collections::{BTreeSet, HashMap},
        sync::Mutex,
    };

    use super::*;
    use crate::acl::{Access, AccessMode, AclDeclaration};

    #[derive(Default)]
    struct FakeTree {
        children: HashMap<&'static str, Children>,
        acls: HashMap<&'static str, Vec<AclStatement>>,
        requests: Mutex<Vec<String>>,
    }

    impl FakeTree {
        fn container(mut self, path: &'static str, names: &[&str]) -> Self {
            self.children.insert(
                path,
                Children::Container(names.iter().map(|n| (*n).to_owned()).collect()),
            );
            self
        }

        fn binary(mut self, path: &'static str) -> Self {
            self.children.insert(path, Children::Binary);
            self
        }

        fn acl(mut self, path: &'static str, target: &str, agent: &str) -> Self {
            self.acls.entry(path).or_default().push(AclStatement {
                target: RemotePath::normalize(target),
                declaration: AclDeclaration {
                    defined_at: RemotePath::normalize(path),
                    agents: vec![agent.to_owned()],
                    modes: BTreeSet::from([AccessMode::Read, AccessMode::Write]),
                },
            });
            self
        }
    }

    #[async_trait]
    impl RemoteTree for FakeTree {
        async fn list_children(&self, path: &RemotePath) -> crate::Result<Children> {
            self.requests.lock().unwrap().push(format!("ls {path}"));
            self.children
                .get(path.as_str())
                .cloned()
                .ok_or_else(|| Error::NotFound(path.clone()))
        }

        async fn acl_declarations(&self, path: &RemotePath) -> crate::Result<Vec<AclStatement>> {
            self.requests.lock().unwrap().push(format!("acl {path}"));
            Ok(self.acls.get(path.as_str()).cloned().unwrap_or_default())
        }
    }

    #[tokio::test]
    async fn builds_tree_in_pre_order() {
        let source = FakeTree::default()
            .container("/acl", &["a", "b"])
            .container("/acl/a", &["x"])
            .container("/acl/a/x", &[])
            .container("/acl/b", &[])
            .acl("/acl/a/x", "/secure", "U")
            .acl("/acl/b", "/open", "V");

        let tree = walk_tree(&source, &RemotePath::normalize("/acl")).await.unwrap();

        assert_eq!(
            *source.requests.lock().unwrap(),
            [
                "ls /acl", "acl /acl", "ls /acl/a", "acl /acl/a", "ls /acl/a/x",
                "acl /acl/a/x", "ls /acl/b", "acl /acl/b"
            ]
        );
        assert_eq!(
            tree.access(&RemotePath::normalize("/secure/sub"))["U"],
            Access { read: true, write: true }
        );
        assert_eq!(
            tree.definition(&RemotePath::normalize("/open")).unwrap().as_str(),
            "/acl/b"
        );
    }

    #[tokio::test]
    async fn binaries_are_not_asked_for_acls() {
        let source = FakeTree::default()
            .container("/acl", &["file"])
            .binary("/acl/file");

        walk_tree(&source, &RemotePath::normalize("/acl")).await.unwrap();

        assert_eq!(
            *source.requests.lock().unwrap(),
            ["ls /acl", "acl /acl", "ls /acl/file"]
        );
    }

    #[tokio::test]
    async fn back_references_are_cycles() {
        for member in ["/acl", "..", "/acl/a"] {
            let source = FakeTree::default()
                .container("/acl", &["a"])
                .container("/acl/a", &[member]);

            let err = walk_tree(&source, &RemotePath::normalize("/acl"))
                .await
                .unwrap_err();

            assert!(matches!(err, Error::CycleDetected(_)), "{member}: {err}");
        }
    }

    #[tokio::test]
    async fn errors_discard_the_walk() {
        let source = FakeTree::default()
            .container("/acl", &["a", "missing"])
            .container("/acl/a", &[])
            .acl("/acl/a", "/x", "U");

        let err = walk_tree(&source, &RemotePath::normalize("/acl"))
            .await
            .unwrap_err();

        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn members_outside_the_root_are_skipped() {
        let source = FakeTree::default()
            .container("/acl", &["a", "/elsewhere", ".."])
            .container("/acl/a", &["/other/deep"])
            .container("/elsewhere", &["x"])
            .acl("/elsewhere", "/x", "U");

        let tree = walk_tree(&source, &RemotePath::normalize("/acl")).await.unwrap();

        assert_eq!(
            *source.requests.lock().unwrap(),
            ["ls /acl", "acl /acl", "ls /acl/a", "acl /acl/a"]
        );
        assert!(tree.access(&RemotePath::normalize("/x")).is_empty());
    }
}

//! Remote and local paths.
//!
//! Remote paths address resources relative to the repository base path
//! (e.g. `/rest`) and always use forward slashes. Local paths are plain
//! filesystem paths and are resolved by [`resolve_local_path`]. The two are
//! never mixed.
use std::{
    fmt::Display,
    path::{Path, PathBuf},
    str::FromStr,
};

use derive_more::{AsRef, Deref};
use serde_with::{DeserializeFromStr, SerializeDisplay};

/// Description of a binary resource.
pub const FCR_METADATA: &str = "fcr:metadata";

/// Marker left behind by a deleted resource.
pub const FCR_TOMBSTONE: &str = "fcr:tombstone";

/// Version history of a resource.
pub const FCR_VERSIONS: &str = "fcr:versions";

/// Transaction endpoint.
pub const FCR_TX: &str = "/fcr:tx";

/// Commit the active transaction.
pub const FCR_TX_COMMIT: &str = "/fcr:tx/fcr:commit";

/// Roll back the active transaction.
pub const FCR_TX_ROLLBACK: &str = "/fcr:tx/fcr:rollback";

/// An absolute, normalized path to a resource in the repository.
///
/// ```
/// use fcrepo::path::RemotePath;
///
/// let path: RemotePath = "//a/./b/../c/".parse().unwrap();
/// assert_eq!(path.as_str(), "/a/c");
/// assert_eq!(RemotePath::root().as_str(), "/");
/// ```
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    SerializeDisplay,
    DeserializeFromStr,
    Deref,
    AsRef,
)]
#[allow(clippy::module_name_repetitions)]
pub struct RemotePath(String);

impl RemotePath {
    /// The repository root, `/`.
    #[must_use]
    pub fn root() -> Self {
        Self("/".into())
    }

    /// Normalize an arbitrary slash-delimited string. The result is
    /// always absolute; `..` never climbs above the root.
    #[must_use]
    pub fn normalize(raw: &str) -> Self {
        Self::from_segments(split(raw))
    }

    fn from_segments<'a>(segments: impl IntoIterator<Item = &'a str>) -> Self {
        let mut stack: Vec<&str> = Vec::new();

        for segment in segments {
            match segment {
                "" | "." => {}
                ".." => {
                    stack.pop();
                }
                s => stack.push(s),
            }
        }

        Self(format!("/{}", stack.join("/")))
    }

    /// The path as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the repository root.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Non-empty segments, root first. The root itself has none.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Last segment, or `None` for the root.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.segments().last()
    }

    /// Parent path. The root is its own parent.
    #[must_use]
    pub fn parent(&self) -> Self {
        self.join("..")
    }

    /// Resolve `input` against this path.
    #[must_use]
    pub fn join(&self, input: &str) -> Self {
        resolve_remote_path(Some(input), self)
    }

    /// Whether `self` is strictly below `ancestor`.
    #[must_use]
    pub fn is_descendant_of(&self, ancestor: &RemotePath) -> bool {
        if ancestor.is_root() {
            return !self.is_root();
        }

        self.0
            .strip_prefix(ancestor.as_str())
            .map_or(false, |rest| rest.starts_with('/'))
    }

    /// `self` relative to `ancestor`, if it is a descendant.
    #[must_use]
    pub fn relative_to(&self, ancestor: &RemotePath) -> Option<&str> {
        if !self.is_descendant_of(ancestor) {
            return None;
        }

        let rest = &self.0[ancestor.0.len()..];
        Some(rest.trim_start_matches('/'))
    }

    /// The RDF description of a binary resource.
    ///
    /// Callers decide when a binary should be redirected here; the
    /// resolver never does it implicitly.
    #[must_use]
    pub fn metadata(&self) -> Self {
        self.child(FCR_METADATA)
    }

    /// The tombstone of a deleted resource.
    #[must_use]
    pub fn tombstone(&self) -> Self {
        self.child(FCR_TOMBSTONE)
    }

    /// The version listing of a resource, or one named version.
    #[must_use]
    pub fn versions(&self, name: Option<&str>) -> Self {
        let versions = self.child(FCR_VERSIONS);

        match name {
            Some(name) => versions.child(name),
            None => versions,
        }
    }

    fn child(&self, segment: &str) -> Self {
        if self.is_root() {
            Self(format!("/{segment}"))
        } else {
            Self(format!("{}/{segment}", self.0))
        }
    }
}

impl Default for RemotePath {
    fn default() -> Self {
        Self::root()
    }
}

impl Display for RemotePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RemotePath {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::normalize(s))
    }
}

fn split(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(|c| c == '/' || c == '\\')
}

/// Resolve a user supplied remote path against the current directory.
///
/// Absolute input ignores `cwd`. Relative input is joined to `cwd` by URL
/// segments, never with OS path semantics. Missing input means `.`.
///
/// ```
/// use fcrepo::path::{resolve_remote_path, RemotePath};
///
/// let cwd = RemotePath::normalize("/collection/item");
///
/// assert_eq!(resolve_remote_path(None, &cwd), cwd);
/// assert_eq!(resolve_remote_path(Some("../other"), &cwd).as_str(), "/collection/other");
/// assert_eq!(resolve_remote_path(Some("/abs//x/"), &cwd).as_str(), "/abs/x");
/// assert_eq!(resolve_remote_path(Some("a\\b"), &cwd).as_str(), "/collection/item/a/b");
/// ```
#[must_use]
pub fn resolve_remote_path(input: Option<&str>, cwd: &RemotePath) -> RemotePath {
    let input = input.map(str::trim).unwrap_or(".");

    if input.starts_with('/') {
        return RemotePath::normalize(input);
    }

    RemotePath::from_segments(split(cwd.as_str()).chain(split(input)))
}

/// Resolve a path on the local filesystem: `~` and `~/` expand to the home
/// directory, `~user` is taken literally, relative paths are relative to the process working directory.
///
/// # Errors
///
/// - no home directory could be determined
/// - the current working directory is unavailable
pub fn resolve_local_path(input: &str) -> std::io::Result<PathBuf> {
    let input = input.trim();

    let home_relative = match input.strip_prefix('~') {
        Some("") => Some(""),
        Some(rest) if rest.starts_with(['/', '\\']) => Some(rest),
        _ => None,
    };

    if let Some(rest) = home_relative {
        let home = dirs::home_dir().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "no home directory")
        })?;

        return Ok(home.join(rest.trim_start_matches(['/', '\\'])));
    }

    let path = Path::new(input);

    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

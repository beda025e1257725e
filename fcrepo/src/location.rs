//! What lives at a remote path, and what lives below it.
use reqwest::{header, StatusCode};
use serde_json::Value;
use tracing::warn;

use crate::{
    api::{ContentDisposition, Endpoint, Links, Response, LDP_NON_RDF_SOURCE, REL_DESCRIBEDBY, REL_TYPE},
    errors::Error,
    jsonld,
    path::RemotePath,
    sparql::LDP_CONTAINS,
};

/// Kind of resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ResourceKind {
    /// An RDF source that can contain other resources.
    Container,
    /// An opaque binary with a separate RDF description.
    Binary,
}

/// What a `HEAD` tells about a resource.
#[derive(Debug, Clone)]
pub struct ResourceInfo {
    /// The resource.
    pub path: RemotePath,
    /// Response status.
    pub status: StatusCode,
    /// Container or binary.
    pub kind: ResourceKind,
    /// Parsed `Link` headers.
    pub links: Links,
    /// `Content-Type`, if any.
    pub content_type: Option<String>,
    /// Parsed `Content-Disposition`, only sent for binaries.
    pub content_disposition: Option<ContentDisposition>,
}

impl ResourceInfo {
    /// Classify a successful `HEAD` response. A resource is a binary when it
    /// advertises the `NonRDFSource` interaction model or carries a
    /// `Content-Disposition`.
    #[must_use]
    pub fn from_response(path: RemotePath, res: &Response) -> Self {
        let links = res.links();
        let content_disposition = res.content_disposition();

        let kind = if links.has(REL_TYPE, LDP_NON_RDF_SOURCE) || content_disposition.is_some() {
            ResourceKind::Binary
        } else {
            ResourceKind::Container
        };

        Self {
            path,
            status: res.status,
            kind,
            links,
            content_type: res
                .headers
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned),
            content_disposition,
        }
    }

    /// Whether this is a binary.
    #[must_use]
    pub fn is_binary(&self) -> bool {
        self.kind == ResourceKind::Binary
    }

    /// Where the RDF that describes this resource lives. For binaries this
    /// is the `describedby` link, or `fcr:metadata` if the server sent none.
    #[must_use]
    pub fn description(&self, endpoint: &Endpoint, tx: Option<&str>) -> RemotePath {
        if !self.is_binary() {
            return self.path.clone();
        }

        self.links
            .first(REL_DESCRIBEDBY)
            .and_then(|uri| endpoint.remote_path(uri, tx))
            .unwrap_or_else(|| self.path.metadata())
    }

    /// The binary's file name, if the server reported one.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.content_disposition.as_ref()?.filename()
    }
}

/// Proof that a path was just confirmed to be an existing container. The
/// only way to change the working directory of a
/// [`Session`](crate::session::Session).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedContainer(RemotePath);

impl ConfirmedContainer {
    pub(crate) fn confirm(info: &ResourceInfo) -> crate::Result<Self> {
        match info.kind {
            ResourceKind::Container => Ok(Self(info.path.clone())),
            ResourceKind::Binary => Err(Error::NotAContainer(info.path.clone())),
        }
    }

    /// The confirmed path.
    #[must_use]
    pub fn path(&self) -> &RemotePath {
        &self.0
    }

    pub(crate) fn into_path(self) -> RemotePath {
        self.0
    }
}

/// Result of listing a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Children {
    /// The resource is a binary and has no children.
    Binary,
    /// Members of a container, sorted. Usually single segments relative to
    /// the container; members reported outside of it are absolute.
    Container(Vec<String>),
}

impl Children {
    /// Member names, empty for binaries.
    #[must_use]
    pub fn names(&self) -> &[String] {
        match self {
            Self::Binary => &[],
            Self::Container(names) => names,
        }
    }

    /// Whether the listed resource is a binary.
    #[must_use]
    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Binary)
    }
}

/// Extract the `ldp:contains` members of `container` from an expanded
/// JSON-LD document and express them relative to it.
///
/// ```
/// use fcrepo::{api::Endpoint, location::contained_members, path::RemotePath};
/// use serde_json::json;
///
/// let endpoint = Endpoint::new("http://h", "/rest").unwrap();
/// let doc = json!([{
///     "@id": "http://h/rest/a",
///     "http://www.w3.org/ns/ldp#contains": [
///         { "@id": "http://h/rest/a/c" },
///         { "@id": "http://h/rest/a/b" },
///         { "@id": "http://h/rest/elsewhere" },
///     ]
/// }]);
///
/// let names = contained_members(&doc, &endpoint, None, &RemotePath::normalize("/a"));
/// assert_eq!(names, ["/elsewhere", "b", "c"]);
/// ```
#[must_use]
pub fn contained_members(
    doc: &Value,
    endpoint: &Endpoint,
    tx: Option<&str>,
    container: &RemotePath,
) -> Vec<String> {
    let is_container = |id: &str| endpoint.remote_path(id, tx).as_ref() == Some(container);
    let Some(node) = jsonld::subject(doc, is_container) else {
        return Vec::new();
    };

    let mut names: Vec<String> = jsonld::ids(node, LDP_CONTAINS)
        .filter_map(|member| {
            let path = endpoint.remote_path(member, tx);
            if path.is_none() {
                warn!(member, "ignoring member outside the repository");
            }
            path
        })
        .map(|member| match member.relative_to(container) {
            Some(rel) => rel.to_owned(),
            None => member.to_string(),
        })
        .collect();

    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use reqwest::header::{HeaderMap, HeaderValue};

    use super::*;

    fn head(headers: &[(&'static str, &'static str)]) -> Response {
        let mut map = HeaderMap::new();
        for (k, v) in headers {
            map.append(*k, HeaderValue::from_static(*v));
        }

        Response {
            status: StatusCode::OK,
            headers: map,
            body: Bytes::new(),
        }
    }

    #[test]
    fn classification() {
        let container = ResourceInfo::from_response(
            RemotePath::normalize("/a"),
            &head(&[("link", "<http://www.w3.org/ns/ldp#BasicContainer>;rel=\"type\"")]),
        );
        assert_eq!(container.kind, ResourceKind::Container);

        let by_link = ResourceInfo::from_response(
            RemotePath::normalize("/a/b"),
            &head(&[("link", "<http://www.w3.org/ns/ldp#NonRDFSource>;rel=\"type\"")]),
        );
        assert!(by_link.is_binary());

        let by_disposition = ResourceInfo::from_response(
            RemotePath::normalize("/a/b"),
            &head(&[("content-disposition", "attachment; filename=\"b.png\"")]),
        );
        assert!(by_disposition.is_binary());
        assert_eq!(by_disposition.filename(), Some("b.png"));
    }

    #[test]
    fn description_follows_describedby() {
        let endpoint = Endpoint::new("http://h", "/rest").unwrap();
        let info = ResourceInfo::from_response(
            RemotePath::normalize("/a/b"),
            &head(&[
                ("link", "<http://www.w3.org/ns/ldp#NonRDFSource>;rel=\"type\""),
                ("link", "<http://h/rest/tx:1/a/b/desc>;rel=\"describedby\""),
            ]),
        );

        assert_eq!(info.description(&endpoint, Some("tx:1")).as_str(), "/a/b/desc");

        let bare = ResourceInfo::from_response(
            RemotePath::normalize("/a/b"),
            &head(&[("content-disposition", "attachment")]),
        );
        assert_eq!(bare.description(&endpoint, None).as_str(), "/a/b/fcr:metadata");

        let container = ResourceInfo::from_response(RemotePath::normalize("/a"), &head(&[]));
        assert_eq!(container.description(&endpoint, None).as_str(), "/a");
    }

    #[test]
    fn only_containers_are_confirmed() {
        let container = ResourceInfo::from_response(RemotePath::normalize("/a"), &head(&[]));
        assert_eq!(
            ConfirmedContainer::confirm(&container).unwrap().path().as_str(),
            "/a"
        );

        let binary = ResourceInfo::from_response(
            RemotePath::normalize("/a/b"),
            &head(&[("content-disposition", "attachment")]),
        );
        assert!(matches!(
            ConfirmedContainer::confirm(&binary),
            Err(Error::NotAContainer(_))
        ));
    }

    #[test]
    fn members_inside_transactions_and_self_references() {
        let endpoint = Endpoint::new("http://h", "/rest").unwrap();
        let doc = serde_json::json!([{
            "@id": "http://h/rest/tx:1/a",
            "http://www.w3.org/ns/ldp#contains": [
                { "@id": "http://h/rest/tx:1/a/x" },
                { "@id": "http://h/rest/tx:1/a" },
                { "@id": "https://nowhere/a/y" },
            ]
        }]);

        assert_eq!(
            contained_members(&doc, &endpoint, Some("tx:1"), &RemotePath::normalize("/a")),
            ["/a", "x"]
        );
    }

    #[test]
    fn empty_container() {
        let endpoint = Endpoint::new("http://h", "/rest").unwrap();
        let doc = serde_json::json!([{ "@id": "http://h/rest/a" }]);

        assert!(contained_members(&doc, &endpoint, None, &RemotePath::normalize("/a")).is_empty());
    }

    #[test]
    fn encoded_member_names_are_decoded() {
        let endpoint = Endpoint::new("http://h", "/rest").unwrap();
        let doc = serde_json::json!([{
            "@id": "http://h/rest/my%20files",
            "http://www.w3.org/ns/ldp#contains": [
                { "@id": "http://h/rest/my%20files/a%23b.png" },
                { "@id": "http://h/rest/my%20files/%C3%A9t%C3%A9%3F" },
            ]
        }]);

        let container = RemotePath::normalize("/my files");
        assert_eq!(
            contained_members(&doc, &endpoint, None, &container),
            ["a#b.png", "été?"]
        );
        assert_eq!(
            endpoint.url(&container.join("a#b.png"), None).unwrap().as_str(),
            "http://h/rest/my%20files/a%23b.png"
        );
    }
}

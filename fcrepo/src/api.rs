//! Request and response plumbing for the repository REST API.
use std::{collections::BTreeMap, path::PathBuf};

use bytes::Bytes;
use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::Regex;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Body, Method, StatusCode, Url,
};
use serde::de::DeserializeOwned;
use tokio_util::io::ReaderStream;
use tracing::trace;

use crate::{errors::Error, path::RemotePath};

/// `Prefer` header for reading a representation that is about to be edited.
pub const PREFER_REPRESENTATION: &str =
    "return=representation; omit=\"http://fedora.info/definitions/v4/repository#ServerManaged\"";

/// `Prefer` header for writes that should ignore server-managed triples.
pub const PREFER_LENIENT: &str = "handling=lenient; received=\"minimal\"";

/// `rel` of the `Link` pointing at the description of a binary.
pub const REL_DESCRIBEDBY: &str = "describedby";

/// `rel` of the `Link`s listing a resource's interaction models.
pub const REL_TYPE: &str = "type";

/// Interaction model of binary resources.
pub const LDP_NON_RDF_SOURCE: &str = "http://www.w3.org/ns/ldp#NonRDFSource";

/// The WebDAV `COPY` method.
pub static COPY: Lazy<Method> = Lazy::new(|| Method::from_bytes(b"COPY").unwrap());

/// The WebDAV `MOVE` method.
pub static MOVE: Lazy<Method> = Lazy::new(|| Method::from_bytes(b"MOVE").unwrap());

/// Where the repository lives: the server origin and the path its REST API
/// is mounted at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    base_path: String,
}

impl Endpoint {
    /// Create an endpoint. Trailing slashes are ignored, and a base path
    /// without a leading slash gets one.
    ///
    /// ```
    /// use fcrepo::api::Endpoint;
    ///
    /// let endpoint = Endpoint::new("http://localhost:3000/", "fcrepo/rest/").unwrap();
    /// assert_eq!(endpoint.prefix(None), "http://localhost:3000/fcrepo/rest");
    /// assert_eq!(endpoint.prefix(Some("tx:42")), "http://localhost:3000/fcrepo/rest/tx:42");
    /// ```
    ///
    /// # Errors
    ///
    /// The host is not an absolute URL.
    pub fn new(host: &str, base_path: &str) -> crate::Result<Self> {
        let host = host.trim().trim_end_matches('/');
        Url::parse(host)?;

        let base_path = base_path.trim().trim_matches('/');
        let base_path = if base_path.is_empty() {
            String::new()
        } else {
            format!("/{base_path}")
        };

        Ok(Self {
            host: host.to_owned(),
            base_path,
        })
    }

    /// The server origin, without a trailing slash.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The base path, e.g. `/fcrepo/rest`. Empty when the API is mounted
    /// at the root.
    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Everything in front of a remote path, including the transaction
    /// segment when `tx` is given.
    #[must_use]
    pub fn prefix(&self, tx: Option<&str>) -> String {
        match tx {
            Some(tx) => format!("{}{}/{tx}", self.host, self.base_path),
            None => format!("{}{}", self.host, self.base_path),
        }
    }

    /// Absolute URL of a remote path. Every segment is percent-encoded, so
    /// `#`, `?` and spaces stay part of the name.
    ///
    /// ```
    /// use fcrepo::{api::Endpoint, path::RemotePath};
    ///
    /// let endpoint = Endpoint::new("http://h", "/rest").unwrap();
    /// let url = endpoint.url(&RemotePath::normalize("/a#b/c d?"), None).unwrap();
    ///
    /// assert_eq!(url.as_str(), "http://h/rest/a%23b/c%20d%3F");
    /// ```
    ///
    /// # Errors
    ///
    /// The result is not a valid URL.
    pub fn url(&self, path: &RemotePath, tx: Option<&str>) -> crate::Result<Url> {
        let mut url = Url::parse(&self.prefix(tx))?;

        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| Error::Validation(format!("{} cannot hold a path", self.host)))?;
            segments.pop_if_empty();

            if path.is_root() {
                segments.push("");
            } else {
                segments.extend(path.segments());
            }
        }

        Ok(url)
    }

    /// Map a URI the repository handed back to a remote path. URIs inside
    /// the active transaction are recognized as well as plain ones, and
    /// percent-encoded segments are decoded. Returns `None` for URIs
    /// outside the repository.
    ///
    /// ```
    /// use fcrepo::api::Endpoint;
    ///
    /// let endpoint = Endpoint::new("http://h", "/rest").unwrap();
    ///
    /// let path = endpoint.remote_path("http://h/rest/tx:1/a/b", Some("tx:1"));
    /// assert_eq!(path.unwrap().as_str(), "/a/b");
    /// assert_eq!(endpoint.remote_path("http://h/rest", None).unwrap().as_str(), "/");
    /// assert!(endpoint.remote_path("http://elsewhere/rest/a", None).is_none());
    /// assert!(endpoint.remote_path("http://h/restless", None).is_none());
    /// assert_eq!(endpoint.remote_path("http://h/rest/a%23b", None).unwrap().as_str(), "/a#b");
    /// ```
    #[must_use]
    pub fn remote_path(&self, uri: &str, tx: Option<&str>) -> Option<RemotePath> {
        let candidates = tx
            .map(|tx| self.prefix(Some(tx)))
            .into_iter()
            .chain(std::iter::once(self.prefix(None)));

        for prefix in candidates {
            if let Some(rest) = uri.strip_prefix(&prefix) {
                if rest.is_empty() || rest.starts_with('/') {
                    let rest = rest.split(['#', '?']).next().unwrap_or_default();
                    let decoded = percent_decode_str(rest).decode_utf8_lossy();
                    return Some(RemotePath::normalize(&decoded));
                }
            }
        }

        None
    }

    /// The local login endpoint.
    ///
    /// # Errors
    ///
    /// The result is not a valid URL.
    pub fn login_url(&self) -> crate::Result<Url> {
        Ok(Url::parse(&format!("{}/auth/local", self.host))?)
    }
}

/// Request body.
#[derive(Debug, Clone, Default)]
pub enum Payload {
    /// No body.
    #[default]
    Empty,
    /// In-memory body.
    Bytes(Bytes),
    /// Streamed from a local file. The file is opened every time the
    /// request is sent, so retries send the whole file again.
    File(PathBuf),
}

impl Payload {
    pub(crate) async fn to_body(&self) -> crate::Result<Option<(Body, u64)>> {
        match self {
            Self::Empty => Ok(None),
            Self::Bytes(bytes) => Ok(Some((Body::from(bytes.clone()), bytes.len() as u64))),
            Self::File(path) => {
                let file = tokio::fs::File::open(path).await?;
                let len = file.metadata().await?.len();

                trace!(?path, len, "streaming file body");

                Ok(Some((Body::wrap_stream(ReaderStream::new(file)), len)))
            }
        }
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Self::Bytes(s.into())
    }
}

impl From<&'static str> for Payload {
    fn from(s: &'static str) -> Self {
        Self::Bytes(Bytes::from_static(s.as_bytes()))
    }
}

/// A request against a remote path.
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method.
    pub method: Method,
    /// Target resource.
    pub path: RemotePath,
    /// Extra headers.
    pub headers: HeaderMap,
    /// Body.
    pub payload: Payload,
    /// `Destination` of copies and moves.
    pub destination: Option<RemotePath>,
}

impl Request {
    /// A bare request.
    #[must_use]
    pub fn new(method: Method, path: RemotePath) -> Self {
        Self {
            method,
            path,
            headers: HeaderMap::new(),
            payload: Payload::Empty,
            destination: None,
        }
    }

    /// `GET`
    #[must_use]
    pub fn get(path: RemotePath) -> Self {
        Self::new(Method::GET, path)
    }

    /// `HEAD`
    #[must_use]
    pub fn head(path: RemotePath) -> Self {
        Self::new(Method::HEAD, path)
    }

    /// `POST`
    #[must_use]
    pub fn post(path: RemotePath) -> Self {
        Self::new(Method::POST, path)
    }

    /// `PUT`
    #[must_use]
    pub fn put(path: RemotePath) -> Self {
        Self::new(Method::PUT, path)
    }

    /// `PATCH`
    #[must_use]
    pub fn patch(path: RemotePath) -> Self {
        Self::new(Method::PATCH, path)
    }

    /// `DELETE`
    #[must_use]
    pub fn delete(path: RemotePath) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Set a header, replacing any previous value.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set a header from user input such as `Accept: text/turtle`.
    ///
    /// # Errors
    ///
    /// The line is not a valid `name: value` pair.
    pub fn raw_header(mut self, line: &str) -> crate::Result<Self> {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| Error::Validation(format!("invalid header: {line}")))?;

        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .map_err(|_| Error::Validation(format!("invalid header name: {name}")))?;
        let value = HeaderValue::from_str(value.trim())
            .map_err(|_| Error::Validation(format!("invalid header value: {value}")))?;

        self.headers.append(name, value);
        Ok(self)
    }

    /// Set the body.
    #[must_use]
    pub fn payload(mut self, payload: impl Into<Payload>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Set the `Destination` of a copy or move.
    #[must_use]
    pub fn destination(mut self, path: RemotePath) -> Self {
        self.destination = Some(path);
        self
    }
}

/// A buffered response.
#[derive(Debug, Clone)]
pub struct Response {
    /// Status code.
    pub status: StatusCode,
    /// Headers.
    pub headers: HeaderMap,
    /// Body.
    pub body: Bytes,
}

impl Response {
    pub(crate) async fn read(res: reqwest::Response) -> crate::Result<Self> {
        let status = res.status();
        let headers = res.headers().clone();
        let body = res.bytes().await?;

        Ok(Self {
            status,
            headers,
            body,
        })
    }

    /// The body as text, replacing invalid UTF-8.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Parse the body as JSON.
    ///
    /// # Errors
    ///
    /// The body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> crate::Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// All `Link` headers.
    #[must_use]
    pub fn links(&self) -> Links {
        Links::parse(
            self.headers
                .get_all(reqwest::header::LINK)
                .iter()
                .filter_map(|v| v.to_str().ok()),
        )
    }

    /// The `Location` header.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(reqwest::header::LOCATION)?
            .to_str()
            .ok()
    }

    /// The parsed `Content-Disposition` header.
    #[must_use]
    pub fn content_disposition(&self) -> Option<ContentDisposition> {
        let value = self
            .headers
            .get(reqwest::header::CONTENT_DISPOSITION)?
            .to_str()
            .ok()?;

        Some(ContentDisposition::parse(value))
    }

    /// Turn an unsuccessful status into an error about `path`.
    ///
    /// # Errors
    ///
    /// - `404` and `410` become [`Error::NotFound`]
    /// - `401` becomes [`Error::Unauthorized`]
    /// - `403` becomes [`Error::Forbidden`]
    /// - every other non-2xx status becomes [`Error::Upstream`]
    pub fn error_for_status(self, path: &RemotePath) -> crate::Result<Self> {
        match self.status {
            s if s.is_success() => Ok(self),
            StatusCode::NOT_FOUND | StatusCode::GONE => Err(Error::NotFound(path.clone())),
            StatusCode::UNAUTHORIZED => Err(Error::Unauthorized(path.clone())),
            StatusCode::FORBIDDEN => Err(Error::Forbidden(path.clone())),
            status => Err(Error::Upstream {
                status,
                body: self.text(),
            }),
        }
    }
}

/// Parsed `Link` headers, `rel` to targets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Links(BTreeMap<String, Vec<String>>);

impl Links {
    /// Parse any number of `Link` header values.
    ///
    /// ```
    /// use fcrepo::api::Links;
    ///
    /// let links = Links::parse([
    ///     r#"<http://www.w3.org/ns/ldp#NonRDFSource>;rel="type", <http://h/rest/a/fcr:metadata>; rel="describedby""#,
    ///     "<http://www.w3.org/ns/ldp#Resource>; rel=type",
    /// ]);
    ///
    /// assert_eq!(links.first("describedby"), Some("http://h/rest/a/fcr:metadata"));
    /// assert!(links.has("type", "http://www.w3.org/ns/ldp#Resource"));
    /// assert_eq!(links.get("type").len(), 2);
    /// assert!(links.get("acl").is_empty());
    /// ```
    pub fn parse<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        static LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"<([^>]*)>([^<]*)").unwrap());
        static REL: Lazy<Regex> =
            Lazy::new(|| Regex::new(r#"rel\s*=\s*(?:"([^"]*)"|([^;,\s]+))"#).unwrap());

        let mut links: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for value in values {
            for link in LINK.captures_iter(value) {
                let target = &link[1];
                let Some(rel) = REL.captures(&link[2]) else {
                    continue;
                };
                let rels = rel.get(1).or_else(|| rel.get(2)).map_or("", |m| m.as_str());

                for rel in rels.split_whitespace() {
                    links
                        .entry(rel.to_owned())
                        .or_default()
                        .push(target.to_owned());
                }
            }
        }

        Self(links)
    }

    /// Targets with the given `rel`.
    #[must_use]
    pub fn get(&self, rel: &str) -> &[String] {
        self.0.get(rel).map_or(&[], Vec::as_slice)
    }

    /// The first target with the given `rel`.
    #[must_use]
    pub fn first(&self, rel: &str) -> Option<&str> {
        self.get(rel).first().map(String::as_str)
    }

    /// Whether there is a link `rel` to `target`.
    #[must_use]
    pub fn has(&self, rel: &str, target: &str) -> bool {
        self.get(rel).iter().any(|t| t == target)
    }

    /// Iterate over `(rel, targets)`.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// A parsed `Content-Disposition` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentDisposition {
    /// `attachment`, `inline`, ...
    pub kind: String,
    /// Lower-cased parameter names to unquoted values.
    pub params: BTreeMap<String, String>,
}

impl ContentDisposition {
    /// Parse a header value.
    ///
    /// ```
    /// use fcrepo::api::ContentDisposition;
    ///
    /// let cd = ContentDisposition::parse(r#"attachment; filename="a; b.png"; size=3"#);
    /// assert_eq!(cd.kind, "attachment");
    /// assert_eq!(cd.filename(), Some("a; b.png"));
    /// assert_eq!(cd.params["size"], "3");
    /// ```
    #[must_use]
    pub fn parse(value: &str) -> Self {
        static PARAM: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r#"([A-Za-z0-9_*.-]+)\s*=\s*(?:"((?:[^"\\]|\\.)*)"|([^;]*))"#).unwrap()
        });

        let (kind, rest) = value.split_once(';').unwrap_or((value, ""));

        let params = PARAM
            .captures_iter(rest)
            .map(|c| {
                let value = match c.get(2) {
                    Some(quoted) => quoted.as_str().replace("\\\"", "\"").replace("\\\\", "\\"),
                    None => c.get(3).map_or("", |m| m.as_str()).trim().to_owned(),
                };
                (c[1].to_ascii_lowercase(), value)
            })
            .collect();

        Self {
            kind: kind.trim().to_ascii_lowercase(),
            params,
        }
    }

    /// The `filename` parameter.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.params.get("filename").map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16) -> Response {
        Response {
            status: StatusCode::from_u16(status).unwrap(),
            headers: HeaderMap::new(),
            body: Bytes::from_static(b"nope"),
        }
    }

    #[test]
    fn status_mapping() {
        let path = RemotePath::normalize("/a");

        assert!(response(204).error_for_status(&path).is_ok());
        assert!(matches!(response(404).error_for_status(&path), Err(Error::NotFound(p)) if p == path));
        assert!(matches!(response(410).error_for_status(&path), Err(Error::NotFound(_))));
        assert!(matches!(response(401).error_for_status(&path), Err(Error::Unauthorized(_))));
        assert!(matches!(response(403).error_for_status(&path), Err(Error::Forbidden(_))));
        assert!(matches!(
            response(409).error_for_status(&path),
            Err(Error::Upstream { status: StatusCode::CONFLICT, body }) if body == "nope"
        ));
    }

    #[test]
    fn urls() {
        let endpoint = Endpoint::new("http://localhost:8080", "/rest").unwrap();

        assert_eq!(
            endpoint.url(&RemotePath::root(), None).unwrap().as_str(),
            "http://localhost:8080/rest/"
        );
        assert_eq!(
            endpoint
                .url(&RemotePath::normalize("/a/b").metadata(), Some("tx:9"))
                .unwrap()
                .as_str(),
            "http://localhost:8080/rest/tx:9/a/b/fcr:metadata"
        );
        assert_eq!(
            endpoint.login_url().unwrap().as_str(),
            "http://localhost:8080/auth/local"
        );
        assert!(Endpoint::new("not a url", "/rest").is_err());
    }

    #[test]
    fn raw_headers() {
        let req = Request::get(RemotePath::root())
            .raw_header("Accept: text/turtle")
            .unwrap()
            .raw_header("X-Thing:  a: b ")
            .unwrap();

        assert_eq!(req.headers["accept"], "text/turtle");
        assert_eq!(req.headers["x-thing"], "a: b");
        assert!(Request::get(RemotePath::root()).raw_header("nonsense").is_err());
    }

    #[test]
    fn webdav_methods() {
        assert_eq!(COPY.as_str(), "COPY");
        assert_eq!(MOVE.as_str(), "MOVE");
    }
}

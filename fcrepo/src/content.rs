//! Content types and upload headers for local files.
use std::path::Path;

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use sha2::{Digest, Sha256};
use strum::{EnumString, IntoStaticStr};
use tokio::io::AsyncReadExt;

/// Media type of SPARQL Update documents.
pub const SPARQL_UPDATE: &str = "application/sparql-update";

/// Expanded JSON-LD, the only JSON-LD shape this crate reads.
pub const JSON_LD_EXPANDED: &str =
    "application/ld+json; profile=\"http://www.w3.org/ns/json-ld#expanded\"";

/// RDF serializations recognized by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr)]
pub enum RdfFormat {
    /// `.json`
    #[strum(serialize = "application/ld+json")]
    JsonLd,
    /// `.nt`
    #[strum(serialize = "application/n-triples")]
    NTriples,
    /// `.xml`
    #[strum(serialize = "application/rdf+xml")]
    RdfXml,
    /// `.n3`
    #[strum(serialize = "text/n3")]
    N3,
    /// `.txt`
    #[strum(serialize = "text/plain")]
    Plain,
    /// `.ttl`
    #[strum(serialize = "text/turtle")]
    Turtle,
}

impl RdfFormat {
    /// Look up a format by extension, without the dot. Case-insensitive.
    ///
    /// ```
    /// use fcrepo::content::RdfFormat;
    ///
    /// assert_eq!(RdfFormat::from_extension("TTL"), Some(RdfFormat::Turtle));
    /// assert_eq!(RdfFormat::from_extension("png"), None);
    /// ```
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        let format = match ext.to_ascii_lowercase().as_str() {
            "json" => Self::JsonLd,
            "nt" => Self::NTriples,
            "xml" => Self::RdfXml,
            "n3" => Self::N3,
            "txt" => Self::Plain,
            "ttl" => Self::Turtle,
            _ => return None,
        };

        Some(format)
    }

    /// Format of a local file, if it is RDF.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// The media type.
    #[must_use]
    pub fn mime(self) -> &'static str {
        self.into()
    }
}

/// Hex encoded SHA-256 of a local file.
///
/// # Errors
///
/// The file cannot be read.
pub async fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0; 64 * 1024];

    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Headers for uploading a local file.
///
/// RDF files only get a `Content-Type`. Anything else is treated as an
/// opaque binary and gets a `digest` and a `Content-Disposition`; the
/// disposition uses `filename` when given, otherwise the file's own name.
/// Headers already present in `existing` are left alone.
///
/// # Errors
///
/// The file cannot be read.
pub async fn file_headers(
    path: &Path,
    filename: Option<&str>,
    existing: &HeaderMap,
) -> std::io::Result<HeaderMap> {
    let mut headers = HeaderMap::new();

    if existing.contains_key(header::CONTENT_TYPE) {
        return Ok(headers);
    }

    if let Some(format) = RdfFormat::from_path(path) {
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(format.mime()));
        return Ok(headers);
    }

    let digest = sha256_file(path).await?;
    headers.insert(
        HeaderName::from_static("digest"),
        header_value(&format!("sha256={digest}"))?,
    );

    if !existing.contains_key(header::CONTENT_DISPOSITION) {
        let name = filename
            .map(str::to_owned)
            .or_else(|| {
                path.file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            })
            .unwrap_or_default();

        headers.insert(
            header::CONTENT_DISPOSITION,
            header_value(&format!("attachment; filename=\"{}\"", name.replace('"', "")))?,
        );
    }

    Ok(headers)
}

fn header_value(value: &str) -> std::io::Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[tokio::test]
    async fn rdf_files_only_get_a_content_type() {
        let mut file = tempfile::Builder::new().suffix(".ttl").tempfile().unwrap();
        writeln!(file, "<> <http://x/p> \"o\" .").unwrap();

        let headers = file_headers(file.path(), None, &HeaderMap::new()).await.unwrap();

        assert_eq!(headers[header::CONTENT_TYPE], "text/turtle");
        assert!(!headers.contains_key("digest"));
        assert!(!headers.contains_key(header::CONTENT_DISPOSITION));
    }

    #[tokio::test]
    async fn binaries_get_digest_and_disposition() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        std::fs::write(&path, b"abc").unwrap();

        let headers = file_headers(&path, None, &HeaderMap::new()).await.unwrap();
        assert_eq!(
            headers["digest"],
            "sha256=ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"photo.png\""
        );

        let headers = file_headers(&path, Some("other.png"), &HeaderMap::new())
            .await
            .unwrap();
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"other.png\""
        );
    }

    #[tokio::test]
    async fn explicit_content_type_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, b"x").unwrap();

        let mut existing = HeaderMap::new();
        existing.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/turtle"));

        assert!(file_headers(&path, None, &existing).await.unwrap().is_empty());
    }
}

//! A repository client with basic filesystem capabilities: listing,
//! navigating, reading and writing RDF and binaries.
use std::{collections::BTreeMap, path::Path};

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use reqwest::{
    header::{self, HeaderName, HeaderValue},
    Client, StatusCode, Url,
};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, trace};

use crate::{
    acl::{self, Access, AclStatement, AclTree},
    api::{Payload, Request, Response, COPY, MOVE, PREFER_LENIENT, PREFER_REPRESENTATION},
    auth::{AccessToken, TokenStore},
    content::{self, JSON_LD_EXPANDED, SPARQL_UPDATE},
    errors::Error,
    location::{contained_members, Children, ConfirmedContainer, ResourceInfo},
    path::{RemotePath, FCR_TX, FCR_TX_COMMIT, FCR_TX_ROLLBACK},
    session::Session,
    sparql::build_update_patch,
    tree::{walk_tree, RemoteTree},
    turtle::{self, PrefixMap},
};

/// `User-Agent` used in all requests to the repository.
pub static USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

static DESTINATION: HeaderName = HeaderName::from_static("destination");
static SLUG: HeaderName = HeaderName::from_static("slug");
static PREFER: HeaderName = HeaderName::from_static("prefer");

const TURTLE: &str = "text/turtle";

/// A repository "filesystem".
#[derive(Debug)]
pub struct Fs {
    client: Client,
    token_store: Box<dyn TokenStore>,
    session: Session,
    prefixes: PrefixMap,
}

/// The RDF describing a resource.
#[derive(Debug, Clone)]
pub struct Description {
    /// What the `HEAD` said.
    pub info: ResourceInfo,
    /// Where the description was read from. Differs from the resource for
    /// binaries.
    pub location: RemotePath,
    /// The description, as turtle.
    pub turtle: String,
}

/// An ACL about to be edited.
#[derive(Debug, Clone)]
pub struct AclDocument {
    /// The protected path.
    pub target: RemotePath,
    /// Where the ACL lives, or will live.
    pub location: RemotePath,
    /// Whether the ACL already exists.
    pub existing: bool,
    /// Current turtle, or a template for new ACLs.
    pub turtle: String,
}

impl Fs {
    /// Create a new filesystem bound to a session.
    ///
    /// # Errors
    ///
    /// The HTTP client fails to initialize.
    pub fn new<S: TokenStore + 'static>(session: Session, token_store: S) -> crate::Result<Self> {
        Ok(Self {
            client: Client::builder().user_agent(USER_AGENT).build()?,
            token_store: Box::new(token_store),
            session,
            prefixes: PrefixMap::default_global(),
        })
    }

    /// Use `prefixes` as the global prefix table.
    #[must_use]
    pub fn with_prefixes(mut self, prefixes: PrefixMap) -> Self {
        self.prefixes = prefixes;
        self
    }

    /// The session.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The global prefix table.
    #[must_use]
    pub fn prefixes(&self) -> &PrefixMap {
        &self.prefixes
    }

    /// The token requests are currently sent with.
    ///
    /// # Errors
    ///
    /// The token store failed to renew an expired token.
    pub async fn access_token(&self) -> crate::Result<Option<AccessToken>> {
        self.token_store
            .get_access_token(&self.client, self.session.endpoint())
            .await
    }

    /// Log in with a username and password using this filesystem's client.
    /// The new token is returned, not stored.
    ///
    /// # Errors
    ///
    /// See [`auth::login`](crate::auth::login).
    pub async fn login(&self, username: &str, password: &str) -> crate::Result<AccessToken> {
        crate::auth::login(&self.client, self.session.endpoint(), username, password).await
    }

    fn url(&self, path: &RemotePath) -> crate::Result<Url> {
        let tx = self.session.transaction();
        self.session.endpoint().url(path, tx.as_deref())
    }

    /// Map a URI returned by the repository back to a remote path.
    #[must_use]
    pub fn path_of(&self, uri: &str) -> Option<RemotePath> {
        let tx = self.session.transaction();
        self.session.endpoint().remote_path(uri, tx.as_deref())
    }

    async fn send_once(
        &self,
        req: &Request,
        token: Option<&AccessToken>,
    ) -> crate::Result<reqwest::Response> {
        let mut builder = self
            .client
            .request(req.method.clone(), self.url(&req.path)?)
            .headers(req.headers.clone());

        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }

        if let Some(destination) = &req.destination {
            let url = self.url(destination)?;
            builder = builder.header(
                DESTINATION.clone(),
                HeaderValue::from_str(url.as_str())
                    .map_err(|_| Error::Validation(format!("invalid destination: {url}")))?,
            );
        }

        if let Some((body, len)) = req.payload.to_body().await? {
            builder = builder.header(header::CONTENT_LENGTH, len).body(body);
        }

        Ok(builder.send().await?)
    }

    #[instrument(skip(self, req), fields(method = %req.method, path = %req.path))]
    async fn send_streaming(&self, req: &Request) -> crate::Result<reqwest::Response> {
        let endpoint = self.session.endpoint();
        let token = self
            .token_store
            .get_access_token(&self.client, endpoint)
            .await?;

        let res = self.send_once(req, token.as_ref()).await?;
        trace!(status = %res.status(), "response");

        if matches!(
            res.status(),
            StatusCode::FORBIDDEN | StatusCode::INTERNAL_SERVER_ERROR
        ) && self.token_store.can_renew()
        {
            debug!(status = %res.status(), "logging in again and retrying");

            let token = self.token_store.renew(&self.client, endpoint).await?;
            let res = self.send_once(req, token.as_ref()).await?;
            trace!(status = %res.status(), "retried response");

            return Ok(res);
        }

        Ok(res)
    }

    /// Send a request and buffer the response, whatever its status. A
    /// `403` or `500` triggers one login and replay when the token store
    /// can renew.
    ///
    /// # Errors
    ///
    /// - network errors
    /// - the payload file cannot be read
    /// - [`Error::InvalidCredentials`] if logging in again failed
    pub async fn send(&self, req: &Request) -> crate::Result<Response> {
        Response::read(self.send_streaming(req).await?).await
    }

    async fn send_ok(&self, req: &Request) -> crate::Result<Response> {
        self.send(req).await?.error_for_status(&req.path)
    }

    /// `HEAD` a resource and classify it.
    ///
    /// # Errors
    ///
    /// - network errors
    /// - [`Error::NotFound`], [`Error::Unauthorized`], [`Error::Forbidden`]
    /// - any other unsuccessful status
    pub async fn info(&self, path: &RemotePath) -> crate::Result<ResourceInfo> {
        let res = self.send_ok(&Request::head(path.clone())).await?;

        Ok(ResourceInfo::from_response(path.clone(), &res))
    }

    /// Whether a resource exists.
    ///
    /// # Errors
    ///
    /// Anything but a plain "not found" from [`Fs::info`].
    pub async fn exists(&self, path: &RemotePath) -> crate::Result<bool> {
        match self.info(path).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// List the members of a resource. Binaries have none, which is
    /// reported as [`Children::Binary`] rather than an empty list.
    ///
    /// # Errors
    ///
    /// - network errors
    /// - [`Error::NotFound`] and authorization errors
    /// - the listing is not JSON
    #[instrument(skip(self))]
    pub async fn list_children(&self, path: &RemotePath) -> crate::Result<Children> {
        if self.info(path).await?.is_binary() {
            return Ok(Children::Binary);
        }

        let doc = self.json_ld(path).await?;
        let tx = self.session.transaction();
        let names = contained_members(&doc, self.session.endpoint(), tx.as_deref(), path);

        debug!(count = names.len(), "listed container");

        Ok(Children::Container(names))
    }

    async fn json_ld(&self, path: &RemotePath) -> crate::Result<serde_json::Value> {
        let req = Request::get(path.clone())
            .header(header::ACCEPT, HeaderValue::from_static(JSON_LD_EXPANDED));

        self.send_ok(&req).await?.json()
    }

    /// Change the working directory. The session is left untouched unless
    /// the target exists and is a container.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`]
    /// - [`Error::NotAContainer`]
    /// - network and authorization errors
    pub async fn cd(&self, input: &str) -> crate::Result<RemotePath> {
        let path = self.session.resolve(Some(input));
        let info = self.info(&path).await?;

        self.session.set_cwd(ConfirmedContainer::confirm(&info)?);

        Ok(path)
    }

    /// Read a resource's description. Binaries are described by their
    /// `describedby` resource.
    ///
    /// # Errors
    ///
    /// The resource or its description cannot be read.
    pub async fn describe(&self, path: &RemotePath) -> crate::Result<Description> {
        let info = self.info(path).await?;
        let tx = self.session.transaction();
        let location = info.description(self.session.endpoint(), tx.as_deref());
        let turtle = self.turtle(&location).await?;

        Ok(Description {
            info,
            location,
            turtle,
        })
    }

    /// `GET` a resource as turtle.
    ///
    /// # Errors
    ///
    /// The resource cannot be read.
    pub async fn turtle(&self, path: &RemotePath) -> crate::Result<String> {
        let req = Request::get(path.clone()).header(header::ACCEPT, HeaderValue::from_static(TURTLE));

        Ok(self.send_ok(&req).await?.text())
    }

    /// `GET` a resource as turtle without server-managed triples, which is
    /// what gets edited and diffed.
    ///
    /// # Errors
    ///
    /// The resource cannot be read.
    pub async fn editable_turtle(&self, path: &RemotePath) -> crate::Result<String> {
        let req = Request::get(path.clone())
            .header(header::ACCEPT, HeaderValue::from_static(TURTLE))
            .header(PREFER.clone(), HeaderValue::from_static(PREFER_REPRESENTATION));

        Ok(self.send_ok(&req).await?.text())
    }

    /// Create or replace an RDF container with `turtle`. A lenient replace
    /// ignores server-managed triples missing from `turtle`.
    ///
    /// # Errors
    ///
    /// - [`Error::Parse`] before anything is sent
    /// - the repository refused the document
    #[instrument(skip(self, turtle))]
    pub async fn put_turtle(
        &self,
        path: &RemotePath,
        turtle: String,
        lenient: bool,
    ) -> crate::Result<Response> {
        turtle::parse(&turtle, &self.prefixes)?;

        let mut req = Request::put(path.clone())
            .header(header::CONTENT_TYPE, HeaderValue::from_static(TURTLE))
            .payload(turtle);

        if lenient {
            req = req.header(PREFER.clone(), HeaderValue::from_static(PREFER_LENIENT));
        }

        self.send_ok(&req).await
    }

    /// Upload a local file to `path`. RDF files keep their serialization,
    /// everything else becomes a binary with a digest.
    ///
    /// # Errors
    ///
    /// - the file cannot be read
    /// - the repository refused it (e.g. digest mismatch)
    #[instrument(skip(self))]
    pub async fn put_file(
        &self,
        path: &RemotePath,
        file: &Path,
        filename: Option<&str>,
        lenient: bool,
    ) -> crate::Result<Response> {
        let mut req = Request::put(path.clone()).payload(Payload::File(file.to_path_buf()));
        let headers = content::file_headers(file, filename, &req.headers).await?;
        req.headers.extend(headers);

        if lenient {
            req = req.header(PREFER.clone(), HeaderValue::from_static(PREFER_LENIENT));
        }

        self.send_ok(&req).await
    }

    /// Upload a binary and optionally describe it with `metadata` turtle,
    /// applied as a creation patch to the binary's description.
    ///
    /// # Errors
    ///
    /// - [`Error::Parse`] before anything is sent
    /// - the upload failed
    /// - the description could not be patched
    pub async fn put_binary(
        &self,
        path: &RemotePath,
        file: &Path,
        filename: Option<&str>,
        metadata: Option<&str>,
    ) -> crate::Result<()> {
        let patch = metadata
            .map(|metadata| build_update_patch(metadata, None, &self.prefixes))
            .transpose()?;

        self.put_file(path, file, filename, false).await?;

        if let Some(patch) = patch {
            let description = self.info(path).await?;
            let tx = self.session.transaction();
            let location = description.description(self.session.endpoint(), tx.as_deref());

            self.send_patch(&location, patch).await?;
        }

        Ok(())
    }

    /// Apply a turtle edit as a SPARQL Update. `old` is what the document
    /// looked like before the edit; without it the patch only inserts.
    ///
    /// # Errors
    ///
    /// - [`Error::Parse`] before anything is sent
    /// - the repository refused the patch
    #[instrument(skip(self, new, old))]
    pub async fn update_rdf(
        &self,
        path: &RemotePath,
        new: &str,
        old: Option<&str>,
    ) -> crate::Result<Response> {
        let patch = build_update_patch(new, old, &self.prefixes)?;
        self.send_patch(path, patch).await
    }

    async fn send_patch(&self, path: &RemotePath, patch: String) -> crate::Result<Response> {
        trace!("{patch}");

        let req = Request::patch(path.clone())
            .header(header::CONTENT_TYPE, HeaderValue::from_static(SPARQL_UPDATE))
            .header(PREFER.clone(), HeaderValue::from_static(PREFER_LENIENT))
            .payload(patch);

        self.send_ok(&req).await
    }

    /// Delete a resource. A permanent delete also removes the tombstone, so
    /// the path can be reused.
    ///
    /// # Errors
    ///
    /// The resource could not be deleted.
    #[instrument(skip(self))]
    pub async fn delete(&self, path: &RemotePath, permanent: bool) -> crate::Result<()> {
        self.send_ok(&Request::delete(path.clone())).await?;

        if permanent {
            match self.send_ok(&Request::delete(path.tombstone())).await {
                Ok(_) => {}
                Err(e) if e.is_not_found() => trace!("no tombstone left behind"),
                Err(e) => return Err(e),
            }
        }

        info!("deleted");
        Ok(())
    }

    /// Copy a resource and its subtree.
    ///
    /// # Errors
    ///
    /// The repository refused the copy.
    pub async fn copy(&self, from: &RemotePath, to: &RemotePath) -> crate::Result<()> {
        let req = Request::new(COPY.clone(), from.clone()).destination(to.clone());
        self.send_ok(&req).await?;
        Ok(())
    }

    /// Move a resource and its subtree.
    ///
    /// # Errors
    ///
    /// The repository refused the move.
    pub async fn r#move(&self, from: &RemotePath, to: &RemotePath) -> crate::Result<()> {
        let req = Request::new(MOVE.clone(), from.clone()).destination(to.clone());
        self.send_ok(&req).await?;
        Ok(())
    }

    /// Start a transaction. Every following request goes through it until
    /// it is committed or rolled back.
    ///
    /// # Errors
    ///
    /// - [`Error::TransactionInProgress`]
    /// - the response had no usable `Location`
    pub async fn start_transaction(&self) -> crate::Result<String> {
        if let Some(active) = self.session.transaction() {
            return Err(Error::TransactionInProgress(active));
        }

        let res = self
            .send_ok(&Request::post(RemotePath::normalize(FCR_TX)))
            .await?;

        let location = res
            .location()
            .ok_or_else(|| Error::InvalidBody("transaction without location".into()))?;
        let token = transaction_token(location)
            .ok_or_else(|| Error::InvalidBody(format!("unexpected transaction location {location}")))?;

        self.session.begin_transaction(token.clone())?;
        info!(%token, "transaction started");

        Ok(token)
    }

    /// Commit the active transaction.
    ///
    /// # Errors
    ///
    /// - [`Error::NoTransaction`]
    /// - the repository refused the commit; the transaction is forgotten
    ///   either way
    pub async fn commit_transaction(&self) -> crate::Result<String> {
        self.finish_transaction(FCR_TX_COMMIT).await
    }

    /// Roll back the active transaction.
    ///
    /// # Errors
    ///
    /// See [`Fs::commit_transaction`].
    pub async fn rollback_transaction(&self) -> crate::Result<String> {
        self.finish_transaction(FCR_TX_ROLLBACK).await
    }

    async fn finish_transaction(&self, action: &str) -> crate::Result<String> {
        let token = self.session.transaction().ok_or(Error::NoTransaction)?;

        let result = self
            .send_ok(&Request::post(RemotePath::normalize(action)))
            .await;
        self.session.end_transaction();

        result?;
        info!(%token, action, "transaction finished");

        Ok(token)
    }

    /// The version listing of a resource.
    ///
    /// # Errors
    ///
    /// The resource or its versions cannot be read.
    pub async fn versions(&self, path: &RemotePath) -> crate::Result<String> {
        self.turtle(&path.versions(None)).await
    }

    /// One version of a resource.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] without a name
    /// - the version cannot be read
    pub async fn version(&self, path: &RemotePath, name: Option<&str>) -> crate::Result<String> {
        let name = version_name(name)?;
        self.turtle(&path.versions(Some(name))).await
    }

    /// Snapshot a resource as version `name`.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] without a name
    /// - the repository refused
    pub async fn create_version(&self, path: &RemotePath, name: Option<&str>) -> crate::Result<Response> {
        let name = version_name(name)?;
        let slug = HeaderValue::from_str(name)
            .map_err(|_| Error::Validation(format!("invalid version name: {name}")))?;

        self.send_ok(&Request::post(path.versions(None)).header(SLUG.clone(), slug))
            .await
    }

    /// Revert a resource to version `name`.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] without a name
    /// - the repository refused
    pub async fn revert_version(&self, path: &RemotePath, name: Option<&str>) -> crate::Result<Response> {
        let name = version_name(name)?;
        self.send_ok(&Request::patch(path.versions(Some(name)))).await
    }

    /// Delete version `name` of a resource.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] without a name
    /// - the repository refused
    pub async fn delete_version(&self, path: &RemotePath, name: Option<&str>) -> crate::Result<Response> {
        let name = version_name(name)?;
        self.send_ok(&Request::delete(path.versions(Some(name)))).await
    }

    /// Walk `/acl` and build the authorization tree.
    ///
    /// # Errors
    ///
    /// See [`walk_tree`].
    pub async fn acl_tree(&self) -> crate::Result<AclTree> {
        walk_tree(self, &RemotePath::normalize(acl::ACL_ROOT)).await
    }

    /// Effective access at `path`.
    ///
    /// # Errors
    ///
    /// See [`walk_tree`].
    pub async fn access(&self, path: &RemotePath) -> crate::Result<BTreeMap<String, Access>> {
        Ok(self.acl_tree().await?.access(path))
    }

    /// Fetch the ACL declared exactly at `target`, or a template for a new
    /// one.
    ///
    /// # Errors
    ///
    /// The ACL tree or the existing ACL cannot be read.
    pub async fn read_acl(&self, target: &RemotePath) -> crate::Result<AclDocument> {
        let tree = self.acl_tree().await?;

        if let Some(location) = tree.definition(target) {
            return Ok(AclDocument {
                target: target.clone(),
                location: location.clone(),
                existing: true,
                turtle: self.editable_turtle(location).await?,
            });
        }

        Ok(AclDocument {
            target: target.clone(),
            location: acl::acl_path_for(target),
            existing: false,
            turtle: acl::template(self.url(target)?.as_str()),
        })
    }

    /// Replace the ACL described by `doc` with `turtle`. The old ACL, or any
    /// stale resource where the new one goes, is permanently deleted first.
    ///
    /// # Errors
    ///
    /// Deleting or writing failed.
    #[instrument(skip(self, doc, turtle), fields(location = %doc.location))]
    pub async fn write_acl(&self, doc: &AclDocument, turtle: String) -> crate::Result<()> {
        if doc.existing || self.exists(&doc.location).await? {
            self.delete(&doc.location, true).await?;
        }

        self.put_turtle(&doc.location, turtle, false).await?;
        Ok(())
    }

    /// Read a resource into memory.
    ///
    /// # Errors
    ///
    /// The resource cannot be read.
    pub async fn get_bytes(&self, path: &RemotePath) -> crate::Result<Bytes> {
        Ok(self.send_ok(&Request::get(path.clone())).await?.body)
    }

    /// Stream a resource into a local file, returning the number of bytes
    /// written.
    ///
    /// # Errors
    ///
    /// - the resource cannot be read
    /// - the file cannot be written
    #[instrument(skip(self))]
    pub async fn download(&self, path: &RemotePath, dest: &Path) -> crate::Result<u64> {
        let req = Request::get(path.clone());
        let res = self.send_streaming(&req).await?;

        if !res.status().is_success() {
            return Response::read(res).await?.error_for_status(path).map(|_| 0);
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = res.bytes_stream().map_err(Error::from);
        let mut written = 0;

        while let Some(chunk) = stream.try_next().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        file.flush().await?;

        Ok(written)
    }
}

#[async_trait]
impl RemoteTree for Fs {
    async fn list_children(&self, path: &RemotePath) -> crate::Result<Children> {
        Fs::list_children(self, path).await
    }

    async fn acl_declarations(&self, path: &RemotePath) -> crate::Result<Vec<AclStatement>> {
        let doc = self.json_ld(path).await?;
        let tx = self.session.transaction();

        Ok(acl::parse_statements(
            &doc,
            path,
            self.session.endpoint(),
            tx.as_deref(),
        ))
    }
}

fn version_name(name: Option<&str>) -> crate::Result<&str> {
    match name.map(str::trim) {
        Some(name) if !name.is_empty() => Ok(name),
        _ => Err(Error::Validation("version name required".into())),
    }
}

/// The token is the last path segment of the transaction's location.
fn transaction_token(location: &str) -> Option<String> {
    let path = match Url::parse(location) {
        Ok(url) => url.path().to_owned(),
        Err(_) => location.to_owned(),
    };

    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

//! Authentication against the repository's local login endpoint.
use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_with::serde_as;
use tokio::sync::RwLock;
use tracing::{debug, instrument, trace, warn};

use crate::{api::Endpoint, errors::Error};

/// A [`TokenStore`] manages authentication tokens.
#[async_trait]
pub trait TokenStore: Debug + Send + Sync {
    /// The cached access token, renewed first if it is known to be expired
    /// and the store is able to. `None` means requests go out anonymously.
    async fn get_access_token(
        &self,
        client: &Client,
        endpoint: &Endpoint,
    ) -> crate::Result<Option<AccessToken>>;

    /// Obtain a fresh token after the repository rejected the current one.
    /// Returns `None` if this store has no way of renewing.
    async fn renew(&self, client: &Client, endpoint: &Endpoint)
        -> crate::Result<Option<AccessToken>>;

    /// Whether [`TokenStore::renew`] can ever succeed.
    fn can_renew(&self) -> bool;
}

/// A fixed token, or none at all.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenStore(Option<AccessToken>);

impl StaticTokenStore {
    /// Always send this token.
    #[must_use]
    pub fn new(token: AccessToken) -> Self {
        Self(Some(token))
    }

    /// Never authenticate.
    #[must_use]
    pub fn anonymous() -> Self {
        Self(None)
    }
}

#[async_trait]
impl TokenStore for StaticTokenStore {
    async fn get_access_token(&self, _: &Client, _: &Endpoint) -> crate::Result<Option<AccessToken>> {
        Ok(self.0.clone())
    }

    async fn renew(&self, _: &Client, _: &Endpoint) -> crate::Result<Option<AccessToken>> {
        Ok(None)
    }

    fn can_renew(&self) -> bool {
        false
    }
}

/// A caching token store that logs in with a username and password
/// whenever the cached token is missing, expired or rejected.
#[derive(Debug)]
pub struct PasswordTokenStore {
    username: String,
    password: String,
    access_token: Arc<RwLock<Option<AccessToken>>>,
}

impl PasswordTokenStore {
    /// Create a store, optionally seeded with a previously issued token.
    #[must_use]
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        access_token: Option<AccessToken>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            access_token: Arc::new(RwLock::new(access_token)),
        }
    }

    /// The configured username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }
}

#[async_trait]
impl TokenStore for PasswordTokenStore {
    #[instrument(level = "trace", skip_all)]
    async fn get_access_token(
        &self,
        client: &Client,
        endpoint: &Endpoint,
    ) -> crate::Result<Option<AccessToken>> {
        {
            let lock = self.access_token.read().await;

            match *lock {
                Some(ref token) if !token.expires_within(Duration::minutes(1)) => {
                    trace!("found usable cached access token");
                    return Ok(Some(token.clone()));
                }
                Some(_) => trace!("cached access token is expired"),
                None => return Ok(None),
            }
        }

        self.renew(client, endpoint).await
    }

    #[instrument(level = "debug", skip_all, fields(username = %self.username))]
    async fn renew(&self, client: &Client, endpoint: &Endpoint) -> crate::Result<Option<AccessToken>> {
        let token = login(client, endpoint, &self.username, &self.password).await?;

        *self.access_token.write().await = Some(token.clone());

        Ok(Some(token))
    }

    fn can_renew(&self) -> bool {
        true
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    jwt: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Log in with a username and password.
///
/// # Errors
///
/// - network errors
/// - [`Error::InvalidCredentials`] when the server answers without a token
#[instrument(skip(client, password))]
pub async fn login(
    client: &Client,
    endpoint: &Endpoint,
    username: &str,
    password: &str,
) -> crate::Result<AccessToken> {
    let res = client
        .post(endpoint.login_url()?)
        .form(&[("username", username), ("password", password)])
        .send()
        .await?;

    let status = res.status();
    let body = res.bytes().await?;

    match serde_json::from_slice::<LoginResponse>(&body) {
        Ok(LoginResponse { jwt: Some(jwt), .. }) => {
            debug!("logged in");
            Ok(AccessToken::new(jwt))
        }
        Ok(LoginResponse { message, .. }) => {
            warn!(%status, message = message.as_deref().unwrap_or_default(), "login refused");
            Err(Error::InvalidCredentials)
        }
        Err(e) => {
            warn!(%status, "unreadable login response: {e}");
            Err(Error::InvalidCredentials)
        }
    }
}

/// JWT claims of an [`AccessToken`].
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct AccessTokenClaims {
    /// User the token was issued to.
    #[serde(default)]
    pub username: Option<String>,
    /// Whether the user is an administrator.
    #[serde(default)]
    pub admin: bool,
    /// Expiration date of the token.
    #[serde_as(as = "Option<serde_with::TimestampSeconds<i64>>")]
    #[serde(default)]
    pub exp: Option<DateTime<Utc>>,
}

/// A bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    value: String,
}

impl AccessToken {
    /// Wrap a raw token.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// The raw token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Decode the claims. The signature is not verified.
    ///
    /// ```
    /// use fcrepo::auth::AccessToken;
    ///
    /// // {"username":"alice","admin":true,"exp":4102444800}
    /// let token = AccessToken::new(
    ///     "eyJhbGciOiJIUzI1NiJ9.eyJ1c2VybmFtZSI6ImFsaWNlIiwiYWRtaW4iOnRydWUsImV4cCI6NDEwMjQ0NDgwMH0.sig",
    /// );
    /// let claims = token.claims().unwrap();
    ///
    /// assert_eq!(claims.username.as_deref(), Some("alice"));
    /// assert!(claims.admin);
    /// assert!(AccessToken::new("opaque").claims().is_err());
    /// ```
    ///
    /// # Errors
    ///
    /// The token is not a JWT with a JSON payload.
    pub fn claims(&self) -> crate::Result<AccessTokenClaims> {
        let payload = self.value.split('.').nth(1).ok_or(Error::InvalidToken)?;
        let json = base64::decode_config(payload, base64::URL_SAFE_NO_PAD)
            .map_err(|_| Error::InvalidToken)?;

        serde_json::from_slice(&json).map_err(|_| Error::InvalidToken)
    }

    /// Expiration time, if the token carries one.
    #[must_use]
    pub fn exp(&self) -> Option<DateTime<Utc>> {
        self.claims().ok()?.exp
    }

    /// Whether the token expires within `margin`. Tokens without a readable
    /// expiration never do.
    #[must_use]
    pub fn expires_within(&self, margin: Duration) -> bool {
        self.exp().map_or(false, |exp| exp <= Utc::now() + margin)
    }
}

impl std::fmt::Display for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

//! Nobody is perfect.
use reqwest::StatusCode;
use thiserror::Error;

use crate::{path::RemotePath, turtle::ParseError};

/// Error used by the entire crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport error: DNS, refused connections, broken bodies.
    #[error("{0}")]
    HttpError(#[from] reqwest::Error),

    /// Url error.
    #[error("invalid url: {0}")]
    UrlError(#[from] url::ParseError),

    /// Logging in with the configured username and password failed.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Authenticated, but not allowed to touch the resource.
    #[error("insufficient permission for {0}")]
    Forbidden(RemotePath),

    /// Authentication is required for the resource.
    #[error("authentication required for {0}")]
    Unauthorized(RemotePath),

    /// Not found.
    #[error("{0} does not exist")]
    NotFound(RemotePath),

    /// The resource exists but cannot have children.
    #[error("{0} is a binary resource, not a container")]
    NotAContainer(RemotePath),

    /// Malformed turtle.
    #[error("{0}")]
    Parse(#[from] ParseError),

    /// The repository reported a resource as its own descendant.
    #[error("cycle detected at {0}")]
    CycleDetected(RemotePath),

    /// A required argument is missing or invalid.
    #[error("{0}")]
    Validation(String),

    /// Commit or rollback without a transaction.
    #[error("there is no transaction started")]
    NoTransaction,

    /// A transaction is already running.
    #[error("transaction {0} is already in progress")]
    TransactionInProgress(String),

    /// Unexpected status from the repository.
    #[error("{status} from repository: {body}")]
    Upstream {
        /// Response status.
        status: StatusCode,
        /// Response body, as text.
        body: String,
    },

    /// The repository responded with something we could not make sense of.
    #[error("invalid response body: {0}")]
    InvalidBody(String),

    /// The access token is not a readable JWT.
    #[error("malformed access token")]
    InvalidToken,

    /// JSON error.
    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Local filesystem error.
    #[error("{0}")]
    IoError(#[from] std::io::Error),
}

impl Error {
    /// Whether the error means the resource does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

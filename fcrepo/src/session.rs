//! The working directory and transaction shared by every command.
use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::{
    api::Endpoint,
    errors::Error,
    location::ConfirmedContainer,
    path::{resolve_remote_path, RemotePath},
};

/// Snapshot of the mutable part of a [`Session`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Current working directory.
    pub cwd: RemotePath,
    /// Active transaction token.
    pub transaction: Option<String>,
}

/// Cheaply cloneable handle to the session. Clones share state, and
/// changes are published to everyone holding a [`Session::subscribe`]
/// receiver.
#[derive(Debug, Clone)]
pub struct Session {
    endpoint: Endpoint,
    state: Arc<watch::Sender<SessionState>>,
}

impl Session {
    /// Start a session at `cwd`, typically restored from configuration.
    #[must_use]
    pub fn new(endpoint: Endpoint, cwd: RemotePath) -> Self {
        let (tx, _) = watch::channel(SessionState {
            cwd,
            transaction: None,
        });

        Self {
            endpoint,
            state: Arc::new(tx),
        }
    }

    /// Where the repository lives.
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// A copy of the current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Current working directory.
    #[must_use]
    pub fn cwd(&self) -> RemotePath {
        self.state.borrow().cwd.clone()
    }

    /// Active transaction token.
    #[must_use]
    pub fn transaction(&self) -> Option<String> {
        self.state.borrow().transaction.clone()
    }

    /// Resolve user input against the working directory.
    #[must_use]
    pub fn resolve(&self, input: Option<&str>) -> RemotePath {
        resolve_remote_path(input, &self.state.borrow().cwd)
    }

    /// Change directory. Only confirmed containers are accepted.
    pub fn set_cwd(&self, container: ConfirmedContainer) {
        let cwd = container.into_path();
        debug!(%cwd, "changing directory");

        self.state.send_if_modified(|state| {
            if state.cwd == cwd {
                false
            } else {
                state.cwd = cwd;
                true
            }
        });
    }

    /// Record a freshly started transaction.
    ///
    /// # Errors
    ///
    /// [`Error::TransactionInProgress`] if one is already active.
    pub fn begin_transaction(&self, token: String) -> crate::Result<()> {
        let mut result = Ok(());

        self.state.send_if_modified(|state| match &state.transaction {
            Some(active) => {
                result = Err(Error::TransactionInProgress(active.clone()));
                false
            }
            None => {
                state.transaction = Some(token);
                true
            }
        });

        result
    }

    /// Forget the active transaction, returning its token.
    pub fn end_transaction(&self) -> Option<String> {
        let mut token = None;

        self.state.send_if_modified(|state| {
            token = state.transaction.take();
            token.is_some()
        });

        token
    }

    /// Observe changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{api::Response, location::ResourceInfo};

    fn session() -> Session {
        Session::new(
            Endpoint::new("http://h", "/rest").unwrap(),
            RemotePath::normalize("/a"),
        )
    }

    fn confirmed(path: &str) -> ConfirmedContainer {
        let res = Response {
            status: reqwest::StatusCode::OK,
            headers: reqwest::header::HeaderMap::new(),
            body: bytes::Bytes::new(),
        };

        ConfirmedContainer::confirm(&ResourceInfo::from_response(RemotePath::normalize(path), &res))
            .unwrap()
    }

    #[test]
    fn clones_share_state_and_notify() {
        let session = session();
        let other = session.clone();
        let mut rx = session.subscribe();

        assert!(!rx.has_changed().unwrap());

        other.set_cwd(confirmed("/a/b"));

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().cwd.as_str(), "/a/b");
        assert_eq!(session.cwd().as_str(), "/a/b");
        assert_eq!(session.resolve(Some("../c")).as_str(), "/a/c");

        session.set_cwd(confirmed("/a/b"));
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn one_transaction_at_a_time() {
        let session = session();

        assert_eq!(session.end_transaction(), None);

        session.begin_transaction("tx:1".into()).unwrap();
        assert!(matches!(
            session.begin_transaction("tx:2".into()),
            Err(Error::TransactionInProgress(t)) if t == "tx:1"
        ));
        assert_eq!(session.transaction().as_deref(), Some("tx:1"));

        assert_eq!(session.end_transaction().as_deref(), Some("tx:1"));
        assert_eq!(session.transaction(), None);
    }
}

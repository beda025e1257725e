use std::{path::PathBuf, sync::Arc};

use clap::Args;
use fcrepo::{
    api::Endpoint,
    auth::{AccessToken, PasswordTokenStore, StaticTokenStore},
    path::RemotePath,
    session::{Session, SessionState},
    Fs,
};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::{config::ConfigFile, errors::CliError};

pub mod commands;
pub mod config;
pub mod errors;
pub mod prompt;
pub mod shell;

pub type CliResult<T> = Result<T, errors::CliError>;

/// Connection settings that override the config file for this run only.
#[derive(Debug, Clone, Default, Args)]
pub struct Overrides {
    /// Config file to use instead of `./.fccli` or `~/.fccli`
    #[arg(long, global = true, env = "FCCLI_CONFIG")]
    pub config: Option<PathBuf>,

    /// Fedora host, e.g. http://localhost:8080
    #[arg(long, global = true, env = "FCCLI_HOST")]
    pub host: Option<String>,

    /// Base path of the repository, e.g. /fcrepo/rest
    #[arg(long, global = true, env = "FCCLI_BASE_PATH")]
    pub base_path: Option<String>,

    #[arg(short, long, global = true, env = "FCCLI_USERNAME")]
    pub username: Option<String>,

    #[arg(short, long, global = true, env = "FCCLI_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

/// Everything a command can touch.
#[derive(Debug)]
pub struct App {
    pub config: ConfigFile,
    overrides: Overrides,
    fs: Option<Arc<Fs>>,
    changes: Option<watch::Receiver<SessionState>>,
}

impl App {
    pub fn new(config: ConfigFile, overrides: Overrides) -> CliResult<Self> {
        let mut app = Self {
            config,
            overrides,
            fs: None,
            changes: None,
        };

        app.reconnect()?;
        Ok(app)
    }

    /// The repository, if a host is known.
    pub fn fs(&self) -> CliResult<&Fs> {
        self.fs.as_deref().ok_or(CliError::MissingHost)
    }

    /// A handle on the repository for whoever outlives a single command.
    pub fn shared_fs(&self) -> Option<Arc<Fs>> {
        self.fs.clone()
    }

    pub fn session(&self) -> CliResult<&Session> {
        Ok(self.fs()?.session())
    }

    /// Resolve a remote path against the working directory.
    pub fn resolve(&self, input: Option<&str>) -> CliResult<RemotePath> {
        Ok(self.session()?.resolve(input))
    }

    /// Rebuild the repository client from the current settings. The session
    /// survives when the endpoint is unchanged.
    pub fn reconnect(&mut self) -> CliResult<()> {
        let data = &self.config.data;

        let Some(host) = self.overrides.host.as_ref().or(data.host.as_ref()) else {
            self.fs = None;
            self.changes = None;
            return Ok(());
        };
        let base_path = self
            .overrides
            .base_path
            .as_ref()
            .or(data.base_path.as_ref())
            .map_or("", String::as_str);

        let endpoint = Endpoint::new(host, base_path)?;

        let session = match &self.fs {
            Some(fs) if *fs.session().endpoint() == endpoint => fs.session().clone(),
            _ => Session::new(endpoint, data.cwd.clone().unwrap_or_default()),
        };

        let username = self.overrides.username.as_ref().or(data.username.as_ref());
        let password = self.overrides.password.as_ref().or(data.password.as_ref());
        let token = data.jwt.clone().map(AccessToken::new);

        let fs = match (username, password) {
            (Some(username), Some(password)) => {
                debug!(%username, "using password login");
                Fs::new(session.clone(), PasswordTokenStore::new(username, password, token))?
            }
            _ => match token {
                Some(token) => Fs::new(session.clone(), StaticTokenStore::new(token))?,
                None => Fs::new(session.clone(), StaticTokenStore::anonymous())?,
            },
        };

        self.changes = Some(session.subscribe());
        self.fs = Some(Arc::new(fs.with_prefixes(data.prefixes())));

        Ok(())
    }

    /// Persist the working directory and any renewed token.
    pub async fn sync(&mut self) -> CliResult<()> {
        let mut dirty = false;

        if let Some(changes) = &mut self.changes {
            if changes.has_changed().unwrap_or(false) {
                let cwd = changes.borrow_and_update().cwd.clone();

                if self.config.data.cwd.as_ref() != Some(&cwd) {
                    self.config.data.cwd = Some(cwd);
                    dirty = true;
                }
            }
        }

        if let Some(fs) = &self.fs {
            match fs.access_token().await {
                Ok(Some(token)) if self.config.data.jwt.as_deref() != Some(token.as_str()) => {
                    self.config.data.jwt = Some(token.as_str().to_owned());
                    dirty = true;
                }
                Ok(_) => {}
                Err(e) => warn!("unable to read the current token: {e}"),
            }
        }

        if dirty {
            self.config.save()?;
        }

        Ok(())
    }

    /// Change settings, save them and reconnect.
    pub fn update_config(&mut self, f: impl FnOnce(&mut config::Config) -> CliResult<()>) -> CliResult<()> {
        f(&mut self.config.data)?;
        self.config.save()?;
        self.reconnect()
    }
}

//! Every command, usable both from the command line and the shell.
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::{errors::CliError, App, CliResult};

mod acl;
mod config;
mod container;
mod http;
mod io;
mod location;
mod script;
mod transaction;
mod version;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the working directory
    Pwd,

    /// List the members of a container
    Ls { path: Option<String> },

    /// Change the working directory
    Cd { path: String },

    /// Show a resource and its description
    Info { path: Option<String> },

    /// Create a container or binary
    Create(container::CreateArgs),

    /// Edit the RDF of a container or the description of a binary
    Update(container::UpdateArgs),

    /// Permanently delete a resource
    Delete(container::DeleteArgs),

    /// Copy a resource and its members
    Copy { src: String, dst: String },

    /// Move a resource and its members
    Move { src: String, dst: String },

    #[command(subcommand)]
    Transaction(transaction::TransactionCommand),

    #[command(subcommand)]
    Version(version::VersionCommand),

    #[command(subcommand)]
    Acl(acl::AclCommand),

    /// Send a raw request
    Http(http::HttpArgs),

    /// Show or change the configuration
    Config(config::ConfigArgs),

    /// Log in with a username and password
    Login { username: Option<String> },

    /// Forget all credentials
    Logout,

    /// Use an existing token
    Jwt { token: String },

    #[command(subcommand)]
    Io(io::IoCommand),

    /// Start the interactive shell
    Shell,

    /// Run every line of a file as a command, inside one transaction
    Script { file: PathBuf },
}

/// A single shell line.
#[derive(Debug, Parser)]
#[command(no_binary_name = true, disable_version_flag = true)]
pub struct Line {
    #[command(subcommand)]
    pub command: Command,
}

impl Line {
    /// Split `line` into words with POSIX shell quoting and parse them.
    ///
    /// # Errors
    ///
    /// - [`CliError::Words`] for unbalanced quotes or a dangling escape
    /// - [`CliError::Usage`] when the words are not a valid command
    pub fn parse_line(line: &str) -> CliResult<Self> {
        let words = shell_words::split(line)?;
        Ok(Self::try_parse_from(words)?)
    }
}

/// Run a command.
pub async fn run(app: &mut App, command: Command) -> CliResult<()> {
    match command {
        Command::Script { file } => script::run(app, &file).await,
        command => execute(app, command).await,
    }
}

pub(crate) async fn execute(app: &mut App, command: Command) -> CliResult<()> {
    match command {
        Command::Pwd => location::pwd(app),
        Command::Ls { path } => location::ls(app, path.as_deref()).await,
        Command::Cd { path } => location::cd(app, &path).await,
        Command::Info { path } => location::info(app, path.as_deref()).await,
        Command::Create(args) => container::create(app, args).await,
        Command::Update(args) => container::update(app, args).await,
        Command::Delete(args) => container::delete(app, args).await,
        Command::Copy { src, dst } => container::copy(app, &src, &dst, false).await,
        Command::Move { src, dst } => container::copy(app, &src, &dst, true).await,
        Command::Transaction(cmd) => transaction::run(app, cmd).await,
        Command::Version(cmd) => version::run(app, cmd).await,
        Command::Acl(cmd) => acl::run(app, cmd).await,
        Command::Http(args) => http::run(app, args).await,
        Command::Config(args) => config::run(app, args),
        Command::Login { username } => config::login(app, username).await,
        Command::Logout => config::logout(app),
        Command::Jwt { token } => config::jwt(app, token),
        Command::Io(cmd) => io::run(app, cmd).await,
        Command::Shell => Err(CliError::NotAllowed("shell")),
        Command::Script { .. } => Err(CliError::NotAllowed("script")),
    }
}

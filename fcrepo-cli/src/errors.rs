use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Repository(#[from] fcrepo::Error),

    #[error("unable to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("corrupt config file {path}: {source}")]
    ConfigCorrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("no home directory to keep the config file in")]
    NoHomeDir,

    #[error("fedora host not set; run `config set host <url>`")]
    MissingHost,

    #[error("unknown config attribute `{0}`")]
    UnknownAttribute(String),

    #[error("unknown prefix `{0}`")]
    UnknownPrefix(String),

    #[error("{0} is not allowed here")]
    NotAllowed(&'static str),

    #[error("invalid file: {0}")]
    InvalidFile(PathBuf),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("{0}")]
    Readline(#[from] rustyline::error::ReadlineError),

    #[error("prompt error: {0}")]
    Prompt(#[from] dialoguer::Error),

    #[error("invalid command line: {0}")]
    Words(#[from] shell_words::ParseError),

    #[error("{0}")]
    Usage(#[from] clap::Error),
}

use clap::Subcommand;
use fcrepo::{collection, path::resolve_local_path};

use crate::{errors::CliError, App, CliResult};

#[derive(Debug, Subcommand)]
pub enum IoCommand {
    /// Upload a local directory tree into a container
    Import {
        fs_path: String,
        remote_path: Option<String>,
    },
    /// Download a container tree into a local directory
    Export {
        remote_path: Option<String>,
        fs_path: Option<String>,
    },
}

pub(super) async fn run(app: &App, cmd: IoCommand) -> CliResult<()> {
    let fs = app.fs()?;

    let report = match cmd {
        IoCommand::Import {
            fs_path,
            remote_path,
        } => {
            let local = resolve_local_path(&fs_path)?;
            if !local.is_dir() {
                return Err(CliError::InvalidFile(local));
            }

            let remote = app.resolve(remote_path.as_deref())?;
            collection::import(fs, &local, &remote).await?
        }
        IoCommand::Export {
            remote_path,
            fs_path,
        } => {
            let remote = app.resolve(remote_path.as_deref())?;
            let local = resolve_local_path(fs_path.as_deref().unwrap_or("."))?;
            collection::export(fs, &remote, &local).await?
        }
    };

    println!("{report}");
    Ok(())
}

use clap::{Args, Subcommand};
use fcrepo::api::Response;

use crate::{App, CliResult};

#[derive(Debug, Args)]
pub struct VersionTarget {
    pub path: Option<String>,

    /// Version name
    #[arg(short, long = "version-name")]
    pub name: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum VersionCommand {
    /// List the versions of a resource
    List { path: Option<String> },
    /// Print one version
    Get(VersionTarget),
    /// Snapshot the current state
    Create(VersionTarget),
    /// Restore a version
    Revert(VersionTarget),
    /// Delete a version
    Delete(VersionTarget),
}

fn report(action: &str, res: &Response) {
    println!("{action}: {}", res.status);

    let body = res.text();
    if !body.trim().is_empty() {
        println!("{body}");
    }
}

pub(super) async fn run(app: &App, cmd: VersionCommand) -> CliResult<()> {
    let fs = app.fs()?;

    match cmd {
        VersionCommand::List { path } => {
            println!("{}", fs.versions(&app.resolve(path.as_deref())?).await?);
        }
        VersionCommand::Get(t) => {
            let path = app.resolve(t.path.as_deref())?;
            println!("{}", fs.version(&path, t.name.as_deref()).await?);
        }
        VersionCommand::Create(t) => {
            let path = app.resolve(t.path.as_deref())?;
            report("Created", &fs.create_version(&path, t.name.as_deref()).await?);
        }
        VersionCommand::Revert(t) => {
            let path = app.resolve(t.path.as_deref())?;
            report("Reverted", &fs.revert_version(&path, t.name.as_deref()).await?);
        }
        VersionCommand::Delete(t) => {
            let path = app.resolve(t.path.as_deref())?;
            report("Deleted", &fs.delete_version(&path, t.name.as_deref()).await?);
        }
    }

    Ok(())
}

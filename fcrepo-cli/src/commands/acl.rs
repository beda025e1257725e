use clap::Subcommand;
use colored::Colorize;

use crate::{prompt, App, CliResult};

#[derive(Debug, Subcommand)]
pub enum AclCommand {
    /// Print every authorization below /acl as a tree
    Tree,
    /// Show who may access a path, and which ACL says so
    Show { path: Option<String> },
    /// Edit the ACL protecting a path, or create one
    Edit {
        path: Option<String>,
        /// Turtle to use instead of opening an editor
        file: Option<String>,
    },
}

pub(super) async fn run(app: &App, cmd: AclCommand) -> CliResult<()> {
    let fs = app.fs()?;

    match cmd {
        AclCommand::Tree => {
            let tree = fs.acl_tree().await?;
            println!("{}", serde_json::to_string_pretty(&tree)?);
        }
        AclCommand::Show { path } => {
            let path = app.resolve(path.as_deref())?;
            let tree = fs.acl_tree().await?;
            let access = tree.access(&path);

            match tree.definition(&path) {
                Some(def) => println!("{} {def}", "Declared by:".bold()),
                None => println!("{}", "Inherited".bold()),
            }

            if access.is_empty() {
                println!("No access granted to {path}");
            }

            for (agent, access) in access {
                println!("{agent}: {access}");
            }
        }
        AclCommand::Edit { path, file } => {
            let path = app.resolve(path.as_deref())?;
            let doc = fs.read_acl(&path).await?;

            let turtle = match file {
                Some(file) => {
                    let file = fcrepo::path::resolve_local_path(&file)?;
                    tokio::fs::read_to_string(file).await?
                }
                None => {
                    let Some(turtle) = prompt::edit(&doc.turtle, ".ttl")? else {
                        println!("Cancelled, no edits made");
                        return Ok(());
                    };

                    if doc.existing && turtle == doc.turtle {
                        println!("Cancelled, no edits made");
                        return Ok(());
                    }

                    println!("{turtle}\n");

                    if !prompt::confirm("Save")? {
                        println!("Cancelled, no edits made");
                        return Ok(());
                    }

                    turtle
                }
            };

            fs.write_acl(&doc, turtle).await?;
            println!("Saved ACL {} for {path}", doc.location);
        }
    }

    Ok(())
}

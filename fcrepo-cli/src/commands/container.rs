use std::path::PathBuf;

use clap::Args;
use fcrepo::path::resolve_local_path;
use tracing::debug;

use crate::{errors::CliError, prompt, App, CliResult};

const NEW_CONTAINER: &str = "<> dc:title \"A new container\" ;\n  dc:description \"No description provided\" .\n";

#[derive(Debug, Args)]
pub struct CreateArgs {
    path: Option<String>,

    /// Binary file to upload
    #[arg(short, long)]
    binary: Option<String>,

    /// File name to report for the binary instead of its own
    #[arg(short, long, requires = "binary")]
    filename: Option<String>,

    /// RDF describing the container, or the binary if one is given
    #[arg(short, long)]
    rdf: Option<String>,
}

#[derive(Debug, Args)]
pub struct UpdateArgs {
    path: Option<String>,

    /// Turtle to replace the description with, instead of editing it
    #[arg(short, long)]
    rdf: Option<String>,
}

#[derive(Debug, Args)]
pub struct DeleteArgs {
    path: Option<String>,

    /// Do not ask for confirmation
    #[arg(long)]
    force: bool,
}

fn local_file(input: &str) -> CliResult<PathBuf> {
    let path = resolve_local_path(input)?;

    if path.is_file() {
        Ok(path)
    } else {
        Err(CliError::InvalidFile(path))
    }
}

pub(super) async fn create(app: &App, args: CreateArgs) -> CliResult<()> {
    let fs = app.fs()?;
    let path = app.resolve(args.path.as_deref())?;
    let rdf = args.rdf.as_deref().map(local_file).transpose()?;

    match (args.binary, rdf) {
        (Some(binary), rdf) => {
            let metadata = match rdf {
                Some(rdf) => Some(tokio::fs::read_to_string(rdf).await?),
                None => None,
            };

            fs.put_binary(
                &path,
                &local_file(&binary)?,
                args.filename.as_deref(),
                metadata.as_deref(),
            )
            .await?;
        }
        (None, Some(rdf)) => {
            fs.put_file(&path, &rdf, None, false).await?;
        }
        (None, None) => {
            let template = format!("{}\n{NEW_CONTAINER}", fs.prefixes().to_turtle());
            let Some(turtle) = prompt::edit(&template, ".ttl")? else {
                println!("Cancelled, nothing created");
                return Ok(());
            };

            fs.put_turtle(&path, turtle, false).await?;
        }
    }

    println!("Created: {path}");
    Ok(())
}

pub(super) async fn update(app: &App, args: UpdateArgs) -> CliResult<()> {
    let fs = app.fs()?;
    let path = app.resolve(args.path.as_deref())?;
    let tx = fs.session().transaction();
    let location = fs
        .info(&path)
        .await?
        .description(fs.session().endpoint(), tx.as_deref());

    let old = fs.editable_turtle(&location).await?;

    let new = match args.rdf {
        Some(rdf) => tokio::fs::read_to_string(local_file(&rdf)?).await?,
        None => {
            let new = prompt::edit(&old, ".ttl")?.unwrap_or_else(|| old.clone());

            if new == old {
                println!("Cancelled, no edits made");
                return Ok(());
            }

            println!("{new}\n");

            if !prompt::confirm("Save")? {
                println!("Cancelled, no edits made");
                return Ok(());
            }

            new
        }
    };

    debug!(%location, "patching description");
    fs.update_rdf(&location, &new, Some(&old)).await?;

    println!("Updated: {location}");
    Ok(())
}

pub(super) async fn delete(app: &App, args: DeleteArgs) -> CliResult<()> {
    let fs = app.fs()?;
    let path = app.resolve(args.path.as_deref())?;

    if !args.force {
        let description = fs.describe(&path).await?;
        println!("\nRemove: {path}\n\n{}\n", description.turtle);

        if !prompt::confirm("Delete")? {
            println!("Cancelled, nothing deleted");
            return Ok(());
        }
    }

    fs.delete(&path, true).await?;

    println!("Deleted: {path}");
    Ok(())
}

pub(super) async fn copy(app: &App, src: &str, dst: &str, remove: bool) -> CliResult<()> {
    let fs = app.fs()?;
    let src = app.resolve(Some(src))?;
    let dst = app.resolve(Some(dst))?;

    if remove {
        fs.r#move(&src, &dst).await?;
        println!("Moved: {src} -> {dst}");
    } else {
        fs.copy(&src, &dst).await?;
        println!("Copied: {src} -> {dst}");
    }

    Ok(())
}

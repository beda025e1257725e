use colored::Colorize;
use fcrepo::{location::Children, location::ResourceKind};

use crate::{App, CliResult};

const REL_SERVICE: &str = "service";

pub(super) fn pwd(app: &App) -> CliResult<()> {
    println!("{}", app.session()?.cwd());
    Ok(())
}

pub(super) async fn ls(app: &App, path: Option<&str>) -> CliResult<()> {
    let path = app.resolve(path)?;

    match app.fs()?.list_children(&path).await? {
        Children::Binary => println!("{}", path.file_name().unwrap_or("/")),
        Children::Container(names) => {
            for name in names {
                println!("{name}");
            }
        }
    }

    Ok(())
}

pub(super) async fn cd(app: &App, path: &str) -> CliResult<()> {
    let cwd = app.fs()?.cd(path).await?;
    println!("{cwd}");
    Ok(())
}

pub(super) async fn info(app: &App, path: Option<&str>) -> CliResult<()> {
    let path = app.resolve(path)?;
    let description = app.fs()?.describe(&path).await?;
    let info = &description.info;

    if info.kind == ResourceKind::Binary {
        println!("{}\n", "========== Binary File ==========".bold());

        if let Some(content_type) = &info.content_type {
            println!("content-type: {content_type}");
        }

        if let Some(disposition) = &info.content_disposition {
            for (key, value) in &disposition.params {
                println!("{key}: {value}");
            }
        }
    }

    let services = info.links.get(REL_SERVICE);
    if !services.is_empty() {
        println!("\n{}\n", "========== Services ==========".bold());
        for service in services {
            println!("{service}");
        }
        println!();
    }

    match info.kind {
        ResourceKind::Binary => println!(
            "\n{} {}\n",
            "========== Described By ==========".bold(),
            description.location
        ),
        ResourceKind::Container => println!("{}\n", "========== Container ==========".bold()),
    }

    println!("{}", description.turtle);

    Ok(())
}

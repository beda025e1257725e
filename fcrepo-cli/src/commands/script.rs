use std::path::Path;

use colored::Colorize;
use fcrepo::path::resolve_local_path;
use tracing::info;

use super::{execute, Line};
use crate::{errors::CliError, prompt, App, CliResult};

/// Lines worth running: blank lines and `#` comments are skipped.
fn commands(script: &str) -> impl Iterator<Item = &str> {
    script
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

pub(super) async fn run(app: &mut App, file: &Path) -> CliResult<()> {
    let file = resolve_local_path(&file.to_string_lossy())?;
    if !file.is_file() {
        return Err(CliError::InvalidFile(file));
    }

    let script = tokio::fs::read_to_string(&file).await?;
    let token = app.fs()?.start_transaction().await?;
    println!("Transaction started: {token}");

    let mut failed = 0_usize;

    for line in commands(&script) {
        println!("\n{line}");

        let result = match Line::parse_line(line) {
            Ok(Line { command }) => execute(app, command).await,
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            failed += 1;
            eprintln!("{} {e}", "error:".red().bold());
        }
    }

    info!(failed, "script finished");

    let fs = app.fs()?;
    if prompt::confirm("Commit Changes")? {
        println!("Transaction committed: {}", fs.commit_transaction().await?);
    } else {
        println!("Transaction rolled back: {}", fs.rollback_transaction().await?);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_blank_lines_and_comments() {
        let script = "cd /a\n\n  # make things\ncreate b -r b.ttl\n   \n";

        assert_eq!(commands(script).collect::<Vec<_>>(), ["cd /a", "create b -r b.ttl"]);
    }
}

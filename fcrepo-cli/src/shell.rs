//! The interactive shell.
use std::sync::Arc;

use clap::CommandFactory;
use colored::Colorize;
use fcrepo::{location::Children, Fs};
use rustyline::{
    completion::{Completer, FilenameCompleter, Pair},
    error::ReadlineError,
    highlight::Highlighter,
    hint::Hinter,
    history::DefaultHistory,
    validate::Validator,
    Context, Editor, Helper,
};
use tokio::runtime::Handle;
use tracing::debug;

use crate::{
    commands::{self, Command, Line},
    errors::CliError,
    prompt, App, CliResult,
};

/// Commands whose positional arguments are remote paths.
const REMOTE_PATH_COMMANDS: &[&str] = &[
    "ls", "cd", "info", "create", "update", "delete", "copy", "move", "acl", "version", "http",
];

/// Flags followed by a local file.
const LOCAL_FILE_FLAGS: &[&str] = &["-b", "--binary", "-r", "--rdf", "-@", "--data-binary"];

#[derive(Default)]
struct ShellHelper {
    fs: Option<Arc<Fs>>,
    files: FilenameCompleter,
    commands: Vec<String>,
}

impl ShellHelper {
    fn new() -> Self {
        Self {
            commands: Line::command()
                .get_subcommands()
                .map(|c| c.get_name().to_owned())
                .chain(["exit".to_owned()])
                .collect(),
            ..Self::default()
        }
    }

    fn remote_paths(&self, word: &str) -> Vec<Pair> {
        let Some(fs) = &self.fs else {
            return Vec::new();
        };

        let (dir, prefix) = match word.rfind('/') {
            Some(i) => word.split_at(i + 1),
            None => ("", word),
        };
        let path = fs.session().resolve(Some(if dir.is_empty() { "." } else { dir }));

        // readline runs inside `block_in_place`
        let listing = Handle::current().block_on(fs.list_children(&path));

        match listing {
            Ok(Children::Container(names)) => names
                .into_iter()
                .filter(|name| !name.starts_with('/') && name.starts_with(prefix))
                .map(|name| Pair {
                    display: name.clone(),
                    replacement: format!("{dir}{name}"),
                })
                .collect(),
            Ok(Children::Binary) => Vec::new(),
            Err(e) => {
                debug!(%path, "no completions: {e}");
                Vec::new()
            }
        }
    }
}

impl Completer for ShellHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let start = line[..pos]
            .rfind(char::is_whitespace)
            .map_or(0, |i| i + 1);
        let word = &line[start..pos];
        let tokens: Vec<&str> = line[..start].split_whitespace().collect();

        let Some(cmd) = tokens.first() else {
            let pairs = self
                .commands
                .iter()
                .filter(|c| c.starts_with(word))
                .map(|c| Pair {
                    display: c.clone(),
                    replacement: c.clone(),
                })
                .collect();
            return Ok((start, pairs));
        };

        let local = matches!(*cmd, "script")
            || (*cmd == "io" && tokens.get(1) == Some(&"import") && tokens.len() == 2)
            || tokens.last().is_some_and(|t| LOCAL_FILE_FLAGS.contains(t));

        if local {
            return self.files.complete(line, pos, ctx);
        }

        if REMOTE_PATH_COMMANDS.contains(cmd) && !word.starts_with('-') {
            return Ok((start, self.remote_paths(word)));
        }

        Ok((start, Vec::new()))
    }
}

impl Hinter for ShellHelper {
    type Hint = String;
}

impl Highlighter for ShellHelper {}

impl Validator for ShellHelper {}

impl Helper for ShellHelper {}

fn prompt_for(app: &App) -> String {
    match app.session() {
        Ok(session) => match session.transaction() {
            Some(tx) => format!("fccli [{tx}] {}> ", session.cwd()),
            None => format!("fccli {}> ", session.cwd()),
        },
        Err(_) => "fccli> ".to_owned(),
    }
}

/// Ask for a host if none is configured yet.
fn first_run(app: &mut App) -> CliResult<()> {
    if app.fs().is_ok() {
        return Ok(());
    }

    println!("Fedora host not set.");
    let host = prompt::line("Fedora Host")?;
    let base_path = prompt::line("Fedora Base Path [ex: /rest]")?;

    app.update_config(|config| {
        config.set("host", &host)?;
        config.set("basePath", &base_path)
    })
}

/// Read and run commands until `exit` or end of input.
pub async fn run(app: &mut App) -> CliResult<()> {
    if let Err(e) = first_run(app) {
        eprintln!("{} {e}", "error:".red().bold());
    }

    let mut rl: Editor<ShellHelper, DefaultHistory> = Editor::new()?;
    rl.set_helper(Some(ShellHelper::new()));

    loop {
        if let Some(helper) = rl.helper_mut() {
            helper.fs = app.shared_fs();
        }

        let prompt = prompt_for(app);
        let line = match tokio::task::block_in_place(|| rl.readline(&prompt)) {
            Ok(line) => line,
            Err(ReadlineError::Eof) => break,
            Err(ReadlineError::Interrupted) => continue,
            Err(e) => return Err(e.into()),
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        rl.add_history_entry(line)?;

        if matches!(line, "exit" | "quit") {
            break;
        }

        let result = match Line::parse_line(line) {
            Ok(Line {
                command: Command::Shell,
            }) => {
                println!("Already in the shell");
                Ok(())
            }
            Ok(Line { command }) => commands::run(app, command).await,
            Err(CliError::Usage(e)) => {
                let _ = e.print();
                continue;
            }
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            eprintln!("{} {e}", "error:".red().bold());
        }

        if let Err(e) = app.sync().await {
            eprintln!("{} {e}", "error:".red().bold());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn knows_every_command() {
        let helper = ShellHelper::new();

        for name in ["ls", "cd", "http", "acl", "io", "script", "exit"] {
            assert!(helper.commands.iter().any(|c| c == name), "{name}");
        }
    }
}

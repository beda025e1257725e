use clap::Parser;
use colored::Colorize;
use fcrepo_cli::{
    commands::{self, Command},
    config::ConfigFile,
    shell, App, CliResult, Overrides,
};
use tracing_subscriber::EnvFilter;

/// Command line client for Fedora repositories. Without a command, the
/// interactive shell is started.
#[derive(Debug, Parser)]
#[command(name = "fccli", version, about)]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Option<Command>,
}

async fn run(cli: Cli) -> CliResult<()> {
    let config = ConfigFile::locate(cli.overrides.config.as_deref())?;
    let mut app = App::new(config, cli.overrides)?;

    match cli.command {
        None | Some(Command::Shell) => shell::run(&mut app).await?,
        Some(command) => {
            let result = commands::run(&mut app, command).await;
            app.sync().await?;
            result?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("{} {e}", "error:".red().bold());
        std::process::exit(1);
    }
}

use clap::Subcommand;

use crate::{App, CliResult};

#[derive(Debug, Subcommand)]
pub enum TransactionCommand {
    /// Start a transaction; everything until commit or rollback goes through it
    Start,
    /// Commit the active transaction
    Commit,
    /// Roll back the active transaction
    Rollback,
}

pub(super) async fn run(app: &App, cmd: TransactionCommand) -> CliResult<()> {
    let fs = app.fs()?;

    match cmd {
        TransactionCommand::Start => {
            println!("Transaction started: {}", fs.start_transaction().await?);
        }
        TransactionCommand::Commit => {
            println!("Transaction committed: {}", fs.commit_transaction().await?);
        }
        TransactionCommand::Rollback => {
            println!("Transaction rolled back: {}", fs.rollback_transaction().await?);
        }
    }

    Ok(())
}

use clap::{Args, Subcommand};
use fcrepo::auth::AccessToken;

use crate::{errors::CliError, prompt, App, CliResult};

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: Option<ConfigCommand>,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the current configuration
    Show,
    /// Set host, basePath, username, password or jwt; an empty value unsets
    Set { attribute: String, value: String },
    /// Show or change the global prefixes
    Prefix {
        #[command(subcommand)]
        command: Option<PrefixCommand>,
    },
}

#[derive(Debug, Subcommand)]
pub enum PrefixCommand {
    Show,
    Add { prefix: String, url: String },
    Remove { prefix: String },
}

pub(super) fn run(app: &mut App, args: ConfigArgs) -> CliResult<()> {
    match args.command.unwrap_or(ConfigCommand::Show) {
        ConfigCommand::Show => show(app),
        ConfigCommand::Set { attribute, value } => {
            app.update_config(|config| config.set(&attribute, &value))?;
            show(app)
        }
        ConfigCommand::Prefix { command } => match command.unwrap_or(PrefixCommand::Show) {
            PrefixCommand::Show => {
                for (prefix, url) in app.config.data.prefixes().iter() {
                    println!("{prefix}: {url}");
                }
                Ok(())
            }
            PrefixCommand::Add { prefix, url } => app.update_config(|config| {
                let mut prefixes = config.prefixes();
                prefixes.insert(prefix, url);
                config.global_prefix = Some(prefixes);
                Ok(())
            }),
            PrefixCommand::Remove { prefix } => app.update_config(|config| {
                let mut prefixes = config.prefixes();
                prefixes
                    .remove(&prefix)
                    .ok_or_else(|| CliError::UnknownPrefix(prefix.clone()))?;
                config.global_prefix = Some(prefixes);
                Ok(())
            }),
        },
    }
}

fn show(app: &App) -> CliResult<()> {
    let data = &app.config.data;
    let endpoint = app
        .session()
        .map(|s| format!("{}{}", s.endpoint().host(), s.endpoint().base_path()))
        .unwrap_or_else(|_| "not set".to_owned());
    let cwd = app
        .session()
        .map(|s| s.cwd().to_string())
        .unwrap_or_else(|_| "/".to_owned());

    println!("\n- Current Config -");
    println!("Host/Base Path: {endpoint}");
    println!(
        "User: {}",
        data.username.as_deref().unwrap_or("Not logged in")
    );
    println!("Config File: {}", app.config.path().display());
    println!("CWD: {cwd}\n");

    Ok(())
}

pub(super) async fn login(app: &mut App, username: Option<String>) -> CliResult<()> {
    let username = match username.or_else(|| app.config.data.username.clone()) {
        Some(username) => username,
        None => prompt::line("username")?,
    };
    let password = prompt::password("password")?;

    let token = app.fs()?.login(&username, &password).await?;

    app.update_config(|config| {
        config.jwt = Some(token.as_str().to_owned());
        config.username = Some(username.clone());
        Ok(())
    })?;

    println!("Logged in as {username}");
    Ok(())
}

pub(super) fn logout(app: &mut App) -> CliResult<()> {
    app.update_config(|config| {
        config.logout();
        Ok(())
    })?;

    println!("Logged out");
    Ok(())
}

pub(super) fn jwt(app: &mut App, token: String) -> CliResult<()> {
    let token = AccessToken::new(token);
    let claims = token.claims()?;

    app.update_config(|config| {
        config.jwt = Some(token.as_str().to_owned());
        config.username = claims.username.clone();
        Ok(())
    })?;

    match claims.username {
        Some(username) => println!("Using token of {username}"),
        None => println!("Using token"),
    }

    Ok(())
}

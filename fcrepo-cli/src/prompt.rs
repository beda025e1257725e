//! Questions on the terminal and edits in `$EDITOR`.
use dialoguer::{theme::ColorfulTheme, Confirm, Editor, Input, Password};
use tracing::debug;

use crate::CliResult;

/// Ask for a line of input. An empty answer is allowed.
pub fn line(question: &str) -> CliResult<String> {
    let answer: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt(question)
        .allow_empty(true)
        .interact_text()?;

    Ok(answer.trim().to_owned())
}

/// Ask for a secret without echoing it.
pub fn password(question: &str) -> CliResult<String> {
    Ok(Password::with_theme(&ColorfulTheme::default())
        .with_prompt(question)
        .interact()?)
}

/// Ask a yes/no question. Yes is the default.
pub fn confirm(question: &str) -> CliResult<bool> {
    Ok(Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(question)
        .default(true)
        .interact()?)
}

/// Let the user edit `text` in `$VISUAL` or `$EDITOR`. `None` when the
/// editor was closed without saving.
pub fn edit(text: &str, extension: &str) -> CliResult<Option<String>> {
    debug!(extension, "opening editor");

    Ok(Editor::new().extension(extension).edit(text)?)
}

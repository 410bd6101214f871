//! Operator prompts.

use inquire::Confirm;
use tracing::info;

use crate::application::ports::{PromptError, Prompter};

/// Asks on the terminal with `inquire`.
#[derive(Debug, Default, Clone, Copy)]
pub struct InquirePrompter;

impl Prompter for InquirePrompter {
    fn confirm(&self, question: &str, default: bool) -> Result<bool, PromptError> {
        Confirm::new(question)
            .with_default(default)
            .prompt()
            .map_err(|e| PromptError(e.to_string()))
    }
}

/// Answers "yes" to everything (`--yes`).
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeYes;

impl Prompter for AssumeYes {
    fn confirm(&self, question: &str, _default: bool) -> Result<bool, PromptError> {
        info!("{question} [assumed yes]");
        Ok(true)
    }
}

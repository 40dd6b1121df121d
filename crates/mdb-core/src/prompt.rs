//! Interactive prompts.
//!
//! The core only describes what it needs to ask; the CLI supplies a terminal
//! implementation. Validation stays in the core, so `text` returns whatever
//! the user typed and callers re-ask on invalid input.

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait Prompter: Send + Sync {
    /// Pick one of `items`; returns its index.
    fn select(&self, prompt: &str, items: &[String], default: usize) -> anyhow::Result<usize>;

    /// Free text input, pre-filled with `initial` when given.
    fn text(&self, prompt: &str, initial: Option<String>) -> anyhow::Result<String>;

    /// Hidden input.
    fn password(&self, prompt: &str) -> anyhow::Result<String>;

    fn confirm(&self, prompt: &str, default: bool) -> anyhow::Result<bool>;

    /// Print a line for the user (errors surfaced mid-flow, warnings, notes).
    fn notice(&self, message: &str);
}

/// Ask until `validate` accepts the trimmed answer.
pub fn text_until_valid<F>(
    prompter: &dyn Prompter,
    prompt: &str,
    initial: Option<String>,
    validate: F,
) -> anyhow::Result<String>
where
    F: Fn(&str) -> Result<(), String>,
{
    loop {
        let answer = prompter.text(prompt, initial.clone())?;
        let answer = answer.trim();
        match validate(answer) {
            Ok(()) => return Ok(answer.to_string()),
            Err(reason) => prompter.notice(&reason),
        }
    }
}

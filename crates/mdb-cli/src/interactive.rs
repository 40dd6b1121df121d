//! Terminal prompts for the publish flow.
//!
//! Implements the core's [`Prompter`] with dialoguer.

use std::io::{self, Write};
use std::sync::Mutex;

use anyhow::Result;
use console::style;
use dialoguer::{Confirm, Input, Password, Select, theme::ColorfulTheme};

use mdb_core::prompt::Prompter;

/// dialoguer-backed prompter.
pub struct DialoguerPrompter<W: Write + Send = io::Stderr> {
    theme: ColorfulTheme,
    /// Destination for notices
    writer: Mutex<W>,
}

impl DialoguerPrompter<io::Stderr> {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
            writer: Mutex::new(io::stderr()),
        }
    }
}

impl Default for DialoguerPrompter<io::Stderr> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> DialoguerPrompter<W> {
    /// Create a prompter with a custom notice writer (for testing).
    #[cfg(test)]
    pub fn with_writer(writer: W) -> Self {
        Self {
            theme: ColorfulTheme::default(),
            writer: Mutex::new(writer),
        }
    }

    #[cfg(test)]
    fn into_writer(self) -> W {
        match self.writer.into_inner() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> Prompter for DialoguerPrompter<W> {
    fn select(&self, prompt: &str, items: &[String], default: usize) -> Result<usize> {
        let selection = Select::with_theme(&self.theme)
            .with_prompt(prompt)
            .items(items)
            .default(default)
            .interact()?;
        Ok(selection)
    }

    fn text(&self, prompt: &str, initial: Option<String>) -> Result<String> {
        let mut input = Input::<String>::with_theme(&self.theme)
            .with_prompt(prompt)
            .allow_empty(true);
        if let Some(initial) = initial {
            input = input.with_initial_text(initial);
        }
        Ok(input.interact_text()?)
    }

    fn password(&self, prompt: &str) -> Result<String> {
        let password = Password::with_theme(&self.theme)
            .with_prompt(prompt)
            .interact()?;
        Ok(password)
    }

    fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        let confirmed = Confirm::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(default)
            .interact()?;
        Ok(confirmed)
    }

    fn notice(&self, message: &str) {
        let mut writer = match self.writer.lock() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        };
        let _ = writeln!(writer, "{} {}", style("!").yellow().bold(), message);
    }
}

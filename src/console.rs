//! Line input from the terminal.

use std::collections::VecDeque;

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::error::{Error, Result};

/// A source of input lines.
///
/// `Ok(None)` means input has ended (Ctrl-D) or was interrupted at the prompt
/// (Ctrl-C); either way the conversation should stop.
pub trait Console {
    /// Reads one line after printing `prompt`.
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>>;

    /// Reads the answer to a confirmation question.
    fn read_confirmation(&mut self) -> Result<Option<String>> {
        self.read_line("")
    }
}

/// Interactive console backed by rustyline.
pub struct RustylineConsole {
    editor: DefaultEditor,
}

impl RustylineConsole {
    /// Creates a console attached to the terminal.
    pub fn new() -> Result<Self> {
        let editor = DefaultEditor::new().map_err(|e| Error::input(e.to_string()))?;
        Ok(Self { editor })
    }

    fn read(&mut self, prompt: &str, remember: bool) -> Result<Option<String>> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if remember && !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                Ok(Some(line))
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
            Err(ReadlineError::Io(err)) => Err(Error::io("reading terminal input", err)),
            Err(err) => Err(Error::input(err.to_string())),
        }
    }
}

impl Console for RustylineConsole {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        self.read(prompt, true)
    }

    fn read_confirmation(&mut self) -> Result<Option<String>> {
        self.read("", false)
    }
}

/// Console that replays a fixed list of lines, then reports end of input.
#[derive(Debug, Default)]
pub struct ScriptedConsole {
    lines: VecDeque<String>,
    prompts: Vec<String>,
}

impl ScriptedConsole {
    /// Creates a console that will return `lines` in order.
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            prompts: Vec::new(),
        }
    }

    /// Every prompt shown so far.
    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    /// Lines not yet consumed.
    pub fn remaining(&self) -> usize {
        self.lines.len()
    }
}

impl Console for ScriptedConsole {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        self.prompts.push(prompt.to_string());
        Ok(self.lines.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_console_ends_with_none() {
        let mut console = ScriptedConsole::new(["one", ""]);
        assert_eq!(console.read_line("λ ").unwrap().as_deref(), Some("one"));
        assert_eq!(console.read_confirmation().unwrap().as_deref(), Some(""));
        assert_eq!(console.read_line("λ ").unwrap(), None);
        assert_eq!(console.prompts(), ["λ ", "", "λ "]);
        assert_eq!(console.remaining(), 0);
    }
}

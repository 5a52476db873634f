//! Terminal output for the assistant.
//!
//! The [`Renderer`] trait separates what the conversation loop says from how
//! it reaches the terminal, so tests can capture output and colorless
//! configurations can drop ANSI styling.

use std::io::{self, Stdout, Write};

/// ANSI escape code for bold text (used for the input prompt).
pub const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code for dim text (used for command output).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for red text (used for the confirmation warning).
const ANSI_RED: &str = "\x1b[31m";

/// ANSI escape code to reset all styling.
pub const ANSI_RESET: &str = "\x1b[0m";

/// Moves the cursor up two lines.
const ANSI_UP_TWO: &str = "\x1b[2A";

/// Clears the current line.
const ANSI_CLEAR_LINE: &str = "\x1b[K";

/// Trait for rendering assistant output.
pub trait Renderer: Send {
    /// Print a chunk of the model's reply.
    ///
    /// Streaming backends call this once per delta; non-streaming backends
    /// call it once with the whole reply.
    fn print_text(&mut self, text: &str);

    /// Called when a reply is complete.
    fn finish_response(&mut self);

    /// Print the execution confirmation warning.
    fn print_warning(&mut self, warning: &str);

    /// Remove the confirmation warning and the answer line.
    fn clear_warning(&mut self);

    /// Print the output of an executed script.
    fn print_command_output(&mut self, output: &str);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer {
    stdout: Stdout,
    use_color: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
        }
    }

    /// Whether ANSI styling is emitted.
    pub fn use_color(&self) -> bool {
        self.use_color
    }

    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn print_text(&mut self, text: &str) {
        print!("{text}");
        self.flush();
    }

    fn finish_response(&mut self) {
        println!();
        self.flush();
    }

    fn print_warning(&mut self, warning: &str) {
        if self.use_color {
            println!("{ANSI_RED}{warning}{ANSI_RESET}");
        } else {
            println!("{warning}");
        }
        self.flush();
    }

    fn clear_warning(&mut self) {
        if self.use_color {
            println!("{ANSI_UP_TWO}");
            println!("{ANSI_CLEAR_LINE}");
        }
        self.flush();
    }

    fn print_command_output(&mut self, output: &str) {
        if self.use_color {
            println!("{ANSI_DIM}{}{ANSI_RESET}", output.trim());
        } else {
            println!("{}", output.trim());
        }
        self.flush();
    }

    fn print_error(&mut self, error: &str) {
        println!("Error: {error}");
        self.flush();
    }

    fn print_info(&mut self, info: &str) {
        println!("{info}");
        self.flush();
    }
}

/// One call made on a [`RecordingRenderer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    /// `print_text`
    Text(String),
    /// `finish_response`
    FinishResponse,
    /// `print_warning`
    Warning(String),
    /// `clear_warning`
    ClearWarning,
    /// `print_command_output`
    CommandOutput(String),
    /// `print_error`
    Error(String),
    /// `print_info`
    Info(String),
}

/// Renderer that records calls instead of printing them.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    /// Every call, in order.
    pub calls: Vec<Rendered>,
}

impl RecordingRenderer {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// The concatenation of all `print_text` chunks.
    pub fn text(&self) -> String {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Rendered::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Every error message printed.
    pub fn errors(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Rendered::Error(error) => Some(error.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Renderer for RecordingRenderer {
    fn print_text(&mut self, text: &str) {
        self.calls.push(Rendered::Text(text.to_string()));
    }

    fn finish_response(&mut self) {
        self.calls.push(Rendered::FinishResponse);
    }

    fn print_warning(&mut self, warning: &str) {
        self.calls.push(Rendered::Warning(warning.to_string()));
    }

    fn clear_warning(&mut self) {
        self.calls.push(Rendered::ClearWarning);
    }

    fn print_command_output(&mut self, output: &str) {
        self.calls.push(Rendered::CommandOutput(output.to_string()));
    }

    fn print_error(&mut self, error: &str) {
        self.calls.push(Rendered::Error(error.to_string()));
    }

    fn print_info(&mut self, info: &str) {
        self.calls.push(Rendered::Info(info.to_string()));
    }
}

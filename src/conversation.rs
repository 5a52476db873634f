//! The read, ask, confirm, execute loop.
//!
//! Each turn wraps the user's message together with the output of the last
//! executed script, sends it to the model, and offers to run any `sh` blocks
//! in the reply:
//!
//! ```text
//! AwaitingInput -> Sending -> AwaitingConfirmation -> Executing -> AwaitingInput
//! ```
//!
//! Replies without shell blocks go straight back to `AwaitingInput`.  Every
//! user message, reply, error, and script output is appended to the
//! transcript as it happens.

use std::fmt;

use crate::chat::{AskOptions, ChatBackend, ChatSession};
use crate::config::ChatshConfig;
use crate::console::Console;
use crate::error::Result;
use crate::executor::Executor;
use crate::extract::{combine, extract_blocks};
use crate::history::{HistoryRole, Transcript};
use crate::models::ModelSpec;
use crate::observability::COMMANDS_SKIPPED;
use crate::prompt::system_prompt;
use crate::render::{ANSI_BOLD, ANSI_RESET, Renderer};

/// The input prompt.
pub const INPUT_PROMPT: &str = "λ ";

/// Shown before asking whether to run the extracted script.
pub const CONFIRMATION_WARNING: &str = "Press enter to execute, or 'N' to cancel.";

/// Shown when the user declines to run a script.
pub const SKIPPED_NOTICE: &str = "Execution skipped.";

/// Fed back to the model when the user declines to run a script.
pub const SKIPPED_OUTPUT: &str = "Command skipped.\n";

/// Where the loop is within a turn.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LoopState {
    /// Waiting for the user's message.
    AwaitingInput,
    /// Waiting for the model's reply.
    Sending,
    /// Waiting for the user to confirm the extracted script.
    AwaitingConfirmation,
    /// Running the script.
    Executing,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopState::AwaitingInput => write!(f, "awaiting input"),
            LoopState::Sending => write!(f, "sending"),
            LoopState::AwaitingConfirmation => write!(f, "awaiting confirmation"),
            LoopState::Executing => write!(f, "executing"),
        }
    }
}

/// Wraps `message` and the last script output in role tags.
///
/// A blank message produces only the `<SYSTEM>` segment.
pub fn envelope(last_output: &str, message: &str) -> String {
    let last_output = last_output.trim();
    if message.trim().is_empty() {
        format!("<SYSTEM>\n{last_output}\n</SYSTEM>")
    } else {
        format!("<SYSTEM>\n{last_output}\n</SYSTEM>\n<USER>\n{message}\n</USER>\n")
    }
}

/// Per-request settings the loop passes to the session.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopSettings {
    /// System prompt, or `None` for models that reject one.
    pub system_prompt: Option<String>,
    /// Reply budget.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Whether to stream replies.
    pub stream: bool,
    /// Whether to mark the system prompt cacheable.
    pub system_cacheable: bool,
    /// Whether the input prompt is styled.
    pub use_color: bool,
}

impl LoopSettings {
    /// Settings for the chosen model, with a system prompt naming `prompt_shell`.
    pub fn from_config(config: &ChatshConfig, spec: &ModelSpec, prompt_shell: &str) -> Self {
        Self {
            system_prompt: spec.system_prompt.then(|| system_prompt(prompt_shell)),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            stream: config.stream,
            system_cacheable: config.system_cacheable,
            use_color: config.use_color,
        }
    }

    fn ask_options(&self) -> AskOptions {
        let options = AskOptions::default()
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature)
            .with_stream(self.stream)
            .with_system_cacheable(self.system_cacheable);
        match &self.system_prompt {
            Some(system) => options.with_system(system.clone()),
            None => options,
        }
    }

    fn input_prompt(&self) -> String {
        if self.use_color {
            format!("{ANSI_BOLD}{INPUT_PROMPT}{ANSI_RESET}")
        } else {
            INPUT_PROMPT.to_string()
        }
    }
}

/// The interactive assistant.
pub struct ConversationLoop<B: ChatBackend = Box<dyn ChatBackend>> {
    session: ChatSession<B>,
    executor: Box<dyn Executor>,
    transcript: Box<dyn Transcript>,
    settings: LoopSettings,
    state: LoopState,
    last_output: String,
    initial_message: Option<String>,
}

impl<B: ChatBackend> ConversationLoop<B> {
    /// Creates a loop with empty command output and no pending message.
    pub fn new(
        session: ChatSession<B>,
        executor: Box<dyn Executor>,
        transcript: Box<dyn Transcript>,
        settings: LoopSettings,
    ) -> Self {
        Self {
            session,
            executor,
            transcript,
            settings,
            state: LoopState::AwaitingInput,
            last_output: String::new(),
            initial_message: None,
        }
    }

    /// Sends `message` as the first turn instead of prompting for it.
    pub fn with_initial_message(mut self, message: Option<String>) -> Self {
        self.initial_message = message;
        self
    }

    /// The current state.
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Output of the last executed script, fed back with the next message.
    pub fn last_output(&self) -> &str {
        &self.last_output
    }

    /// The underlying session.
    pub fn session(&self) -> &ChatSession<B> {
        &self.session
    }

    /// Runs turns until input ends.
    ///
    /// Per-turn failures are reported and logged, and the loop continues.
    /// Fatal errors (missing credentials and the like) end the loop and are
    /// returned.
    pub async fn run(
        &mut self,
        console: &mut dyn Console,
        renderer: &mut dyn Renderer,
    ) -> Result<()> {
        while self.turn(console, renderer).await? {}
        Ok(())
    }

    /// Runs one turn.  Returns `false` once input has ended.
    pub async fn turn(
        &mut self,
        console: &mut dyn Console,
        renderer: &mut dyn Renderer,
    ) -> Result<bool> {
        self.state = LoopState::AwaitingInput;
        let message = match self.initial_message.take() {
            Some(message) => message,
            None => match console.read_line(&self.settings.input_prompt())? {
                Some(line) => line,
                None => return Ok(false),
            },
        };

        self.state = LoopState::Sending;
        self.record(HistoryRole::User, &message, renderer);
        let outgoing = envelope(&self.last_output, &message);
        let reply = match self
            .session
            .send(&outgoing, self.settings.ask_options(), renderer)
            .await
        {
            Ok(reply) => reply,
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                let text = err.to_string();
                renderer.print_error(&text);
                self.record(HistoryRole::Error, &text, renderer);
                self.state = LoopState::AwaitingInput;
                return Ok(true);
            }
        };
        renderer.finish_response();
        self.record(HistoryRole::Assistant, &reply, renderer);

        let blocks = extract_blocks(&reply);
        self.last_output.clear();
        if blocks.is_empty() {
            self.state = LoopState::AwaitingInput;
            return Ok(true);
        }

        self.state = LoopState::AwaitingConfirmation;
        renderer.print_warning(CONFIRMATION_WARNING);
        let answer = console.read_confirmation()?;
        renderer.clear_warning();
        let Some(answer) = answer else {
            return Ok(false);
        };

        self.state = LoopState::Executing;
        if answer.eq_ignore_ascii_case("n") {
            COMMANDS_SKIPPED.click();
            renderer.print_info(SKIPPED_NOTICE);
            self.last_output = SKIPPED_OUTPUT.to_string();
        } else {
            let result = self.executor.run(&combine(&blocks)).await;
            renderer.print_command_output(&result.combined_text);
            self.last_output = result.combined_text;
        }
        let output = self.last_output.clone();
        self.record(HistoryRole::System, &output, renderer);
        self.state = LoopState::AwaitingInput;
        Ok(true)
    }

    fn record(&mut self, role: HistoryRole, message: &str, renderer: &mut dyn Renderer) {
        if let Err(err) = self.transcript.append(role, message) {
            renderer.print_error(&err.to_string());
        }
    }
}

//! ChatSH: talk to a model in the terminal and run the shell scripts it
//! writes, after confirmation.
//!
//! # Usage
//!
//! ```bash
//! # Default model (c)
//! chatsh
//!
//! # Pick a model by shortcode and send a first message
//! chatsh g list the five largest files here
//! ```
//!
//! Tokens are read from `~/.config/{vendor}.token`.  Conversations are
//! logged under `~/.ai/chatsh_history`.

use std::process;

use time::OffsetDateTime;

use chatsh::prompt::shell_from_env;
use chatsh::{
    ChatSession, ChatshArgs, ChatshConfig, ConversationLoop, HistoryLog, LoopSettings,
    PlainTextRenderer, Renderer, RustylineConsole, ShellExecutor, backend_for,
};

/// Exit status used when the user interrupts a running turn.
const INTERRUPTED_EXIT: i32 = 130;

#[tokio::main]
async fn main() {
    let args = ChatshArgs::parse(std::env::args().skip(1));
    let mut renderer = PlainTextRenderer::new();
    if let Err(err) = run(args, &mut renderer).await {
        if err.is_fatal() {
            renderer.print_info(&err.to_string());
        } else {
            renderer.print_error(&err.to_string());
        }
        process::exit(1);
    }
}

async fn run(args: ChatshArgs, renderer: &mut PlainTextRenderer) -> chatsh::Result<()> {
    let config = ChatshConfig::load()?;
    let spec = config.resolve_model(args.model.as_deref())?;
    let secrets = config.secrets();
    // Fail before the first prompt rather than after the first message.
    secrets.token(spec.vendor)?;

    *renderer = PlainTextRenderer::with_color(config.use_color);
    renderer.print_info(&format!("Welcome to ChatSH. Model: {}\n", spec.model));
    if !spec.system_prompt {
        renderer.print_info("NOTE: disabling system prompt.");
    }

    let backend = backend_for(spec.vendor, secrets, config.base_url(spec.vendor))?;
    let session = ChatSession::new(backend, spec.model.clone()).with_catalog(config.catalog.clone());
    let transcript = HistoryLog::create(&config.history_dir, OffsetDateTime::now_utc())?;
    let settings = LoopSettings::from_config(&config, &spec, &shell_from_env());

    // Ctrl-C at the prompt is handled by rustyline; anywhere else it ends the
    // process.
    ctrlc::set_handler(|| process::exit(INTERRUPTED_EXIT))
        .map_err(|err| chatsh::Error::input(format!("failed to install Ctrl-C handler: {err}")))?;

    let mut console = RustylineConsole::new()?;
    let mut conversation = ConversationLoop::new(
        session,
        Box::new(ShellExecutor::new(config.shell.clone())),
        Box::new(transcript),
        settings,
    )
    .with_initial_message(args.initial_message);
    conversation.run(&mut console, renderer).await
}

//! The chat capability: a conversation with one model through one vendor.
//!
//! - [`turn`]: immutable history entries
//! - [`session`]: [`ChatSession`], which owns the history and its rules
//! - [`backend`]: the [`ChatBackend`] seam and the vendor factory
//! - `anthropic`, `openai`, `gemini`: the vendor wire formats

mod anthropic;
mod backend;
mod gemini;
mod openai;
mod session;
mod turn;

pub use anthropic::AnthropicBackend;
pub use backend::{ChatBackend, ChatRequest, ScriptedBackend, backend_for};
pub use gemini::GeminiBackend;
pub use openai::OpenAiBackend;
pub use session::{AskOptions, Answer, ChatSession, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, Hook};
pub use turn::{Role, Turn};

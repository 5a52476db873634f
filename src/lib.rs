// Public modules
pub mod chat;
pub mod client;
pub mod config;
pub mod console;
pub mod conversation;
pub mod error;
pub mod executor;
pub mod extract;
pub mod history;
pub mod holefill;
pub mod models;
pub mod prompt;
pub mod render;
pub mod secrets;
pub mod sse;

mod observability;

// Re-exports
pub use chat::{AskOptions, Answer, ChatBackend, ChatSession, Role, Turn, backend_for};
pub use config::{ChatshArgs, ChatshConfig};
pub use console::{Console, RustylineConsole};
pub use conversation::{ConversationLoop, LoopSettings, LoopState, envelope};
pub use error::{Error, Result};
pub use executor::{ExecutionResult, Executor, ShellExecutor};
pub use extract::{CodeBlock, combine, extract_blocks, extract_codes};
pub use history::{HistoryLog, HistoryRole, Transcript};
pub use models::{ModelCatalog, ModelSpec, Vendor};
pub use observability::register_biometrics;
pub use render::{PlainTextRenderer, Renderer};
pub use secrets::SecretStore;

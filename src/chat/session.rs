//! Conversation state.
//!
//! [`ChatSession`] owns the turn history and is the only thing that appends
//! to it.  History grows only after a successful round trip, so a failed
//! request can be retried without cleanup.

use std::fmt;
use std::time::Instant;

use crate::error::{Error, Result};
use crate::models::{ModelCatalog, Vendor};
use crate::observability::{
    CHAT_INTROSPECTIONS, CHAT_REQUEST_DURATION, CHAT_REQUEST_ERRORS, CHAT_REQUESTS,
};
use crate::render::Renderer;

use super::backend::{ChatBackend, ChatRequest};
use super::turn::Turn;

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.0;

/// Default reply budget.
pub const DEFAULT_MAX_TOKENS: u32 = 8192;

/// A text transform applied to one side of a single exchange.
pub type Hook = Box<dyn Fn(&str) -> String + Send + Sync>;

/// Options for one [`ChatSession::ask`] call.
///
/// Nothing here persists between calls.  In particular `extend` applies only
/// to the message it is passed with.
pub struct AskOptions {
    /// System prompt, recorded on the first call only.
    pub system: Option<String>,
    /// Shortcode or model id overriding the session model.
    pub model: Option<String>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens in the reply.
    pub max_tokens: u32,
    /// Whether to stream the reply.
    pub stream: bool,
    /// Whether the system prompt should be marked cacheable.
    pub system_cacheable: bool,
    /// Transform applied to the outgoing message only.
    pub extend: Option<Hook>,
    /// Transform applied to the reply before it is stored.
    pub shorten: Option<Hook>,
}

impl Default for AskOptions {
    fn default() -> Self {
        Self {
            system: None,
            model: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            stream: true,
            system_cacheable: false,
            extend: None,
            shorten: None,
        }
    }
}

impl fmt::Debug for AskOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AskOptions")
            .field("system", &self.system)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("stream", &self.stream)
            .field("system_cacheable", &self.system_cacheable)
            .field("extend", &self.extend.is_some())
            .field("shorten", &self.shorten.is_some())
            .finish()
    }
}

impl AskOptions {
    /// Set the system prompt.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the model override.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the maximum tokens.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Enable or disable streaming.
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Mark the system prompt cacheable.
    pub fn with_system_cacheable(mut self, system_cacheable: bool) -> Self {
        self.system_cacheable = system_cacheable;
        self
    }

    /// Set the outgoing-message transform.
    pub fn with_extend(mut self, extend: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.extend = Some(Box::new(extend));
        self
    }

    /// Set the stored-reply transform.
    pub fn with_shorten(
        mut self,
        shorten: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        self.shorten = Some(Box::new(shorten));
        self
    }
}

/// What [`ChatSession::ask`] returns.
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    /// The full reply text.
    Reply(String),
    /// A snapshot of the history, returned when no message was given.
    History(Vec<Turn>),
}

impl Answer {
    /// The reply text, if this is a reply.
    pub fn into_reply(self) -> Result<String> {
        match self {
            Answer::Reply(reply) => Ok(reply),
            Answer::History(_) => Err(Error::malformed_reply(
                "expected a reply, got a history snapshot",
            )),
        }
    }
}

/// A conversation with one model.
pub struct ChatSession<B: ChatBackend = Box<dyn ChatBackend>> {
    backend: B,
    model: String,
    catalog: ModelCatalog,
    turns: Vec<Turn>,
}

impl<B: ChatBackend> ChatSession<B> {
    /// Creates an empty session talking to `model` through `backend`.
    pub fn new(backend: B, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
            catalog: ModelCatalog::default(),
            turns: Vec::new(),
        }
    }

    /// Use `catalog` to resolve per-call model overrides.
    pub fn with_catalog(mut self, catalog: ModelCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// The session's default model id.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The vendor behind this session.
    pub fn vendor(&self) -> Vendor {
        self.backend.vendor()
    }

    /// The conversation so far.
    pub fn history(&self) -> &[Turn] {
        &self.turns
    }

    /// The backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Sends `message` or, given `None`, returns the history without sending
    /// anything.
    ///
    /// On success the raw message and the (possibly shortened) reply are
    /// appended.  On failure nothing is appended, including the leading
    /// system turn of a first call.
    pub async fn ask(
        &mut self,
        message: Option<&str>,
        options: AskOptions,
        renderer: &mut dyn Renderer,
    ) -> Result<Answer> {
        let Some(message) = message else {
            CHAT_INTROSPECTIONS.click();
            return Ok(Answer::History(self.turns.clone()));
        };

        let leading = if self.turns.is_empty() {
            options
                .system
                .as_deref()
                .filter(|system| !system.is_empty())
                .map(Turn::system)
        } else {
            None
        };
        let outgoing = match &options.extend {
            Some(extend) => extend(message),
            None => message.to_string(),
        };
        let model = match options.model.as_deref() {
            Some(name) => self.catalog.model_id(name).to_string(),
            None => self.model.clone(),
        };

        let mut turns = Vec::with_capacity(self.turns.len() + 2);
        turns.extend(leading.iter().cloned());
        turns.extend(self.turns.iter().cloned());
        turns.push(Turn::user(outgoing));
        let request = ChatRequest {
            model,
            turns,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stream: options.stream,
            system_cacheable: options.system_cacheable,
        };

        CHAT_REQUESTS.click();
        let start = Instant::now();
        let reply = self.backend.complete(&request, renderer).await;
        CHAT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());
        let reply = match reply {
            Ok(reply) => reply,
            Err(err) => {
                CHAT_REQUEST_ERRORS.click();
                return Err(err);
            }
        };

        let stored = match &options.shorten {
            Some(shorten) => shorten(&reply),
            None => reply.clone(),
        };
        self.turns.extend(leading);
        self.turns.push(Turn::user(message));
        self.turns.push(Turn::assistant(stored));
        Ok(Answer::Reply(reply))
    }

    /// Sends `message` and returns the reply text.
    pub async fn send(
        &mut self,
        message: &str,
        options: AskOptions,
        renderer: &mut dyn Renderer,
    ) -> Result<String> {
        self.ask(Some(message), options, renderer).await?.into_reply()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::backend::ScriptedBackend;
    use crate::chat::turn::Role;
    use crate::render::RecordingRenderer;

    fn session() -> (ChatSession<ScriptedBackend>, ScriptedBackend) {
        let backend = ScriptedBackend::new(Vendor::Anthropic);
        let session = ChatSession::new(backend.clone(), "claude-3-5-sonnet-20240620");
        (session, backend)
    }

    #[tokio::test]
    async fn first_call_records_system_turn() {
        let (mut session, backend) = session();
        backend.push_reply("hello").push_reply("again");
        let mut renderer = RecordingRenderer::new();

        let reply = session
            .send("hi", AskOptions::default().with_system("be terse"), &mut renderer)
            .await
            .unwrap();
        assert_eq!(reply, "hello");
        session
            .send("more", AskOptions::default().with_system("ignored"), &mut renderer)
            .await
            .unwrap();

        let roles: Vec<Role> = session.history().iter().map(Turn::role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
        assert_eq!(session.history()[0].text(), "be terse");
        let requests = backend.requests();
        assert_eq!(requests[1].system(), Some("be terse"));
        assert_eq!(requests[1].turns.len(), 4);
    }

    #[tokio::test]
    async fn extend_applies_to_one_call_only() {
        let (mut session, backend) = session();
        backend.push_reply("one").push_reply("two");
        let mut renderer = RecordingRenderer::new();

        session
            .send(
                "first",
                AskOptions::default().with_extend(|m| format!("{m} (extended)")),
                &mut renderer,
            )
            .await
            .unwrap();
        session
            .send("second", AskOptions::default(), &mut renderer)
            .await
            .unwrap();

        let requests = backend.requests();
        assert_eq!(requests[0].turns.last().unwrap().text(), "first (extended)");
        assert_eq!(requests[1].turns.last().unwrap().text(), "second");
        // History keeps the raw message.
        assert_eq!(session.history()[0].text(), "first");
        assert_eq!(requests[1].turns[0].text(), "first");
    }

    #[tokio::test]
    async fn shorten_only_affects_stored_reply() {
        let (mut session, backend) = session();
        backend.push_reply("a very long reply");
        let mut renderer = RecordingRenderer::new();

        let reply = session
            .send(
                "hi",
                AskOptions::default().with_shorten(|r| r.split_whitespace().next().unwrap_or("").to_string()),
                &mut renderer,
            )
            .await
            .unwrap();
        assert_eq!(reply, "a very long reply");
        assert_eq!(renderer.text(), "a very long reply");
        assert_eq!(session.history()[1].text(), "a");
    }

    #[tokio::test]
    async fn failure_leaves_history_untouched() {
        let (mut session, backend) = session();
        backend
            .push_error(Error::connection("refused", None))
            .push_reply("ok");
        let mut renderer = RecordingRenderer::new();

        let err = session
            .send("hi", AskOptions::default().with_system("sys"), &mut renderer)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Connection { .. }));
        assert!(session.history().is_empty());

        // Retrying sends the same thing and records the system turn once.
        session
            .send("hi", AskOptions::default().with_system("sys"), &mut renderer)
            .await
            .unwrap();
        let requests = backend.requests();
        let texts = |request: &ChatRequest| -> Vec<String> {
            request.turns.iter().map(|t| t.text().to_string()).collect()
        };
        assert_eq!(texts(&requests[0]), texts(&requests[1]));
        assert_eq!(texts(&requests[1]), vec!["sys", "hi"]);
        assert_eq!(session.history().len(), 3);
    }

    #[tokio::test]
    async fn introspection_is_idempotent() {
        let (mut session, backend) = session();
        backend.push_reply("hello");
        let mut renderer = RecordingRenderer::new();
        session
            .send("hi", AskOptions::default(), &mut renderer)
            .await
            .unwrap();

        let first = session
            .ask(None, AskOptions::default(), &mut renderer)
            .await
            .unwrap();
        let second = session
            .ask(None, AskOptions::default(), &mut renderer)
            .await
            .unwrap();
        assert_eq!(first, second);
        let Answer::History(turns) = first else {
            panic!("expected history");
        };
        assert_eq!(turns.len(), 2);
        assert_eq!(backend.requests().len(), 1);
        assert!(second.into_reply().is_err());
    }

    #[tokio::test]
    async fn model_override_resolves_shortcodes() {
        let (mut session, backend) = session();
        backend.push_reply("x").push_reply("y").push_reply("z");
        let mut renderer = RecordingRenderer::new();
        session
            .send("a", AskOptions::default().with_model("C"), &mut renderer)
            .await
            .unwrap();
        session
            .send("b", AskOptions::default().with_model("claude-3-opus"), &mut renderer)
            .await
            .unwrap();
        session
            .send("c", AskOptions::default(), &mut renderer)
            .await
            .unwrap();
        let models: Vec<String> = backend.requests().into_iter().map(|r| r.model).collect();
        assert_eq!(
            models,
            vec![
                "claude-3-5-sonnet-latest",
                "claude-3-opus",
                "claude-3-5-sonnet-20240620"
            ]
        );
    }

    #[tokio::test]
    async fn options_reach_the_backend() {
        let (mut session, backend) = session();
        backend.push_reply("x");
        let mut renderer = RecordingRenderer::new();
        session
            .send(
                "a",
                AskOptions::default()
                    .with_temperature(0.7)
                    .with_max_tokens(100)
                    .with_stream(false)
                    .with_system_cacheable(true),
                &mut renderer,
            )
            .await
            .unwrap();
        let request = &backend.requests()[0];
        assert_eq!(request.temperature, 0.7);
        assert_eq!(request.max_tokens, 100);
        assert!(!request.stream);
        assert!(request.system_cacheable);
    }
}

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::client::{HttpClient, parse_base_url};
use crate::error::{Error, Result};
use crate::models::Vendor;
use crate::render::Renderer;
use crate::secrets::SecretStore;

use super::anthropic::AnthropicBackend;
use super::gemini::GeminiBackend;
use super::openai::OpenAiBackend;
use super::turn::{Role, Turn};

/// Everything a backend needs for one completion.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    /// Resolved model id.
    pub model: String,
    /// The outgoing conversation, leading system turn included.
    pub turns: Vec<Turn>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens in the reply.
    pub max_tokens: u32,
    /// Whether to stream the reply.
    pub stream: bool,
    /// Whether the system prompt should be marked cacheable.
    pub system_cacheable: bool,
}

impl ChatRequest {
    /// The system prompt, if the conversation carries one.
    pub fn system(&self) -> Option<&str> {
        self.turns
            .iter()
            .find(|turn| turn.role() == Role::System)
            .map(Turn::text)
    }

    /// The user and assistant turns, in order.
    pub fn dialogue(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter().filter(|turn| turn.role() != Role::System)
    }
}

/// A vendor the assistant can talk to.
///
/// Implementations print the reply through the renderer as it arrives and
/// return the full text once it is complete.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// The vendor this backend speaks to.
    fn vendor(&self) -> Vendor;

    /// Sends the request and returns the complete reply text.
    async fn complete(&self, request: &ChatRequest, renderer: &mut dyn Renderer)
    -> Result<String>;
}

#[async_trait]
impl ChatBackend for Box<dyn ChatBackend> {
    fn vendor(&self) -> Vendor {
        self.as_ref().vendor()
    }

    async fn complete(
        &self,
        request: &ChatRequest,
        renderer: &mut dyn Renderer,
    ) -> Result<String> {
        self.as_ref().complete(request, renderer).await
    }
}

/// Builds the backend for `vendor`.
///
/// `base_url` overrides the vendor's default endpoint.  Secrets are read from
/// `secrets` on every call, so a token file can be fixed without a restart.
pub fn backend_for(
    vendor: Vendor,
    secrets: SecretStore,
    base_url: Option<&str>,
) -> Result<Box<dyn ChatBackend>> {
    let base_url = parse_base_url(base_url.unwrap_or_else(|| vendor.default_base_url()))?;
    let http = HttpClient::new()?;
    Ok(match vendor {
        Vendor::Anthropic => Box::new(AnthropicBackend::new(http, secrets, base_url)),
        Vendor::OpenAi | Vendor::DeepSeek | Vendor::OpenRouter => {
            Box::new(OpenAiBackend::new(vendor, http, secrets, base_url))
        }
        Vendor::Gemini => Box::new(GeminiBackend::new(http, secrets, base_url)),
    })
}

/// Backend that replays canned replies.
///
/// Clones share state, so tests can script replies and inspect the requests
/// that were made after handing a clone to a session.
#[derive(Debug, Clone)]
pub struct ScriptedBackend {
    vendor: Vendor,
    replies: Arc<Mutex<VecDeque<Result<String>>>>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl ScriptedBackend {
    /// Creates a backend with no replies queued.
    pub fn new(vendor: Vendor) -> Self {
        Self {
            vendor,
            replies: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queues a successful reply.
    pub fn push_reply(&self, reply: impl Into<String>) -> &Self {
        lock(&self.replies).push_back(Ok(reply.into()));
        self
    }

    /// Queues a failure.
    pub fn push_error(&self, error: Error) -> &Self {
        lock(&self.replies).push_back(Err(error));
        self
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<ChatRequest> {
        lock(&self.requests).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    fn vendor(&self) -> Vendor {
        self.vendor
    }

    async fn complete(
        &self,
        request: &ChatRequest,
        renderer: &mut dyn Renderer,
    ) -> Result<String> {
        lock(&self.requests).push(request.clone());
        let reply = lock(&self.replies)
            .pop_front()
            .unwrap_or_else(|| Err(Error::connection("no scripted reply left", None)))?;
        renderer.print_text(&reply);
        Ok(reply)
    }
}

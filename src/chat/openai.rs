//! Backend for OpenAI-compatible chat completion APIs.
//!
//! OpenAI, DeepSeek and OpenRouter share the `/chat/completions` wire format
//! and differ only in base URL and token file.  The `o1` reasoning models do
//! not stream, take a fixed temperature, and reject the `system` role.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::client::{ErrorDetail, HttpClient, endpoint, json_headers, read_json};
use crate::error::{Error, Result};
use crate::models::{Vendor, is_reasoning_model};
use crate::render::Renderer;
use crate::secrets::SecretStore;
use crate::sse::process_sse;

use super::backend::{ChatBackend, ChatRequest};
use super::turn::Role;

/// Sentinel data payload ending a stream.
const DONE: &str = "[DONE]";

/// Backend for OpenAI, DeepSeek and OpenRouter.
#[derive(Debug, Clone)]
pub struct OpenAiBackend {
    vendor: Vendor,
    http: HttpClient,
    secrets: SecretStore,
    base_url: Url,
}

impl OpenAiBackend {
    /// Creates a backend posting to `{base_url}chat/completions`.
    pub fn new(vendor: Vendor, http: HttpClient, secrets: SecretStore, base_url: Url) -> Self {
        Self {
            vendor,
            http,
            secrets,
            base_url,
        }
    }

    fn headers(token: &str) -> Result<HeaderMap> {
        let mut headers = json_headers();
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| Error::authentication("API token contains characters not valid in a header"))?;
        value.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, value);
        Ok(headers)
    }
}

#[derive(Debug, Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<&'static str>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Whether a request for `model` will actually stream.
fn streams(request: &ChatRequest) -> bool {
    request.stream && !is_reasoning_model(&request.model)
}

fn body(request: &ChatRequest) -> CompletionBody<'_> {
    let reasoning = is_reasoning_model(&request.model);
    let messages = request
        .turns
        .iter()
        .map(|turn| ChatMessage {
            role: match turn.role() {
                Role::System if reasoning => "user",
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            },
            content: turn.text(),
        })
        .collect();
    CompletionBody {
        model: &request.model,
        messages,
        temperature: if reasoning { 1.0 } else { request.temperature },
        max_tokens: (!reasoning).then_some(request.max_tokens),
        max_completion_tokens: reasoning.then_some(request.max_tokens),
        reasoning_effort: reasoning.then_some("high"),
        stream: streams(request),
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    delta: ChunkDelta,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

impl CompletionChunk {
    fn into_text(self) -> Result<Option<String>> {
        if let Some(error) = self.error {
            return Err(Error::api(
                500,
                error.error_type,
                error.message.unwrap_or_else(|| "stream error".to_string()),
            ));
        }
        Ok(self
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content))
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    fn vendor(&self) -> Vendor {
        self.vendor
    }

    async fn complete(
        &self,
        request: &ChatRequest,
        renderer: &mut dyn Renderer,
    ) -> Result<String> {
        let token = self.secrets.token(self.vendor)?;
        let url = endpoint(&self.base_url, "chat/completions")?;
        let response = self
            .http
            .post_json(url, Self::headers(&token)?, &body(request))
            .await?;

        if !streams(request) {
            let response = read_json::<CompletionResponse>(response).await?;
            let text = response
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .ok_or_else(|| Error::malformed_reply("response contained no choices"))?;
            renderer.print_text(&text);
            return Ok(text);
        }

        let mut events = Box::pin(process_sse(response.bytes_stream()));
        let mut result = String::new();
        while let Some(event) = events.next().await {
            let event = event?;
            if event.data.trim() == DONE {
                break;
            }
            let chunk: CompletionChunk = serde_json::from_str(&event.data)?;
            if let Some(text) = chunk.into_text()? {
                renderer.print_text(&text);
                result.push_str(&text);
            }
        }
        Ok(result)
    }
}

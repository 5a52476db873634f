//! Anthropic Messages API backend.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::client::{HttpClient, endpoint, json_headers, read_json, secret_header};
use crate::error::{Error, Result};
use crate::models::Vendor;
use crate::render::Renderer;
use crate::secrets::SecretStore;
use crate::sse::process_sse;

use super::backend::{ChatBackend, ChatRequest};
use super::turn::Role;

/// The API version header value.
const ANTHROPIC_API_VERSION: &str = "2023-06-01";

/// Beta flag enabling prompt caching.
const PROMPT_CACHING_BETA: &str = "prompt-caching-2024-07-31";

/// Backend for Claude models.
#[derive(Debug, Clone)]
pub struct AnthropicBackend {
    http: HttpClient,
    secrets: SecretStore,
    base_url: Url,
}

impl AnthropicBackend {
    /// Creates a backend posting to `{base_url}messages`.
    pub fn new(http: HttpClient, secrets: SecretStore, base_url: Url) -> Self {
        Self {
            http,
            secrets,
            base_url,
        }
    }

    fn headers(token: &str) -> Result<HeaderMap> {
        let mut headers = json_headers();
        headers.insert("x-api-key", secret_header(token)?);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_API_VERSION),
        );
        headers.insert(
            "anthropic-beta",
            HeaderValue::from_static(PROMPT_CACHING_BETA),
        );
        Ok(headers)
    }
}

#[derive(Debug, Serialize)]
struct MessagesBody<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<SystemPrompt<'a>>,
    messages: Vec<MessageParam<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum SystemPrompt<'a> {
    Text(&'a str),
    Blocks(Vec<SystemBlock<'a>>),
}

#[derive(Debug, Serialize)]
struct SystemBlock<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
    cache_control: CacheControl,
}

#[derive(Debug, Serialize)]
struct CacheControl {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct MessageParam<'a> {
    role: &'static str,
    content: &'a str,
}

fn body(request: &ChatRequest) -> MessagesBody<'_> {
    let system = request.system().map(|text| {
        if request.system_cacheable {
            SystemPrompt::Blocks(vec![SystemBlock {
                kind: "text",
                text,
                cache_control: CacheControl { kind: "ephemeral" },
            }])
        } else {
            SystemPrompt::Text(text)
        }
    });
    let messages = request
        .dialogue()
        .map(|turn| MessageParam {
            role: match turn.role() {
                Role::Assistant => "assistant",
                _ => "user",
            },
            content: turn.text(),
        })
        .collect();
    MessagesBody {
        model: &request.model,
        max_tokens: request.max_tokens,
        temperature: request.temperature,
        system,
        messages,
        stream: request.stream,
    }
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

impl MessageResponse {
    fn text(self) -> String {
        self.content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    ContentBlockDelta {
        delta: Delta,
    },
    Error {
        error: StreamError,
    },
    MessageStop,
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Delta {
    TextDelta {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    #[serde(rename = "type")]
    error_type: Option<String>,
    message: Option<String>,
}

impl From<StreamError> for Error {
    fn from(err: StreamError) -> Self {
        let message = err.message.unwrap_or_else(|| "stream error".to_string());
        match err.error_type.as_deref() {
            Some("overloaded_error") => Error::service_unavailable(message, None),
            Some("rate_limit_error") => Error::rate_limit(message, None),
            error_type => Error::api(500, error_type.map(str::to_string), message),
        }
    }
}

#[async_trait]
impl ChatBackend for AnthropicBackend {
    fn vendor(&self) -> Vendor {
        Vendor::Anthropic
    }

    async fn complete(
        &self,
        request: &ChatRequest,
        renderer: &mut dyn Renderer,
    ) -> Result<String> {
        let token = self.secrets.token(Vendor::Anthropic)?;
        let url = endpoint(&self.base_url, "messages")?;
        let response = self
            .http
            .post_json(url, Self::headers(&token)?, &body(request))
            .await?;

        if !request.stream {
            let text = read_json::<MessageResponse>(response).await?.text();
            renderer.print_text(&text);
            return Ok(text);
        }

        let mut events = Box::pin(process_sse(response.bytes_stream()));
        let mut result = String::new();
        while let Some(event) = events.next().await {
            let event = event?;
            match serde_json::from_str::<StreamEvent>(&event.data)? {
                StreamEvent::ContentBlockDelta {
                    delta: Delta::TextDelta { text },
                } => {
                    renderer.print_text(&text);
                    result.push_str(&text);
                }
                StreamEvent::Error { error } => return Err(error.into()),
                StreamEvent::MessageStop => break,
                _ => {}
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::turn::Turn;
    use serde_json::json;

    fn request(system_cacheable: bool, stream: bool) -> ChatRequest {
        ChatRequest {
            model: "claude-3-5-sonnet-20240620".to_string(),
            turns: vec![
                Turn::system("You are ChatSH."),
                Turn::user("list files"),
                Turn::assistant("```sh\nls\n```"),
                Turn::user("thanks"),
            ],
            temperature: 0.0,
            max_tokens: 8192,
            stream,
            system_cacheable,
        }
    }

    #[test]
    fn body_carries_system_separately() {
        let value = serde_json::to_value(body(&request(false, true))).unwrap();
        assert_eq!(
            value,
            json!({
                "model": "claude-3-5-sonnet-20240620",
                "max_tokens": 8192,
                "temperature": 0.0,
                "system": "You are ChatSH.",
                "messages": [
                    {"role": "user", "content": "list files"},
                    {"role": "assistant", "content": "```sh\nls\n```"},
                    {"role": "user", "content": "thanks"},
                ],
                "stream": true,
            })
        );
    }

    #[test]
    fn cacheable_system_uses_ephemeral_block() {
        let value = serde_json::to_value(body(&request(true, false))).unwrap();
        assert_eq!(
            value["system"],
            json!([{
                "type": "text",
                "text": "You are ChatSH.",
                "cache_control": {"type": "ephemeral"},
            }])
        );
        assert_eq!(value["stream"], json!(false));
    }

    #[test]
    fn no_system_field_without_system_turn() {
        let mut req = request(false, true);
        req.turns.remove(0);
        let value = serde_json::to_value(body(&req)).unwrap();
        assert!(value.get("system").is_none());
    }

    #[test]
    fn response_text_skips_non_text_blocks() {
        let response: MessageResponse = serde_json::from_str(
            r#"{"id":"msg_1","type":"message","role":"assistant","content":[
                {"type":"text","text":"Hello"},
                {"type":"tool_use","id":"t","name":"x","input":{}},
                {"type":"text","text":", world"}
            ],"stop_reason":"end_turn"}"#,
        )
        .unwrap();
        assert_eq!(response.text(), "Hello, world");
    }

    #[test]
    fn stream_events_parse() {
        let event: StreamEvent = serde_json::from_str(
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#,
        )
        .unwrap();
        assert!(matches!(
            event,
            StreamEvent::ContentBlockDelta { delta: Delta::TextDelta { ref text } } if text == "Hi"
        ));

        let event: StreamEvent =
            serde_json::from_str(r#"{"type":"message_start","message":{"id":"m"}}"#).unwrap();
        assert!(matches!(event, StreamEvent::Other));

        let event: StreamEvent = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(event, StreamEvent::Other));
    }

    #[test]
    fn stream_error_maps_overloaded() {
        let event: StreamEvent = serde_json::from_str(
            r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
        )
        .unwrap();
        let StreamEvent::Error { error } = event else {
            panic!("expected error event");
        };
        let err: Error = error.into();
        assert!(matches!(err, Error::ServiceUnavailable { .. }));
        assert_eq!(err.to_string(), "Service unavailable: Overloaded");
    }
}

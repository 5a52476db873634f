//! Google Gemini `generateContent` backend.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::client::{ErrorDetail, HttpClient, endpoint, json_headers, read_json, secret_header};
use crate::error::{Error, Result};
use crate::models::Vendor;
use crate::render::Renderer;
use crate::secrets::SecretStore;
use crate::sse::process_sse;

use super::backend::{ChatBackend, ChatRequest};
use super::turn::Role;

/// Every harm category is set to this threshold.
const SAFETY_THRESHOLD: &str = "BLOCK_NONE";

const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

/// Backend for Gemini models.
#[derive(Debug, Clone)]
pub struct GeminiBackend {
    http: HttpClient,
    secrets: SecretStore,
    base_url: Url,
}

impl GeminiBackend {
    /// Creates a backend posting to `{base_url}models/{model}:generateContent`.
    pub fn new(http: HttpClient, secrets: SecretStore, base_url: Url) -> Self {
        Self {
            http,
            secrets,
            base_url,
        }
    }

    fn headers(token: &str) -> Result<HeaderMap> {
        let mut headers = json_headers();
        headers.insert("x-goog-api-key", secret_header(token)?);
        Ok(headers)
    }

    fn url(&self, request: &ChatRequest) -> Result<Url> {
        let path = if request.stream {
            format!("models/{}:streamGenerateContent?alt=sse", request.model)
        } else {
            format!("models/{}:generateContent", request.model)
        };
        endpoint(&self.base_url, &path)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateBody<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    generation_config: GenerationConfig,
    safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

fn body(request: &ChatRequest) -> GenerateBody<'_> {
    let contents = request
        .dialogue()
        .map(|turn| Content {
            role: Some(match turn.role() {
                Role::Assistant => "model",
                _ => "user",
            }),
            parts: vec![Part { text: turn.text() }],
        })
        .collect();
    let system_instruction = request.system().map(|text| Content {
        role: None,
        parts: vec![Part { text }],
    });
    GenerateBody {
        contents,
        system_instruction,
        generation_config: GenerationConfig {
            max_output_tokens: request.max_tokens,
            temperature: request.temperature,
        },
        safety_settings: HARM_CATEGORIES
            .into_iter()
            .map(|category| SafetySetting {
                category,
                threshold: SAFETY_THRESHOLD,
            })
            .collect(),
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Text of the first candidate; empty when the candidate was blocked.
    fn text(self) -> Result<String> {
        if let Some(error) = self.error {
            return Err(Error::api(
                500,
                error.error_type.or(error.status),
                error.message.unwrap_or_else(|| "stream error".to_string()),
            ));
        }
        Ok(self
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl ChatBackend for GeminiBackend {
    fn vendor(&self) -> Vendor {
        Vendor::Gemini
    }

    async fn complete(
        &self,
        request: &ChatRequest,
        renderer: &mut dyn Renderer,
    ) -> Result<String> {
        let token = self.secrets.token(Vendor::Gemini)?;
        let url = self.url(request)?;
        let response = self
            .http
            .post_json(url, Self::headers(&token)?, &body(request))
            .await?;

        if !request.stream {
            let text = read_json::<GenerateResponse>(response).await?.text()?;
            renderer.print_text(&text);
            return Ok(text);
        }

        let mut events = Box::pin(process_sse(response.bytes_stream()));
        let mut result = String::new();
        while let Some(event) = events.next().await {
            let event = event?;
            let text = serde_json::from_str::<GenerateResponse>(&event.data)?.text()?;
            if !text.is_empty() {
                renderer.print_text(&text);
                result.push_str(&text);
            }
        }
        Ok(result)
    }
}

//! Shared HTTP plumbing for the vendor backends.
//!
//! Every vendor speaks JSON over HTTPS and reports failures with a body shaped
//! roughly like `{"error": {"type": ..., "message": ...}}`.  This module sends
//! requests and maps failed responses onto [`Error`].

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use crate::error::{Error, Result};

/// HTTP client shared by all backends.
///
/// No request timeout is configured: a hung vendor call blocks the
/// conversation until the user interrupts it.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: ReqwestClient,
}

impl HttpClient {
    /// Creates a new client.
    pub fn new() -> Result<Self> {
        let client = ReqwestClient::builder().build().map_err(|e| {
            Error::http_client(
                format!("Failed to build HTTP client: {e}"),
                Some(Box::new(e)),
            )
        })?;
        Ok(Self { client })
    }

    /// POSTs `body` as JSON and returns the response if its status is a
    /// success.
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: Url,
        headers: HeaderMap,
        body: &T,
    ) -> Result<Response> {
        let response = self
            .client
            .post(url)
            .headers(headers)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::timeout(format!("Request timed out: {e}"))
                } else if e.is_connect() {
                    Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
                } else {
                    Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
                }
            })?;

        if !response.status().is_success() {
            return Err(process_error_response(response).await);
        }
        Ok(response)
    }
}

/// Decodes a successful response body.
pub async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    response.json::<T>().await.map_err(|e| {
        Error::serialization(
            format!("Failed to parse response: {e}"),
            Some(Box::new(e)),
        )
    })
}

/// Headers common to every JSON request.
pub fn json_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
    headers
}

/// Converts a secret into a header value without echoing it in errors.
pub fn secret_header(token: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(token)
        .map_err(|_| Error::authentication("API token contains characters not valid in a header"))?;
    value.set_sensitive(true);
    Ok(value)
}

/// Joins `path` onto a vendor base URL.
pub fn endpoint(base_url: &Url, path: &str) -> Result<Url> {
    Ok(base_url.join(path)?)
}

/// Parses a base URL, making sure it ends in `/` so joins append.
pub fn parse_base_url(base_url: &str) -> Result<Url> {
    if base_url.ends_with('/') {
        Ok(Url::parse(base_url)?)
    } else {
        Ok(Url::parse(&format!("{base_url}/"))?)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorDetail {
    #[serde(rename = "type")]
    pub(crate) error_type: Option<String>,
    pub(crate) message: Option<String>,
    pub(crate) param: Option<String>,
    pub(crate) status: Option<String>,
}

async fn process_error_response(response: Response) -> Error {
    let status_code = response.status().as_u16();
    let retry_after = response
        .headers()
        .get("retry-after")
        .and_then(|val| val.to_str().ok())
        .and_then(|val| val.parse::<u64>().ok());

    let error_body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            return Error::http_client(
                format!("Failed to read error response: {e}"),
                Some(Box::new(e)),
            );
        }
    };
    error_from_status(status_code, &error_body, retry_after)
}

/// Maps a failed HTTP status and its body onto an [`Error`], keeping the
/// vendor's message.
pub(crate) fn error_from_status(status_code: u16, body: &str, retry_after: Option<u64>) -> Error {
    // Gemini sometimes wraps the error object in an array.  A derived struct
    // also accepts a sequence, so the array form must be tried first.
    let detail = if body.trim_start().starts_with('[') {
        serde_json::from_str::<Vec<ErrorResponse>>(body)
            .ok()
            .and_then(|errors| errors.into_iter().next())
            .and_then(|e| e.error)
    } else {
        serde_json::from_str::<ErrorResponse>(body)
            .ok()
            .and_then(|e| e.error)
    };
    let error_type = detail
        .as_ref()
        .and_then(|d| d.error_type.clone().or_else(|| d.status.clone()));
    let message = detail
        .as_ref()
        .and_then(|d| d.message.clone())
        .unwrap_or_else(|| body.to_string());
    let param = detail.as_ref().and_then(|d| d.param.clone());

    match status_code {
        400 => Error::bad_request(message, param),
        401 => Error::authentication(message),
        403 => Error::permission(message),
        404 => Error::not_found(message),
        408 => Error::timeout(message),
        429 => Error::rate_limit(message, retry_after),
        500 => Error::internal_server(message),
        502..=504 => Error::service_unavailable(message, retry_after),
        _ => Error::api(status_code, error_type, message),
    }
}

//! Error types for chatsh.
//!
//! Every fallible operation in the crate returns [`Result`].  Errors fall into
//! three groups: fatal initialization errors (credentials, configuration,
//! unsupported models), per-turn transport errors reported by a chat vendor,
//! and local failures (I/O, serialization, terminal input).  Only the first
//! group ends the process; see [`Error::is_fatal`].

use std::error;
use std::fmt;
use std::io;
use std::str::Utf8Error;
use std::sync::Arc;

type Cause = Arc<dyn error::Error + Send + Sync>;

/// The main error type for chatsh.
#[derive(Clone, Debug)]
pub enum Error {
    /// A vendor status with no dedicated variant.
    Api {
        status_code: u16,
        /// The vendor's error type or status string.
        error_type: Option<String>,
        message: String,
    },
    /// 401 from the vendor.
    Authentication { message: String },
    /// 403 from the vendor.
    Permission { message: String },
    /// 404 from the vendor (usually an unknown model) or a missing local file.
    NotFound { message: String },
    /// 429 from the vendor.
    RateLimit {
        message: String,
        /// Seconds from the `retry-after` header.
        retry_after: Option<u64>,
    },
    /// 400 from the vendor.
    BadRequest {
        message: String,
        /// The request field the vendor rejected.
        param: Option<String>,
    },
    /// 408 from the vendor, or the transport gave up.
    Timeout { message: String },
    /// The vendor could not be reached.
    Connection { message: String, source: Option<Cause> },
    /// 500 from the vendor.
    InternalServer { message: String },
    /// 502-504 from the vendor, or an overloaded stream.
    ServiceUnavailable {
        message: String,
        retry_after: Option<u64>,
    },
    /// JSON or YAML could not be produced or parsed.
    Serialization { message: String, source: Option<Cause> },
    Io { message: String, source: Arc<io::Error> },
    HttpClient { message: String, source: Option<Cause> },
    Url {
        message: String,
        source: Option<url::ParseError>,
    },
    /// The response stream broke off or carried an error event.
    Streaming { message: String, source: Option<Cause> },
    Encoding { message: String, source: Option<Cause> },
    /// The token file for `vendor` could not be read.
    Credentials {
        vendor: String,
        message: String,
        source: Option<Arc<io::Error>>,
    },
    /// The configuration file is malformed.
    Configuration { message: String },
    /// No vendor serves `model`.
    UnsupportedModel { model: String },
    /// A model reply lacked the payload the caller needs.
    MalformedReply { message: String },
    /// The terminal could not be read.
    Input { message: String },
}

impl Error {
    pub fn api(status_code: u16, error_type: Option<String>, message: impl Into<String>) -> Self {
        Error::Api {
            status_code,
            error_type,
            message: message.into(),
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Error::Authentication {
            message: message.into(),
        }
    }

    pub fn permission(message: impl Into<String>) -> Self {
        Error::Permission {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Error::NotFound {
            message: message.into(),
        }
    }

    pub fn rate_limit(message: impl Into<String>, retry_after: Option<u64>) -> Self {
        Error::RateLimit {
            message: message.into(),
            retry_after,
        }
    }

    pub fn bad_request(message: impl Into<String>, param: Option<String>) -> Self {
        Error::BadRequest {
            message: message.into(),
            param,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Error::Timeout {
            message: message.into(),
        }
    }

    pub fn connection(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Connection {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    pub fn internal_server(message: impl Into<String>) -> Self {
        Error::InternalServer {
            message: message.into(),
        }
    }

    pub fn service_unavailable(message: impl Into<String>, retry_after: Option<u64>) -> Self {
        Error::ServiceUnavailable {
            message: message.into(),
            retry_after,
        }
    }

    pub fn serialization(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Serialization {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            message: message.into(),
            source: Arc::new(source),
        }
    }

    pub fn http_client(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::HttpClient {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    pub fn url(message: impl Into<String>, source: Option<url::ParseError>) -> Self {
        Error::Url {
            message: message.into(),
            source,
        }
    }

    pub fn streaming(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Streaming {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    pub fn encoding(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Encoding {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// The message is printed after `Error reading {vendor}.token file:`.
    pub fn credentials(
        vendor: impl Into<String>,
        message: impl Into<String>,
        source: Option<io::Error>,
    ) -> Self {
        Error::Credentials {
            vendor: vendor.into(),
            message: message.into(),
            source: source.map(Arc::new),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    pub fn unsupported_model(model: impl Into<String>) -> Self {
        Error::UnsupportedModel {
            model: model.into(),
        }
    }

    pub fn malformed_reply(message: impl Into<String>) -> Self {
        Error::MalformedReply {
            message: message.into(),
        }
    }

    pub fn input(message: impl Into<String>) -> Self {
        Error::Input {
            message: message.into(),
        }
    }

    /// Returns true if this error must terminate the process.
    ///
    /// There is no degraded mode without credentials, a usable configuration,
    /// or a vendor to talk to.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Credentials { .. } | Error::Configuration { .. } | Error::UnsupportedModel { .. }
        )
    }
}

fn with_retry_hint(f: &mut fmt::Formatter<'_>, retry_after: Option<u64>) -> fmt::Result {
    match retry_after {
        Some(seconds) => write!(f, " (retry after {seconds} seconds)"),
        None => Ok(()),
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Api {
                status_code,
                error_type,
                message,
            } => {
                let label = error_type.as_deref().unwrap_or("API error");
                write!(f, "{label}: {message} (HTTP {status_code})")
            }
            Error::Authentication { message } => write!(f, "Authentication error: {message}"),
            Error::Permission { message } => write!(f, "Permission error: {message}"),
            Error::NotFound { message } => write!(f, "Resource not found: {message}"),
            Error::RateLimit {
                message,
                retry_after,
            } => {
                write!(f, "Rate limit exceeded: {message}")?;
                with_retry_hint(f, *retry_after)
            }
            Error::BadRequest { message, param } => {
                write!(f, "Bad request: {message}")?;
                match param {
                    Some(param) => write!(f, " (parameter: {param})"),
                    None => Ok(()),
                }
            }
            Error::Timeout { message } => write!(f, "Timeout error: {message}"),
            Error::Connection { message, .. } => write!(f, "Connection error: {message}"),
            Error::InternalServer { message } => write!(f, "Internal server error: {message}"),
            Error::ServiceUnavailable {
                message,
                retry_after,
            } => {
                write!(f, "Service unavailable: {message}")?;
                with_retry_hint(f, *retry_after)
            }
            Error::Serialization { message, .. } => write!(f, "Serialization error: {message}"),
            Error::Io { message, .. } => write!(f, "I/O error: {message}"),
            Error::HttpClient { message, .. } => write!(f, "HTTP client error: {message}"),
            Error::Url { message, .. } => write!(f, "URL error: {message}"),
            Error::Streaming { message, .. } => write!(f, "Streaming error: {message}"),
            Error::Encoding { message, .. } => write!(f, "Encoding error: {message}"),
            Error::Credentials {
                vendor, message, ..
            } => write!(f, "Error reading {vendor}.token file: {message}"),
            Error::Configuration { message } => write!(f, "Configuration error: {message}"),
            Error::UnsupportedModel { model } => write!(f, "Unsupported model: {model}"),
            Error::MalformedReply { message } => write!(f, "Malformed reply: {message}"),
            Error::Input { message } => write!(f, "Input error: {message}"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Connection { source, .. }
            | Error::Serialization { source, .. }
            | Error::HttpClient { source, .. }
            | Error::Streaming { source, .. }
            | Error::Encoding { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Io { source, .. } => Some(source.as_ref()),
            Error::Credentials { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Url { source, .. } => source.as_ref().map(|e| e as &(dyn error::Error + 'static)),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::io(err.to_string(), err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::serialization(format!("JSON error: {err}"), Some(Box::new(err)))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::serialization(format!("YAML error: {err}"), Some(Box::new(err)))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::url(format!("URL parse error: {err}"), Some(err))
    }
}

impl From<Utf8Error> for Error {
    fn from(err: Utf8Error) -> Self {
        Error::encoding(format!("UTF-8 error: {err}"), Some(Box::new(err)))
    }
}

/// A specialized Result type for chatsh operations.
pub type Result<T> = std::result::Result<T, Error>;

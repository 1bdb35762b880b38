//! Error types for parley.
//!
//! Errors fall into two families that the chat session treats differently:
//! transport failures raised by the completion client (the exchange is
//! abandoned) and persistence failures raised by the record store (the
//! exchange stands but was not saved). Validation errors reject an operation
//! before either is reached.

use std::error;
use std::fmt;
use std::str::Utf8Error;
use std::sync::Arc;

type Source = Option<Arc<dyn error::Error + Send + Sync>>;

/// The main error type for parley.
#[derive(Clone, Debug)]
pub enum Error {
    /// The API answered with an error status not covered below, or reported
    /// an error inside the event stream.
    Api {
        /// HTTP status code.
        status_code: u16,
        /// Error type string from the API.
        error_type: Option<String>,
        /// Human-readable error message.
        message: String,
    },

    /// The API rejected the credential (401) or its permissions (403).
    Authentication {
        /// HTTP status code.
        status_code: u16,
        /// Human-readable error message.
        message: String,
    },

    /// The API rejected the request body (400).
    BadRequest {
        /// Human-readable error message.
        message: String,
        /// Parameter that caused the error.
        param: Option<String>,
    },

    /// Too many requests (429).
    RateLimit {
        /// Human-readable error message.
        message: String,
        /// Time the server asked us to wait, in seconds.
        retry_after: Option<u64>,
    },

    /// The service failed or is overloaded (5xx).
    Unavailable {
        /// HTTP status code.
        status_code: u16,
        /// Human-readable error message.
        message: String,
    },

    /// The request did not finish in time.
    Timeout {
        /// Human-readable error message.
        message: String,
        /// The timeout that expired, in seconds.
        duration: Option<f64>,
    },

    /// The server could not be reached.
    Connection {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Source,
    },

    /// Any other failure of the HTTP client.
    HttpClient {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Source,
    },

    /// The response broke off or could not be decoded.
    Streaming {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Source,
    },

    /// JSON could not be produced or parsed outside the client and store.
    Serialization {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Source,
    },

    /// A configured URL is malformed.
    Url {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Option<url::ParseError>,
    },

    /// A request or state transition was rejected before reaching the API.
    Validation {
        /// Human-readable error message.
        message: String,
        /// Parameter that failed validation.
        param: Option<String>,
    },

    /// A stored conversation does not exist for this user.
    NotFound {
        /// Human-readable error message.
        message: String,
        /// Identifier that was looked up.
        id: Option<i64>,
    },

    /// The record store failed to read or write.
    Database {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Source,
    },
}

fn boxed(source: Option<Box<dyn error::Error + Send + Sync>>) -> Source {
    source.map(Arc::from)
}

impl Error {
    /// Creates a new API error.
    pub fn api(status_code: u16, error_type: Option<String>, message: impl Into<String>) -> Self {
        Error::Api {
            status_code,
            error_type,
            message: message.into(),
        }
    }

    /// Creates a new authentication error for a 401 response or a missing key.
    pub fn authentication(message: impl Into<String>) -> Self {
        Error::Authentication {
            status_code: 401,
            message: message.into(),
        }
    }

    /// Creates a new authentication error for a 403 response.
    pub fn permission(message: impl Into<String>) -> Self {
        Error::Authentication {
            status_code: 403,
            message: message.into(),
        }
    }

    /// Creates a new bad request error.
    pub fn bad_request(message: impl Into<String>, param: Option<String>) -> Self {
        Error::BadRequest {
            message: message.into(),
            param,
        }
    }

    /// Creates a new rate limit error.
    pub fn rate_limit(message: impl Into<String>, retry_after: Option<u64>) -> Self {
        Error::RateLimit {
            message: message.into(),
            retry_after,
        }
    }

    /// Creates a new error for a 5xx response.
    pub fn unavailable(status_code: u16, message: impl Into<String>) -> Self {
        Error::Unavailable {
            status_code,
            message: message.into(),
        }
    }

    /// Creates a new timeout error.
    pub fn timeout(message: impl Into<String>, duration: Option<f64>) -> Self {
        Error::Timeout {
            message: message.into(),
            duration,
        }
    }

    /// Creates a new connection error.
    pub fn connection(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Connection {
            message: message.into(),
            source: boxed(source),
        }
    }

    /// Creates a new HTTP client error.
    pub fn http_client(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::HttpClient {
            message: message.into(),
            source: boxed(source),
        }
    }

    /// Creates a new streaming error.
    pub fn streaming(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Streaming {
            message: message.into(),
            source: boxed(source),
        }
    }

    /// Creates a new serialization error.
    pub fn serialization(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Serialization {
            message: message.into(),
            source: boxed(source),
        }
    }

    /// Creates a new URL error.
    pub fn url(message: impl Into<String>, source: Option<url::ParseError>) -> Self {
        Error::Url {
            message: message.into(),
            source,
        }
    }

    /// Creates a new validation error.
    pub fn validation(message: impl Into<String>, param: Option<String>) -> Self {
        Error::Validation {
            message: message.into(),
            param,
        }
    }

    /// Creates a new not found error.
    pub fn not_found(message: impl Into<String>, id: Option<i64>) -> Self {
        Error::NotFound {
            message: message.into(),
            id,
        }
    }

    /// Creates a new database error.
    pub fn database(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Database {
            message: message.into(),
            source: boxed(source),
        }
    }

    /// Returns true if the API refused the credential.
    pub fn is_authentication(&self) -> bool {
        matches!(self, Error::Authentication { .. })
    }

    /// Returns true if a stored conversation was missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Returns true if the API asked us to slow down.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Error::RateLimit { .. })
    }

    /// Returns true if the request timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Returns true if an operation was rejected up front.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }

    /// Returns true if this error came from the record store.
    pub fn is_persistence(&self) -> bool {
        matches!(self, Error::Database { .. })
    }

    /// Returns true if this error came from talking to the completion API.
    ///
    /// Transport failures abandon the in-flight exchange.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Api { .. }
                | Error::Authentication { .. }
                | Error::BadRequest { .. }
                | Error::RateLimit { .. }
                | Error::Unavailable { .. }
                | Error::Timeout { .. }
                | Error::Connection { .. }
                | Error::HttpClient { .. }
                | Error::Streaming { .. }
        )
    }

    /// Returns the HTTP status behind this error, if there was one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Api { status_code, .. }
            | Error::Authentication { status_code, .. }
            | Error::Unavailable { status_code, .. } => Some(*status_code),
            Error::BadRequest { .. } => Some(400),
            Error::RateLimit { .. } => Some(429),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Api {
                status_code,
                error_type,
                message,
            } => match error_type {
                Some(error_type) => write!(f, "{error_type}: {message}"),
                None => write!(f, "API error ({status_code}): {message}"),
            },
            Error::Authentication { message, .. } => write!(f, "Authentication error: {message}"),
            Error::BadRequest { message, param } => match param {
                Some(param) => write!(f, "Bad request: {message} (parameter: {param})"),
                None => write!(f, "Bad request: {message}"),
            },
            Error::RateLimit {
                message,
                retry_after,
            } => match retry_after {
                Some(secs) => write!(f, "Rate limited: {message} (retry after {secs}s)"),
                None => write!(f, "Rate limited: {message}"),
            },
            Error::Unavailable {
                status_code,
                message,
            } => write!(f, "Service unavailable ({status_code}): {message}"),
            Error::Timeout { message, duration } => match duration {
                Some(secs) => write!(f, "Timed out after {secs}s: {message}"),
                None => write!(f, "Timed out: {message}"),
            },
            Error::Connection { message, .. } => write!(f, "Connection error: {message}"),
            Error::HttpClient { message, .. } => write!(f, "HTTP error: {message}"),
            Error::Streaming { message, .. } => write!(f, "Stream error: {message}"),
            Error::Serialization { message, .. } => write!(f, "Serialization error: {message}"),
            Error::Url { message, .. } => write!(f, "URL error: {message}"),
            Error::Validation { message, param } => match param {
                Some(param) => write!(f, "Invalid {param}: {message}"),
                None => write!(f, "Invalid operation: {message}"),
            },
            Error::NotFound { message, id } => match id {
                Some(id) => write!(f, "Chat {id} not found: {message}"),
                None => write!(f, "Not found: {message}"),
            },
            Error::Database { message, .. } => write!(f, "Database error: {message}"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Connection { source, .. }
            | Error::HttpClient { source, .. }
            | Error::Streaming { source, .. }
            | Error::Serialization { source, .. }
            | Error::Database { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Url { source, .. } => {
                source.as_ref().map(|e| e as &(dyn error::Error + 'static))
            }
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::serialization(format!("JSON error: {err}"), Some(Box::new(err)))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::url(format!("URL parse error: {err}"), Some(err))
    }
}

impl From<Utf8Error> for Error {
    fn from(err: Utf8Error) -> Self {
        Error::streaming(format!("invalid UTF-8: {err}"), Some(Box::new(err)))
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::database(err.to_string(), Some(Box::new(err)))
    }
}

/// A specialized Result type for parley operations.
pub type Result<T> = std::result::Result<T, Error>;

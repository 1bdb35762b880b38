use std::env;
use std::time::{Duration, Instant};

use futures::StreamExt;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response};
use serde::Deserialize;
use url::Url;

use crate::error::{Error, Result};
use crate::observability::{
    CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS, STREAM_FRAGMENTS,
};
use crate::sse::process_sse;
use crate::types::{ChatCompletion, CompletionOutput, CompletionRequest, FragmentStream};

const DEFAULT_API_URL: &str = "https://api.groq.com/openai/v1/";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Environment variable holding the API credential.
pub const API_KEY_ENV: &str = "GROQ_API_KEY";

/// Anything that can turn a [`CompletionRequest`] into a [`CompletionOutput`].
///
/// The chat session only talks to the completion API through this trait.
#[async_trait::async_trait]
pub trait Completions: Send + Sync {
    /// Run one completion.
    ///
    /// Streaming requests resolve to [`CompletionOutput::Fragments`] once the
    /// response headers arrive; errors after that point surface through the
    /// stream.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionOutput>;
}

/// Client for Groq's OpenAI-compatible chat completions API.
#[derive(Debug, Clone)]
pub struct Groq {
    authorization: HeaderValue,
    client: ReqwestClient,
    base_url: Url,
    timeout: Duration,
}

impl Groq {
    /// Create a new client.
    ///
    /// The API key can be provided directly or read from the `GROQ_API_KEY`
    /// environment variable.
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Self::with_options(api_key, None, None)
    }

    /// Create a new client with custom settings.
    pub fn with_options(
        api_key: Option<String>,
        base_url: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let api_key = match api_key {
            Some(key) => key,
            None => env::var(API_KEY_ENV).map_err(|_| {
                Error::authentication(format!(
                    "API key not provided and {API_KEY_ENV} environment variable not set"
                ))
            })?,
        };
        let mut authorization = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| Error::authentication("API key contains invalid header characters"))?;
        authorization.set_sensitive(true);

        let mut base_url = base_url.unwrap_or_else(|| DEFAULT_API_URL.to_string());
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        let base_url = Url::parse(&base_url)?;

        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {e}"),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            authorization,
            client,
            base_url,
            timeout,
        })
    }

    /// The base URL requests are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Create and return default headers for API requests.
    fn default_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(header::AUTHORIZATION, self.authorization.clone());
        headers
    }

    fn completions_url(&self) -> Result<Url> {
        Ok(self.base_url.join("chat/completions")?)
    }

    /// Process API response errors and convert to our Error type.
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse::<u64>().ok());

        #[derive(Deserialize)]
        struct ErrorResponse {
            error: Option<ErrorDetail>,
        }

        #[derive(Deserialize)]
        struct ErrorDetail {
            #[serde(rename = "type")]
            error_type: Option<String>,
            message: Option<String>,
            param: Option<String>,
        }

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {e}"),
                    Some(Box::new(e)),
                );
            }
        };

        let detail = serde_json::from_str::<ErrorResponse>(&error_body)
            .ok()
            .and_then(|e| e.error);
        let error_type = detail.as_ref().and_then(|e| e.error_type.clone());
        let error_param = detail.as_ref().and_then(|e| e.param.clone());
        let error_message = detail
            .and_then(|e| e.message)
            .unwrap_or_else(|| error_body.clone());

        match status_code {
            400 => Error::bad_request(error_message, error_param),
            401 => Error::authentication(error_message),
            403 => Error::permission(error_message),
            408 => Error::timeout(error_message, None),
            429 => Error::rate_limit(error_message, retry_after),
            500..=599 => Error::unavailable(status_code, error_message),
            _ => Error::api(status_code, error_type, error_message),
        }
    }

    fn map_send_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::timeout(
                format!("Request timed out: {e}"),
                Some(self.timeout.as_secs_f64()),
            )
        } else if e.is_connect() {
            Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
        } else {
            Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
        }
    }

    async fn post(&self, request: &CompletionRequest, headers: HeaderMap) -> Result<Response> {
        CLIENT_REQUESTS.click();
        let start = Instant::now();
        let url = self.completions_url()?;
        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            max_tokens = request.max_tokens,
            stream = request.stream,
            "sending completion request"
        );

        let result = self
            .client
            .post(url)
            .headers(headers)
            .json(request)
            .send()
            .await;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());

        let response = result.map_err(|e| {
            CLIENT_REQUEST_ERRORS.click();
            self.map_send_error(e)
        })?;

        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            let err = Self::process_error_response(response).await;
            tracing::warn!(error = %err, "completion request rejected");
            return Err(err);
        }
        Ok(response)
    }

    /// Send a request and wait for the whole response.
    pub async fn send(&self, mut request: CompletionRequest) -> Result<ChatCompletion> {
        request.stream = false;
        let response = self.post(&request, self.default_headers()).await?;
        response.json::<ChatCompletion>().await.map_err(|e| {
            Error::streaming(format!("Failed to parse response: {e}"), Some(Box::new(e)))
        })
    }

    /// Send a request and get its response as a stream of fragments.
    ///
    /// Chunks without content are skipped; the stream ends at the server's
    /// `[DONE]` marker.
    pub async fn stream(&self, mut request: CompletionRequest) -> Result<FragmentStream> {
        request.stream = true;

        let mut headers = self.default_headers();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );
        let response = self.post(&request, headers).await?;

        let fragments = process_sse(response.bytes_stream()).filter_map(|chunk| async move {
            match chunk {
                Ok(chunk) => {
                    let fragment = chunk.fragment()?;
                    STREAM_FRAGMENTS.click();
                    Some(Ok(fragment))
                }
                Err(err) => Some(Err(err)),
            }
        });
        Ok(Box::pin(fragments))
    }
}

#[async_trait::async_trait]
impl Completions for Groq {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionOutput> {
        if request.stream {
            Ok(CompletionOutput::Fragments(self.stream(request).await?))
        } else {
            Ok(CompletionOutput::Complete(self.send(request).await?.text()))
        }
    }
}

//! A model provider for OpenAI-compatible chat-completion APIs.
//!
//! Requests are always streamed. The response body is read as server-sent
//! events and turned into [`ModelResponseEvent`]s as chunks arrive, and
//! the assembled assistant message is kept as an opaque message so tool
//! call ids survive into the next request.
//!
//! [`ModelResponseEvent`]: research_agent_model::ModelResponseEvent

#[macro_use]
extern crate tracing;

mod config;
mod io;
mod proto;
mod response;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use mime::Mime;
use reqwest::{Client, Response, StatusCode, header};
use research_agent_model::{
    ErrorKind, ModelProvider, ModelProviderError, ModelRequest,
};

pub use config::{OpenAIConfig, OpenAIConfigBuilder};
use io::{Chunks, Sse};
pub use response::OpenAIResponse;

/// Error type for [`OpenAIProvider`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// OpenAI-compatible model provider.
#[derive(Clone, Debug)]
pub struct OpenAIProvider {
    client: Client,
    config: Arc<OpenAIConfig>,
}

impl OpenAIProvider {
    /// Creates a new `OpenAIProvider` with the given configuration.
    pub fn new(config: OpenAIConfig) -> Self {
        let mut builder = Client::builder();
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let client = builder.build().unwrap_or_else(|err| {
            warn!("falling back to a default HTTP client: {err}");
            Client::new()
        });
        Self {
            client,
            config: Arc::new(config),
        }
    }
}

impl ModelProvider for OpenAIProvider {
    type Error = Error;
    type Response = OpenAIResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let openai_req = proto::create_request(req, &self.config);
        let resp_fut = self
            .client
            .post(self.config.completions_url())
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.config.api_key),
            )
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "text/event-stream")
            .json(&openai_req)
            .send();

        async move {
            let resp = resp_fut.await.map_err(|err| {
                let kind = if err.is_connect() || err.is_timeout() {
                    ErrorKind::Unavailable
                } else {
                    ErrorKind::Other
                };
                Error::new(format!("{err}"), kind)
            })?;
            let resp = check_status(resp).await?;

            let content_type = resp
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok());
            let is_event_stream = content_type
                .and_then(|v| v.parse::<Mime>().ok())
                .is_some_and(|m| {
                    m.essence_str() == mime::TEXT_EVENT_STREAM.essence_str()
                });
            if !is_event_stream {
                return Err(Error::new(
                    format!("Unexpected content type: {content_type:?}"),
                    ErrorKind::Other,
                ));
            }

            let chunks = Chunks::from_response(resp);
            Ok(OpenAIResponse::from_sse(Sse::new(chunks)))
        }
    }
}

async fn check_status(resp: Response) -> Result<Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    debug!("request failed with {status}: {body}");
    Err(Error::new(
        format!("{status}: {body}"),
        error_kind_for_status(status),
    ))
}

fn error_kind_for_status(status: StatusCode) -> ErrorKind {
    if status == StatusCode::TOO_MANY_REQUESTS {
        ErrorKind::RateLimitExceeded
    } else if status.is_server_error() {
        ErrorKind::Unavailable
    } else {
        ErrorKind::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_for_status() {
        assert_eq!(
            error_kind_for_status(StatusCode::TOO_MANY_REQUESTS),
            ErrorKind::RateLimitExceeded
        );
        assert_eq!(
            error_kind_for_status(StatusCode::BAD_GATEWAY),
            ErrorKind::Unavailable
        );
        assert_eq!(
            error_kind_for_status(StatusCode::UNAUTHORIZED),
            ErrorKind::Other
        );
    }
}

//! The HTTP client shared by the schema registry and the schema loader.

use std::time::{Duration, Instant};

use reqwest::{
    Client, Request, RequestBuilder, Response,
    header::{HeaderMap, HeaderValue},
};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};
use tracing::{Instrument, Span};
use url::Url;

use crate::internal_events::{AboutToSendHttpRequest, GotHttpError, GotHttpResponse};

/// Errors raised while building or sending an HTTP request.
#[derive(Debug, Snafu)]
pub enum HttpError {
    /// The underlying client could not be constructed.
    #[snafu(display("Failed to build HTTP client: {}", source))]
    BuildClient {
        /// The underlying error.
        source: reqwest::Error,
    },
    /// The request could not be assembled.
    #[snafu(display("Failed to build HTTP request: {}", source))]
    BuildRequest {
        /// The underlying error.
        source: reqwest::Error,
    },
    /// The request was sent but no response was received.
    #[snafu(display("Failed to make HTTP(S) request: {}", source))]
    CallRequest {
        /// The underlying error.
        source: reqwest::Error,
    },
}

/// A thin wrapper around [`reqwest::Client`] that applies default headers and emits
/// request/response events.
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: Client,
    span: Span,
}

impl HttpClient {
    /// Creates a new client whose requests fail after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, HttpError> {
        let mut headers = HeaderMap::new();
        // hardcoding until compressed responses are supported
        headers.insert("Accept-Encoding", HeaderValue::from_static("identity"));

        let client = Client::builder()
            .user_agent(user_agent())
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .context(BuildClientSnafu)?;

        let span = info_span!("http");

        Ok(Self { client, span })
    }

    /// Starts a `GET` request against `url`.
    pub fn get(&self, url: Url) -> RequestBuilder {
        self.client.get(url)
    }

    /// Builds and sends the request, emitting events for the request and its outcome.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, HttpError> {
        let request: Request = builder.build().context(BuildRequestSnafu)?;

        emit!(AboutToSendHttpRequest { request: &request });

        let response = self.client.execute(request);

        async move {
            // Capture the time right before we issue the request.
            let before = Instant::now();
            let response_result = response.await;
            let roundtrip = before.elapsed();

            let response = response_result
                .inspect_err(|error| emit!(GotHttpError { error, roundtrip }))
                .context(CallRequestSnafu)?;

            emit!(GotHttpResponse {
                response: &response,
                roundtrip,
            });
            Ok(response)
        }
        .instrument(self.span.clone())
        .await
    }
}

fn user_agent() -> String {
    format!(
        "{}/{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    )
}

/// Credentials attached to outgoing requests.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields, rename_all = "snake_case", tag = "strategy")]
pub enum Auth {
    /// HTTP basic authentication.
    Basic {
        /// The username.
        user: String,
        /// The password.
        password: String,
    },
    /// Bearer token authentication.
    Bearer {
        /// The token.
        token: String,
    },
}

impl Auth {
    /// Applies these credentials to a request.
    pub fn apply(&self, builder: RequestBuilder) -> RequestBuilder {
        match self {
            Auth::Basic { user, password } => builder.basic_auth(user, Some(password)),
            Auth::Bearer { token } => builder.bearer_auth(token),
        }
    }
}

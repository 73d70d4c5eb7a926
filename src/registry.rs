//! Clients for a Confluent-compatible schema registry.

use std::{fmt, time::Duration};

use async_trait::async_trait;
use reqwest::{StatusCode, header::ACCEPT};
use serde::Deserialize;
use snafu::{ResultExt, Snafu};
use url::Url;

use crate::http::{Auth, HttpClient, HttpError};

const REGISTRY_CONTENT_TYPE: &str = "application/vnd.schemaregistry.v1+json";

/// Errors returned by a [`SchemaRegistry`].
#[derive(Debug, Snafu)]
pub enum RegistryError {
    /// The registry base URL is not a valid URL.
    #[snafu(display("Invalid schema registry URL {:?}: {}", url, source))]
    InvalidUrl {
        /// The rejected URL.
        url: String,
        /// The underlying parse error.
        source: url::ParseError,
    },
    /// The registry base URL cannot have paths appended to it.
    #[snafu(display("Schema registry URL {} cannot be used as a base URL", url))]
    CannotBeBase {
        /// The rejected URL.
        url: Url,
    },
    /// The HTTP request failed.
    #[snafu(display("Schema registry request failed: {}", source))]
    Request {
        /// The underlying HTTP error.
        source: HttpError,
    },
    /// The registry has no schema with this ID.
    #[snafu(display("Schema {} not found in registry", id))]
    NotFound {
        /// The requested schema ID.
        id: u32,
    },
    /// The registry answered with an unexpected status.
    #[snafu(display("Schema registry returned HTTP {}: {}", status, message))]
    UnexpectedStatus {
        /// The status returned.
        status: StatusCode,
        /// The registry's error message, or the raw response body.
        message: String,
    },
    /// The response body is not a registry schema document.
    #[snafu(display("Invalid schema registry response: {}", source))]
    InvalidResponse {
        /// The underlying error.
        source: reqwest::Error,
    },
    /// The registry returned a schema that is not Avro.
    #[snafu(display("Schema {} has type {}, expected AVRO", id, schema_type))]
    UnsupportedSchemaType {
        /// The requested schema ID.
        id: u32,
        /// The type reported by the registry.
        schema_type: String,
    },
    /// An error from a custom [`SchemaRegistry`] implementation.
    #[snafu(display("{}", source))]
    Custom {
        /// The underlying error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// A source of schema definitions keyed by numeric ID.
///
/// Implementations should not retry: failures are surfaced to the caller, and the codec bounds
/// each call with its own timeout.
#[async_trait]
pub trait SchemaRegistry: fmt::Debug + Send + Sync {
    /// Returns the raw schema definition registered under `id`.
    async fn schema(&self, id: u32) -> Result<String, RegistryError>;
}

#[derive(Deserialize)]
struct SchemaResponse {
    schema: String,
    #[serde(rename = "schemaType", default)]
    schema_type: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    message: String,
}

/// A [`SchemaRegistry`] speaking the Confluent REST API.
#[derive(Clone, Debug)]
pub struct HttpSchemaRegistry {
    client: HttpClient,
    base: Url,
    auth: Option<Auth>,
}

impl HttpSchemaRegistry {
    /// Creates a client for the registry at `base_url`. No request is made until the first
    /// [`schema`](SchemaRegistry::schema) call.
    pub fn new(
        base_url: &str,
        auth: Option<Auth>,
        timeout: Duration,
    ) -> Result<Self, RegistryError> {
        let base = Url::parse(base_url).context(InvalidUrlSnafu { url: base_url })?;
        if base.cannot_be_a_base() {
            return CannotBeBaseSnafu { url: base }.fail();
        }

        let client = HttpClient::new(timeout).context(RequestSnafu)?;

        Ok(Self { client, base, auth })
    }

    /// The URL the schema with `id` is fetched from.
    pub fn schema_url(&self, id: u32) -> Url {
        let id = id.to_string();
        let mut url = self.base.clone();
        // The base was checked at construction, so it always has path segments.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["schemas", "ids", id.as_str()]);
        }
        url
    }
}

#[async_trait]
impl SchemaRegistry for HttpSchemaRegistry {
    async fn schema(&self, id: u32) -> Result<String, RegistryError> {
        let mut request = self
            .client
            .get(self.schema_url(id))
            .header(ACCEPT, REGISTRY_CONTENT_TYPE);
        if let Some(auth) = &self.auth {
            request = auth.apply(request);
        }

        let response = self.client.send(request).await.context(RequestSnafu)?;

        match response.status() {
            status if status.is_success() => {
                let body = response
                    .json::<SchemaResponse>()
                    .await
                    .context(InvalidResponseSnafu)?;
                match body.schema_type {
                    Some(schema_type) if !schema_type.eq_ignore_ascii_case("AVRO") => {
                        UnsupportedSchemaTypeSnafu { id, schema_type }.fail()
                    }
                    _ => Ok(body.schema),
                }
            }
            StatusCode::NOT_FOUND => NotFoundSnafu { id }.fail(),
            status => {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ErrorResponse>(&body)
                    .map(|error| error.message)
                    .unwrap_or(body);
                UnexpectedStatusSnafu { status, message }.fail()
            }
        }
    }
}

//! User-facing configuration for [`AvroCodec`].

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use snafu::{ResultExt, Snafu};

use crate::{
    codec::AvroCodec,
    http::Auth,
    registry::{HttpSchemaRegistry, RegistryError},
    schema::{SchemaLoadError, load_schema},
};

const fn default_registry_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Errors raised while building an [`AvroCodec`]. A codec is never returned alongside one.
#[derive(Debug, Snafu)]
pub enum BuildError {
    /// Neither schema source was configured.
    #[snafu(display("You must configure either a `schema_uri` or a `schema_registry_uri`"))]
    MissingSchemaSource,
    /// Both schema sources were configured.
    #[snafu(display("`schema_uri` and `schema_registry_uri` are mutually exclusive"))]
    ConflictingSchemaSources,
    /// The static schema could not be loaded.
    #[snafu(display("Failed to load schema: {}", source))]
    SchemaFetch {
        /// The underlying load error.
        source: SchemaLoadError,
    },
    /// The registry client could not be created.
    #[snafu(display("Failed to create schema registry client: {}", source))]
    RegistryClient {
        /// The underlying registry error.
        source: RegistryError,
    },
}

impl BuildError {
    /// Returns `true` if the error comes from the choice of schema source rather than from
    /// acting on it.
    pub const fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            BuildError::MissingSchemaSource | BuildError::ConflictingSchemaSources
        )
    }
}

/// Configuration for an [`AvroCodec`].
///
/// Exactly one of `schema_uri` and `schema_registry_uri` must be set.
#[serde_as]
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AvroCodecConfig {
    /// Location of a single Avro schema, loaded once when the codec is built.
    ///
    /// This can be a local path, a `file://` URL or an `http(s)://` URL.
    #[serde(default)]
    pub schema_uri: Option<String>,

    /// Base URL of a Confluent-compatible schema registry.
    ///
    /// Messages prefixed with a zero byte and a schema ID are decoded with the schema registered
    /// under that ID.
    #[serde(default)]
    pub schema_registry_uri: Option<String>,

    /// Upper bound on fetching one schema, from the registry or from an HTTP `schema_uri`.
    #[serde(default = "default_registry_timeout")]
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(rename = "registry_timeout_secs")]
    pub registry_timeout: Duration,

    /// Credentials for the schema registry.
    #[serde(default)]
    pub registry_auth: Option<Auth>,
}

impl Default for AvroCodecConfig {
    fn default() -> Self {
        Self {
            schema_uri: None,
            schema_registry_uri: None,
            registry_timeout: default_registry_timeout(),
            registry_auth: None,
        }
    }
}

impl AvroCodecConfig {
    /// Creates a configuration for a static schema.
    pub fn from_schema_uri(schema_uri: impl Into<String>) -> Self {
        Self {
            schema_uri: Some(schema_uri.into()),
            ..Self::default()
        }
    }

    /// Creates a configuration for a schema registry.
    pub fn from_registry_uri(schema_registry_uri: impl Into<String>) -> Self {
        Self {
            schema_registry_uri: Some(schema_registry_uri.into()),
            ..Self::default()
        }
    }

    /// Builds the codec.
    ///
    /// A static schema is loaded and parsed here. A registry client is created without
    /// contacting the registry.
    pub async fn build(&self) -> Result<AvroCodec, BuildError> {
        let schema_uri = non_blank(self.schema_uri.as_deref());
        let registry_uri = non_blank(self.schema_registry_uri.as_deref());

        match (schema_uri, registry_uri) {
            (Some(uri), None) => {
                let schema = load_schema(uri, self.registry_timeout)
                    .await
                    .context(SchemaFetchSnafu)?;
                Ok(AvroCodec::with_schema(schema))
            }
            (None, Some(uri)) => {
                let registry =
                    HttpSchemaRegistry::new(uri, self.registry_auth.clone(), self.registry_timeout)
                        .context(RegistryClientSnafu)?;
                debug!(message = "Using schema registry.", schema_registry_uri = %uri);
                Ok(AvroCodec::with_registry(
                    Arc::new(registry),
                    self.registry_timeout,
                ))
            }
            (None, None) => MissingSchemaSourceSnafu.fail(),
            (Some(_), Some(_)) => ConflictingSchemaSourcesSnafu.fail(),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}

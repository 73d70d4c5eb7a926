use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use apache_avro::Schema;
use snafu::{ResultExt, Snafu};

use super::SchemaCache;
use crate::{
    internal_events::{SchemaCacheMiss, SchemaRegistryFetchError, SchemaRegistryFetched},
    registry::{RegistryError, SchemaRegistry},
    wire::WireMode,
};

/// Errors raised while choosing the schema for a message.
#[derive(Debug, Snafu)]
pub enum ResolveError {
    /// A raw message arrived but the codec only knows registry schemas.
    #[snafu(display("Received a message without a schema ID but no static schema is configured"))]
    NoStaticSchema,
    /// A registry-tagged message arrived but the codec has no registry.
    #[snafu(display("Received a message tagged with schema ID {} but no schema registry is configured", id))]
    NoRegistry {
        /// The schema ID carried by the message.
        id: u32,
    },
    /// The registry could not provide the schema.
    #[snafu(display("Failed to fetch schema {} from registry: {}", id, source))]
    Fetch {
        /// The requested schema ID.
        id: u32,
        /// The underlying registry error.
        source: RegistryError,
    },
    /// The registry did not answer in time.
    #[snafu(display("Timed out after {:?} fetching schema {} from registry", timeout, id))]
    Timeout {
        /// The requested schema ID.
        id: u32,
        /// The configured timeout.
        timeout: Duration,
    },
    /// The registry returned a schema that does not parse.
    #[snafu(display("Failed to parse schema {} from registry: {}", id, source))]
    Parse {
        /// The requested schema ID.
        id: u32,
        /// The underlying Avro error.
        source: apache_avro::Error,
    },
}

/// Where a codec's schemas come from. Chosen once at construction.
pub enum SchemaSource {
    /// Every message is decoded with this schema.
    Static(Arc<Schema>),
    /// Schemas are fetched from a registry by the ID carried in each message.
    Registry {
        /// The registry client.
        client: Arc<dyn SchemaRegistry>,
        /// Upper bound on a single fetch-and-parse.
        timeout: Duration,
    },
}

impl fmt::Debug for SchemaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaSource::Static(schema) => f.debug_tuple("Static").field(schema).finish(),
            SchemaSource::Registry { client, timeout } => f
                .debug_struct("Registry")
                .field("client", client)
                .field("timeout", timeout)
                .finish(),
        }
    }
}

/// Maps a parsed message onto the schema its payload was written with.
#[derive(Debug)]
pub struct SchemaResolver {
    source: SchemaSource,
    cache: SchemaCache,
}

impl SchemaResolver {
    /// Creates a resolver with an empty cache.
    pub fn new(source: SchemaSource) -> Self {
        Self {
            source,
            cache: SchemaCache::new(),
        }
    }

    /// The static schema, if this resolver was built with one.
    pub fn static_schema(&self) -> Option<&Arc<Schema>> {
        match &self.source {
            SchemaSource::Static(schema) => Some(schema),
            SchemaSource::Registry { .. } => None,
        }
    }

    /// The cache of registry schemas. Always empty for a static resolver.
    pub const fn cache(&self) -> &SchemaCache {
        &self.cache
    }

    /// Returns the schema to decode a message in `mode` with.
    pub async fn resolve(&self, mode: WireMode) -> Result<Arc<Schema>, ResolveError> {
        match (&self.source, mode) {
            (SchemaSource::Static(schema), WireMode::Raw) => Ok(Arc::clone(schema)),
            (SchemaSource::Static(_), WireMode::Registry(id)) => NoRegistrySnafu { id }.fail(),
            (SchemaSource::Registry { .. }, WireMode::Raw) => NoStaticSchemaSnafu.fail(),
            (SchemaSource::Registry { client, timeout }, WireMode::Registry(id)) => {
                self.cache
                    .get_or_fetch(id, || fetch(client.as_ref(), id, *timeout))
                    .await
            }
        }
    }
}

async fn fetch(
    client: &dyn SchemaRegistry,
    id: u32,
    timeout: Duration,
) -> Result<Schema, ResolveError> {
    emit!(SchemaCacheMiss { id });

    let start = Instant::now();
    let result = match tokio::time::timeout(timeout, client.schema(id)).await {
        Ok(text) => text
            .context(FetchSnafu { id })
            .and_then(|text| Schema::parse_str(&text).context(ParseSnafu { id })),
        Err(_elapsed) => TimeoutSnafu { id, timeout }.fail(),
    };
    let elapsed = start.elapsed();

    match &result {
        Ok(_) => emit!(SchemaRegistryFetched { id, elapsed }),
        Err(error) => emit!(SchemaRegistryFetchError { id, error, elapsed }),
    }

    result
}

//! The Avro codec: decoding messages into records and encoding records into Avro datums.

use std::{sync::Arc, time::Duration};

use apache_avro::Schema;
use bytes::{BufMut, Bytes, BytesMut};
use snafu::{ResultExt, Snafu};
use tokio_util::codec::Encoder;

use crate::{
    avro::{self, DecodeError, EncodeError},
    config::{AvroCodecConfig, BuildError},
    internal_events::{AvroDecodeError, AvroEncodeError},
    record::Record,
    registry::SchemaRegistry,
    schema::{ResolveError, SchemaCache, SchemaResolver, SchemaSource},
    wire::{self, WireFormatError},
};

/// Errors raised by a single decode or encode call. None of them affect later calls.
#[derive(Debug, Snafu)]
pub enum CodecError {
    /// The message is too short to classify.
    #[snafu(display("Malformed Avro message: {}", source))]
    MalformedInput {
        /// The underlying wire-format error.
        source: WireFormatError,
    },
    /// No schema could be found for the message.
    #[snafu(display("Failed to resolve Avro schema: {}", source))]
    SchemaResolution {
        /// The underlying resolution error.
        source: ResolveError,
    },
    /// The payload does not match its schema.
    #[snafu(display("Failed to decode Avro datum: {}", source))]
    Decode {
        /// The underlying decode error.
        source: DecodeError,
    },
    /// The record does not match the static schema.
    #[snafu(display("Failed to encode record as Avro: {}", source))]
    Encode {
        /// The underlying encode error.
        source: EncodeError,
    },
    /// Writing to an output buffer failed.
    #[snafu(display("I/O error: {}", source), context(false))]
    Io {
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

impl CodecError {
    /// A stable, machine-readable code for this error.
    pub const fn error_code(&self) -> &'static str {
        match self {
            CodecError::MalformedInput { .. } => "malformed_input",
            CodecError::SchemaResolution { .. } => "schema_resolution",
            CodecError::Decode { .. } => "avro_decode",
            CodecError::Encode { .. } => "avro_encode",
            CodecError::Io { .. } => "io",
        }
    }
}

/// Translates between Avro messages and [`Record`]s.
///
/// Cloning is cheap and clones share the schema cache, so one codec can serve many tasks.
#[derive(Clone, Debug)]
pub struct AvroCodec {
    resolver: Arc<SchemaResolver>,
}

impl AvroCodec {
    /// Builds a codec from exactly one of a schema location or a registry base URL.
    ///
    /// A schema location is loaded and parsed immediately. A registry is not contacted until the
    /// first registry-tagged message is decoded.
    pub async fn new(
        schema_uri: Option<&str>,
        schema_registry_uri: Option<&str>,
    ) -> Result<Self, BuildError> {
        AvroCodecConfig {
            schema_uri: schema_uri.map(str::to_owned),
            schema_registry_uri: schema_registry_uri.map(str::to_owned),
            ..Default::default()
        }
        .build()
        .await
    }

    /// Creates a codec that decodes raw messages and encodes records with `schema`.
    pub fn with_schema(schema: Schema) -> Self {
        Self::from_source(SchemaSource::Static(Arc::new(schema)))
    }

    /// Creates a codec that resolves schemas through `registry`, giving each fetch at most
    /// `timeout`.
    pub fn with_registry(registry: Arc<dyn SchemaRegistry>, timeout: Duration) -> Self {
        Self::from_source(SchemaSource::Registry {
            client: registry,
            timeout,
        })
    }

    /// Creates a codec from an explicit schema source.
    pub fn from_source(source: SchemaSource) -> Self {
        Self {
            resolver: Arc::new(SchemaResolver::new(source)),
        }
    }

    /// The static schema, if the codec was built with one.
    pub fn static_schema(&self) -> Option<&Schema> {
        self.resolver.static_schema().map(Arc::as_ref)
    }

    /// The registry schemas fetched so far.
    pub fn schema_cache(&self) -> &SchemaCache {
        self.resolver.cache()
    }

    /// Decodes one message into a record.
    pub async fn decode_record(&self, bytes: Bytes) -> Result<Record, CodecError> {
        let parsed = wire::parse(bytes).context(MalformedInputSnafu)?;
        let schema = self
            .resolver
            .resolve(parsed.mode)
            .await
            .context(SchemaResolutionSnafu)?;

        avro::decode_datum(&parsed.payload, &schema).context(DecodeSnafu)
    }

    /// Decodes one message and hands the record to `emit`.
    ///
    /// `emit` is called exactly once on success and never on failure.
    pub async fn decode<F>(&self, bytes: Bytes, emit: F) -> Result<(), CodecError>
    where
        F: FnOnce(Record),
    {
        let record = self
            .decode_record(bytes)
            .await
            .inspect_err(|error| emit!(AvroDecodeError { error }))?;

        emit(record);
        Ok(())
    }

    /// Encodes a record with the static schema.
    pub fn encode_record(&self, record: &Record) -> Result<Bytes, CodecError> {
        let schema = self
            .resolver
            .static_schema()
            .ok_or(EncodeError::NoStaticSchema)
            .context(EncodeSnafu)?;

        avro::encode_datum(record, schema)
            .map(Bytes::from)
            .context(EncodeSnafu)
    }

    /// Encodes a record and hands the record and its bytes to `emit`.
    ///
    /// `emit` is called exactly once on success and never on failure.
    pub fn encode<F>(&self, record: Record, emit: F) -> Result<(), CodecError>
    where
        F: FnOnce(Record, Bytes),
    {
        let bytes = self
            .encode_record(&record)
            .inspect_err(|error| emit!(AvroEncodeError { error }))?;

        emit(record, bytes);
        Ok(())
    }
}

impl Encoder<Record> for AvroCodec {
    type Error = CodecError;

    fn encode(&mut self, record: Record, buffer: &mut BytesMut) -> Result<(), Self::Error> {
        let bytes = self
            .encode_record(&record)
            .inspect_err(|error| emit!(AvroEncodeError { error }))?;
        buffer.put(bytes);
        Ok(())
    }
}

//! An Avro codec that translates between structured [`Record`]s and Avro binary datums.
//!
//! The schema used for a datum comes from one of two mutually exclusive sources:
//!
//! * a static schema, loaded once from a local path or URL when the codec is built, or
//! * a Confluent-compatible schema registry, queried by the numeric schema ID that prefixes
//!   each registry-tagged message (`[0x00][u32 big-endian id][datum]`).
//!
//! Schemas fetched from the registry are cached per ID for the lifetime of the codec.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

#[macro_use]
mod internal_events;

pub mod avro;
pub mod codec;
pub mod config;
pub mod http;
pub mod record;
pub mod registry;
pub mod schema;
pub mod wire;

#[cfg(test)]
pub(crate) mod test_util;

pub use avro::{DecodeError, EncodeError};
pub use codec::{AvroCodec, CodecError};
pub use config::{AvroCodecConfig, BuildError};
pub use http::Auth;
pub use record::{Record, Value};
pub use registry::{HttpSchemaRegistry, RegistryError, SchemaRegistry};
pub use schema::{ResolveError, SchemaCache, SchemaLoadError, SchemaResolver, SchemaSource};
pub use wire::{ParseResult, WireFormatError, WireMode};

//! Classification of inbound messages by the Confluent wire-format prefix.
//!
//! See the [Confluent wire format] for the layout of registry-tagged messages.
//!
//! [Confluent wire format]: https://docs.confluent.io/platform/current/schema-registry/fundamentals/serdes-develop/index.html#wire-format

use bytes::{Buf, Bytes};
use snafu::Snafu;

/// The leading byte of a registry-tagged message.
pub const CONFLUENT_MAGIC_BYTE: u8 = 0;

/// The magic byte followed by the big-endian `u32` schema ID.
pub const CONFLUENT_SCHEMA_PREFIX_LEN: usize = 5;

/// The message is too short to carry the wire-format prefix.
#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum WireFormatError {
    /// Fewer than [`CONFLUENT_SCHEMA_PREFIX_LEN`] bytes were supplied.
    #[snafu(display(
        "Expected at least {} bytes, received {}",
        CONFLUENT_SCHEMA_PREFIX_LEN,
        len
    ))]
    TooShort {
        /// The length of the rejected message.
        len: usize,
    },
}

/// How the payload of a message must be decoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WireMode {
    /// No prefix, decode with the static schema.
    Raw,
    /// Decode with the registry schema carrying this ID.
    Registry(u32),
}

/// A classified message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseResult {
    /// How to resolve the schema for `payload`.
    pub mode: WireMode,
    /// The Avro datum. For [`WireMode::Raw`] this is the whole original message.
    pub payload: Bytes,
}

/// Splits a message into its schema mode and Avro payload.
///
/// The first five bytes are always read. A zero magic byte marks a registry-tagged message and
/// the payload starts after the prefix; any other first byte means the message is a bare datum,
/// so the speculative read is discarded and the payload is the entire message.
pub fn parse(bytes: Bytes) -> Result<ParseResult, WireFormatError> {
    if bytes.len() < CONFLUENT_SCHEMA_PREFIX_LEN {
        return TooShortSnafu { len: bytes.len() }.fail();
    }

    let mut prefix = &bytes[..CONFLUENT_SCHEMA_PREFIX_LEN];
    let magic = prefix.get_u8();
    let id = prefix.get_u32();

    if magic == CONFLUENT_MAGIC_BYTE {
        Ok(ParseResult {
            mode: WireMode::Registry(id),
            payload: bytes.slice(CONFLUENT_SCHEMA_PREFIX_LEN..),
        })
    } else {
        Ok(ParseResult {
            mode: WireMode::Raw,
            payload: bytes,
        })
    }
}

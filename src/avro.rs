//! Conversions between Avro datums and [`Record`]s.

use std::{collections::HashMap, str::FromStr};

use apache_avro::{
    BigDecimal, Schema,
    schema::{Name, NamesRef, RecordSchema, ResolvedSchema, SchemaKind, UnionSchema},
};
use indexmap::IndexMap;
use snafu::{OptionExt, ResultExt, Snafu};

use crate::record::{Record, Value};

type AvroValue = apache_avro::types::Value;

/// Errors raised while turning an Avro datum into a [`Record`].
#[derive(Debug, Snafu)]
pub enum DecodeError {
    /// The payload does not conform to the schema.
    #[snafu(display("Payload does not match schema: {}", source))]
    Datum {
        /// The underlying Avro error.
        source: apache_avro::Error,
    },
    /// The schema describes something other than a record.
    #[snafu(display("Expected an Avro record, found {:?}", kind))]
    NotARecord {
        /// The kind of the decoded datum.
        kind: SchemaKind,
    },
    /// A decimal could not be unpacked into bytes.
    #[snafu(display("Invalid Avro decimal: {}", source))]
    Decimal {
        /// The underlying Avro error.
        source: apache_avro::Error,
    },
}

/// Errors raised while turning a [`Record`] into an Avro datum.
#[derive(Debug, Snafu)]
pub enum EncodeError {
    /// The codec resolves schemas from a registry and has no schema to encode with.
    #[snafu(display("No static schema is configured to encode records with"))]
    NoStaticSchema,
    /// The schema's named types could not be collected.
    #[snafu(display("Invalid schema: {}", source))]
    InvalidSchema {
        /// The underlying Avro error.
        source: apache_avro::Error,
    },
    /// An integer does not fit the 32-bit Avro type it is written as.
    #[snafu(display("Integer {} is out of range for Avro {:?}", value, kind))]
    IntegerOutOfRange {
        /// The rejected integer.
        value: i64,
        /// The Avro type it was written as.
        kind: SchemaKind,
    },
    /// A string is not a valid big decimal.
    #[snafu(display("Invalid big decimal {:?}", text))]
    InvalidBigDecimal {
        /// The rejected text.
        text: String,
    },
    /// No branch of a union accepts the value.
    #[snafu(display("No union branch accepts a value of kind {}", kind))]
    NoMatchingVariant {
        /// The kind of the rejected value.
        kind: &'static str,
    },
    /// The record cannot be coerced to the schema.
    #[snafu(display("Record does not match schema: {}", source))]
    IncompatibleRecord {
        /// The underlying Avro error.
        source: apache_avro::Error,
    },
    /// The coerced datum could not be written.
    #[snafu(display("Failed to write Avro datum: {}", source))]
    Write {
        /// The underlying Avro error.
        source: apache_avro::Error,
    },
}

/// Decodes a single Avro binary datum written with `schema` into a [`Record`].
///
/// Trailing bytes after the datum are ignored.
pub fn decode_datum(mut payload: &[u8], schema: &Schema) -> Result<Record, DecodeError> {
    let value = apache_avro::from_avro_datum(schema, &mut payload, None).context(DatumSnafu)?;

    let fields = match value {
        AvroValue::Record(fields) => fields,
        other => {
            return NotARecordSnafu {
                kind: SchemaKind::from(&other),
            }
            .fail();
        }
    };

    fields
        .into_iter()
        .map(|(name, value)| try_from(value).map(|value| (name, value)))
        .collect()
}

/// Encodes `record` as a single Avro binary datum using `schema`.
///
/// Each field is converted following its schema: integers are range-checked against `int`
/// types, bytes become `fixed`, `decimal` or `duration` values where the schema asks for them,
/// and union branches are chosen by the value. Missing fields take their schema default.
pub fn encode_datum(record: &Record, schema: &Schema) -> Result<Vec<u8>, EncodeError> {
    let resolved = ResolvedSchema::try_from(schema).context(InvalidSchemaSnafu)?;
    let names = resolved.get_names();

    let value = match schema {
        Schema::Record(record_schema) => record_to_avro(record.iter(), record_schema, names)?,
        _ => AvroValue::Record(
            record
                .iter()
                .map(|(name, value)| (name.clone(), untyped(value)))
                .collect(),
        ),
    };
    let value = value.resolve(schema).context(IncompatibleRecordSnafu)?;

    apache_avro::to_avro_datum(schema, value).context(WriteSnafu)
}

// can't use std::convert::TryFrom because of orphan rules
fn try_from(value: AvroValue) -> Result<Value, DecodeError> {
    // Strings, enums and the byte-backed types all map onto `Value::Bytes`.
    match value {
        AvroValue::Null => Ok(Value::Null),
        AvroValue::Boolean(boolean) => Ok(Value::Boolean(boolean)),
        AvroValue::Int(int) => Ok(Value::from(int)),
        AvroValue::Long(long) => Ok(Value::Integer(long)),
        AvroValue::Float(float) => Ok(Value::from(float)),
        AvroValue::Double(double) => Ok(Value::Float(double)),
        AvroValue::Bytes(bytes) => Ok(Value::from(bytes)),
        AvroValue::String(string) => Ok(Value::from(string)),
        AvroValue::Fixed(_, bytes) => Ok(Value::from(bytes)),
        AvroValue::Enum(_, symbol) => Ok(Value::from(symbol)),
        AvroValue::Union(_, value) => try_from(*value),
        AvroValue::Array(items) => items
            .into_iter()
            .map(try_from)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        AvroValue::Map(items) => {
            // HashMap order is arbitrary, so sort for stable output.
            let mut items = items.into_iter().collect::<Vec<_>>();
            items.sort_by(|(left, _), (right, _)| left.cmp(right));
            items
                .into_iter()
                .map(|(key, value)| try_from(value).map(|value| (key, value)))
                .collect::<Result<IndexMap<_, _>, _>>()
                .map(Value::Object)
        }
        AvroValue::Record(fields) => fields
            .into_iter()
            .map(|(key, value)| try_from(value).map(|value| (key, value)))
            .collect::<Result<IndexMap<_, _>, _>>()
            .map(Value::Object),
        AvroValue::Date(days) => Ok(Value::from(days)),
        AvroValue::TimeMillis(millis) => Ok(Value::from(millis)),
        AvroValue::TimeMicros(micros) => Ok(Value::Integer(micros)),
        AvroValue::TimestampMillis(timestamp)
        | AvroValue::TimestampMicros(timestamp)
        | AvroValue::TimestampNanos(timestamp)
        | AvroValue::LocalTimestampMillis(timestamp)
        | AvroValue::LocalTimestampMicros(timestamp)
        | AvroValue::LocalTimestampNanos(timestamp) => Ok(Value::Integer(timestamp)),
        // Two's-complement big-endian unscaled value, as written on the wire.
        AvroValue::Decimal(ref decimal) => <Vec<u8>>::try_from(decimal)
            .map(Value::from)
            .context(DecimalSnafu),
        AvroValue::BigDecimal(decimal) => Ok(Value::from(decimal.to_string())),
        AvroValue::Duration(duration) => Ok(Value::from(<[u8; 12]>::from(duration).to_vec())),
        AvroValue::Uuid(uuid) => Ok(Value::from(uuid.as_hyphenated().to_string())),
    }
}

fn record_to_avro<'a>(
    fields: impl IntoIterator<Item = (&'a String, &'a Value)>,
    schema: &RecordSchema,
    names: &NamesRef<'_>,
) -> Result<AvroValue, EncodeError> {
    fields
        .into_iter()
        .map(|(name, value)| {
            let value = match schema.lookup.get(name) {
                Some(&position) => to_avro(value, &schema.fields[position].schema, names)?,
                // Unknown fields are dropped by `resolve`.
                None => untyped(value),
            };
            Ok((name.clone(), value))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(AvroValue::Record)
}

/// Builds the Avro value `schema` expects. Anything that doesn't line up is passed through
/// untyped so `resolve` reports the mismatch.
fn to_avro(value: &Value, schema: &Schema, names: &NamesRef<'_>) -> Result<AvroValue, EncodeError> {
    let avro = match (schema, value) {
        (Schema::Ref { name }, _) => {
            return match lookup(names, name) {
                Some(schema) => to_avro(value, schema, names),
                None => Ok(untyped(value)),
            };
        }
        (Schema::Union(union), _) => {
            let index = select_variant(union, value, names).context(NoMatchingVariantSnafu {
                kind: value.kind(),
            })?;
            let variant = to_avro(value, &union.variants()[index], names)?;
            AvroValue::Union(index as u32, Box::new(variant))
        }
        (Schema::Int, Value::Integer(int)) => AvroValue::Int(narrow(*int, SchemaKind::Int)?),
        (Schema::Date, Value::Integer(int)) => AvroValue::Date(narrow(*int, SchemaKind::Date)?),
        (Schema::TimeMillis, Value::Integer(int)) => {
            AvroValue::TimeMillis(narrow(*int, SchemaKind::TimeMillis)?)
        }
        (Schema::Long, Value::Integer(int)) => AvroValue::Long(*int),
        (Schema::TimeMicros, Value::Integer(int)) => AvroValue::TimeMicros(*int),
        (Schema::TimestampMillis, Value::Integer(int)) => AvroValue::TimestampMillis(*int),
        (Schema::TimestampMicros, Value::Integer(int)) => AvroValue::TimestampMicros(*int),
        (Schema::TimestampNanos, Value::Integer(int)) => AvroValue::TimestampNanos(*int),
        (Schema::LocalTimestampMillis, Value::Integer(int)) => {
            AvroValue::LocalTimestampMillis(*int)
        }
        (Schema::LocalTimestampMicros, Value::Integer(int)) => {
            AvroValue::LocalTimestampMicros(*int)
        }
        (Schema::LocalTimestampNanos, Value::Integer(int)) => AvroValue::LocalTimestampNanos(*int),
        (Schema::Bytes | Schema::Decimal(_), Value::Bytes(bytes)) => AvroValue::Bytes(bytes.to_vec()),
        // `resolve` checks the length against the schema.
        (Schema::Fixed(_) | Schema::Duration, Value::Bytes(bytes)) => {
            AvroValue::Fixed(bytes.len(), bytes.to_vec())
        }
        (Schema::BigDecimal, Value::Integer(int)) => AvroValue::BigDecimal(BigDecimal::from(*int)),
        (Schema::BigDecimal, Value::Bytes(bytes)) => {
            let text = String::from_utf8_lossy(bytes);
            match BigDecimal::from_str(&text) {
                Ok(decimal) => AvroValue::BigDecimal(decimal),
                Err(_) => {
                    return InvalidBigDecimalSnafu {
                        text: text.into_owned(),
                    }
                    .fail();
                }
            }
        }
        (Schema::Enum(enum_schema), Value::Bytes(bytes)) => {
            match std::str::from_utf8(bytes).ok().and_then(|symbol| {
                enum_schema
                    .symbols
                    .iter()
                    .position(|candidate| candidate == symbol)
                    .map(|index| (index, symbol))
            }) {
                Some((index, symbol)) => AvroValue::Enum(index as u32, symbol.to_owned()),
                None => untyped(value),
            }
        }
        (Schema::Array(array), Value::Array(items)) => AvroValue::Array(
            items
                .iter()
                .map(|item| to_avro(item, &array.items, names))
                .collect::<Result<_, _>>()?,
        ),
        (Schema::Map(map), Value::Object(entries)) => AvroValue::Map(
            entries
                .iter()
                .map(|(key, value)| Ok((key.clone(), to_avro(value, &map.types, names)?)))
                .collect::<Result<HashMap<_, _>, EncodeError>>()?,
        ),
        (Schema::Record(record), Value::Object(fields)) => record_to_avro(fields, record, names)?,
        _ => untyped(value),
    };
    Ok(avro)
}

fn narrow(int: i64, kind: SchemaKind) -> Result<i32, EncodeError> {
    i32::try_from(int).map_err(|_| IntegerOutOfRangeSnafu { value: int, kind }.build())
}

fn lookup<'a>(names: &NamesRef<'a>, name: &Name) -> Option<&'a Schema> {
    names.get(name).copied()
}

/// Picks the union branch for `value`. Text prefers `string` and matching `enum` branches,
/// integers prefer the integer types, and otherwise the first compatible branch in declaration
/// order wins.
fn select_variant(union: &UnionSchema, value: &Value, names: &NamesRef<'_>) -> Option<usize> {
    let variants = union.variants();

    if let Value::Bytes(bytes) = value
        && let Ok(text) = std::str::from_utf8(bytes)
    {
        let textual = variants.iter().position(|variant| match deref(variant, names) {
            Some(Schema::String) => true,
            Some(Schema::Enum(enum_schema)) => enum_schema.symbols.iter().any(|symbol| symbol == text),
            _ => false,
        });
        if textual.is_some() {
            return textual;
        }
    }

    variants
        .iter()
        .position(|variant| deref(variant, names).is_some_and(|schema| accepts(schema, value)))
        .or_else(|| match value {
            Value::Integer(_) => variants
                .iter()
                .position(|variant| matches!(variant, Schema::Float | Schema::Double)),
            _ => None,
        })
}

fn deref<'a>(schema: &'a Schema, names: &NamesRef<'a>) -> Option<&'a Schema> {
    match schema {
        Schema::Ref { name } => lookup(names, name),
        other => Some(other),
    }
}

fn accepts(schema: &Schema, value: &Value) -> bool {
    match (schema, value) {
        (Schema::Null, Value::Null) | (Schema::Boolean, Value::Boolean(_)) => true,
        (Schema::Int | Schema::Date | Schema::TimeMillis, Value::Integer(int)) => {
            i32::try_from(*int).is_ok()
        }
        (
            Schema::Long
            | Schema::TimeMicros
            | Schema::TimestampMillis
            | Schema::TimestampMicros
            | Schema::TimestampNanos
            | Schema::LocalTimestampMillis
            | Schema::LocalTimestampMicros
            | Schema::LocalTimestampNanos
            | Schema::BigDecimal,
            Value::Integer(_),
        ) => true,
        (Schema::Float | Schema::Double, Value::Float(_)) => true,
        (Schema::Bytes | Schema::Decimal(_), Value::Bytes(_)) => true,
        (Schema::Uuid, Value::Bytes(bytes)) => std::str::from_utf8(bytes)
            .is_ok_and(|text| apache_avro::Uuid::parse_str(text).is_ok()),
        (Schema::BigDecimal, Value::Bytes(bytes)) => std::str::from_utf8(bytes)
            .is_ok_and(|text| BigDecimal::from_str(text).is_ok()),
        (Schema::Fixed(fixed), Value::Bytes(bytes)) => bytes.len() == fixed.size,
        (Schema::Duration, Value::Bytes(bytes)) => bytes.len() == 12,
        (Schema::Array(_), Value::Array(_)) => true,
        (Schema::Map(_) | Schema::Record(_), Value::Object(_)) => true,
        _ => false,
    }
}

/// Converts a value with no schema to guide it; `resolve` coerces or rejects the result.
fn untyped(value: &Value) -> AvroValue {
    match value {
        Value::Null => AvroValue::Null,
        Value::Boolean(boolean) => AvroValue::Boolean(*boolean),
        Value::Integer(int) => AvroValue::Long(*int),
        Value::Float(float) => AvroValue::Double(*float),
        // Avro strings still resolve against `bytes`, `enum` and `uuid` schemas.
        Value::Bytes(bytes) => match std::str::from_utf8(bytes) {
            Ok(string) => AvroValue::String(string.to_owned()),
            Err(_) => AvroValue::Bytes(bytes.to_vec()),
        },
        Value::Array(items) => AvroValue::Array(items.iter().map(untyped).collect()),
        Value::Object(fields) => AvroValue::Map(
            fields
                .iter()
                .map(|(key, value)| (key.clone(), untyped(value)))
                .collect::<HashMap<_, _>>(),
        ),
    }
}

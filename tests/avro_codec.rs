use std::{io::Write, time::Duration};

use avro_registry_codec::{
    AvroCodec, AvroCodecConfig, BuildError, CodecError, Record, ResolveError, Value,
};
use bytes::Bytes;
use serde_json::json;
use similar_asserts::assert_eq;
use wiremock::{Mock, MockServer, ResponseTemplate, matchers};

const SCHEMA: &str = r#"
{
    "type": "record",
    "name": "Test",
    "fields": [
        {"name": "foo", "type": ["null", "string"]},
        {"name": "bar", "type": "int"}
    ]
}
"#;

/// `{foo: "hello", bar: 10}` written with `SCHEMA`.
const HELLO_DATUM: &[u8] = b"\x02\x0ahello\x14";

fn schema_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(SCHEMA.as_bytes()).unwrap();
    file
}

fn hello() -> Record {
    Record::from_iter([("foo", Value::from("hello")), ("bar", Value::from(10))])
}

fn tagged(id: u32, datum: &[u8]) -> Bytes {
    let mut message = vec![0];
    message.extend_from_slice(&id.to_be_bytes());
    message.extend_from_slice(datum);
    message.into()
}

async fn registry_serving(id: u32, expected_calls: u64) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path(format!("/schemas/ids/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "schema": SCHEMA })))
        .expect(expected_calls)
        .mount(&server)
        .await;
    server
}

async fn decode_all(codec: &AvroCodec, message: Bytes) -> (Result<(), CodecError>, Vec<Record>) {
    let mut records = Vec::new();
    let result = codec.decode(message, |record| records.push(record)).await;
    (result, records)
}

#[tokio::test]
async fn decodes_registry_messages_with_one_fetch() {
    let server = registry_serving(1234, 1).await;
    let codec = AvroCodec::new(None, Some(&server.uri())).await.unwrap();

    let message = tagged(1234, HELLO_DATUM);
    assert_eq!(&message[..5], &[0x00, 0x00, 0x00, 0x04, 0xd2]);

    for _ in 0..2 {
        let (result, records) = decode_all(&codec, message.clone()).await;
        result.unwrap();
        assert_eq!(records, vec![hello()]);
    }

    assert_eq!(codec.schema_cache().len(), 1);
}

#[tokio::test]
async fn concurrent_decodes_share_one_fetch() {
    let server = registry_serving(7, 1).await;
    let codec = AvroCodec::new(None, Some(&server.uri())).await.unwrap();

    let tasks = (0..8)
        .map(|_| {
            let codec = codec.clone();
            tokio::spawn(async move { codec.decode_record(tagged(7, HELLO_DATUM)).await })
        })
        .collect::<Vec<_>>();

    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), hello());
    }
}

#[tokio::test]
async fn static_schema_round_trips() {
    let file = schema_file();
    let codec = AvroCodec::new(Some(file.path().to_str().unwrap()), None)
        .await
        .unwrap();

    let mut encoded = None;
    codec
        .encode(hello(), |record, bytes| encoded = Some((record, bytes)))
        .unwrap();
    let (record, bytes) = encoded.unwrap();
    assert_eq!(record, hello());
    assert_eq!(&bytes[..], HELLO_DATUM);

    let (result, records) = decode_all(&codec, bytes).await;
    result.unwrap();
    assert_eq!(records, vec![hello()]);
}

#[tokio::test]
async fn short_messages_emit_nothing() {
    let file = schema_file();
    let codec = AvroCodec::new(Some(file.path().to_str().unwrap()), None)
        .await
        .unwrap();

    for message in [&b""[..], &b"\x00\x00\x00"[..]] {
        let (result, records) = decode_all(&codec, Bytes::copy_from_slice(message)).await;
        assert!(
            matches!(result, Err(CodecError::MalformedInput { .. })),
            "{result:?}"
        );
        assert!(records.is_empty());
    }
}

#[tokio::test]
async fn failures_do_not_poison_the_codec() {
    let server = registry_serving(1234, 1).await;
    let codec = AvroCodec::new(None, Some(&server.uri())).await.unwrap();

    let (result, records) = decode_all(&codec, tagged(1234, b"\x02")).await;
    assert!(matches!(result, Err(CodecError::Decode { .. })), "{result:?}");
    assert!(records.is_empty());

    let (result, records) = decode_all(&codec, tagged(1234, HELLO_DATUM)).await;
    result.unwrap();
    assert_eq!(records, vec![hello()]);
}

#[tokio::test]
async fn unknown_schema_ids_are_retried() {
    let server = MockServer::start().await;
    Mock::given(matchers::path("/schemas/ids/404"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({ "error_code": 40403, "message": "Schema not found" })),
        )
        .expect(2)
        .mount(&server)
        .await;
    let codec = AvroCodec::new(None, Some(&server.uri())).await.unwrap();

    for _ in 0..2 {
        let (result, records) = decode_all(&codec, tagged(404, HELLO_DATUM)).await;
        assert!(
            matches!(
                result,
                Err(CodecError::SchemaResolution {
                    source: ResolveError::Fetch { id: 404, .. }
                })
            ),
            "{result:?}"
        );
        assert!(records.is_empty());
    }
    assert!(codec.schema_cache().is_empty());
}

#[tokio::test]
async fn slow_registry_times_out() {
    let server = MockServer::start().await;
    Mock::given(matchers::any())
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "schema": SCHEMA }))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let codec = AvroCodecConfig {
        schema_registry_uri: Some(server.uri()),
        registry_timeout: Duration::from_millis(100),
        ..Default::default()
    }
    .build()
    .await
    .unwrap();

    let (result, records) = decode_all(&codec, tagged(1, HELLO_DATUM)).await;

    // Either the codec's own deadline or the client's fires first.
    assert!(
        matches!(
            result,
            Err(CodecError::SchemaResolution {
                source: ResolveError::Timeout { id: 1, .. } | ResolveError::Fetch { id: 1, .. }
            })
        ),
        "{result:?}"
    );
    assert!(records.is_empty());
}

#[tokio::test]
async fn registry_codec_cannot_encode() {
    let codec = AvroCodec::new(None, Some("http://127.0.0.1:9")).await.unwrap();

    let mut called = false;
    let result = codec.encode(hello(), |_, _| called = true);

    assert!(matches!(result, Err(CodecError::Encode { .. })), "{result:?}");
    assert!(!called);
}

#[tokio::test]
async fn requires_exactly_one_schema_source() {
    let error = AvroCodec::new(None, None).await.unwrap_err();
    assert!(error.is_configuration_error(), "{error}");

    let file = schema_file();
    let error = AvroCodec::new(
        Some(file.path().to_str().unwrap()),
        Some("http://127.0.0.1:9"),
    )
    .await
    .unwrap_err();
    assert!(
        matches!(error, BuildError::ConflictingSchemaSources),
        "{error}"
    );
}

#[tokio::test]
async fn loads_static_schema_over_http() {
    let server = MockServer::start().await;
    Mock::given(matchers::path("/schemas/test.avsc"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SCHEMA))
        .expect(1)
        .mount(&server)
        .await;

    let codec = AvroCodecConfig::from_schema_uri(format!("{}/schemas/test.avsc", server.uri()))
        .build()
        .await
        .unwrap();

    assert_eq!(codec.decode_record(Bytes::from_static(HELLO_DATUM)).await.unwrap(), hello());
}

#[tokio::test]
async fn decodes_registry_tagged_hi_record() {
    let server = registry_serving(1234, 1).await;
    let codec = AvroCodec::new(None, Some(&server.uri())).await.unwrap();

    let message = Bytes::from_static(b"\x00\x00\x00\x04\xd2\x02\x04hi\x02");
    let record = codec.decode_record(message).await.unwrap();

    assert_eq!(
        record,
        Record::from_iter([("foo", Value::from("hi")), ("bar", Value::from(1))])
    );
}

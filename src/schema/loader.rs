use std::{path::PathBuf, time::Duration};

use apache_avro::Schema;
use snafu::{ResultExt, Snafu};
use url::Url;

use crate::http::{HttpClient, HttpError};

/// Errors raised while loading the static schema.
#[derive(Debug, Snafu)]
pub enum SchemaLoadError {
    /// The schema file could not be read.
    #[snafu(display("Failed to read schema file {}: {}", path.display(), source))]
    ReadFile {
        /// The file that was read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
    /// A `file://` URI does not name a local path.
    #[snafu(display("Schema URI {} does not refer to a local file", uri))]
    InvalidFileUri {
        /// The rejected URI.
        uri: Url,
    },
    /// The schema could not be fetched over HTTP.
    #[snafu(display("Failed to fetch schema from {}: {}", uri, source))]
    Fetch {
        /// The requested URL.
        uri: Url,
        /// The underlying HTTP error.
        source: HttpError,
    },
    /// The response body could not be read.
    #[snafu(display("Failed to read schema response from {}: {}", uri, source))]
    ReadBody {
        /// The requested URL.
        uri: Url,
        /// The underlying error.
        source: reqwest::Error,
    },
    /// The server answered with a non-success status.
    #[snafu(display("Schema request to {} returned HTTP {}", uri, status))]
    UnexpectedStatus {
        /// The requested URL.
        uri: Url,
        /// The status returned.
        status: reqwest::StatusCode,
    },
    /// The schema text is not a valid Avro schema.
    #[snafu(display("Failed to parse Avro schema from {}: {}", uri, source))]
    Parse {
        /// Where the schema was loaded from.
        uri: String,
        /// The underlying Avro error.
        source: apache_avro::Error,
    },
}

/// Loads and parses the Avro schema referenced by `uri`.
///
/// `http://` and `https://` URLs are fetched, `file://` URLs and anything else are read from
/// the local filesystem. HTTP requests give up after `timeout`.
pub async fn load_schema(uri: &str, timeout: Duration) -> Result<Schema, SchemaLoadError> {
    let text = read_schema_text(uri, timeout).await?;
    let schema = Schema::parse_str(&text).context(ParseSnafu { uri })?;

    debug!(message = "Loaded Avro schema.", schema_uri = %uri);

    Ok(schema)
}

async fn read_schema_text(uri: &str, timeout: Duration) -> Result<String, SchemaLoadError> {
    match Url::parse(uri) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => fetch(url, timeout).await,
        Ok(url) if url.scheme() == "file" => {
            let path = url
                .to_file_path()
                .map_err(|()| InvalidFileUriSnafu { uri: url.clone() }.build())?;
            read_file(path).await
        }
        // Relative paths and bare absolute paths do not parse as URLs.
        _ => read_file(PathBuf::from(uri)).await,
    }
}

async fn read_file(path: PathBuf) -> Result<String, SchemaLoadError> {
    tokio::fs::read_to_string(&path)
        .await
        .context(ReadFileSnafu { path })
}

async fn fetch(uri: Url, timeout: Duration) -> Result<String, SchemaLoadError> {
    let client = HttpClient::new(timeout).context(FetchSnafu { uri: uri.clone() })?;
    let response = client
        .send(client.get(uri.clone()))
        .await
        .context(FetchSnafu { uri: uri.clone() })?;

    let status = response.status();
    if !status.is_success() {
        return UnexpectedStatusSnafu { uri, status }.fail();
    }

    response.text().await.context(ReadBodySnafu { uri })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use wiremock::{Mock, MockServer, ResponseTemplate, matchers};

    use super::*;
    use crate::test_util::TEST_SCHEMA;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn schema_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn loads_from_path() {
        let file = schema_file(TEST_SCHEMA);

        let schema = load_schema(file.path().to_str().unwrap(), TIMEOUT)
            .await
            .unwrap();

        assert_eq!(schema, Schema::parse_str(TEST_SCHEMA).unwrap());
    }

    #[tokio::test]
    async fn loads_from_file_url() {
        let file = schema_file(TEST_SCHEMA);
        let url = Url::from_file_path(file.path()).unwrap();

        let schema = load_schema(url.as_str(), TIMEOUT).await.unwrap();

        assert_eq!(schema, Schema::parse_str(TEST_SCHEMA).unwrap());
    }

    #[tokio::test]
    async fn loads_from_http() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("GET"))
            .and(matchers::path("/schemas/test.avsc"))
            .respond_with(ResponseTemplate::new(200).set_body_string(TEST_SCHEMA))
            .expect(1)
            .mount(&server)
            .await;

        let uri = format!("{}/schemas/test.avsc", server.uri());
        let schema = load_schema(&uri, TIMEOUT).await.unwrap();

        assert_eq!(schema, Schema::parse_str(TEST_SCHEMA).unwrap());
    }

    #[tokio::test]
    async fn http_error_status_fails() {
        let server = MockServer::start().await;
        Mock::given(matchers::any())
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let uri = format!("{}/missing.avsc", server.uri());
        let error = load_schema(&uri, TIMEOUT).await.unwrap_err();

        assert!(
            matches!(error, SchemaLoadError::UnexpectedStatus { status, .. } if status == 404),
            "{error}"
        );
    }

    #[tokio::test]
    async fn missing_file_fails() {
        let error = load_schema("/definitely/not/here.avsc", TIMEOUT)
            .await
            .unwrap_err();

        assert!(matches!(error, SchemaLoadError::ReadFile { .. }), "{error}");
    }

    #[tokio::test]
    async fn invalid_schema_fails() {
        let file = schema_file(r#"{"type": "record", "name": "Broken"}"#);

        let error = load_schema(file.path().to_str().unwrap(), TIMEOUT)
            .await
            .unwrap_err();

        assert!(matches!(error, SchemaLoadError::Parse { .. }), "{error}");
    }
}

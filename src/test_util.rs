use std::{
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    record::{Record, Value},
    registry::{RegistryError, SchemaRegistry},
};

pub(crate) const TEST_SCHEMA: &str = r#"
{
    "type": "record",
    "name": "Test",
    "fields": [
        {"name": "foo", "type": ["null", "string"]},
        {"name": "bar", "type": "int"}
    ]
}
"#;

/// `{foo: "hello", bar: 10}`
pub(crate) fn hello_record() -> Record {
    Record::from_iter([("foo", Value::from("hello")), ("bar", Value::from(10))])
}

/// `{foo: "hi", bar: 1}`
pub(crate) fn hi_record() -> Record {
    Record::from_iter([("foo", Value::from("hi")), ("bar", Value::from(1))])
}

/// Serves a fixed schema for every ID and records each request.
#[derive(Debug)]
pub(crate) struct MockRegistry {
    schema: Option<String>,
    delay: Option<Duration>,
    pub(crate) calls: AtomicUsize,
    requested: Mutex<Vec<u32>>,
}

impl MockRegistry {
    pub(crate) fn new(schema: &str) -> Self {
        Self {
            schema: Some(schema.to_owned()),
            delay: None,
            calls: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
        }
    }

    /// A registry that knows no schemas.
    pub(crate) fn missing() -> Self {
        Self {
            schema: None,
            ..Self::new("")
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn requested(&self) -> Vec<u32> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl SchemaRegistry for MockRegistry {
    async fn schema(&self, id: u32) -> Result<String, RegistryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().push(id);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.schema
            .clone()
            .ok_or(RegistryError::NotFound { id })
    }
}

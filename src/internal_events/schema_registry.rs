use std::time::Duration;

use metrics::{counter, histogram};

use super::{InternalEvent, error_stage, error_type};
use crate::schema::ResolveError;

#[derive(Debug)]
pub(crate) struct SchemaCacheMiss {
    pub(crate) id: u32,
}

impl InternalEvent for SchemaCacheMiss {
    fn emit(self) {
        debug!(
            message = "Schema not cached, fetching from registry.",
            schema_id = self.id,
        );
        counter!("schema_cache_misses_total").increment(1);
    }
}

#[derive(Debug)]
pub(crate) struct SchemaRegistryFetched {
    pub(crate) id: u32,
    pub(crate) elapsed: Duration,
}

impl InternalEvent for SchemaRegistryFetched {
    fn emit(self) {
        debug!(
            message = "Fetched schema from registry.",
            schema_id = self.id,
            elapsed = ?self.elapsed,
        );
        counter!("schema_registry_requests_total", "status" => "success").increment(1);
        histogram!("schema_registry_request_duration_seconds").record(self.elapsed.as_secs_f64());
    }
}

#[derive(Debug)]
pub(crate) struct SchemaRegistryFetchError<'a> {
    pub(crate) id: u32,
    pub(crate) error: &'a ResolveError,
    pub(crate) elapsed: Duration,
}

impl InternalEvent for SchemaRegistryFetchError<'_> {
    fn emit(self) {
        let error_type = match self.error {
            ResolveError::Timeout { .. } => error_type::TIMED_OUT,
            _ => error_type::REQUEST_FAILED,
        };
        error!(
            message = "Failed fetching schema from registry.",
            schema_id = self.id,
            error = %self.error,
            error_code = "schema_registry_fetch",
            error_type,
            stage = error_stage::RECEIVING,
        );
        counter!(
            "component_errors_total",
            "error_code" => "schema_registry_fetch",
            "error_type" => error_type,
            "stage" => error_stage::RECEIVING,
        )
        .increment(1);
        counter!("schema_registry_requests_total", "status" => "error").increment(1);
        histogram!("schema_registry_request_duration_seconds").record(self.elapsed.as_secs_f64());
    }
}

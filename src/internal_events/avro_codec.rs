use metrics::counter;

use super::{InternalEvent, error_stage, error_type};
use crate::codec::CodecError;

#[derive(Debug)]
pub(crate) struct AvroDecodeError<'a> {
    pub(crate) error: &'a CodecError,
}

impl InternalEvent for AvroDecodeError<'_> {
    fn emit(self) {
        let error_code = self.error.error_code();
        error!(
            message = "Failed decoding Avro message.",
            error = %self.error,
            error_code,
            error_type = error_type::PARSER_FAILED,
            stage = error_stage::PROCESSING,
        );
        counter!(
            "component_errors_total",
            "error_code" => error_code,
            "error_type" => error_type::PARSER_FAILED,
            "stage" => error_stage::PROCESSING,
        )
        .increment(1);
    }
}

#[derive(Debug)]
pub(crate) struct AvroEncodeError<'a> {
    pub(crate) error: &'a CodecError,
}

impl InternalEvent for AvroEncodeError<'_> {
    fn emit(self) {
        let error_code = self.error.error_code();
        error!(
            message = "Failed encoding record as Avro.",
            error = %self.error,
            error_code,
            error_type = error_type::ENCODER_FAILED,
            stage = error_stage::SENDING,
        );
        counter!(
            "component_errors_total",
            "error_code" => error_code,
            "error_type" => error_type::ENCODER_FAILED,
            "stage" => error_stage::SENDING,
        )
        .increment(1);
    }
}

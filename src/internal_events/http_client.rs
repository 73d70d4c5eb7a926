use std::time::Duration;

use metrics::{counter, histogram};
use reqwest::{Request, Response};

use super::{InternalEvent, error_stage, error_type, prelude::http_error_code};

#[derive(Debug)]
pub(crate) struct AboutToSendHttpRequest<'a> {
    pub(crate) request: &'a Request,
}

impl InternalEvent for AboutToSendHttpRequest<'_> {
    fn emit(self) {
        debug!(
            message = "Sending HTTP request.",
            uri = %self.request.url(),
            method = %self.request.method(),
            headers = ?self.request.headers().keys().collect::<Vec<_>>(),
        );
        counter!("http_client_requests_sent_total", "method" => self.request.method().to_string())
            .increment(1);
    }
}

#[derive(Debug)]
pub(crate) struct GotHttpResponse<'a> {
    pub(crate) response: &'a Response,
    pub(crate) roundtrip: Duration,
}

impl InternalEvent for GotHttpResponse<'_> {
    fn emit(self) {
        let status = self.response.status();
        debug!(
            message = "HTTP response.",
            status = %status,
            version = ?self.response.version(),
            content_length = ?self.response.content_length(),
        );
        counter!("http_client_responses_total", "status" => status.as_str().to_owned())
            .increment(1);
        histogram!("http_client_rtt_seconds").record(self.roundtrip.as_secs_f64());

        if !status.is_success() {
            counter!(
                "component_errors_total",
                "error_code" => http_error_code(status.as_u16()),
                "error_type" => error_type::REQUEST_FAILED,
                "stage" => error_stage::RECEIVING,
            )
            .increment(1);
        }
    }
}

#[derive(Debug)]
pub(crate) struct GotHttpError<'a> {
    pub(crate) error: &'a reqwest::Error,
    pub(crate) roundtrip: Duration,
}

impl InternalEvent for GotHttpError<'_> {
    fn emit(self) {
        let error_type = if self.error.is_timeout() {
            error_type::TIMED_OUT
        } else {
            error_type::REQUEST_FAILED
        };
        error!(
            message = "HTTP error.",
            error = %self.error,
            error_type,
            stage = error_stage::RECEIVING,
        );
        counter!("http_client_errors_total", "error_type" => error_type).increment(1);
        histogram!("http_client_rtt_seconds").record(self.roundtrip.as_secs_f64());
    }
}

pub(crate) mod error_stage {
    pub(crate) const PROCESSING: &str = "processing";
    pub(crate) const RECEIVING: &str = "receiving";
    pub(crate) const SENDING: &str = "sending";
}

pub(crate) mod error_type {
    pub(crate) const ENCODER_FAILED: &str = "encoder_failed";
    pub(crate) const PARSER_FAILED: &str = "parser_failed";
    pub(crate) const REQUEST_FAILED: &str = "request_failed";
    pub(crate) const TIMED_OUT: &str = "timed_out";
}

pub(crate) fn http_error_code(code: u16) -> String {
    format!("http_response_{code}")
}

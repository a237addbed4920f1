//! Fuzz testing for request-derived inputs.
//!
//! Everything here parses bytes a client controls: stats file names from
//! the URL, the `Cookie` header and the `X-Forwarded-For` header. None of
//! them may panic on any input.
//!
//! # Running the Fuzz Tests
//!
//! ```bash
//! cargo +nightly install cargo-fuzz
//! cargo +nightly fuzz run fuzz_request_inputs -- -max_total_time=60
//! ```

#![no_main]

use axum::http::{HeaderMap, HeaderValue};
use clearsky_ui_server::middleware::client_ip_from_parts;
use clearsky_ui_server::middleware::session::session_from_cookies;
use clearsky_ui_server::validation::validate_file_name;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Accepted names never escape the directory
        if validate_file_name(s).is_ok() {
            assert!(!s.contains('/') && !s.contains('\\') && !s.starts_with('.'));
        }
    }

    if let Ok(value) = HeaderValue::from_bytes(data) {
        let mut headers = HeaderMap::new();
        headers.insert("cookie", value.clone());
        headers.insert("x-forwarded-for", value);

        if let Some(number) = session_from_cookies(&headers) {
            assert_eq!(number.as_str().len(), 32);
        }
        let _ = client_ip_from_parts(&headers, None);
    }
});

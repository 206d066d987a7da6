use std::error::Error;
use std::sync::OnceLock;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use core_executor::{ExecutionOutcome, LatencyListener};
use url::Url;

use crate::diagnostics::full_message;

pub const RESPONSE_CODE_OK: &str = "200";
pub const RESPONSE_MESSAGE_OK: &str = "OK";
pub const RESPONSE_CODE_FAILED: &str = "000";
pub const CONTENT_TYPE: &str = "text/plain";
pub const DATA_ENCODING: &str = "UTF-8";

const NO_MESSAGE: &str = "NO MESSAGE";

/// Measurements and response of one sampler run, as reported to the harness.
#[derive(Debug)]
pub struct SampleResult {
    pub label: String,
    pub sampler_data: String,
    pub content_type: &'static str,
    pub data_encoding: &'static str,
    pub successful: bool,
    pub response_code: String,
    pub response_message: String,
    pub response_data: Bytes,
    pub response_headers: String,
    pub url: Option<Url>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    connect_time: Option<DateTime<Utc>>,
    latency_time: OnceLock<DateTime<Utc>>,
}

impl SampleResult {
    #[must_use]
    pub fn start(label: impl Into<String>, sampler_data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            sampler_data: sampler_data.into(),
            content_type: CONTENT_TYPE,
            data_encoding: DATA_ENCODING,
            successful: false,
            response_code: String::new(),
            response_message: String::new(),
            response_data: Bytes::new(),
            response_headers: String::new(),
            url: None,
            start_time: Utc::now(),
            end_time: None,
            connect_time: None,
            latency_time: OnceLock::new(),
        }
    }

    pub fn connect_end(&mut self) {
        self.connect_time.get_or_insert_with(Utc::now);
    }

    pub fn sample_end(&mut self) {
        self.end_time.get_or_insert_with(Utc::now);
    }

    pub fn succeed(&mut self, outcome: &ExecutionOutcome, headers: String) {
        self.successful = true;
        self.response_code = RESPONSE_CODE_OK.to_string();
        self.response_message = RESPONSE_MESSAGE_OK.to_string();
        self.response_data = outcome.data.clone();
        self.response_headers = headers;
        self.url = outcome.info_url().ok();
    }

    /// Marks the sample failed: the message holds the whole cause chain and
    /// the data holds the top-level message.
    pub fn fail(&mut self, err: &(dyn Error + 'static)) {
        self.successful = false;
        self.response_code = RESPONSE_CODE_FAILED.to_string();
        self.response_message = full_message(err);
        let message = err.to_string();
        self.response_data = if message.is_empty() {
            Bytes::from_static(NO_MESSAGE.as_bytes())
        } else {
            Bytes::from(message)
        };
    }

    #[must_use]
    pub fn elapsed_ms(&self) -> Option<i64> {
        self.end_time.map(|end| self.millis_since_start(end))
    }

    #[must_use]
    pub fn latency_ms(&self) -> Option<i64> {
        self.latency_time
            .get()
            .map(|latency| self.millis_since_start(*latency))
    }

    #[must_use]
    pub fn connect_ms(&self) -> Option<i64> {
        self.connect_time
            .map(|connect| self.millis_since_start(connect))
    }

    fn millis_since_start(&self, at: DateTime<Utc>) -> i64 {
        at.signed_duration_since(self.start_time).num_milliseconds()
    }
}

impl LatencyListener for SampleResult {
    fn latency_end(&self) {
        let _ = self.latency_time.set(Utc::now());
    }
}

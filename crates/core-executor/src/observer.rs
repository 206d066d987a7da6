use std::sync::atomic::{AtomicU32, Ordering};

use crate::session::{StatusCode, TransportError};

/// Receives the terminal event of a retried call.
#[cfg_attr(test, mockall::automock)]
pub trait RetryObserver: Send + Sync {
    fn on_success(&self, retries: u32, elapsed_ms: u64);

    fn on_cancel(&self, retries: u32, elapsed_ms: u64);

    fn on_limit(&self, code: StatusCode, retry_limit: u32, elapsed_ms: u64);

    fn on_error(&self, code: StatusCode, retries: u32, elapsed_ms: u64);

    /// A client-side failure that carries no status code.
    fn on_issue(&self, issue: &TransportError, retries: u32, elapsed_ms: u64);
}

/// Logs retry outcomes and keeps the final retry count of one invocation.
#[derive(Debug)]
pub struct RetryTracker {
    query_id: String,
    retries: AtomicU32,
}

impl RetryTracker {
    #[must_use]
    pub fn new(query_id: impl Into<String>) -> Self {
        Self {
            query_id: query_id.into(),
            retries: AtomicU32::new(0),
        }
    }

    #[must_use]
    pub fn query_id(&self) -> &str {
        &self.query_id
    }

    #[must_use]
    pub fn retries(&self) -> u32 {
        self.retries.load(Ordering::Acquire)
    }

    fn record(&self, retries: u32) {
        self.retries.store(retries, Ordering::Release);
    }
}

impl RetryObserver for RetryTracker {
    fn on_success(&self, retries: u32, elapsed_ms: u64) {
        self.record(retries);
        if retries > 0 {
            tracing::info!(
                query_id = %self.query_id,
                retries,
                elapsed_ms,
                "Query succeeded after retries"
            );
        }
    }

    fn on_cancel(&self, retries: u32, elapsed_ms: u64) {
        self.record(retries);
        tracing::warn!(query_id = %self.query_id, retries, elapsed_ms, "Query cancelled");
    }

    fn on_limit(&self, code: StatusCode, retry_limit: u32, elapsed_ms: u64) {
        self.record(retry_limit);
        tracing::warn!(
            query_id = %self.query_id,
            %code,
            retry_limit,
            elapsed_ms,
            "Query retry limit exceeded"
        );
    }

    fn on_error(&self, code: StatusCode, retries: u32, elapsed_ms: u64) {
        self.record(retries);
        tracing::warn!(
            query_id = %self.query_id,
            %code,
            retries,
            elapsed_ms,
            "Query failed with non-retryable status"
        );
    }

    fn on_issue(&self, issue: &TransportError, retries: u32, elapsed_ms: u64) {
        self.record(retries);
        tracing::warn!(
            query_id = %self.query_id,
            error = %issue,
            retries,
            elapsed_ms,
            "Query failed with client error"
        );
    }
}

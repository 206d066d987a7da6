pub mod retry;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use core_values::{Scalar, Value, ValueKind};

use crate::models::{Column, ResultChunk, Row};
use crate::query::{LatencyListener, QueryDispatcher};
use crate::retry::{Backoff, RetryPolicy, SessionRetryContext};
use crate::session::{MockSession, MockSessionProvider, Session};
use crate::utils::Config;

pub const NO_BACKOFF: Backoff = Backoff {
    base_ms: 0,
    factor: 2.0,
    jitter: 0.0,
    cap_ms: 0,
};

pub fn no_backoff_policy() -> RetryPolicy {
    RetryPolicy::default().with_backoff(NO_BACKOFF, NO_BACKOFF)
}

/// A provider that always hands out the same mocked session.
pub fn provider_for(session: MockSession) -> MockSessionProvider {
    let session: Arc<dyn Session> = Arc::new(session);
    let mut provider = MockSessionProvider::new();
    provider
        .expect_acquire()
        .returning(move || Ok(Arc::clone(&session)));
    provider
}

pub fn retry_context(session: MockSession, policy: RetryPolicy) -> Arc<SessionRetryContext> {
    Arc::new(SessionRetryContext::new(
        Arc::new(provider_for(session)),
        policy,
    ))
}

pub fn dispatcher(session: MockSession) -> QueryDispatcher {
    QueryDispatcher::new(
        retry_context(session, no_backoff_policy()),
        Arc::new(Config::default()),
    )
}

/// Rows `(id, name)` with ids `first..first + count`.
pub fn id_chunk(first: i64, count: i64) -> ResultChunk {
    let rows = (first..first + count)
        .map(|id| {
            Row::new(vec![
                Value::Scalar(Scalar::Int64(id)),
                Value::Scalar(Scalar::Text(format!("name-{id}"))),
            ])
        })
        .collect();
    ResultChunk::new(
        vec![
            Column::new("id", ValueKind::Int64),
            Column::new("name", ValueKind::Text),
        ],
        rows,
    )
}

#[derive(Debug, Default)]
pub struct CountingListener {
    calls: AtomicUsize,
}

impl CountingListener {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LatencyListener for CountingListener {
    fn latency_end(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

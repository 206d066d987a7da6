use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::StreamExt;
use futures::stream;
use mockall::predicate::{always, eq};
use tokio_util::sync::CancellationToken;

use super::{id_chunk, no_backoff_policy, provider_for, retry_context};
use crate::observer::MockRetryObserver;
use crate::retry::{Backoff, RetryError, SessionRetryContext};
use crate::session::{MockSession, MockSessionProvider, Session, StatusCode, TransportError};

fn failure(code: StatusCode) -> TransportError {
    TransportError::status(code)
}

#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn test_retry_then_success() {
    let context = retry_context(MockSession::new(), no_backoff_policy());
    let mut observer = MockRetryObserver::new();
    observer
        .expect_on_success()
        .with(eq(2), always())
        .times(1)
        .return_const(());

    let calls = AtomicUsize::new(0);
    let value = context
        .supply_result(&observer, |_session| {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(failure(StatusCode::Unavailable))
                } else {
                    Ok(42)
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(value, 42);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_retry_limit() {
    let context = retry_context(
        MockSession::new(),
        no_backoff_policy().with_max_retries(3),
    );
    let mut observer = MockRetryObserver::new();
    observer
        .expect_on_limit()
        .with(eq(StatusCode::Overloaded), eq(3), always())
        .times(1)
        .return_const(());

    let calls = AtomicUsize::new(0);
    let err = context
        .supply_status(&observer, |_session| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(failure(StatusCode::Overloaded)) }
        })
        .await
        .unwrap_err();

    assert!(matches!(err, RetryError::RetryLimit { retries: 3, .. }));
    assert_eq!(err.status_code(), Some(StatusCode::Overloaded));
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_non_retryable_status() {
    let context = retry_context(MockSession::new(), no_backoff_policy());
    let mut observer = MockRetryObserver::new();
    observer
        .expect_on_error()
        .with(eq(StatusCode::SchemeError), eq(0), always())
        .times(1)
        .return_const(());

    let calls = AtomicUsize::new(0);
    let err = context
        .supply_status(&observer, |_session| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(failure(StatusCode::SchemeError)) }
        })
        .await
        .unwrap_err();

    assert!(matches!(err, RetryError::NonRetryable { retries: 0, .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_undetermined_needs_idempotency() {
    let strict = retry_context(MockSession::new(), no_backoff_policy());
    let mut observer = MockRetryObserver::new();
    observer.expect_on_error().times(1).return_const(());
    let err = strict
        .supply_status(&observer, |_session| async {
            Err(failure(StatusCode::Undetermined))
        })
        .await
        .unwrap_err();
    assert!(matches!(err, RetryError::NonRetryable { .. }));

    let idempotent = retry_context(
        MockSession::new(),
        no_backoff_policy().with_idempotent(true),
    );
    let mut observer = MockRetryObserver::new();
    observer
        .expect_on_success()
        .with(eq(1), always())
        .times(1)
        .return_const(());
    let calls = AtomicUsize::new(0);
    let result = idempotent
        .supply_status(&observer, |_session| {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Err(failure(StatusCode::Undetermined))
                } else {
                    Ok(())
                }
            }
        })
        .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_client_issue_is_not_retried() {
    let context = retry_context(MockSession::new(), no_backoff_policy());
    let mut observer = MockRetryObserver::new();
    observer
        .expect_on_issue()
        .with(always(), eq(0), always())
        .times(1)
        .return_const(());

    let err = context
        .supply_status(&observer, |_session| async {
            Err(TransportError::Client {
                message: "connection reset".to_string(),
                source: "broken pipe".into(),
            })
        })
        .await
        .unwrap_err();

    assert!(matches!(err, RetryError::NonRetryable { .. }));
    assert_eq!(err.status_code(), None);
}

#[tokio::test]
async fn test_cancelled_before_first_attempt() {
    let token = CancellationToken::new();
    token.cancel();
    let context = SessionRetryContext::new(
        Arc::new(MockSessionProvider::new()),
        no_backoff_policy(),
    )
    .with_cancellation(token);
    let mut observer = MockRetryObserver::new();
    observer
        .expect_on_cancel()
        .with(eq(0), always())
        .times(1)
        .return_const(());

    let err = context
        .supply_status(&observer, |_session| async { Ok(()) })
        .await
        .unwrap_err();
    assert!(matches!(err, RetryError::Cancelled { retries: 0 }));
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_during_backoff() {
    let slow = Backoff {
        base_ms: 60_000,
        factor: 2.0,
        jitter: 0.0,
        cap_ms: 60_000,
    };
    let context = retry_context(
        MockSession::new(),
        no_backoff_policy().with_backoff(slow, slow),
    );
    let token = context.cancellation().clone();
    let mut observer = MockRetryObserver::new();
    observer
        .expect_on_cancel()
        .with(eq(1), always())
        .times(1)
        .return_const(());

    let err = context
        .supply_status(&observer, |_session| {
            token.cancel();
            async { Err(failure(StatusCode::Unavailable)) }
        })
        .await
        .unwrap_err();
    assert!(matches!(err, RetryError::Cancelled { retries: 1 }));
}

#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn test_acquire_failure_is_retried() {
    let session: Arc<dyn Session> = Arc::new(MockSession::new());
    let mut provider = MockSessionProvider::new();
    let mut calls = 0;
    provider.expect_acquire().times(2).returning(move || {
        calls += 1;
        if calls == 1 {
            Err(failure(StatusCode::BadSession))
        } else {
            Ok(Arc::clone(&session))
        }
    });
    let context = SessionRetryContext::new(Arc::new(provider), no_backoff_policy());
    let mut observer = MockRetryObserver::new();
    observer
        .expect_on_success()
        .with(eq(1), always())
        .times(1)
        .return_const(());

    let value = context
        .supply_result(&observer, |_session| async { Ok("done") })
        .await
        .unwrap();
    assert_eq!(value, "done");
}

#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn test_stream_fold_breaks_early() {
    let mut session = MockSession::new();
    session.expect_execute_scan_query().times(1).returning(|_, _, _| {
        stream::iter(vec![
            Ok(id_chunk(1, 1)),
            Ok(id_chunk(2, 1)),
            Err(failure(StatusCode::InternalError)),
        ])
        .boxed()
    });
    let context = SessionRetryContext::new(Arc::new(provider_for(session)), no_backoff_policy());
    let mut observer = MockRetryObserver::new();
    observer.expect_on_success().times(1).return_const(());

    let params = crate::params::Params::new();
    let settings =
        crate::session::ScanSettings::from_timeout_secs(0, std::time::Duration::from_secs(1));
    let seen = context
        .supply_stream(
            &observer,
            |session| session.execute_scan_query("SELECT 1", &params, &settings),
            Vec::new,
            |seen: &mut Vec<u64>, chunk| {
                seen.push(chunk.row_count());
                if seen.len() == 2 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            },
        )
        .await
        .unwrap();
    assert_eq!(seen, vec![1, 1]);
}

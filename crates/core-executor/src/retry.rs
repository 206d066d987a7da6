use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use rand::Rng;
use snafu::IntoError;
use snafu::prelude::*;
use strum::IntoStaticStr;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::models::ResultChunk;
use crate::observer::RetryObserver;
use crate::session::{BackoffKind, ChunkStream, Session, SessionProvider, StatusCode, TransportError};

pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// Exponential backoff with jitter, capped at `cap_ms`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub base_ms: u64,
    pub factor: f64,
    pub jitter: f64,
    pub cap_ms: u64,
}

impl Backoff {
    pub const FAST: Self = Self {
        base_ms: 5,
        factor: 2.0,
        jitter: 0.5,
        cap_ms: 500,
    };

    pub const SLOW: Self = Self {
        base_ms: 50,
        factor: 2.0,
        jitter: 0.5,
        cap_ms: 5_000,
    };

    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 || self.base_ms == 0 {
            return Duration::ZERO;
        }
        let exp = f64::from(attempt - 1);
        let mut delay = (self.base_ms as f64 * self.factor.powf(exp)).min(self.cap_ms as f64);
        let jitter = self.jitter.clamp(0.0, 1.0);
        if jitter > 0.0 {
            delay *= 1.0 + rand::thread_rng().gen_range(-jitter..jitter);
        }
        Duration::from_millis(delay.max(0.0).round() as u64)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Allows retrying calls whose outcome is unknown.
    pub idempotent: bool,
    pub fast: Backoff,
    pub slow: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            idempotent: false,
            fast: Backoff::FAST,
            slow: Backoff::SLOW,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub const fn with_idempotent(mut self, idempotent: bool) -> Self {
        self.idempotent = idempotent;
        self
    }

    #[must_use]
    pub const fn with_backoff(mut self, fast: Backoff, slow: Backoff) -> Self {
        self.fast = fast;
        self.slow = slow;
        self
    }

    #[must_use]
    pub const fn backoff_for(&self, code: StatusCode) -> &Backoff {
        match code.backoff() {
            BackoffKind::Fast => &self.fast,
            BackoffKind::Slow => &self.slow,
        }
    }
}

#[derive(Debug, Snafu, IntoStaticStr)]
#[snafu(visibility(pub(crate)))]
pub enum RetryError {
    #[snafu(display("Non-retryable failure after {retries} retries: {source}"))]
    NonRetryable {
        retries: u32,
        source: TransportError,
    },

    #[snafu(display("Retry limit exceeded after {retries} retries: {source}"))]
    RetryLimit {
        retries: u32,
        source: TransportError,
    },

    #[snafu(display("Operation cancelled after {retries} retries"))]
    Cancelled { retries: u32 },
}

impl RetryError {
    #[must_use]
    pub const fn retries(&self) -> u32 {
        match self {
            Self::NonRetryable { retries, .. }
            | Self::RetryLimit { retries, .. }
            | Self::Cancelled { retries } => *retries,
        }
    }

    #[must_use]
    pub const fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::NonRetryable { source, .. } | Self::RetryLimit { source, .. } => {
                source.status_code()
            }
            Self::Cancelled { .. } => None,
        }
    }
}

/// Book-keeping for the attempts of one retried call.
struct Attempts<'a> {
    policy: &'a RetryPolicy,
    observer: &'a dyn RetryObserver,
    started: Instant,
    retries: u32,
}

impl<'a> Attempts<'a> {
    fn new(policy: &'a RetryPolicy, observer: &'a dyn RetryObserver) -> Self {
        Self {
            policy,
            observer,
            started: Instant::now(),
            retries: 0,
        }
    }

    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn succeeded(&self) {
        self.observer.on_success(self.retries, self.elapsed_ms());
    }

    fn cancelled(&self) -> RetryError {
        self.observer.on_cancel(self.retries, self.elapsed_ms());
        CancelledSnafu {
            retries: self.retries,
        }
        .build()
    }

    /// Sleeps before the next attempt, or gives up with the final error.
    async fn recover(
        &mut self,
        err: TransportError,
        cancel: &CancellationToken,
    ) -> Result<(), RetryError> {
        let elapsed_ms = self.elapsed_ms();
        let Some(code) = err.status_code() else {
            self.observer.on_issue(&err, self.retries, elapsed_ms);
            return Err(NonRetryableSnafu { retries: self.retries }.into_error(err));
        };
        if !code.is_retryable(self.policy.idempotent) {
            self.observer.on_error(code, self.retries, elapsed_ms);
            return Err(NonRetryableSnafu { retries: self.retries }.into_error(err));
        }
        if self.retries >= self.policy.max_retries {
            self.observer
                .on_limit(code, self.policy.max_retries, elapsed_ms);
            return Err(RetryLimitSnafu { retries: self.retries }.into_error(err));
        }

        self.retries += 1;
        let delay = self.policy.backoff_for(code).delay(self.retries);
        tracing::debug!(%code, retries = self.retries, ?delay, "Retrying YDB call");
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(self.cancelled()),
            () = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

/// Runs operations on pooled sessions, retrying them per [`RetryPolicy`].
pub struct SessionRetryContext {
    provider: Arc<dyn SessionProvider>,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl SessionRetryContext {
    pub fn new(provider: Arc<dyn SessionProvider>, policy: RetryPolicy) -> Self {
        Self {
            provider,
            policy,
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub async fn supply_result<T, F, Fut>(
        &self,
        observer: &dyn RetryObserver,
        op: F,
    ) -> Result<T, RetryError>
    where
        F: Fn(Arc<dyn Session>) -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let mut attempts = Attempts::new(&self.policy, observer);
        loop {
            let outcome = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(attempts.cancelled()),
                outcome = self.attempt(&op) => outcome,
            };
            match outcome {
                Ok(value) => {
                    attempts.succeeded();
                    return Ok(value);
                }
                Err(err) => attempts.recover(err, &self.cancel).await?,
            }
        }
    }

    pub async fn supply_status<F, Fut>(
        &self,
        observer: &dyn RetryObserver,
        op: F,
    ) -> Result<(), RetryError>
    where
        F: Fn(Arc<dyn Session>) -> Fut,
        Fut: Future<Output = Result<(), TransportError>>,
    {
        self.supply_result(observer, op).await
    }

    /// Folds a server stream into an accumulator created by `init`.
    ///
    /// Every attempt starts from a fresh accumulator, so chunks delivered by a
    /// failed attempt never leak into the result. `step` may stop the stream
    /// early by returning [`ControlFlow::Break`], which counts as success.
    pub async fn supply_stream<A, F, I, S>(
        &self,
        observer: &dyn RetryObserver,
        open: F,
        init: I,
        mut step: S,
    ) -> Result<A, RetryError>
    where
        F: Fn(&dyn Session) -> ChunkStream,
        I: Fn() -> A,
        S: FnMut(&mut A, ResultChunk) -> ControlFlow<()>,
    {
        let mut attempts = Attempts::new(&self.policy, observer);
        loop {
            let mut acc = init();
            let outcome = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(attempts.cancelled()),
                outcome = self.fold(&open, &mut acc, &mut step) => outcome,
            };
            match outcome {
                Ok(()) => {
                    attempts.succeeded();
                    return Ok(acc);
                }
                Err(err) => attempts.recover(err, &self.cancel).await?,
            }
        }
    }

    async fn attempt<T, F, Fut>(&self, op: &F) -> Result<T, TransportError>
    where
        F: Fn(Arc<dyn Session>) -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let session = self.provider.acquire().await?;
        op(session).await
    }

    async fn fold<A, F, S>(&self, open: &F, acc: &mut A, step: &mut S) -> Result<(), TransportError>
    where
        F: Fn(&dyn Session) -> ChunkStream,
        S: FnMut(&mut A, ResultChunk) -> ControlFlow<()>,
    {
        let session = self.provider.acquire().await?;
        let mut stream = open(session.as_ref());
        while let Some(chunk) = stream.next().await {
            if step(acc, chunk?).is_break() {
                tracing::debug!("Stream consumer stopped early");
                break;
            }
        }
        Ok(())
    }
}

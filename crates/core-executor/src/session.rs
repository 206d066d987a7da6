use std::fmt::{self, Display};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use snafu::prelude::*;
use strum::{Display as StrumDisplay, IntoStaticStr};

use crate::models::{DataQueryResult, ResultChunk};
use crate::params::Params;
use crate::tx::TxControl;

/// Server or client status attached to a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay, IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    Success,
    BadRequest,
    Unauthorized,
    InternalError,
    Aborted,
    Unavailable,
    Overloaded,
    SchemeError,
    GenericError,
    Timeout,
    BadSession,
    PreconditionFailed,
    AlreadyExists,
    NotFound,
    SessionExpired,
    Cancelled,
    Undetermined,
    Unsupported,
    SessionBusy,
    TransportUnavailable,
    ClientResourceExhausted,
    ClientDeadlineExceeded,
    ClientInternalError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffKind {
    Fast,
    Slow,
}

impl StatusCode {
    /// Whether a call that failed with this code may be attempted again.
    /// Codes that leave the outcome unknown are only retried for idempotent work.
    #[must_use]
    pub const fn is_retryable(self, idempotent: bool) -> bool {
        match self {
            Self::Aborted
            | Self::Unavailable
            | Self::Overloaded
            | Self::BadSession
            | Self::SessionBusy
            | Self::SessionExpired
            | Self::ClientResourceExhausted => true,
            Self::Undetermined | Self::TransportUnavailable | Self::ClientDeadlineExceeded => {
                idempotent
            }
            _ => false,
        }
    }

    #[must_use]
    pub const fn backoff(self) -> BackoffKind {
        match self {
            Self::Overloaded | Self::ClientResourceExhausted => BackoffKind::Slow,
            _ => BackoffKind::Fast,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub code: StatusCode,
    pub issues: Vec<String>,
}

impl Status {
    #[must_use]
    pub const fn new(code: StatusCode) -> Self {
        Self {
            code,
            issues: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_issue(mut self, issue: impl Into<String>) -> Self {
        self.issues.push(issue.into());
        self
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)?;
        if !self.issues.is_empty() {
            write!(f, ": {}", self.issues.join("; "))?;
        }
        Ok(())
    }
}

impl std::error::Error for Status {}

/// Failure reported by the transport for a single call.
#[derive(Debug, Snafu, IntoStaticStr)]
#[snafu(visibility(pub))]
pub enum TransportError {
    #[snafu(display("{status}"))]
    Status { status: Status },

    #[snafu(display("Client error: {message}"))]
    Client {
        message: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl TransportError {
    #[must_use]
    pub const fn status(code: StatusCode) -> Self {
        Self::Status {
            status: Status::new(code),
        }
    }

    #[must_use]
    pub const fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status } => Some(status.code),
            Self::Client { .. } => None,
        }
    }
}

impl From<Status> for TransportError {
    fn from(status: Status) -> Self {
        Self::Status { status }
    }
}

/// Per-call limits for data and scheme queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationSettings {
    pub cancel_after: Option<Duration>,
    pub timeout: Option<Duration>,
}

impl OperationSettings {
    /// A positive timeout `T` cancels the operation server-side after `T`
    /// seconds and abandons it client-side one second later.
    #[must_use]
    pub fn from_timeout_secs(secs: u32) -> Self {
        if secs == 0 {
            return Self::default();
        }
        Self {
            cancel_after: Some(Duration::from_secs(u64::from(secs))),
            timeout: Some(Duration::from_secs(u64::from(secs) + 1)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanSettings {
    pub request_timeout: Duration,
}

impl ScanSettings {
    #[must_use]
    pub fn from_timeout_secs(secs: u32, default_timeout: Duration) -> Self {
        let request_timeout = if secs == 0 {
            default_timeout
        } else {
            Duration::from_secs(u64::from(secs))
        };
        Self { request_timeout }
    }
}

pub type ChunkStream = BoxStream<'static, Result<ResultChunk, TransportError>>;

/// A database session able to run the three query protocols.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Session: Send + Sync {
    async fn execute_data_query(
        &self,
        query: &str,
        tx: TxControl,
        params: &Params,
        settings: &OperationSettings,
    ) -> Result<DataQueryResult, TransportError>;

    /// Opens a server stream of result chunks.
    fn execute_scan_query(
        &self,
        query: &str,
        params: &Params,
        settings: &ScanSettings,
    ) -> ChunkStream;

    async fn execute_scheme_query(
        &self,
        query: &str,
        settings: &OperationSettings,
    ) -> Result<(), TransportError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn acquire(&self) -> Result<Arc<dyn Session>, TransportError>;
}

pub mod error;
pub mod materializer;
pub mod models;
pub mod observer;
pub mod params;
pub mod query;
pub mod retry;
pub mod session;
pub mod tx;
pub mod utils;

#[cfg(test)]
pub mod tests;

pub use error::{ExecutionError, ExecutionResult};
pub use models::{ExecutionOutcome, QueryKind, QuerySpec, ResultHandling, Variables};
pub use query::{IgnoreLatency, LatencyListener, QueryDispatcher};
pub use retry::{RetryError, RetryPolicy, SessionRetryContext};
pub use session::{Session, SessionProvider, Status, StatusCode, TransportError};
pub use utils::Config;

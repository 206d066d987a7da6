use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use core_values::ConversionRegistry;
use snafu::ResultExt;
use uuid::Uuid;

use crate::error::{self as ex_error, ExecutionResult};
use crate::materializer::{Materialized, Materializer};
use crate::models::{ExecutionOutcome, QueryKind, QuerySpec, Variables};
use crate::observer::RetryTracker;
use crate::params;
use crate::retry::SessionRetryContext;
use crate::session::{OperationSettings, ScanSettings};
use crate::tx;
use crate::utils::Config;

/// Told when the first response byte of a query has arrived.
pub trait LatencyListener: Send + Sync {
    fn latency_end(&self);
}

/// Listener for callers that do not measure latency.
#[derive(Debug, Default, Clone, Copy)]
pub struct IgnoreLatency;

impl LatencyListener for IgnoreLatency {
    fn latency_end(&self) {}
}

struct FirstByte<'a> {
    listener: &'a dyn LatencyListener,
    marked: AtomicBool,
}

impl<'a> FirstByte<'a> {
    fn new(listener: &'a dyn LatencyListener) -> Self {
        Self {
            listener,
            marked: AtomicBool::new(false),
        }
    }

    fn mark(&self) {
        if !self.marked.swap(true, Ordering::AcqRel) {
            self.listener.latency_end();
        }
    }
}

/// Runs a [`QuerySpec`] with the protocol its kind requires.
pub struct QueryDispatcher {
    retry: Arc<SessionRetryContext>,
    registry: &'static ConversionRegistry,
    config: Arc<Config>,
}

impl QueryDispatcher {
    pub fn new(retry: Arc<SessionRetryContext>, config: Arc<Config>) -> Self {
        Self {
            retry,
            registry: ConversionRegistry::global(),
            config,
        }
    }

    /// Executes the query and merges exported variables into `variables`.
    #[tracing::instrument(
        name = "QueryDispatcher::execute",
        level = "debug",
        skip(self, spec, listener, variables),
        fields(kind = %spec.query_kind, query = %spec.query),
        err
    )]
    pub async fn execute(
        &self,
        spec: &QuerySpec,
        listener: &dyn LatencyListener,
        variables: &mut Variables,
    ) -> ExecutionResult<ExecutionOutcome> {
        let tracker = RetryTracker::new(Uuid::new_v4().to_string());
        let first_byte = FirstByte::new(listener);

        let result = match spec.query_kind {
            QueryKind::DataQuery => self.data_query(spec, &tracker, &first_byte).await,
            QueryKind::ScanQuery => self.scan_query(spec, &tracker, &first_byte).await,
            QueryKind::SchemeQuery => self.scheme_query(spec, &tracker, &first_byte).await,
        };
        let materialized = match result {
            Ok(materialized) => materialized,
            Err(err) => {
                if !err.is_configuration() {
                    tracing::warn!(
                        query_id = tracker.query_id(),
                        error = %err,
                        retries = tracker.retries(),
                        "YDB query failed"
                    );
                }
                return Err(err);
            }
        };

        let data = match materialized {
            Some(Materialized {
                text,
                variables: exported,
                ..
            }) => {
                variables.extend(exported);
                Bytes::from(text)
            }
            None => Bytes::new(),
        };
        tracing::debug!(
            query_id = tracker.query_id(),
            retries = tracker.retries(),
            bytes = data.len(),
            "YDB query completed"
        );
        Ok(ExecutionOutcome::new(data, tracker.retries()))
    }

    fn materializer(&self, spec: &QuerySpec) -> Materializer {
        Materializer::new(spec.result_handling, spec.max_rows)
            .with_char_budget(self.config.max_store_chars)
            .with_variable_names(&spec.variable_names)
    }

    async fn data_query(
        &self,
        spec: &QuerySpec,
        tracker: &RetryTracker,
        first_byte: &FirstByte<'_>,
    ) -> ExecutionResult<Option<Materialized>> {
        let params = params::bind(self.registry, &spec.arguments, &spec.argument_types)?;
        let tx = tx::resolve(&spec.tx_mode)?;
        let settings = OperationSettings::from_timeout_secs(spec.timeout_secs);
        let query = spec.query.as_str();
        let params = &params;

        let result = self
            .retry
            .supply_result(tracker, |session| async move {
                session
                    .execute_data_query(query, tx, params, &settings)
                    .await
            })
            .await
            .context(ex_error::QueryExecutionSnafu)?;
        first_byte.mark();

        let mut materializer = self.materializer(spec);
        for result_set in &result.result_sets {
            materializer.push_result_set(result_set);
        }
        Ok(Some(materializer.finish()))
    }

    async fn scan_query(
        &self,
        spec: &QuerySpec,
        tracker: &RetryTracker,
        first_byte: &FirstByte<'_>,
    ) -> ExecutionResult<Option<Materialized>> {
        let params = params::bind(self.registry, &spec.arguments, &spec.argument_types)?;
        let settings =
            ScanSettings::from_timeout_secs(spec.timeout_secs, self.config.scan_default_timeout);
        let query = spec.query.as_str();

        let materializer = self
            .retry
            .supply_stream(
                tracker,
                |session| session.execute_scan_query(query, &params, &settings),
                || self.materializer(spec),
                |materializer, chunk| {
                    first_byte.mark();
                    materializer.push_chunk(&chunk)
                },
            )
            .await
            .context(ex_error::QueryExecutionSnafu)?;
        // an empty stream still has a first response
        first_byte.mark();
        Ok(Some(materializer.finish()))
    }

    async fn scheme_query(
        &self,
        spec: &QuerySpec,
        tracker: &RetryTracker,
        first_byte: &FirstByte<'_>,
    ) -> ExecutionResult<Option<Materialized>> {
        let settings = OperationSettings::from_timeout_secs(spec.timeout_secs);
        let query = spec.query.as_str();

        self.retry
            .supply_status(tracker, |session| async move {
                session.execute_scheme_query(query, &settings).await
            })
            .await
            .context(ex_error::QueryExecutionSnafu)?;
        first_byte.mark();
        Ok(None)
    }
}

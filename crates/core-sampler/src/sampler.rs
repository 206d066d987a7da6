use std::sync::Arc;

use core_executor::{
    Config, ExecutionOutcome, IgnoreLatency, LatencyListener, QueryDispatcher, QuerySpec,
    Variables,
};
use snafu::prelude::*;

use crate::config::QueryConfig;
use crate::diagnostics::full_message;
use crate::error::{self as sampler_error, SamplerResult};
use crate::registry::{DataSource, DataSourceRegistry};
use crate::sample::SampleResult;

/// A query element bound to the registry its data source lives in.
struct QueryElement {
    config: QueryConfig,
    registry: Arc<DataSourceRegistry>,
    execution: Arc<Config>,
}

impl QueryElement {
    async fn data_source(&self) -> SamplerResult<Arc<DataSource>> {
        let name = self.config.data_source.trim();
        ensure!(
            !name.is_empty(),
            sampler_error::MissingDataSourceSnafu {
                element: &self.config.name,
            }
        );
        self.registry.get(name).await
    }

    async fn execute(
        &self,
        source: &DataSource,
        listener: &dyn LatencyListener,
        variables: &mut Variables,
    ) -> SamplerResult<ExecutionOutcome> {
        let spec = QuerySpec::try_from(&self.config).context(sampler_error::ExecutionSnafu)?;
        QueryDispatcher::new(source.retry(), Arc::clone(&self.execution))
            .execute(&spec, listener, variables)
            .await
            .context(sampler_error::ExecutionSnafu)
    }
}

/// Runs a query and records it as a sample.
pub struct YdbSampler {
    element: QueryElement,
}

impl YdbSampler {
    #[must_use]
    pub fn new(config: QueryConfig, registry: Arc<DataSourceRegistry>) -> Self {
        Self {
            element: QueryElement {
                config,
                registry,
                execution: Arc::new(Config::default()),
            },
        }
    }

    #[must_use]
    pub fn with_execution_config(mut self, execution: Arc<Config>) -> Self {
        self.element.execution = execution;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &QueryConfig {
        &self.element.config
    }

    /// Never fails: errors end up in an unsuccessful [`SampleResult`].
    #[tracing::instrument(
        name = "YdbSampler::sample",
        level = "debug",
        skip_all,
        fields(label = %self.element.config.name)
    )]
    pub async fn sample(&self, variables: &mut Variables) -> SampleResult {
        let config = &self.element.config;
        let mut result = SampleResult::start(&config.name, config.to_string());
        match self.run(&mut result, variables).await {
            Ok((outcome, headers)) => result.succeed(&outcome, headers),
            Err(err) => {
                tracing::warn!(label = %config.name, error = %full_message(&err), "YDB sample failed");
                result.fail(&err);
            }
        }
        result.sample_end();
        result
    }

    async fn run(
        &self,
        result: &mut SampleResult,
        variables: &mut Variables,
    ) -> SamplerResult<(ExecutionOutcome, String)> {
        let source = self.element.data_source().await;
        result.connect_end();
        let source = source?;
        let outcome = self
            .element
            .execute(&source, &*result, variables)
            .await?;
        Ok((outcome, source.connection_info()))
    }
}

/// Runs a query before or after a sampler without recording a sample.
pub struct YdbProcessor {
    element: QueryElement,
}

impl YdbProcessor {
    #[must_use]
    pub fn new(config: QueryConfig, registry: Arc<DataSourceRegistry>) -> Self {
        Self {
            element: QueryElement {
                config,
                registry,
                execution: Arc::new(Config::default()),
            },
        }
    }

    #[must_use]
    pub fn with_execution_config(mut self, execution: Arc<Config>) -> Self {
        self.element.execution = execution;
        self
    }

    #[tracing::instrument(
        name = "YdbProcessor::process",
        level = "debug",
        skip_all,
        fields(label = %self.element.config.name),
        err
    )]
    pub async fn process(&self, variables: &mut Variables) -> SamplerResult<ExecutionOutcome> {
        let source = self.element.data_source().await?;
        self.element
            .execute(&source, &IgnoreLatency, variables)
            .await
    }
}

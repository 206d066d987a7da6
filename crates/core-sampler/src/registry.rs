use std::collections::HashMap;
use std::sync::Arc;

use core_executor::{SessionProvider, SessionRetryContext};
use snafu::prelude::*;
use tokio::sync::RwLock;

use crate::config::DataSourceConfig;
use crate::error::{self as sampler_error, SamplerResult};

/// A configured data source and the retry context built over its sessions.
pub struct DataSource {
    config: DataSourceConfig,
    retry: Arc<SessionRetryContext>,
}

impl DataSource {
    pub fn new(config: DataSourceConfig, provider: Arc<dyn SessionProvider>) -> Self {
        let retry = Arc::new(SessionRetryContext::new(provider, config.retry_policy()));
        Self { config, retry }
    }

    #[must_use]
    pub const fn config(&self) -> &DataSourceConfig {
        &self.config
    }

    #[must_use]
    pub fn retry(&self) -> Arc<SessionRetryContext> {
        Arc::clone(&self.retry)
    }

    #[must_use]
    pub fn connection_info(&self) -> String {
        self.config.connection_info()
    }

    /// Stops in-flight retries; used when the test ends.
    pub fn close(&self) {
        self.retry.cancellation().cancel();
    }
}

#[derive(Default)]
pub struct DataSourceRegistry {
    sources: RwLock<HashMap<String, Arc<DataSource>>>,
}

impl DataSourceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a data source under its name. A second registration with the
    /// same name is logged and the existing source is kept.
    #[tracing::instrument(
        name = "DataSourceRegistry::register",
        level = "debug",
        skip(self, config, provider),
        fields(name = %config.data_source),
        err
    )]
    pub async fn register(
        &self,
        config: DataSourceConfig,
        provider: Arc<dyn SessionProvider>,
    ) -> SamplerResult<Arc<DataSource>> {
        config.validate().context(sampler_error::ConfigSnafu)?;

        tracing::trace!("Acquiring write lock for data sources");
        let mut sources = self.sources.write().await;
        if let Some(existing) = sources.get(&config.data_source) {
            tracing::error!(
                name = %config.data_source,
                "YDB data source already defined, keeping the first one"
            );
            return Ok(Arc::clone(existing));
        }

        tracing::info!(
            name = %config.data_source,
            info = %config.connection_info(),
            pool_max = config.pool_max(),
            retries_max = config.retries_max(),
            credentials = ?config.credentials().ok(),
            tls_cert = ?config.tls_certificate(),
            "Registered YDB data source"
        );
        let name = config.data_source.clone();
        let source = Arc::new(DataSource::new(config, provider));
        sources.insert(name, Arc::clone(&source));
        Ok(source)
    }

    pub async fn get(&self, name: &str) -> SamplerResult<Arc<DataSource>> {
        self.sources
            .read()
            .await
            .get(name)
            .cloned()
            .context(sampler_error::DataSourceNotFoundSnafu { name })
    }

    pub async fn remove(&self, name: &str) -> Option<Arc<DataSource>> {
        let removed = self.sources.write().await.remove(name);
        if let Some(source) = &removed {
            source.close();
            tracing::debug!(name, "Closed YDB data source");
        }
        removed
    }

    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sources.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

use core_executor::params::{self, Params};
use core_executor::{QueryKind, QuerySpec, tx};
use core_values::ConversionRegistry;
use snafu::prelude::*;

use crate::config::{QueryConfig, TestPlan};
use crate::error::{self as sampler_error, SamplerResult};

/// A query element that passed every check, with its parameters bound.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckedQuery {
    pub name: String,
    pub spec: QuerySpec,
    pub params: Params,
}

/// Runs every check a sample would run before touching a session.
pub fn check_query(
    plan: &TestPlan,
    config: &QueryConfig,
    registry: &ConversionRegistry,
) -> SamplerResult<CheckedQuery> {
    let name = config.data_source.trim();
    ensure!(
        !name.is_empty(),
        sampler_error::MissingDataSourceSnafu {
            element: &config.name,
        }
    );
    ensure!(
        plan.data_source(name).is_some(),
        sampler_error::DataSourceNotFoundSnafu { name }
    );

    let spec = QuerySpec::try_from(config).context(sampler_error::ExecutionSnafu)?;
    if spec.query_kind == QueryKind::DataQuery {
        tx::resolve(&spec.tx_mode).context(sampler_error::ExecutionSnafu)?;
    }
    let params = params::bind(registry, &spec.arguments, &spec.argument_types)
        .context(sampler_error::ExecutionSnafu)?;
    Ok(CheckedQuery {
        name: config.name.clone(),
        spec,
        params,
    })
}

/// Validates data sources first, then query elements in plan order. Stops at
/// the first failure.
#[tracing::instrument(
    name = "check_plan",
    level = "debug",
    skip_all,
    fields(sources = plan.data_sources.len(), queries = plan.queries.len()),
    err
)]
pub fn check_plan(
    plan: &TestPlan,
    registry: &ConversionRegistry,
) -> SamplerResult<Vec<CheckedQuery>> {
    for source in &plan.data_sources {
        source.validate().context(sampler_error::ConfigSnafu)?;
    }
    plan.queries
        .iter()
        .map(|config| check_query(plan, config, registry))
        .collect()
}

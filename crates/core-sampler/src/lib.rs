//! Load-test elements that run YDB queries: the sampler, the pre/post
//! processors and the data sources they draw sessions from.

pub mod check;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod registry;
pub mod sample;
pub mod sampler;

#[cfg(test)]
pub mod tests;

pub use check::{CheckedQuery, check_plan, check_query};
pub use config::{AuthMode, Credentials, DataSourceConfig, QueryConfig, TestPlan};
pub use diagnostics::full_message;
pub use error::{ConfigError, ConfigResult, SamplerError, SamplerResult};
pub use registry::{DataSource, DataSourceRegistry};
pub use sample::SampleResult;
pub use sampler::{YdbProcessor, YdbSampler};

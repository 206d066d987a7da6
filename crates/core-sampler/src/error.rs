use std::path::PathBuf;

use core_executor::ExecutionError;
use snafu::Location;
use snafu::prelude::*;
use strum::IntoStaticStr;

use crate::config::AuthMode;

#[derive(Debug, Snafu, IntoStaticStr)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    #[snafu(display("Unsupported auth mode: {mode}"))]
    UnknownAuthMode {
        mode: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Data source '{name}': {field} must not be empty"))]
    MissingField {
        name: String,
        field: &'static str,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Data source '{name}': auth mode {mode} requires {field}"))]
    MissingCredential {
        name: String,
        mode: AuthMode,
        field: &'static str,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Cannot read test plan {}: {source}", path.display()))]
    PlanRead {
        path: PathBuf,
        source: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Cannot parse test plan: {source}"))]
    PlanParse {
        source: serde_yaml::Error,
        #[snafu(implicit)]
        location: Location,
    },
}

impl ConfigError {
    #[must_use]
    pub const fn location(&self) -> &Location {
        match self {
            Self::UnknownAuthMode { location, .. }
            | Self::MissingField { location, .. }
            | Self::MissingCredential { location, .. }
            | Self::PlanRead { location, .. }
            | Self::PlanParse { location, .. } => location,
        }
    }
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Snafu, IntoStaticStr)]
#[snafu(visibility(pub(crate)))]
pub enum SamplerError {
    #[snafu(display("Name for DataSource must not be empty in {element}"))]
    MissingDataSource {
        element: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display(
        "No pool found named: '{name}', ensure Variable Name matches Variable Name of YDB Connection Configuration"
    ))]
    DataSourceNotFound {
        name: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Invalid data source configuration: {source}"))]
    Config {
        source: ConfigError,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("{source}"))]
    Execution {
        source: ExecutionError,
        #[snafu(implicit)]
        location: Location,
    },
}

impl SamplerError {
    #[must_use]
    pub const fn location(&self) -> &Location {
        match self {
            Self::MissingDataSource { location, .. }
            | Self::DataSourceNotFound { location, .. }
            | Self::Config { location, .. }
            | Self::Execution { location, .. } => location,
        }
    }
}

pub type SamplerResult<T> = std::result::Result<T, SamplerError>;

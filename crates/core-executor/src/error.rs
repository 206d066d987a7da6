use core_values::ConversionError;
use snafu::Location;
use snafu::prelude::*;
use strum::IntoStaticStr;

use crate::retry::RetryError;

#[derive(Debug, Snafu, IntoStaticStr)]
#[snafu(visibility(pub(crate)))]
pub enum ExecutionError {
    #[snafu(display("Unexpected YDB query type: {kind}"))]
    UnsupportedQueryKind {
        kind: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Illegal value for TX control: {mode}"))]
    UnknownTransactionMode {
        mode: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Unexpected result set handler: {handler}"))]
    UnknownResultHandling {
        handler: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Cannot split query arguments: {source}"))]
    ArgumentsCsv {
        source: csv::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display(
        "number of arguments ({args}) and number of types ({types}) are not equal"
    ))]
    ParameterCountMismatch {
        args: usize,
        types: usize,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Cannot bind parameter {name}: {source}"))]
    ParameterConversion {
        name: String,
        source: ConversionError,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Query execution failed: {source}"))]
    QueryExecution {
        source: RetryError,
        #[snafu(implicit)]
        location: Location,
    },
}

impl ExecutionError {
    #[must_use]
    pub const fn location(&self) -> &Location {
        match self {
            Self::UnsupportedQueryKind { location, .. }
            | Self::UnknownTransactionMode { location, .. }
            | Self::UnknownResultHandling { location, .. }
            | Self::ArgumentsCsv { location, .. }
            | Self::ParameterCountMismatch { location, .. }
            | Self::ParameterConversion { location, .. }
            | Self::QueryExecution { location, .. } => location,
        }
    }

    /// Errors caused by the query element itself; the database was never asked.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        !matches!(self, Self::QueryExecution { .. })
    }
}

pub type ExecutionResult<T> = std::result::Result<T, ExecutionError>;

use std::collections::HashMap;
use std::str::FromStr;

use bytes::Bytes;
use core_values::{Value, ValueKind};
use snafu::OptionExt;
use strum::{AsRefStr, Display, EnumIter, EnumString};
use url::Url;

use crate::error::{self as ex_error, ExecutionResult};

/// Base of the informational URL reported with every outcome.
pub const INFO_URL: &str = "http://ydb-query/info";

/// Variables exported from a result row, `None` for absent values.
pub type Variables = HashMap<String, Option<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, AsRefStr, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum QueryKind {
    #[strum(serialize = "Data Query")]
    DataQuery,
    #[strum(serialize = "Scan Query")]
    ScanQuery,
    #[strum(serialize = "Scheme Query")]
    SchemeQuery,
}

impl QueryKind {
    pub fn parse(kind: &str) -> ExecutionResult<Self> {
        Self::from_str(kind.trim())
            .ok()
            .context(ex_error::UnsupportedQueryKindSnafu { kind })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, AsRefStr, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum ResultHandling {
    #[strum(serialize = "Store as String")]
    StoreAsString,
    #[strum(serialize = "Count Records")]
    CountRecords,
}

impl ResultHandling {
    pub fn parse(handler: &str) -> ExecutionResult<Self> {
        Self::from_str(handler.trim())
            .ok()
            .context(ex_error::UnknownResultHandlingSnafu { handler })
    }
}

/// Everything needed to run one query invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    pub query: String,
    pub query_kind: QueryKind,
    pub tx_mode: String,
    pub arguments: String,
    pub argument_types: String,
    pub variable_names: String,
    pub result_handling: ResultHandling,
    pub timeout_secs: u32,
    pub max_rows: Option<u64>,
}

impl QuerySpec {
    #[must_use]
    pub fn new(query: impl Into<String>, query_kind: QueryKind) -> Self {
        Self {
            query: query.into(),
            query_kind,
            tx_mode: "Serializable Read/Write".to_string(),
            arguments: String::new(),
            argument_types: String::new(),
            variable_names: String::new(),
            result_handling: ResultHandling::StoreAsString,
            timeout_secs: 0,
            max_rows: None,
        }
    }

    #[must_use]
    pub fn with_tx_mode(mut self, tx_mode: impl Into<String>) -> Self {
        self.tx_mode = tx_mode.into();
        self
    }

    #[must_use]
    pub fn with_arguments(mut self, arguments: impl Into<String>, types: impl Into<String>) -> Self {
        self.arguments = arguments.into();
        self.argument_types = types.into();
        self
    }

    #[must_use]
    pub fn with_variable_names(mut self, names: impl Into<String>) -> Self {
        self.variable_names = names.into();
        self
    }

    #[must_use]
    pub const fn with_result_handling(mut self, result_handling: ResultHandling) -> Self {
        self.result_handling = result_handling;
        self
    }

    #[must_use]
    pub const fn with_timeout_secs(mut self, timeout_secs: u32) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    #[must_use]
    pub const fn with_max_rows(mut self, max_rows: Option<u64>) -> Self {
        self.max_rows = max_rows;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: ValueKind,
}

impl Column {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row(Vec<Value>);

impl Row {
    #[must_use]
    pub const fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.0
    }
}

/// One result set of a data query, or one part of a scan stream.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultChunk {
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
    /// Set when the server cut the result set short.
    pub truncated: bool,
}

impl ResultChunk {
    #[must_use]
    pub const fn new(columns: Vec<Column>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows,
            truncated: false,
        }
    }

    #[must_use]
    pub const fn with_truncated(mut self, truncated: bool) -> Self {
        self.truncated = truncated;
        self
    }

    #[must_use]
    pub fn row_count(&self) -> u64 {
        self.rows.len() as u64
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataQueryResult {
    pub result_sets: Vec<ResultChunk>,
}

impl DataQueryResult {
    #[must_use]
    pub const fn new(result_sets: Vec<ResultChunk>) -> Self {
        Self { result_sets }
    }
}

/// Payload and retry count of one finished invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub data: Bytes,
    pub retries: u32,
}

impl ExecutionOutcome {
    #[must_use]
    pub const fn new(data: Bytes, retries: u32) -> Self {
        Self { data, retries }
    }

    pub fn info_url(&self) -> Result<Url, url::ParseError> {
        Url::parse_with_params(INFO_URL, &[("retryCount", self.retries.to_string())])
    }
}

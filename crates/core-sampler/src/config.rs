use std::fmt::{self, Display};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use core_executor::retry::DEFAULT_MAX_RETRIES;
use core_executor::{ExecutionError, QueryKind, QuerySpec, ResultHandling, RetryPolicy};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use strum::{Display as StrumDisplay, EnumString};

use crate::error::{self as sampler_error, ConfigError, ConfigResult};

/// Properties of a query test element as persisted in a test plan.
///
/// Every field is kept as text; parsing happens when the element runs so a
/// plan with a bad value still loads and reports the problem per sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryConfig {
    pub name: String,
    pub data_source: String,
    pub query_type: String,
    pub tx_type: String,
    pub query: String,
    pub query_arguments: String,
    pub query_arguments_types: String,
    pub variable_names: String,
    pub result_set_handler: String,
    pub query_timeout: String,
    pub result_set_max_rows: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            data_source: String::new(),
            query_type: QueryKind::DataQuery.to_string(),
            tx_type: "Serializable Read/Write".to_string(),
            query: String::new(),
            query_arguments: String::new(),
            query_arguments_types: String::new(),
            variable_names: String::new(),
            result_set_handler: ResultHandling::StoreAsString.to_string(),
            query_timeout: String::new(),
            result_set_max_rows: String::new(),
        }
    }
}

impl QueryConfig {
    /// Timeout in seconds, `0` when unset, negative or unparseable.
    #[must_use]
    pub fn timeout_secs(&self) -> u32 {
        parse_lenient("queryTimeout", &self.query_timeout)
            .and_then(|secs| u32::try_from(secs).ok())
            .unwrap_or(0)
    }

    /// Row cap, `None` when unset, negative or unparseable.
    #[must_use]
    pub fn max_rows(&self) -> Option<u64> {
        parse_lenient("resultSetMaxRows", &self.result_set_max_rows)
            .and_then(|rows| u64::try_from(rows).ok())
    }
}

impl Display for QueryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}\n{}\n{}",
            self.query_type, self.query, self.query_arguments, self.query_arguments_types
        )
    }
}

impl TryFrom<&QueryConfig> for QuerySpec {
    type Error = ExecutionError;

    fn try_from(config: &QueryConfig) -> Result<Self, Self::Error> {
        let query_kind = QueryKind::parse(&config.query_type)?;
        let result_handling = ResultHandling::parse(&config.result_set_handler)?;
        Ok(Self::new(config.query.clone(), query_kind)
            .with_tx_mode(config.tx_type.clone())
            .with_arguments(
                config.query_arguments.clone(),
                config.query_arguments_types.clone(),
            )
            .with_variable_names(config.variable_names.clone())
            .with_result_handling(result_handling)
            .with_timeout_secs(config.timeout_secs())
            .with_max_rows(config.max_rows()))
    }
}

fn parse_lenient(field: &str, raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<i64>() {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(field, value = raw, error = %err, "Ignoring unparseable number");
            None
        }
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, EnumString, StrumDisplay, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive, serialize_all = "UPPERCASE")]
#[serde(try_from = "String", into = "String")]
pub enum AuthMode {
    #[default]
    None,
    Env,
    Metadata,
    Sakey,
    Static,
}

impl TryFrom<String> for AuthMode {
    type Error = ConfigError;

    fn try_from(mode: String) -> Result<Self, Self::Error> {
        Self::from_str(mode.trim())
            .ok()
            .context(sampler_error::UnknownAuthModeSnafu { mode })
    }
}

impl From<AuthMode> for String {
    fn from(mode: AuthMode) -> Self {
        mode.to_string()
    }
}

/// Connection settings of one named data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceConfig {
    pub data_source: String,
    pub endpoint: String,
    pub database: String,
    #[serde(default)]
    pub auth_mode: AuthMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sa_key_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_cert_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_max: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries_max: Option<u32>,
}

impl DataSourceConfig {
    #[must_use]
    pub fn new(
        data_source: impl Into<String>,
        endpoint: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            data_source: data_source.into(),
            endpoint: endpoint.into(),
            database: database.into(),
            auth_mode: AuthMode::None,
            username: None,
            password: None,
            sa_key_file: None,
            tls_cert_file: None,
            pool_max: None,
            retries_max: None,
        }
    }

    #[must_use]
    pub const fn with_auth_mode(mut self, auth_mode: AuthMode) -> Self {
        self.auth_mode = auth_mode;
        self
    }

    /// Session pool size; defaults to one session plus two per CPU.
    #[must_use]
    pub fn pool_max(&self) -> u32 {
        self.pool_max
            .filter(|&size| size > 0)
            .unwrap_or_else(default_pool_max)
    }

    #[must_use]
    pub fn retries_max(&self) -> u32 {
        self.retries_max.unwrap_or(DEFAULT_MAX_RETRIES)
    }

    /// Load-test queries are replayed freely, so every call counts as idempotent.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_retries(self.retries_max())
            .with_idempotent(true)
    }

    #[must_use]
    pub fn connection_info(&self) -> String {
        format!(
            ", endpoint:{}, database:{}, authMode:{}",
            self.endpoint, self.database, self.auth_mode
        )
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let name = self.data_source.as_str();
        for (field, value) in [
            ("dataSource", name),
            ("endpoint", self.endpoint.as_str()),
            ("database", self.database.as_str()),
        ] {
            ensure!(
                !value.trim().is_empty(),
                sampler_error::MissingFieldSnafu { name, field }
            );
        }
        self.credentials()?;
        Ok(())
    }

    /// Credentials the session provider authenticates with, per `auth_mode`.
    pub fn credentials(&self) -> ConfigResult<Credentials> {
        let missing = |field: &'static str| sampler_error::MissingCredentialSnafu {
            name: self.data_source.as_str(),
            mode: self.auth_mode,
            field,
        };
        let credentials = match self.auth_mode {
            AuthMode::None => Credentials::Anonymous,
            AuthMode::Env => Credentials::Environment,
            AuthMode::Metadata => Credentials::Metadata,
            AuthMode::Sakey => Credentials::ServiceAccountKey(
                self.sa_key_file.clone().context(missing("saKeyFile"))?,
            ),
            AuthMode::Static => Credentials::Static {
                username: self
                    .username
                    .clone()
                    .filter(|user| !user.is_empty())
                    .context(missing("username"))?,
                password: self.password.clone().unwrap_or_default(),
            },
        };
        Ok(credentials)
    }

    /// Root certificate for TLS endpoints, when one is configured.
    #[must_use]
    pub fn tls_certificate(&self) -> Option<&Path> {
        self.tls_cert_file
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty())
    }
}

/// Resolved authentication for one data source.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Anonymous,
    Environment,
    Metadata,
    ServiceAccountKey(PathBuf),
    Static { username: String, password: String },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => f.write_str("Anonymous"),
            Self::Environment => f.write_str("Environment"),
            Self::Metadata => f.write_str("Metadata"),
            Self::ServiceAccountKey(path) => f.debug_tuple("ServiceAccountKey").field(path).finish(),
            Self::Static { username, .. } => f
                .debug_struct("Static")
                .field("username", username)
                .finish_non_exhaustive(),
        }
    }
}

fn default_pool_max() -> u32 {
    let cpus = std::thread::available_parallelism().map_or(1, NonZeroUsize::get);
    u32::try_from(1 + 2 * cpus).unwrap_or(u32::MAX)
}

/// Data sources and query elements loaded from a YAML file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestPlan {
    #[serde(default)]
    pub data_sources: Vec<DataSourceConfig>,
    #[serde(default)]
    pub queries: Vec<QueryConfig>,
}

impl TestPlan {
    pub fn from_yaml(text: &str) -> ConfigResult<Self> {
        serde_yaml::from_str(text).context(sampler_error::PlanParseSnafu)
    }

    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).context(sampler_error::PlanReadSnafu { path })?;
        Self::from_yaml(&text)
    }

    #[must_use]
    pub fn data_source(&self, name: &str) -> Option<&DataSourceConfig> {
        self.data_sources
            .iter()
            .find(|source| source.data_source == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAN: &str = r#"
dataSources:
  - dataSource: ydb
    endpoint: grpc://localhost:2136
    database: /local
    authMode: static
    username: root
    retriesMax: 3
queries:
  - name: select by id
    dataSource: ydb
    query: SELECT * FROM t WHERE id = $p1
    queryArguments: "42"
    queryArgumentsTypes: Int64
    queryTimeout: "5"
  - name: scan all
    dataSource: ydb
    queryType: Scan Query
    query: SELECT * FROM t
    resultSetHandler: Count Records
    resultSetMaxRows: "-1"
"#;

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_plan_parses_with_defaults() {
        let plan = TestPlan::from_yaml(PLAN).unwrap();
        assert_eq!(plan.data_sources.len(), 1);
        assert_eq!(plan.queries.len(), 2);

        let source = plan.data_source("ydb").unwrap();
        assert_eq!(source.auth_mode, AuthMode::Static);
        assert_eq!(source.retries_max(), 3);
        assert!(source.validate().is_ok());

        let select = &plan.queries[0];
        assert_eq!(select.query_type, "Data Query");
        assert_eq!(select.tx_type, "Serializable Read/Write");
        assert_eq!(select.result_set_handler, "Store as String");
        assert_eq!(select.timeout_secs(), 5);
        assert_eq!(select.max_rows(), None);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_spec_from_config() {
        let plan = TestPlan::from_yaml(PLAN).unwrap();
        let spec = QuerySpec::try_from(&plan.queries[1]).unwrap();
        assert_eq!(spec.query_kind, QueryKind::ScanQuery);
        assert_eq!(spec.result_handling, ResultHandling::CountRecords);
        assert_eq!(spec.max_rows, None);
        assert_eq!(spec.timeout_secs, 0);
    }

    #[test]
    fn test_bogus_query_kind() {
        let config = QueryConfig {
            query_type: "Bogus Query".to_string(),
            ..QueryConfig::default()
        };
        let err = QuerySpec::try_from(&config).unwrap_err();
        assert!(matches!(err, ExecutionError::UnsupportedQueryKind { .. }));
        assert!(err.to_string().contains("Bogus Query"));
    }

    #[test]
    fn test_lenient_numbers() {
        let config = QueryConfig {
            query_timeout: "soon".to_string(),
            result_set_max_rows: " 100 ".to_string(),
            ..QueryConfig::default()
        };
        assert_eq!(config.timeout_secs(), 0);
        assert_eq!(config.max_rows(), Some(100));

        let config = QueryConfig {
            query_timeout: "-3".to_string(),
            result_set_max_rows: "lots".to_string(),
            ..QueryConfig::default()
        };
        assert_eq!(config.timeout_secs(), 0);
        assert_eq!(config.max_rows(), None);
    }

    #[test]
    fn test_sampler_data_format() {
        let config = QueryConfig {
            query: "SELECT $p1".to_string(),
            query_arguments: "1".to_string(),
            query_arguments_types: "Int32".to_string(),
            ..QueryConfig::default()
        };
        assert_eq!(config.to_string(), "[Data Query] SELECT $p1\n1\nInt32");
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_auth_mode_is_case_insensitive() {
        assert_eq!(AuthMode::try_from("metadata".to_string()).unwrap(), AuthMode::Metadata);
        assert_eq!(AuthMode::try_from("SaKey".to_string()).unwrap(), AuthMode::Sakey);
        assert_eq!(AuthMode::Sakey.to_string(), "SAKEY");
        let err = AuthMode::try_from("oauth".to_string()).unwrap_err();
        assert!(err.to_string().contains("oauth"));
    }

    #[test]
    fn test_connection_info() {
        let config = DataSourceConfig::new("ydb", "grpcs://ydb.example:2135", "/ru/db")
            .with_auth_mode(AuthMode::Env);
        assert_eq!(
            config.connection_info(),
            ", endpoint:grpcs://ydb.example:2135, database:/ru/db, authMode:ENV"
        );
    }

    #[test]
    fn test_pool_and_retry_defaults() {
        let config = DataSourceConfig::new("ydb", "grpc://localhost:2136", "/local");
        assert!(config.pool_max() >= 3);
        assert_eq!(config.retries_max(), 10);
        let policy = config.retry_policy();
        assert!(policy.idempotent);
        assert_eq!(policy.max_retries, 10);

        let sized = DataSourceConfig {
            pool_max: Some(4),
            ..config
        };
        assert_eq!(sized.pool_max(), 4);
    }

    #[test]
    fn test_validate_reports_missing_values() {
        let err = DataSourceConfig::new("ydb", " ", "/local")
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "endpoint", .. }));

        let err = DataSourceConfig::new("ydb", "grpc://localhost:2136", "/local")
            .with_auth_mode(AuthMode::Sakey)
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingCredential { field: "saKeyFile", .. }
        ));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_credentials_and_tls_certificate() {
        let plan = TestPlan::from_yaml(
            r"
dataSources:
  - dataSource: ydb
    endpoint: grpcs://ydb.example:2135
    database: /ru/db
    authMode: STATIC
    username: root
    password: secret
    tlsCertFile: /etc/ydb/ca.pem
",
        )
        .unwrap();
        let source = plan.data_source("ydb").unwrap();
        let credentials = source.credentials().unwrap();
        assert_eq!(
            credentials,
            Credentials::Static {
                username: "root".to_string(),
                password: "secret".to_string(),
            }
        );
        assert!(!format!("{credentials:?}").contains("secret"));
        assert_eq!(source.tls_certificate(), Some(Path::new("/etc/ydb/ca.pem")));

        let anonymous = DataSourceConfig::new("ydb", "grpc://localhost:2136", "/local");
        assert_eq!(anonymous.credentials().unwrap(), Credentials::Anonymous);
        assert_eq!(anonymous.tls_certificate(), None);

        let blank_user = DataSourceConfig {
            username: Some(String::new()),
            ..anonymous.with_auth_mode(AuthMode::Static)
        };
        assert!(matches!(
            blank_user.credentials().unwrap_err(),
            ConfigError::MissingCredential { field: "username", .. }
        ));
    }

    #[test]
    fn test_invalid_yaml() {
        let err = TestPlan::from_yaml("dataSources: [").unwrap_err();
        assert!(matches!(err, ConfigError::PlanParse { .. }));
    }
}

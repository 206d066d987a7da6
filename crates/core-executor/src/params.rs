use core_values::{ConversionRegistry, Value};
use snafu::prelude::*;

use crate::error::{self as ex_error, ExecutionResult};

#[derive(Debug, Clone, PartialEq)]
pub struct TypedParameter {
    pub name: String,
    pub value: Value,
}

/// Positional query parameters named `$p1`, `$p2`, ...
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Vec<TypedParameter>);

impl Params {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0
            .iter()
            .find(|param| param.name == name)
            .map(|param| &param.value)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TypedParameter> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a Params {
    type Item = &'a TypedParameter;
    type IntoIter = std::slice::Iter<'a, TypedParameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[must_use]
pub fn parameter_name(index: usize) -> String {
    format!("$p{}", index + 1)
}

/// Binds CSV-encoded arguments to the comma separated type tags.
///
/// Arguments follow CSV quoting, so a quoted field may contain commas and
/// `""` stands for a literal quote. Types are split on plain commas.
#[tracing::instrument(name = "params::bind", level = "trace", skip(registry), err)]
pub fn bind(
    registry: &ConversionRegistry,
    args_csv: &str,
    types_csv: &str,
) -> ExecutionResult<Params> {
    if args_csv.trim().is_empty() {
        return Ok(Params::new());
    }
    let arguments = split_arguments(args_csv)?;
    let types: Vec<&str> = types_csv.split(',').collect();
    ensure!(
        arguments.len() == types.len(),
        ex_error::ParameterCountMismatchSnafu {
            args: arguments.len(),
            types: types.len(),
        }
    );

    arguments
        .iter()
        .zip(types)
        .enumerate()
        .map(|(index, (text, tag))| {
            let name = parameter_name(index);
            let value = registry
                .convert(tag, text)
                .context(ex_error::ParameterConversionSnafu { name: name.clone() })?;
            Ok(TypedParameter { name, value })
        })
        .collect::<ExecutionResult<Vec<_>>>()
        .map(Params)
}

fn split_arguments(line: &str) -> ExecutionResult<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());
    let mut record = csv::StringRecord::new();
    let found = reader
        .read_record(&mut record)
        .context(ex_error::ArgumentsCsvSnafu)?;
    if !found {
        return Ok(Vec::new());
    }
    Ok(record.iter().map(ToString::to_string).collect())
}

#[cfg(test)]
mod tests {
    use core_values::{ConversionError, Scalar, ValueKind};

    use super::*;
    use crate::error::ExecutionError;

    fn registry() -> &'static ConversionRegistry {
        ConversionRegistry::global()
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_bind_three_ints() {
        let params = bind(registry(), "1,2,3", "Int32,Int32,Int32").unwrap();
        assert_eq!(params.len(), 3);
        assert_eq!(params.get("$p1"), Some(&Value::Scalar(Scalar::Int32(1))));
        assert_eq!(params.get("$p2"), Some(&Value::Scalar(Scalar::Int32(2))));
        assert_eq!(params.get("$p3"), Some(&Value::Scalar(Scalar::Int32(3))));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_blank_arguments_bind_nothing() {
        assert!(bind(registry(), "", "Int32").unwrap().is_empty());
        assert!(bind(registry(), "   ", "").unwrap().is_empty());
    }

    #[test]
    fn test_count_mismatch_names_both_counts() {
        let err = bind(registry(), "1,2", "Int32").unwrap_err();
        assert!(matches!(
            err,
            ExecutionError::ParameterCountMismatch { args: 2, types: 1, .. }
        ));
        let message = err.to_string();
        assert!(message.contains('2'));
        assert!(message.contains('1'));
        assert_eq!(
            message,
            "number of arguments (2) and number of types (1) are not equal"
        );
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_quoted_argument_keeps_commas() {
        let params = bind(registry(), r#"7,"a, ""quoted"" b""#, "Int64,Text").unwrap();
        assert_eq!(params.get("$p1"), Some(&Value::Scalar(Scalar::Int64(7))));
        assert_eq!(
            params.get("$p2"),
            Some(&Value::Scalar(Scalar::Text(r#"a, "quoted" b"#.to_string())))
        );
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_optional_empty_argument_is_absent() {
        let params = bind(registry(), "1,", "Int64,Int64?").unwrap();
        assert_eq!(params.get("$p2"), Some(&Value::absent(ValueKind::Int64)));
    }

    #[test]
    fn test_first_bad_token_names_parameter() {
        let err = bind(registry(), "1,x,y", "Int32,Int32,Int32").unwrap_err();
        let ExecutionError::ParameterConversion { name, source, .. } = &err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(name, "$p2");
        assert!(matches!(source, ConversionError::MalformedValue { .. }));
    }

    #[test]
    fn test_unknown_type_tag() {
        let err = bind(registry(), "1", "Interval").unwrap_err();
        assert!(matches!(
            err,
            ExecutionError::ParameterConversion {
                source: ConversionError::UnsupportedType { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_parameter_names_are_one_based() {
        assert_eq!(parameter_name(0), "$p1");
        assert_eq!(parameter_name(9), "$p10");
    }
}

use std::collections::HashMap;
use std::sync::LazyLock;

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use snafu::prelude::*;

use crate::error::{self as conv_error, ConversionResult, ParseValueError};
use crate::value::{ABSENT, Decimal, Scalar, Value, ValueKind};

type ParseFn = fn(&str) -> Result<Scalar, ParseValueError>;
type RenderFn = fn(&Scalar) -> String;

/// URL-safe alphabet; trailing padding is optional on decode.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const OPTIONAL_SUFFIX: char = '?';

static GLOBAL: LazyLock<ConversionRegistry> = LazyLock::new(ConversionRegistry::new);

/// One registered type tag.
#[derive(Clone, Copy)]
pub struct Conversion {
    name: &'static str,
    kind: ValueKind,
    trim: bool,
    parse: ParseFn,
    render: RenderFn,
}

impl Conversion {
    const fn scalar(name: &'static str, kind: ValueKind, parse: ParseFn) -> Self {
        Self {
            name,
            kind,
            trim: true,
            parse,
            render: canonical,
        }
    }

    const fn text(name: &'static str, kind: ValueKind, parse: ParseFn, render: RenderFn) -> Self {
        Self {
            name,
            kind,
            trim: false,
            parse,
            render,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        self.kind
    }
}

impl std::fmt::Debug for Conversion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conversion")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("trim", &self.trim)
            .finish_non_exhaustive()
    }
}

const CONVERSIONS: &[Conversion] = &[
    Conversion::scalar("Bool", ValueKind::Bool, parse_bool),
    Conversion::scalar("Int32", ValueKind::Int32, parse_int32),
    Conversion::scalar("Uint32", ValueKind::Uint32, parse_uint32),
    Conversion::scalar("Int64", ValueKind::Int64, parse_int64),
    Conversion::scalar("Uint64", ValueKind::Uint64, parse_uint64),
    Conversion::scalar("Float", ValueKind::Float, parse_float),
    Conversion::scalar("Double", ValueKind::Double, parse_double),
    Conversion::scalar("Decimal", ValueKind::Decimal, parse_decimal),
    Conversion::scalar("Date", ValueKind::Date, parse_date),
    Conversion::scalar("DateTime", ValueKind::Datetime, parse_datetime),
    Conversion::scalar("Timestamp", ValueKind::Timestamp, parse_timestamp),
    Conversion::text("Text", ValueKind::Text, parse_text, canonical),
    Conversion::text("Bytes", ValueKind::Bytes, parse_bytes, canonical),
    Conversion::text("Base64", ValueKind::Bytes, parse_base64, render_base64),
];

/// Immutable lookup table from type tags (`Int64`, `Text?`, ...) to their
/// text conversions.
#[derive(Debug)]
pub struct ConversionRegistry {
    entries: HashMap<String, Conversion>,
}

impl Default for ConversionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversionRegistry {
    #[must_use]
    pub fn new() -> Self {
        let entries = CONVERSIONS
            .iter()
            .map(|conv| (conv.name.to_ascii_lowercase(), *conv))
            .collect();
        Self { entries }
    }

    /// Process-wide instance, built on first use.
    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    /// Registered tag names in their canonical spelling.
    pub fn tags(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.values().map(Conversion::name)
    }

    /// Resolves a tag to its conversion and whether the optional variant
    /// (`T?`) was requested.
    pub fn lookup(&self, tag: &str) -> ConversionResult<(&Conversion, bool)> {
        let tag = tag.trim();
        let (base, optional) = match tag.strip_suffix(OPTIONAL_SUFFIX) {
            Some(base) => (base, true),
            None => (tag, false),
        };
        let conv = self
            .entries
            .get(&base.to_ascii_lowercase())
            .context(conv_error::UnsupportedTypeSnafu { tag: base })?;
        Ok((conv, optional))
    }

    pub fn convert(&self, tag: &str, text: &str) -> ConversionResult<Value> {
        let (conv, optional) = self.lookup(tag)?;
        let text = if conv.trim { text.trim() } else { text };
        if text.is_empty() {
            ensure!(
                optional,
                conv_error::EmptyNonOptionalValueSnafu { tag: conv.name }
            );
            return Ok(Value::absent(conv.kind));
        }
        let scalar = (conv.parse)(text).context(conv_error::MalformedValueSnafu {
            tag: conv.name,
            text,
        })?;
        Ok(if optional {
            Value::optional(scalar)
        } else {
            Value::Scalar(scalar)
        })
    }

    /// Renders `value` the way `tag` would parse it back.
    pub fn render(&self, tag: &str, value: &Value) -> ConversionResult<String> {
        let (conv, _) = self.lookup(tag)?;
        Ok(value
            .as_scalar()
            .map_or_else(|| ABSENT.to_string(), conv.render))
    }
}

fn canonical(scalar: &Scalar) -> String {
    scalar.to_string()
}

fn render_base64(scalar: &Scalar) -> String {
    match scalar {
        Scalar::Bytes(bytes) => URL_SAFE_LENIENT.encode(bytes),
        other => other.to_string(),
    }
}

fn parse_bool(text: &str) -> Result<Scalar, ParseValueError> {
    const TRUE: [&str; 4] = ["true", "yes", "t", "1"];
    const FALSE: [&str; 4] = ["false", "no", "f", "0"];
    if TRUE.iter().any(|t| t.eq_ignore_ascii_case(text)) {
        return Ok(Scalar::Bool(true));
    }
    if FALSE.iter().any(|f| f.eq_ignore_ascii_case(text)) {
        return Ok(Scalar::Bool(false));
    }
    conv_error::BooleanSnafu { text }.fail()
}

fn parse_int32(text: &str) -> Result<Scalar, ParseValueError> {
    text.parse()
        .map(Scalar::Int32)
        .context(conv_error::IntegerSnafu)
}

fn parse_uint32(text: &str) -> Result<Scalar, ParseValueError> {
    text.parse()
        .map(Scalar::Uint32)
        .context(conv_error::IntegerSnafu)
}

fn parse_int64(text: &str) -> Result<Scalar, ParseValueError> {
    text.parse()
        .map(Scalar::Int64)
        .context(conv_error::IntegerSnafu)
}

fn parse_uint64(text: &str) -> Result<Scalar, ParseValueError> {
    text.parse()
        .map(Scalar::Uint64)
        .context(conv_error::IntegerSnafu)
}

fn parse_float(text: &str) -> Result<Scalar, ParseValueError> {
    text.parse()
        .map(Scalar::Float)
        .context(conv_error::FloatSnafu)
}

fn parse_double(text: &str) -> Result<Scalar, ParseValueError> {
    text.parse()
        .map(Scalar::Double)
        .context(conv_error::FloatSnafu)
}

fn parse_decimal(text: &str) -> Result<Scalar, ParseValueError> {
    Decimal::parse(text).map(Scalar::Decimal)
}

fn parse_date(text: &str) -> Result<Scalar, ParseValueError> {
    text.parse::<NaiveDate>()
        .map(Scalar::Date)
        .context(conv_error::TemporalSnafu)
}

fn parse_datetime(text: &str) -> Result<Scalar, ParseValueError> {
    text.parse::<NaiveDateTime>()
        .map(Scalar::Datetime)
        .context(conv_error::TemporalSnafu)
}

fn parse_timestamp(text: &str) -> Result<Scalar, ParseValueError> {
    DateTime::parse_from_rfc3339(text)
        .map(|ts| Scalar::Timestamp(ts.with_timezone(&Utc)))
        .context(conv_error::TemporalSnafu)
}

#[allow(clippy::unnecessary_wraps)]
fn parse_text(text: &str) -> Result<Scalar, ParseValueError> {
    Ok(Scalar::Text(text.to_string()))
}

#[allow(clippy::unnecessary_wraps)]
fn parse_bytes(text: &str) -> Result<Scalar, ParseValueError> {
    Ok(Scalar::Bytes(Bytes::copy_from_slice(text.as_bytes())))
}

fn parse_base64(text: &str) -> Result<Scalar, ParseValueError> {
    URL_SAFE_LENIENT
        .decode(text)
        .map(|raw| Scalar::Bytes(Bytes::from(raw)))
        .context(conv_error::Base64Snafu)
}

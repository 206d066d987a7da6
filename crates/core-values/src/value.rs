use std::fmt::{self, Display};

use arrow_array::types::{Decimal128Type, DecimalType};
use arrow_cast::parse::parse_decimal;
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use snafu::{ResultExt, ensure};
use strum::Display as StrumDisplay;

use crate::error::{self as value_error, ParseValueError};

/// Text written in place of an absent optional value.
pub const ABSENT: &str = "?";

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";
pub(crate) const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay)]
pub enum ValueKind {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float,
    Double,
    Decimal,
    Date,
    Datetime,
    Timestamp,
    Text,
    Json,
    JsonDocument,
    Bytes,
}

/// Fixed-point decimal stored as a scaled 128-bit integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal {
    value: i128,
    precision: u8,
    scale: i8,
}

impl Decimal {
    pub const DEFAULT_PRECISION: u8 = 22;
    pub const DEFAULT_SCALE: i8 = 9;

    #[must_use]
    pub const fn new(value: i128, precision: u8, scale: i8) -> Self {
        Self {
            value,
            precision,
            scale,
        }
    }

    /// Parses `text` into the database default `Decimal(22, 9)`.
    pub fn parse(text: &str) -> Result<Self, ParseValueError> {
        Self::parse_with(text, Self::DEFAULT_PRECISION, Self::DEFAULT_SCALE)
    }

    /// Fails instead of dropping fraction digits beyond `scale`.
    pub fn parse_with(text: &str, precision: u8, scale: i8) -> Result<Self, ParseValueError> {
        ensure!(
            fraction_digits(text) <= i64::from(scale),
            value_error::DecimalScaleSnafu { text, scale }
        );
        parse_decimal::<Decimal128Type>(text, precision, scale)
            .map(|value| Self::new(value, precision, scale))
            .context(value_error::DecimalSnafu)
    }

    #[must_use]
    pub const fn unscaled(&self) -> i128 {
        self.value
    }

    #[must_use]
    pub const fn precision(&self) -> u8 {
        self.precision
    }

    #[must_use]
    pub const fn scale(&self) -> i8 {
        self.scale
    }
}

/// Significant digits after the decimal point, shifted by any exponent.
fn fraction_digits(text: &str) -> i64 {
    let (mantissa, exponent) = match text.find(['e', 'E']) {
        Some(at) => (&text[..at], text[at + 1..].parse::<i64>().unwrap_or(0)),
        None => (text, 0),
    };
    let fraction = mantissa
        .split_once('.')
        .map_or("", |(_, fraction)| fraction.trim_end_matches('0'));
    i64::try_from(fraction.len()).unwrap_or(i64::MAX) - exponent
}

impl Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Decimal128Type::format_decimal(
            self.value,
            self.precision,
            self.scale,
        ))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    Float(f32),
    Double(f64),
    Decimal(Decimal),
    Date(NaiveDate),
    Datetime(NaiveDateTime),
    Timestamp(DateTime<Utc>),
    Text(String),
    Json(String),
    JsonDocument(String),
    Bytes(Bytes),
}

impl Scalar {
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::Int8(_) => ValueKind::Int8,
            Self::Int16(_) => ValueKind::Int16,
            Self::Int32(_) => ValueKind::Int32,
            Self::Int64(_) => ValueKind::Int64,
            Self::Uint8(_) => ValueKind::Uint8,
            Self::Uint16(_) => ValueKind::Uint16,
            Self::Uint32(_) => ValueKind::Uint32,
            Self::Uint64(_) => ValueKind::Uint64,
            Self::Float(_) => ValueKind::Float,
            Self::Double(_) => ValueKind::Double,
            Self::Decimal(_) => ValueKind::Decimal,
            Self::Date(_) => ValueKind::Date,
            Self::Datetime(_) => ValueKind::Datetime,
            Self::Timestamp(_) => ValueKind::Timestamp,
            Self::Text(_) => ValueKind::Text,
            Self::Json(_) => ValueKind::Json,
            Self::JsonDocument(_) => ValueKind::JsonDocument,
            Self::Bytes(_) => ValueKind::Bytes,
        }
    }
}

impl Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int8(v) => write!(f, "{v}"),
            Self::Int16(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Uint8(v) => write!(f, "{v}"),
            Self::Uint16(v) => write!(f, "{v}"),
            Self::Uint32(v) => write!(f, "{v}"),
            Self::Uint64(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Decimal(v) => write!(f, "{v}"),
            Self::Date(v) => write!(f, "{}", v.format(DATE_FORMAT)),
            Self::Datetime(v) => write!(f, "{}", v.format(DATETIME_FORMAT)),
            Self::Timestamp(v) => f.write_str(&v.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Self::Text(v) | Self::Json(v) | Self::JsonDocument(v) => f.write_str(v),
            Self::Bytes(v) => f.write_str(&String::from_utf8_lossy(v)),
        }
    }
}

/// A query parameter or result cell.
///
/// Optional values remember their kind even when absent, so an empty
/// `Int64?` parameter is still typed as `Int64` on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(Scalar),
    Optional {
        kind: ValueKind,
        value: Option<Scalar>,
    },
}

impl Value {
    #[must_use]
    pub const fn absent(kind: ValueKind) -> Self {
        Self::Optional { kind, value: None }
    }

    #[must_use]
    pub fn optional(scalar: Scalar) -> Self {
        Self::Optional {
            kind: scalar.kind(),
            value: Some(scalar),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Scalar(scalar) => scalar.kind(),
            Self::Optional { kind, .. } => *kind,
        }
    }

    #[must_use]
    pub const fn is_absent(&self) -> bool {
        matches!(self, Self::Optional { value: None, .. })
    }

    /// The carried scalar, looking through a present optional.
    #[must_use]
    pub const fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Scalar(scalar) => Some(scalar),
            Self::Optional { value, .. } => value.as_ref(),
        }
    }

    /// Canonical text, or `None` for an absent optional.
    #[must_use]
    pub fn to_text(&self) -> Option<String> {
        self.as_scalar().map(ToString::to_string)
    }
}

impl From<Scalar> for Value {
    fn from(scalar: Scalar) -> Self {
        Self::Scalar(scalar)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_scalar() {
            Some(scalar) => write!(f, "{scalar}"),
            None => f.write_str(ABSENT),
        }
    }
}

/// Renders a value for textual output, using [`ABSENT`] for missing optionals.
#[must_use]
pub fn render(value: &Value) -> String {
    value.to_string()
}

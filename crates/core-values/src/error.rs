use std::num::{ParseFloatError, ParseIntError};

use arrow_schema::ArrowError;
use snafu::prelude::*;
use strum::IntoStaticStr;

#[derive(Debug, Snafu, IntoStaticStr)]
#[snafu(visibility(pub(crate)))]
pub enum ConversionError {
    #[snafu(display("Unsupported YDB data type: {tag}"))]
    UnsupportedType { tag: String },

    #[snafu(display("Empty value for non-optional parameter of type {tag}"))]
    EmptyNonOptionalValue { tag: String },

    #[snafu(display("Malformed {tag} value '{text}': {source}"))]
    MalformedValue {
        tag: String,
        text: String,
        source: ParseValueError,
    },
}

/// Underlying failure of a single scalar parser.
#[derive(Debug, Snafu, IntoStaticStr)]
#[snafu(visibility(pub(crate)))]
pub enum ParseValueError {
    #[snafu(display("Illegal value for boolean: {text}"))]
    Boolean { text: String },

    #[snafu(display("{source}"))]
    Integer { source: ParseIntError },

    #[snafu(display("{source}"))]
    Float { source: ParseFloatError },

    #[snafu(display("{source}"))]
    Decimal { source: ArrowError },

    #[snafu(display("Decimal {text} has more than {scale} fraction digits"))]
    DecimalScale { text: String, scale: i8 },

    #[snafu(display("{source}"))]
    Temporal { source: chrono::ParseError },

    #[snafu(display("{source}"))]
    Base64 { source: base64::DecodeError },
}

pub type ConversionResult<T> = std::result::Result<T, ConversionError>;

//! Typed YDB values and the text conversion registry used to bind query
//! parameters and render result cells.

pub mod error;
pub mod registry;
pub mod value;

pub use error::{ConversionError, ConversionResult, ParseValueError};
pub use registry::{Conversion, ConversionRegistry};
pub use value::{ABSENT, Decimal, Scalar, Value, ValueKind, render};

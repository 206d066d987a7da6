use std::error::Error;
use std::fmt::Write;

use core_executor::{ExecutionError, RetryError, Status, TransportError};
use core_values::{ConversionError, ParseValueError};
use snafu::Location;

use crate::error::{ConfigError, SamplerError};

const LINK_SEPARATOR: &str = " *** | ";

/// Flattens an error and all of its sources into a single line.
///
/// Each link reads `{kind} at {location} -> {message}`; the location part is
/// left out for errors that do not record one.
#[must_use]
pub fn full_message(err: &(dyn Error + 'static)) -> String {
    let mut links = Vec::new();
    let mut current = Some(err);
    while let Some(link) = current {
        let (kind, location) = describe(link);
        let mut text = String::from(kind);
        if let Some(location) = location {
            let _ = write!(text, " at {location}");
        }
        let _ = write!(text, " -> {link}");
        links.push(text);
        current = link.source();
    }
    links.join(LINK_SEPARATOR)
}

fn describe<'a>(err: &'a (dyn Error + 'static)) -> (&'static str, Option<&'a Location>) {
    if let Some(err) = err.downcast_ref::<SamplerError>() {
        return (err.into(), Some(err.location()));
    }
    if let Some(err) = err.downcast_ref::<ConfigError>() {
        return (err.into(), Some(err.location()));
    }
    if let Some(err) = err.downcast_ref::<ExecutionError>() {
        return (err.into(), Some(err.location()));
    }
    if let Some(err) = err.downcast_ref::<RetryError>() {
        return (err.into(), None);
    }
    if let Some(err) = err.downcast_ref::<TransportError>() {
        return (err.into(), None);
    }
    if let Some(err) = err.downcast_ref::<ConversionError>() {
        return (err.into(), None);
    }
    if let Some(err) = err.downcast_ref::<ParseValueError>() {
        return (err.into(), None);
    }
    if err.is::<Status>() {
        return ("Status", None);
    }
    ("Error", None)
}

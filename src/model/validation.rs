use chrono::NaiveDate;
use snafu::{Snafu, ensure};

/// A wire model constraint that does not hold.
///
/// Every variant names the wire field it was raised for, so a caller can map
/// the failure back to its own input.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ValidationError {
    #[snafu(display("{field}: `{value}` is not a valid taxpayer id (INN)"))]
    InvalidInn { field: &'static str, value: String },

    #[snafu(display("{field}: `{value}` is not a hyphenated UUID"))]
    InvalidUuid { field: &'static str, value: String },

    #[snafu(display("{field}: `{value}` is not a YYYY-MM-DD date"))]
    InvalidDate { field: &'static str, value: String },

    #[snafu(display("{field}: `{value}` is shorter than {min} characters"))]
    TooShort {
        field: &'static str,
        value: String,
        min: usize,
    },

    #[snafu(display("{field}: `{value}` must be 1 to {max} decimal digits"))]
    NotDigits {
        field: &'static str,
        value: String,
        max: usize,
    },

    #[snafu(display("{field} is required"))]
    Missing { field: &'static str },
}

/// Types that can re-check their wire invariants after construction.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

pub(crate) fn hyphenated_uuid(field: &'static str, value: &str) -> Result<(), ValidationError> {
    // `Uuid::try_parse` also accepts the simple and braced forms; the API only takes 8-4-4-4-12.
    ensure!(
        value.len() == 36 && uuid::Uuid::try_parse(value).is_ok(),
        InvalidUuidSnafu { field, value }
    );
    Ok(())
}

pub(crate) fn iso_date(field: &'static str, value: &str) -> Result<(), ValidationError> {
    ensure!(
        value.len() == 10 && NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok(),
        InvalidDateSnafu { field, value }
    );
    Ok(())
}

pub(crate) fn min_chars(field: &'static str, value: &str, min: usize) -> Result<(), ValidationError> {
    ensure!(
        value.chars().count() >= min,
        TooShortSnafu { field, value, min }
    );
    Ok(())
}

pub(crate) fn digits(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    ensure!(
        !value.is_empty() && value.len() <= max && value.bytes().all(|b| b.is_ascii_digit()),
        NotDigitsSnafu { field, value, max }
    );
    Ok(())
}

pub(crate) fn present(field: &'static str, value: &str) -> Result<(), ValidationError> {
    ensure!(!value.is_empty(), MissingSnafu { field });
    Ok(())
}

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use snafu::ensure;

use super::validation::{InvalidInnSnafu, ValidationError};

const LEGAL_ENTITY_WEIGHTS: [u32; 9] = [2, 4, 10, 3, 5, 9, 4, 6, 8];
const FIRST_PERSONAL_WEIGHTS: [u32; 10] = [7, 2, 4, 10, 3, 5, 9, 4, 6, 8];
const SECOND_PERSONAL_WEIGHTS: [u32; 11] = [3, 7, 2, 4, 10, 3, 5, 9, 4, 6, 8];

/// Russian taxpayer identification number (INN).
///
/// Ten digits for legal entities, twelve for individuals, with the trailing
/// control digit(s) checked on construction. A `TaxpayerId` that exists is
/// always well-formed, including one produced by deserialization.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaxpayerId(String);

impl TaxpayerId {
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        Self::for_field("inn", value)
    }

    /// Like [`TaxpayerId::new`], reporting failures against a named wire field.
    pub fn for_field(field: &'static str, value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        ensure!(checksum_holds(&value), InvalidInnSnafu { field, value });
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is a twelve-digit (individual) number.
    pub fn is_individual(&self) -> bool {
        self.0.len() == 12
    }
}

fn checksum_holds(value: &str) -> bool {
    if !value.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let digits: Vec<u32> = value.bytes().map(|b| u32::from(b - b'0')).collect();
    match digits.len() {
        10 => control_digit(&digits, &LEGAL_ENTITY_WEIGHTS) == digits[9],
        12 => {
            control_digit(&digits, &FIRST_PERSONAL_WEIGHTS) == digits[10]
                && control_digit(&digits, &SECOND_PERSONAL_WEIGHTS) == digits[11]
        }
        _ => false,
    }
}

fn control_digit(digits: &[u32], weights: &[u32]) -> u32 {
    let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
    sum % 11 % 10
}

impl fmt::Display for TaxpayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for TaxpayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaxpayerId({})", self.0)
    }
}

impl FromStr for TaxpayerId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for TaxpayerId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TaxpayerId> for String {
    fn from(id: TaxpayerId) -> Self {
        id.0
    }
}

impl AsRef<str> for TaxpayerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

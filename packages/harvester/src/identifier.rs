//! Patent publication identifiers.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{HarvesterError, Result};

/// Canonical pattern: country code, number, kind code.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static IDENTIFIER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z]{1,2})(\d+)([A-Z]\d?)$").expect("valid regex"));

/// A validated patent publication identifier (e.g., `US8400417B2`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PatentIdentifier {
    country: String,
    number: String,
    kind: String,
}

impl PatentIdentifier {
    /// Country code, e.g. `US`.
    #[must_use]
    pub fn country(&self) -> &str {
        &self.country
    }

    /// Publication number without country and kind code.
    #[must_use]
    pub fn number(&self) -> &str {
        &self.number
    }

    /// Kind code, e.g. `B2`.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }
}

impl fmt::Display for PatentIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.country, self.number, self.kind)
    }
}

impl FromStr for PatentIdentifier {
    type Err = HarvesterError;

    fn from_str(s: &str) -> Result<Self> {
        validate(s)
    }
}

impl TryFrom<String> for PatentIdentifier {
    type Error = HarvesterError;

    fn try_from(value: String) -> Result<Self> {
        validate(&value)
    }
}

impl From<PatentIdentifier> for String {
    fn from(id: PatentIdentifier) -> Self {
        id.to_string()
    }
}

/// Validate and canonicalize a patent identifier.
///
/// Whitespace is removed anywhere in the input and letters are uppercased.
///
/// # Examples
/// ```
/// use patent_harvester::identifier::validate;
///
/// assert_eq!(validate(" us 8400417 b2 ").unwrap().to_string(), "US8400417B2");
/// assert!(validate("8400417").is_err());
/// ```
pub fn validate(raw: &str) -> Result<PatentIdentifier> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();

    let caps = IDENTIFIER_PATTERN
        .captures(&cleaned)
        .ok_or_else(|| HarvesterError::InvalidIdentifier(raw.to_string()))?;

    Ok(PatentIdentifier {
        country: caps[1].to_string(),
        number: caps[2].to_string(),
        kind: caps[3].to_string(),
    })
}

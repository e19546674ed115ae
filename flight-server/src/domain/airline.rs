//! Airline designator type.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when parsing an invalid airline designator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid airline code: {reason}")]
pub struct InvalidAirlineCode {
    reason: &'static str,
}

/// A valid 2-character IATA airline designator.
///
/// Designators are two uppercase ASCII alphanumerics with at least one
/// letter (e.g. "AA", "B6", "9W").
///
/// # Examples
///
/// ```
/// use flight_server::domain::AirlineCode;
///
/// let jetblue = AirlineCode::parse("B6").unwrap();
/// assert_eq!(jetblue.as_str(), "B6");
///
/// assert!(AirlineCode::parse("aa").is_err());
/// assert!(AirlineCode::parse("12").is_err());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AirlineCode([u8; 2]);

impl AirlineCode {
    /// Parse an airline designator from a string.
    pub fn parse(s: &str) -> Result<Self, InvalidAirlineCode> {
        let bytes = s.as_bytes();

        if bytes.len() != 2 {
            return Err(InvalidAirlineCode {
                reason: "must be exactly 2 characters",
            });
        }

        for &b in bytes {
            if !(b.is_ascii_uppercase() || b.is_ascii_digit()) {
                return Err(InvalidAirlineCode {
                    reason: "must be uppercase ASCII letters or digits",
                });
            }
        }

        if !bytes.iter().any(u8::is_ascii_uppercase) {
            return Err(InvalidAirlineCode {
                reason: "must contain at least one letter",
            });
        }

        Ok(AirlineCode([bytes[0], bytes[1]]))
    }

    /// Parse caller input, trimming whitespace and upper-casing first.
    pub fn parse_normalized(s: &str) -> Result<Self, InvalidAirlineCode> {
        Self::parse(&s.trim().to_ascii_uppercase())
    }

    /// Returns the designator as a string slice.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl fmt::Debug for AirlineCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AirlineCode({})", self.as_str())
    }
}

impl fmt::Display for AirlineCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for AirlineCode {
    type Error = InvalidAirlineCode;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AirlineCode> for String {
    fn from(code: AirlineCode) -> Self {
        code.as_str().to_string()
    }
}

/// Airline reference record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Airline {
    pub code: AirlineCode,
    pub name: String,
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn letter_pairs_parse(s in "[A-Z]{2}") {
            let code = AirlineCode::parse(&s).unwrap();
            prop_assert_eq!(code.as_str(), s.as_str());
        }

        #[test]
        fn wrong_length_rejected(s in "[A-Z]{0,1}|[A-Z]{3,8}") {
            prop_assert!(AirlineCode::parse(&s).is_err());
        }
    }
}

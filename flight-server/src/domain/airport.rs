//! Airport code and reference record types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when parsing an invalid IATA airport code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid IATA airport code: {reason}")]
pub struct InvalidIata {
    reason: &'static str,
}

/// A valid 3-letter IATA airport code.
///
/// IATA airport codes are always 3 uppercase ASCII letters. This type
/// guarantees that any `IataCode` value is valid by construction.
///
/// # Examples
///
/// ```
/// use flight_server::domain::IataCode;
///
/// let jfk = IataCode::parse("JFK").unwrap();
/// assert_eq!(jfk.as_str(), "JFK");
///
/// // Lowercase is rejected by the strict parser
/// assert!(IataCode::parse("jfk").is_err());
///
/// // ...but accepted by the normalizing one
/// assert_eq!(IataCode::parse_normalized(" jfk ").unwrap(), jfk);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IataCode([u8; 3]);

impl IataCode {
    /// Parse an IATA code from a string.
    ///
    /// The input must be exactly 3 uppercase ASCII letters (A-Z).
    pub fn parse(s: &str) -> Result<Self, InvalidIata> {
        let bytes = s.as_bytes();

        if bytes.len() != 3 {
            return Err(InvalidIata {
                reason: "must be exactly 3 characters",
            });
        }

        for &b in bytes {
            if !b.is_ascii_uppercase() {
                return Err(InvalidIata {
                    reason: "must be uppercase ASCII letters A-Z",
                });
            }
        }

        Ok(IataCode([bytes[0], bytes[1], bytes[2]]))
    }

    /// Parse caller input, trimming whitespace and upper-casing first.
    pub fn parse_normalized(s: &str) -> Result<Self, InvalidIata> {
        Self::parse(&s.trim().to_ascii_uppercase())
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        // Only ASCII uppercase letters are ever stored
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl fmt::Debug for IataCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IataCode({})", self.as_str())
    }
}

impl fmt::Display for IataCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for IataCode {
    type Error = InvalidIata;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<IataCode> for String {
    fn from(code: IataCode) -> Self {
        code.as_str().to_string()
    }
}

/// Airport reference record, owned by the reference-data collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Airport {
    pub code: IataCode,
    pub name: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_codes() {
        assert!(IataCode::parse("JFK").is_ok());
        assert!(IataCode::parse("LAX").is_ok());
        assert!(IataCode::parse("AAA").is_ok());
        assert!(IataCode::parse("ZZZ").is_ok());
    }

    #[test]
    fn reject_lowercase() {
        assert!(IataCode::parse("jfk").is_err());
        assert!(IataCode::parse("Jfk").is_err());
    }

    #[test]
    fn reject_wrong_length() {
        assert!(IataCode::parse("").is_err());
        assert!(IataCode::parse("JF").is_err());
        assert!(IataCode::parse("JFKX").is_err());
    }

    #[test]
    fn reject_non_letters() {
        assert!(IataCode::parse("J1K").is_err());
        assert!(IataCode::parse("J K").is_err());
        assert!(IataCode::parse("JÖK").is_err());
    }

    #[test]
    fn normalized_parse_trims_and_uppercases() {
        let code = IataCode::parse_normalized("  lax\n").unwrap();
        assert_eq!(code.as_str(), "LAX");
        assert!(IataCode::parse_normalized("la x").is_err());
    }

    #[test]
    fn display_and_debug() {
        let code = IataCode::parse("SFO").unwrap();
        assert_eq!(format!("{}", code), "SFO");
        assert_eq!(format!("{:?}", code), "IataCode(SFO)");
    }

    #[test]
    fn serde_as_plain_string() {
        let code = IataCode::parse("ORD").unwrap();
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, "\"ORD\"");
        let back: IataCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, code);
        assert!(serde_json::from_str::<IataCode>("\"ord\"").is_err());
    }
}

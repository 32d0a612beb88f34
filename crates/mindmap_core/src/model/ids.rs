//! Identifier parsing for client-supplied strings.
//!
//! `Uuid::parse_str` also accepts simple, braced and URN forms; clients must
//! send the canonical hyphenated form, so that shape is checked first.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

static HYPHENATED_UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("valid uuid regex")
});

/// A client-supplied identifier that is not a canonical UUID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidUuid(pub String);

impl Display for InvalidUuid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "malformed uuid `{}`", self.0)
    }
}

impl Error for InvalidUuid {}

/// Returns whether `value` is a canonical hyphenated UUID.
pub fn is_uuid(value: &str) -> bool {
    HYPHENATED_UUID_RE.is_match(value)
}

/// Parses a canonical hyphenated UUID, rejecting every other spelling.
pub fn parse_uuid(value: &str) -> Option<Uuid> {
    if !is_uuid(value) {
        return None;
    }
    Uuid::parse_str(value).ok()
}

/// Parses an optional reference where an empty string means "no reference".
///
/// Fails when a non-empty value is not a canonical UUID.
pub fn parse_optional_uuid(value: Option<&str>) -> Result<Option<Uuid>, InvalidUuid> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => parse_uuid(text)
            .map(Some)
            .ok_or_else(|| InvalidUuid(text.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::{is_uuid, parse_optional_uuid, parse_uuid, InvalidUuid};

    #[test]
    fn accepts_hyphenated_form_only() {
        assert!(is_uuid("7f1c2b7e-9a53-4d0b-8a3f-1f0f5b1e2c3d"));
        assert!(!is_uuid("not-a-uuid"));
        assert!(!is_uuid("7f1c2b7e9a534d0b8a3f1f0f5b1e2c3d"));
        assert!(!is_uuid("{7f1c2b7e-9a53-4d0b-8a3f-1f0f5b1e2c3d}"));
        assert!(!is_uuid(""));
    }

    #[test]
    fn parse_uuid_round_trips_canonical_text() {
        let text = "7f1c2b7e-9a53-4d0b-8a3f-1f0f5b1e2c3d";
        let parsed = parse_uuid(text).expect("canonical uuid should parse");
        assert_eq!(parsed.to_string(), text);
    }

    #[test]
    fn optional_reference_treats_blank_as_absent() {
        assert_eq!(parse_optional_uuid(None), Ok(None));
        assert_eq!(parse_optional_uuid(Some("")), Ok(None));
        assert_eq!(parse_optional_uuid(Some("  ")), Ok(None));
        assert_eq!(
            parse_optional_uuid(Some("nope")),
            Err(InvalidUuid("nope".to_string()))
        );
    }
}

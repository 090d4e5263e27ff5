//! Version identifiers recorded in the version store.
//!
//! The application hands the updater loosely formatted tags ("v93", "v1.94",
//! "1.95.2"). Every tag is canonicalized to `MAJOR.MINOR.PATCH` before it is
//! written anywhere:
//!
//! - a leading `v` is dropped
//! - three or more components keep the first three
//! - two components get a `0` patch
//! - a single number is a compact `MMmm` tag: `v93` is `1.93.0`, `v293` is `2.93.0`
//!
//! Rendering the result and parsing it again yields the same value.

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, UpdateError};

/// A normalized three-component version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct VersionString {
    /// Major version number.
    pub major: u32,
    /// Minor version number.
    pub minor: u32,
    /// Patch version number.
    pub patch: u32,
}

impl VersionString {
    /// Create a version from its components.
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Normalize a raw version tag.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::InvalidVersion`] when a component is empty or
    /// not a plain decimal number.
    pub fn normalize(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let body = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);

        let components = body
            .split('.')
            .map(|part| parse_component(part, raw))
            .collect::<Result<Vec<u32>>>()?;

        match components.as_slice() {
            [compact] => Ok(Self::from_compact(*compact)),
            [major, minor] => Ok(Self::new(*major, *minor, 0)),
            [major, minor, patch, ..] => Ok(Self::new(*major, *minor, *patch)),
            [] => Err(UpdateError::InvalidVersion(raw.to_string())),
        }
    }

    /// Decode a compact single-number tag (`93` -> `1.93.0`, `293` -> `2.93.0`).
    #[must_use]
    pub const fn from_compact(value: u32) -> Self {
        let major = value / 100;
        Self::new(if major == 0 { 1 } else { major }, value % 100, 0)
    }
}

fn parse_component(part: &str, raw: &str) -> Result<u32> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(UpdateError::InvalidVersion(raw.to_string()));
    }
    part.parse()
        .map_err(|_| UpdateError::InvalidVersion(raw.to_string()))
}

impl FromStr for VersionString {
    type Err = UpdateError;

    fn from_str(s: &str) -> Result<Self> {
        Self::normalize(s)
    }
}

impl fmt::Display for VersionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_tags() {
        assert_eq!(VersionString::normalize("v93").unwrap().to_string(), "1.93.0");
        assert_eq!(VersionString::normalize("v193").unwrap().to_string(), "1.93.0");
        assert_eq!(VersionString::normalize("293").unwrap().to_string(), "2.93.0");
        assert_eq!(VersionString::normalize("v5").unwrap().to_string(), "1.5.0");
    }

    #[test]
    fn test_component_range_is_u32() {
        assert_eq!(
            VersionString::normalize("1.4294967295").unwrap(),
            VersionString::new(1, u32::MAX, 0)
        );
        assert!(matches!(
            VersionString::normalize("v4294967296"),
            Err(UpdateError::InvalidVersion(raw)) if raw == "v4294967296"
        ));
    }

    #[test]
    fn test_dotted_tags() {
        assert_eq!(VersionString::normalize("v1.94").unwrap().to_string(), "1.94.0");
        assert_eq!(VersionString::normalize("1.95.2").unwrap().to_string(), "1.95.2");
        assert_eq!(
            VersionString::normalize("V2.0.1.7").unwrap(),
            VersionString::new(2, 0, 1)
        );
        assert_eq!(VersionString::normalize(" 01.02.03 ").unwrap().to_string(), "1.2.3");
    }

    #[test]
    fn test_invalid_tags() {
        for raw in ["", "v", "1..2", "1.2.x", "+1.2", "v-3", "1.2.", "vv1"] {
            assert!(
                matches!(
                    VersionString::normalize(raw),
                    Err(UpdateError::InvalidVersion(_))
                ),
                "expected {raw:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_normalized_form_is_stable() {
        let v = VersionString::normalize("v93").unwrap();
        assert_eq!(VersionString::normalize(&v.to_string()).unwrap(), v);
    }

    #[test]
    fn test_from_str() {
        let v: VersionString = "v1.2.3".parse().unwrap();
        assert_eq!(v, VersionString::new(1, 2, 3));
    }
}

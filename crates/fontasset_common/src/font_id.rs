//! Validated identifiers for uploaded fonts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Suffix reserved for the asset area that sits next to each font file.
pub const ASSET_AREA_SUFFIX: &str = "_assets";

/// A caller-chosen font identifier, safe to use as a single path component.
///
/// Identifiers usually carry the font's extension (`"roboto.ttf"`). They may
/// not contain path separators or NUL, may not start with `.`, and may not end
/// in the reserved `_assets` suffix, which would collide with another font's
/// asset area.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FontId(String);

/// Reasons a string is rejected as a [`FontId`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidFontId {
    /// The identifier is empty.
    #[error("font identifier must not be empty")]
    Empty,

    /// The identifier contains a path separator or NUL byte.
    #[error("font identifier '{0}' contains a forbidden character")]
    ForbiddenChar(String),

    /// The identifier starts with a dot.
    #[error("font identifier '{0}' must not start with '.'")]
    Hidden(String),

    /// The identifier ends with the reserved asset-area suffix.
    #[error("font identifier '{0}' must not end with '{ASSET_AREA_SUFFIX}'")]
    ReservedSuffix(String),
}

impl FontId {
    /// Validates and wraps an identifier.
    pub fn new(id: impl Into<String>) -> Result<Self, InvalidFontId> {
        let id = id.into();
        if id.is_empty() {
            return Err(InvalidFontId::Empty);
        }
        if id.contains(['/', '\\', '\0']) {
            return Err(InvalidFontId::ForbiddenChar(id));
        }
        if id.starts_with('.') {
            return Err(InvalidFontId::Hidden(id));
        }
        if id.ends_with(ASSET_AREA_SUFFIX) {
            return Err(InvalidFontId::ReservedSuffix(id));
        }
        Ok(Self(id))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the directory name of this font's asset area.
    pub fn asset_area_name(&self) -> String {
        format!("{}{ASSET_AREA_SUFFIX}", self.0)
    }
}

impl FromStr for FontId {
    type Err = InvalidFontId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for FontId {
    type Error = InvalidFontId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FontId> for String {
    fn from(id: FontId) -> Self {
        id.0
    }
}

impl fmt::Display for FontId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_file_name() {
        let id = FontId::new("OpenSans-Regular.ttf").unwrap();
        assert_eq!(id.as_str(), "OpenSans-Regular.ttf");
        assert_eq!(id.asset_area_name(), "OpenSans-Regular.ttf_assets");
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(FontId::new(""), Err(InvalidFontId::Empty));
    }

    #[test]
    fn rejects_separators() {
        assert!(matches!(
            FontId::new("../etc/passwd"),
            Err(InvalidFontId::ForbiddenChar(_))
        ));
        assert!(matches!(
            FontId::new("a\\b"),
            Err(InvalidFontId::ForbiddenChar(_))
        ));
    }

    #[test]
    fn rejects_hidden() {
        assert!(matches!(FontId::new(".."), Err(InvalidFontId::Hidden(_))));
        assert!(matches!(
            FontId::new(".font.ttf"),
            Err(InvalidFontId::Hidden(_))
        ));
    }

    #[test]
    fn rejects_reserved_suffix() {
        let err = FontId::new("roboto_assets").unwrap_err();
        assert!(err.to_string().contains("_assets"));
    }

    #[test]
    fn serde_validates() {
        let id: FontId = serde_json::from_str("\"roboto.ttf\"").unwrap();
        assert_eq!(id.to_string(), "roboto.ttf");
        assert!(serde_json::from_str::<FontId>("\"a/b\"").is_err());
    }
}

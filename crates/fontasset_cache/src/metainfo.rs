//! Asset set metadata documents.
//!
//! Each published asset set directory holds a `metainfo.json` recording the
//! originating parameters and where each generated file lives. The document is
//! the last thing written before a set is published, so its presence marks the
//! set as complete.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use fontasset_common::Fingerprint;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::params::ParameterRecord;

/// Name of the metadata document within an asset set directory.
pub const METAINFO_FILE: &str = "metainfo.json";

/// Current metadata format version. Documents with another version are
/// treated as absent.
pub const METAINFO_FORMAT_VERSION: u32 = 1;

/// The closed set of artifacts the generator produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetType {
    /// The distance-field atlas image.
    DistanceField,
    /// The glyph layout description.
    FontDescription,
}

impl AssetType {
    /// Every asset type, in publication order.
    pub const ALL: [AssetType; 2] = [AssetType::DistanceField, AssetType::FontDescription];

    /// Returns the type's external name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DistanceField => "distance-field",
            Self::FontDescription => "font-description",
        }
    }

    /// Returns the file name the generator writes for this type.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::DistanceField => "atlas.png",
            Self::FontDescription => "atlas.fnt",
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown asset type '{s}'"))
    }
}

/// Descriptor of one stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// Display name offered to downloaders.
    pub identifier: String,
}

/// The persisted result of one generation run for one (font, fingerprint).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSet {
    /// Metadata format version.
    pub format_version: u32,
    /// Fingerprint of `parameters`; equals the directory name.
    pub fingerprint: Fingerprint,
    /// The parameters the set was generated from.
    pub parameters: ParameterRecord,
    /// Generated files by type.
    pub assets: BTreeMap<AssetType, StoredFile>,
}

impl AssetSet {
    /// Creates a set at the current format version.
    pub fn new(
        fingerprint: Fingerprint,
        parameters: ParameterRecord,
        assets: BTreeMap<AssetType, StoredFile>,
    ) -> Self {
        Self {
            format_version: METAINFO_FORMAT_VERSION,
            fingerprint,
            parameters,
            assets,
        }
    }

    /// Loads the metadata document from `dir`.
    ///
    /// Returns `Ok(None)` if the document does not exist. A document that
    /// exists but cannot be parsed is an error.
    pub fn load(dir: &Path) -> Result<Option<Self>, CacheError> {
        let path = dir.join(METAINFO_FILE);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::io(path, e)),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| CacheError::Metadata {
                path,
                reason: e.to_string(),
            })
    }

    /// Writes the metadata document into `dir`.
    pub fn save(&self, dir: &Path) -> Result<(), CacheError> {
        let path = dir.join(METAINFO_FILE);
        let json = serde_json::to_string_pretty(self).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;
        std::fs::write(&path, json).map_err(|e| CacheError::io(path, e))
    }

    /// Checks that the document describes a complete set for `expected`.
    ///
    /// Returns a description of the first inconsistency found.
    pub fn check_consistency(&self, expected: &Fingerprint) -> Result<(), String> {
        if self.format_version != METAINFO_FORMAT_VERSION {
            return Err(format!(
                "format version {} (expected {METAINFO_FORMAT_VERSION})",
                self.format_version
            ));
        }
        if self.fingerprint != *expected {
            return Err(format!("records fingerprint {}", self.fingerprint));
        }
        if self.assets.is_empty() {
            return Err("lists no assets".to_string());
        }
        Ok(())
    }

    /// Returns the stored file for `asset_type`, if the set has one.
    pub fn file(&self, asset_type: AssetType) -> Option<&StoredFile> {
        self.assets.get(&asset_type)
    }
}

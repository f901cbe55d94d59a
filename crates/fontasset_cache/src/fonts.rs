//! Uploaded font files.

use std::io::Write;
use std::path::{Path, PathBuf};

use fontasset_common::FontId;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::error::CacheError;

/// Resolves font identifiers to font files.
pub trait FontRepository: Send + Sync {
    /// Returns the absolute path of the font file, or
    /// [`CacheError::FontNotFound`].
    fn resolve(&self, font: &FontId) -> Result<PathBuf, CacheError>;
}

/// A stored font.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FontEntry {
    /// The font identifier, including its extension.
    pub identifier: FontId,
    /// The extension with its leading dot (e.g. `".ttf"`), or empty.
    pub format: String,
    /// Absolute path of the font file.
    pub path: PathBuf,
}

/// Font files stored flat in the fonts directory.
#[derive(Debug, Clone)]
pub struct FontStore {
    fonts_dir: PathBuf,
}

impl FontStore {
    /// Creates a store rooted at the given fonts directory.
    pub fn new(fonts_dir: &Path) -> Result<Self, CacheError> {
        let fonts_dir = std::path::absolute(fonts_dir).map_err(|e| CacheError::io(fonts_dir, e))?;
        Ok(Self { fonts_dir })
    }

    /// Stores a new font. An identifier that is already taken is rejected
    /// with [`CacheError::FontExists`]; fonts are never replaced.
    ///
    /// The bytes are written to a hidden temporary file that is then
    /// persisted without clobbering, so the font appears complete or not at
    /// all.
    pub fn upload(&self, font: &FontId, data: &[u8]) -> Result<FontEntry, CacheError> {
        std::fs::create_dir_all(&self.fonts_dir)
            .map_err(|e| CacheError::io(&self.fonts_dir, e))?;

        let path = self.fonts_dir.join(font.as_str());
        let mut tmp =
            NamedTempFile::new_in(&self.fonts_dir).map_err(|e| CacheError::io(&self.fonts_dir, e))?;
        tmp.write_all(data)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| CacheError::io(tmp.path(), e))?;
        match tmp.persist_noclobber(&path) {
            Ok(_) => {}
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(CacheError::FontExists { font: font.clone() });
            }
            Err(e) => return Err(CacheError::io(&path, e.error)),
        }

        tracing::info!(font = %font, bytes = data.len(), "stored font");
        Ok(entry(font.clone(), path))
    }

    /// Uploads a font from a local file.
    ///
    /// The identifier defaults to the file stem and the format to its
    /// extension; the stored identifier is `identifier + format`.
    pub fn upload_file(
        &self,
        source: &Path,
        identifier: Option<&str>,
        format: Option<&str>,
    ) -> Result<FontEntry, CacheError> {
        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        let ext = source
            .extension()
            .and_then(|s| s.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        let identifier = identifier.filter(|s| !s.is_empty()).unwrap_or(stem);
        let format = format.filter(|s| !s.is_empty()).unwrap_or(ext.as_str());

        let font = FontId::new(format!("{identifier}{format}")).map_err(|e| {
            CacheError::InvalidParameters {
                reason: e.to_string(),
            }
        })?;
        let data = std::fs::read(source).map_err(|e| CacheError::io(source, e))?;
        self.upload(&font, &data)
    }

    /// Lists stored fonts, sorted by identifier.
    pub fn list(&self) -> Result<Vec<FontEntry>, CacheError> {
        let entries = match std::fs::read_dir(&self.fonts_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CacheError::io(&self.fonts_dir, e)),
        };

        let mut fonts = Vec::new();
        for dirent in entries {
            let dirent = dirent.map_err(|e| CacheError::io(&self.fonts_dir, e))?;
            let is_file = dirent.file_type().map(|t| t.is_file()).unwrap_or(false);
            let Some(font) = dirent
                .file_name()
                .to_str()
                .and_then(|name| FontId::new(name).ok())
            else {
                continue;
            };
            if is_file {
                fonts.push(entry(font, dirent.path()));
            }
        }
        fonts.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        Ok(fonts)
    }

    /// Returns the entry for a stored font.
    pub fn get(&self, font: &FontId) -> Result<FontEntry, CacheError> {
        let path = self.resolve(font)?;
        Ok(entry(font.clone(), path))
    }
}

impl FontRepository for FontStore {
    fn resolve(&self, font: &FontId) -> Result<PathBuf, CacheError> {
        let path = self.fonts_dir.join(font.as_str());
        if path.is_file() {
            Ok(path)
        } else {
            Err(CacheError::FontNotFound { font: font.clone() })
        }
    }
}

fn entry(identifier: FontId, path: PathBuf) -> FontEntry {
    let format = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();
    FontEntry {
        identifier,
        format,
        path,
    }
}

//! Filesystem-backed asset store.
//!
//! Layout under the fonts directory:
//!
//! ```text
//! <fonts_dir>/<font>                          uploaded font file
//! <fonts_dir>/<font>_assets/<fp>/             published asset set
//! <fonts_dir>/<font>_assets/<fp>/metainfo.json
//! <fonts_dir>/<font>_assets/.<fp>.partial/    reservation and generator workdir
//! <fonts_dir>/<font>_assets/.<fp>.trash-*/    replaced set awaiting deletion
//! ```
//!
//! Creating `.<fp>.partial` with an exclusive `create_dir` is the only way
//! into generation for a key, and every change to `<fp>/` happens while that
//! reservation is held. Publication renames the fully written reservation
//! onto `<fp>/`, so a reader sees either the complete set or nothing.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use fontasset_common::font_id::ASSET_AREA_SUFFIX;
use fontasset_common::{Fingerprint, FontId};

use crate::error::CacheError;
use crate::generator::GeneratedFiles;
use crate::metainfo::{AssetSet, StoredFile, METAINFO_FILE};
use crate::params::ParameterRecord;

/// Suffix of reservation directories.
const PARTIAL_SUFFIX: &str = ".partial";

/// Marker inside the names of replaced sets awaiting deletion.
const TRASH_MARKER: &str = ".trash-";

static TRASH_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Result of trying to reserve a key for publication.
#[derive(Debug)]
pub enum Reservation {
    /// The key is now exclusively held by the caller.
    Acquired(PublishSlot),
    /// A complete set exists and overwrite was not requested.
    Existing(AssetSet),
    /// Another caller holds the reservation.
    Busy,
}

/// An exclusive, uncommitted claim on one asset set location.
///
/// The reservation directory doubles as the generator's working directory.
/// Dropping an uncommitted slot removes the directory, so an early return or
/// panic between reservation and commit returns the key to absent.
#[derive(Debug)]
pub struct PublishSlot {
    font: FontId,
    fingerprint: Fingerprint,
    dir: PathBuf,
    target: PathBuf,
    armed: bool,
}

impl PublishSlot {
    /// Returns the reservation directory.
    pub fn workdir(&self) -> &Path {
        &self.dir
    }

    /// Returns the reserved fingerprint.
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Returns the font this slot belongs to.
    pub fn font(&self) -> &FontId {
        &self.font
    }

    fn release(mut self) -> Result<(), CacheError> {
        self.armed = false;
        std::fs::remove_dir_all(&self.dir).map_err(|e| CacheError::io(&self.dir, e))
    }
}

impl Drop for PublishSlot {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        tracing::warn!(
            font = %self.font,
            fingerprint = %self.fingerprint.short(),
            "dropping uncommitted reservation"
        );
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            tracing::warn!(path = %self.dir.display(), error = %e, "failed to remove reservation");
        }
    }
}

/// Durable mapping from (font, fingerprint) to an [`AssetSet`].
#[derive(Debug, Clone)]
pub struct AssetStore {
    fonts_dir: PathBuf,
}

impl AssetStore {
    /// Creates a store rooted at the given fonts directory.
    ///
    /// The root is made absolute so that published file paths stay valid
    /// regardless of the process working directory.
    pub fn new(fonts_dir: &Path) -> Result<Self, CacheError> {
        let fonts_dir = std::path::absolute(fonts_dir).map_err(|e| CacheError::io(fonts_dir, e))?;
        Ok(Self { fonts_dir })
    }

    /// Returns the root fonts directory.
    pub fn fonts_dir(&self) -> &Path {
        &self.fonts_dir
    }

    /// Returns the asset area of a font.
    pub fn asset_area(&self, font: &FontId) -> PathBuf {
        self.fonts_dir.join(font.asset_area_name())
    }

    /// Returns the directory a published set lives in.
    pub fn set_dir(&self, font: &FontId, fp: &Fingerprint) -> PathBuf {
        self.asset_area(font).join(fp.to_string())
    }

    fn reservation_dir(&self, font: &FontId, fp: &Fingerprint) -> PathBuf {
        self.asset_area(font).join(format!(".{fp}{PARTIAL_SUFFIX}"))
    }

    /// Returns `true` iff a complete, consistent set is published for the key.
    pub fn exists(&self, font: &FontId, fp: &Fingerprint) -> bool {
        matches!(self.load_published(font, fp), Ok(Some(_)))
    }

    /// Reads a published set.
    pub fn read(&self, font: &FontId, fp: &Fingerprint) -> Result<AssetSet, CacheError> {
        self.load_published(font, fp)?
            .ok_or_else(|| CacheError::AssetNotFound {
                font: font.clone(),
                fingerprint: *fp,
            })
    }

    /// Lists the fingerprints of published sets, sorted.
    ///
    /// Reservations, trash and entries without a readable, consistent
    /// metadata document are skipped, matching [`exists`](Self::exists). A font with no asset area has no sets.
    pub fn list(&self, font: &FontId) -> Result<Vec<Fingerprint>, CacheError> {
        let area = self.asset_area(font);
        let entries = match std::fs::read_dir(&area) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CacheError::io(area, e)),
        };

        let mut fingerprints = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CacheError::io(&area, e))?;
            let Some(fp) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.parse::<Fingerprint>().ok())
            else {
                continue;
            };
            match self.load_published(font, &fp) {
                Ok(Some(_)) => fingerprints.push(fp),
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(font = %font, fingerprint = %fp.short(), error = %e, "skipping unreadable asset set");
                }
            }
        }
        fingerprints.sort();
        Ok(fingerprints)
    }

    /// Attempts to reserve the key for publication.
    ///
    /// The reservation is taken first. Only while holding it does the store
    /// look at the published location: an existing complete set is returned
    /// as [`Reservation::Existing`] (and the reservation released) unless
    /// `overwrite` is set, in which case the old set is removed before the
    /// slot is handed out. A directory without a consistent metadata document
    /// is treated as absent and cleared.
    pub fn begin_publish(
        &self,
        font: &FontId,
        fp: &Fingerprint,
        overwrite: bool,
    ) -> Result<Reservation, CacheError> {
        let area = self.asset_area(font);
        std::fs::create_dir_all(&area).map_err(|e| CacheError::io(&area, e))?;

        let dir = self.reservation_dir(font, fp);
        match std::fs::create_dir(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                tracing::debug!(font = %font, fingerprint = %fp.short(), "key is reserved");
                return Ok(Reservation::Busy);
            }
            Err(e) => return Err(CacheError::io(dir, e)),
        }

        let slot = PublishSlot {
            font: font.clone(),
            fingerprint: *fp,
            dir,
            target: self.set_dir(font, fp),
            armed: true,
        };
        tracing::debug!(font = %font, fingerprint = %fp.short(), "reserved key");

        match self.load_published(font, fp) {
            Ok(Some(existing)) if !overwrite => {
                slot.release()?;
                return Ok(Reservation::Existing(existing));
            }
            Ok(Some(_)) => {
                tracing::info!(font = %font, fingerprint = %fp.short(), "replacing asset set");
                self.discard(&area, &slot.target)?;
            }
            Ok(None) => {
                if slot.target.exists() {
                    tracing::warn!(
                        font = %font,
                        fingerprint = %fp.short(),
                        "clearing incomplete asset set directory"
                    );
                    self.discard(&area, &slot.target)?;
                }
            }
            Err(CacheError::Metadata { reason, .. }) => {
                tracing::warn!(
                    font = %font,
                    fingerprint = %fp.short(),
                    reason = %reason,
                    "clearing asset set with unreadable metadata"
                );
                self.discard(&area, &slot.target)?;
            }
            Err(e) => return Err(e),
        }

        Ok(Reservation::Acquired(slot))
    }

    /// Publishes the files generated into `slot`.
    ///
    /// Each declared file is resolved by name inside the reservation and must
    /// exist there. The metadata document is written last, then the whole
    /// reservation is renamed onto the published location in one step.
    pub fn commit(
        &self,
        mut slot: PublishSlot,
        record: &ParameterRecord,
        files: &GeneratedFiles,
    ) -> Result<AssetSet, CacheError> {
        if files.is_empty() {
            return Err(CacheError::Metadata {
                path: slot.dir.clone(),
                reason: "no assets to publish".to_string(),
            });
        }
        if record.fingerprint() != slot.fingerprint {
            return Err(CacheError::Metadata {
                path: slot.dir.clone(),
                reason: "parameters do not match the reserved fingerprint".to_string(),
            });
        }

        let mut assets = BTreeMap::new();
        for (asset_type, file) in files {
            let Some(name) = file.path.file_name() else {
                return Err(CacheError::Metadata {
                    path: file.path.clone(),
                    reason: format!("{asset_type} has no file name"),
                });
            };
            let staged = slot.dir.join(name);
            if !staged.is_file() {
                return Err(CacheError::Metadata {
                    path: staged,
                    reason: format!("declared {asset_type} file is missing"),
                });
            }
            assets.insert(
                *asset_type,
                StoredFile {
                    path: slot.target.join(name),
                    identifier: file.identifier.clone(),
                },
            );
        }

        let set = AssetSet::new(slot.fingerprint, record.clone(), assets);
        set.save(&slot.dir)?;
        std::fs::rename(&slot.dir, &slot.target).map_err(|e| CacheError::io(&slot.target, e))?;
        slot.armed = false;

        tracing::info!(
            font = %slot.font,
            fingerprint = %slot.fingerprint.short(),
            "published asset set"
        );
        Ok(set)
    }

    /// Removes an uncommitted reservation.
    pub fn abandon(&self, slot: PublishSlot) -> Result<(), CacheError> {
        tracing::debug!(
            font = %slot.font,
            fingerprint = %slot.fingerprint.short(),
            "abandoning reservation"
        );
        slot.release()
    }

    /// Removes reservations and trash older than `max_age` in every asset area.
    ///
    /// Reservations only outlive their owner when the owning process died;
    /// run this before serving, with `max_age` longer than any generation.
    /// Returns the number of directories removed.
    pub fn sweep(&self, max_age: Duration) -> Result<usize, CacheError> {
        let entries = match std::fs::read_dir(&self.fonts_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(CacheError::io(&self.fonts_dir, e)),
        };

        let now = SystemTime::now();
        let mut removed = 0;
        for entry in entries {
            let entry = entry.map_err(|e| CacheError::io(&self.fonts_dir, e))?;
            let is_area = entry
                .file_name()
                .to_str()
                .is_some_and(|n| n.ends_with(ASSET_AREA_SUFFIX));
            if !is_area || !entry.path().is_dir() {
                continue;
            }

            let area = entry.path();
            let children = std::fs::read_dir(&area).map_err(|e| CacheError::io(&area, e))?;
            for child in children {
                let child = child.map_err(|e| CacheError::io(&area, e))?;
                let name = child.file_name();
                let Some(name) = name.to_str() else { continue };
                let leftover = name.starts_with('.')
                    && (name.ends_with(PARTIAL_SUFFIX) || name.contains(TRASH_MARKER));
                if !leftover {
                    continue;
                }
                let age = child
                    .metadata()
                    .and_then(|m| m.modified())
                    .ok()
                    .and_then(|modified| now.duration_since(modified).ok())
                    .unwrap_or_default();
                if age < max_age {
                    continue;
                }
                let path = child.path();
                tracing::warn!(path = %path.display(), age = ?age, "removing stale leftover");
                std::fs::remove_dir_all(&path).map_err(|e| CacheError::io(&path, e))?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Loads the published set for the key.
    ///
    /// `Ok(None)` means no metadata document. A document that is unreadable
    /// or inconsistent with the key is a [`CacheError::Metadata`].
    fn load_published(
        &self,
        font: &FontId,
        fp: &Fingerprint,
    ) -> Result<Option<AssetSet>, CacheError> {
        let dir = self.set_dir(font, fp);
        let Some(set) = AssetSet::load(&dir)? else {
            return Ok(None);
        };
        set.check_consistency(fp)
            .map_err(|reason| CacheError::Metadata {
                path: dir.join(METAINFO_FILE),
                reason,
            })?;
        Ok(Some(set))
    }

    /// Moves `target` aside and deletes it.
    ///
    /// The rename is atomic, so readers never see a half-deleted set. A
    /// failure to delete the moved-aside copy is left for [`sweep`](Self::sweep).
    fn discard(&self, area: &Path, target: &Path) -> Result<(), CacheError> {
        let stem = target
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("set");
        let trash = area.join(format!(
            ".{stem}{TRASH_MARKER}{}-{}",
            std::process::id(),
            TRASH_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::rename(target, &trash).map_err(|e| CacheError::io(target, e))?;
        if let Err(e) = std::fs::remove_dir_all(&trash) {
            tracing::warn!(path = %trash.display(), error = %e, "failed to delete replaced asset set");
        }
        Ok(())
    }
}

//! High-level cache orchestrator.
//!
//! [`AssetCache`] ties the font repository, asset store and generator
//! together. Each (font, fingerprint) key moves through
//!
//! ```text
//! ABSENT -> GENERATING -> READY
//!                      -> ABSENT   (generation failed)
//! READY  -> GENERATING             (forced regeneration)
//! ```
//!
//! GENERATING is the store's reservation; only its holder runs the
//! generator, and every other caller for the key waits for it to settle.

use std::thread;
use std::time::{Duration, Instant};

use fontasset_common::{Fingerprint, FontId};

use crate::error::CacheError;
use crate::fonts::FontRepository;
use crate::generator::Generator;
use crate::metainfo::AssetSet;
use crate::params::ParameterRecord;
use crate::store::{AssetStore, Reservation};

/// Default time a caller waits for another caller's generation.
const DEFAULT_RESERVATION_WAIT: Duration = Duration::from_secs(600);

/// Default interval between reservation attempts while waiting.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Tuning for callers that find a key being generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
    /// How long to wait for a reserved key before giving up with
    /// [`CacheError::Busy`].
    pub reservation_wait: Duration,
    /// Delay between reservation attempts.
    pub poll_interval: Duration,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            reservation_wait: DEFAULT_RESERVATION_WAIT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Result of [`AssetCache::get_or_create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// This call generated and published the set.
    Created(AssetSet),
    /// A set already existed for the key; it is returned unchanged.
    Conflict(AssetSet),
}

impl Outcome {
    /// Returns the asset set regardless of how it was obtained.
    pub fn asset_set(&self) -> &AssetSet {
        match self {
            Self::Created(set) | Self::Conflict(set) => set,
        }
    }

    /// Consumes the outcome, returning the asset set.
    pub fn into_asset_set(self) -> AssetSet {
        match self {
            Self::Created(set) | Self::Conflict(set) => set,
        }
    }

    /// Returns `true` if this call created the set.
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }

    /// Returns the outcome's external name.
    pub fn status(&self) -> &'static str {
        match self {
            Self::Created(_) => "created",
            Self::Conflict(_) => "conflict",
        }
    }
}

/// Content-addressed cache of generated font assets.
pub struct AssetCache<F, G> {
    store: AssetStore,
    fonts: F,
    generator: G,
    options: CacheOptions,
}

impl<F: FontRepository, G: Generator> AssetCache<F, G> {
    /// Creates a cache over the given store, fonts and generator.
    pub fn new(store: AssetStore, fonts: F, generator: G, options: CacheOptions) -> Self {
        Self {
            store,
            fonts,
            generator,
            options,
        }
    }

    /// Returns the underlying asset store.
    pub fn store(&self) -> &AssetStore {
        &self.store
    }

    /// Returns the font repository.
    pub fn fonts(&self) -> &F {
        &self.fonts
    }

    /// Returns the asset set for `record`, generating it if needed.
    ///
    /// The font is resolved before anything is written, so an unknown font
    /// leaves no trace. Without `force` an existing set is returned as
    /// [`Outcome::Conflict`]; with `force` it is deleted and regenerated.
    /// A failed generation leaves the key absent.
    pub fn get_or_create(
        &self,
        font: &FontId,
        record: &ParameterRecord,
        force: bool,
    ) -> Result<Outcome, CacheError> {
        let font_path = self.fonts.resolve(font)?;
        record.validate()?;
        let fp = record.fingerprint();

        let started = Instant::now();
        let slot = loop {
            match self.store.begin_publish(font, &fp, force)? {
                Reservation::Acquired(slot) => break slot,
                Reservation::Existing(set) => {
                    tracing::debug!(font = %font, fingerprint = %fp.short(), "asset set exists");
                    return Ok(Outcome::Conflict(set));
                }
                Reservation::Busy => {
                    let waited = started.elapsed();
                    if waited >= self.options.reservation_wait {
                        tracing::warn!(
                            font = %font,
                            fingerprint = %fp.short(),
                            waited = ?waited,
                            "gave up waiting for in-progress generation"
                        );
                        return Err(CacheError::Busy {
                            font: font.clone(),
                            fingerprint: fp,
                            waited,
                        });
                    }
                    let remaining = self.options.reservation_wait - waited;
                    thread::sleep(self.options.poll_interval.min(remaining));
                }
            }
        };

        tracing::debug!(font = %font, fingerprint = %fp.short(), "generating asset set");
        match self.generator.generate(&font_path, record, slot.workdir()) {
            Ok(files) => {
                let set = match self.store.commit(slot, record, &files) {
                    Ok(set) => set,
                    Err(e) => {
                        tracing::warn!(
                            font = %font,
                            fingerprint = %fp.short(),
                            storage = e.is_storage(),
                            error = %e,
                            "failed to publish asset set"
                        );
                        return Err(e);
                    }
                };
                tracing::info!(
                    font = %font,
                    fingerprint = %fp.short(),
                    elapsed = ?started.elapsed(),
                    "created asset set"
                );
                Ok(Outcome::Created(set))
            }
            Err(e) => {
                tracing::warn!(
                    font = %font,
                    fingerprint = %fp.short(),
                    error = %e,
                    "generation failed"
                );
                if let Err(cleanup) = self.store.abandon(slot) {
                    tracing::warn!(error = %cleanup, "failed to remove reservation");
                }
                Err(e.into())
            }
        }
    }

    /// Reads a published asset set.
    pub fn get(&self, font: &FontId, fp: &Fingerprint) -> Result<AssetSet, CacheError> {
        self.fonts.resolve(font)?;
        self.store.read(font, fp)
    }

    /// Returns `true` iff the font exists and a complete set is published
    /// for the key.
    pub fn exists(&self, font: &FontId, fp: &Fingerprint) -> bool {
        self.fonts.resolve(font).is_ok() && self.store.exists(font, fp)
    }

    /// Lists the fingerprints of a font's published sets.
    pub fn list(&self, font: &FontId) -> Result<Vec<Fingerprint>, CacheError> {
        self.fonts.resolve(font)?;
        self.store.list(font)
    }

    /// Removes reservations and trash left behind by dead processes.
    pub fn sweep(&self, max_age: Duration) -> Result<usize, CacheError> {
        self.store.sweep(max_age)
    }
}

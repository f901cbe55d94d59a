//! Content-addressed cache of generated font assets.
//!
//! A parameter record is canonicalized into a [`Fingerprint`], which names
//! one directory in a font's asset area. The [`AssetCache`] orchestrator
//! reserves that directory exclusively, runs the external generator inside
//! it, and publishes the result atomically so readers only ever see complete
//! asset sets.

#![warn(missing_docs)]

pub mod cache;
pub mod error;
pub mod fonts;
pub mod generator;
pub mod hasher;
pub mod metainfo;
pub mod params;
pub mod store;

pub use cache::{AssetCache, CacheOptions, Outcome};
pub use error::{CacheError, GenerationError};
pub use fonts::{FontEntry, FontRepository, FontStore};
pub use generator::{command_args, CommandGenerator, GeneratedFiles, Generator};
pub use hasher::{canonical_form, fingerprint, ParamValue};
pub use metainfo::{AssetSet, AssetType, StoredFile};
pub use params::{DistanceField, Downsampling, Packing, ParameterRecord};
pub use store::{AssetStore, PublishSlot, Reservation};

pub use fontasset_common::{Fingerprint, FontId};

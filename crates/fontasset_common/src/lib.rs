//! Shared foundational types used across the fontasset workspace.
//!
//! This crate provides the content fingerprint that names a generated asset
//! set and the validated font identifier that names an uploaded font.

#![warn(missing_docs)]

pub mod fingerprint;
pub mod font_id;

pub use fingerprint::{Fingerprint, ParseFingerprintError};
pub use font_id::{FontId, InvalidFontId};

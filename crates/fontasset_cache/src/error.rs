//! Error types for cache operations.

use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use fontasset_common::{Fingerprint, FontId};

/// Errors that can occur during cache operations.
///
/// A conflict with an existing asset set is not an error: it is reported as
/// [`Outcome::Conflict`](crate::Outcome::Conflict). Of the variants below only
/// the two not-found cases are routine; see [`CacheError::is_routine`].
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The font identifier does not resolve to an uploaded font.
    #[error("font '{font}' not found")]
    FontNotFound {
        /// The unresolved identifier.
        font: FontId,
    },

    /// No complete asset set exists for the key.
    #[error("asset set {fingerprint} not found for font '{font}'")]
    AssetNotFound {
        /// The font identifier.
        font: FontId,
        /// The requested fingerprint.
        fingerprint: Fingerprint,
    },

    /// A font with this identifier has already been uploaded.
    #[error("font '{font}' already exists")]
    FontExists {
        /// The duplicate identifier.
        font: FontId,
    },

    /// The key stayed reserved by another caller for the whole wait budget.
    #[error("asset set {fingerprint} for font '{font}' is still being generated after {waited:?}")]
    Busy {
        /// The font identifier.
        font: FontId,
        /// The reserved fingerprint.
        fingerprint: Fingerprint,
        /// How long this caller waited.
        waited: Duration,
    },

    /// The parameter record failed validation.
    #[error("invalid parameters: {reason}")]
    InvalidParameters {
        /// Description of the rejected value.
        reason: String,
    },

    /// The external generator failed.
    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// An I/O error occurred while reading or writing the store.
    #[error("storage I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A metadata document exists but is unreadable or inconsistent.
    #[error("invalid metadata at {path}: {reason}")]
    Metadata {
        /// The metadata file path.
        path: PathBuf,
        /// Description of the problem.
        reason: String,
    },

    /// A serialization error occurred.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },
}

impl CacheError {
    /// Builds an [`CacheError::Io`] for `path`.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` for expected outcomes that callers report without alarm.
    pub fn is_routine(&self) -> bool {
        matches!(self, Self::FontNotFound { .. } | Self::AssetNotFound { .. })
    }

    /// Returns `true` for filesystem-level failures.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::Metadata { .. } | Self::Serialization { .. }
        )
    }
}

/// Failures of the external generator process.
///
/// Every variant produced after the process started carries its captured
/// standard output and standard error for diagnosis.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The generator could not be started.
    #[error("failed to start generator {program}: {source}")]
    Spawn {
        /// The program that failed to start.
        program: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The generator exited unsuccessfully.
    #[error("generator exited with {status}{}", diagnostics(.stdout, .stderr))]
    Failed {
        /// The exit status.
        status: ExitStatus,
        /// Captured standard output.
        stdout: String,
        /// Captured standard error.
        stderr: String,
    },

    /// The generator succeeded but did not write every expected file.
    #[error("generator did not produce {}{}", .missing.join(", "), diagnostics(.stdout, .stderr))]
    MissingOutputs {
        /// File names that were expected but absent.
        missing: Vec<String>,
        /// Captured standard output.
        stdout: String,
        /// Captured standard error.
        stderr: String,
    },

    /// The generator ran past its deadline and was killed.
    #[error("generator killed after {after:?}{}", diagnostics(.stdout, .stderr))]
    TimedOut {
        /// The configured timeout.
        after: Duration,
        /// Output captured before the kill.
        stdout: String,
        /// Error output captured before the kill.
        stderr: String,
    },

    /// Waiting on or reading from the generator failed.
    #[error("failed to collect generator output: {source}")]
    Io {
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// Formats captured process output as a trailing diagnostic block.
fn diagnostics(stdout: &str, stderr: &str) -> String {
    let mut out = String::new();
    for (label, text) in [("stdout", stdout.trim()), ("stderr", stderr.trim())] {
        if !text.is_empty() {
            out.push_str(&format!("\n--- {label} ---\n{text}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn font() -> FontId {
        FontId::new("roboto.ttf").unwrap()
    }

    #[test]
    fn io_error_display() {
        let err = CacheError::io(
            "/data/results/fonts/roboto.ttf_assets",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("storage I/O error"));
        assert!(msg.contains("roboto.ttf_assets"));
        assert!(err.is_storage());
        assert!(!err.is_routine());
    }

    #[test]
    fn not_found_is_routine() {
        let err = CacheError::FontNotFound { font: font() };
        assert!(err.is_routine());
        assert_eq!(err.to_string(), "font 'roboto.ttf' not found");

        let err = CacheError::AssetNotFound {
            font: font(),
            fingerprint: Fingerprint::from_bytes(b"x"),
        };
        assert!(err.is_routine());
    }

    #[test]
    fn busy_display() {
        let err = CacheError::Busy {
            font: font(),
            fingerprint: Fingerprint::from_bytes(b"x"),
            waited: Duration::from_secs(3),
        };
        assert!(err.to_string().contains("still being generated"));
        assert!(!err.is_routine());
    }

    #[test]
    fn missing_outputs_includes_diagnostics() {
        let err = GenerationError::MissingOutputs {
            missing: vec!["atlas.fnt".to_string()],
            stdout: "packing 95 glyphs\n".to_string(),
            stderr: String::new(),
        };
        let msg = err.to_string();
        assert!(msg.contains("did not produce atlas.fnt"));
        assert!(msg.contains("--- stdout ---\npacking 95 glyphs"));
        assert!(!msg.contains("stderr"));
    }

    #[test]
    fn timed_out_display() {
        let err = GenerationError::TimedOut {
            after: Duration::from_secs(2),
            stdout: String::new(),
            stderr: "still rendering".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("killed after 2s"));
        assert!(msg.contains("still rendering"));
    }

    #[test]
    fn generation_error_converts_transparently() {
        let cause = GenerationError::Io {
            source: std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed"),
        };
        let err: CacheError = cause.into();
        assert!(err.to_string().starts_with("failed to collect generator output"));
        assert!(!err.is_storage());
    }
}

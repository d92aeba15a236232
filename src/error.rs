//! Error types for the imgbundle library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`BundleError`] — **Fatal**: the run or delivery cannot proceed at all
//!   (unreadable input, a second run started while one is in flight, the
//!   archive or document container could not be finalised). Returned as
//!   `Err(BundleError)` from [`crate::session::Session`] entry points.
//!
//! * [`ItemError`] — **Non-fatal**: a single image failed to decode or encode
//!   but every other item is fine. Rendered into that item's diagnostic
//!   string so the batch keeps going and the item stays eligible for retry.

use crate::config::OutputMode;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the imgbundle library.
///
/// Per-item failures use [`ItemError`] and are stored on the item rather
/// than propagated here.
#[derive(Debug, Error)]
pub enum BundleError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input path was not found.
    #[error("Input not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the path.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The path exists but reading it failed.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// None of the supplied inputs is a recognised raster image.
    #[error("No supported images among {given} input(s)")]
    NoInputs { given: usize },

    // ── Run errors ────────────────────────────────────────────────────────
    /// A run is already in progress; runs are serialised per session.
    #[error("A conversion run is already in progress")]
    Busy,

    /// `start` was invoked with nothing eligible to process.
    #[error("Nothing to convert: {0}")]
    NothingToConvert(String),

    /// `download` was invoked before the mode produced any artifact.
    #[error("Nothing to download in {mode} mode")]
    NothingToDownload { mode: OutputMode },

    /// The archive or document container could not be built or finalised.
    #[error("Failed to finalise {container}: {detail}")]
    Container {
        container: &'static str,
        detail: String,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write a delivered file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<zip::result::ZipError> for BundleError {
    fn from(e: zip::result::ZipError) -> Self {
        BundleError::Container {
            container: "archive",
            detail: e.to_string(),
        }
    }
}

/// A non-fatal error for a single item.
///
/// The item transitions to `Error` with this error's `Display` text as its
/// diagnostic; siblings in the same group are unaffected.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ItemError {
    /// The source could not be interpreted as an image.
    #[error("'{name}': decode failed: {detail}")]
    Decode { name: String, detail: String },

    /// Rasterised pixels could not be re-encoded.
    #[error("'{name}': encode failed: {detail}")]
    Encode { name: String, detail: String },

    /// The worker task for this item panicked or was cancelled.
    #[error("'{name}': conversion task failed: {detail}")]
    Panicked { name: String, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nothing_to_download_names_mode() {
        let e = BundleError::NothingToDownload {
            mode: OutputMode::Document,
        };
        assert!(e.to_string().contains("document"), "got: {e}");
    }

    #[test]
    fn container_display() {
        let e = BundleError::Container {
            container: "document",
            detail: "no pages".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("document"));
        assert!(msg.contains("no pages"));
    }

    #[test]
    fn decode_error_carries_name() {
        let e = ItemError::Decode {
            name: "scan.png".into(),
            detail: "bad header".into(),
        };
        assert!(e.to_string().contains("scan.png"));
        assert!(e.to_string().contains("decode"));
    }

    #[test]
    fn zip_error_maps_to_archive_container() {
        let e: BundleError = zip::result::ZipError::FileNotFound.into();
        assert!(matches!(
            e,
            BundleError::Container {
                container: "archive",
                ..
            }
        ));
    }
}

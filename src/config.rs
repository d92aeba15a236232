//! Configuration types for batch conversion and document assembly.
//!
//! All run behaviour is controlled through [`BatchConfig`], built via its
//! [`BatchConfigBuilder`]. Document geometry lives in the small, copyable
//! [`DocumentOptions`] so a session can swap it between runs without
//! rebuilding the whole config.

use crate::error::BundleError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of items dispatched together in one batch group.
pub const DEFAULT_GROUP_SIZE: usize = 3;

/// Re-encoding quality on a `(0, 1]` scale.
pub const DEFAULT_QUALITY: f32 = 0.9;

/// Configuration for a conversion session.
///
/// Built via [`BatchConfig::builder()`] or using [`BatchConfig::default()`].
///
/// # Example
/// ```rust
/// use imgbundle::{BatchConfig, DocumentOptions, Margin, Orientation};
///
/// let config = BatchConfig::builder()
///     .group_size(3)
///     .quality(0.9)
///     .document(DocumentOptions {
///         margin: Margin::Small,
///         orientation: Orientation::Landscape,
///     })
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct BatchConfig {
    /// Items dispatched concurrently per group. Default: 3.
    ///
    /// Groups run strictly one after another, so this also bounds how many
    /// decoded images are resident at once.
    pub group_size: usize,

    /// JPEG quality on a `(0, 1]` scale. Default: 0.9.
    pub quality: f32,

    /// Initial document options; sessions may replace them between runs.
    pub document: DocumentOptions,

    /// Receiver for per-group, per-item and per-page events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            group_size: DEFAULT_GROUP_SIZE,
            quality: DEFAULT_QUALITY,
            document: DocumentOptions::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for BatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchConfig")
            .field("group_size", &self.group_size)
            .field("quality", &self.quality)
            .field("document", &self.document)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl BatchConfig {
    /// Create a new builder for `BatchConfig`.
    pub fn builder() -> BatchConfigBuilder {
        BatchConfigBuilder {
            config: Self::default(),
        }
    }

    /// Quality mapped onto the encoder's 1–100 scale.
    pub fn jpeg_quality(&self) -> u8 {
        (self.quality * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

/// Builder for [`BatchConfig`].
#[derive(Debug)]
pub struct BatchConfigBuilder {
    config: BatchConfig,
}

impl BatchConfigBuilder {
    pub fn group_size(mut self, n: usize) -> Self {
        self.config.group_size = n;
        self
    }

    pub fn quality(mut self, q: f32) -> Self {
        self.config.quality = q;
        self
    }

    pub fn document(mut self, options: DocumentOptions) -> Self {
        self.config.document = options;
        self
    }

    pub fn margin(mut self, margin: Margin) -> Self {
        self.config.document.margin = margin;
        self
    }

    pub fn orientation(mut self, orientation: Orientation) -> Self {
        self.config.document.orientation = orientation;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BatchConfig, BundleError> {
        let c = &self.config;
        if c.group_size == 0 {
            return Err(BundleError::InvalidConfig("Group size must be ≥ 1".into()));
        }
        if !(c.quality > 0.0 && c.quality <= 1.0) {
            return Err(BundleError::InvalidConfig(format!(
                "Quality must be in (0, 1], got {}",
                c.quality
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Which artifact a run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Re-encode each pending image and bundle them into a ZIP.
    Archive,
    /// Lay every image out on its own page of a single PDF.
    Document,
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputMode::Archive => f.write_str("archive"),
            OutputMode::Document => f.write_str("document"),
        }
    }
}

/// Blank inset applied to every edge of a document page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Margin {
    /// Image may touch the page edge.
    #[default]
    None,
    /// 10 mm on every side.
    Small,
    /// 20 mm on every side.
    Big,
}

impl Margin {
    /// Inset in millimetres.
    pub fn inset_mm(self) -> f64 {
        match self {
            Margin::None => 0.0,
            Margin::Small => 10.0,
            Margin::Big => 20.0,
        }
    }
}

/// Page orientation; landscape swaps the reference width and height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// Geometry options for one document generation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DocumentOptions {
    pub margin: Margin,
    pub orientation: Orientation,
}

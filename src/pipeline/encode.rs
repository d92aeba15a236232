//! Image encoding: flattened [`Raster`] → JPEG bytes.
//!
//! The same encoder output feeds both modes: archive entries are the JPEG
//! bytes verbatim, and the PDF container embeds them as a `DCTDecode`
//! stream without re-compressing.

use crate::error::ItemError;
use crate::pipeline::raster::Raster;
use image::codecs::jpeg::JpegEncoder;
use tracing::debug;

/// File extension for re-encoded images, without the dot.
pub const TARGET_EXTENSION: &str = "jpg";

/// Encode `raster` as a baseline JPEG at `quality` (1–100).
pub fn encode_jpeg(raster: &Raster, quality: u8, name: &str) -> Result<Vec<u8>, ItemError> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode_image(&raster.pixels)
        .map_err(|e| ItemError::Encode {
            name: name.to_string(),
            detail: e.to_string(),
        })?;

    debug!(
        "Encoded '{}' → {} bytes JPEG (q={})",
        name,
        buf.len(),
        quality
    );
    Ok(buf)
}

//! Input resolution: turn user-supplied paths into validated [`Source`]s.
//!
//! This is the ingestion collaborator the CLI uses; library callers that
//! already hold image bytes build [`Source`]s directly. Files are accepted
//! only when their leading bytes identify a raster format the decoder
//! understands, so the registry never sees a PDF or a text file.

use crate::error::BundleError;
use crate::item::Source;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Expand directories (one level) and keep the order given.
pub fn expand_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, BundleError> {
    let mut files = Vec::new();
    for input in inputs {
        let meta = std::fs::metadata(input).map_err(|e| map_io(input, e))?;
        if meta.is_dir() {
            let mut entries: Vec<PathBuf> = std::fs::read_dir(input)
                .map_err(|e| map_io(input, e))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file())
                .collect();
            entries.sort();
            debug!("Expanded '{}' → {} file(s)", input.display(), entries.len());
            files.extend(entries);
        } else {
            files.push(input.clone());
        }
    }
    Ok(files)
}

/// Read every input and keep the ones that are recognisable images.
///
/// Unrecognised files are skipped with a warning; missing or unreadable
/// paths are fatal.
pub fn read_sources(inputs: &[PathBuf]) -> Result<Vec<Source>, BundleError> {
    let files = expand_inputs(inputs)?;
    let given = files.len();
    let mut sources = Vec::with_capacity(given);

    for path in &files {
        let data = std::fs::read(path).map_err(|e| map_io(path, e))?;
        if !is_accepted_image(&data) {
            warn!("Skipping '{}': not a supported image", path.display());
            continue;
        }
        sources.push(Source::new(display_name(path), data));
    }

    if sources.is_empty() {
        return Err(BundleError::NoInputs { given });
    }
    info!("Accepted {}/{} input file(s)", sources.len(), given);
    Ok(sources)
}

/// `true` when the magic bytes identify a decodable raster format.
pub fn is_accepted_image(data: &[u8]) -> bool {
    use image::ImageFormat::*;
    matches!(
        image::guess_format(data),
        Ok(Png | Jpeg | WebP | Gif | Bmp)
    )
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn map_io(path: &Path, e: std::io::Error) -> BundleError {
    match e.kind() {
        ErrorKind::NotFound => BundleError::FileNotFound {
            path: path.to_path_buf(),
        },
        ErrorKind::PermissionDenied => BundleError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => BundleError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(2, 2))
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn missing_path_is_file_not_found() {
        let err = read_sources(&[PathBuf::from("/definitely/not/here.png")]).unwrap_err();
        assert!(matches!(err, BundleError::FileNotFound { .. }));
    }

    #[test]
    fn non_images_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), png_bytes()).unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"hello").unwrap();

        let sources = read_sources(&[dir.path().to_path_buf()]).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].name(), "a.png");
    }

    #[test]
    fn only_non_images_is_no_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let txt = dir.path().join("notes.txt");
        std::fs::write(&txt, b"hello").unwrap();
        let err = read_sources(&[txt]).unwrap_err();
        assert!(matches!(err, BundleError::NoInputs { given: 1 }));
    }

    #[test]
    fn explicit_file_order_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let (b, a) = (dir.path().join("b.png"), dir.path().join("a.png"));
        std::fs::write(&b, png_bytes()).unwrap();
        std::fs::write(&a, png_bytes()).unwrap();

        let names: Vec<_> = read_sources(&[b, a])
            .unwrap()
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(names, ["b.png", "a.png"]);
    }

    #[test]
    fn pdf_magic_is_rejected() {
        assert!(!is_accepted_image(b"%PDF-1.7"));
        assert!(is_accepted_image(&png_bytes()));
    }
}

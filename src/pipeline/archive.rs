//! Archive container: completed images → one ZIP blob.
//!
//! Entry names are the source name with its extension swapped for
//! [`TARGET_EXTENSION`]. Two sources can map to the same name (`a.webp`,
//! `a.png`); later ones get a numeric suffix (`a-1.jpg`) in item order so no
//! entry is ever overwritten or rejected.

use crate::error::BundleError;
use crate::pipeline::encode::TARGET_EXTENSION;
use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::path::Path;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// `photo.webp` → `photo.jpg`. Names without an extension get one appended.
pub fn output_name(source_name: &str) -> String {
    format!("{}.{TARGET_EXTENSION}", output_stem(source_name))
}

fn output_stem(source_name: &str) -> &str {
    Path::new(source_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(source_name)
}

/// Output names for `source_names`, in order, with collisions suffixed.
pub fn unique_output_names<'a>(source_names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::new();
    source_names
        .into_iter()
        .map(|source| {
            let base = output_name(source);
            if taken.insert(base.clone()) {
                return base;
            }
            let stem = output_stem(source);
            let mut n = 1;
            loop {
                let candidate = format!("{stem}-{n}.{TARGET_EXTENSION}");
                if taken.insert(candidate.clone()) {
                    debug!("Archive name '{}' taken; using '{}'", base, candidate);
                    return candidate;
                }
                n += 1;
            }
        })
        .collect()
}

/// Serialise `(name, bytes)` entries into one ZIP archive.
///
/// JPEG data is already compressed, so entries are stored, not deflated.
pub fn build_archive<'a>(
    entries: impl IntoIterator<Item = (&'a str, &'a [u8])>,
) -> Result<Vec<u8>, BundleError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    let mut count = 0usize;
    for (name, bytes) in entries {
        writer.start_file(name, options)?;
        writer
            .write_all(bytes)
            .map_err(|e| BundleError::Container {
                container: "archive",
                detail: format!("writing '{name}': {e}"),
            })?;
        count += 1;
    }

    let bytes = writer.finish()?.into_inner();
    info!("Archive finalised: {} entries, {} bytes", count, bytes.len());
    Ok(bytes)
}

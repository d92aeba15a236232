//! Output packager: bundle finished artifacts and hand them to a [`Delivery`].
//!
//! Archive mode collects every `Completed` item that carries image bytes
//! and zips them; document mode hands over the single assembled PDF. Both
//! name the delivered file with a millisecond timestamp. Once bytes reach
//! the delivery, the pipeline is done with them.

use crate::config::OutputMode;
use crate::error::BundleError;
use crate::item::{Item, ItemOutput};
use crate::pipeline::archive;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// What a delivery reports back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub file_name: String,
    pub size: usize,
    /// Where the bytes ended up, when the delivery has a notion of place.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<PathBuf>,
}

/// Final hand-off of a named blob to the host.
pub trait Delivery: Send + Sync {
    fn deliver(&self, file_name: &str, bytes: &[u8]) -> Result<DeliveryReceipt, BundleError>;
}

/// Writes delivered blobs into a directory.
///
/// Bytes go to a temp file in the same directory which is then renamed into
/// place, so a reader never observes a half-written archive or PDF.
#[derive(Debug, Clone)]
pub struct DirectoryDelivery {
    dir: PathBuf,
}

impl DirectoryDelivery {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Delivery for DirectoryDelivery {
    fn deliver(&self, file_name: &str, bytes: &[u8]) -> Result<DeliveryReceipt, BundleError> {
        let path = self.dir.join(file_name);
        let write_err = |source: std::io::Error| BundleError::OutputWriteFailed {
            path: path.clone(),
            source,
        };

        std::fs::create_dir_all(&self.dir).map_err(write_err)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(write_err)?;
        tmp.write_all(bytes).map_err(write_err)?;
        tmp.persist(&path).map_err(|e| write_err(e.error))?;

        info!("Delivered {} ({} bytes)", path.display(), bytes.len());
        Ok(DeliveryReceipt {
            file_name: file_name.to_string(),
            size: bytes.len(),
            location: Some(path),
        })
    }
}

/// `converted-images-<millis>.zip` / `document-<millis>.pdf`.
pub fn timestamped_name(mode: OutputMode, at: DateTime<Utc>) -> String {
    let millis = at.timestamp_millis();
    match mode {
        OutputMode::Archive => format!("converted-images-{millis}.zip"),
        OutputMode::Document => format!("document-{millis}.pdf"),
    }
}

/// `(entry name, bytes)` for every completed image, collisions suffixed.
pub fn archive_entries(items: &[Item]) -> Vec<(String, &[u8])> {
    let completed: Vec<(&str, &[u8])> = items
        .iter()
        .filter_map(|item| match item.output() {
            Some(ItemOutput::Image(bytes)) => Some((item.source().name(), &bytes[..])),
            _ => None,
        })
        .collect();

    let names = archive::unique_output_names(completed.iter().map(|(name, _)| *name));
    names
        .into_iter()
        .zip(completed)
        .map(|(name, (_, bytes))| (name, bytes))
        .collect()
}

/// Zip every completed image and deliver the archive.
pub fn package_archive(items: &[Item], delivery: &dyn Delivery) -> Result<DeliveryReceipt, BundleError> {
    let entries = archive_entries(items);
    if entries.is_empty() {
        return Err(BundleError::NothingToDownload {
            mode: OutputMode::Archive,
        });
    }
    let blob = archive::build_archive(entries.iter().map(|(name, bytes)| (name.as_str(), *bytes)))?;
    delivery.deliver(&timestamped_name(OutputMode::Archive, Utc::now()), &blob)
}

/// Deliver an assembled document as-is.
pub fn deliver_document(document: &[u8], delivery: &dyn Delivery) -> Result<DeliveryReceipt, BundleError> {
    delivery.deliver(&timestamped_name(OutputMode::Document, Utc::now()), document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{ItemId, ItemState, Source};
    use crate::registry::DisplayRef;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn item(name: &str, state: ItemState) -> Item {
        Item {
            id: ItemId::new(),
            source: Source::new(name, vec![0u8]),
            display_ref: DisplayRef::from_raw(0),
            state,
        }
    }

    fn image(bytes: &[u8]) -> ItemState {
        ItemState::Completed(ItemOutput::Image(Arc::from(bytes)))
    }

    #[test]
    fn timestamp_names() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        assert_eq!(
            timestamped_name(OutputMode::Archive, at),
            "converted-images-1700000000123.zip"
        );
        assert_eq!(timestamped_name(OutputMode::Document, at), "document-1700000000123.pdf");
    }

    #[test]
    fn only_completed_images_are_packaged() {
        let items = vec![
            item("photo.webp", image(b"jpeg-1")),
            item("idle.png", ItemState::Idle),
            item("bad.png", ItemState::Error("x".into())),
            item("page.png", ItemState::Completed(ItemOutput::Page { index: 0 })),
            item("photo.png", image(b"jpeg-2")),
        ];
        let entries = archive_entries(&items);
        assert_eq!(
            entries,
            vec![
                ("photo.jpg".to_string(), &b"jpeg-1"[..]),
                ("photo-1.jpg".to_string(), &b"jpeg-2"[..]),
            ]
        );
    }

    #[test]
    fn empty_archive_is_nothing_to_download() {
        let dir = tempfile::tempdir().unwrap();
        let err = package_archive(&[item("a.png", ItemState::Idle)], &DirectoryDelivery::new(dir.path()))
            .unwrap_err();
        assert!(matches!(
            err,
            BundleError::NothingToDownload {
                mode: OutputMode::Archive
            }
        ));
    }

    #[test]
    fn directory_delivery_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let delivery = DirectoryDelivery::new(dir.path().join("nested"));
        let receipt = delivery.deliver("out.pdf", b"%PDF-1.7").unwrap();

        let path = receipt.location.expect("location");
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.7");
        assert_eq!(receipt.size, 8);
        // Only the delivered file remains; the temp file was renamed.
        assert_eq!(std::fs::read_dir(delivery.dir()).unwrap().count(), 1);
    }
}

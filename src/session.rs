//! Session: the entry points a presentation layer drives.
//!
//! A [`Session`] owns the item registry, the document options for the next
//! document run, the last assembled document, and a run-state guard. Only
//! one run (batch conversion or document assembly) may be in flight at a
//! time; a second [`Session::start`] fails fast with [`BundleError::Busy`]
//! instead of interleaving with the first.

use crate::assembler;
use crate::config::{BatchConfig, DocumentOptions, OutputMode};
use crate::error::BundleError;
use crate::item::{Item, ItemId, ProcessingStats, Source};
use crate::packager::{self, Delivery, DeliveryReceipt};
use crate::pipeline::document::PdfContainer;
use crate::pipeline::layout;
use crate::registry::{DisplayRefs, ItemRegistry, RefLedger, SharedRegistry};
use crate::scheduler::{self, BatchSummary};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// A finished document together with the options it was laid out with.
#[derive(Debug, Clone)]
pub struct DocumentArtifact {
    pub bytes: Arc<[u8]>,
    pub options: DocumentOptions,
    pub pages: usize,
}

/// What a call to [`Session::start`] did.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum RunSummary {
    Archive(BatchSummary),
    Document {
        pages: usize,
        bytes: usize,
        duration_ms: u64,
    },
}

/// Clears the running flag when a run ends, however it ends.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, BundleError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| RunGuard(flag))
            .map_err(|_| BundleError::Busy)
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Session {
    registry: SharedRegistry,
    config: BatchConfig,
    options: Mutex<DocumentOptions>,
    document: Mutex<Option<DocumentArtifact>>,
    /// Bumped by every change that invalidates a document, including one
    /// still being assembled.
    generation: AtomicU64,
    running: AtomicBool,
}

impl Session {
    /// New session whose display references are tracked by a [`RefLedger`].
    pub fn new(config: BatchConfig) -> Self {
        Self::with_display_refs(config, Box::new(RefLedger::new()))
    }

    pub fn with_display_refs(config: BatchConfig, refs: Box<dyn DisplayRefs>) -> Self {
        let options = config.document;
        Self {
            registry: Arc::new(Mutex::new(ItemRegistry::new(refs))),
            config,
            options: Mutex::new(options),
            document: Mutex::new(None),
            generation: AtomicU64::new(0),
            running: AtomicBool::new(false),
        }
    }

    // ── Items ────────────────────────────────────────────────────────────

    /// Track one new `Idle` item per source.
    pub fn add(&self, sources: Vec<Source>) -> Vec<Item> {
        let added = self.registry.lock().add(sources);
        self.invalidate_document("items added");
        added
    }

    pub fn remove(&self, id: ItemId) -> bool {
        let removed = self.registry.lock().remove(id);
        if removed {
            self.invalidate_document("item removed");
        }
        removed
    }

    pub fn clear(&self) {
        self.registry.lock().clear();
        self.invalidate_document("items cleared");
    }

    /// Snapshot of the current items, in order.
    pub fn items(&self) -> Vec<Item> {
        self.registry.lock().items().to_vec()
    }

    pub fn stats(&self) -> ProcessingStats {
        self.registry.lock().stats()
    }

    // ── Document options ────────────────────────────────────────────────

    pub fn document_options(&self) -> DocumentOptions {
        *self.options.lock()
    }

    /// Options for the next document run. Different options discard the
    /// current document.
    pub fn set_document_options(&self, options: DocumentOptions) {
        let mut current = self.options.lock();
        if *current != options {
            *current = options;
            drop(current);
            self.invalidate_document("options changed");
        }
    }

    /// The last assembled document, if still valid.
    pub fn document(&self) -> Option<DocumentArtifact> {
        self.document.lock().clone()
    }

    // ── Runs ─────────────────────────────────────────────────────────────

    pub fn is_busy(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run conversion in `mode`.
    ///
    /// Archive mode converts pending items (`Idle` or `Error`). Document mode
    /// rebuilds the whole document from every item with the current options.
    pub async fn start(&self, mode: OutputMode) -> Result<RunSummary, BundleError> {
        let _guard = RunGuard::acquire(&self.running)?;
        match mode {
            OutputMode::Archive => self.run_archive().await,
            OutputMode::Document => self.run_document().await,
        }
    }

    async fn run_archive(&self) -> Result<RunSummary, BundleError> {
        if self.registry.lock().pending().is_empty() {
            return Err(BundleError::NothingToConvert(
                "no idle or failed items".into(),
            ));
        }
        let summary = scheduler::convert_pending(&self.registry, &self.config).await;
        Ok(RunSummary::Archive(summary))
    }

    async fn run_document(&self) -> Result<RunSummary, BundleError> {
        if self.registry.lock().is_empty() {
            return Err(BundleError::NothingToConvert("no items".into()));
        }
        let start = Instant::now();
        let generation = self.generation.load(Ordering::Acquire);
        let options = self.document_options();
        *self.document.lock() = None;

        let mut container = PdfContainer::new(layout::page_size(options.orientation));
        let bytes =
            assembler::assemble_document(&self.registry, &options, &self.config, &mut container)
                .await?;
        let pages = container.page_count();

        let size = bytes.len();
        let duration_ms = start.elapsed().as_millis() as u64;
        {
            let mut slot = self.document.lock();
            if self.generation.load(Ordering::Acquire) == generation {
                *slot = Some(DocumentArtifact {
                    bytes: Arc::from(bytes),
                    options,
                    pages,
                });
                info!("Document ready: {} pages, {} bytes in {}ms", pages, size, duration_ms);
            } else {
                warn!("Items or options changed during assembly; document discarded");
            }
        }
        Ok(RunSummary::Document {
            pages,
            bytes: size,
            duration_ms,
        })
    }

    /// Package the output of `mode` and hand it to `delivery`.
    pub fn download(
        &self,
        mode: OutputMode,
        delivery: &dyn Delivery,
    ) -> Result<DeliveryReceipt, BundleError> {
        match mode {
            OutputMode::Archive => {
                let items = self.items();
                packager::package_archive(&items, delivery)
            }
            OutputMode::Document => {
                let artifact = self
                    .document()
                    .ok_or(BundleError::NothingToDownload { mode })?;
                packager::deliver_document(&artifact.bytes, delivery)
            }
        }
    }

    fn invalidate_document(&self, reason: &str) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        if self.document.lock().take().is_some() {
            debug!("Document discarded: {}", reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Margin, Orientation};
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;

    fn png(w: u32, h: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(w, h))
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn guard_rejects_second_acquire() {
        let flag = AtomicBool::new(false);
        let first = RunGuard::acquire(&flag).unwrap();
        assert!(matches!(RunGuard::acquire(&flag), Err(BundleError::Busy)));
        drop(first);
        assert!(RunGuard::acquire(&flag).is_ok());
    }

    #[tokio::test]
    async fn concurrent_start_is_busy() {
        let session = Session::new(BatchConfig::default());
        session.add((0..3).map(|i| Source::new(format!("{i}.png"), png(256, 256))).collect());

        let (first, second) = tokio::join!(
            session.start(OutputMode::Archive),
            session.start(OutputMode::Document)
        );
        assert!(first.is_ok());
        assert!(matches!(second, Err(BundleError::Busy)));
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn empty_session_has_nothing_to_convert() {
        let session = Session::new(BatchConfig::default());
        assert!(matches!(
            session.start(OutputMode::Document).await,
            Err(BundleError::NothingToConvert(_))
        ));
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn option_change_discards_document() {
        let session = Session::new(BatchConfig::default());
        session.add(vec![Source::new("a.png", png(4, 3))]);
        session.start(OutputMode::Document).await.unwrap();
        assert!(session.document().is_some());

        // Same options keep it.
        session.set_document_options(DocumentOptions::default());
        assert!(session.document().is_some());

        let landscape = DocumentOptions {
            margin: Margin::Big,
            orientation: Orientation::Landscape,
        };
        session.set_document_options(landscape);
        assert!(session.document().is_none());

        session.start(OutputMode::Document).await.unwrap();
        assert_eq!(session.document().unwrap().options, landscape);
    }

    #[tokio::test]
    async fn changes_during_assembly_discard_the_result() {
        let session = Session::new(BatchConfig::default());
        session.add((0..6).map(|i| Source::new(format!("{i}.png"), png(256, 256))).collect());
        let landscape = DocumentOptions {
            margin: Margin::Big,
            orientation: Orientation::Landscape,
        };

        let (run, _) = tokio::join!(session.start(OutputMode::Document), async {
            tokio::task::yield_now().await;
            assert!(session.is_busy());
            session.set_document_options(landscape);
            session.add(vec![Source::new("late.png", png(8, 8))]);
        });

        assert!(run.is_ok());
        assert_eq!(session.items().len(), 7);
        assert!(session.document().is_none());
        assert!(matches!(
            session.download(OutputMode::Document, &crate::packager::DirectoryDelivery::new("unused")),
            Err(BundleError::NothingToDownload {
                mode: OutputMode::Document
            })
        ));

        // The next run picks up both changes.
        session.start(OutputMode::Document).await.unwrap();
        let artifact = session.document().unwrap();
        assert_eq!(artifact.options, landscape);
        assert_eq!(artifact.pages, 7);
    }
}

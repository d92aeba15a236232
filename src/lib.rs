//! # imgbundle
//!
//! Convert a batch of raster images into either a ZIP of re-encoded JPEGs
//! or a single paginated PDF, entirely locally.
//!
//! ## Pipeline Overview
//!
//! ```text
//! images
//!  │
//!  ├─ 1. Ingest    one Idle item per accepted source (registry)
//!  ├─ 2. Raster    decode + flatten transparency onto white (spawn_blocking)
//!  ├─ 3a. Archive  groups of 3 converted concurrently, groups in sequence
//!  │              → JPEG q=0.9 → ZIP
//!  ├─ 3b. Document every item, in order, one page each, fit and centred
//!  │              → PDF
//!  └─ 4. Deliver   timestamp-named file via a Delivery
//! ```
//!
//! Per-item failures never abort a run: in archive mode the item is marked
//! `Error` and can be retried, in document mode the page shows an error line.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use imgbundle::{BatchConfig, DirectoryDelivery, OutputMode, Session, Source};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Session::new(BatchConfig::default());
//!     session.add(vec![Source::new("photo.webp", std::fs::read("photo.webp")?)]);
//!
//!     session.start(OutputMode::Archive).await?;
//!     let receipt = session.download(OutputMode::Archive, &DirectoryDelivery::new("out"))?;
//!     eprintln!("wrote {} ({} bytes)", receipt.file_name, receipt.size);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `imgbundle` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod assembler;
pub mod config;
pub mod error;
pub mod item;
pub mod packager;
pub mod pipeline;
pub mod progress;
pub mod registry;
pub mod scheduler;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{BatchConfig, BatchConfigBuilder, DocumentOptions, Margin, Orientation, OutputMode};
pub use error::{BundleError, ItemError};
pub use item::{Item, ItemId, ItemOutput, ItemReport, ItemState, ItemStatus, ProcessingStats, Source};
pub use packager::{Delivery, DeliveryReceipt, DirectoryDelivery};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use registry::{DisplayRef, DisplayRefs, ItemRegistry, RefLedger};
pub use scheduler::BatchSummary;
pub use session::{DocumentArtifact, RunSummary, Session};

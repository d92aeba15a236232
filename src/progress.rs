//! Progress-callback trait for per-group, per-item and per-page events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::BatchConfigBuilder::progress_callback`] to receive
//! events as a run proceeds. Callers forward them to a progress bar, a log,
//! or a UI channel; the library knows nothing about how the host renders them.
//!
//! # Example
//!
//! ```rust
//! use imgbundle::{BatchConfig, ConversionProgressCallback, ItemId};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_item_complete(&self, _id: ItemId, name: &str, output_len: usize) {
//!         let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{done}: {name} ({output_len} bytes)");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//!
//! let config = BatchConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::config::OutputMode;
use crate::item::ItemId;
use std::sync::Arc;

/// Called by the scheduler and assembler as a run proceeds.
///
/// Implementations must be `Send + Sync`: items inside one batch group are
/// converted on blocking worker threads and settle in any order. All methods
/// default to no-ops so callers only override what they care about.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before any work, with the number of items the run covers.
    fn on_run_start(&self, total_items: usize, mode: OutputMode) {
        let _ = (total_items, mode);
    }

    /// Called before the items of a batch group are dispatched.
    ///
    /// # Arguments
    /// * `group` — 0-indexed group number
    /// * `size`  — items in this group (≤ the configured group size)
    fn on_group_start(&self, group: usize, size: usize) {
        let _ = (group, size);
    }

    /// Called when an item is marked `Converting` in archive mode.
    fn on_item_start(&self, id: ItemId, name: &str) {
        let _ = (id, name);
    }

    /// Called when an item reaches `Completed` in archive mode.
    ///
    /// `output_len` is the byte length of the encoded image.
    fn on_item_complete(&self, id: ItemId, name: &str, output_len: usize) {
        let _ = (id, name, output_len);
    }

    /// Called when an item reaches `Error` in archive mode.
    fn on_item_error(&self, id: ItemId, name: &str, error: &str) {
        let _ = (id, name, error);
    }

    /// Called as document assembly reaches page `index` (0-indexed).
    ///
    /// The item at `index` is marked `Completed` at the same moment.
    fn on_page_start(&self, index: usize, total_pages: usize) {
        let _ = (index, total_pages);
    }

    /// Called when a page's image could not be placed and an error marker
    /// was drawn instead.
    fn on_page_error(&self, index: usize, name: &str, error: &str) {
        let _ = (index, name, error);
    }

    /// Called once after every item or page has settled.
    ///
    /// # Arguments
    /// * `total`         — items the run covered
    /// * `success_count` — items that ended `Completed`
    fn on_run_complete(&self, total: usize, success_count: usize) {
        let _ = (total, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::BatchConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        groups: AtomicUsize,
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        pages: AtomicUsize,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_group_start(&self, _group: usize, _size: usize) {
            self.groups.fetch_add(1, Ordering::SeqCst);
        }

        fn on_item_start(&self, _id: ItemId, _name: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_item_complete(&self, _id: ItemId, _name: &str, _output_len: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_item_error(&self, _id: ItemId, _name: &str, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_start(&self, _index: usize, _total_pages: usize) {
            self.pages.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        let id = ItemId::new();
        cb.on_run_start(5, OutputMode::Archive);
        cb.on_group_start(0, 3);
        cb.on_item_start(id, "a.png");
        cb.on_item_complete(id, "a.png", 42);
        cb.on_item_error(id, "a.png", "some error");
        cb.on_page_start(0, 5);
        cb.on_page_error(0, "a.png", "bad");
        cb.on_run_complete(5, 4);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        let (a, b) = (ItemId::new(), ItemId::new());

        tracker.on_group_start(0, 2);
        tracker.on_item_start(a, "a.png");
        tracker.on_item_start(b, "b.png");
        tracker.on_item_complete(a, "a.png", 100);
        tracker.on_item_error(b, "b.png", "decode failed");
        tracker.on_page_start(0, 1);

        assert_eq!(tracker.groups.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.pages.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: Arc<dyn ConversionProgressCallback> = Arc::new(NoopProgressCallback);
        cb.on_run_start(10, OutputMode::Document);
        cb.on_page_start(0, 10);
    }
}

//! Item Registry: the single owner of tracked items.
//!
//! Every item holds one host-managed display reference (a thumbnail handle,
//! a preview URL, …). References come from a [`DisplayRefs`] host and are
//! handed back explicitly: exactly one [`DisplayRefs::acquire`] on `add`,
//! exactly one [`DisplayRefs::release`] on `remove` or `clear`. The
//! [`RefLedger`] host records both sides so the pairing can be checked.

use crate::item::{Item, ItemId, ItemState, ProcessingStats, Source};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Host handle for an item's display resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisplayRef(u64);

impl DisplayRef {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Creates and releases display references on behalf of the registry.
pub trait DisplayRefs: Send {
    fn acquire(&mut self, source: &Source) -> DisplayRef;
    fn release(&mut self, handle: DisplayRef);
}

#[derive(Debug, Default)]
struct LedgerState {
    next: u64,
    live: HashSet<u64>,
    created: usize,
    released: usize,
    unknown_releases: usize,
}

/// Counting [`DisplayRefs`] host.
///
/// Clones share one ledger, so a caller can keep a handle for inspection
/// after moving another clone into a registry.
#[derive(Debug, Clone, Default)]
pub struct RefLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl RefLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// References acquired and not yet released.
    pub fn live(&self) -> usize {
        self.state.lock().live.len()
    }

    pub fn created(&self) -> usize {
        self.state.lock().created
    }

    pub fn released(&self) -> usize {
        self.state.lock().released
    }

    /// Releases of handles that were never issued or were already released.
    pub fn unknown_releases(&self) -> usize {
        self.state.lock().unknown_releases
    }
}

impl DisplayRefs for RefLedger {
    fn acquire(&mut self, source: &Source) -> DisplayRef {
        let mut state = self.state.lock();
        state.next += 1;
        let raw = state.next;
        state.live.insert(raw);
        state.created += 1;
        debug!("Display ref {} acquired for '{}'", raw, source.name());
        DisplayRef(raw)
    }

    fn release(&mut self, handle: DisplayRef) {
        let mut state = self.state.lock();
        if state.live.remove(&handle.0) {
            state.released += 1;
        } else {
            state.unknown_releases += 1;
            warn!("Release of unknown display ref {}", handle.0);
        }
    }
}

/// Ordered collection of items plus the display-reference host.
pub struct ItemRegistry {
    items: Vec<Item>,
    refs: Box<dyn DisplayRefs>,
}

impl ItemRegistry {
    pub fn new(refs: Box<dyn DisplayRefs>) -> Self {
        Self {
            items: Vec::new(),
            refs,
        }
    }

    /// Append one `Idle` item per source, in order.
    pub fn add(&mut self, sources: impl IntoIterator<Item = Source>) -> Vec<Item> {
        let start = self.items.len();
        for source in sources {
            let display_ref = self.refs.acquire(&source);
            self.items.push(Item {
                id: ItemId::new(),
                source,
                display_ref,
                state: ItemState::Idle,
            });
        }
        debug!("Registry: added {} item(s)", self.items.len() - start);
        self.items[start..].to_vec()
    }

    /// Remove one item and release its display reference.
    ///
    /// Returns `false` when `id` is unknown; removal is idempotent.
    pub fn remove(&mut self, id: ItemId) -> bool {
        match self.items.iter().position(|i| i.id == id) {
            Some(pos) => {
                let item = self.items.remove(pos);
                self.refs.release(item.display_ref);
                true
            }
            None => false,
        }
    }

    /// Release every display reference and empty the collection.
    pub fn clear(&mut self) {
        for item in self.items.drain(..) {
            self.refs.release(item.display_ref);
        }
    }

    /// Replace an item's state in one step.
    ///
    /// Returns `false` when `id` is unknown (e.g. removed mid-run).
    pub fn update_status(&mut self, id: ItemId, state: ItemState) -> bool {
        match self.items.iter_mut().find(|i| i.id == id) {
            Some(item) => {
                item.state = state;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// `(id, source)` of every item the batch scheduler should pick up.
    pub fn pending(&self) -> Vec<(ItemId, Source)> {
        self.items
            .iter()
            .filter(|i| i.is_pending())
            .map(|i| (i.id, i.source.clone()))
            .collect()
    }

    /// `(id, source)` of every item, in order.
    pub fn all_sources(&self) -> Vec<(ItemId, Source)> {
        self.items
            .iter()
            .map(|i| (i.id, i.source.clone()))
            .collect()
    }

    pub fn stats(&self) -> ProcessingStats {
        ProcessingStats::from_items(&self.items)
    }
}

impl Drop for ItemRegistry {
    fn drop(&mut self) {
        self.clear();
    }
}

/// Registry shared between the session and in-flight runs.
pub type SharedRegistry = Arc<Mutex<ItemRegistry>>;

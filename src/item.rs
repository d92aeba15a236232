//! Tracked units of work and their derived statistics.
//!
//! An [`Item`]'s lifecycle state is a single enum, [`ItemState`], whose
//! `Completed` and `Error` variants carry the output and diagnostic
//! respectively. An item can therefore never hold an output and an error at
//! once, nor either of them while `Idle` or `Converting`.

use crate::registry::DisplayRef;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Opaque, stable identifier assigned at ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(Uuid);

impl ItemId {
    /// Allocate a fresh identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Immutable handle to the original input.
///
/// Cloning is cheap: the bytes are shared.
#[derive(Clone, PartialEq, Eq)]
pub struct Source {
    name: String,
    data: Arc<[u8]>,
}

impl Source {
    pub fn new(name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    /// File name as supplied at ingestion, extension included.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("name", &self.name)
            .field("size", &self.data.len())
            .finish()
    }
}

/// Coarse status of an item; see [`ItemState`] for the payload-carrying form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Idle,
    Converting,
    Completed,
    Error,
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ItemStatus::Idle => "idle",
            ItemStatus::Converting => "converting",
            ItemStatus::Completed => "completed",
            ItemStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// The artifact produced for a completed item.
#[derive(Clone, PartialEq, Eq)]
pub enum ItemOutput {
    /// Re-encoded JPEG bytes (archive mode).
    Image(Arc<[u8]>),
    /// The item was laid out as page `index` of the current document.
    Page { index: usize },
}

impl ItemOutput {
    /// Encoded byte length; zero for page markers.
    pub fn len(&self) -> usize {
        match self {
            ItemOutput::Image(bytes) => bytes.len(),
            ItemOutput::Page { .. } => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ItemOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemOutput::Image(bytes) => write!(f, "Image({} bytes)", bytes.len()),
            ItemOutput::Page { index } => write!(f, "Page({index})"),
        }
    }
}

/// Lifecycle state, carrying the output or diagnostic where one exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemState {
    Idle,
    Converting,
    Completed(ItemOutput),
    Error(String),
}

impl ItemState {
    pub fn status(&self) -> ItemStatus {
        match self {
            ItemState::Idle => ItemStatus::Idle,
            ItemState::Converting => ItemStatus::Converting,
            ItemState::Completed(_) => ItemStatus::Completed,
            ItemState::Error(_) => ItemStatus::Error,
        }
    }
}

/// One tracked unit of input-to-output work.
#[derive(Debug, Clone)]
pub struct Item {
    pub(crate) id: ItemId,
    pub(crate) source: Source,
    pub(crate) display_ref: DisplayRef,
    pub(crate) state: ItemState,
}

impl Item {
    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn display_ref(&self) -> DisplayRef {
        self.display_ref
    }

    pub fn state(&self) -> &ItemState {
        &self.state
    }

    pub fn status(&self) -> ItemStatus {
        self.state.status()
    }

    /// Present only when `Completed`.
    pub fn output(&self) -> Option<&ItemOutput> {
        match &self.state {
            ItemState::Completed(output) => Some(output),
            _ => None,
        }
    }

    /// Present only when `Error`.
    pub fn error(&self) -> Option<&str> {
        match &self.state {
            ItemState::Error(msg) => Some(msg),
            _ => None,
        }
    }

    /// Eligible for the batch scheduler (`Idle` or a retryable `Error`).
    pub fn is_pending(&self) -> bool {
        matches!(self.state, ItemState::Idle | ItemState::Error(_))
    }

    /// Serialisable summary without any payload bytes.
    pub fn report(&self) -> ItemReport {
        ItemReport {
            id: self.id,
            name: self.source.name.clone(),
            size: self.source.size(),
            status: self.status(),
            output_len: self.output().map(ItemOutput::len),
            page: match self.output() {
                Some(ItemOutput::Page { index }) => Some(*index),
                _ => None,
            },
            error: self.error().map(str::to_string),
        }
    }
}

/// JSON-friendly view of an [`Item`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemReport {
    pub id: ItemId,
    pub name: String,
    pub size: usize,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_len: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate counts, always recomputed from the current items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingStats {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
}

impl ProcessingStats {
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a Item>) -> Self {
        items
            .into_iter()
            .fold(Self::default(), |mut acc, item| {
                acc.total += 1;
                match item.status() {
                    ItemStatus::Completed => acc.completed += 1,
                    ItemStatus::Error => acc.failed += 1,
                    _ => {}
                }
                acc
            })
    }

    /// Items neither completed nor failed.
    pub fn outstanding(&self) -> usize {
        self.total - self.completed - self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(state: ItemState) -> Item {
        Item {
            id: ItemId::new(),
            source: Source::new("a.png", vec![1u8, 2, 3]),
            display_ref: DisplayRef::from_raw(1),
            state,
        }
    }

    #[test]
    fn output_and_error_follow_state() {
        let idle = item(ItemState::Idle);
        assert!(idle.output().is_none() && idle.error().is_none());

        let converting = item(ItemState::Converting);
        assert!(converting.output().is_none() && converting.error().is_none());

        let done = item(ItemState::Completed(ItemOutput::Image(Arc::from(vec![9u8; 4]))));
        assert_eq!(done.output().map(ItemOutput::len), Some(4));
        assert!(done.error().is_none());

        let failed = item(ItemState::Error("boom".into()));
        assert!(failed.output().is_none());
        assert_eq!(failed.error(), Some("boom"));
    }

    #[test]
    fn pending_means_idle_or_error() {
        assert!(item(ItemState::Idle).is_pending());
        assert!(item(ItemState::Error("x".into())).is_pending());
        assert!(!item(ItemState::Converting).is_pending());
        assert!(!item(ItemState::Completed(ItemOutput::Page { index: 0 })).is_pending());
    }

    #[test]
    fn stats_partition_total() {
        let items = vec![
            item(ItemState::Idle),
            item(ItemState::Converting),
            item(ItemState::Completed(ItemOutput::Page { index: 2 })),
            item(ItemState::Error("x".into())),
            item(ItemState::Error("y".into())),
        ];
        let stats = ProcessingStats::from_items(&items);
        assert_eq!(stats.total, 5);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.outstanding(), 2);
    }

    #[test]
    fn report_omits_payload() {
        let done = item(ItemState::Completed(ItemOutput::Page { index: 3 }));
        let json = serde_json::to_value(done.report()).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["page"], 3);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn source_debug_hides_bytes() {
        let s = Source::new("x.png", vec![0u8; 1024]);
        assert_eq!(format!("{s:?}"), r#"Source { name: "x.png", size: 1024 }"#);
    }
}

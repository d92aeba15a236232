//! Batch conversion scheduler (archive mode).
//!
//! Pending items (`Idle` or `Error`) are split, in order, into groups of
//! `config.group_size`. Groups run strictly one after another; the items of
//! one group are dispatched together and each settles on its own. A failed
//! item is marked `Error` and never affects its siblings or later groups.
//!
//! Decoding and encoding are CPU-bound, so each item runs inside
//! `spawn_blocking`. The registry lock is only held for the instant of a
//! status write, never across an await point.

use crate::config::{BatchConfig, OutputMode};
use crate::error::ItemError;
use crate::item::{ItemId, ItemOutput, ItemState, Source};
use crate::pipeline::{encode, raster};
use crate::registry::SharedRegistry;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Outcome of one scheduler run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Items picked up by this run.
    pub attempted: usize,
    pub completed: usize,
    pub failed: usize,
    /// Number of groups dispatched.
    pub groups: usize,
    pub duration_ms: u64,
}

/// Convert every pending item, `group_size` at a time.
///
/// Always runs to the end of the last group regardless of failures.
pub async fn convert_pending(registry: &SharedRegistry, config: &BatchConfig) -> BatchSummary {
    let start = Instant::now();
    let pending = registry.lock().pending();
    let group_size = config.group_size.max(1);
    let groups: Vec<&[(ItemId, Source)]> = pending.chunks(group_size).collect();

    info!(
        "Batch conversion: {} pending item(s) in {} group(s) of ≤{}",
        pending.len(),
        groups.len(),
        group_size
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(pending.len(), OutputMode::Archive);
    }

    let mut summary = BatchSummary {
        attempted: pending.len(),
        groups: groups.len(),
        ..BatchSummary::default()
    };

    for (index, group) in groups.iter().enumerate() {
        debug!("Dispatching group {}/{}", index + 1, groups.len());
        if let Some(ref cb) = config.progress_callback {
            cb.on_group_start(index, group.len());
        }

        let outcomes = join_all(
            group
                .iter()
                .map(|(id, source)| convert_item(registry, config, *id, source.clone())),
        )
        .await;

        for ok in outcomes {
            if ok {
                summary.completed += 1;
            } else {
                summary.failed += 1;
            }
        }
    }

    summary.duration_ms = start.elapsed().as_millis() as u64;
    if summary.failed > 0 {
        warn!(
            "Batch conversion finished: {}/{} converted, {} failed",
            summary.completed, summary.attempted, summary.failed
        );
    } else {
        info!(
            "Batch conversion finished: {} converted in {}ms",
            summary.completed, summary.duration_ms
        );
    }
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(summary.attempted, summary.completed);
    }
    summary
}

/// Drive one item `Converting → Completed | Error`. Returns `true` on success.
async fn convert_item(
    registry: &SharedRegistry,
    config: &BatchConfig,
    id: ItemId,
    source: Source,
) -> bool {
    registry.lock().update_status(id, ItemState::Converting);
    if let Some(ref cb) = config.progress_callback {
        cb.on_item_start(id, source.name());
    }

    let name = source.name().to_string();
    let quality = config.jpeg_quality();
    let result = tokio::task::spawn_blocking(move || {
        let raster = raster::rasterize(&source)?;
        encode::encode_jpeg(&raster, quality, source.name())
    })
    .await
    .unwrap_or_else(|e| {
        Err(ItemError::Panicked {
            name: name.clone(),
            detail: e.to_string(),
        })
    });

    match result {
        Ok(bytes) => {
            let len = bytes.len();
            let output = ItemOutput::Image(Arc::from(bytes));
            if !registry.lock().update_status(id, ItemState::Completed(output)) {
                debug!("Item '{}' removed mid-run; result dropped", name);
            }
            if let Some(ref cb) = config.progress_callback {
                cb.on_item_complete(id, &name, len);
            }
            true
        }
        Err(e) => {
            let message = e.to_string();
            warn!("Conversion failed: {}", message);
            registry.lock().update_status(id, ItemState::Error(message.clone()));
            if let Some(ref cb) = config.progress_callback {
                cb.on_item_error(id, &name, &message);
            }
            false
        }
    }
}

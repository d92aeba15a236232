//! Document assembler (document mode).
//!
//! Every run rebuilds the document from the whole item list: all items are
//! reset to `Converting`, then pages are produced strictly in order. Page `i`
//! is never started before page `i - 1` has been placed, and only one
//! decoded image is resident at a time.
//!
//! A page whose image cannot be rasterised or encoded is not skipped: it
//! carries a visible error line naming the source and assembly moves on.
//! Only a failure to finalise the container aborts the run, in which case
//! every item is marked `Error` and no bytes are returned.

use crate::config::{BatchConfig, DocumentOptions, OutputMode};
use crate::error::{BundleError, ItemError};
use crate::item::{ItemOutput, ItemState};
use crate::pipeline::document::DocumentContainer;
use crate::pipeline::{encode, layout, raster};
use crate::registry::SharedRegistry;
use tracing::{debug, error, info, warn};

/// Diagnostic written to every item when the document cannot be finalised.
pub const DOCUMENT_FAILED: &str = "Document generation failed";

/// Vertical offset of the error line below the content box's top edge (mm).
const MARKER_OFFSET_MM: f64 = 10.0;

/// Lay every item out, one per page, into `container` and finalise it.
pub async fn assemble_document(
    registry: &SharedRegistry,
    options: &DocumentOptions,
    config: &BatchConfig,
    container: &mut dyn DocumentContainer,
) -> Result<Vec<u8>, BundleError> {
    let items = {
        let mut reg = registry.lock();
        let items = reg.all_sources();
        for (id, _) in &items {
            reg.update_status(*id, ItemState::Converting);
        }
        items
    };
    let total = items.len();
    info!(
        "Document assembly: {} page(s), margin={:?}, orientation={:?}",
        total, options.margin, options.orientation
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(total, OutputMode::Document);
    }

    let content = layout::content_box(layout::page_size(options.orientation), options.margin);
    let quality = config.jpeg_quality();

    for (index, (id, source)) in items.into_iter().enumerate() {
        if let Some(ref cb) = config.progress_callback {
            cb.on_page_start(index, total);
        }
        registry
            .lock()
            .update_status(id, ItemState::Completed(ItemOutput::Page { index }));

        if index > 0 {
            container.add_page();
        }

        let name = source.name().to_string();
        let prepared = tokio::task::spawn_blocking(move || {
            let raster = raster::rasterize(&source)?;
            let jpeg = encode::encode_jpeg(&raster, quality, source.name())?;
            Ok::<_, ItemError>((jpeg, raster.width(), raster.height()))
        })
        .await
        .unwrap_or_else(|e| {
            Err(ItemError::Panicked {
                name: name.clone(),
                detail: e.to_string(),
            })
        });

        match prepared {
            Ok((jpeg, width, height)) => {
                let rect = layout::place_in(content, width, height);
                debug!(
                    "Page {}: '{}' {}x{} px → {:.1}x{:.1} mm at ({:.1}, {:.1})",
                    index + 1,
                    name,
                    width,
                    height,
                    rect.width,
                    rect.height,
                    rect.x,
                    rect.y
                );
                container.place_image(&jpeg, width, height, rect);
            }
            Err(e) => {
                warn!("Page {}: {}", index + 1, e);
                container.place_text(
                    &format!("Error loading image: {name}"),
                    content.x,
                    content.y + MARKER_OFFSET_MM,
                );
                if let Some(ref cb) = config.progress_callback {
                    cb.on_page_error(index, &name, &e.to_string());
                }
            }
        }
    }

    match container.finish() {
        Ok(bytes) => {
            if let Some(ref cb) = config.progress_callback {
                cb.on_run_complete(total, total);
            }
            Ok(bytes)
        }
        Err(e) => {
            error!("Document assembly failed: {}", e);
            let mut reg = registry.lock();
            for id in reg.items().iter().map(|i| i.id()).collect::<Vec<_>>() {
                reg.update_status(id, ItemState::Error(DOCUMENT_FAILED.to_string()));
            }
            drop(reg);
            if let Some(ref cb) = config.progress_callback {
                cb.on_run_complete(total, 0);
            }
            Err(e)
        }
    }
}

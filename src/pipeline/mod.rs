//! Pipeline stages for image conversion and packaging.
//!
//! Each submodule implements exactly one transformation step and is
//! testable on its own; the scheduler and assembler compose them.
//!
//! ## Data Flow
//!
//! ```text
//!                    ┌─▶ encode ──────────────────────▶ archive  (ZIP)
//! input ──▶ raster ──┤
//! (paths)   (flatten)└─▶ encode ──▶ layout ──▶ document         (PDF)
//! ```
//!
//! 1. [`input`]    — resolve paths, keep only recognisable raster images
//! 2. [`raster`]   — decode and composite transparency onto white
//! 3. [`encode`]   — JPEG at the configured quality
//! 4. [`layout`]   — page size, content box, fit-inside and centring
//! 5. [`document`] — multi-page PDF container
//! 6. [`archive`]  — entry naming and ZIP serialisation

pub mod archive;
pub mod document;
pub mod encode;
pub mod input;
pub mod layout;
pub mod raster;

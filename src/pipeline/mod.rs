//! Pipeline stages for notebook-to-PDF conversion.
//!
//! Each submodule implements one transformation step, so each is testable
//! on its own and the tracer can be swapped without touching the rest.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ container ──▶ render ─────────────────────▶ vector ──▶ pdf
//! (path)    (footer,      (rle + palette → grouping     (page       (xref,
//!            pages,        → trace, per page,            chunks)     trailer)
//!            links)        spawn_blocking)
//! ```
//!
//! 1. [`input`]     — validate the path and decide `.note` vs `.mark`
//! 2. [`container`] — footer, header, page and layer records, links
//! 3. [`render`]    — per page: [`rle`] decode through the [`palette`],
//!    split into tone masks ([`grouping`]), [`trace`] each mask, and build
//!    the background raster
//! 4. [`vector`]    — compile traced layers, background and links into the
//!    objects of one page
//! 5. [`pdf`]       — number, serialize and index every object
//!
//! [`mark`] reuses stages 2–5 to produce overlays for annotated PDFs.

pub mod container;
pub mod grouping;
pub mod input;
pub mod mark;
pub mod palette;
pub mod pdf;
pub mod render;
pub mod rle;
pub mod trace;
pub mod vector;

#[cfg(test)]
pub(crate) mod testutil;

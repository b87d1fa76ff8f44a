//! Pipeline stages around the report core.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ (reporter) ──▶ markup ──▶ rasterize
//! (path)    (pdfium)     (join)        (HTML)     (image)
//! ```
//!
//! 1. [`input`]     — validate the source PDF before pdfium sees it
//! 2. [`extract`]   — page text → the three category tables
//! 3. [`markup`]    — labeled table → styled HTML
//! 4. [`rasterize`] — staged HTML → flattened image via an external program

pub mod extract;
pub mod input;
pub mod markup;
pub mod rasterize;

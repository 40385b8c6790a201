//! PDF processing layer
//!
//! Page-level editing uses lopdf; structural recompression uses qpdf.

mod document;
mod geometry;
mod qpdf;
mod transform;

pub use document::{
    LinkAnnotation, PageImage, PdfDocument, RedactionSummary, SaveOptions, TextBlock, TextStamp,
};
pub use geometry::{Matrix, Rect};
pub use qpdf::QpdfWrapper;
pub use transform::{
    add_watermark, compress, delete_page, strip_images, strip_links_and_mentions, write_atomic,
    WatermarkOptions, LINK_PATTERNS, MENTION_MARKER,
};

//! File-to-file document transforms
//!
//! Each transform opens `input`, edits it, and writes `output` through
//! [`write_atomic`], so a failed transform never leaves a partial file at
//! the output path.

use super::document::{PdfDocument, SaveOptions, TextStamp};
use super::geometry::Rect;
use super::qpdf::QpdfWrapper;
use crate::error::{Error, Result};
use std::io::Write;
use std::path::Path;

/// Substrings that mark a link annotation for removal
pub const LINK_PATTERNS: [&str; 4] = ["http://", "https://", "t.me/", "@"];

/// Marker that flags a text block as a mention
pub const MENTION_MARKER: char = '@';

/// Footer stamp settings.
///
/// Coordinates use a top-left origin (y grows downward) and are converted
/// with each page's MediaBox height, so the stamp lands at the same fixed
/// spot regardless of page content.
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkOptions {
    pub text: String,
    pub link: String,
    /// Baseline origin (x, y)
    pub origin: (f32, f32),
    pub font_size: f32,
    /// RGB, 0-1 range
    pub color: (f32, f32, f32),
    /// Clickable area (x0, top, x1, bottom)
    pub link_box: (f32, f32, f32, f32),
}

impl Default for WatermarkOptions {
    fn default() -> Self {
        Self {
            text: "Romandl".to_string(),
            link: "https://t.me/romandl".to_string(),
            origin: (50.0, 750.0),
            font_size: 18.0,
            color: (1.0, 0.0, 0.0),
            link_box: (50.0, 745.0, 150.0, 765.0),
        }
    }
}

/// Write `data` next to `output` and rename it into place
pub fn write_atomic(output: &Path, data: &[u8]) -> Result<()> {
    let parent = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(output).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

/// Remove every image placed on every page
pub fn strip_images(input: &Path, output: &Path) -> Result<()> {
    let mut doc = PdfDocument::open(input)?;

    // Enumerate first: pages may share one XObject dictionary
    let mut plan = Vec::new();
    for index in 0..doc.page_count() {
        plan.push((index, doc.page_images(index)?));
    }

    let mut removed = 0usize;
    for (index, images) in plan {
        for image in &images {
            doc.delete_image(index, image)?;
            removed += 1;
        }
    }
    tracing::debug!(images = removed, "strip_images done");

    let data = doc.save_to_bytes(SaveOptions::default())?;
    write_atomic(output, &data)
}

fn link_matches(uri: &str) -> bool {
    LINK_PATTERNS.iter().any(|p| uri.contains(p))
}

/// Redact matching links and every text block containing `@`
pub fn strip_links_and_mentions(input: &Path, output: &Path) -> Result<()> {
    let mut doc = PdfDocument::open(input)?;

    let mut total = 0usize;
    for index in 0..doc.page_count() {
        // Both passes finish before anything on the page is redacted
        let mut regions: Vec<Rect> = doc
            .links(index)?
            .into_iter()
            .filter(|link| link.uri.as_deref().map(link_matches).unwrap_or(false))
            .map(|link| link.rect)
            .collect();
        regions.extend(
            doc.text_blocks(index)?
                .into_iter()
                .filter(|block| block.text.contains(MENTION_MARKER))
                .map(|block| block.rect),
        );

        let summary = doc.apply_redactions(index, &regions)?;
        if !summary.is_empty() {
            tracing::debug!(
                page = index + 1,
                text_runs = summary.text_runs,
                links = summary.links,
                "redacted links and mentions"
            );
        }
        total += regions.len();
    }
    tracing::debug!(regions = total, "strip_links_and_mentions done");

    let data = doc.save_to_bytes(SaveOptions::compact())?;
    write_atomic(output, &data)
}

/// Stamp the watermark text and its link on every page, replacing earlier stamps
pub fn add_watermark(input: &Path, output: &Path, options: &WatermarkOptions) -> Result<()> {
    let mut doc = PdfDocument::open(input)?;

    for index in 0..doc.page_count() {
        let previous = doc.search_text(index, &options.text)?;
        doc.apply_redactions(index, &previous)?;

        let page = doc.page_rect(index)?;
        let height = page.y1;
        doc.insert_text(
            index,
            &TextStamp {
                text: &options.text,
                x: options.origin.0,
                y: height - options.origin.1,
                font_size: options.font_size,
                color: options.color,
            },
        )?;

        let (x0, top, x1, bottom) = options.link_box;
        let link_rect = Rect::from_top_left(x0, top, x1, bottom, height);
        doc.insert_link(index, &link_rect, &options.link)?;
    }

    let data = doc.save_to_bytes(SaveOptions::default())?;
    write_atomic(output, &data)
}

/// Delete the 1-indexed `page_number`
///
/// Fails with [`Error::InvalidPageNumber`] for `page_number < 1` and
/// [`Error::PageOutOfRange`] past the last page; `output` is untouched
/// in both cases.
pub fn delete_page(input: &Path, output: &Path, page_number: i64) -> Result<()> {
    if page_number < 1 {
        return Err(Error::InvalidPageNumber {
            input: page_number.to_string(),
        });
    }

    let mut doc = PdfDocument::open(input)?;
    let total = doc.page_count();
    let page = u32::try_from(page_number).unwrap_or(u32::MAX);
    if page > total {
        return Err(Error::PageOutOfRange { page, total });
    }

    doc.delete_page(page - 1)?;
    let data = doc.save_to_bytes(SaveOptions::default())?;
    write_atomic(output, &data)
}

/// Rewrite with maximal garbage collection and stream compression
pub fn compress(input: &Path, output: &Path) -> Result<()> {
    let data = std::fs::read(input)?;
    let compressed = QpdfWrapper::compress(&data)?;
    tracing::debug!(
        original_size = data.len(),
        compressed_size = compressed.len(),
        "compress done"
    );
    write_atomic(output, &compressed)
}

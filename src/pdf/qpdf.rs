//! qpdf FFI wrapper for structural PDF rewriting
//!
//! Used for the final recompression pass: object streams, stream
//! compression and dropping unreferenced objects, via the qpdf crate
//! (vendored FFI).

use crate::error::{Error, Result};
use qpdf::{ObjectStreamMode, QPdf};

/// Wrapper for qpdf operations via FFI
pub struct QpdfWrapper;

/// Map qpdf crate errors to our error types
fn map_qpdf_error(e: qpdf::QPdfError) -> Error {
    Error::QpdfError {
        reason: e.to_string(),
    }
}

fn open_qpdf(data: &[u8]) -> Result<QPdf> {
    if data.len() < 4 || &data[0..4] != b"%PDF" {
        return Err(Error::InvalidPdf {
            reason: "Not a valid PDF file".to_string(),
        });
    }
    QPdf::read_from_memory(data).map_err(map_qpdf_error)
}

impl QpdfWrapper {
    /// Rewrite a PDF with maximal compaction
    ///
    /// Generates object streams, compresses all streams, normalizes content
    /// and drops objects no longer reachable from the trailer.
    ///
    /// # Returns
    /// The compressed PDF as bytes
    pub fn compress(input_data: &[u8]) -> Result<Vec<u8>> {
        let qpdf = open_qpdf(input_data)?;

        let mut writer = qpdf.writer();
        writer
            .object_stream_mode(ObjectStreamMode::Generate)
            .compress_streams(true)
            .normalize_content(true)
            .preserve_unreferenced_objects(false)
            .preserve_encryption(false);
        writer.write_to_memory().map_err(map_qpdf_error)
    }

    /// Get the page count of a PDF
    pub fn get_page_count(input_data: &[u8]) -> Result<u32> {
        let qpdf = open_qpdf(input_data)?;
        qpdf.get_num_pages().map_err(map_qpdf_error)
    }
}

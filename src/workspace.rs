//! Per-request scratch directories

use crate::error::Result;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use uuid::Uuid;

/// Name of the downloaded upload inside a workspace
pub const RECEIVED_FILE: &str = "received.pdf";
/// Name of the transform output inside a workspace
pub const PROCESSED_FILE: &str = "processed.pdf";
/// Subdirectory holding the final, user-named artifact
const OUTPUT_DIR: &str = "out";

/// Unique temp directory owned by one request.
///
/// Every artifact of the request lives inside it; dropping the workspace
/// deletes the directory and everything in it.
#[derive(Debug)]
pub struct RequestWorkspace {
    dir: TempDir,
    request_id: Uuid,
}

impl RequestWorkspace {
    /// Create a fresh workspace under `root` for `chat_id`
    pub fn create(root: &Path, chat_id: i64) -> Result<Self> {
        let request_id = Uuid::new_v4();
        std::fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("pdfbot-{}-{}-", chat_id, request_id.simple()))
            .tempdir_in(root)?;
        Ok(Self { dir, request_id })
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn received(&self) -> PathBuf {
        self.dir.path().join(RECEIVED_FILE)
    }

    pub fn processed(&self) -> PathBuf {
        self.dir.path().join(PROCESSED_FILE)
    }

    /// Path for the final artifact, using only the file-name part of `name`
    pub fn output(&self, name: &str) -> Result<PathBuf> {
        let out_dir = self.dir.path().join(OUTPUT_DIR);
        std::fs::create_dir_all(&out_dir)?;
        Ok(out_dir.join(sanitize_file_name(name)))
    }
}

/// Strip directory components and control characters; fall back to `document.pdf`
pub fn sanitize_file_name(name: &str) -> String {
    let base = name
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or("")
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>();
    let base = base.trim().trim_start_matches('.');
    if base.is_empty() {
        return "document.pdf".to_string();
    }
    if base.to_ascii_lowercase().ends_with(".pdf") {
        base.to_string()
    } else {
        format!("{}.pdf", base)
    }
}

//! Boundary between the dispatcher and the chat transport

use crate::error::Result;
use crate::session::Action;
use std::future::Future;
use std::path::Path;

/// Conversation identifier
pub type ChatId = i64;

/// Greeting shown with the main menu
pub const MENU_TEXT: &str = "🎯 Please choose one of the options below:";

/// Prompt for the page number after a delete-page upload
pub const PAGE_NUMBER_PROMPT: &str =
    "📌 Please enter the number of the page you want to delete (for example 1):";

/// Reply to free text when no page number is expected
pub const USE_MENU_HINT: &str = "ℹ️ Please pick an action from the menu.";

/// Reply to a second upload while a page number is expected
pub const EXPECTING_PAGE_NUMBER: &str =
    "ℹ️ A file is already waiting. Please send the page number to delete, or choose another action.";

/// Document announced by the transport, before download
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingDocument {
    /// Transport handle used to fetch the content
    pub file_id: String,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    /// Declared size in bytes
    pub size: Option<u64>,
}

impl IncomingDocument {
    /// True when the declared type (or, lacking one, the name) says PDF
    pub fn looks_like_pdf(&self) -> bool {
        match &self.mime_type {
            Some(mime) => mime.eq_ignore_ascii_case("application/pdf"),
            None => self
                .file_name
                .as_deref()
                .map(|n| n.to_ascii_lowercase().ends_with(".pdf"))
                .unwrap_or(true),
        }
    }
}

/// What happened in a conversation
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// `/start` command
    Start,
    /// Menu button pressed
    ActionSelected(Action),
    /// File uploaded
    Document(IncomingDocument),
    /// Free text
    Text(String),
}

/// Inbound event for one conversation
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub chat_id: ChatId,
    pub kind: EventKind,
}

/// Outbound operations the dispatcher needs from a chat transport
pub trait Transport: Send + Sync + 'static {
    /// Send a plain text message
    fn send_text(&self, chat_id: ChatId, text: &str) -> impl Future<Output = Result<()>> + Send;

    /// Send `text` with the main-menu keyboard (one button per [`Action::ALL`] entry)
    fn send_menu(&self, chat_id: ChatId, text: &str) -> impl Future<Output = Result<()>> + Send;

    /// Upload a file as a document attachment named `file_name`
    fn send_document(
        &self,
        chat_id: ChatId,
        path: &Path,
        file_name: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Fetch `file_id` into `dest`, failing once more than `max_bytes` arrive.
    /// Returns the number of bytes written.
    fn download(
        &self,
        file_id: &str,
        dest: &Path,
        max_bytes: u64,
    ) -> impl Future<Output = Result<u64>> + Send;
}

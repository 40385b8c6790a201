//! Error types for the PDF transform bot

use thiserror::Error;

/// Result type alias for the PDF transform bot
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the PDF transform bot
#[derive(Error, Debug)]
pub enum Error {
    /// Upload exceeds the configured size limit
    #[error("File too large: {size} bytes (max: {max_size} bytes)")]
    FileTooLarge { size: u64, max_size: u64 },

    /// Page number is not a positive integer
    #[error("Invalid page number: {input:?}")]
    InvalidPageNumber { input: String },

    /// Page number beyond the end of the document
    #[error("Page {page} out of bounds (total: {total})")]
    PageOutOfRange { page: u32, total: u32 },

    /// Invalid PDF file
    #[error("Invalid PDF file: {reason}")]
    InvalidPdf { reason: String },

    /// Uploaded document is not a PDF
    #[error("Unsupported file type: {mime}")]
    UnsupportedFileType { mime: String },

    /// A file arrived before any action was chosen
    #[error("No action selected")]
    NoActionSelected,

    /// qpdf error
    #[error("qpdf error: {reason}")]
    QpdfError { reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request error, with the request URL stripped
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[source] reqwest::Error),

    /// Telegram rejected a Bot API call
    #[error("Telegram API error: {reason}")]
    Telegram { reason: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Required configuration value is absent
    #[error("Missing configuration: {name}")]
    MissingConfig { name: String },

    /// Configuration value could not be parsed
    #[error("Invalid configuration {name}: {reason}")]
    InvalidConfig { name: String, reason: String },

    /// Blocking task panicked or was cancelled
    #[error("Task failed: {reason}")]
    Task { reason: String },
}

/// Bot API URLs embed the token, so the URL never reaches an error message
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::HttpRequest(e.without_url())
    }
}

impl From<lopdf::Error> for Error {
    fn from(e: lopdf::Error) -> Self {
        Error::InvalidPdf {
            reason: e.to_string(),
        }
    }
}

impl Error {
    /// Return a message safe to show to the chat user.
    /// Internal details (paths, library errors) are omitted.
    /// Full details should be logged via tracing before calling this.
    pub fn client_message(&self) -> String {
        match self {
            Error::FileTooLarge { max_size, .. } => format!(
                "❌ The file is larger than {} MB. Please send a smaller file.",
                max_size / (1024 * 1024)
            ),
            Error::InvalidPageNumber { .. } => {
                "❌ Please enter a valid page number greater than 0.".to_string()
            }
            Error::PageOutOfRange { page, total } => format!(
                "❌ Page {} does not exist, the document has {} page(s). Please enter another page number.",
                page, total
            ),
            Error::InvalidPdf { .. } | Error::QpdfError { .. } => {
                "❌ This file could not be read as a PDF.".to_string()
            }
            Error::UnsupportedFileType { .. } => "❌ Please send a PDF document.".to_string(),
            Error::NoActionSelected => {
                "⚠️ Please select an action from the menu first.".to_string()
            }
            Error::Io(_)
            | Error::HttpRequest(_)
            | Error::Telegram { .. }
            | Error::Serialization(_)
            | Error::Task { .. } => {
                "❌ Something went wrong while processing your file. Please try again.".to_string()
            }
            Error::MissingConfig { .. } | Error::InvalidConfig { .. } => {
                "❌ The bot is misconfigured.".to_string()
            }
        }
    }

    /// Whether the user can fix this by sending different input.
    /// Recoverable errors keep the current session state.
    pub fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            Error::FileTooLarge { .. }
                | Error::InvalidPageNumber { .. }
                | Error::PageOutOfRange { .. }
                | Error::UnsupportedFileType { .. }
                | Error::NoActionSelected
        )
    }
}

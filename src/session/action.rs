//! Menu actions

use std::fmt;

/// One of the five document transforms a user can pick from the menu
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Remove embedded images (shown as "remove watermark")
    StripImages,
    /// Remove clickable links and `@` mentions
    StripLinks,
    /// Stamp the footer watermark with its link
    AddWatermark,
    /// Recompress the file
    Compress,
    /// Delete one page, asked for after the upload
    DeletePage,
}

impl Action {
    /// Menu order
    pub const ALL: [Action; 5] = [
        Action::StripImages,
        Action::StripLinks,
        Action::AddWatermark,
        Action::Compress,
        Action::DeletePage,
    ];

    /// Wire identifier carried in the menu button callback data
    pub fn id(&self) -> &'static str {
        match self {
            Action::StripImages => "remove_watermark",
            Action::StripLinks => "remove_links",
            Action::AddWatermark => "add_watermark",
            Action::Compress => "compress_pdf",
            Action::DeletePage => "remove_page",
        }
    }

    pub fn from_id(id: &str) -> Option<Action> {
        Action::ALL.into_iter().find(|a| a.id() == id)
    }

    /// Menu button label
    pub fn label(&self) -> &'static str {
        match self {
            Action::StripImages => "🔹 Remove watermark",
            Action::StripLinks => "🔹 Remove links and @ text",
            Action::AddWatermark => "🔹 Add footer stamp",
            Action::Compress => "🔹 Compress PDF",
            Action::DeletePage => "🔹 Delete a page",
        }
    }

    /// Prompt sent after the action is chosen
    pub fn prompt(&self) -> &'static str {
        match self {
            Action::StripImages => "📌 Please send the PDF file to remove its watermark images.",
            Action::StripLinks => {
                "📌 Please send the PDF file to remove its links and @ mentions."
            }
            Action::AddWatermark => "📌 Please send the PDF file to add the footer stamp.",
            Action::Compress => "📌 Please send the PDF file to compress it.",
            Action::DeletePage => {
                "📌 Please send the PDF file, then the number of the page to delete."
            }
        }
    }

    /// Confirmation sent before the result document
    pub fn done_message(&self) -> &'static str {
        match self {
            Action::StripImages => "✅ Watermark images removed. Sending file...",
            Action::StripLinks => "✅ Links and @ mentions removed. Sending file...",
            Action::AddWatermark => "✅ Footer stamp added. Sending file...",
            Action::Compress => "✅ File compressed. Sending file...",
            Action::DeletePage => "✅ Page deleted. Sending file...",
        }
    }

    /// Whether the action needs a page number after the upload
    pub fn needs_page_number(&self) -> bool {
        matches!(self, Action::DeletePage)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

//! Telegram Bot API wire types (the subset this bot uses)

use crate::error::{Error, Result};
use crate::session::Action;
use crate::transport::{Event, EventKind, IncomingDocument};
use serde::{Deserialize, Serialize};

/// Envelope of every Bot API response
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub error_code: Option<i64>,
}

impl<T> ApiResponse<T> {
    pub fn into_result(self) -> Result<T> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(Error::Telegram {
                reason: format!(
                    "{} (code {})",
                    self.description
                        .unwrap_or_else(|| "no description".to_string()),
                    self.error_code.unwrap_or_default()
                ),
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub document: Option<Document>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    pub file_id: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub message: Option<Message>,
}

/// Result of `getFile`
#[derive(Debug, Clone, Deserialize)]
pub struct File {
    pub file_id: String,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

impl InlineKeyboardMarkup {
    /// Main menu: one action per row
    pub fn main_menu() -> Self {
        Self {
            inline_keyboard: Action::ALL
                .iter()
                .map(|action| {
                    vec![InlineKeyboardButton {
                        text: action.label().to_string(),
                        callback_data: action.id().to_string(),
                    }]
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GetUpdatesParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    pub timeout: u64,
    pub allowed_updates: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct SendMessageParams<'a> {
    pub chat_id: i64,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

/// An update translated for the dispatcher
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    pub event: Event,
    /// Callback query to acknowledge, for button presses
    pub callback_id: Option<String>,
}

fn is_start_command(text: &str) -> bool {
    text.split_whitespace()
        .next()
        .map(|cmd| cmd.split('@').next() == Some("/start"))
        .unwrap_or(false)
}

impl Update {
    /// Translate into a dispatcher event; unrelated updates yield `None`
    pub fn into_inbound(self) -> Option<Inbound> {
        if let Some(query) = self.callback_query {
            let chat_id = query.message.as_ref()?.chat.id;
            let action = query.data.as_deref().and_then(Action::from_id)?;
            return Some(Inbound {
                event: Event {
                    chat_id,
                    kind: EventKind::ActionSelected(action),
                },
                callback_id: Some(query.id),
            });
        }

        let message = self.message?;
        let chat_id = message.chat.id;
        let kind = if let Some(doc) = message.document {
            EventKind::Document(IncomingDocument {
                file_id: doc.file_id,
                file_name: doc.file_name,
                mime_type: doc.mime_type,
                size: doc.file_size,
            })
        } else {
            let text = message.text?;
            if is_start_command(&text) {
                EventKind::Start
            } else {
                EventKind::Text(text)
            }
        };

        Some(Inbound {
            event: Event { chat_id, kind },
            callback_id: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(json: &str) -> Option<Inbound> {
        serde_json::from_str::<Update>(json).unwrap().into_inbound()
    }

    #[test]
    fn test_document_update() {
        let inbound = parse(
            r#"{"update_id": 5, "message": {"message_id": 1, "chat": {"id": 77},
                "document": {"file_id": "abc", "file_name": "a.pdf",
                             "mime_type": "application/pdf", "file_size": 2048}}}"#,
        )
        .unwrap();
        assert_eq!(
            inbound.event,
            Event {
                chat_id: 77,
                kind: EventKind::Document(IncomingDocument {
                    file_id: "abc".to_string(),
                    file_name: Some("a.pdf".to_string()),
                    mime_type: Some("application/pdf".to_string()),
                    size: Some(2048),
                }),
            }
        );
        assert_eq!(inbound.callback_id, None);
    }

    #[test]
    fn test_callback_update() {
        let inbound = parse(
            r#"{"update_id": 6, "callback_query": {"id": "cb1", "data": "remove_page",
                "message": {"message_id": 3, "chat": {"id": 9}}}}"#,
        )
        .unwrap();
        assert_eq!(inbound.event.kind, EventKind::ActionSelected(Action::DeletePage));
        assert_eq!(inbound.event.chat_id, 9);
        assert_eq!(inbound.callback_id.as_deref(), Some("cb1"));
    }

    #[test]
    fn test_unknown_callback_ignored() {
        let inbound = parse(
            r#"{"update_id": 6, "callback_query": {"id": "cb1", "data": "nope",
                "message": {"message_id": 3, "chat": {"id": 9}}}}"#,
        );
        assert!(inbound.is_none());
    }

    #[test]
    fn test_start_and_text() {
        let start = parse(
            r#"{"update_id": 1, "message": {"message_id": 1, "chat": {"id": 1}, "text": "/start@pdf_bot"}}"#,
        )
        .unwrap();
        assert_eq!(start.event.kind, EventKind::Start);

        let text = parse(
            r#"{"update_id": 2, "message": {"message_id": 2, "chat": {"id": 1}, "text": "3"}}"#,
        )
        .unwrap();
        assert_eq!(text.event.kind, EventKind::Text("3".to_string()));
    }

    #[test]
    fn test_error_response() {
        let response: ApiResponse<File> = serde_json::from_str(
            r#"{"ok": false, "error_code": 400, "description": "Bad Request: file is too big"}"#,
        )
        .unwrap();
        let err = response.into_result().unwrap_err();
        assert!(err.to_string().contains("file is too big"));
    }

    #[test]
    fn test_main_menu_layout() {
        let menu = InlineKeyboardMarkup::main_menu();
        assert_eq!(menu.inline_keyboard.len(), 5);
        assert_eq!(menu.inline_keyboard[0][0].callback_data, "remove_watermark");
        assert_eq!(menu.inline_keyboard[4][0].callback_data, "remove_page");
    }
}

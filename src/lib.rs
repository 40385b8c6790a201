//! PDF Transform Bot Library
//!
//! A Telegram bot that applies one of five transforms to an uploaded PDF:
//! - Strip images from every page
//! - Strip links and `@` mentions
//! - Stamp a linked watermark
//! - Recompress
//! - Delete a single page

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod pdf;
pub mod session;
pub mod telegram;
pub mod transport;
pub mod workspace;

pub use config::BotConfig;
pub use dispatcher::{parse_page_number, Dispatcher};
pub use error::{Error, Result};
pub use session::{Action, Session, SessionState, SessionStore};
pub use telegram::{run_bot, TelegramClient};
pub use transport::{ChatId, Event, EventKind, IncomingDocument, Transport};
pub use workspace::RequestWorkspace;

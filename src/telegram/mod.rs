//! Telegram Bot API transport

mod client;
mod runner;
pub mod types;

pub use client::TelegramClient;
pub use runner::run_bot;
pub use types::{Inbound, InlineKeyboardMarkup, Update};

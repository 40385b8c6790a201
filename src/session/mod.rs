//! Conversation sessions

mod action;
mod state;
mod store;

pub use action::Action;
pub use state::{HeldFile, Session, SessionState};
pub use store::{SessionHandle, SessionStore};

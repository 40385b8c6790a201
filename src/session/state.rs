//! Per-conversation state machine
//!
//! ```text
//! Idle ──select──▶ AwaitingFile(action) ──file──▶ Idle
//!                        │
//!                        └─file (DeletePage)──▶ AwaitingPageNumber ──valid number──▶ Idle
//! ```

use super::Action;
use crate::workspace::RequestWorkspace;
use std::time::{Duration, Instant};

/// Upload kept while waiting for the page number
#[derive(Debug)]
pub struct HeldFile {
    pub workspace: RequestWorkspace,
    /// Name of the original upload, if the transport supplied one
    pub file_name: Option<String>,
    received_at: Instant,
}

impl HeldFile {
    pub fn new(workspace: RequestWorkspace, file_name: Option<String>) -> Self {
        Self {
            workspace,
            file_name,
            received_at: Instant::now(),
        }
    }

    /// True once the file has waited longer than `ttl`
    pub fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.received_at) >= ttl
    }
}

/// Where a conversation is in the two-step flow
#[derive(Debug, Default)]
pub enum SessionState {
    /// No action chosen
    #[default]
    Idle,
    /// Action chosen, file expected
    AwaitingFile(Action),
    /// File received for page deletion, page number expected
    AwaitingPageNumber(HeldFile),
}

/// Ephemeral state of one conversation
#[derive(Debug, Default)]
pub struct Session {
    state: SessionState,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Currently selected action, `None` when idle
    pub fn selected_action(&self) -> Option<Action> {
        match &self.state {
            SessionState::Idle => None,
            SessionState::AwaitingFile(action) => Some(*action),
            SessionState::AwaitingPageNumber(_) => Some(Action::DeletePage),
        }
    }

    pub fn awaiting_page_number(&self) -> bool {
        matches!(self.state, SessionState::AwaitingPageNumber(_))
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, SessionState::Idle)
    }

    /// Record a menu choice; a held file from an earlier choice is released
    pub fn select(&mut self, action: Action) {
        self.state = SessionState::AwaitingFile(action);
    }

    /// Keep the uploaded file and wait for the page number
    pub fn await_page_number(&mut self, held: HeldFile) {
        self.state = SessionState::AwaitingPageNumber(held);
    }

    /// Take the held file out, leaving the session idle
    pub fn take_held(&mut self) -> Option<HeldFile> {
        match std::mem::take(&mut self.state) {
            SessionState::AwaitingPageNumber(held) => Some(held),
            other => {
                self.state = other;
                None
            }
        }
    }

    /// Back to idle, releasing anything held
    pub fn reset(&mut self) {
        self.state = SessionState::Idle;
    }

    /// Release a held file left waiting past `ttl`. Returns whether one was dropped.
    pub fn expire_held(&mut self, ttl: Duration, now: Instant) -> bool {
        match &self.state {
            SessionState::AwaitingPageNumber(held) if held.is_expired(ttl, now) => {
                self.reset();
                true
            }
            _ => false,
        }
    }
}

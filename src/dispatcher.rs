//! Request dispatcher: events in, transforms run, replies out

use crate::config::BotConfig;
use crate::error::{Error, Result};
use crate::pdf::{self, WatermarkOptions};
use crate::session::{Action, HeldFile, Session, SessionState, SessionStore};
use crate::transport::{
    ChatId, Event, EventKind, IncomingDocument, Transport, EXPECTING_PAGE_NUMBER, MENU_TEXT,
    PAGE_NUMBER_PROMPT, USE_MENU_HINT,
};
use crate::workspace::RequestWorkspace;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Parse a page number typed by the user.
///
/// Accepts ASCII, Persian (`۰-۹`) and Arabic-Indic (`٠-٩`) digits.
pub fn parse_page_number(input: &str) -> Result<i64> {
    let normalized: String = input
        .trim()
        .chars()
        .map(|c| match c {
            '\u{06F0}'..='\u{06F9}' => char::from(b'0' + (c as u32 - 0x06F0) as u8),
            '\u{0660}'..='\u{0669}' => char::from(b'0' + (c as u32 - 0x0660) as u8),
            other => other,
        })
        .collect();

    match normalized.parse::<i64>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(Error::InvalidPageNumber {
            input: input.to_string(),
        }),
    }
}

/// Run `action` from `input` into `output` (blocking)
fn run_transform(
    action: Action,
    input: &Path,
    output: &Path,
    watermark: &WatermarkOptions,
    page_number: Option<i64>,
) -> Result<()> {
    match action {
        Action::StripImages => pdf::strip_images(input, output),
        Action::StripLinks => pdf::strip_links_and_mentions(input, output),
        Action::AddWatermark => pdf::add_watermark(input, output, watermark),
        Action::Compress => pdf::compress(input, output),
        Action::DeletePage => {
            let page_number = page_number.ok_or_else(|| Error::InvalidPageNumber {
                input: String::new(),
            })?;
            pdf::delete_page(input, output, page_number)
        }
    }
}

/// Maps conversation events to transforms and replies
pub struct Dispatcher<T: Transport> {
    transport: Arc<T>,
    sessions: Arc<SessionStore>,
    config: Arc<BotConfig>,
}

impl<T: Transport> Clone for Dispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            sessions: Arc::clone(&self.sessions),
            config: Arc::clone(&self.config),
        }
    }
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(transport: Arc<T>, config: BotConfig) -> Self {
        let sessions = SessionStore::new(config.max_sessions);
        Self {
            transport,
            sessions: Arc::new(sessions),
            config: Arc::new(config),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Release held files nobody came back for; see [`SessionStore::sweep_expired`]
    pub fn sweep_expired(&self) -> usize {
        let released = self.sessions.sweep_expired(self.config.held_file_ttl);
        if released > 0 {
            tracing::info!(released, "expired held files released");
        }
        released
    }

    /// Handle one event. Processing failures are reported to the user;
    /// only failures to reach the user are returned.
    pub async fn handle(&self, event: Event) -> Result<()> {
        let chat_id = event.chat_id;
        let handle = self.sessions.get_or_create(chat_id);
        let mut session = handle.lock().await;
        if session.expire_held(self.config.held_file_ttl, Instant::now()) {
            tracing::info!(chat_id, "held file expired");
        }

        match event.kind {
            EventKind::Start => {
                session.reset();
                self.transport.send_menu(chat_id, MENU_TEXT).await
            }
            EventKind::ActionSelected(action) => {
                tracing::info!(chat_id, %action, "action selected");
                session.select(action);
                self.transport.send_text(chat_id, action.prompt()).await
            }
            EventKind::Document(document) => {
                match self.on_document(chat_id, &mut session, document).await {
                    Ok(()) => Ok(()),
                    Err(e) => self.report(chat_id, &mut session, e).await,
                }
            }
            EventKind::Text(text) => self.on_text(chat_id, &mut session, &text).await,
        }
    }

    /// Log and tell the user; unrecoverable errors reset the session
    async fn report(&self, chat_id: ChatId, session: &mut Session, err: Error) -> Result<()> {
        tracing::warn!(chat_id, error = %err, "request failed");
        let recoverable = err.is_user_recoverable();
        if !recoverable {
            session.reset();
        }
        self.transport
            .send_text(chat_id, &err.client_message())
            .await?;
        if !recoverable || matches!(err, Error::NoActionSelected) {
            self.transport.send_menu(chat_id, MENU_TEXT).await?;
        }
        Ok(())
    }

    async fn on_document(
        &self,
        chat_id: ChatId,
        session: &mut Session,
        document: IncomingDocument,
    ) -> Result<()> {
        let action = match session.state() {
            SessionState::Idle => return Err(Error::NoActionSelected),
            SessionState::AwaitingPageNumber(_) => {
                return self.transport.send_text(chat_id, EXPECTING_PAGE_NUMBER).await;
            }
            SessionState::AwaitingFile(action) => *action,
        };

        let max_size = self.config.max_upload_bytes;
        if let Some(size) = document.size {
            if size > max_size {
                return Err(Error::FileTooLarge { size, max_size });
            }
        }
        if !document.looks_like_pdf() {
            return Err(Error::UnsupportedFileType {
                mime: document.mime_type.unwrap_or_default(),
            });
        }

        let workspace = RequestWorkspace::create(&self.config.temp_root, chat_id)?;
        let request_id = workspace.request_id();
        let received = workspace.received();
        let bytes = self
            .transport
            .download(&document.file_id, &received, max_size)
            .await?;
        tracing::info!(chat_id, %action, %request_id, bytes, "file received");

        if action.needs_page_number() {
            session.await_page_number(HeldFile::new(workspace, document.file_name));
            if let Err(e) = self.transport.send_text(chat_id, PAGE_NUMBER_PROMPT).await {
                session.reset();
                return Err(e);
            }
            return Ok(());
        }

        let (output, name) = self
            .run_pipeline(action, &workspace, document.file_name.as_deref(), None)
            .await?;
        self.deliver(chat_id, session, action.done_message(), &output, &name)
            .await
    }

    async fn on_text(&self, chat_id: ChatId, session: &mut Session, text: &str) -> Result<()> {
        if !session.awaiting_page_number() {
            return self.transport.send_menu(chat_id, USE_MENU_HINT).await;
        }

        let page_number = match parse_page_number(text) {
            Ok(n) => n,
            Err(e) => return self.report(chat_id, session, e).await,
        };
        let Some(held) = session.take_held() else {
            return self.transport.send_menu(chat_id, USE_MENU_HINT).await;
        };

        let result = self
            .run_pipeline(
                Action::DeletePage,
                &held.workspace,
                held.file_name.as_deref(),
                Some(page_number),
            )
            .await;

        match result {
            Ok((output, name)) => {
                let done = format!("✅ Page {} deleted. Sending file...", page_number);
                match self.deliver(chat_id, session, &done, &output, &name).await {
                    Ok(()) => Ok(()),
                    Err(e) => self.report(chat_id, session, e).await,
                }
            }
            Err(e) => {
                if e.is_user_recoverable() {
                    // Out-of-range: keep the file and ask again
                    session.await_page_number(held);
                }
                self.report(chat_id, session, e).await
            }
        }
    }

    /// Transform then recompress on the blocking pool; returns the final path and its name
    async fn run_pipeline(
        &self,
        action: Action,
        workspace: &RequestWorkspace,
        file_name: Option<&str>,
        page_number: Option<i64>,
    ) -> Result<(PathBuf, String)> {
        let name = self
            .config
            .output_file_name
            .as_deref()
            .or(file_name)
            .unwrap_or("document.pdf");
        let output = workspace.output(name)?;
        let name = output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());

        let input = workspace.received();
        let processed = workspace.processed();
        let final_output = output.clone();
        let watermark = self.config.watermark.clone();
        let request_id = workspace.request_id();

        tokio::task::spawn_blocking(move || {
            run_transform(action, &input, &processed, &watermark, page_number)?;
            pdf::compress(&processed, &final_output)
        })
        .await
        .map_err(|e| Error::Task {
            reason: format!("Task join error: {}", e),
        })??;

        tracing::info!(%action, %request_id, "transform finished");
        Ok((output, name))
    }

    /// Send the result and return the conversation to idle
    async fn deliver(
        &self,
        chat_id: ChatId,
        session: &mut Session,
        done: &str,
        output: &Path,
        name: &str,
    ) -> Result<()> {
        session.reset();
        self.transport.send_text(chat_id, done).await?;
        self.transport.send_document(chat_id, output, name).await?;
        self.transport.send_menu(chat_id, MENU_TEXT).await
    }
}

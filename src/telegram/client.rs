//! Bot API client over reqwest

use super::types::{
    ApiResponse, File, GetUpdatesParams, InlineKeyboardMarkup, SendMessageParams, Update,
};
use crate::config::BotConfig;
use crate::error::{Error, Result};
use crate::transport::{ChatId, Transport};
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(300);

/// Telegram Bot API client
pub struct TelegramClient {
    http: reqwest::Client,
    api_base: Url,
    file_base: Url,
}

impl TelegramClient {
    pub fn new(config: &BotConfig) -> Result<Self> {
        let base = config.api_url.trim_end_matches('/');
        let api_base = parse_base(&format!("{}/bot{}/", base, config.token))?;
        let file_base = parse_base(&format!("{}/file/bot{}/", base, config.token))?;

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .build()
            .map_err(Error::from)?;

        Ok(Self {
            http,
            api_base,
            file_base,
        })
    }

    fn method_url(&self, method: &str) -> Result<Url> {
        self.api_base.join(method).map_err(|e| Error::Telegram {
            reason: format!("Invalid method URL {}: {}", method, e),
        })
    }

    async fn call<P, R>(&self, method: &str, params: &P, timeout: Duration) -> Result<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .http
            .post(self.method_url(method)?)
            .timeout(timeout)
            .json(params)
            .send()
            .await?;
        parse_response(&response.bytes().await?)
    }

    /// Long-poll for updates after `offset`
    pub async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>> {
        let params = GetUpdatesParams {
            offset,
            timeout: timeout_secs,
            allowed_updates: vec!["message", "callback_query"],
        };
        let timeout = Duration::from_secs(timeout_secs) + REQUEST_TIMEOUT;
        self.call("getUpdates", &params, timeout).await
    }

    /// Acknowledge a button press so the client stops its spinner
    pub async fn answer_callback_query(&self, callback_id: &str) -> Result<()> {
        let params = serde_json::json!({ "callback_query_id": callback_id });
        let _: bool = self
            .call("answerCallbackQuery", &params, REQUEST_TIMEOUT)
            .await?;
        Ok(())
    }

    pub async fn get_file(&self, file_id: &str) -> Result<File> {
        let params = serde_json::json!({ "file_id": file_id });
        self.call("getFile", &params, REQUEST_TIMEOUT).await
    }

    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        reply_markup: Option<InlineKeyboardMarkup>,
    ) -> Result<()> {
        let params = SendMessageParams {
            chat_id,
            text,
            reply_markup,
        };
        let _: serde_json::Value = self.call("sendMessage", &params, REQUEST_TIMEOUT).await?;
        Ok(())
    }
}

/// Decode a Bot API envelope; error statuses still carry a JSON body
fn parse_response<R: DeserializeOwned>(body: &[u8]) -> Result<R> {
    let envelope: ApiResponse<R> = serde_json::from_slice(body)?;
    envelope.into_result()
}

fn parse_base(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| Error::InvalidConfig {
        name: "TELEGRAM_API_URL".to_string(),
        reason: e.to_string(),
    })
}

impl Transport for TelegramClient {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<()> {
        self.send_message(chat_id, text, None).await
    }

    async fn send_menu(&self, chat_id: ChatId, text: &str) -> Result<()> {
        self.send_message(chat_id, text, Some(InlineKeyboardMarkup::main_menu()))
            .await
    }

    async fn send_document(&self, chat_id: ChatId, path: &Path, file_name: &str) -> Result<()> {
        let data = tokio::fs::read(path).await?;
        let part = reqwest::multipart::Part::bytes(data)
            .file_name(file_name.to_string())
            .mime_str("application/pdf")?;
        let form = reqwest::multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .part("document", part);

        let response = self
            .http
            .post(self.method_url("sendDocument")?)
            .timeout(TRANSFER_TIMEOUT)
            .multipart(form)
            .send()
            .await?;
        let _: serde_json::Value = parse_response(&response.bytes().await?)?;
        Ok(())
    }

    async fn download(&self, file_id: &str, dest: &Path, max_bytes: u64) -> Result<u64> {
        let file = self.get_file(file_id).await?;
        if let Some(size) = file.file_size {
            if size > max_bytes {
                return Err(Error::FileTooLarge {
                    size,
                    max_size: max_bytes,
                });
            }
        }
        let file_path = file.file_path.ok_or_else(|| Error::Telegram {
            reason: format!("File {} is not available for download", file.file_id),
        })?;
        let url = self.file_base.join(&file_path).map_err(|e| Error::Telegram {
            reason: format!("Invalid file path {}: {}", file_path, e),
        })?;

        let response = self
            .http
            .get(url)
            .timeout(TRANSFER_TIMEOUT)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::Telegram {
                reason: format!("File download failed with status: {}", response.status()),
            });
        }

        if let Some(content_length) = response.content_length() {
            if content_length > max_bytes {
                return Err(Error::FileTooLarge {
                    size: content_length,
                    max_size: max_bytes,
                });
            }
        }

        let mut out = tokio::fs::File::create(dest).await?;
        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(Error::from)?;
            written += chunk.len() as u64;
            if written > max_bytes {
                return Err(Error::FileTooLarge {
                    size: written,
                    max_size: max_bytes,
                });
            }
            out.write_all(&chunk).await?;
        }
        out.flush().await?;

        Ok(written)
    }
}

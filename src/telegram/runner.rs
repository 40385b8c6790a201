//! Long-polling update loop

use super::client::TelegramClient;
use super::types::Inbound;
use crate::config::BotConfig;
use crate::dispatcher::Dispatcher;
use std::sync::Arc;
use std::time::Duration;

const MAX_BACKOFF: Duration = Duration::from_secs(30);
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Run the bot until Ctrl-C
pub async fn run_bot(config: BotConfig) -> anyhow::Result<()> {
    let client = Arc::new(TelegramClient::new(&config)?);
    let poll_timeout = config.poll_timeout_secs;
    let dispatcher = Dispatcher::new(Arc::clone(&client), config);

    tracing::info!(poll_timeout, "Bot started, polling for updates");

    let sweeper = tokio::spawn(sweep_held_files(dispatcher.clone()));

    tokio::select! {
        _ = poll_updates(client, dispatcher, poll_timeout) => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("Shutdown requested");
        }
    }

    sweeper.abort();
    Ok(())
}

/// Periodically release uploads whose page number never arrived
async fn sweep_held_files(dispatcher: Dispatcher<TelegramClient>) {
    let mut interval = tokio::time::interval(SWEEP_INTERVAL);
    loop {
        interval.tick().await;
        dispatcher.sweep_expired();
    }
}

/// Fetch updates forever, handing each one to its own task
async fn poll_updates(
    client: Arc<TelegramClient>,
    dispatcher: Dispatcher<TelegramClient>,
    poll_timeout: u64,
) {
    let mut offset: Option<i64> = None;
    let mut backoff = Duration::from_secs(1);

    loop {
        let updates = match client.get_updates(offset, poll_timeout).await {
            Ok(updates) => {
                backoff = Duration::from_secs(1);
                updates
            }
            Err(e) => {
                tracing::warn!(error = %e, retry_in = ?backoff, "getUpdates failed");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
                continue;
            }
        };

        for update in updates {
            offset = Some(update.update_id + 1);
            let update_id = update.update_id;
            let Some(inbound) = update.into_inbound() else {
                tracing::debug!(update_id, "Ignoring update");
                continue;
            };
            tokio::spawn(handle_inbound(
                Arc::clone(&client),
                dispatcher.clone(),
                inbound,
            ));
        }
    }
}

async fn handle_inbound(
    client: Arc<TelegramClient>,
    dispatcher: Dispatcher<TelegramClient>,
    inbound: Inbound,
) {
    let chat_id = inbound.event.chat_id;
    if let Some(callback_id) = inbound.callback_id {
        if let Err(e) = client.answer_callback_query(&callback_id).await {
            tracing::debug!(chat_id, error = %e, "answerCallbackQuery failed");
        }
    }
    if let Err(e) = dispatcher.handle(inbound.event).await {
        tracing::error!(chat_id, error = %e, "Failed to reply");
    }
}

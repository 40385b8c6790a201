//! PDF Transform Bot - Entry point

use pdf_transform_bot::{run_bot, BotConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdf_transform_bot=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = BotConfig::from_env()?;
    tracing::info!(
        api_url = %config.api_url,
        max_upload_bytes = config.max_upload_bytes,
        "Starting PDF Transform Bot"
    );

    run_bot(config).await
}

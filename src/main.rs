use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vidscribe::server::create_router;
use vidscribe::{Config, TranscriptionService};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vidscribe=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load();

    if config.openai_api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY is not configured; speech-API fallback will be unavailable");
    }
    if config.captions_only {
        tracing::info!("Captions-only mode: server-side media download is disabled");
    }
    tracing::info!(
        cookies = config.cookie_blob.is_some(),
        anonymous_captions = config.anonymous_captions,
        "Caption session configuration"
    );

    let service = Arc::new(TranscriptionService::from_config(&config)?);
    let router = create_router(service, config.max_body_bytes);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    tracing::info!(address = %config.bind, "Listening");

    axum::serve(listener, router)
        .await
        .context("server terminated")?;

    Ok(())
}

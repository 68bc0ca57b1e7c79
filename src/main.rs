/// Main application entry point
mod clients;
mod config;
mod domain;
mod errors;
mod handlers;
mod repo;
mod routes;
mod services;
mod utils;
mod view;

use crate::clients::{
    ApodClient, DownloadConditions, HttpClient, MediaClient, TranslateClient, Translator,
};
use crate::config::AppConfig;
use crate::domain::DateKey;
use crate::handlers::AppState;
use crate::repo::{connect, init_db, CredentialRepo};
use crate::routes::build_router;
use crate::services::{Collaborators, HttpCredentialPrompt, Orchestrator};
use crate::view::{Display, ViewState};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    // Load configuration
    let config = AppConfig::from_env()?;
    info!("Configuration loaded successfully");

    // Preferences database
    let pool = connect(&config.database_url).await?;
    init_db(&pool).await?;
    info!("Preferences store ready");

    // Initialize clients
    let http_client = HttpClient::new(Duration::from_secs(config.http_timeout_seconds))?;
    let apod = Arc::new(ApodClient::new(
        http_client.clone(),
        config.apod_api_url.clone(),
    ));
    let media = Arc::new(MediaClient::new(http_client.clone()));
    let translator = Arc::new(TranslateClient::new(
        http_client,
        config.translate_api_url.clone(),
        config.translate_api_key.clone(),
        config.network.metered,
    ));

    let display = Display::new(ViewState::initial(DateKey::today()));
    let prompt = Arc::new(HttpCredentialPrompt::new());
    let orchestrator = Orchestrator::new(
        Collaborators {
            apod,
            media,
            translator: translator.clone(),
            store: Arc::new(CredentialRepo::new(pool)),
            prompt: prompt.clone(),
        },
        display,
        config.image,
        config.supersede_stale_loads,
    );

    start_background_tasks(&config, translator, orchestrator.clone());

    let state = AppState {
        orchestrator,
        prompt,
    };
    let app = build_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("apod_screen listening on {}", config.bind_addr);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// Translation model download and the first load of the session
fn start_background_tasks(
    config: &AppConfig,
    translator: Arc<TranslateClient>,
    orchestrator: Arc<Orchestrator>,
) {
    {
        let conditions = DownloadConditions {
            require_unmetered: config.network.require_unmetered_for_model,
        };
        tokio::spawn(async move {
            match translator.prepare(&conditions).await {
                Ok(()) => info!(ready = translator.is_ready(), "translation model prepared"),
                Err(e) => warn!("translation model unavailable: {}", e),
            }
        });
    }

    tokio::spawn(async move {
        match orchestrator.ensure_credential().await {
            Ok(Some(handle)) => {
                let title = handle
                    .record
                    .as_ref()
                    .map(|r| r.title.clone())
                    .unwrap_or_default();
                let outcome = handle.finished().await;
                info!(?outcome, %title, "initial load finished");
            }
            Ok(None) => warn!("no API key provided, screen stays idle"),
            Err(e) => error!("startup failed: {}", e),
        }
    });
}

mod api;
mod config;
mod engine;
mod error;
mod models;
mod notify;
mod observability;
mod state;
mod store;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::notify::{NoopNotifier, Notifier, WhatsAppNotifier};
use crate::store::InMemoryStore;

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    let config = config::Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let notifier: Arc<dyn Notifier> = match (
        config.whatsapp_url.clone(),
        config.whatsapp_api_key.clone(),
        config.whatsapp_instance.clone(),
    ) {
        (Some(url), Some(api_key), Some(instance)) => Arc::new(WhatsAppNotifier::new(
            url,
            api_key,
            instance,
            config.country_code.clone(),
        )),
        _ => {
            tracing::warn!("WHATSAPP_* not fully configured; notifications disabled");
            Arc::new(NoopNotifier)
        }
    };

    let app_state = Arc::new(state::AppState::new(
        config.clone(),
        Arc::new(InMemoryStore::new()),
        notifier,
    ));

    let app = api::rest::router(app_state.clone());

    tokio::spawn(engine::driver::run_poll_driver(app_state.clone()));

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| error::AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| error::AppError::Internal(format!("server error: {err}")))?;

    app_state.timers.clear();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}

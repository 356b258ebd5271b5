mod app;
mod auth;
mod db;
mod handlers;
mod models;
mod providers;
mod service;
mod state;
mod storage;

use mediaforge_common::{bind_listener, env_or, init_tracing, shutdown_signal};
use tokio_postgres::NoTls;

use crate::providers::ProviderSet;
use crate::state::AppState;
use crate::storage::{StorageClient, StorageConfig};

#[tokio::main]
async fn main() {
    let _guards = init_tracing("generation-service");

    let port = env_or("PORT", 8080u16);
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL is required");
    let request_timeout = env_or("PROVIDER_TIMEOUT_SECS", 120u64);
    let storage = build_storage().await;

    let (client, connection) = tokio_postgres::connect(&database_url, NoTls)
        .await
        .expect("connect db");
    tokio::spawn(async move {
        // Drive the connection in the background.
        if let Err(err) = connection.await {
            tracing::error!(error = %err, "database connection error");
        }
    });
    db::ensure_schema(&client).await.expect("ensure schema");

    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(request_timeout))
        .build()
        .expect("http client");

    let state = AppState {
        db: std::sync::Arc::new(tokio::sync::Mutex::new(client)),
        providers: std::sync::Arc::new(ProviderSet::from_env(http)),
        storage,
    };

    let app = app::build_router(state);
    let listener = bind_listener(port).await;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("serve");
}

async fn build_storage() -> Option<StorageClient> {
    let config = StorageConfig::from_env()?;
    match StorageClient::new(config).await {
        Ok(client) => Some(client),
        Err(err) => {
            tracing::warn!(error = %err, "blob store init failed");
            None
        }
    }
}

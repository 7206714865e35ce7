pub mod auth;
pub mod config;
pub mod cors;
pub mod encode;
pub mod errors;
pub mod health;
pub mod metrics_defs;
pub mod request;
pub mod service;
pub mod store;
pub mod update;

#[cfg(test)]
mod testutils;

use config::{CLIENT_SHARED_KEY_ENV, Config, STORE_TOKEN_ENV, Secrets, ValidationError};
use service::SaveService;
use shared::admin_service::AdminService;
use shared::http::run_http_service;
use std::sync::Arc;
use store::{GithubStore, StoreError};

#[derive(thiserror::Error, Debug)]
pub enum SaveProxyError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Config(#[from] ValidationError),
    #[error("store client error: {0}")]
    Store(#[from] StoreError),
}

/// Serves the save endpoint until a listener fails. Secrets are fixed for the
/// lifetime of the process.
pub async fn run(config: Config, secrets: Secrets) -> Result<(), SaveProxyError> {
    config.validate()?;

    if secrets.client_shared_key.is_empty() {
        tracing::warn!("{CLIENT_SHARED_KEY_ENV} is not set; every save request will be rejected");
    }
    if secrets.store_token.is_empty() {
        tracing::warn!("{STORE_TOKEN_ENV} is not set; the remote store will refuse writes");
    }
    let ready = !secrets.client_shared_key.is_empty() && !secrets.store_token.is_empty();

    let store = GithubStore::new(&config.store, secrets.store_token.clone())?;
    let service = SaveService::new(&config, &secrets, Arc::new(store))?;

    tracing::info!(
        host = %config.listener.host,
        port = config.listener.port,
        store = %config.store.base_url,
        health_path = %config.health_path,
        "starting save proxy"
    );
    let save_task = run_http_service(&config.listener.host, config.listener.port, service);

    match &config.admin_listener {
        Some(admin) => {
            let admin_service = AdminService::<_, SaveProxyError>::new(move || ready);
            let admin_task = run_http_service(&admin.host, admin.port, admin_service);
            tokio::try_join!(save_task, admin_task)?;
        }
        None => save_task.await?,
    }

    Ok(())
}

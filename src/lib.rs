//! SkillSwap: peer-to-peer skill exchange requests with in-app notifications.
//!
//! The library holds the whole service; `main.rs` only wires configuration,
//! telemetry and the CLI around it.

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod directory;
pub mod errors;
pub mod jobs;
pub mod lifecycle;
pub mod metrics;
pub mod models;
pub mod notification;
pub mod query;
pub mod server;
pub mod store;

use std::sync::Arc;

use auth::{AuthService, OtpSender, TokenIssuer};
use directory::UserDirectory;
use lifecycle::SwapManager;
use notification::Dispatcher;
use query::SwapQueries;
use store::Store;

/// Shared application state passed to handlers and middleware.
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub swaps: SwapManager,
    pub queries: SwapQueries,
    pub users: UserDirectory,
    pub auth: AuthService,
    pub config: config::Config,
}

impl AppState {
    pub fn new(
        config: config::Config,
        store: Arc<dyn Store>,
        otp_sender: Arc<dyn OtpSender>,
    ) -> Self {
        let dispatcher = Dispatcher::new(store.clone())
            .with_webhooks(&config.webhook_urls, config.webhook_secret.clone());
        let swaps = SwapManager::new(store.clone(), dispatcher)
            .with_max_message_len(config.max_message_len);
        let auth = AuthService::new(
            store.clone(),
            TokenIssuer::new(&config.jwt_secret),
            otp_sender,
        )
        .with_otp_ttl(chrono::Duration::seconds(config.otp_ttl_secs));

        Self {
            queries: SwapQueries::new(store.clone()),
            users: UserDirectory::new(store.clone()),
            store,
            swaps,
            auth,
            config,
        }
    }
}

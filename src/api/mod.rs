pub mod health;
pub mod keys;
pub mod notifications;
pub mod registrations;

#[cfg(test)]
mod testing;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::config::Config;
use crate::payments::GatewayManager;
use keys::SecurityKeyStore;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub manager: Arc<GatewayManager>,
    pub keys: Arc<dyn SecurityKeyStore>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/transactions", post(registrations::register_transaction))
        .route("/tokens", post(registrations::register_token))
        .route(
            "/notifications/transaction",
            post(notifications::transaction_notification),
        )
        .route("/notifications/token", post(notifications::token_notification))
        .with_state(state)
}

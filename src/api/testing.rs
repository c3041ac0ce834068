//! Router fixtures shared by the handler tests.

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header::CONTENT_TYPE, Request, StatusCode};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use super::keys::InMemorySecurityKeyStore;
use super::{router, AppState};
use crate::config::Config;
use crate::error::{GatewayError, GatewayResult};
use crate::payments::manager::REDIRECT_KEYS;
use crate::payments::traits::{BaseUrlResolver, HttpTransport};
use crate::payments::GatewayManager;

pub const SECURITY_KEY: &str = "XYZ1234567";

/// Answers every POST with the same body and counts the calls.
pub struct StubTransport {
    reply: Option<String>,
    calls: Mutex<usize>,
}

impl StubTransport {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.to_string()),
            calls: Mutex::new(0),
        })
    }

    pub fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            calls: Mutex::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl HttpTransport for StubTransport {
    async fn post(&self, _url: &str, _body: String) -> GatewayResult<String> {
        *self.calls.lock().unwrap() += 1;
        self.reply
            .clone()
            .ok_or_else(|| GatewayError::transport("connection refused"))
    }
}

pub fn config() -> Config {
    let mut vars: HashMap<String, String> = HashMap::new();
    vars.insert("PORT".to_string(), "8080".to_string());
    vars.insert("SAGEPAY_VENDOR".to_string(), "acme".to_string());
    vars.insert("SAGEPAY_PUBLIC_URL".to_string(), "https://shop.example".to_string());
    for key in REDIRECT_KEYS {
        vars.insert(
            format!("SAGEPAY_REDIRECT_{}", key.to_uppercase()),
            format!("@pages/{}", key),
        );
    }
    Config::from_source(|key| vars.get(key).cloned()).unwrap()
}

pub fn app_state(transport: Arc<StubTransport>, keys: Arc<InMemorySecurityKeyStore>) -> AppState {
    let config = config();
    let resolver = BaseUrlResolver::new(&config.gateway.public_url).unwrap();
    let manager = GatewayManager::new(config.gateway_settings(), transport, Arc::new(resolver)).unwrap();

    AppState {
        config: Arc::new(config),
        manager: Arc::new(manager),
        keys,
    }
}

pub async fn send(state: AppState, uri: &str, content_type: &str, body: String) -> (StatusCode, String) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap();

    let response = router(state).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

pub async fn post_form(state: AppState, uri: &str, body: &str) -> (StatusCode, String) {
    send(state, uri, "application/x-www-form-urlencoded", body.to_string()).await
}

pub async fn post_json(state: AppState, uri: &str, body: serde_json::Value) -> (StatusCode, String) {
    send(state, uri, "application/json", body.to_string()).await
}

//! reqwest-backed gateway transport

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error};

use crate::error::{GatewayError, GatewayResult};
use crate::payments::traits::HttpTransport;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Transport settings
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub timeout_secs: u64,
    /// Disable only against a simulator with a broken certificate chain.
    pub verify_peer: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            verify_peer: true,
        }
    }
}

/// Posts form bodies with a fixed timeout. Never retries; a repeated POST
/// could register a second payment.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    timeout_secs: u64,
}

impl ReqwestTransport {
    pub fn new(config: TransportConfig) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(!config.verify_peer)
            .build()
            .map_err(|e| GatewayError::config_error(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            timeout_secs: config.timeout_secs,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post(&self, url: &str, body: String) -> GatewayResult<String> {
        debug!(url = %url, bytes = body.len(), "posting to gateway");

        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::timeout(self.timeout_secs)
                } else {
                    GatewayError::from(e)
                }
            })?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            error!(url = %url, status = %status, "gateway returned an HTTP error");
            return Err(GatewayError::transport(format!(
                "gateway returned HTTP {}",
                status
            )));
        }

        Ok(text)
    }
}

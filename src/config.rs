use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::env;
use std::sync::Arc;

use crate::payments::manager::{
    GatewaySettings, DEFAULT_PROTOCOL, DEFAULT_TOKEN_NOTIFICATION_URL,
    DEFAULT_TRANSACTION_NOTIFICATION_URL, REDIRECT_KEYS,
};
use crate::payments::transport::{ReqwestTransport, TransportConfig, DEFAULT_TIMEOUT_SECS};
use crate::payments::{BaseUrlResolver, GatewayManager, Mode};

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub gateway: GatewayConfig,
    pub transport: TransportConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub vendor: String,
    pub protocol: String,
    pub mode: Mode,
    pub public_url: String,
    pub transaction_notification_url: String,
    pub token_notification_url: String,
    pub redirects: HashMap<String, String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_source(|key| env::var(key).ok())
    }

    /// Loads configuration through `source`, which maps a variable name to
    /// its value.
    pub fn from_source<F>(source: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server = ServerConfig {
            host: source("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: source("PORT")
                .context("PORT not set")?
                .parse()
                .context("PORT must be a valid number")?,
            environment: source("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
        };

        let mut redirects = HashMap::new();
        for key in REDIRECT_KEYS {
            let var = format!("SAGEPAY_REDIRECT_{}", key.to_uppercase());
            let target = source(&var).with_context(|| format!("{} not set", var))?;
            redirects.insert(key.to_string(), target);
        }

        let gateway = GatewayConfig {
            vendor: source("SAGEPAY_VENDOR").context("SAGEPAY_VENDOR not set")?,
            protocol: source("SAGEPAY_PROTOCOL").unwrap_or_else(|| DEFAULT_PROTOCOL.to_string()),
            mode: source("SAGEPAY_MODE")
                .unwrap_or_else(|| "simulator".to_string())
                .parse()
                .context("SAGEPAY_MODE must be simulator, test or live")?,
            public_url: source("SAGEPAY_PUBLIC_URL").context("SAGEPAY_PUBLIC_URL not set")?,
            transaction_notification_url: source("SAGEPAY_TRANSACTION_NOTIFICATION_URL")
                .unwrap_or_else(|| DEFAULT_TRANSACTION_NOTIFICATION_URL.to_string()),
            token_notification_url: source("SAGEPAY_TOKEN_NOTIFICATION_URL")
                .unwrap_or_else(|| DEFAULT_TOKEN_NOTIFICATION_URL.to_string()),
            redirects,
        };

        let transport = TransportConfig {
            timeout_secs: source("SAGEPAY_TIMEOUT_SECS")
                .unwrap_or_else(|| DEFAULT_TIMEOUT_SECS.to_string())
                .parse()
                .context("SAGEPAY_TIMEOUT_SECS must be a valid number")?,
            verify_peer: source("SAGEPAY_VERIFY_PEER")
                .unwrap_or_else(|| "true".to_string())
                .parse()
                .context("SAGEPAY_VERIFY_PEER must be true or false")?,
        };

        let config = Config {
            server,
            gateway,
            transport,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port < 1024 {
            return Err(anyhow!(
                "Port must be at least 1024, got {}",
                self.server.port
            ));
        }

        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&self.server.environment.as_str()) {
            return Err(anyhow!(
                "Environment must be one of: {:?}, got {}",
                valid_environments,
                self.server.environment
            ));
        }

        // Live traffic must always verify the gateway certificate
        if self.gateway.mode == Mode::Live && !self.transport.verify_peer {
            return Err(anyhow!("SAGEPAY_VERIFY_PEER cannot be disabled in live mode"));
        }

        if self.transport.timeout_secs == 0 {
            return Err(anyhow!("SAGEPAY_TIMEOUT_SECS must be greater than 0"));
        }

        if self.gateway.public_url.trim().is_empty() {
            return Err(anyhow!("SAGEPAY_PUBLIC_URL cannot be empty"));
        }

        self.gateway_settings()
            .validate()
            .context("invalid gateway settings")?;

        Ok(())
    }

    pub fn gateway_settings(&self) -> GatewaySettings {
        GatewaySettings {
            vendor: self.gateway.vendor.clone(),
            protocol: self.gateway.protocol.clone(),
            mode: self.gateway.mode,
            transaction_notification_url: self.gateway.transaction_notification_url.clone(),
            token_notification_url: self.gateway.token_notification_url.clone(),
            redirects: self.gateway.redirects.clone(),
        }
    }

    /// Builds a manager wired to the reqwest transport and the public URL.
    pub fn build_manager(&self) -> Result<GatewayManager> {
        let transport = ReqwestTransport::new(self.transport.clone())
            .context("failed to create gateway transport")?;
        let resolver = BaseUrlResolver::new(&self.gateway.public_url)
            .context("SAGEPAY_PUBLIC_URL must be an absolute URL")?;

        GatewayManager::new(self.gateway_settings(), Arc::new(transport), Arc::new(resolver))
            .context("failed to create gateway manager")
    }
}

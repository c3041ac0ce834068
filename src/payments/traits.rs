//! Collaborator trait definitions
//!
//! Seams for the pieces the gateway core consumes but does not own: the HTTP
//! transport and the route/URL resolver.

use async_trait::async_trait;
use url::Url;

use crate::error::{GatewayError, GatewayResult};

/// Outbound HTTP transport used to reach the gateway.
///
/// Implementations must be safe to share across tasks; the manager holds one
/// instance for every transaction it handles.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// POST a URL-encoded body and return the raw response body
    ///
    /// # Arguments
    /// * `url` - Absolute gateway endpoint
    /// * `body` - `application/x-www-form-urlencoded` request body
    ///
    /// # Returns
    /// * `String` - Response body as sent by the gateway
    /// * `GatewayError::Transport` - Network, TLS or timeout failure
    async fn post(&self, url: &str, body: String) -> GatewayResult<String>;
}

/// Turns a configured target into a fully-qualified URL.
pub trait RouteResolver: Send + Sync {
    fn resolve(&self, target: &str) -> GatewayResult<String>;
}

/// Resolves `@route/name` targets against a public base URL and passes
/// absolute URLs through untouched.
#[derive(Debug, Clone)]
pub struct BaseUrlResolver {
    base: Url,
}

impl BaseUrlResolver {
    pub fn new(base_url: &str) -> GatewayResult<Self> {
        let mut base = Url::parse(base_url)
            .map_err(|e| GatewayError::config_error(format!("invalid public URL {}: {}", base_url, e)))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { base })
    }
}

impl RouteResolver for BaseUrlResolver {
    fn resolve(&self, target: &str) -> GatewayResult<String> {
        match target.strip_prefix('@') {
            Some(route) => self
                .base
                .join(route.trim_start_matches('/'))
                .map(String::from)
                .map_err(|e| GatewayError::config_error(format!("cannot resolve route {}: {}", target, e))),
            None => Url::parse(target)
                .map(String::from)
                .map_err(|e| GatewayError::config_error(format!("invalid URL {}: {}", target, e))),
        }
    }
}

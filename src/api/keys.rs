//! Registration records the notification endpoints verify against
//!
//! The gateway hands out a SecurityKey and a VPSTxId when a registration
//! succeeds. Both are kept per vendor tx code until the matching
//! notification arrives.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::payments::TransactionReference;

/// What the gateway assigned to one registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredKey {
    pub vps_tx_id: String,
    pub security_key: String,
}

#[async_trait]
pub trait SecurityKeyStore: Send + Sync {
    async fn store(&self, vendor_tx_code: String, key: StoredKey);

    async fn lookup(&self, vendor_tx_code: &str) -> Option<StoredKey>;

    /// Stores the fields a successful registration recorded onto
    /// `reference`. Returns false when any of them is missing.
    async fn remember(&self, reference: &dyn TransactionReference) -> bool {
        let (Some(vendor_tx_code), Some(vps_tx_id), Some(security_key)) = (
            reference.vendor_tx_code(),
            reference.vps_tx_id(),
            reference.security_key(),
        ) else {
            return false;
        };

        let key = StoredKey {
            vps_tx_id: vps_tx_id.to_string(),
            security_key: security_key.to_string(),
        };
        self.store(vendor_tx_code.to_string(), key).await;
        true
    }
}

/// Process-local key store. Keys are lost on restart.
#[derive(Debug, Default)]
pub struct InMemorySecurityKeyStore {
    keys: RwLock<HashMap<String, StoredKey>>,
}

impl InMemorySecurityKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecurityKeyStore for InMemorySecurityKeyStore {
    async fn store(&self, vendor_tx_code: String, key: StoredKey) {
        self.keys.write().await.insert(vendor_tx_code, key);
    }

    async fn lookup(&self, vendor_tx_code: &str) -> Option<StoredKey> {
        self.keys.read().await.get(vendor_tx_code).cloned()
    }
}

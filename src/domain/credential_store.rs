use crate::domain_model::CredentialSlot;
use crate::domain_port::{KeyValueStore, StoreError};
use std::sync::Arc;

pub const DEFAULT_KEY_PREFIX: &str = "session_jwt";

/// Persists the access and refresh credential strings. No validation happens
/// here; callers decode what they load.
#[derive(Clone)]
pub struct CredentialStore {
    kv: Arc<dyn KeyValueStore>,
    namespace: String,
}

impl CredentialStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, namespace: impl Into<String>) -> Self {
        CredentialStore {
            kv,
            namespace: namespace.into(),
        }
    }

    /// Namespaces the slots by API endpoint so several deployments can share
    /// one backing store.
    pub fn for_endpoint(kv: Arc<dyn KeyValueStore>, key_prefix: &str, endpoint: &str) -> Self {
        Self::new(kv, endpoint_namespace(key_prefix, endpoint))
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn key(&self, slot: CredentialSlot) -> String {
        format!("{}_{}", self.namespace, slot)
    }

    pub fn save(&self, slot: CredentialSlot, raw: &str) -> Result<(), StoreError> {
        self.kv.set(&self.key(slot), raw)
    }

    pub fn load(&self, slot: CredentialSlot) -> Result<Option<String>, StoreError> {
        self.kv.get(&self.key(slot))
    }

    pub fn clear(&self, slot: CredentialSlot) -> Result<(), StoreError> {
        self.kv.remove(&self.key(slot))
    }

    pub fn clear_all(&self) -> Result<(), StoreError> {
        for slot in CredentialSlot::ALL {
            self.clear(slot)?;
        }
        Ok(())
    }
}

pub fn endpoint_namespace(key_prefix: &str, endpoint: &str) -> String {
    format!("{}_{}", key_prefix, endpoint.replace([':', '/'], "_"))
}

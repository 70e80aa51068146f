mod fanout;
mod notifier;
mod store;

pub use fanout::{DispatchHandle, DispatchRequest, FanOut};
pub use notifier::{HttpEmailRelay, LoggingNotifier, NotificationMessage, Notifier};
pub use store::{
    object_path, AlertRecord, EvidenceStore, HttpEvidenceStore, InMemoryEvidenceStore,
    StoredObject,
};

use crate::config::{EvidenceStoreConfig, NotifierConfig};
use std::sync::Arc;
use tracing::{info, warn};

/// HTTP store when a base URL is configured, in-memory otherwise
pub fn evidence_store_from_config(
    client: reqwest::Client,
    config: &EvidenceStoreConfig,
) -> Arc<dyn EvidenceStore> {
    if config.base_url.is_empty() {
        info!("No evidence store configured, keeping evidence in memory");
        return Arc::new(InMemoryEvidenceStore::new());
    }

    match HttpEvidenceStore::from_config(client, config) {
        Ok(store) => {
            info!("Evidence store: {}", config.base_url);
            Arc::new(store)
        }
        Err(e) => {
            warn!("Evidence store disabled: {}", e);
            Arc::new(InMemoryEvidenceStore::new())
        }
    }
}

/// Email relay when a service id is configured, logging otherwise
pub fn notifier_from_config(client: reqwest::Client, config: &NotifierConfig) -> Arc<dyn Notifier> {
    if config.service_id.is_empty() {
        info!("No email relay configured, notifications will be logged");
        return Arc::new(LoggingNotifier::new());
    }

    match HttpEmailRelay::from_config(client, config) {
        Ok(relay) => {
            info!("Email relay: {}", config.endpoint);
            Arc::new(relay)
        }
        Err(e) => {
            warn!("Email relay disabled: {}", e);
            Arc::new(LoggingNotifier::new())
        }
    }
}

use super::{AurasafeApp, ComponentState};
use std::collections::HashMap;
use tracing::debug;

impl AurasafeApp {
    pub async fn set_component_state(&self, component: &str, state: ComponentState) {
        let mut states = self.component_states.lock().await;
        debug!("Component '{}' state changed to: {:?}", component, state);
        states.insert(component.to_string(), state);
    }

    pub async fn get_component_state(&self, component: &str) -> Option<ComponentState> {
        self.component_states.lock().await.get(component).cloned()
    }

    /// Snapshot of every registered component
    pub async fn get_all_component_states(&self) -> HashMap<String, ComponentState> {
        self.component_states.lock().await.clone()
    }

    /// True when no registered component has failed
    pub async fn is_healthy(&self) -> bool {
        self.component_states
            .lock()
            .await
            .values()
            .all(|state| *state != ComponentState::Failed)
    }
}

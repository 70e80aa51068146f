use super::{AurasafeApp, ComponentState};
use crate::error::{AurasafeError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, warn};

const KEYBOARD_STOP_TIMEOUT: Duration = Duration::from_secs(2);
const API_STOP_TIMEOUT: Duration = Duration::from_secs(5);
const DISPATCH_DRAIN_TIMEOUT: Duration = Duration::from_secs(15);

impl AurasafeApp {
    /// Perform graceful shutdown of all components
    pub async fn shutdown(&mut self) -> Result<i32> {
        info!("Beginning graceful shutdown");

        // Cancel all background tasks
        self.cancellation_token.cancel();

        let mut exit_code = 0;

        if self.keyboard_enabled {
            let stop = async {
                match &self.keyboard_handler {
                    Some(handler) => handler.stop().await,
                    None => Ok(()),
                }
            };
            if let Err(e) = self.stop_component("keyboard", KEYBOARD_STOP_TIMEOUT, stop).await {
                error!("Error stopping keyboard: {}", e);
                exit_code = 1;
            }
        }

        #[cfg(feature = "api")]
        if self.api_server.is_some() {
            let handle = self.background_tasks.remove("api");
            let stop = async move {
                if let Some(handle) = handle {
                    handle.await.map_err(|e| {
                        AurasafeError::component("api".to_string(), format!("server task: {}", e))
                    })?;
                }
                Ok(())
            };
            if let Err(e) = self.stop_component("api", API_STOP_TIMEOUT, stop).await {
                error!("Error stopping api: {}", e);
                exit_code = 1;
            }
        }

        // A countdown in progress is abandoned, but a trigger already fired
        // still gets its uploads and notifications out
        self.fake_call.lock().end();
        if self.flow.cancel() {
            warn!("Emergency countdown abandoned by shutdown");
        }
        let flow = std::sync::Arc::clone(&self.flow);
        let drain = async move {
            flow.wait_for_dispatch().await;
            Ok(())
        };
        if let Err(e) = self
            .stop_component("emergency", DISPATCH_DRAIN_TIMEOUT, drain)
            .await
        {
            error!("Error stopping emergency: {}", e);
            exit_code = 1;
        }

        for (name, handle) in self.background_tasks.drain() {
            if !handle.is_finished() {
                handle.abort();
                info!("Aborted background task {}", name);
            }
        }

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }

    /// Run one component's stop future under a timeout, tracking its state
    async fn stop_component<F>(&self, component: &str, limit: Duration, stop: F) -> Result<()>
    where
        F: Future<Output = Result<()>>,
    {
        info!("Stopping {} component", component);
        self.set_component_state(component, ComponentState::Stopping)
            .await;

        match timeout(limit, stop).await {
            Ok(Ok(())) => {
                self.set_component_state(component, ComponentState::Stopped)
                    .await;
                info!("{} component stopped", component);
                Ok(())
            }
            Ok(Err(e)) => {
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                Err(e)
            }
            Err(_) => {
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                Err(AurasafeError::system(format!(
                    "{} component stop timeout",
                    component
                )))
            }
        }
    }
}

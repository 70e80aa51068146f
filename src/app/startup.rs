use super::orchestrator::handle_command;
use super::{AurasafeApp, ComponentState};
use crate::error::Result;
#[cfg(feature = "api")]
use crate::events::SafetyEvent;
use std::sync::Arc;
use tracing::{debug, error, info};

impl AurasafeApp {
    /// Register every component that will be started
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing Aurasafe components");

        let mut states = self.component_states.lock().await;
        states.insert("emergency".to_string(), ComponentState::Stopped);

        // Only register keyboard component if enabled
        if self.keyboard_enabled {
            states.insert("keyboard".to_string(), ComponentState::Stopped);
        }

        #[cfg(feature = "api")]
        if self.api_server.is_some() {
            states.insert("api".to_string(), ComponentState::Stopped);
        }

        drop(states);

        info!(
            "{} trusted contacts loaded",
            self.services.trust_network.lock().len()
        );
        info!("All components initialized successfully");
        Ok(())
    }

    /// Start all components
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting Aurasafe");

        // The flow's countdown driver is already running; it only needs a press
        self.set_component_state("emergency", ComponentState::Running)
            .await;

        #[cfg(feature = "api")]
        if let Some(server) = &self.api_server {
            // Marked running before the spawn so a bind failure is never overwritten
            self.set_component_state("api", ComponentState::Running)
                .await;

            let server = Arc::clone(server);
            let token = self.cancellation_token.child_token();
            let event_bus = self.event_bus.clone();
            let states = Arc::clone(&self.component_states);
            let handle = tokio::spawn(async move {
                if let Err(e) = server.start(token).await {
                    error!("API server error: {}", e);
                    states
                        .lock()
                        .await
                        .insert("api".to_string(), ComponentState::Failed);
                    event_bus.emit(SafetyEvent::SystemError {
                        component: "api".to_string(),
                        error: e.to_string(),
                    });
                }
            });
            self.background_tasks.insert("api", handle);
            info!(
                "API server started on {}:{}",
                self.config.api.ip, self.config.api.port
            );
        }

        // Start keyboard input handler (only if enabled)
        if self.keyboard_enabled {
            if let (Some(keyboard_handler), Some(mut commands)) =
                (&self.keyboard_handler, self.keyboard_commands.take())
            {
                self.set_component_state("keyboard", ComponentState::Starting)
                    .await;

                keyboard_handler.start().await.map_err(|e| {
                    error!("Failed to start keyboard handler: {}", e);
                    e
                })?;

                let flow = Arc::clone(&self.flow);
                let fake_call = Arc::clone(&self.fake_call);
                let token = self.cancellation_token.child_token();
                let handle = tokio::spawn(async move {
                    loop {
                        tokio::select! {
                            _ = token.cancelled() => break,
                            command = commands.recv() => match command {
                                Some(command) => handle_command(&flow, &fake_call, command),
                                None => break,
                            },
                        }
                    }
                    debug!("Keyboard command loop stopped");
                });
                self.background_tasks.insert("keyboard_commands", handle);

                self.set_component_state("keyboard", ComponentState::Running)
                    .await;
                info!("Keyboard input handler started - press SPACE for emergency");
            }
        }

        info!("Aurasafe started successfully");
        Ok(())
    }
}

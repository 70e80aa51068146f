use super::{AurasafeApp, ShutdownReason};
use crate::error::{AurasafeError, EventBusError, Result};
use crate::events::{EventFilter, SafetyEvent};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{oneshot, Mutex};
use tracing::{info, warn};

type SharedShutdownSender = Arc<Mutex<Option<oneshot::Sender<ShutdownReason>>>>;

impl AurasafeApp {
    /// Run until a signal or a shutdown request arrives, then shut down
    pub async fn run(&mut self) -> Result<i32> {
        info!("Aurasafe is running");

        let shutdown_sender = self
            .shutdown_sender
            .take()
            .ok_or_else(|| AurasafeError::system("Shutdown sender already taken"))?;

        let shutdown_receiver = self
            .shutdown_receiver
            .take()
            .ok_or_else(|| AurasafeError::system("Shutdown receiver already taken"))?;

        let shutdown_sender = Arc::new(Mutex::new(Some(shutdown_sender)));
        self.setup_signal_handlers(Arc::clone(&shutdown_sender));
        self.watch_shutdown_requests(Arc::clone(&shutdown_sender));

        // A component that failed before the watcher subscribed
        if !self.is_healthy().await {
            send_shutdown(
                &shutdown_sender,
                ShutdownReason::Error("component failed during startup".to_string()),
            )
            .await;
        }

        let shutdown_reason = shutdown_receiver
            .await
            .map_err(|_| AurasafeError::system("Shutdown channel closed unexpectedly"))?;

        info!("Shutdown initiated: {:?}", shutdown_reason);

        let mut exit_code = self.shutdown().await?;
        if matches!(shutdown_reason, ShutdownReason::Error(_)) {
            exit_code = exit_code.max(1);
        }

        info!("Aurasafe shutdown complete");
        Ok(exit_code)
    }

    fn setup_signal_handlers(&mut self, shutdown_sender: SharedShutdownSender) {
        // Handle SIGTERM (systemd stop) - Unix only
        #[cfg(unix)]
        {
            let sender = Arc::clone(&shutdown_sender);
            let handle = tokio::spawn(async move {
                let mut sigterm =
                    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                        Ok(sigterm) => sigterm,
                        Err(e) => {
                            warn!("Failed to register SIGTERM handler: {}", e);
                            return;
                        }
                    };

                if sigterm.recv().await.is_some() {
                    info!("Received SIGTERM signal");
                    send_shutdown(&sender, ShutdownReason::Signal("SIGTERM".to_string())).await;
                }
            });
            self.background_tasks.insert("sigterm", handle);
        }

        let handle = tokio::spawn(async move {
            if let Ok(()) = signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                send_shutdown(&shutdown_sender, ShutdownReason::Signal("SIGINT".to_string()))
                    .await;
            }
        });
        self.background_tasks.insert("sigint", handle);
    }

    /// Turn `ShutdownRequested` and fatal `SystemError` events into a shutdown
    fn watch_shutdown_requests(&mut self, shutdown_sender: SharedShutdownSender) {
        let mut requests = self.event_bus.subscribe_filtered(
            EventFilter::EventTypes(vec!["shutdown_requested", "system_error"]),
            "app_shutdown",
        );
        let token = self.cancellation_token.child_token();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    event = requests.recv() => match event {
                        Ok(SafetyEvent::ShutdownRequested { reason, .. }) => {
                            info!("Shutdown requested: {}", reason);
                            send_shutdown(&shutdown_sender, ShutdownReason::UserRequest(reason))
                                .await;
                            break;
                        }
                        Ok(SafetyEvent::SystemError { component, error }) => {
                            let reason = format!("{} failed: {}", component, error);
                            send_shutdown(&shutdown_sender, ShutdownReason::Error(reason)).await;
                            break;
                        }
                        Ok(_) => {}
                        Err(EventBusError::ChannelClosed) => break,
                        // Lagged; the request may still be ahead
                        Err(e) => warn!("Shutdown watch: {}", e),
                    },
                }
            }
        });
        self.background_tasks.insert("shutdown_watch", handle);
    }
}

async fn send_shutdown(sender: &SharedShutdownSender, reason: ShutdownReason) {
    if let Some(sender) = sender.lock().await.take() {
        let _ = sender.send(reason);
    }
}

use crate::{
    assistant::{ChatLog, KeywordAssistant, SafetyAssistant},
    config::ApiConfig,
    emergency::EmergencyFlow,
    error::{AurasafeError, Result},
};
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::handlers::{
    add_contact_handler, assistant_handler, cancel_handler, emergency_handler, events_handler,
    health_handler, list_contacts_handler, press_handler, remove_contact_handler, risk_handler,
    submit_incident_handler,
};

/// Shared state for the Axum server
#[derive(Clone)]
pub struct ApiState {
    pub(crate) flow: Arc<EmergencyFlow>,
    pub(crate) assistant: Arc<dyn SafetyAssistant>,
    pub(crate) chat: Arc<Mutex<ChatLog>>,
}

impl ApiState {
    pub fn new(flow: Arc<EmergencyFlow>) -> Self {
        Self {
            flow,
            assistant: Arc::new(KeywordAssistant::default()),
            chat: Arc::new(Mutex::new(ChatLog::new())),
        }
    }

    pub fn with_assistant(mut self, assistant: Arc<dyn SafetyAssistant>) -> Self {
        self.assistant = assistant;
        self
    }
}

/// All routes, with request tracing
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/emergency", get(emergency_handler))
        .route("/emergency/press", post(press_handler))
        .route("/emergency/cancel", post(cancel_handler))
        .route("/events", get(events_handler))
        .route("/assistant", post(assistant_handler))
        .route(
            "/contacts",
            get(list_contacts_handler).post(add_contact_handler),
        )
        .route("/contacts/:id", delete(remove_contact_handler))
        .route("/incidents", post(submit_incident_handler))
        .route("/risk", get(risk_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// JSON/SSE control surface over the emergency flow and the smaller features
pub struct ApiServer {
    pub(crate) config: ApiConfig,
    pub(crate) state: ApiState,
}

impl ApiServer {
    pub fn new(config: ApiConfig, state: ApiState) -> Self {
        Self { config, state }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.config.ip, self.config.port)
    }

    /// Serve until `shutdown` is cancelled
    pub async fn start(&self, shutdown: CancellationToken) -> Result<()> {
        let addr = self.address();
        info!("Starting API server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
            AurasafeError::component("api".to_string(), format!("failed to bind {}: {}", addr, e))
        })?;

        info!("API server listening on {}", addr);

        axum::serve(listener, router(self.state.clone()))
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| {
                AurasafeError::component("api".to_string(), format!("server error: {}", e))
            })?;

        info!("API server on {} stopped", addr);
        Ok(())
    }
}

/// API server builder for configuration
pub struct ApiServerBuilder {
    config: Option<ApiConfig>,
    flow: Option<Arc<EmergencyFlow>>,
    assistant: Option<Arc<dyn SafetyAssistant>>,
}

impl ApiServerBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            flow: None,
            assistant: None,
        }
    }

    pub fn config(mut self, config: ApiConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn flow(mut self, flow: Arc<EmergencyFlow>) -> Self {
        self.flow = Some(flow);
        self
    }

    /// Override the chat assistant (keyword matcher by default)
    pub fn assistant(mut self, assistant: Arc<dyn SafetyAssistant>) -> Self {
        self.assistant = Some(assistant);
        self
    }

    pub fn build(self) -> Result<ApiServer> {
        let config = self
            .config
            .ok_or_else(|| AurasafeError::component("api", "API configuration is required"))?;

        let flow = self
            .flow
            .ok_or_else(|| AurasafeError::component("api", "Emergency flow is required"))?;

        let mut state = ApiState::new(flow);
        if let Some(assistant) = self.assistant {
            state = state.with_assistant(assistant);
        }

        Ok(ApiServer::new(config, state))
    }
}

impl Default for ApiServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

use super::types::{ComponentState, ShutdownReason};
#[cfg(feature = "api")]
use crate::api::{ApiServer, ApiServerBuilder};
use crate::config::AurasafeConfig;
use crate::emergency::{EmergencyFlow, Services};
use crate::error::Result;
use crate::events::EventBus;
use crate::fake_call::{CallPreset, FakeCallSession, LoggingSpeech};
use crate::keyboard_input::{KeyCommand, KeyboardInputHandler};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Main application coordinator: owns the emergency flow and its front-ends
pub struct AurasafeApp {
    pub(super) config: AurasafeConfig,
    pub(super) event_bus: EventBus,
    pub(super) services: Arc<Services>,

    // Components
    pub(super) flow: Arc<EmergencyFlow>,
    pub(super) fake_call: Arc<parking_lot::Mutex<FakeCallSession>>,
    pub(super) keyboard_handler: Option<KeyboardInputHandler>,
    pub(super) keyboard_commands: Option<mpsc::UnboundedReceiver<KeyCommand>>,
    pub(super) keyboard_enabled: bool,
    #[cfg(feature = "api")]
    pub(super) api_server: Option<Arc<ApiServer>>,
    pub(super) background_tasks: HashMap<&'static str, JoinHandle<()>>,

    // Lifecycle management
    pub(super) component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    pub(super) shutdown_sender: Option<oneshot::Sender<ShutdownReason>>,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
}

impl AurasafeApp {
    /// Wire every component from configuration
    pub async fn new(config: AurasafeConfig) -> Result<Self> {
        let event_bus = EventBus::new(config.system.event_bus_capacity);
        let services = Services::from_config(&config, event_bus.clone())?;
        Self::with_services(config, services)
    }

    /// Build around already-wired services
    pub fn with_services(config: AurasafeConfig, services: Arc<Services>) -> Result<Self> {
        let event_bus = services.event_bus.clone();
        let flow = Arc::new(EmergencyFlow::new(
            Arc::clone(&services),
            &config.countdown,
            &config.capture,
        ));

        let fake_call = Arc::new(parking_lot::Mutex::new(
            FakeCallSession::new(Arc::new(LoggingSpeech::default()))
                .with_event_bus(event_bus.clone()),
        ));

        let (command_sender, command_receiver) = mpsc::unbounded_channel();
        let keyboard_handler = Some(KeyboardInputHandler::new(
            event_bus.clone(),
            command_sender,
        ));

        #[cfg(feature = "api")]
        let api_server = if config.api.enabled {
            Some(
                ApiServerBuilder::new()
                    .config(config.api.clone())
                    .flow(Arc::clone(&flow))
                    .build()
                    .map(Arc::new)?,
            )
        } else {
            None
        };

        let (shutdown_sender, shutdown_receiver) = oneshot::channel();

        Ok(Self {
            config,
            event_bus,
            services,
            flow,
            fake_call,
            keyboard_handler,
            keyboard_commands: Some(command_receiver),
            keyboard_enabled: false, // Disabled by default, enable via set_keyboard_enabled()
            #[cfg(feature = "api")]
            api_server,
            background_tasks: HashMap::new(),
            component_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown_sender: Some(shutdown_sender),
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Enable or disable the keyboard input handler
    pub fn set_keyboard_enabled(&mut self, enabled: bool) {
        self.keyboard_enabled = enabled;
    }

    pub fn config(&self) -> &AurasafeConfig {
        &self.config
    }

    pub fn event_bus(&self) -> EventBus {
        self.event_bus.clone()
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    pub fn flow(&self) -> &Arc<EmergencyFlow> {
        &self.flow
    }

    /// Act on one terminal command
    pub fn handle_command(&self, command: KeyCommand) {
        handle_command(&self.flow, &self.fake_call, command);
    }
}

pub(super) fn handle_command(
    flow: &EmergencyFlow,
    fake_call: &parking_lot::Mutex<FakeCallSession>,
    command: KeyCommand,
) {
    match command {
        KeyCommand::PressEmergency => match flow.press() {
            Some(event_id) => info!("Emergency {} armed from keyboard", event_id),
            None => info!("Emergency already in progress"),
        },
        KeyCommand::CancelEmergency => {
            if flow.cancel() {
                info!("Emergency cancelled from keyboard");
            }
        }
        KeyCommand::FakeCall => {
            let mut session = fake_call.lock();
            if session.start(CallPreset::Emergency.into()).is_none() {
                session.end();
                info!("Fake call ended from keyboard");
            }
        }
        // Quit goes through the event bus
        KeyCommand::Quit => {}
    }
}

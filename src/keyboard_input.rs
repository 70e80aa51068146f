use crate::error::Result;
use crate::events::{EventBus, SafetyEvent};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Action requested from the terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    PressEmergency,
    CancelEmergency,
    FakeCall,
    Quit,
}

impl KeyCommand {
    pub fn from_key(code: KeyCode) -> Option<Self> {
        match code {
            KeyCode::Char(' ') => Some(KeyCommand::PressEmergency),
            KeyCode::Char('c') | KeyCode::Char('C') => Some(KeyCommand::CancelEmergency),
            KeyCode::Char('f') | KeyCode::Char('F') => Some(KeyCommand::FakeCall),
            KeyCode::Char('q') | KeyCode::Esc => Some(KeyCommand::Quit),
            _ => None,
        }
    }
}

/// Raw-mode keyboard driver for the emergency button and fake call
pub struct KeyboardInputHandler {
    event_bus: EventBus,
    commands: mpsc::UnboundedSender<KeyCommand>,
    cancellation_token: CancellationToken,
}

impl KeyboardInputHandler {
    pub fn new(event_bus: EventBus, commands: mpsc::UnboundedSender<KeyCommand>) -> Self {
        Self {
            event_bus,
            commands,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Start listening for keyboard input
    pub async fn start(&self) -> Result<()> {
        info!(
            "Starting keyboard input handler - SPACE: emergency, c: cancel, f: fake call, q: quit"
        );

        let event_bus = self.event_bus.clone();
        let commands = self.commands.clone();
        let cancellation_token = self.cancellation_token.clone();

        task::spawn_blocking(move || {
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for keyboard input: {}", e);
                return;
            }

            debug!("Raw mode enabled - keyboard handler active");

            while !cancellation_token.is_cancelled() {
                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        let Ok(Event::Key(key_event)) = event::read() else {
                            continue;
                        };
                        // Only handle key press events (not release)
                        if key_event.kind != KeyEventKind::Press {
                            continue;
                        }

                        match KeyCommand::from_key(key_event.code) {
                            Some(KeyCommand::Quit) => {
                                info!("Quit key pressed - requesting shutdown");
                                event_bus.emit(SafetyEvent::ShutdownRequested {
                                    timestamp: SystemTime::now(),
                                    reason: "User requested via keyboard".to_string(),
                                });
                                break;
                            }
                            Some(command) => {
                                debug!("Key command: {:?}", command);
                                if commands.send(command).is_err() {
                                    warn!("Keyboard command {:?} dropped: receiver gone", command);
                                    break;
                                }
                            }
                            None => debug!("Key pressed: {:?}", key_event.code),
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!("Error polling for keyboard events: {}", e);
                    }
                }
            }

            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            } else {
                debug!("Raw mode disabled");
            }

            debug!("Keyboard input handler task exited");
        });

        Ok(())
    }

    /// Stop the keyboard input handler
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping keyboard input handler");
        self.cancellation_token.cancel();

        // Give the task a moment to clean up and disable raw mode
        tokio::time::sleep(Duration::from_millis(200)).await;

        // Ensure raw mode is disabled even if the task didn't clean up properly
        let _ = disable_raw_mode();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_mapping() {
        assert_eq!(
            KeyCommand::from_key(KeyCode::Char(' ')),
            Some(KeyCommand::PressEmergency)
        );
        assert_eq!(
            KeyCommand::from_key(KeyCode::Char('c')),
            Some(KeyCommand::CancelEmergency)
        );
        assert_eq!(
            KeyCommand::from_key(KeyCode::Char('F')),
            Some(KeyCommand::FakeCall)
        );
        assert_eq!(KeyCommand::from_key(KeyCode::Esc), Some(KeyCommand::Quit));
        assert_eq!(KeyCommand::from_key(KeyCode::Char('x')), None);
        assert_eq!(KeyCommand::from_key(KeyCode::Enter), None);
    }

    #[tokio::test]
    async fn test_keyboard_handler_stop() {
        let (commands, _receiver) = mpsc::unbounded_channel();
        let handler = KeyboardInputHandler::new(EventBus::new(16), commands);

        handler.stop().await.unwrap();
        assert!(handler.cancellation_token.is_cancelled());
    }
}

use crate::events::{EventBus, SafetyEvent};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Incoming-call vibration, in milliseconds on/off
pub const VIBRATION_PATTERN: [u64; 5] = [500, 300, 500, 300, 500];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallPreset {
    Emergency,
    Work,
    Friend,
    Medical,
}

impl CallPreset {
    pub const ALL: [CallPreset; 4] = [
        CallPreset::Emergency,
        CallPreset::Work,
        CallPreset::Friend,
        CallPreset::Medical,
    ];

    pub fn caller(&self) -> &'static str {
        match self {
            CallPreset::Emergency => "Mom",
            CallPreset::Work => "Boss",
            CallPreset::Friend => "Sarah",
            CallPreset::Medical => "Dr. Smith",
        }
    }

    pub fn script(&self) -> &'static str {
        match self {
            CallPreset::Emergency => "Hey, where are you? I'm nearby and coming to pick you up.",
            CallPreset::Work => "Hi, we need you back at the office immediately for an urgent meeting.",
            CallPreset::Friend => "Hey! I'm outside waiting for you. Are you ready to go?",
            CallPreset::Medical => {
                "Hello, this is Dr. Smith. We need you to come in for your appointment right away."
            }
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "emergency" => Some(CallPreset::Emergency),
            "work" => Some(CallPreset::Work),
            "friend" => Some(CallPreset::Friend),
            "medical" => Some(CallPreset::Medical),
            _ => None,
        }
    }
}

/// Who is "calling" and what they say
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallScript {
    pub caller: String,
    pub script: String,
}

impl From<CallPreset> for CallScript {
    fn from(preset: CallPreset) -> Self {
        Self {
            caller: preset.caller().to_string(),
            script: preset.script().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub text: String,
    pub rate: f32,
    pub pitch: f32,
}

/// Text-to-speech backend
pub trait SpeechOutput: Send + Sync {
    fn speak(&self, utterance: &Utterance);

    fn cancel(&self);
}

/// Writes utterances to the log and keeps them for inspection
#[derive(Default)]
pub struct LoggingSpeech {
    spoken: Mutex<Vec<Utterance>>,
    cancels: Mutex<usize>,
}

impl LoggingSpeech {
    pub fn spoken(&self) -> Vec<Utterance> {
        self.spoken.lock().clone()
    }

    pub fn cancel_count(&self) -> usize {
        *self.cancels.lock()
    }
}

impl SpeechOutput for LoggingSpeech {
    fn speak(&self, utterance: &Utterance) {
        info!("Speaking: \"{}\"", utterance.text);
        self.spoken.lock().push(utterance.clone());
    }

    fn cancel(&self) {
        *self.cancels.lock() += 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    Idle,
    Ringing,
    Answered,
    Ended,
}

struct ActiveCall {
    token: CancellationToken,
    _handle: JoinHandle<()>,
}

/// Simulated incoming call: rings, then speaks its script after `answer_delay`
pub struct FakeCallSession {
    speech: Arc<dyn SpeechOutput>,
    event_bus: Option<EventBus>,
    answer_delay: Duration,
    state: Arc<Mutex<CallState>>,
    active: Option<ActiveCall>,
}

impl FakeCallSession {
    pub fn new(speech: Arc<dyn SpeechOutput>) -> Self {
        Self {
            speech,
            event_bus: None,
            answer_delay: Duration::from_secs(3),
            state: Arc::new(Mutex::new(CallState::Idle)),
            active: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn with_answer_delay(mut self, delay: Duration) -> Self {
        self.answer_delay = delay;
        self
    }

    pub fn state(&self) -> CallState {
        *self.state.lock()
    }

    /// Start ringing. Returns the vibration pattern, or `None` if a call is already up.
    pub fn start(&mut self, call: CallScript) -> Option<&'static [u64]> {
        if matches!(self.state(), CallState::Ringing | CallState::Answered) {
            debug!("Fake call already in progress");
            return None;
        }

        *self.state.lock() = CallState::Ringing;
        info!("Fake call from {} ringing", call.caller);
        if let Some(bus) = &self.event_bus {
            bus.emit(SafetyEvent::FakeCallStarted {
                caller: call.caller.clone(),
            });
        }

        let token = CancellationToken::new();
        let task_token = token.clone();
        let speech = Arc::clone(&self.speech);
        let state = Arc::clone(&self.state);
        let delay = self.answer_delay;

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = task_token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    *state.lock() = CallState::Answered;
                    speech.speak(&Utterance {
                        text: call.script,
                        rate: 0.9,
                        pitch: 1.1,
                    });
                }
            }
        });

        self.active = Some(ActiveCall {
            token,
            _handle: handle,
        });
        Some(&VIBRATION_PATTERN[..])
    }

    /// Hang up and silence any speech
    pub fn end(&mut self) {
        if let Some(active) = self.active.take() {
            active.token.cancel();
            self.speech.cancel();
            *self.state.lock() = CallState::Ended;
            info!("Fake call ended");
        }
    }
}

impl Drop for FakeCallSession {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.token.cancel();
        }
    }
}

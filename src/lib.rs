pub mod app;
pub mod assistant;
pub mod capture;
pub mod config;
pub mod countdown;
pub mod dispatch;
pub mod emergency;
pub mod error;
pub mod events;
pub mod fake_call;
pub mod feed;
pub mod geolocation;
pub mod incident;
pub mod keyboard_input;
pub mod risk;
pub mod trust_network;

#[cfg(feature = "api")]
pub mod api;

pub use app::{AurasafeApp, ComponentState, ShutdownReason};
pub use capture::{CaptureMode, EvidenceBlob, MediaCaptureSession, MediaSource};
pub use config::AurasafeConfig;
pub use countdown::{CountdownController, CountdownObserver, CountdownState, EmergencyStatus};
pub use dispatch::{EvidenceStore, FanOut, Notifier};
pub use emergency::{EmergencyEvent, EmergencyFlow, Services, ServicesBuilder};
pub use error::{AurasafeError, ErrorKind, Result};
pub use events::{EventBus, EventFilter, EventReceiver, SafetyEvent};
pub use geolocation::{GeolocationResolver, ResolvedLocation, UNKNOWN_LOCATION};
pub use incident::{IncidentForm, SubmittedReport};
pub use trust_network::{Contact, TrustNetwork};

#[cfg(feature = "api")]
pub use api::{ApiServer, ApiServerBuilder};

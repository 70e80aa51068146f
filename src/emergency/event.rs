use crate::countdown::EmergencyStatus;
use crate::geolocation::ResolvedLocation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One press of the emergency button, from arming to its final outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyEvent {
    pub id: String,
    pub countdown_seconds: u32,
    pub status: EmergencyStatus,
    pub resolved_location: Option<ResolvedLocation>,
    pub armed_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub evidence_bytes: Option<usize>,
}

impl EmergencyEvent {
    pub fn armed(countdown_seconds: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            countdown_seconds,
            status: EmergencyStatus::Armed,
            resolved_location: None,
            armed_at: Utc::now(),
            finished_at: None,
            evidence_bytes: None,
        }
    }

    pub(super) fn finish(&mut self, status: EmergencyStatus) {
        self.status = status;
        self.finished_at = Some(Utc::now());
    }

    pub fn location_label(&self) -> &str {
        self.resolved_location
            .as_ref()
            .map(|l| l.label.as_str())
            .unwrap_or(crate::geolocation::UNKNOWN_LOCATION)
    }
}

use super::evidence::{EvidenceFile, EvidenceKind, EvidenceSummary, PreviewRegistry};
use crate::capture::EvidenceBlob;
use crate::error::{AurasafeError, Result};
use crate::geolocation::Coordinates;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentType {
    Harassment,
    Suspicious,
    Accident,
    Crime,
    #[default]
    Other,
}

impl IncidentType {
    pub fn label(&self) -> &'static str {
        match self {
            IncidentType::Harassment => "Harassment",
            IncidentType::Suspicious => "Suspicious Activity",
            IncidentType::Accident => "Accident",
            IncidentType::Crime => "Crime",
            IncidentType::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormState {
    Empty,
    Editing,
    Submitting,
    Submitted,
}

/// Editable fields of a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentFields {
    #[serde(default)]
    pub incident_type: IncidentType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub share_with_authorities: bool,
    #[serde(default = "default_share_with_community")]
    pub share_with_community: bool,
}

fn default_share_with_community() -> bool {
    true
}

impl Default for IncidentFields {
    fn default() -> Self {
        Self {
            incident_type: IncidentType::Other,
            description: String::new(),
            location: String::new(),
            share_with_authorities: false,
            share_with_community: default_share_with_community(),
        }
    }
}

/// Immutable snapshot handed over on submit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmittedReport {
    pub id: String,
    pub incident_type: IncidentType,
    pub description: String,
    pub location: String,
    pub share_with_authorities: bool,
    pub share_with_community: bool,
    pub evidence: Vec<EvidenceSummary>,
    pub submitted_at: DateTime<Utc>,
}

/// Incident report form: empty -> editing -> submitting -> submitted -> empty
#[derive(Debug)]
pub struct IncidentForm {
    fields: IncidentFields,
    evidence: Vec<EvidenceFile>,
    previews: PreviewRegistry,
    state: FormState,
    transitions: Vec<FormState>,
}

impl IncidentForm {
    pub fn new() -> Self {
        Self {
            fields: IncidentFields::default(),
            evidence: Vec::new(),
            previews: PreviewRegistry::default(),
            state: FormState::Empty,
            transitions: vec![FormState::Empty],
        }
    }

    pub fn state(&self) -> FormState {
        self.state
    }

    /// States entered during the current or most recent editing cycle
    pub fn transitions(&self) -> &[FormState] {
        &self.transitions
    }

    pub fn fields(&self) -> &IncidentFields {
        &self.fields
    }

    pub fn evidence(&self) -> &[EvidenceFile] {
        &self.evidence
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    pub fn set_type(&mut self, incident_type: IncidentType) {
        self.edit(|f| f.incident_type = incident_type);
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        let description = description.into();
        self.edit(|f| f.description = description);
    }

    pub fn set_location(&mut self, location: impl Into<String>) {
        let location = location.into();
        self.edit(|f| f.location = location);
    }

    /// Fill the location from a device fix, six decimals
    pub fn use_coordinates(&mut self, coordinates: Coordinates) {
        self.set_location(coordinates.fixed6());
    }

    pub fn set_share_with_authorities(&mut self, share: bool) {
        self.edit(|f| f.share_with_authorities = share);
    }

    pub fn set_share_with_community(&mut self, share: bool) {
        self.edit(|f| f.share_with_community = share);
    }

    /// Replace all fields at once
    pub fn fill(&mut self, fields: IncidentFields) {
        self.edit(|f| *f = fields);
    }

    pub fn attach_file(
        &mut self,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Bytes,
    ) -> &EvidenceFile {
        let content_type = content_type.into();
        let file = EvidenceFile {
            id: Uuid::new_v4().to_string(),
            kind: EvidenceKind::from_mime(&content_type),
            file_name: file_name.into(),
            content_type,
            bytes,
            preview: self.previews.issue(),
        };
        self.push_evidence(file)
    }

    /// Attach a finished audio recording
    pub fn attach_recording(&mut self, blob: EvidenceBlob) -> &EvidenceFile {
        let file = EvidenceFile {
            id: blob.id.clone(),
            kind: EvidenceKind::Audio,
            file_name: blob.file_name(),
            content_type: blob.content_type.clone(),
            bytes: blob.bytes,
            preview: self.previews.issue(),
        };
        self.push_evidence(file)
    }

    /// Remove one attachment and revoke its preview. Unknown ids are ignored.
    pub fn remove_evidence(&mut self, id: &str) -> bool {
        let Some(index) = self.evidence.iter().position(|f| f.id == id) else {
            debug!("No evidence with id {}", id);
            return false;
        };

        let file = self.evidence.remove(index);
        self.previews.revoke(&file.preview);
        true
    }

    /// Validate and hand over the report, then reset the form
    pub fn submit(&mut self) -> Result<SubmittedReport> {
        if self.fields.description.trim().is_empty() {
            return Err(AurasafeError::validation("description", "is required"));
        }

        self.enter(FormState::Submitting);
        let report = SubmittedReport {
            id: Uuid::new_v4().to_string(),
            incident_type: self.fields.incident_type,
            description: self.fields.description.clone(),
            location: self.fields.location.clone(),
            share_with_authorities: self.fields.share_with_authorities,
            share_with_community: self.fields.share_with_community,
            evidence: self.evidence.iter().map(EvidenceSummary::from).collect(),
            submitted_at: Utc::now(),
        };
        self.enter(FormState::Submitted);

        info!(
            "Incident report {} submitted ({}, {} evidence files)",
            report.id,
            report.incident_type.label(),
            report.evidence.len()
        );

        self.reset();
        Ok(report)
    }

    /// Discard everything and revoke all previews
    pub fn reset(&mut self) {
        self.previews.revoke_all();
        self.evidence.clear();
        self.fields = IncidentFields::default();
        self.enter(FormState::Empty);
    }

    fn push_evidence(&mut self, file: EvidenceFile) -> &EvidenceFile {
        self.touch();
        debug!("Attached {:?} evidence {}", file.kind, file.file_name);
        self.evidence.push(file);
        &self.evidence[self.evidence.len() - 1]
    }

    fn edit(&mut self, apply: impl FnOnce(&mut IncidentFields)) {
        apply(&mut self.fields);
        self.touch();
    }

    fn touch(&mut self) {
        if self.state == FormState::Empty {
            self.enter(FormState::Editing);
        }
    }

    fn enter(&mut self, state: FormState) {
        if self.state != state {
            // A new cycle starts when an empty form is edited
            if self.state == FormState::Empty && state == FormState::Editing {
                self.transitions.clear();
                self.transitions.push(FormState::Empty);
            }
            self.state = state;
            self.transitions.push(state);
        }
    }
}

impl Default for IncidentForm {
    fn default() -> Self {
        Self::new()
    }
}

mod evidence;
mod form;
#[cfg(test)]
mod tests;

pub use evidence::{EvidenceFile, EvidenceKind, EvidenceSummary, PreviewRegistry, PreviewUrl};
pub use form::{FormState, IncidentFields, IncidentForm, IncidentType, SubmittedReport};

use super::*;
use crate::capture::EvidenceBlob;
use crate::error::ErrorKind;
use crate::geolocation::Coordinates;
use bytes::Bytes;
use chrono::Utc;
use proptest::prelude::*;
use std::time::Duration;

fn photo(form: &mut IncidentForm, name: &str) -> (String, PreviewUrl) {
    let file = form.attach_file(name, "image/jpeg", Bytes::from_static(b"jpeg"));
    (file.id.clone(), file.preview.clone())
}

#[test]
fn test_evidence_kind_from_mime() {
    assert_eq!(EvidenceKind::from_mime("image/png"), EvidenceKind::Photo);
    assert_eq!(EvidenceKind::from_mime("video/mp4"), EvidenceKind::Video);
    assert_eq!(EvidenceKind::from_mime("audio/wav"), EvidenceKind::Audio);
    assert_eq!(EvidenceKind::from_mime("application/pdf"), EvidenceKind::Audio);
}

#[test]
fn test_suspicious_report_submits_and_resets() {
    let mut form = IncidentForm::new();
    assert_eq!(form.state(), FormState::Empty);

    form.set_type(IncidentType::Suspicious);
    assert_eq!(form.state(), FormState::Editing);
    form.set_description("Suspicious man following me");

    let report = form.submit().unwrap();
    assert_eq!(report.incident_type, IncidentType::Suspicious);
    assert_eq!(report.description, "Suspicious man following me");
    assert!(report.evidence.is_empty());

    assert_eq!(
        form.transitions(),
        &[
            FormState::Empty,
            FormState::Editing,
            FormState::Submitting,
            FormState::Submitted,
            FormState::Empty
        ]
    );
    assert_eq!(form.fields(), &IncidentFields::default());
    assert_eq!(form.fields().incident_type, IncidentType::Other);
    assert!(!form.fields().share_with_authorities);
    assert!(form.fields().share_with_community);
}

#[test]
fn test_transitions_keep_only_the_latest_cycle() {
    let mut form = IncidentForm::new();

    for round in 0..3 {
        form.set_description(format!("Report {}", round));
        form.submit().unwrap();
    }

    assert_eq!(
        form.transitions(),
        &[
            FormState::Empty,
            FormState::Editing,
            FormState::Submitting,
            FormState::Submitted,
            FormState::Empty
        ]
    );

    form.set_location("Main St");
    assert_eq!(form.transitions(), &[FormState::Empty, FormState::Editing]);
}

#[test]
fn test_blank_description_is_rejected() {
    let mut form = IncidentForm::new();
    form.set_location("Main St");
    form.set_description("   \n");

    let err = form.submit().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(form.state(), FormState::Editing);
    assert!(!form.transitions().contains(&FormState::Submitting));
    assert_eq!(form.fields().location, "Main St");
}

#[test]
fn test_remove_evidence_revokes_exactly_one_preview() {
    let mut form = IncidentForm::new();
    let (first, first_preview) = photo(&mut form, "a.jpg");
    let (_second, second_preview) = photo(&mut form, "b.jpg");
    assert_eq!(form.previews().live_count(), 2);

    assert!(form.remove_evidence(&first));
    assert_eq!(form.evidence().len(), 1);
    assert!(!form.previews().is_live(&first_preview));
    assert!(form.previews().is_live(&second_preview));

    assert!(!form.remove_evidence(&first));
    assert!(!form.remove_evidence("missing"));
    assert_eq!(form.evidence().len(), 1);
    assert_eq!(form.previews().live_count(), 1);
}

#[test]
fn test_submit_carries_evidence_and_revokes_previews() {
    let mut form = IncidentForm::new();
    photo(&mut form, "a.jpg");
    form.attach_recording(EvidenceBlob {
        id: "rec-1".to_string(),
        bytes: Bytes::from(vec![0u8; 32]),
        content_type: "audio/webm".to_string(),
        captured_at: Utc::now(),
        duration: Duration::from_secs(12),
        chunk_count: 3,
    });
    form.use_coordinates(Coordinates::new(51.5074, -0.1278));
    form.set_share_with_authorities(true);
    form.set_description("Car crash at the junction");

    let report = form.submit().unwrap();
    assert_eq!(report.location, "51.507400, -0.127800");
    assert!(report.share_with_authorities);
    assert_eq!(report.evidence.len(), 2);
    assert_eq!(report.evidence[1].kind, EvidenceKind::Audio);
    assert_eq!(report.evidence[1].bytes, 32);
    assert!(report.evidence[1].file_name.starts_with("recording-"));

    assert!(form.evidence().is_empty());
    assert_eq!(form.previews().live_count(), 0);
}

proptest! {
    #[test]
    fn prop_only_non_blank_descriptions_reach_submitting(description in "[ \\t\\na-z]{0,20}") {
        let mut form = IncidentForm::new();
        form.set_description(description.clone());
        let result = form.submit();

        let reached = form.transitions().contains(&FormState::Submitting);
        prop_assert_eq!(reached, !description.trim().is_empty());
        prop_assert_eq!(result.is_ok(), reached);
    }
}

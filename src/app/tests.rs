use super::*;
use crate::config::AurasafeConfig;
use crate::countdown::EmergencyStatus;
use crate::dispatch::InMemoryEvidenceStore;
use crate::emergency::Services;
use crate::events::{EventBus, SafetyEvent};
use crate::fake_call::CallState;
use crate::keyboard_input::KeyCommand;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

fn create_test_app() -> (AurasafeApp, Arc<InMemoryEvidenceStore>) {
    let mut config = AurasafeConfig::default();
    config.api.enabled = false;

    let store = Arc::new(InMemoryEvidenceStore::new());
    let services = Services::builder(EventBus::new(64))
        .with_evidence_store(store.clone())
        .build();

    let app = AurasafeApp::with_services(config, Arc::new(services)).unwrap();
    (app, store)
}

#[tokio::test]
async fn test_initialize_registers_enabled_components() {
    let (mut app, _) = create_test_app();

    app.initialize().await.unwrap();
    let states = app.get_all_component_states().await;
    assert_eq!(states.len(), 1);
    assert_eq!(states.get("emergency"), Some(&ComponentState::Stopped));

    let (mut app, _) = create_test_app();
    app.set_keyboard_enabled(true);
    app.initialize().await.unwrap();
    assert_eq!(
        app.get_component_state("keyboard").await,
        Some(ComponentState::Stopped)
    );
}

#[tokio::test]
async fn test_start_marks_emergency_running() {
    let (mut app, _) = create_test_app();
    app.initialize().await.unwrap();
    app.start().await.unwrap();

    assert_eq!(
        app.get_component_state("emergency").await,
        Some(ComponentState::Running)
    );
    assert!(app.is_healthy().await);

    app.set_component_state("emergency", ComponentState::Failed)
        .await;
    assert!(!app.is_healthy().await);
}

#[tokio::test]
async fn test_keyboard_commands_drive_flow_and_fake_call() {
    let (app, _) = create_test_app();

    app.handle_command(KeyCommand::PressEmergency);
    assert_eq!(app.flow().countdown().status, EmergencyStatus::Armed);

    app.handle_command(KeyCommand::CancelEmergency);
    assert_eq!(
        app.flow().last_event().map(|e| e.status),
        Some(EmergencyStatus::Cancelled)
    );

    app.handle_command(KeyCommand::FakeCall);
    assert_eq!(app.fake_call.lock().state(), CallState::Ringing);

    app.handle_command(KeyCommand::FakeCall);
    assert_eq!(app.fake_call.lock().state(), CallState::Ended);

    app.handle_command(KeyCommand::Quit);
    assert!(app.flow().current().is_none());
}

#[tokio::test]
async fn test_shutdown_request_event_stops_run_loop() {
    let (mut app, _) = create_test_app();
    app.initialize().await.unwrap();
    app.start().await.unwrap();

    let bus = app.event_bus();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        bus.emit(SafetyEvent::ShutdownRequested {
            timestamp: SystemTime::now(),
            reason: "test".to_string(),
        });
    });

    let exit_code = tokio::time::timeout(Duration::from_secs(10), app.run())
        .await
        .expect("run loop should stop")
        .unwrap();

    assert_eq!(exit_code, 0);
    assert_eq!(
        app.get_component_state("emergency").await,
        Some(ComponentState::Stopped)
    );
}

#[tokio::test]
async fn test_component_failure_shuts_down_with_error_code() {
    let (mut app, _) = create_test_app();
    app.initialize().await.unwrap();
    app.start().await.unwrap();

    let bus = app.event_bus();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        bus.emit(SafetyEvent::SystemError {
            component: "api".to_string(),
            error: "address in use".to_string(),
        });
    });

    let exit_code = tokio::time::timeout(Duration::from_secs(10), app.run())
        .await
        .expect("run loop should stop")
        .unwrap();

    assert_eq!(exit_code, 1);
}

#[tokio::test]
async fn test_failed_component_before_run_shuts_down_immediately() {
    let (mut app, _) = create_test_app();
    app.initialize().await.unwrap();
    app.start().await.unwrap();
    app.set_component_state("emergency", ComponentState::Failed)
        .await;

    let exit_code = tokio::time::timeout(Duration::from_secs(10), app.run())
        .await
        .expect("run loop should stop")
        .unwrap();

    assert_eq!(exit_code, 1);
}

#[tokio::test]
async fn test_shutdown_abandons_countdown_without_dispatch() {
    let (mut app, store) = create_test_app();
    app.initialize().await.unwrap();
    app.start().await.unwrap();

    app.flow().press().expect("armed");
    let exit_code = app.shutdown().await.unwrap();

    assert_eq!(exit_code, 0);
    assert_eq!(
        app.flow().last_event().map(|e| e.status),
        Some(EmergencyStatus::Cancelled)
    );
    assert_eq!(store.call_count(), 0);
}

#[tokio::test]
async fn test_run_twice_is_an_error() {
    let (mut app, _) = create_test_app();
    app.shutdown_sender.take();

    assert!(app.run().await.is_err());
}

#[test]
fn test_shutdown_reason_debug_formatting() {
    let reasons = [
        ShutdownReason::Signal("SIGTERM".to_string()),
        ShutdownReason::Error("bus closed".to_string()),
        ShutdownReason::UserRequest("keyboard".to_string()),
    ];

    let formatted: Vec<String> = reasons.iter().map(|r| format!("{:?}", r)).collect();
    assert_eq!(formatted[0], "Signal(\"SIGTERM\")");
    assert!(formatted[1].contains("bus closed"));
    assert!(formatted[2].starts_with("UserRequest"));
}

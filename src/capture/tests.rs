use super::*;
use crate::error::CaptureError;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

fn source(interval_ms: u64) -> Arc<SimulatedMediaSource> {
    Arc::new(SimulatedMediaSource::new(Duration::from_millis(interval_ms)).with_chunk_size(16))
}

#[test]
fn test_format_recording_time() {
    assert_eq!(format_recording_time(0), "0:00");
    assert_eq!(format_recording_time(9), "0:09");
    assert_eq!(format_recording_time(65), "1:05");
    assert_eq!(format_recording_time(600), "10:00");
}

#[test]
fn test_content_type_follows_mode() {
    assert_eq!(CaptureMode::AudioVideo.content_type(), "video/webm");
    assert_eq!(CaptureMode::AudioOnly.content_type(), "audio/webm");
}

#[tokio::test(start_paused = true)]
async fn test_stop_finalizes_chunks_in_order() {
    let source = source(100);
    let mut session = MediaCaptureSession::new(source.clone(), CaptureMode::AudioVideo, 1 << 20);

    session.start().await.unwrap();
    assert!(session.is_active());
    assert_eq!(source.in_use(), 1);

    sleep(Duration::from_millis(350)).await;
    let blob = session.stop().await.unwrap().expect("blob");

    assert_eq!(blob.chunk_count, 3);
    assert_eq!(blob.len(), 48);
    assert_eq!(&blob.bytes[..16], &[1u8; 16][..]);
    assert_eq!(&blob.bytes[32..], &[3u8; 16][..]);
    assert_eq!(blob.content_type, "video/webm");
    assert_eq!(blob.id, session.id());
    assert!(blob.file_name().starts_with("recording-"));
    assert!(blob.file_name().ends_with(".webm"));

    assert!(!session.is_active());
    assert_eq!(source.in_use(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_permission_denied_leaves_session_unstarted() {
    let source = Arc::new(
        SimulatedMediaSource::new(Duration::from_millis(100)).with_denied_permission(true),
    );
    let mut session = MediaCaptureSession::new(source.clone(), CaptureMode::AudioOnly, 1024);

    let result = session.start().await;
    assert!(matches!(result, Err(CaptureError::PermissionDenied { .. })));
    assert!(!session.is_active());
    assert_eq!(source.opened_count(), 0);

    assert!(session.stop().await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_stop_without_start_is_noop() {
    let mut session = MediaCaptureSession::new(source(100), CaptureMode::AudioVideo, 1024);
    assert!(session.stop().await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_double_start_is_rejected() {
    let source = source(100);
    let mut session = MediaCaptureSession::new(source.clone(), CaptureMode::AudioVideo, 1024);
    session.start().await.unwrap();

    assert!(matches!(session.start().await, Err(CaptureError::AlreadyActive)));
    assert_eq!(source.opened_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_abort_releases_device_and_discards_buffer() {
    let source = source(100);
    let mut session = MediaCaptureSession::new(source.clone(), CaptureMode::AudioVideo, 1024);
    session.start().await.unwrap();
    sleep(Duration::from_millis(250)).await;

    session.abort();
    sleep(Duration::from_millis(10)).await;

    assert!(!session.is_active());
    assert_eq!(source.in_use(), 0);
    assert!(session.stop().await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_drop_releases_device() {
    let source = source(100);
    {
        let mut session = MediaCaptureSession::new(source.clone(), CaptureMode::AudioVideo, 1024);
        session.start().await.unwrap();
        sleep(Duration::from_millis(150)).await;
    }
    sleep(Duration::from_millis(10)).await;

    assert_eq!(source.opened_count(), 1);
    assert_eq!(source.released_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_buffer_limit_drops_overflow() {
    let source = source(10);
    let mut session = MediaCaptureSession::new(source.clone(), CaptureMode::AudioOnly, 40);
    session.start().await.unwrap();
    sleep(Duration::from_millis(105)).await;

    let blob = session.stop().await.unwrap().expect("blob");
    assert_eq!(blob.chunk_count, 2);
    assert_eq!(blob.len(), 32);
    assert_eq!(blob.content_type, "audio/webm");
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_stream_still_finalizes() {
    let source = Arc::new(
        SimulatedMediaSource::new(Duration::from_millis(50))
            .with_chunk_size(8)
            .with_chunk_limit(2),
    );
    let mut session = MediaCaptureSession::new(source.clone(), CaptureMode::AudioVideo, 1024);
    session.start().await.unwrap();
    sleep(Duration::from_secs(1)).await;

    assert_eq!(source.in_use(), 0);
    let blob = session.stop().await.unwrap().expect("blob");
    assert_eq!(blob.chunk_count, 2);
    assert_eq!(blob.len(), 16);
}

#[tokio::test(start_paused = true)]
async fn test_elapsed_display_while_recording() {
    let mut session = MediaCaptureSession::new(source(100), CaptureMode::AudioVideo, 1 << 20);
    assert!(session.elapsed_display().is_none());

    session.start().await.unwrap();
    sleep(Duration::from_secs(65)).await;
    assert_eq!(session.elapsed_display().as_deref(), Some("1:05"));
    session.abort();
}

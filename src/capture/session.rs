use super::blob::{CaptureMode, EvidenceBlob, RecordingClock};
use super::source::{DeviceGuard, MediaSource};
use crate::config::CaptureConfig;
use crate::error::CaptureError;
use bytes::BytesMut;
use chrono::Utc;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

struct CaptureBuffer {
    data: BytesMut,
    chunk_count: usize,
    dropped_chunks: usize,
}

struct ActiveCapture {
    token: CancellationToken,
    handle: JoinHandle<CaptureBuffer>,
    clock: RecordingClock,
    captured_at: chrono::DateTime<Utc>,
}

/// One recording from `start` to `stop`.
///
/// The device guard lives inside the pump task, so the device is released
/// whenever the task ends: on `stop`, `abort`, stream exhaustion, or when the
/// session is dropped.
pub struct MediaCaptureSession {
    id: String,
    source: Arc<dyn MediaSource>,
    mode: CaptureMode,
    max_buffer_bytes: usize,
    active: Option<ActiveCapture>,
}

impl MediaCaptureSession {
    pub fn new(source: Arc<dyn MediaSource>, mode: CaptureMode, max_buffer_bytes: usize) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source,
            mode,
            max_buffer_bytes,
            active: None,
        }
    }

    pub fn from_config(source: Arc<dyn MediaSource>, config: &CaptureConfig) -> Self {
        Self::new(source, config.mode, config.max_buffer_bytes)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Elapsed recording time as `m:ss`, if recording
    pub fn elapsed_display(&self) -> Option<String> {
        self.active.as_ref().map(|active| active.clock.display())
    }

    /// Acquire the device and begin buffering. On permission denial nothing is
    /// started and the session stays inactive.
    pub async fn start(&mut self) -> Result<(), CaptureError> {
        if self.active.is_some() {
            return Err(CaptureError::AlreadyActive);
        }

        let stream = self.source.open(self.mode).await?;
        let guard = DeviceGuard::new(stream);
        let token = CancellationToken::new();

        let handle = tokio::spawn(pump(guard, token.clone(), self.max_buffer_bytes));

        self.active = Some(ActiveCapture {
            token,
            handle,
            clock: RecordingClock::start(),
            captured_at: Utc::now(),
        });

        info!(
            "Capture session {} started ({} via {})",
            self.id,
            self.mode.as_str(),
            self.source.name()
        );
        Ok(())
    }

    /// Stop recording and finalize the buffered chunks. Returns `None` when the
    /// session was never started.
    pub async fn stop(&mut self) -> Result<Option<EvidenceBlob>, CaptureError> {
        let Some(active) = self.active.take() else {
            debug!("Capture session {} stop ignored: not recording", self.id);
            return Ok(None);
        };

        active.token.cancel();
        let duration = active.clock.elapsed();

        let buffer = active.handle.await.map_err(|e| {
            error!("Capture pump for session {} failed: {}", self.id, e);
            CaptureError::DeviceUnavailable {
                details: e.to_string(),
            }
        })?;

        if buffer.dropped_chunks > 0 {
            warn!(
                "Capture session {} dropped {} chunks over the {} byte limit",
                self.id, buffer.dropped_chunks, self.max_buffer_bytes
            );
        }

        let blob = EvidenceBlob {
            id: self.id.clone(),
            bytes: buffer.data.freeze(),
            content_type: self.mode.content_type().to_string(),
            captured_at: active.captured_at,
            duration,
            chunk_count: buffer.chunk_count,
        };

        info!(
            "Capture session {} finalized: {} bytes in {} chunks",
            self.id,
            blob.len(),
            blob.chunk_count
        );
        Ok(Some(blob))
    }

    /// Stop recording and discard everything buffered
    pub fn abort(&mut self) {
        if let Some(active) = self.active.take() {
            active.token.cancel();
            info!("Capture session {} aborted", self.id);
        }
    }
}

impl Drop for MediaCaptureSession {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.token.cancel();
        }
    }
}

async fn pump(mut guard: DeviceGuard, token: CancellationToken, max_bytes: usize) -> CaptureBuffer {
    let mut buffer = CaptureBuffer {
        data: BytesMut::new(),
        chunk_count: 0,
        dropped_chunks: 0,
    };

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            chunk = guard.next_chunk() => {
                let Some(chunk) = chunk else {
                    debug!("Media stream ended");
                    break;
                };
                if chunk.is_empty() {
                    continue;
                }
                if buffer.data.len() + chunk.len() > max_bytes {
                    buffer.dropped_chunks += 1;
                    continue;
                }
                buffer.data.extend_from_slice(&chunk);
                buffer.chunk_count += 1;
            }
        }
    }

    // guard drops here and releases the device
    buffer
}

use super::blob::CaptureMode;
use crate::config::CaptureConfig;
use crate::error::CaptureError;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Grants access to a camera/microphone device
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Request device access. Fails with `PermissionDenied` when refused.
    async fn open(&self, mode: CaptureMode) -> Result<Box<dyn MediaStream>, CaptureError>;

    fn name(&self) -> &str;
}

/// An acquired device producing encoded media chunks
#[async_trait]
pub trait MediaStream: Send {
    /// Next encoded chunk, or `None` once the device stops producing
    async fn next_chunk(&mut self) -> Option<Bytes>;

    /// Release the underlying device. Must be idempotent.
    fn release(&mut self);
}

/// Owns an acquired stream and releases it on every exit path
pub struct DeviceGuard {
    stream: Box<dyn MediaStream>,
}

impl DeviceGuard {
    pub fn new(stream: Box<dyn MediaStream>) -> Self {
        Self { stream }
    }

    pub async fn next_chunk(&mut self) -> Option<Bytes> {
        self.stream.next_chunk().await
    }
}

impl Drop for DeviceGuard {
    fn drop(&mut self) {
        self.stream.release();
    }
}

/// In-process media source that emits synthetic chunks on a fixed cadence
pub struct SimulatedMediaSource {
    chunk_interval: Duration,
    chunk_size: usize,
    chunk_limit: Option<usize>,
    deny_permission: bool,
    opened: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl SimulatedMediaSource {
    pub fn new(chunk_interval: Duration) -> Self {
        Self {
            chunk_interval,
            chunk_size: 1024,
            chunk_limit: None,
            deny_permission: false,
            opened: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new(Duration::from_millis(config.chunk_interval_millis))
            .with_denied_permission(config.simulate_permission_denied)
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// End the stream after this many chunks
    pub fn with_chunk_limit(mut self, limit: usize) -> Self {
        self.chunk_limit = Some(limit);
        self
    }

    pub fn with_denied_permission(mut self, deny: bool) -> Self {
        self.deny_permission = deny;
        self
    }

    pub fn opened_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn released_count(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Devices currently held by a stream
    pub fn in_use(&self) -> usize {
        self.opened_count() - self.released_count()
    }
}

#[async_trait]
impl MediaSource for SimulatedMediaSource {
    async fn open(&self, mode: CaptureMode) -> Result<Box<dyn MediaStream>, CaptureError> {
        if self.deny_permission {
            warn!("Simulated {} access denied", mode.as_str());
            return Err(CaptureError::PermissionDenied {
                mode: mode.as_str().to_string(),
            });
        }

        self.opened.fetch_add(1, Ordering::SeqCst);
        info!("Simulated {} device opened", mode.as_str());

        Ok(Box::new(SimulatedStream {
            interval: self.chunk_interval,
            chunk_size: self.chunk_size,
            remaining: self.chunk_limit,
            sequence: 0,
            released: Arc::clone(&self.released),
            is_released: AtomicBool::new(false),
        }))
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

struct SimulatedStream {
    interval: Duration,
    chunk_size: usize,
    remaining: Option<usize>,
    sequence: u8,
    released: Arc<AtomicUsize>,
    is_released: AtomicBool,
}

#[async_trait]
impl MediaStream for SimulatedStream {
    async fn next_chunk(&mut self) -> Option<Bytes> {
        if self.is_released.load(Ordering::SeqCst) {
            return None;
        }
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return None;
            }
            *remaining -= 1;
        }

        tokio::time::sleep(self.interval).await;
        self.sequence = self.sequence.wrapping_add(1);
        Some(Bytes::from(vec![self.sequence; self.chunk_size]))
    }

    fn release(&mut self) {
        if !self.is_released.swap(true, Ordering::SeqCst) {
            self.released.fetch_add(1, Ordering::SeqCst);
            debug!("Simulated device released");
        }
    }
}

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Which devices a capture session asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    AudioVideo,
    AudioOnly,
}

impl CaptureMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureMode::AudioVideo => "audio_video",
            CaptureMode::AudioOnly => "audio_only",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            CaptureMode::AudioVideo => "video/webm",
            CaptureMode::AudioOnly => "audio/webm",
        }
    }
}

/// Finalized, immutable recording
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceBlob {
    pub id: String,
    pub bytes: Bytes,
    pub content_type: String,
    pub captured_at: DateTime<Utc>,
    pub duration: Duration,
    pub chunk_count: usize,
}

impl EvidenceBlob {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// File name used when the blob is uploaded or attached to a report
    pub fn file_name(&self) -> String {
        let extension = self.content_type.rsplit('/').next().unwrap_or("bin");
        format!(
            "recording-{}.{}",
            self.captured_at.timestamp_millis(),
            extension
        )
    }
}

/// Wall-clock timer for an in-progress recording
#[derive(Debug, Clone, Copy)]
pub struct RecordingClock {
    started: Instant,
}

impl RecordingClock {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn display(&self) -> String {
        format_recording_time(self.elapsed().as_secs())
    }
}

/// `m:ss`
pub fn format_recording_time(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

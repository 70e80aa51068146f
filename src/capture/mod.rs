mod blob;
mod session;
mod source;
#[cfg(test)]
mod tests;

pub use blob::{format_recording_time, CaptureMode, EvidenceBlob, RecordingClock};
pub use session::MediaCaptureSession;
pub use source::{DeviceGuard, MediaSource, MediaStream, SimulatedMediaSource};

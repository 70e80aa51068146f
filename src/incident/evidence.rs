use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    Photo,
    Audio,
    Video,
}

impl EvidenceKind {
    /// `image/*` is a photo, `video/*` a video, anything else audio
    pub fn from_mime(content_type: &str) -> Self {
        let content_type = content_type.trim().to_ascii_lowercase();
        if content_type.starts_with("image/") {
            EvidenceKind::Photo
        } else if content_type.starts_with("video/") {
            EvidenceKind::Video
        } else {
            EvidenceKind::Audio
        }
    }
}

/// Handle under which a piece of evidence can be previewed
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PreviewUrl(String);

impl PreviewUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PreviewUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Issues `blob:` preview handles and tracks which are still live
#[derive(Debug, Default)]
pub struct PreviewRegistry {
    live: HashSet<PreviewUrl>,
}

impl PreviewRegistry {
    pub fn issue(&mut self) -> PreviewUrl {
        let url = PreviewUrl(format!("blob:aurasafe/{}", Uuid::new_v4()));
        self.live.insert(url.clone());
        url
    }

    pub fn revoke(&mut self, url: &PreviewUrl) -> bool {
        let revoked = self.live.remove(url);
        if revoked {
            debug!("Revoked preview {}", url);
        }
        revoked
    }

    pub fn revoke_all(&mut self) -> usize {
        let count = self.live.len();
        self.live.clear();
        count
    }

    pub fn is_live(&self, url: &PreviewUrl) -> bool {
        self.live.contains(url)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}

/// A file attached to an incident report
#[derive(Debug, Clone)]
pub struct EvidenceFile {
    pub id: String,
    pub kind: EvidenceKind,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
    pub preview: PreviewUrl,
}

/// What a submitted report keeps of each attachment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceSummary {
    pub id: String,
    pub kind: EvidenceKind,
    pub file_name: String,
    pub bytes: usize,
}

impl From<&EvidenceFile> for EvidenceSummary {
    fn from(file: &EvidenceFile) -> Self {
        Self {
            id: file.id.clone(),
            kind: file.kind,
            file_name: file.file_name.clone(),
            bytes: file.bytes.len(),
        }
    }
}

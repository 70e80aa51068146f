use crate::capture::EvidenceBlob;
use crate::config::EvidenceStoreConfig;
use crate::error::DispatchError;
use crate::geolocation::ResolvedLocation;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Row inserted for every triggered emergency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub event_id: String,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub evidence_path: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl AlertRecord {
    pub fn triggered(
        event_id: &str,
        location: &ResolvedLocation,
        evidence_path: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: event_id.to_string(),
            location: location.label.clone(),
            latitude: location.coordinates.map(|c| c.latitude),
            longitude: location.coordinates.map(|c| c.longitude),
            evidence_path,
            status: "triggered".to_string(),
            created_at,
        }
    }
}

/// Where an uploaded blob ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub path: String,
    pub bytes: usize,
}

/// Object path for a blob belonging to an emergency
pub fn object_path(event_id: &str, blob: &EvidenceBlob) -> String {
    format!("{}/{}", event_id, blob.file_name())
}

#[async_trait]
pub trait EvidenceStore: Send + Sync {
    async fn upload_blob(
        &self,
        event_id: &str,
        blob: &EvidenceBlob,
    ) -> Result<StoredObject, DispatchError>;

    async fn insert_alert(&self, record: &AlertRecord) -> Result<(), DispatchError>;
}

/// Object storage plus REST insert over HTTP
pub struct HttpEvidenceStore {
    client: reqwest::Client,
    base_url: String,
    bucket: String,
    alerts_table: String,
    api_key: String,
}

impl HttpEvidenceStore {
    pub fn from_config(
        client: reqwest::Client,
        config: &EvidenceStoreConfig,
    ) -> Result<Self, DispatchError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| DispatchError::NotConfigured {
                service: "evidence_store".to_string(),
                details: "api_key is not set".to_string(),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            bucket: config.bucket.clone(),
            alerts_table: config.alerts_table.clone(),
            api_key,
        })
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }
}

#[async_trait]
impl EvidenceStore for HttpEvidenceStore {
    async fn upload_blob(
        &self,
        event_id: &str,
        blob: &EvidenceBlob,
    ) -> Result<StoredObject, DispatchError> {
        let path = object_path(event_id, blob);
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url, self.bucket, path
        );
        debug!("Uploading {} bytes to {}", blob.len(), url);

        let response = self
            .authorized(self.client.post(&url))
            .header(reqwest::header::CONTENT_TYPE, &blob.content_type)
            .body(blob.bytes.clone())
            .send()
            .await?;
        ensure_success("evidence_store", response).await?;

        Ok(StoredObject {
            path,
            bytes: blob.len(),
        })
    }

    async fn insert_alert(&self, record: &AlertRecord) -> Result<(), DispatchError> {
        let url = format!("{}/rest/v1/{}", self.base_url, self.alerts_table);

        let response = self
            .authorized(self.client.post(&url))
            .header("Prefer", "return=minimal")
            .json(record)
            .send()
            .await?;
        ensure_success("evidence_store", response).await
    }
}

pub(super) async fn ensure_success(
    service: &str,
    response: reqwest::Response,
) -> Result<(), DispatchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let body = response.text().await.unwrap_or_default();
    Err(DispatchError::Rejected {
        service: service.to_string(),
        status: status.as_u16(),
        body,
    })
}

/// Records uploads and alert rows in memory
#[derive(Default)]
pub struct InMemoryEvidenceStore {
    objects: Mutex<Vec<StoredObject>>,
    alerts: Mutex<Vec<AlertRecord>>,
    fail_uploads: bool,
}

impl InMemoryEvidenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every blob upload; alert rows are still accepted
    pub fn failing_uploads() -> Self {
        Self {
            fail_uploads: true,
            ..Self::default()
        }
    }

    pub fn objects(&self) -> Vec<StoredObject> {
        self.objects.lock().clone()
    }

    pub fn alerts(&self) -> Vec<AlertRecord> {
        self.alerts.lock().clone()
    }

    /// Total number of store operations issued
    pub fn call_count(&self) -> usize {
        self.objects.lock().len() + self.alerts.lock().len()
    }
}

#[async_trait]
impl EvidenceStore for InMemoryEvidenceStore {
    async fn upload_blob(
        &self,
        event_id: &str,
        blob: &EvidenceBlob,
    ) -> Result<StoredObject, DispatchError> {
        if self.fail_uploads {
            return Err(DispatchError::Rejected {
                service: "evidence_store".to_string(),
                status: 507,
                body: "storage full".to_string(),
            });
        }

        let object = StoredObject {
            path: object_path(event_id, blob),
            bytes: blob.len(),
        };
        info!("Stored {} bytes at {}", object.bytes, object.path);
        self.objects.lock().push(object.clone());
        Ok(object)
    }

    async fn insert_alert(&self, record: &AlertRecord) -> Result<(), DispatchError> {
        info!("Recorded alert for {} at {}", record.event_id, record.location);
        self.alerts.lock().push(record.clone());
        Ok(())
    }
}

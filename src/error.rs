use thiserror::Error;

#[derive(Error, Debug)]
pub enum AurasafeError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] toml::de::Error),

    #[error("Validation failed for {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Invalid state: {details}")]
    InvalidState { details: String },

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Geolocation error: {0}")]
    Geolocation(#[from] GeolocationError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

/// Coarse error taxonomy used for degradation decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    PermissionDenied,
    Validation,
    NetworkFailure,
    Internal,
}

impl AurasafeError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn validation<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Capture(CaptureError::PermissionDenied { .. })
            | Self::Geolocation(GeolocationError::PermissionDenied) => ErrorKind::PermissionDenied,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Geolocation(GeolocationError::Timeout { .. })
            | Self::Geolocation(GeolocationError::Lookup { .. })
            | Self::Dispatch(_) => ErrorKind::NetworkFailure,
            _ => ErrorKind::Internal,
        }
    }
}

#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Event bus channel closed")]
    ChannelClosed,
}

#[derive(Error, Debug, Clone)]
pub enum CaptureError {
    #[error("Permission denied for {mode} capture")]
    PermissionDenied { mode: String },

    #[error("Capture device unavailable: {details}")]
    DeviceUnavailable { details: String },

    #[error("Capture session already active")]
    AlreadyActive,
}

#[derive(Error, Debug, Clone)]
pub enum GeolocationError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Location request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Reverse geocoding failed: {details}")]
    Lookup { details: String },
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} rejected request with status {status}: {body}")]
    Rejected {
        service: String,
        status: u16,
        body: String,
    },

    #[error("{service} is not configured: {details}")]
    NotConfigured { service: String, details: String },
}

pub type Result<T> = std::result::Result<T, AurasafeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let denied: AurasafeError = CaptureError::PermissionDenied {
            mode: "audio".to_string(),
        }
        .into();
        assert_eq!(denied.kind(), ErrorKind::PermissionDenied);

        let invalid = AurasafeError::validation("description", "required");
        assert_eq!(invalid.kind(), ErrorKind::Validation);
        assert_eq!(
            invalid.to_string(),
            "Validation failed for description: required"
        );

        let timeout: AurasafeError = GeolocationError::Timeout { seconds: 10 }.into();
        assert_eq!(timeout.kind(), ErrorKind::NetworkFailure);

        assert_eq!(AurasafeError::system("boom").kind(), ErrorKind::Internal);
    }
}

use crate::capture::CaptureMode;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AurasafeConfig {
    pub countdown: CountdownConfig,
    pub capture: CaptureConfig,
    pub geolocation: GeolocationConfig,
    pub evidence_store: EvidenceStoreConfig,
    pub notifier: NotifierConfig,
    pub api: ApiConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CountdownConfig {
    /// Number of ticks before the emergency fires
    #[serde(default = "default_countdown_duration")]
    pub duration_seconds: u32,

    /// Tick period in milliseconds
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,
}

impl CountdownConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_millis)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CaptureConfig {
    /// Media requested when the emergency button is pressed
    #[serde(default = "default_capture_mode")]
    pub mode: CaptureMode,

    /// Upper bound on buffered media; chunks past it are dropped
    #[serde(default = "default_max_buffer_bytes")]
    pub max_buffer_bytes: usize,

    /// Chunk cadence of the simulated media source
    #[serde(default = "default_chunk_interval_millis")]
    pub chunk_interval_millis: u64,

    /// Make the simulated media source refuse access
    #[serde(default)]
    pub simulate_permission_denied: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GeolocationConfig {
    /// Reverse geocoding endpoint
    #[serde(default = "default_reverse_geocode_url")]
    pub reverse_geocode_url: String,

    /// Upper bound for a one-shot position plus lookup
    #[serde(default = "default_geolocation_timeout")]
    pub timeout_seconds: u64,

    /// How long a previously reported position is reused
    #[serde(default = "default_maximum_age")]
    pub maximum_age_seconds: u64,

    /// Fixed device position (latitude, longitude); absent means denied
    pub static_position: Option<(f64, f64)>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EvidenceStoreConfig {
    /// Base URL of the storage service; empty selects the in-memory store
    #[serde(default)]
    pub base_url: String,

    #[serde(default = "default_bucket")]
    pub bucket: String,

    #[serde(default = "default_alerts_table")]
    pub alerts_table: String,

    /// Supplied through AURASAFE_EVIDENCE_STORE__API_KEY
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NotifierConfig {
    #[serde(default = "default_relay_endpoint")]
    pub endpoint: String,

    /// Empty selects the logging notifier
    #[serde(default)]
    pub service_id: String,

    #[serde(default)]
    pub template_id: String,

    /// Supplied through AURASAFE_NOTIFIER__PUBLIC_KEY
    pub public_key: Option<String>,

    /// Timezone used when rendering trigger times
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_api_enabled")]
    pub enabled: bool,

    #[serde(default = "default_api_ip")]
    pub ip: String,

    #[serde(default = "default_api_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl AurasafeConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("aurasafe.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("countdown.duration_seconds", default_countdown_duration())?
            .set_default("countdown.tick_millis", default_tick_millis() as i64)?
            .set_default("capture.mode", default_capture_mode().as_str())?
            .set_default(
                "capture.max_buffer_bytes",
                default_max_buffer_bytes() as i64,
            )?
            .set_default(
                "capture.chunk_interval_millis",
                default_chunk_interval_millis() as i64,
            )?
            .set_default("capture.simulate_permission_denied", false)?
            .set_default(
                "geolocation.reverse_geocode_url",
                default_reverse_geocode_url(),
            )?
            .set_default(
                "geolocation.timeout_seconds",
                default_geolocation_timeout() as i64,
            )?
            .set_default(
                "geolocation.maximum_age_seconds",
                default_maximum_age() as i64,
            )?
            .set_default("evidence_store.base_url", "")?
            .set_default("evidence_store.bucket", default_bucket())?
            .set_default("evidence_store.alerts_table", default_alerts_table())?
            .set_default("notifier.endpoint", default_relay_endpoint())?
            .set_default("notifier.service_id", "")?
            .set_default("notifier.template_id", "")?
            .set_default("notifier.timezone", default_timezone())?
            .set_default("api.enabled", default_api_enabled())?
            .set_default("api.ip", default_api_ip())?
            .set_default("api.port", default_api_port())?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // AURASAFE_COUNTDOWN__DURATION_SECONDS=3 style overrides
            .add_source(
                Environment::with_prefix("AURASAFE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: AurasafeConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config.redacted());

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.countdown.duration_seconds == 0 {
            return Err(ConfigError::Message(
                "Countdown duration_seconds must be greater than 0".to_string(),
            ));
        }

        if self.countdown.tick_millis == 0 {
            return Err(ConfigError::Message(
                "Countdown tick_millis must be greater than 0".to_string(),
            ));
        }

        if self.capture.max_buffer_bytes == 0 {
            return Err(ConfigError::Message(
                "Capture max_buffer_bytes must be greater than 0".to_string(),
            ));
        }

        if self.geolocation.timeout_seconds == 0 {
            return Err(ConfigError::Message(
                "Geolocation timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.notifier.timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(ConfigError::Message(format!(
                "Unknown notifier timezone '{}'",
                self.notifier.timezone
            )));
        }

        if self.api.enabled && self.api.port == 0 {
            return Err(ConfigError::Message(
                "API port must be greater than 0".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Copy with credentials masked, for logging
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.evidence_store.api_key.is_some() {
            copy.evidence_store.api_key = Some("***".to_string());
        }
        if copy.notifier.public_key.is_some() {
            copy.notifier.public_key = Some("***".to_string());
        }
        copy
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> crate::error::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

impl Default for AurasafeConfig {
    fn default() -> Self {
        Self {
            countdown: CountdownConfig {
                duration_seconds: default_countdown_duration(),
                tick_millis: default_tick_millis(),
            },
            capture: CaptureConfig {
                mode: default_capture_mode(),
                max_buffer_bytes: default_max_buffer_bytes(),
                chunk_interval_millis: default_chunk_interval_millis(),
                simulate_permission_denied: false,
            },
            geolocation: GeolocationConfig {
                reverse_geocode_url: default_reverse_geocode_url(),
                timeout_seconds: default_geolocation_timeout(),
                maximum_age_seconds: default_maximum_age(),
                static_position: None,
            },
            evidence_store: EvidenceStoreConfig {
                base_url: String::new(),
                bucket: default_bucket(),
                alerts_table: default_alerts_table(),
                api_key: None,
            },
            notifier: NotifierConfig {
                endpoint: default_relay_endpoint(),
                service_id: String::new(),
                template_id: String::new(),
                public_key: None,
                timezone: default_timezone(),
            },
            api: ApiConfig {
                enabled: default_api_enabled(),
                ip: default_api_ip(),
                port: default_api_port(),
            },
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
            },
        }
    }
}

// Default value functions
fn default_countdown_duration() -> u32 {
    5
}
fn default_tick_millis() -> u64 {
    1000
}

fn default_capture_mode() -> CaptureMode {
    CaptureMode::AudioVideo
}
fn default_max_buffer_bytes() -> usize {
    64 * 1024 * 1024
}
fn default_chunk_interval_millis() -> u64 {
    250
}

fn default_reverse_geocode_url() -> String {
    "https://api.bigdatacloud.net/data/reverse-geocode-client".to_string()
}
fn default_geolocation_timeout() -> u64 {
    10
}
fn default_maximum_age() -> u64 {
    60
}

fn default_bucket() -> String {
    "evidence".to_string()
}
fn default_alerts_table() -> String {
    "alerts".to_string()
}

fn default_relay_endpoint() -> String {
    "https://api.emailjs.com/api/v1.0/email/send".to_string()
}
fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_api_enabled() -> bool {
    false
}
fn default_api_ip() -> String {
    "127.0.0.1".to_string()
}
fn default_api_port() -> u16 {
    8080
}

fn default_event_bus_capacity() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AurasafeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.countdown.duration_seconds, 5);
        assert_eq!(config.countdown.tick_period(), Duration::from_secs(1));
        assert_eq!(config.capture.mode, CaptureMode::AudioVideo);
    }

    #[test]
    fn test_config_validation() {
        let mut config = AurasafeConfig::default();
        config.countdown.duration_seconds = 0;
        assert!(config.validate().is_err());

        config.countdown.duration_seconds = 3;
        config.notifier.timezone = "Mars/Olympus".to_string();
        assert!(config.validate().is_err());

        config.notifier.timezone = "Asia/Kolkata".to_string();
        assert!(config.validate().is_ok());

        config.api.enabled = true;
        config.api.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
[countdown]
duration_seconds = 3

[capture]
mode = "audio_only"

[geolocation]
static_position = [28.6139, 77.2090]
"#
        )
        .unwrap();

        let config = AurasafeConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.countdown.duration_seconds, 3);
        assert_eq!(config.countdown.tick_millis, 1000);
        assert_eq!(config.capture.mode, CaptureMode::AudioOnly);
        assert_eq!(config.geolocation.static_position, Some((28.6139, 77.2090)));
        assert_eq!(config.evidence_store.bucket, "evidence");
    }

    #[test]
    fn test_env_override_uses_double_underscore_separator() {
        std::env::set_var("AURASAFE_NOTIFIER__TEMPLATE_ID", "template_env");
        let config = AurasafeConfig::load_from_file("/nonexistent/aurasafe.toml");
        std::env::remove_var("AURASAFE_NOTIFIER__TEMPLATE_ID");

        assert_eq!(config.unwrap().notifier.template_id, "template_env");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = AurasafeConfig::load_from_file("/nonexistent/aurasafe.toml").unwrap();
        assert_eq!(config.countdown.duration_seconds, 5);
        assert!(config.evidence_store.base_url.is_empty());
    }

    #[test]
    fn test_redacted_masks_credentials() {
        let mut config = AurasafeConfig::default();
        config.evidence_store.api_key = Some("secret".to_string());
        let redacted = config.redacted();
        assert_eq!(redacted.evidence_store.api_key.as_deref(), Some("***"));
        assert!(redacted.notifier.public_key.is_none());
    }

    #[test]
    fn test_default_config_renders_as_toml() {
        let rendered = AurasafeConfig::default().to_toml().unwrap();
        assert!(rendered.contains("[countdown]"));
        assert!(rendered.contains("duration_seconds = 5"));
    }
}

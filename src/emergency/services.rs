use crate::capture::{MediaSource, SimulatedMediaSource};
use crate::config::AurasafeConfig;
use crate::dispatch::{
    evidence_store_from_config, notifier_from_config, EvidenceStore, FanOut, InMemoryEvidenceStore,
    LoggingNotifier, Notifier,
};
use crate::error::{AurasafeError, Result};
use crate::events::EventBus;
use crate::geolocation::{
    DeniedPositionProvider, GeolocationResolver, PositionOptions, PositionProvider, ReverseGeocoder,
};
use crate::trust_network::TrustNetwork;
use chrono_tz::Tz;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Collaborators of the emergency flow, built once at startup
pub struct Services {
    pub media_source: Arc<dyn MediaSource>,
    pub resolver: Arc<GeolocationResolver>,
    pub evidence_store: Arc<dyn EvidenceStore>,
    pub notifier: Arc<dyn Notifier>,
    pub trust_network: Arc<Mutex<TrustNetwork>>,
    pub event_bus: EventBus,
    pub timezone: Tz,
}

impl Services {
    pub fn builder(event_bus: EventBus) -> ServicesBuilder {
        ServicesBuilder::new(event_bus)
    }

    /// Wire every collaborator from configuration
    pub fn from_config(config: &AurasafeConfig, event_bus: EventBus) -> Result<Arc<Self>> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.geolocation.timeout_seconds.max(1) * 3))
            .user_agent(concat!("aurasafe/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                AurasafeError::component("services".to_string(), format!("HTTP client: {}", e))
            })?;

        let timezone = parse_timezone(&config.notifier.timezone)?;

        let services = ServicesBuilder::new(event_bus)
            .with_media_source(Arc::new(SimulatedMediaSource::from_config(&config.capture)))
            .with_resolver(Arc::new(GeolocationResolver::from_config(
                &config.geolocation,
                client.clone(),
            )))
            .with_evidence_store(evidence_store_from_config(client.clone(), &config.evidence_store))
            .with_notifier(notifier_from_config(client, &config.notifier))
            .with_timezone(timezone)
            .build();

        info!("Services initialized (alerts rendered in {})", timezone);
        Ok(Arc::new(services))
    }

    pub fn fan_out(&self) -> FanOut {
        FanOut::new(
            Arc::clone(&self.evidence_store),
            Arc::clone(&self.notifier),
            self.event_bus.clone(),
            self.timezone,
        )
    }
}

fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>().map_err(|_| {
        AurasafeError::validation("notifier.timezone", format!("unknown timezone '{}'", name))
    })
}

/// Builder for `Services`. Anything not supplied falls back to the local,
/// in-process implementation.
pub struct ServicesBuilder {
    event_bus: EventBus,
    media_source: Option<Arc<dyn MediaSource>>,
    resolver: Option<Arc<GeolocationResolver>>,
    evidence_store: Option<Arc<dyn EvidenceStore>>,
    notifier: Option<Arc<dyn Notifier>>,
    trust_network: Option<TrustNetwork>,
    timezone: Tz,
}

impl ServicesBuilder {
    pub fn new(event_bus: EventBus) -> Self {
        Self {
            event_bus,
            media_source: None,
            resolver: None,
            evidence_store: None,
            notifier: None,
            trust_network: None,
            timezone: chrono_tz::UTC,
        }
    }

    pub fn with_media_source(mut self, source: Arc<dyn MediaSource>) -> Self {
        self.media_source = Some(source);
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<GeolocationResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Resolver over an arbitrary position provider and optional geocoder
    pub fn with_position_provider(
        self,
        provider: Arc<dyn PositionProvider>,
        geocoder: Option<Arc<dyn ReverseGeocoder>>,
    ) -> Self {
        self.with_resolver(Arc::new(GeolocationResolver::new(
            provider,
            geocoder,
            PositionOptions::default(),
        )))
    }

    pub fn with_evidence_store(mut self, store: Arc<dyn EvidenceStore>) -> Self {
        self.evidence_store = Some(store);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_trust_network(mut self, network: TrustNetwork) -> Self {
        self.trust_network = Some(network);
        self
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn build(self) -> Services {
        Services {
            media_source: self
                .media_source
                .unwrap_or_else(|| Arc::new(SimulatedMediaSource::new(Duration::from_millis(250)))),
            resolver: self.resolver.unwrap_or_else(|| {
                Arc::new(GeolocationResolver::new(
                    Arc::new(DeniedPositionProvider),
                    None,
                    PositionOptions::default(),
                ))
            }),
            evidence_store: self
                .evidence_store
                .unwrap_or_else(|| Arc::new(InMemoryEvidenceStore::new())),
            notifier: self
                .notifier
                .unwrap_or_else(|| Arc::new(LoggingNotifier::new())),
            trust_network: Arc::new(Mutex::new(self.trust_network.unwrap_or_default())),
            event_bus: self.event_bus,
            timezone: self.timezone,
        }
    }
}

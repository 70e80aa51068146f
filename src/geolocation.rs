use crate::config::GeolocationConfig;
use crate::error::GeolocationError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Label used whenever no position could be determined
pub const UNKNOWN_LOCATION: &str = "Unknown Location";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// `"lat, lon"` with six decimals
    pub fn fixed6(&self) -> String {
        format!("{:.6}, {:.6}", self.latitude, self.longitude)
    }

    pub fn maps_link(&self) -> String {
        format!(
            "https://maps.google.com/?q={},{}",
            self.latitude, self.longitude
        )
    }
}

/// One-shot position request options
#[derive(Debug, Clone, Copy)]
pub struct PositionOptions {
    pub timeout: Duration,
    /// How long a previously reported position may be reused
    pub maximum_age: Duration,
}

impl PositionOptions {
    pub fn from_config(config: &GeolocationConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_seconds),
            maximum_age: Duration::from_secs(config.maximum_age_seconds),
        }
    }
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            maximum_age: Duration::from_secs(60),
        }
    }
}

#[async_trait]
pub trait PositionProvider: Send + Sync {
    async fn current_position(&self) -> Result<Coordinates, GeolocationError>;
}

/// Reports a fixed position, optionally after a delay
pub struct StaticPositionProvider {
    coordinates: Coordinates,
    delay: Duration,
}

impl StaticPositionProvider {
    pub fn new(coordinates: Coordinates) -> Self {
        Self {
            coordinates,
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl PositionProvider for StaticPositionProvider {
    async fn current_position(&self) -> Result<Coordinates, GeolocationError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.coordinates)
    }
}

/// Always refuses, like a user who declined the location prompt
pub struct DeniedPositionProvider;

#[async_trait]
impl PositionProvider for DeniedPositionProvider {
    async fn current_position(&self) -> Result<Coordinates, GeolocationError> {
        Err(GeolocationError::PermissionDenied)
    }
}

/// Human-readable place for a coordinate pair
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Place {
    pub locality: Option<String>,
    pub region: Option<String>,
}

impl Place {
    /// `"locality, region"`, skipping missing parts
    pub fn label(&self) -> Option<String> {
        let parts: Vec<&str> = [self.locality.as_deref(), self.region.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn reverse(&self, coordinates: Coordinates) -> Result<Place, GeolocationError>;
}

/// Reverse geocoding over a JSON HTTP endpoint
pub struct HttpReverseGeocoder {
    client: reqwest::Client,
    url: String,
}

impl HttpReverseGeocoder {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl ReverseGeocoder for HttpReverseGeocoder {
    async fn reverse(&self, coordinates: Coordinates) -> Result<Place, GeolocationError> {
        let lookup_error = |e: reqwest::Error| GeolocationError::Lookup {
            details: e.to_string(),
        };

        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("latitude", coordinates.latitude.to_string()),
                ("longitude", coordinates.longitude.to_string()),
                ("localityLanguage", "en".to_string()),
            ])
            .send()
            .await
            .map_err(lookup_error)?;

        if !response.status().is_success() {
            return Err(GeolocationError::Lookup {
                details: format!("status {}", response.status()),
            });
        }

        let body: serde_json::Value = response.json().await.map_err(lookup_error)?;
        Ok(parse_place(&body))
    }
}

/// Extract a place from a reverse geocoding response body
pub fn parse_place(body: &serde_json::Value) -> Place {
    let text = |key: &str| {
        body.get(key)
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    Place {
        locality: text("locality").or_else(|| text("city")),
        region: text("principalSubdivision"),
    }
}

/// Outcome of a best-effort location lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLocation {
    pub label: String,
    pub coordinates: Option<Coordinates>,
}

impl ResolvedLocation {
    pub fn unknown() -> Self {
        Self {
            label: UNKNOWN_LOCATION.to_string(),
            coordinates: None,
        }
    }

    pub fn is_known(&self) -> bool {
        self.coordinates.is_some()
    }
}

/// Turns a one-shot position into a display label. Never fails: any denial,
/// timeout or lookup error degrades to the unknown location label.
pub struct GeolocationResolver {
    provider: Arc<dyn PositionProvider>,
    geocoder: Option<Arc<dyn ReverseGeocoder>>,
    options: PositionOptions,
    last_position: Mutex<Option<(Instant, Coordinates)>>,
}

impl GeolocationResolver {
    pub fn new(
        provider: Arc<dyn PositionProvider>,
        geocoder: Option<Arc<dyn ReverseGeocoder>>,
        options: PositionOptions,
    ) -> Self {
        Self {
            provider,
            geocoder,
            options,
            last_position: Mutex::new(None),
        }
    }

    /// Static position when configured, denial otherwise
    pub fn from_config(config: &GeolocationConfig, client: reqwest::Client) -> Self {
        let provider: Arc<dyn PositionProvider> = match config.static_position {
            Some((latitude, longitude)) => {
                Arc::new(StaticPositionProvider::new(Coordinates::new(latitude, longitude)))
            }
            None => Arc::new(DeniedPositionProvider),
        };

        let geocoder: Option<Arc<dyn ReverseGeocoder>> = if config.reverse_geocode_url.is_empty() {
            None
        } else {
            Some(Arc::new(HttpReverseGeocoder::new(
                client,
                config.reverse_geocode_url.clone(),
            )))
        };

        Self::new(provider, geocoder, PositionOptions::from_config(config))
    }

    pub async fn resolve(&self) -> ResolvedLocation {
        let coordinates = match self.position().await {
            Ok(coordinates) => coordinates,
            Err(e) => {
                warn!("Location unavailable: {}", e);
                return ResolvedLocation::unknown();
            }
        };

        let label = match self.lookup(coordinates).await {
            Ok(label) => label,
            Err(e) => {
                warn!("Reverse geocoding failed: {}", e);
                UNKNOWN_LOCATION.to_string()
            }
        };

        info!("Location resolved: {}", label);
        ResolvedLocation {
            label,
            coordinates: Some(coordinates),
        }
    }

    async fn position(&self) -> Result<Coordinates, GeolocationError> {
        let cached = *self.last_position.lock();
        if let Some((at, coordinates)) = cached {
            if at.elapsed() <= self.options.maximum_age {
                debug!("Reusing position reported {:?} ago", at.elapsed());
                return Ok(coordinates);
            }
        }

        let coordinates =
            tokio::time::timeout(self.options.timeout, self.provider.current_position())
                .await
                .map_err(|_| GeolocationError::Timeout {
                    seconds: self.options.timeout.as_secs(),
                })??;

        *self.last_position.lock() = Some((Instant::now(), coordinates));
        Ok(coordinates)
    }

    async fn lookup(&self, coordinates: Coordinates) -> Result<String, GeolocationError> {
        let Some(geocoder) = &self.geocoder else {
            debug!("No reverse geocoder configured");
            return Ok(coordinates.fixed6());
        };

        let place = tokio::time::timeout(self.options.timeout, geocoder.reverse(coordinates))
            .await
            .map_err(|_| GeolocationError::Timeout {
                seconds: self.options.timeout.as_secs(),
            })??;

        Ok(place
            .label()
            .unwrap_or_else(|| UNKNOWN_LOCATION.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedGeocoder(Result<Place, GeolocationError>);

    #[async_trait]
    impl ReverseGeocoder for FixedGeocoder {
        async fn reverse(&self, _coordinates: Coordinates) -> Result<Place, GeolocationError> {
            self.0.clone()
        }
    }

    fn seattle() -> Coordinates {
        Coordinates::new(47.6062, -122.3321)
    }

    fn resolver(
        provider: Arc<dyn PositionProvider>,
        geocoder: Option<Result<Place, GeolocationError>>,
    ) -> GeolocationResolver {
        let geocoder = geocoder.map(|r| Arc::new(FixedGeocoder(r)) as Arc<dyn ReverseGeocoder>);
        GeolocationResolver::new(provider, geocoder, PositionOptions::default())
    }

    #[test]
    fn test_coordinate_formatting() {
        let coords = Coordinates::new(40.7128, -74.0059);
        assert_eq!(coords.fixed6(), "40.712800, -74.005900");
        assert_eq!(coords.maps_link(), "https://maps.google.com/?q=40.7128,-74.0059");
    }

    #[test]
    fn test_parse_place_prefers_locality() {
        let place = parse_place(&json!({
            "locality": "Seattle",
            "city": "Ignored",
            "principalSubdivision": "Washington"
        }));
        assert_eq!(place.label().as_deref(), Some("Seattle, Washington"));

        let fallback = parse_place(&json!({ "locality": "", "city": "Tacoma" }));
        assert_eq!(fallback.label().as_deref(), Some("Tacoma"));

        assert_eq!(parse_place(&json!({})).label(), None);
    }

    #[tokio::test]
    async fn test_resolve_uses_reverse_geocoded_label() {
        let place = Place {
            locality: Some("Seattle".to_string()),
            region: Some("Washington".to_string()),
        };
        let resolver = resolver(Arc::new(StaticPositionProvider::new(seattle())), Some(Ok(place)));

        let resolved = resolver.resolve().await;
        assert_eq!(resolved.label, "Seattle, Washington");
        assert_eq!(resolved.coordinates, Some(seattle()));
    }

    #[tokio::test]
    async fn test_lookup_failure_yields_sentinel_but_keeps_coordinates() {
        let failure = Err(GeolocationError::Lookup {
            details: "network down".to_string(),
        });
        let new_york = Coordinates::new(40.7128, -74.0059);
        let resolver = resolver(Arc::new(StaticPositionProvider::new(new_york)), Some(failure));

        let resolved = resolver.resolve().await;
        assert_eq!(resolved.label, UNKNOWN_LOCATION);
        assert_eq!(resolved.coordinates, Some(new_york));
        assert!(resolved.is_known());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_lookup_yields_sentinel() {
        struct SlowGeocoder;

        #[async_trait]
        impl ReverseGeocoder for SlowGeocoder {
            async fn reverse(&self, _coordinates: Coordinates) -> Result<Place, GeolocationError> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(Place::default())
            }
        }

        let resolver = GeolocationResolver::new(
            Arc::new(StaticPositionProvider::new(seattle())),
            Some(Arc::new(SlowGeocoder)),
            PositionOptions::default(),
        );

        let resolved = resolver.resolve().await;
        assert_eq!(resolved.label, UNKNOWN_LOCATION);
        assert_eq!(resolved.coordinates, Some(seattle()));
    }

    #[tokio::test]
    async fn test_without_geocoder_label_is_coordinates() {
        let resolver = resolver(Arc::new(StaticPositionProvider::new(seattle())), None);

        let resolved = resolver.resolve().await;
        assert_eq!(resolved.label, "47.606200, -122.332100");
    }

    #[tokio::test(start_paused = true)]
    async fn test_recent_position_is_reused_within_maximum_age() {
        struct CountingProvider(AtomicUsize);

        #[async_trait]
        impl PositionProvider for CountingProvider {
            async fn current_position(&self) -> Result<Coordinates, GeolocationError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(Coordinates::new(47.6062, -122.3321))
            }
        }

        let provider = Arc::new(CountingProvider(AtomicUsize::new(0)));
        let resolver = GeolocationResolver::new(provider.clone(), None, PositionOptions::default());

        resolver.resolve().await;
        resolver.resolve().await;
        assert_eq!(provider.0.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        resolver.resolve().await;
        assert_eq!(provider.0.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_denied_yields_sentinel() {
        let resolver = resolver(Arc::new(DeniedPositionProvider), None);
        let resolved = resolver.resolve().await;
        assert_eq!(resolved, ResolvedLocation::unknown());
        assert_eq!(resolved.label, UNKNOWN_LOCATION);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_position_times_out() {
        let slow = StaticPositionProvider::new(seattle()).with_delay(Duration::from_secs(30));
        let resolver = resolver(Arc::new(slow), None);

        let resolved = resolver.resolve().await;
        assert_eq!(resolved.label, UNKNOWN_LOCATION);
        assert!(!resolved.is_known());
    }
}

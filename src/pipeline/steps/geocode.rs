use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::app::ports::{GeocoderPort, RateLimiterPort};
use crate::constants;
use crate::domain::Candidate;
use crate::observability::metrics;

/// Attaches coordinates to every candidate, one throttled lookup at a time.
pub struct GeocodeStep {
    geocoder: Arc<dyn GeocoderPort>,
    rate_limiter: Arc<dyn RateLimiterPort>,
    country_code: String,
    country_name: String,
}

impl GeocodeStep {
    pub fn new(
        geocoder: Arc<dyn GeocoderPort>,
        rate_limiter: Arc<dyn RateLimiterPort>,
        country_code: String,
        country_name: String,
    ) -> Self {
        Self {
            geocoder,
            rate_limiter,
            country_code,
            country_name,
        }
    }

    pub fn step_name(&self) -> &'static str {
        constants::STEP_GEOCODING
    }

    /// Never drops a candidate; a miss or error leaves coordinates as they were.
    #[instrument(skip(self, candidates), fields(input = candidates.len()))]
    pub async fn run(&self, candidates: Vec<Candidate>) -> Vec<Candidate> {
        let input = candidates.len();
        let mut located = 0usize;
        let mut output = Vec::with_capacity(input);

        for mut candidate in candidates {
            let address = build_address(&candidate, &self.country_name);
            match self.geocoder.geocode(&address, &self.country_code).await {
                Ok(Some((lat, lng))) => {
                    candidate.lat = Some(round6(lat));
                    candidate.lng = Some(round6(lng));
                    located += 1;
                    metrics::geocode::hit();
                }
                Ok(None) => {
                    debug!("No geocoding match for '{}'", address);
                    metrics::geocode::miss();
                }
                Err(e) => {
                    warn!("Geocoding failed for '{}': {}", candidate.name, e);
                    metrics::provider::error(constants::NOMINATIM);
                    metrics::geocode::miss();
                }
            }
            self.rate_limiter.acquire().await;
            output.push(candidate);
        }

        info!("📍 Geocoded {}/{} candidates", located, input);
        metrics::stage::items(self.step_name(), input, output.len());
        output
    }
}

/// "address, postal_code city, country" with unknown parts left out.
pub fn build_address(candidate: &Candidate, country_name: &str) -> String {
    let locality = if candidate.has_known_postal_code() {
        format!("{} {}", candidate.postal_code, candidate.city)
    } else {
        candidate.city.clone()
    };

    [candidate.address.trim(), locality.trim(), country_name.trim()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PipelineError, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Resolves anything mentioning Lyon, fails on "Panne", misses the rest.
    struct LyonOnly {
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl GeocoderPort for LyonOnly {
        async fn geocode(&self, address: &str, country_code: &str) -> Result<Option<(f64, f64)>> {
            assert_eq!(country_code, "fr");
            self.queries.lock().unwrap().push(address.to_string());
            if address.contains("Panne") {
                return Err(PipelineError::Provider {
                    provider: constants::NOMINATIM,
                    status: 503,
                    body: String::new(),
                });
            }
            Ok(address.contains("Lyon").then_some((45.764_043_21, 4.835_658_87)))
        }
    }

    #[derive(Default)]
    struct CountingLimiter(AtomicUsize);

    #[async_trait]
    impl RateLimiterPort for CountingLimiter {
        async fn acquire(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn step() -> (GeocodeStep, Arc<LyonOnly>, Arc<CountingLimiter>) {
        let geocoder = Arc::new(LyonOnly { queries: Mutex::new(Vec::new()) });
        let limiter = Arc::new(CountingLimiter::default());
        let step = GeocodeStep::new(
            geocoder.clone(),
            limiter.clone(),
            "fr".to_string(),
            "France".to_string(),
        );
        (step, geocoder, limiter)
    }

    fn candidate(name: &str, address: &str, postal_code: &str, city: &str) -> Candidate {
        let mut c = Candidate::new(name, constants::SOURCE_MULTI_AI);
        c.address = address.to_string();
        c.postal_code = postal_code.to_string();
        c.city = city.to_string();
        c
    }

    #[test]
    fn test_build_address_skips_unknown_parts() {
        let full = candidate("A", "12 rue de la République", "69002", "Lyon");
        assert_eq!(build_address(&full, "France"), "12 rue de la République, 69002 Lyon, France");

        let sparse = candidate("B", "", constants::UNKNOWN_POSTAL_CODE, "Lyon");
        assert_eq!(build_address(&sparse, "France"), "Lyon, France");
    }

    #[test]
    fn test_round6() {
        assert_eq!(round6(45.764_043_21), 45.764_043);
        assert_eq!(round6(-0.000_000_4), -0.0);
    }

    #[tokio::test]
    async fn test_hits_misses_and_errors_keep_every_candidate() {
        let (step, geocoder, limiter) = step();
        let mut already_placed = candidate("Placed", "", "75001", "Paris");
        already_placed.lat = Some(48.86);
        already_placed.lng = Some(2.34);

        let input = vec![
            candidate("Hit", "1 place Bellecour", "69002", "Lyon"),
            already_placed.clone(),
            candidate("Err", "", "", "Panne"),
        ];
        let output = step.run(input).await;

        assert_eq!(output.len(), 3);
        assert_eq!(output[0].lat, Some(45.764_043));
        assert_eq!(output[0].lng, Some(4.835_659));
        assert_eq!(output[1], already_placed);
        assert!(!output[2].is_geocoded());

        assert_eq!(geocoder.queries.lock().unwrap().len(), 3);
        assert_eq!(limiter.0.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_geocoding_twice_is_stable() {
        let (step, _, _) = step();
        let input = vec![candidate("Hit", "", "69003", "Lyon")];
        let once = step.run(input).await;
        let twice = step.run(once.clone()).await;
        assert_eq!(once, twice);
    }
}

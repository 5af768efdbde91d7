use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::app::ports::GeocoderPort;
use crate::constants;
use crate::error::{PipelineError, Result};
use crate::infra::http_client::ensure_success;

/// Keyless geocoding against an OpenStreetMap Nominatim instance.
pub struct NominatimGeocoder {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

impl NominatimGeocoder {
    pub fn new(client: reqwest::Client, endpoint: String) -> Self {
        Self { client, endpoint }
    }

    fn lookup_request(&self, address: &str, country_code: &str) -> Result<reqwest::Request> {
        let request = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("format", "json"),
                ("q", address),
                ("countrycodes", country_code),
                ("limit", "1"),
            ])
            .build()?;
        Ok(request)
    }
}

fn first_match(places: &[Place]) -> Result<Option<(f64, f64)>> {
    let Some(place) = places.first() else {
        return Ok(None);
    };
    let lat = place
        .lat
        .parse::<f64>()
        .map_err(|e| PipelineError::Parse(format!("latitude '{}': {}", place.lat, e)))?;
    let lng = place
        .lon
        .parse::<f64>()
        .map_err(|e| PipelineError::Parse(format!("longitude '{}': {}", place.lon, e)))?;
    Ok(Some((lat, lng)))
}

#[async_trait]
impl GeocoderPort for NominatimGeocoder {
    async fn geocode(&self, address: &str, country_code: &str) -> Result<Option<(f64, f64)>> {
        debug!(address, "geocoding");
        let request = self.lookup_request(address, country_code)?;
        let resp = self.client.execute(request).await?;
        let resp = ensure_success(constants::NOMINATIM, resp).await?;
        let places: Vec<Place> = resp.json().await?;
        first_match(&places)
    }
}

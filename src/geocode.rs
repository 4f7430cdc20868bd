//! Address to coordinate lookup.

use crate::config::GeocoderConfig;
use crate::models::GeoPoint;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Resolves a free-text address to coordinates. `None` means unresolved.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn locate(&self, address: &str) -> Option<GeoPoint>;
}

/// Nominatim search hit; coordinates arrive as strings
#[derive(Debug, Deserialize)]
struct NominatimHit {
    lat: String,
    lon: String,
}

/// OpenStreetMap Nominatim search
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
    region_suffix: String,
}

impl NominatimGeocoder {
    pub fn new(settings: &GeocoderConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("Failed to build geocoder HTTP client")?;

        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
            region_suffix: settings.region_suffix.clone(),
        })
    }

    fn query_url(&self, address: &str) -> String {
        let query = if self.region_suffix.is_empty() {
            address.trim().to_string()
        } else {
            format!("{}, {}", address.trim(), self.region_suffix)
        };
        format!(
            "{}?q={}&format=json&limit=1",
            self.base_url,
            urlencoding::encode(&query)
        )
    }

    async fn search(&self, address: &str) -> Result<Option<GeoPoint>> {
        let url = self.query_url(address);
        debug!("Geocoding: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Geocoding request failed")?
            .error_for_status()
            .context("Geocoding service returned an error status")?;
        let body = response.text().await.context("Failed to read geocoding response")?;

        parse_response(&body)
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn locate(&self, address: &str) -> Option<GeoPoint> {
        if address.trim().is_empty() {
            return None;
        }
        match self.search(address).await {
            Ok(Some(point)) => Some(point),
            Ok(None) => {
                debug!("No geocoding match for '{}'", address);
                None
            }
            Err(e) => {
                warn!(address = %address, "Geocoding failed: {:#}", e);
                None
            }
        }
    }
}

/// First hit of a Nominatim JSON array, or `None` when the array is empty
fn parse_response(body: &str) -> Result<Option<GeoPoint>> {
    let hits: Vec<NominatimHit> =
        serde_json::from_str(body).context("Failed to parse geocoding response")?;
    let Some(hit) = hits.first() else {
        return Ok(None);
    };

    let lat: f64 = hit
        .lat
        .parse()
        .map_err(|e| anyhow!("Invalid latitude in response: {}", e))?;
    let lng: f64 = hit
        .lon
        .parse()
        .map_err(|e| anyhow!("Invalid longitude in response: {}", e))?;

    Ok(Some(GeoPoint::new(lat, lng)))
}

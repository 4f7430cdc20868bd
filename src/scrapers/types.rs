use crate::models::{GeoPoint, RawListing};
use serde::{Deserialize, Serialize};

/// Selection criteria applied to normalized listings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterCriteria {
    pub want_detached: bool,
    pub want_semi_detached: bool,
    pub require_garage: bool,
    pub min_bedrooms: u32,
    pub min_bathrooms: u32,
    /// Minimum price (GBP)
    pub min_price: u64,
    /// Maximum price (GBP)
    pub max_price: u64,
    pub radius_miles: f64,
    pub center_point: GeoPoint,
    /// Listings this close to any exclusion zone are dropped
    pub exclusion_zones: Vec<GeoPoint>,
    pub exclusion_radius_miles: f64,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            want_detached: true,
            want_semi_detached: true,
            require_garage: false,
            min_bedrooms: 3,
            min_bathrooms: 2,
            min_price: 180_000,
            max_price: 230_000,
            radius_miles: 30.0,
            // Center of Lincolnshire
            center_point: GeoPoint::new(53.233, -0.539),
            exclusion_zones: Vec::new(),
            exclusion_radius_miles: 0.5,
        }
    }
}

/// Which page-fetch strategy produced a result
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Headless browser render
    Rendered,
    /// Plain HTTP fetch, no script execution
    Direct,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Rendered => "rendered",
            Strategy::Direct => "direct",
        }
    }
}

/// Raw listings pulled from one page, with the notes gathered along the way
#[derive(Debug, Clone, Default)]
pub struct PageExtraction {
    pub listings: Vec<RawListing>,
    pub trace: Vec<String>,
}

use serde::{Deserialize, Serialize};
use std::fmt;

/// Source of the property listing
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Source {
    Rightmove,
    Zoopla,
    OnTheMarket,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Rightmove => "Rightmove",
            Source::Zoopla => "Zoopla",
            Source::OnTheMarket => "OnTheMarket",
        }
    }

    /// Lowercase prefix used when deriving listing ids
    pub fn slug(&self) -> &'static str {
        match self {
            Source::Rightmove => "rightmove",
            Source::Zoopla => "zoopla",
            Source::OnTheMarket => "onthemarket",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Property classification derived from listing text
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PropertyType {
    Detached,
    SemiDetached,
    Other,
}

/// Listing fields exactly as an adapter pulled them out of one card.
///
/// Nothing here is guaranteed to be present; the normalizer fills defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RawListing {
    pub source: Option<Source>,
    pub title: Option<String>,
    pub price_text: Option<String>,
    pub address: Option<String>,
    pub image: Option<String>,
    pub link: Option<String>,
    pub bedrooms_text: Option<String>,
    pub bathrooms_text: Option<String>,
    pub property_type: Option<PropertyType>,
    pub has_garage: Option<bool>,
    pub description: Option<String>,
    pub listing_date: Option<String>,
}

/// The normalized listing every downstream consumer relies on
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalListing {
    pub id: String,
    pub source: Source,
    pub title: String,
    pub price: Option<u64>,
    pub address: String,
    pub bedrooms: u32,
    pub bathrooms: u32,
    pub property_type: PropertyType,
    pub has_garage: bool,
    pub url: String,
    pub image: String,
    pub location: Option<GeoPoint>,
    pub listing_date: Option<String>,
    pub last_price_change: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CanonicalListing {
    /// Returns a copy of this listing carrying the given coordinates
    pub fn with_location(&self, location: Option<GeoPoint>) -> Self {
        Self {
            location,
            ..self.clone()
        }
    }

    /// A price of zero or none means the listing cannot be acted upon
    pub fn has_price(&self) -> bool {
        matches!(self.price, Some(p) if p > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_type_serializes_kebab_case() {
        let json = serde_json::to_string(&PropertyType::SemiDetached).unwrap();
        assert_eq!(json, "\"semi-detached\"");
    }

    #[test]
    fn canonical_listing_uses_camel_case_keys() {
        let listing = CanonicalListing {
            id: "rightmove-abc".to_string(),
            source: Source::Rightmove,
            title: "t".to_string(),
            price: Some(1),
            address: "a".to_string(),
            bedrooms: 3,
            bathrooms: 2,
            property_type: PropertyType::Other,
            has_garage: false,
            url: "#".to_string(),
            image: "#".to_string(),
            location: None,
            listing_date: None,
            last_price_change: None,
            description: None,
        };
        let value = serde_json::to_value(&listing).unwrap();
        assert!(value.get("propertyType").is_some());
        assert!(value.get("hasGarage").is_some());
        assert!(value.get("lastPriceChange").is_some());
        assert!(value.get("description").is_none());
    }

    #[test]
    fn with_location_leaves_original_untouched() {
        let listing = CanonicalListing {
            id: "x".to_string(),
            source: Source::Zoopla,
            title: "t".to_string(),
            price: Some(0),
            address: "a".to_string(),
            bedrooms: 3,
            bathrooms: 2,
            property_type: PropertyType::Other,
            has_garage: false,
            url: "#".to_string(),
            image: "#".to_string(),
            location: None,
            listing_date: None,
            last_price_change: None,
            description: None,
        };
        let located = listing.with_location(Some(GeoPoint::new(53.0, -0.5)));
        assert!(listing.location.is_none());
        assert_eq!(located.location, Some(GeoPoint::new(53.0, -0.5)));
        assert!(!located.has_price());
    }
}

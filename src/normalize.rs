//! Raw, per-site records to the canonical listing schema.
//!
//! Everything here is pure: the same raw record and policy always give the
//! same listing, and nothing touches the network.

use crate::models::{CanonicalListing, RawListing, Source};
use crate::scrapers::adapter::{classify_property_type, detect_garage};
use chrono::{DateTime, NaiveDate, Utc};
use sha2::{Digest, Sha256};

pub const UNTITLED: &str = "Untitled Property";
pub const NO_ADDRESS: &str = "Address not available";
pub const NO_URL: &str = "#";
pub const NO_IMAGE: &str = "https://via.placeholder.com/300x200?text=No+Image";

/// Defaults applied where the raw record is silent
#[derive(Debug, Clone)]
pub struct NormalizePolicy {
    /// Assumed when the bedroom count is missing, so the listing still meets
    /// the common minimum instead of being excluded outright
    pub default_bedrooms: u32,
    pub default_bathrooms: u32,
    /// Used for `listingDate` when the source gives none
    pub today: NaiveDate,
}

impl Default for NormalizePolicy {
    fn default() -> Self {
        Self {
            default_bedrooms: 3,
            default_bathrooms: 2,
            today: Utc::now().date_naive(),
        }
    }
}

/// Strip every non-digit and parse. Nothing left, or zero, means no price.
pub fn parse_price(text: &str) -> Option<u64> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse::<u64>().ok().filter(|&price| price > 0)
}

/// Leading integer of a fragment like "3", " 4 bed" or "2 baths"
pub fn parse_leading_int(text: &str) -> Option<u32> {
    let digits: String = text
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Source slug plus a short hash of the link; stable across runs
pub fn listing_id(source: Source, link: &str) -> String {
    let digest = Sha256::digest(link.as_bytes());
    format!("{}-{}", source.slug(), &hex::encode(digest)[..12])
}

/// RSS pubDate (RFC 2822) or an ISO date/datetime, reduced to YYYY-MM-DD
pub fn normalize_date(text: &str) -> Option<String> {
    let text = text.trim();
    DateTime::parse_from_rfc2822(text)
        .or_else(|_| DateTime::parse_from_rfc3339(text))
        .map(|dt| dt.date_naive())
        .or_else(|_| NaiveDate::parse_from_str(text, "%Y-%m-%d"))
        .ok()
        .map(|date| date.format("%Y-%m-%d").to_string())
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Map one raw record onto the canonical schema
pub fn normalize(raw: &RawListing, fallback_source: Source, policy: &NormalizePolicy) -> CanonicalListing {
    let source = raw.source.unwrap_or(fallback_source);
    let title = non_empty(&raw.title).unwrap_or(UNTITLED).to_string();
    let link = non_empty(&raw.link);

    let property_type = raw
        .property_type
        .unwrap_or_else(|| classify_property_type(&title));
    let has_garage = raw.has_garage.unwrap_or_else(|| detect_garage(&title));

    // A dated source (the RSS feed) dates both the listing and its last price change
    let source_date = non_empty(&raw.listing_date).and_then(normalize_date);
    let listing_date = source_date
        .clone()
        .unwrap_or_else(|| policy.today.format("%Y-%m-%d").to_string());

    CanonicalListing {
        id: listing_id(source, link.unwrap_or(NO_URL)),
        source,
        price: non_empty(&raw.price_text).and_then(parse_price),
        address: non_empty(&raw.address).unwrap_or(NO_ADDRESS).to_string(),
        bedrooms: non_empty(&raw.bedrooms_text)
            .and_then(parse_leading_int)
            .unwrap_or(policy.default_bedrooms),
        bathrooms: non_empty(&raw.bathrooms_text)
            .and_then(parse_leading_int)
            .unwrap_or(policy.default_bathrooms),
        property_type,
        has_garage,
        url: link.unwrap_or(NO_URL).to_string(),
        image: non_empty(&raw.image).unwrap_or(NO_IMAGE).to_string(),
        location: None,
        listing_date: Some(listing_date),
        last_price_change: source_date,
        description: non_empty(&raw.description).map(str::to_string),
        title,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PropertyType;

    fn policy() -> NormalizePolicy {
        NormalizePolicy {
            today: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            ..NormalizePolicy::default()
        }
    }

    fn lincoln_listing() -> RawListing {
        RawListing {
            source: Some(Source::Rightmove),
            title: Some("3 bed detached house with garage".to_string()),
            price_text: Some("£225,000".to_string()),
            address: Some("1 Main St, Lincoln".to_string()),
            link: Some("https://www.rightmove.co.uk/properties/42".to_string()),
            bedrooms_text: Some("3".to_string()),
            bathrooms_text: Some("2".to_string()),
            ..RawListing::default()
        }
    }

    #[test]
    fn price_strips_currency_and_separators() {
        assert_eq!(parse_price("£215,000"), Some(215_000));
        assert_eq!(parse_price("Guide Price £1,250,000"), Some(1_250_000));
        assert_eq!(parse_price("POA"), None);
        assert_eq!(parse_price(""), None);
        assert_eq!(parse_price("£0"), None);
    }

    #[test]
    fn leading_int_tolerates_trailing_text() {
        assert_eq!(parse_leading_int("4"), Some(4));
        assert_eq!(parse_leading_int(" 5 bedrooms"), Some(5));
        assert_eq!(parse_leading_int("Studio"), None);
    }

    #[test]
    fn end_to_end_lincoln_record() {
        let listing = normalize(&lincoln_listing(), Source::Rightmove, &policy());

        assert_eq!(listing.price, Some(225_000));
        assert_eq!(listing.property_type, PropertyType::Detached);
        assert!(listing.has_garage);
        assert_eq!(listing.bedrooms, 3);
        assert_eq!(listing.bathrooms, 2);
        assert_eq!(listing.address, "1 Main St, Lincoln");
        assert_eq!(listing.source, Source::Rightmove);
        assert!(listing.location.is_none());
    }

    #[test]
    fn id_is_deterministic_per_source_and_link() {
        let raw = lincoln_listing();
        let first = normalize(&raw, Source::Rightmove, &policy());
        let second = normalize(&raw, Source::Rightmove, &NormalizePolicy::default());
        assert_eq!(first.id, second.id);
        assert!(first.id.starts_with("rightmove-"));
        assert_eq!(first.id.len(), "rightmove-".len() + 12);

        let other_link = RawListing {
            link: Some("https://www.rightmove.co.uk/properties/43".to_string()),
            ..lincoln_listing()
        };
        assert_ne!(normalize(&other_link, Source::Rightmove, &policy()).id, first.id);
        assert_ne!(listing_id(Source::Zoopla, "https://x/1"), listing_id(Source::Rightmove, "https://x/1"));
    }

    #[test]
    fn empty_record_gets_placeholders_and_policy_defaults() {
        let listing = normalize(&RawListing::default(), Source::Zoopla, &policy());

        assert_eq!(listing.title, UNTITLED);
        assert_eq!(listing.address, NO_ADDRESS);
        assert_eq!(listing.url, NO_URL);
        assert_eq!(listing.image, NO_IMAGE);
        assert_eq!(listing.price, None);
        assert_eq!(listing.bedrooms, 3);
        assert_eq!(listing.bathrooms, 2);
        assert_eq!(listing.property_type, PropertyType::Other);
        assert!(!listing.has_garage);
        assert_eq!(listing.source, Source::Zoopla);
        assert_eq!(listing.listing_date.as_deref(), Some("2026-10-19"));
        assert_eq!(listing.last_price_change, None);
    }

    #[test]
    fn title_classification_prefers_semi_detached() {
        let raw = RawListing {
            title: Some("Semi-detached home, detached garage".to_string()),
            ..RawListing::default()
        };
        let listing = normalize(&raw, Source::OnTheMarket, &policy());
        assert_eq!(listing.property_type, PropertyType::SemiDetached);
        assert!(listing.has_garage);
    }

    #[test]
    fn adapter_derived_fields_take_precedence() {
        let raw = RawListing {
            title: Some("Family home".to_string()),
            property_type: Some(PropertyType::Detached),
            has_garage: Some(true),
            bedrooms_text: Some("four".to_string()),
            ..RawListing::default()
        };
        let listing = normalize(&raw, Source::Zoopla, &policy());
        assert_eq!(listing.property_type, PropertyType::Detached);
        assert!(listing.has_garage);
        assert_eq!(listing.bedrooms, 3);
    }

    #[test]
    fn rss_pub_date_becomes_listing_date() {
        assert_eq!(
            normalize_date("Tue, 14 Oct 2025 09:30:00 GMT").as_deref(),
            Some("2025-10-14")
        );
        assert_eq!(normalize_date("2025-10-01").as_deref(), Some("2025-10-01"));
        assert_eq!(normalize_date("yesterday"), None);

        let raw = RawListing {
            listing_date: Some("Tue, 14 Oct 2025 09:30:00 GMT".to_string()),
            ..RawListing::default()
        };
        let listing = normalize(&raw, Source::Rightmove, &policy());
        assert_eq!(listing.listing_date.as_deref(), Some("2025-10-14"));
        assert_eq!(listing.last_price_change.as_deref(), Some("2025-10-14"));
    }
}

use crate::models::{CanonicalListing, GeoPoint, PropertyType};
use crate::scrapers::types::FilterCriteria;
use tracing::debug;

/// Mean Earth radius in miles
pub const EARTH_RADIUS_MILES: f64 = 3958.8;

/// Great-circle distance between two points, in miles
pub fn haversine_miles(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_MILES * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Why a listing was rejected; the first failing check wins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    PropertyType,
    Garage,
    Bedrooms,
    Bathrooms,
    MissingPrice,
    Price,
    MissingLocation,
    OutsideRadius,
    ExclusionZone,
}

/// Evaluate every criterion against one listing
pub fn check(listing: &CanonicalListing, criteria: &FilterCriteria) -> Result<(), Rejection> {
    let type_wanted = match listing.property_type {
        PropertyType::Detached => criteria.want_detached,
        PropertyType::SemiDetached => criteria.want_semi_detached,
        PropertyType::Other => false,
    };
    if !type_wanted {
        return Err(Rejection::PropertyType);
    }
    if criteria.require_garage && !listing.has_garage {
        return Err(Rejection::Garage);
    }
    if listing.bedrooms < criteria.min_bedrooms {
        return Err(Rejection::Bedrooms);
    }
    if listing.bathrooms < criteria.min_bathrooms {
        return Err(Rejection::Bathrooms);
    }

    let price = listing
        .price
        .filter(|&p| p > 0)
        .ok_or(Rejection::MissingPrice)?;
    if price < criteria.min_price || price > criteria.max_price {
        return Err(Rejection::Price);
    }

    let location = listing.location.ok_or(Rejection::MissingLocation)?;
    if haversine_miles(criteria.center_point, location) > criteria.radius_miles {
        return Err(Rejection::OutsideRadius);
    }
    if criteria
        .exclusion_zones
        .iter()
        .any(|zone| haversine_miles(*zone, location) <= criteria.exclusion_radius_miles)
    {
        return Err(Rejection::ExclusionZone);
    }

    Ok(())
}

pub fn matches(listing: &CanonicalListing, criteria: &FilterCriteria) -> bool {
    check(listing, criteria).is_ok()
}

/// Keep the listings that pass, preserving input order
pub fn apply(listings: Vec<CanonicalListing>, criteria: &FilterCriteria) -> Vec<CanonicalListing> {
    let total = listings.len();
    let kept: Vec<_> = listings
        .into_iter()
        .filter(|listing| match check(listing, criteria) {
            Ok(()) => true,
            Err(reason) => {
                debug!(id = %listing.id, ?reason, "Listing filtered out");
                false
            }
        })
        .collect();
    debug!("Filter kept {} of {} listings", kept.len(), total);
    kept
}

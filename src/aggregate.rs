//! Multi-site aggregation with partial-failure reporting.
//!
//! Each request carries its own targets and criteria. Sites are extracted
//! concurrently up to a fixed limit; a site that fails both fetch tiers is
//! reported in `errors` and never takes the other sites down with it.

use crate::error::{AggregateError, AggregateSiteError, ScrapeError};
use crate::filter;
use crate::geocode::Geocoder;
use crate::models::CanonicalListing;
use crate::normalize::{normalize, NormalizePolicy, NO_ADDRESS, NO_URL};
use crate::scrapers::fallback::{FallbackOrchestrator, SiteExtraction, SiteFailure};
use crate::scrapers::sites;
use crate::scrapers::types::{FilterCriteria, Strategy};
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Concurrent geocoding lookups per batch
pub const GEOCODE_BATCH_SIZE: usize = 5;

#[derive(Debug, Clone)]
pub struct AggregateRequest {
    /// Search URLs, one per site
    pub targets: Vec<String>,
    pub criteria: FilterCriteria,
}

/// Which strategy served a site
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SiteStrategy {
    pub site: String,
    pub strategy: Strategy,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregateResult {
    pub listings: Vec<CanonicalListing>,
    pub errors: Vec<AggregateSiteError>,
    pub strategies: Vec<SiteStrategy>,
}

/// One site's actionable listings after normalization, before criteria filtering
#[derive(Debug, Clone)]
pub struct ScrapeOutcome {
    pub site: &'static str,
    pub strategy: Strategy,
    pub listings: Vec<CanonicalListing>,
    pub trace: Vec<String>,
}

impl ScrapeOutcome {
    pub fn used_fallback(&self) -> bool {
        self.strategy == Strategy::Direct
    }
}

pub struct Aggregator {
    orchestrator: FallbackOrchestrator,
    geocoder: Option<Arc<dyn Geocoder>>,
    max_concurrent_sites: usize,
}

impl Aggregator {
    pub fn new(
        orchestrator: FallbackOrchestrator,
        geocoder: Option<Arc<dyn Geocoder>>,
        max_concurrent_sites: usize,
    ) -> Self {
        Self {
            orchestrator,
            geocoder,
            max_concurrent_sites: max_concurrent_sites.max(1),
        }
    }

    /// Extract and normalize a single site, without geocoding or criteria filtering
    pub async fn scrape(
        &self,
        target: &str,
        cancel: &CancellationToken,
    ) -> Result<ScrapeOutcome, SiteFailure> {
        let extraction = self.orchestrator.run(target, cancel).await?;
        let mut listings = normalize_extraction(&extraction, &NormalizePolicy::default());
        listings.retain(is_actionable);
        Ok(ScrapeOutcome {
            site: extraction.site,
            strategy: extraction.strategy,
            listings,
            trace: extraction.trace,
        })
    }

    /// Run every target, then normalize, locate and filter the combined set
    pub async fn run(
        &self,
        request: &AggregateRequest,
        cancel: &CancellationToken,
    ) -> Result<AggregateResult, AggregateError> {
        if cancel.is_cancelled() {
            return Err(AggregateError::Cancelled);
        }

        info!(
            "Aggregating {} sites, at most {} at a time",
            request.targets.len(),
            self.max_concurrent_sites
        );

        let mut outcomes: Vec<(usize, String, Result<SiteExtraction, SiteFailure>)> =
            stream::iter(request.targets.iter().cloned().enumerate())
                .map(|(index, target)| async move {
                    let outcome = self.orchestrator.run(&target, cancel).await;
                    (index, target, outcome)
                })
                .buffer_unordered(self.max_concurrent_sites)
                .collect()
                .await;
        outcomes.sort_by_key(|(index, _, _)| *index);

        if cancel.is_cancelled() {
            warn!("Aggregation cancelled");
            return Err(AggregateError::Cancelled);
        }

        let policy = NormalizePolicy::default();
        let mut result = AggregateResult::default();
        let mut listings = Vec::new();

        for (_, target, outcome) in outcomes {
            match outcome {
                Ok(extraction) => {
                    result.strategies.push(SiteStrategy {
                        site: extraction.site.to_string(),
                        strategy: extraction.strategy,
                    });
                    listings.extend(normalize_extraction(&extraction, &policy));
                }
                Err(SiteFailure {
                    error: ScrapeError::Cancelled,
                    ..
                }) => return Err(AggregateError::Cancelled),
                Err(failure) => {
                    warn!(target = %target, "Site failed: {}", failure);
                    result.errors.push(AggregateSiteError {
                        site: site_label(&target),
                        message: failure.to_string(),
                    });
                }
            }
        }

        // Drop unactionable listings before spending geocoding lookups on them
        listings.retain(is_actionable);
        let located = self.locate(listings, cancel).await?;
        result.listings = filter::apply(located, &request.criteria);

        info!(
            "Aggregation finished: {} listings, {} site errors",
            result.listings.len(),
            result.errors.len()
        );
        Ok(result)
    }

    async fn locate(
        &self,
        listings: Vec<CanonicalListing>,
        cancel: &CancellationToken,
    ) -> Result<Vec<CanonicalListing>, AggregateError> {
        let Some(geocoder) = &self.geocoder else {
            warn!("No geocoder configured; unlocated listings will be filtered out");
            return Ok(listings);
        };

        let mut located = Vec::with_capacity(listings.len());
        for batch in listings.chunks(GEOCODE_BATCH_SIZE) {
            if cancel.is_cancelled() {
                return Err(AggregateError::Cancelled);
            }
            let resolved = join_all(batch.iter().cloned().map(|listing| async move {
                if listing.location.is_some() || listing.address == NO_ADDRESS {
                    return listing;
                }
                let location = geocoder.locate(&listing.address).await;
                listing.with_location(location)
            }))
            .await;
            located.extend(resolved);
        }
        Ok(located)
    }
}

pub fn normalize_extraction(
    extraction: &SiteExtraction,
    policy: &NormalizePolicy,
) -> Vec<CanonicalListing> {
    extraction
        .listings
        .iter()
        .map(|raw| normalize(raw, extraction.source, policy))
        .collect()
}

/// A listing needs a price and its own link; without a link every card would
/// share the id derived from the placeholder.
pub fn is_actionable(listing: &CanonicalListing) -> bool {
    listing.has_price() && listing.url != NO_URL
}

/// Adapter name when the host is known, else the target itself
fn site_label(target: &str) -> String {
    sites::resolve(target)
        .map(|config| config.name.to_string())
        .unwrap_or_else(|| target.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GeoPoint, PropertyType, RawListing, Source};
    use crate::scrapers::fallback::tests::{FakeFetcher, RIGHTMOVE_PAGE, RIGHTMOVE_UNACTIONABLE_PAGE};
    use crate::scrapers::traits::PageFetcher;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const ON_THE_MARKET_PAGE: &str = r#"
        <main>
        <div class="property-result">
          <a class="property-result-title-link" href="/details/900/">
            <span class="property-result-title-text">3 bedroom semi-detached house</span>
          </a>
          <span class="property-result-price-value">£210,000</span>
          <span class="property-result-address">Newark Road, North Hykeham</span>
          <span>2 bathrooms</span>
        </div>
        </main>
    "#;

    const RIGHTMOVE: &str = "https://www.rightmove.co.uk/property-for-sale/find.html";
    const ZOOPLA: &str = "https://www.zoopla.co.uk/for-sale/property/lincolnshire/";
    const ON_THE_MARKET: &str = "https://www.onthemarket.com/for-sale/property/lincoln/";

    /// Serves pages by host; hosts mapped to `None` fail
    struct HostFetcher {
        strategy: Strategy,
        pages: Vec<(&'static str, Option<&'static str>)>,
    }

    #[async_trait]
    impl PageFetcher for HostFetcher {
        async fn fetch_page(
            &self,
            url: &str,
            _wait_selector: &str,
            _cancel: &CancellationToken,
        ) -> Result<String, ScrapeError> {
            match self.pages.iter().find(|(host, _)| url.contains(host)) {
                Some((_, Some(page))) => Ok(page.to_string()),
                _ => Err(ScrapeError::Status {
                    status: 503,
                    url: url.to_string(),
                }),
            }
        }

        fn strategy(&self) -> Strategy {
            self.strategy
        }
    }

    struct FixedGeocoder {
        point: GeoPoint,
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl Geocoder for FixedGeocoder {
        async fn locate(&self, _address: &str) -> Option<GeoPoint> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Some(self.point)
        }
    }

    fn lincoln_geocoder() -> Arc<FixedGeocoder> {
        Arc::new(FixedGeocoder {
            point: GeoPoint::new(53.2307, -0.5406),
            lookups: AtomicUsize::new(0),
        })
    }

    fn three_site_aggregator(geocoder: Option<Arc<dyn Geocoder>>) -> Aggregator {
        let pages = vec![
            ("rightmove.co.uk", Some(RIGHTMOVE_PAGE)),
            ("zoopla.co.uk", None),
            ("onthemarket.com", Some(ON_THE_MARKET_PAGE)),
        ];
        let primary = Arc::new(HostFetcher {
            strategy: Strategy::Rendered,
            pages: pages.clone(),
        });
        let fallback = Arc::new(HostFetcher {
            strategy: Strategy::Direct,
            pages,
        });
        Aggregator::new(FallbackOrchestrator::new(primary, fallback), geocoder, 2)
    }

    fn request(targets: &[&str]) -> AggregateRequest {
        AggregateRequest {
            targets: targets.iter().map(|t| t.to_string()).collect(),
            criteria: FilterCriteria::default(),
        }
    }

    #[tokio::test]
    async fn one_failing_site_does_not_abort_the_others() {
        let geocoder = lincoln_geocoder();
        let aggregator = three_site_aggregator(Some(geocoder.clone()));

        let result = aggregator
            .run(&request(&[RIGHTMOVE, ZOOPLA, ON_THE_MARKET]), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.listings.len(), 2);
        assert_eq!(result.listings[0].source, Source::Rightmove);
        assert_eq!(result.listings[1].source, Source::OnTheMarket);
        assert_eq!(result.listings[1].property_type, PropertyType::SemiDetached);

        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].site, "zoopla");
        assert!(result.errors[0].message.contains("503"));

        assert_eq!(result.strategies.len(), 2);
        assert_eq!(geocoder.lookups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unlocated_listings_are_filtered_out() {
        let aggregator = three_site_aggregator(None);

        let result = aggregator
            .run(&request(&[RIGHTMOVE, ON_THE_MARKET]), &CancellationToken::new())
            .await
            .unwrap();

        assert!(result.listings.is_empty());
        assert!(result.errors.is_empty());
    }

    #[tokio::test]
    async fn unsupported_target_is_reported_by_url() {
        let aggregator = three_site_aggregator(Some(lincoln_geocoder()));
        let result = aggregator
            .run(&request(&["https://www.example.com/", RIGHTMOVE]), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.listings.len(), 1);
        assert_eq!(result.errors[0].site, "https://www.example.com/");
        assert!(result.errors[0].message.contains("unsupported site"));
    }

    #[tokio::test]
    async fn cancelled_run_reports_cancellation() {
        let aggregator = three_site_aggregator(Some(lincoln_geocoder()));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = aggregator.run(&request(&[RIGHTMOVE]), &cancel).await;
        assert!(matches!(result, Err(AggregateError::Cancelled)));
    }

    /// Holds the fetch open until the run is cancelled
    struct StallingFetcher;

    #[async_trait]
    impl PageFetcher for StallingFetcher {
        async fn fetch_page(
            &self,
            _url: &str,
            _wait_selector: &str,
            cancel: &CancellationToken,
        ) -> Result<String, ScrapeError> {
            cancel.cancelled().await;
            Err(ScrapeError::Cancelled)
        }

        fn strategy(&self) -> Strategy {
            Strategy::Rendered
        }
    }

    #[tokio::test]
    async fn cancellation_during_fetch_aborts_without_fallback() {
        let fallback = Arc::new(FakeFetcher::serving(Strategy::Direct, RIGHTMOVE_PAGE));
        let aggregator = Aggregator::new(
            FallbackOrchestrator::new(Arc::new(StallingFetcher), fallback.clone()),
            Some(lincoln_geocoder()),
            2,
        );

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            aggregator.run(&request(&[RIGHTMOVE, ON_THE_MARKET]), &cancel),
        )
        .await
        .expect("run returns once cancelled");

        assert!(matches!(result, Err(AggregateError::Cancelled)));
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unpriced_and_unlinked_listings_are_dropped_before_geocoding() {
        let fetcher = || HostFetcher {
            strategy: Strategy::Rendered,
            pages: vec![("rightmove.co.uk", Some(RIGHTMOVE_UNACTIONABLE_PAGE))],
        };
        let geocoder = lincoln_geocoder();
        let aggregator = Aggregator::new(
            FallbackOrchestrator::new(Arc::new(fetcher()), Arc::new(fetcher())),
            Some(geocoder.clone()),
            2,
        );

        let result = aggregator
            .run(&request(&[RIGHTMOVE]), &CancellationToken::new())
            .await
            .unwrap();
        assert!(result.listings.is_empty());
        assert_eq!(geocoder.lookups.load(Ordering::SeqCst), 0);

        let outcome = aggregator
            .scrape(RIGHTMOVE, &CancellationToken::new())
            .await
            .unwrap();
        assert!(outcome.listings.is_empty());
    }

    /// Records how many fetches overlap
    struct GaugedFetcher {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl PageFetcher for GaugedFetcher {
        async fn fetch_page(
            &self,
            _url: &str,
            _wait_selector: &str,
            _cancel: &CancellationToken,
        ) -> Result<String, ScrapeError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok("<main></main>".to_string())
        }

        fn strategy(&self) -> Strategy {
            Strategy::Rendered
        }
    }

    #[tokio::test]
    async fn site_concurrency_is_bounded() {
        let gauged = Arc::new(GaugedFetcher {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let fallback = Arc::new(HostFetcher {
            strategy: Strategy::Direct,
            pages: Vec::new(),
        });
        let aggregator = Aggregator::new(
            FallbackOrchestrator::new(gauged.clone(), fallback),
            None,
            2,
        );

        let targets = [RIGHTMOVE, ZOOPLA, ON_THE_MARKET, RIGHTMOVE, ZOOPLA];
        let result = aggregator
            .run(&request(&targets), &CancellationToken::new())
            .await
            .unwrap();

        assert!(result.errors.is_empty());
        assert_eq!(result.strategies.len(), 5);
        assert_eq!(gauged.peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn scrape_returns_normalized_listings_without_criteria_filtering() {
        let aggregator = three_site_aggregator(None);
        let outcome = aggregator
            .scrape(RIGHTMOVE, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.site, "rightmove");
        assert!(!outcome.used_fallback());
        assert_eq!(outcome.listings.len(), 1);
        assert_eq!(outcome.listings[0].price, Some(200_000));
        assert!(outcome.listings[0].location.is_none());
    }

    #[test]
    fn lincoln_record_normalizes_and_passes_filter() {
        let raw = RawListing {
            title: Some("3 bed detached house with garage".to_string()),
            price_text: Some("£225,000".to_string()),
            address: Some("1 Main St, Lincoln".to_string()),
            bedrooms_text: Some("3".to_string()),
            bathrooms_text: Some("2".to_string()),
            ..RawListing::default()
        };
        let listing = normalize(&raw, Source::Rightmove, &NormalizePolicy::default())
            .with_location(Some(GeoPoint::new(53.2307, -0.5406)));

        let criteria = FilterCriteria {
            want_detached: true,
            min_price: 180_000,
            max_price: 230_000,
            min_bedrooms: 3,
            ..FilterCriteria::default()
        };
        assert_eq!(listing.price, Some(225_000));
        assert_eq!(listing.property_type, PropertyType::Detached);
        assert!(listing.has_garage);
        assert!(filter::matches(&listing, &criteria));
    }
}

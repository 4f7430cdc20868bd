use super::adapter::SiteAdapter;
use super::types::PageExtraction;
use tracing::{debug, info};

/// Drive an adapter over page markup and collect every card it yields.
///
/// Field-level problems are recorded in the trace and extraction carries on
/// with the next card.
pub fn extract_page(adapter: &SiteAdapter, page: &str) -> PageExtraction {
    let cards = adapter.locate_cards(page);
    info!("Found {} property cards on {} page", cards.len(), adapter.name());

    let mut extraction = PageExtraction::default();
    extraction
        .trace
        .push(format!("{}: {} cards in {} bytes", adapter.name(), cards.len(), page.len()));

    for (idx, card) in cards.iter().enumerate() {
        let (raw, problems) = adapter.extract(idx, card);
        for problem in problems {
            debug!("{}: {}", adapter.name(), problem);
            extraction.trace.push(format!("{}: {}", adapter.name(), problem));
        }
        extraction.listings.push(raw);
    }

    extraction
}

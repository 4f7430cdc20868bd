//! Registered listing sites.
//!
//! Adding a site means adding a `SiteConfig` here and a host rule in
//! `resolve`; nothing else in the pipeline knows about individual sites.

use super::adapter::{CardPattern, FieldPattern, SiteConfig};
use crate::models::Source;
use url::Url;

pub const RIGHTMOVE: SiteConfig = SiteConfig {
    name: "rightmove",
    source: Source::Rightmove,
    base_url: "https://www.rightmove.co.uk",
    wait_selector: ".propertyCard",
    cards: CardPattern::Blocks {
        start: r#"<div[^>]*\bclass="propertyCard(?:\s[^"]*)?"[^>]*>"#,
        end: r"</main>",
    },
    title: FieldPattern::Regex(r#"<h2[^>]+class="propertyCard-title"[^>]*>([^<]+)</h2>"#),
    price: FieldPattern::Regex(r#"<span[^>]+class="propertyCard-priceValue"[^>]*>([^<]+)</span>"#),
    address: FieldPattern::Regex(r"<address[^>]*>([^<]+)</address>"),
    image: FieldPattern::Regex(r#"<img[^>]+class="propertyCard-img"[^>]+src="([^"]+)""#),
    link: FieldPattern::Regex(r#"<a[^>]+class="propertyCard-link"[^>]+href="([^"]+)""#),
    description: None,
    listing_date: None,
};

pub const ZOOPLA: SiteConfig = SiteConfig {
    name: "zoopla",
    source: Source::Zoopla,
    base_url: "https://www.zoopla.co.uk",
    wait_selector: r#"[data-testid="search-result"]"#,
    cards: CardPattern::Selector(r#"[data-testid="search-result"]"#),
    title: FieldPattern::Css(r#"[data-testid="listing-title"]"#),
    price: FieldPattern::Css(r#"[data-testid="listing-price"]"#),
    address: FieldPattern::Css(r#"[data-testid="listing-address"]"#),
    image: FieldPattern::CssAttr(r#"img[data-testid="listing-image"]"#, "src"),
    link: FieldPattern::CssAttr(r#"a[data-testid="listing-details-link"]"#, "href"),
    description: None,
    listing_date: None,
};

pub const ON_THE_MARKET: SiteConfig = SiteConfig {
    name: "onthemarket",
    source: Source::OnTheMarket,
    base_url: "https://www.onthemarket.com",
    wait_selector: ".property-result",
    cards: CardPattern::Blocks {
        start: r#"<div[^>]*\bclass="property-result"[^>]*>"#,
        end: r"</main>",
    },
    title: FieldPattern::Regex(r#"<span[^>]+class="property-result-title-text"[^>]*>([^<]+)</span>"#),
    price: FieldPattern::Regex(r#"<span[^>]+class="property-result-price-value"[^>]*>([^<]+)</span>"#),
    address: FieldPattern::Regex(r#"<span[^>]+class="property-result-address"[^>]*>([^<]+)</span>"#),
    image: FieldPattern::Regex(r#"<img[^>]+class="property-result-image"[^>]+src="([^"]+)""#),
    link: FieldPattern::Regex(r#"<a[^>]+class="property-result-title-link"[^>]+href="([^"]+)""#),
    description: None,
    listing_date: None,
};

/// Rightmove's RSS search feed. Lower fidelity than the HTML pages: there is
/// no image or structured address, and the price lives in the description.
pub const RIGHTMOVE_RSS: SiteConfig = SiteConfig {
    name: "rightmove-rss",
    source: Source::Rightmove,
    base_url: "https://www.rightmove.co.uk",
    wait_selector: "item",
    cards: CardPattern::Blocks {
        start: r"<item\b[^>]*>",
        end: r"</channel>",
    },
    title: FieldPattern::Regex(r"(?s)<title>\s*(?:<!\[CDATA\[)?(.*?)(?:\]\]>)?\s*</title>"),
    price: FieldPattern::Regex(r"((?:£|&pound;|&#163;)\s*[\d,]+)"),
    address: FieldPattern::Regex(
        r"(?s)<description>\s*(?:<!\[CDATA\[)?\s*(.*?)\s*(?:<br|&lt;br|\]\]>|</description>)",
    ),
    image: FieldPattern::Regex(r#"<enclosure[^>]+url="([^"]+)""#),
    link: FieldPattern::Regex(r"(?s)<link>\s*(.*?)\s*</link>"),
    description: Some(FieldPattern::Regex(
        r"(?s)<description>\s*(?:<!\[CDATA\[)?(.*?)(?:\]\]>)?\s*</description>",
    )),
    listing_date: Some(FieldPattern::Regex(r"<pubDate>\s*([^<]+?)\s*</pubDate>")),
};

/// Every configured adapter, for listing in diagnostics
pub const ALL: [SiteConfig; 4] = [RIGHTMOVE, ZOOPLA, ON_THE_MARKET, RIGHTMOVE_RSS];

/// Pick the site configuration for a search URL by its host
pub fn resolve(target: &str) -> Option<SiteConfig> {
    let url = Url::parse(target).ok()?;
    let host = url.host_str()?.to_lowercase();
    let matches = |domain: &str| host == domain || host.ends_with(&format!(".{}", domain));

    if matches("rightmove.co.uk") {
        if url.path().starts_with("/rss/") {
            Some(RIGHTMOVE_RSS)
        } else {
            Some(RIGHTMOVE)
        }
    } else if matches("zoopla.co.uk") {
        Some(ZOOPLA)
    } else if matches("onthemarket.com") {
        Some(ON_THE_MARKET)
    } else {
        None
    }
}

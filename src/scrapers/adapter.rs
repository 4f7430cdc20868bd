//! Per-site card location and field extraction.
//!
//! Sites come in two markup idioms. Some render a grid of cards that a CSS
//! selector picks out of the DOM; others emit flat runs of class-named `<div>`
//! blocks that are easier to cut with a start pattern and read with regexes.
//! A `SiteConfig` names one of the two shapes and the per-field patterns;
//! `SiteAdapter` compiles it once and does the work.

use crate::error::{ParseError, ScrapeError};
use crate::models::{PropertyType, RawListing, Source};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::debug;
use url::Url;

static BEDROOMS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*bed").unwrap());
static BATHROOMS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*bath").unwrap());
static SEMI_DETACHED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)semi[- ]?detached").unwrap());
static DETACHED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)detached").unwrap());
static GARAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)garage|parking|driveway").unwrap());
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// How cards are found on a page
#[derive(Debug, Clone, Copy)]
pub enum CardPattern {
    /// Every element matching a CSS selector is one card
    Selector(&'static str),
    /// A card runs from one `start` match to the next, or to `end`
    Blocks {
        start: &'static str,
        end: &'static str,
    },
}

/// How one field is read out of a card
#[derive(Debug, Clone, Copy)]
pub enum FieldPattern {
    /// Text content of the first element matching the selector
    Css(&'static str),
    /// Attribute of the first element matching the selector
    CssAttr(&'static str, &'static str),
    /// First capture group of a regex run over the card markup
    Regex(&'static str),
}

/// Static description of one listing site
#[derive(Debug, Clone, Copy)]
pub struct SiteConfig {
    pub name: &'static str,
    pub source: Source,
    pub base_url: &'static str,
    /// CSS selector the rendered fetcher waits for before reading the page
    pub wait_selector: &'static str,
    pub cards: CardPattern,
    pub title: FieldPattern,
    pub price: FieldPattern,
    pub address: FieldPattern,
    pub image: FieldPattern,
    pub link: FieldPattern,
    pub description: Option<FieldPattern>,
    pub listing_date: Option<FieldPattern>,
}

enum Locator {
    Selector(Selector),
    Blocks { start: Regex, end: Regex },
}

enum Field {
    Css {
        selector: Selector,
        attr: Option<&'static str>,
    },
    Pattern(Regex),
}

/// One listing's markup fragment, plus its flattened text
#[derive(Debug, Clone)]
pub struct Card {
    pub html: String,
    pub text: String,
}

/// A compiled site configuration ready to run over page markup
pub struct SiteAdapter {
    config: SiteConfig,
    locator: Locator,
    title: Field,
    price: Field,
    address: Field,
    image: Field,
    link: Field,
    description: Option<Field>,
    listing_date: Option<Field>,
}

impl SiteAdapter {
    pub fn new(config: SiteConfig) -> Result<Self, ScrapeError> {
        let locator = match config.cards {
            CardPattern::Selector(css) => Locator::Selector(compile_selector(css)?),
            CardPattern::Blocks { start, end } => Locator::Blocks {
                start: compile_regex(start)?,
                end: compile_regex(end)?,
            },
        };

        Ok(Self {
            locator,
            title: compile_field(config.title)?,
            price: compile_field(config.price)?,
            address: compile_field(config.address)?,
            image: compile_field(config.image)?,
            link: compile_field(config.link)?,
            description: config.description.map(compile_field).transpose()?,
            listing_date: config.listing_date.map(compile_field).transpose()?,
            config,
        })
    }

    /// Resolve the adapter for a search URL from its host
    pub fn for_url(target: &str) -> Result<Self, ScrapeError> {
        let config = super::sites::resolve(target).ok_or_else(|| ScrapeError::UnsupportedSite {
            target: target.to_string(),
        })?;
        Self::new(config)
    }

    pub fn name(&self) -> &'static str {
        self.config.name
    }

    pub fn source(&self) -> Source {
        self.config.source
    }

    pub fn wait_selector(&self) -> &'static str {
        self.config.wait_selector
    }

    /// Find every card on the page. No cards is a valid, empty result.
    pub fn locate_cards(&self, page: &str) -> Vec<Card> {
        match &self.locator {
            Locator::Selector(selector) => {
                let document = Html::parse_document(page);
                document
                    .select(selector)
                    .map(|element| Card {
                        html: element.html(),
                        text: element_text(&element),
                    })
                    .collect()
            }
            Locator::Blocks { start, end } => {
                let starts: Vec<usize> = start.find_iter(page).map(|m| m.start()).collect();
                starts
                    .iter()
                    .enumerate()
                    .map(|(i, &from)| {
                        let next = starts.get(i + 1).copied().unwrap_or(page.len());
                        let until = end
                            .find_at(page, from)
                            .map(|m| m.start())
                            .filter(|&pos| pos < next)
                            .unwrap_or(next);
                        let html = &page[from..until];
                        Card {
                            html: html.to_string(),
                            text: markup_text(html),
                        }
                    })
                    .collect()
            }
        }
    }

    /// Read one field out of a card. A missing node gives `None`, never an error.
    fn extract_field(&self, card: &Card, field: &Field) -> Option<String> {
        let value = match field {
            Field::Css { selector, attr } => {
                let fragment = Html::parse_fragment(&card.html);
                let element = fragment.select(selector).next()?;
                match attr {
                    Some(name) => element.value().attr(name).map(str::to_string),
                    None => Some(element_text(&element)),
                }
            }
            Field::Pattern(regex) => regex
                .captures(&card.html)
                .and_then(|caps| caps.get(1))
                .map(|m| markup_text(m.as_str())),
        }?;

        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    /// Build a raw listing from one card. Missing required fields are reported
    /// as `ParseError`s but the listing is still returned.
    pub fn extract(&self, index: usize, card: &Card) -> (RawListing, Vec<ParseError>) {
        let title = self.extract_field(card, &self.title);
        let price_text = self.extract_field(card, &self.price);
        let link = self
            .extract_field(card, &self.link)
            .map(|href| absolutize(self.config.base_url, &href));

        let mut problems = Vec::new();
        for (field, value) in [("title", &title), ("price", &price_text), ("link", &link)] {
            if value.is_none() {
                problems.push(ParseError { card: index, field });
            }
        }

        let raw = RawListing {
            source: Some(self.config.source),
            title,
            price_text,
            address: self.extract_field(card, &self.address),
            image: self
                .extract_field(card, &self.image)
                .map(|src| absolutize(self.config.base_url, &src)),
            link,
            bedrooms_text: derive_bedrooms(&card.text),
            bathrooms_text: derive_bathrooms(&card.text),
            property_type: Some(classify_property_type(&card.text)),
            has_garage: Some(detect_garage(&card.text)),
            description: self
                .description
                .as_ref()
                .and_then(|field| self.extract_field(card, field)),
            listing_date: self
                .listing_date
                .as_ref()
                .and_then(|field| self.extract_field(card, field)),
        };

        debug!(
            site = self.config.name,
            card = index,
            title = raw.title.as_deref().unwrap_or(""),
            "Extracted card"
        );

        (raw, problems)
    }
}

/// Bedroom count fragment, e.g. "4" from "4 bed detached house"
pub fn derive_bedrooms(text: &str) -> Option<String> {
    first_capture(&BEDROOMS, text)
}

pub fn derive_bathrooms(text: &str) -> Option<String> {
    first_capture(&BATHROOMS, text)
}

/// Semi-detached is tested first; "semi-detached" also contains "detached".
pub fn classify_property_type(text: &str) -> PropertyType {
    if SEMI_DETACHED.is_match(text) {
        PropertyType::SemiDetached
    } else if DETACHED.is_match(text) {
        PropertyType::Detached
    } else {
        PropertyType::Other
    }
}

pub fn detect_garage(text: &str) -> bool {
    GARAGE.is_match(text)
}

fn first_capture(regex: &Regex, text: &str) -> Option<String> {
    regex
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn element_text(element: &ElementRef) -> String {
    let text = element.text().collect::<Vec<_>>().join(" ");
    collapse_whitespace(&text)
}

/// Flatten a markup fragment to text: unwrap CDATA, drop tags, decode entities
fn markup_text(html: &str) -> String {
    let unwrapped = html.replace("<![CDATA[", "").replace("]]>", "");
    let stripped = TAG.replace_all(&unwrapped, " ");
    collapse_whitespace(&decode_entities(&stripped))
}

fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&pound;", "£")
        .replace("&#163;", "£")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Resolve a possibly-relative href against the site's base URL
fn absolutize(base: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    Url::parse(base)
        .and_then(|base| base.join(href))
        .map(|url| url.to_string())
        .unwrap_or_else(|_| href.to_string())
}

fn compile_selector(css: &'static str) -> Result<Selector, ScrapeError> {
    Selector::parse(css).map_err(|e| ScrapeError::Adapter(format!("invalid selector '{}': {:?}", css, e)))
}

fn compile_regex(pattern: &'static str) -> Result<Regex, ScrapeError> {
    Regex::new(pattern).map_err(|e| ScrapeError::Adapter(format!("invalid pattern '{}': {}", pattern, e)))
}

fn compile_field(pattern: FieldPattern) -> Result<Field, ScrapeError> {
    Ok(match pattern {
        FieldPattern::Css(css) => Field::Css {
            selector: compile_selector(css)?,
            attr: None,
        },
        FieldPattern::CssAttr(css, attr) => Field::Css {
            selector: compile_selector(css)?,
            attr: Some(attr),
        },
        FieldPattern::Regex(pattern) => Field::Pattern(compile_regex(pattern)?),
    })
}

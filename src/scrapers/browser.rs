use crate::config::BrowserConfig;
use crate::error::ScrapeError;
use crate::scrapers::traits::PageFetcher;
use crate::scrapers::types::Strategy;
use async_trait::async_trait;
use headless_chrome::protocol::cdp::Network;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::collections::HashMap;
use std::thread;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Sub-resources that never carry listing data
const BLOCKED_URL_PATTERNS: &[&str] = &[
    "*.png", "*.jpg", "*.jpeg", "*.gif", "*.webp", "*.avif", "*.svg", "*.ico", "*.css",
    "*.woff", "*.woff2", "*.ttf", "*.otf", "*.mp4", "*.webm", "*.mp3",
];

/// Longest single blocking wait for the card selector between cancellation checks
const WAIT_SLICE: Duration = Duration::from_secs(1);

/// Page fetcher that renders the page in headless Chrome.
///
/// Cancellation returns immediately, but the blocking session only notices it
/// between CDP steps: within `WAIT_SLICE` while waiting for cards, or up to
/// the navigation timeout while a navigation is in flight.
pub struct RenderedFetcher {
    settings: BrowserConfig,
}

impl RenderedFetcher {
    pub fn new(settings: BrowserConfig) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl PageFetcher for RenderedFetcher {
    async fn fetch_page(
        &self,
        url: &str,
        wait_selector: &str,
        cancel: &CancellationToken,
    ) -> Result<String, ScrapeError> {
        let settings = self.settings.clone();
        let user_agent = pick_user_agent(&settings.user_agents).to_string();
        let url = url.to_string();
        let wait_selector = wait_selector.to_string();
        let token = cancel.clone();

        info!("Rendering {} in headless Chrome", url);

        let task = tokio::task::spawn_blocking(move || {
            render_page(&settings, &user_agent, &url, &wait_selector, &token)
        });

        // On cancellation the blocking task notices the token at its next
        // checkpoint and drops its browser.
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ScrapeError::Cancelled),
            joined = task => joined.map_err(|e| ScrapeError::Browser(format!("render task failed: {}", e)))?,
        }
    }

    fn strategy(&self) -> Strategy {
        Strategy::Rendered
    }
}

/// Uniform random choice from the user-agent pool
pub fn pick_user_agent(pool: &[String]) -> &str {
    if pool.is_empty() {
        return "";
    }
    &pool[fastrand::usize(..pool.len())]
}

fn browser_error(e: impl std::fmt::Display) -> ScrapeError {
    ScrapeError::Browser(e.to_string())
}

fn check_cancelled(cancel: &CancellationToken) -> Result<(), ScrapeError> {
    if cancel.is_cancelled() {
        Err(ScrapeError::Cancelled)
    } else {
        Ok(())
    }
}

/// One browser session per call. The `Browser` is dropped, and its Chrome
/// process killed, on every return path.
fn render_page(
    settings: &BrowserConfig,
    user_agent: &str,
    url: &str,
    wait_selector: &str,
    cancel: &CancellationToken,
) -> Result<String, ScrapeError> {
    let options = LaunchOptions::default_builder()
        .headless(settings.headless)
        .idle_browser_timeout(
            settings.navigation_timeout() + settings.wait_timeout() + Duration::from_secs(30),
        )
        .build()
        .map_err(|e| ScrapeError::Browser(format!("Failed to build launch options: {}", e)))?;

    let browser = Browser::new(options)
        .map_err(|e| ScrapeError::Browser(format!("Failed to launch Chrome browser: {}", e)))?;
    let tab = browser.new_tab().map_err(browser_error)?;

    tab.set_default_timeout(settings.navigation_timeout());
    tab.set_user_agent(user_agent, Some("en-US,en;q=0.9"), None)
        .map_err(browser_error)?;

    let mut headers = HashMap::new();
    headers.insert("Accept-Language", "en-US,en;q=0.9");
    headers.insert(
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8",
    );
    headers.insert("Upgrade-Insecure-Requests", "1");
    tab.set_extra_http_headers(headers).map_err(browser_error)?;

    tab.call_method(Network::SetBlockedURLs {
        urls: BLOCKED_URL_PATTERNS.iter().map(|p| p.to_string()).collect(),
    })
    .map_err(browser_error)?;

    check_cancelled(cancel)?;

    debug!("Navigating to {}", url);
    tab.navigate_to(url)
        .and_then(|tab| tab.wait_until_navigated())
        .map_err(|e| ScrapeError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    check_cancelled(cancel)?;

    wait_for_cards(&tab, wait_selector, settings.wait_timeout(), cancel)?;

    let travelled = auto_scroll(&tab, settings, cancel)?;
    debug!("Scrolled {}px to trigger lazy-loaded cards", travelled);

    let html = tab.get_content().map_err(browser_error)?;
    if html.is_empty() {
        warn!("Rendered page for {} is empty", url);
    }
    Ok(html)
}

/// Wait for the card selector in short slices so a cancelled run lets go of
/// Chrome promptly instead of sitting out the whole wait timeout.
fn wait_for_cards(
    tab: &Tab,
    wait_selector: &str,
    total: Duration,
    cancel: &CancellationToken,
) -> Result<(), ScrapeError> {
    for slice in WaitSlices::new(total, WAIT_SLICE) {
        check_cancelled(cancel)?;
        if tab
            .wait_for_element_with_custom_timeout(wait_selector, slice)
            .is_ok()
        {
            return Ok(());
        }
    }
    Err(ScrapeError::Timeout {
        selector: wait_selector.to_string(),
        seconds: total.as_secs(),
    })
}

/// Splits a total wait into slices no longer than `slice`
#[derive(Debug)]
pub struct WaitSlices {
    remaining: Duration,
    slice: Duration,
}

impl WaitSlices {
    pub fn new(total: Duration, slice: Duration) -> Self {
        Self {
            remaining: total,
            slice: slice.max(Duration::from_millis(1)),
        }
    }
}

impl Iterator for WaitSlices {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.remaining.is_zero() {
            return None;
        }
        let step = self.remaining.min(self.slice);
        self.remaining -= step;
        Some(step)
    }
}

fn scroll_height(tab: &Tab) -> Result<u64, ScrapeError> {
    let result = tab
        .evaluate("document.body.scrollHeight", false)
        .map_err(browser_error)?;
    Ok(result.value.and_then(|v| v.as_u64()).unwrap_or(0))
}

/// Scroll down in fixed steps until the bottom is reached or the distance
/// ceiling is hit, whichever comes first.
fn auto_scroll(
    tab: &Tab,
    settings: &BrowserConfig,
    cancel: &CancellationToken,
) -> Result<u64, ScrapeError> {
    let mut progress = ScrollProgress::new(settings.scroll_step_px, settings.max_scroll_px);
    let script = format!("window.scrollBy(0, {})", settings.scroll_step_px);

    loop {
        check_cancelled(cancel)?;
        let height = scroll_height(tab)?;
        tab.evaluate(&script, false).map_err(browser_error)?;
        if !progress.advance(height) {
            break;
        }
        thread::sleep(settings.scroll_interval());
    }

    Ok(progress.travelled())
}

/// Distance bookkeeping for the scroll loop, kept apart from the browser so
/// the stop conditions can be checked directly.
#[derive(Debug)]
pub struct ScrollProgress {
    step: u64,
    ceiling: u64,
    travelled: u64,
}

impl ScrollProgress {
    pub fn new(step: u32, ceiling: u32) -> Self {
        Self {
            step: u64::from(step.max(1)),
            ceiling: u64::from(ceiling),
            travelled: 0,
        }
    }

    /// Record one step against the current scroll height. Returns whether
    /// another step should be taken.
    pub fn advance(&mut self, scroll_height: u64) -> bool {
        self.travelled += self.step;
        self.travelled < scroll_height && self.travelled <= self.ceiling
    }

    pub fn travelled(&self) -> u64 {
        self.travelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scroll_stops_at_bottom_of_page() {
        let mut progress = ScrollProgress::new(100, 5000);
        let mut steps = 0;
        while progress.advance(450) {
            steps += 1;
        }
        assert_eq!(steps, 4);
        assert_eq!(progress.travelled(), 500);
    }

    #[test]
    fn scroll_keeps_going_while_page_grows() {
        let mut progress = ScrollProgress::new(100, 5000);
        let mut height = 300;
        let mut steps = 0;
        while progress.advance(height) {
            height += 100;
            steps += 1;
            if steps > 1000 {
                break;
            }
        }
        // An ever-growing page is still bounded by the ceiling
        assert!(progress.travelled() > 5000);
        assert!(progress.travelled() <= 5100);
    }

    #[test]
    fn scroll_ceiling_bounds_infinite_pages() {
        let mut progress = ScrollProgress::new(100, 5000);
        let mut steps = 0;
        while progress.advance(u64::MAX) {
            steps += 1;
        }
        assert_eq!(steps, 50);
    }

    #[test]
    fn card_wait_is_sliced_for_cancellation_checks() {
        let slices: Vec<_> = WaitSlices::new(Duration::from_millis(2500), WAIT_SLICE).collect();
        assert_eq!(
            slices,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(1),
                Duration::from_millis(500)
            ]
        );

        let total: Duration = WaitSlices::new(Duration::from_secs(30), WAIT_SLICE).sum();
        assert_eq!(total, Duration::from_secs(30));
        assert!(WaitSlices::new(Duration::from_secs(30), WAIT_SLICE).all(|s| s <= WAIT_SLICE));
        assert_eq!(WaitSlices::new(Duration::ZERO, WAIT_SLICE).count(), 0);
    }

    #[test]
    fn user_agent_comes_from_pool() {
        let pool = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        for _ in 0..20 {
            assert!(pool.iter().any(|ua| ua == pick_user_agent(&pool)));
        }
        assert_eq!(pick_user_agent(&[]), "");
    }
}

//! Browser-backed list scrape: profile navigation, modal handling and passes
//!
//! Each pass opens the list modal, runs one [`ExtractionSession`] under the
//! retry policy and closes the modal again. Passes repeat until the union is
//! complete enough or the pass budget runs out.

use std::time::Duration;

use chromiumoxide::Page;
use tracing::{debug, info, warn};
use url::Url;

use crate::Config;
use crate::browser::{BrowserError, BrowserResult, wait_for_any, wait_for_element};
use crate::extract::{
    ExtractResult, ExtractionResult, ExtractionSession, ProgressSink, completeness,
    retry_with_backoff,
};
use crate::identifier::Identifier;
use crate::profile::{ListKind, ProfileCounts, parse_count};
use crate::scroll::TerminationReason;
use crate::surface::{ChromiumSurface, SurfaceError};

const PROFILE_HEADER_SELECTOR: &str = "header section";
const MODAL_SELECTOR: &str = "div[role='dialog']";
const CLOSE_SELECTORS: &[&str] = &["svg[aria-label='Close']", "button[aria-label='Close']"];
const CLOSE_BUTTON_TIMEOUT: Duration = Duration::from_secs(2);
const MODAL_OPEN_DELAY: Duration = Duration::from_secs(1);
const MODAL_CLOSE_DELAY: Duration = Duration::from_millis(500);

/// Scrapes a profile's member lists from a browser page
pub struct ListScraper<'a> {
    page: Page,
    config: &'a Config,
    user: Identifier,
}

impl<'a> ListScraper<'a> {
    pub fn new(page: Page, config: &'a Config, user: Identifier) -> Self {
        Self { page, config, user }
    }

    /// `<base_url>/<user>/`
    pub fn profile_url(&self) -> BrowserResult<Url> {
        let base = Url::parse(&self.config.scrape.base_url)
            .map_err(|e| BrowserError::NavigationFailed(format!("bad base URL: {e}")))?;
        base.join(&format!("{}/", self.user))
            .map_err(|e| BrowserError::NavigationFailed(format!("bad profile URL: {e}")))
    }

    pub async fn navigate_to_profile(&self) -> BrowserResult<()> {
        let url = self.profile_url()?;
        info!("Navigating to profile: {}", url);
        self.page
            .goto(url.as_str())
            .await
            .map_err(|e| BrowserError::NavigationFailed(format!("{url}: {e}")))?;
        tokio::time::sleep(self.config.scrape.page_settle()).await;

        wait_for_element(
            &self.page,
            PROFILE_HEADER_SELECTOR,
            self.config.browser.element_timeout(),
        )
        .await?;
        info!("Loaded profile of {}", self.user);
        Ok(())
    }

    async fn on_profile(&self) -> bool {
        match self.page.url().await {
            Ok(Some(current)) => Url::parse(&current)
                .map(|url| {
                    url.path_segments()
                        .and_then(|mut segments| segments.next())
                        .is_some_and(|first| first.eq_ignore_ascii_case(self.user.as_str()))
                })
                .unwrap_or(false),
            _ => false,
        }
    }

    /// Member counts shown on the profile header; unreadable values are 0.
    pub async fn profile_counts(&self) -> ProfileCounts {
        let counts = ProfileCounts {
            followers: self.read_count(ListKind::Followers).await,
            following: self.read_count(ListKind::Following).await,
        };
        info!(
            "Profile shows {} followers, {} following",
            counts.followers, counts.following
        );
        counts
    }

    async fn read_count(&self, kind: ListKind) -> u64 {
        let text = match self.page.find_element(kind.link_selector()).await {
            Ok(link) => link.inner_text().await.ok().flatten(),
            Err(e) => {
                warn!("No {} link on profile: {}", kind, e);
                None
            }
        };
        match text.as_deref().and_then(parse_count) {
            Some(count) => count,
            None => {
                warn!("Could not read {} count from {:?}", kind, text);
                0
            }
        }
    }

    async fn open_modal(&self, kind: ListKind) -> BrowserResult<()> {
        let timeout = self.config.browser.element_timeout();
        let link = wait_for_element(&self.page, &kind.link_selector(), timeout).await?;
        link.click()
            .await
            .map_err(|e| BrowserError::ElementNotFound(format!("{kind} link not clickable: {e}")))?;
        debug!("Clicked {} link", kind);

        tokio::time::sleep(MODAL_OPEN_DELAY).await;
        wait_for_element(&self.page, MODAL_SELECTOR, timeout).await?;
        info!("{} modal opened", kind);
        Ok(())
    }

    /// Close via the close button, falling back to Escape. Never fails.
    async fn close_modal(&self) {
        let clicked = match wait_for_any(&self.page, CLOSE_SELECTORS, CLOSE_BUTTON_TIMEOUT).await {
            Ok((_, button)) => button.click().await.is_ok(),
            Err(_) => false,
        };
        if clicked {
            debug!("Modal closed via close button");
        } else {
            match self.page.find_element("body").await {
                Ok(body) => match body.press_key("Escape").await {
                    Ok(_) => debug!("Modal closed via Escape key"),
                    Err(e) => warn!("Could not close modal: {}", e),
                },
                Err(e) => warn!("Could not close modal: {}", e),
            }
        }
        tokio::time::sleep(MODAL_CLOSE_DELAY).await;
    }

    /// Extract one list, running extra passes while completeness is below the
    /// acceptance ratio.
    pub async fn scrape(
        &self,
        kind: ListKind,
        sink: &dyn ProgressSink,
    ) -> ExtractResult<ExtractionResult> {
        info!("Starting {} scrape for {}", kind, self.user);
        if !self.on_profile().await {
            self.navigate_to_profile().await?;
        }

        let expected = self.profile_counts().await.expected_for(kind);
        let surface = ChromiumSurface::new(self.page.clone());
        let scrape = &self.config.scrape;
        let mut combined: Option<ExtractionResult> = None;

        for pass in 1..=scrape.max_passes {
            let result = self.run_pass(kind, &surface, expected, sink).await?;
            let total = combine(combined.take(), result, expected);

            info!(
                "Pass {}/{}: {}/{} ({:.1}%)",
                pass,
                scrape.max_passes,
                total.identifiers.len(),
                expected,
                total.completeness * 100.0
            );

            let finished = total.termination_reason == TerminationReason::Cancelled
                || total.completeness >= scrape.accept_completeness;
            combined = Some(total);
            if finished || pass == scrape.max_passes {
                break;
            }

            info!("Reopening {} modal for another pass", kind);
            self.navigate_to_profile().await?;
        }

        // max_passes >= 1, so at least one pass ran
        combined.ok_or_else(|| {
            SurfaceError::Unavailable(format!("no {kind} pass was run")).into()
        })
    }

    async fn run_pass(
        &self,
        kind: ListKind,
        surface: &ChromiumSurface,
        expected: u64,
        sink: &dyn ProgressSink,
    ) -> ExtractResult<ExtractionResult> {
        retry_with_backoff(&self.config.retry, move |attempt| async move {
            if attempt > 1 {
                debug!("Retrying {} pass, attempt {}", kind, attempt);
            }
            self.open_modal(kind)
                .await
                .map_err(|e| SurfaceError::Transient(e.to_string()))?;

            let outcome = ExtractionSession::new(surface, &self.config.extraction)
                .subject(Some(self.user.clone()))
                .expected_total(expected)
                .progress(sink)
                .run()
                .await;

            self.close_modal().await;
            outcome
        })
        .await
    }
}

/// Fold one pass into the running union.
fn combine(
    combined: Option<ExtractionResult>,
    next: ExtractionResult,
    expected: u64,
) -> ExtractionResult {
    let Some(mut total) = combined else {
        return next;
    };
    total.identifiers.extend(next.identifiers);
    total.completeness = completeness(total.identifiers.len(), expected);
    total.termination_reason = next.termination_reason;
    total.forward_ticks += next.forward_ticks;
    total.reverse_ticks += next.reverse_ticks;
    total.capture_events += next.capture_events;
    total.reverse_pass_ran |= next.reverse_pass_ran;
    total
}

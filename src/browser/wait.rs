//! Polling for elements rendered after the load event

use std::time::{Duration, Instant};

use chromiumoxide::Page;
use chromiumoxide::element::Element;

use super::{BrowserError, BrowserResult};

const INITIAL_POLL: Duration = Duration::from_millis(100);
const MAX_POLL: Duration = Duration::from_secs(1);

/// Wait for `selector` to match, polling with exponential backoff.
///
/// Polls start at 100ms and double up to 1s between attempts until `timeout`
/// has elapsed.
pub async fn wait_for_element(
    page: &Page,
    selector: &str,
    timeout: Duration,
) -> BrowserResult<Element> {
    wait_for_any(page, &[selector], timeout)
        .await
        .map(|(_, element)| element)
}

/// Wait until any of `selectors` matches; returns the index of the first hit.
pub async fn wait_for_any(
    page: &Page,
    selectors: &[&str],
    timeout: Duration,
) -> BrowserResult<(usize, Element)> {
    let start = Instant::now();
    let mut poll_interval = INITIAL_POLL;

    loop {
        for (index, selector) in selectors.iter().enumerate() {
            if let Ok(element) = page.find_element(*selector).await {
                return Ok((index, element));
            }
        }

        if start.elapsed() >= timeout {
            return Err(BrowserError::ElementNotFound(format!(
                "{} (timeout after {}ms)",
                selectors.join(" | "),
                timeout.as_millis()
            )));
        }

        tokio::time::sleep(poll_interval).await;
        poll_interval = (poll_interval * 2).min(MAX_POLL);
    }
}

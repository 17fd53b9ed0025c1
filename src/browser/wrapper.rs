//! Owned browser process plus its CDP event handler

use chromiumoxide::browser::Browser;
use chromiumoxide::page::Page;
use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{BrowserError, BrowserResult};
use crate::BrowserConfig;

/// Browser and its event handler task
///
/// The handler must be aborted once the browser is no longer used or it runs
/// forever; dropping the wrapper does that.
pub struct BrowserWrapper {
    browser: Browser,
    handler: JoinHandle<()>,
    profile_dir: PathBuf,
}

impl BrowserWrapper {
    pub fn profile_dir(&self) -> &Path {
        &self.profile_dir
    }

    /// Open a new tab at `url`.
    pub async fn open_page(&self, url: &str) -> BrowserResult<Page> {
        let page = self
            .browser
            .new_page(url)
            .await
            .map_err(|e| BrowserError::PageCreationFailed(format!("{url}: {e}")))?;
        info!("Opened page {}", url);
        Ok(page)
    }

    /// The first open tab, or a fresh blank one.
    pub async fn current_page(&self) -> BrowserResult<Page> {
        let pages = self
            .browser
            .pages()
            .await
            .map_err(|e| BrowserError::PageCreationFailed(e.to_string()))?;
        match pages.into_iter().next() {
            Some(page) => Ok(page),
            None => self.open_page("about:blank").await,
        }
    }

    /// Close the browser and wait for the process to exit.
    ///
    /// The profile directory is kept.
    pub async fn shutdown(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Failed to close browser cleanly: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            warn!("Failed to wait for browser exit: {}", e);
        }
    }
}

impl Drop for BrowserWrapper {
    fn drop(&mut self) {
        info!("Dropping BrowserWrapper - aborting handler task");
        self.handler.abort();
    }
}

/// Launch a browser on the configured persistent profile.
pub async fn launch_browser(config: &BrowserConfig) -> BrowserResult<BrowserWrapper> {
    let (browser, handler) = crate::browser_setup::launch_browser(config).await?;
    Ok(BrowserWrapper {
        browser,
        handler,
        profile_dir: config.resolved_profile_dir(),
    })
}

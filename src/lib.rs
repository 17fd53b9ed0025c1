//! Complete member-list extraction from virtualized, infinite-scroll surfaces
//!
//! Drives a scrollable list that only renders what is on screen, reads whatever
//! is rendered each tick, and decides when the collected set is complete.
//! [`extract::ExtractionSession`] is the engine, [`surface::Surface`] the seam
//! to the page, and [`runner::ListScraper`] the browser-backed entry point.

mod browser;
pub mod browser_setup;
pub mod extract;
pub mod identifier;
pub mod profile;
pub mod runner;
pub mod scroll;
pub mod surface;

use anyhow::{Context, ensure};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::scroll::{AdaptiveDelay, TerminationPolicy};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub extraction: ExtractionConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub scrape: ScrapeConfig,

    #[serde(default)]
    pub browser: BrowserConfig,
}

/// Scroll loop, termination and pacing knobs for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Scroll distance per forward tick
    #[serde(default = "default_scroll_increment")]
    pub scroll_increment: f64,

    /// Hard ceiling on forward ticks
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u32,

    #[serde(default = "default_max_no_new_ticks")]
    pub max_no_new_ticks: u32,

    #[serde(default = "default_bottom_tolerance")]
    pub bottom_tolerance: f64,

    #[serde(default = "default_bottom_stall_ticks")]
    pub bottom_stall_ticks: u32,

    #[serde(default = "default_stuck_window")]
    pub stuck_window: usize,

    #[serde(default = "default_stuck_noise")]
    pub stuck_noise: f64,

    #[serde(default = "default_stuck_stall_ticks")]
    pub stuck_stall_ticks: u32,

    /// Margin added around the visible rectangle for viewport reads
    #[serde(default = "default_viewport_margin")]
    pub viewport_margin: f64,

    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Wait after locating the list, before the first scan
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Completeness below which the reverse pass runs
    #[serde(default = "default_reverse_threshold")]
    pub reverse_threshold: f64,

    /// Reverse pass stride as a multiple of `scroll_increment`
    #[serde(default = "default_reverse_multiplier")]
    pub reverse_multiplier: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_retry_max_delay_ms")]
    pub max_delay_ms: u64,
}

/// Multi-pass list scrape settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Sessions to run per list before accepting the union
    #[serde(default = "default_max_passes")]
    pub max_passes: u32,

    /// Completeness at which further passes are skipped
    #[serde(default = "default_accept_completeness")]
    pub accept_completeness: f64,

    /// Wait after navigation and after closing the modal
    #[serde(default = "default_page_settle_ms")]
    pub page_settle_ms: u64,
}

/// Browser launch configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Persistent profile directory; a logged-in session survives restarts
    #[serde(default)]
    pub profile_dir: Option<PathBuf>,

    /// Explicit browser binary, skipping discovery
    #[serde(default)]
    pub executable: Option<PathBuf>,

    #[serde(default = "default_element_timeout_ms")]
    pub element_timeout_ms: u64,

    #[serde(default)]
    pub window: WindowConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_window_width")]
    pub width: u32,

    #[serde(default = "default_window_height")]
    pub height: u32,
}

fn default_scroll_increment() -> f64 {
    150.0
}
fn default_max_ticks() -> u32 {
    800
}
fn default_max_no_new_ticks() -> u32 {
    25
}
fn default_bottom_tolerance() -> f64 {
    10.0
}
fn default_bottom_stall_ticks() -> u32 {
    5
}
fn default_stuck_window() -> usize {
    3
}
fn default_stuck_noise() -> f64 {
    5.0
}
fn default_stuck_stall_ticks() -> u32 {
    3
}
fn default_viewport_margin() -> f64 {
    extract::DEFAULT_MARGIN
}
fn default_min_delay_ms() -> u64 {
    200
}
fn default_max_delay_ms() -> u64 {
    2000
}
fn default_settle_delay_ms() -> u64 {
    1000
}
fn default_reverse_threshold() -> f64 {
    0.98
}
fn default_reverse_multiplier() -> f64 {
    2.0
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    1000
}
fn default_retry_max_delay_ms() -> u64 {
    10_000
}

fn default_base_url() -> String {
    "https://www.instagram.com/".to_string()
}
fn default_max_passes() -> u32 {
    3
}
fn default_accept_completeness() -> f64 {
    0.95
}
fn default_page_settle_ms() -> u64 {
    2000
}

fn default_headless() -> bool {
    false
}
fn default_element_timeout_ms() -> u64 {
    10_000
}
fn default_window_width() -> u32 {
    1280
}
fn default_window_height() -> u32 {
    900
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            scroll_increment: default_scroll_increment(),
            max_ticks: default_max_ticks(),
            max_no_new_ticks: default_max_no_new_ticks(),
            bottom_tolerance: default_bottom_tolerance(),
            bottom_stall_ticks: default_bottom_stall_ticks(),
            stuck_window: default_stuck_window(),
            stuck_noise: default_stuck_noise(),
            stuck_stall_ticks: default_stuck_stall_ticks(),
            viewport_margin: default_viewport_margin(),
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            reverse_threshold: default_reverse_threshold(),
            reverse_multiplier: default_reverse_multiplier(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            max_passes: default_max_passes(),
            accept_completeness: default_accept_completeness(),
            page_settle_ms: default_page_settle_ms(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            profile_dir: None,
            executable: None,
            element_timeout_ms: default_element_timeout_ms(),
            window: WindowConfig::default(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_window_width(),
            height: default_window_height(),
        }
    }
}

impl ExtractionConfig {
    pub fn termination_policy(&self) -> TerminationPolicy {
        TerminationPolicy {
            max_no_new_ticks: self.max_no_new_ticks,
            bottom_tolerance: self.bottom_tolerance,
            bottom_stall_ticks: self.bottom_stall_ticks,
            stuck_window: self.stuck_window,
            stuck_noise: self.stuck_noise,
            stuck_stall_ticks: self.stuck_stall_ticks,
        }
    }

    pub fn adaptive_delay(&self) -> AdaptiveDelay {
        AdaptiveDelay::new(
            Duration::from_millis(self.min_delay_ms),
            Duration::from_millis(self.max_delay_ms),
        )
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Same knobs with every wait set to zero. Handy for simulated surfaces.
    pub fn without_delays(mut self) -> Self {
        self.min_delay_ms = 0;
        self.max_delay_ms = 0;
        self.settle_delay_ms = 0;
        self
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl ScrapeConfig {
    pub fn page_settle(&self) -> Duration {
        Duration::from_millis(self.page_settle_ms)
    }
}

impl BrowserConfig {
    pub fn element_timeout(&self) -> Duration {
        Duration::from_millis(self.element_timeout_ms)
    }

    /// Configured profile directory, or `<data dir>/roster-extract/profile`.
    pub fn resolved_profile_dir(&self) -> PathBuf {
        self.profile_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("roster-extract")
                .join("profile")
        })
    }
}

impl Config {
    /// Reject combinations the engine cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        let ex = &self.extraction;
        ensure!(
            ex.scroll_increment > 0.0,
            "extraction.scroll_increment must be positive"
        );
        ensure!(ex.max_ticks > 0, "extraction.max_ticks must be at least 1");
        ensure!(
            ex.max_no_new_ticks > 0,
            "extraction.max_no_new_ticks must be at least 1"
        );
        ensure!(
            ex.min_delay_ms <= ex.max_delay_ms,
            "extraction.min_delay_ms ({}) exceeds max_delay_ms ({})",
            ex.min_delay_ms,
            ex.max_delay_ms
        );
        ensure!(
            (0.0..=1.0).contains(&ex.reverse_threshold),
            "extraction.reverse_threshold must be within 0..=1"
        );
        ensure!(
            ex.reverse_multiplier > 0.0,
            "extraction.reverse_multiplier must be positive"
        );
        ensure!(
            ex.viewport_margin >= 0.0,
            "extraction.viewport_margin must not be negative"
        );
        ensure!(
            self.retry.max_attempts > 0,
            "retry.max_attempts must be at least 1"
        );
        ensure!(
            self.scrape.max_passes > 0,
            "scrape.max_passes must be at least 1"
        );
        ensure!(
            (0.0..=1.0).contains(&self.scrape.accept_completeness),
            "scrape.accept_completeness must be within 0..=1"
        );
        url::Url::parse(&self.scrape.base_url)
            .with_context(|| format!("scrape.base_url is not a URL: {}", self.scrape.base_url))?;
        Ok(())
    }
}

/// Default config location: `<config dir>/roster-extract/config.yaml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("roster-extract").join("config.yaml"))
}

/// Load config from `path`, or from [`default_config_path`] when `None`.
///
/// A missing default file yields [`Config::default`]; a missing explicit path
/// is an error.
pub fn load_yaml_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let (config_path, explicit) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => match default_config_path() {
            Some(path) => (path, false),
            None => return Ok(Config::default()),
        },
    };

    if config_path.exists() {
        let contents = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;
        Ok(config)
    } else if explicit {
        anyhow::bail!("Config file not found: {}", config_path.display())
    } else {
        Ok(Config::default())
    }
}

pub use browser::{BrowserError, BrowserResult, BrowserWrapper, launch_browser, wait_for_element};
pub use browser_setup::{download_managed_browser, find_browser_executable};
pub use extract::{
    ExtractError, ExtractionResult, ExtractionSession, NoProgress, Phase, Progress, ProgressSink,
};
pub use identifier::{Identifier, normalize};
pub use profile::{ListKind, ProfileCounts, parse_count};
pub use runner::ListScraper;
pub use scroll::TerminationReason;
pub use surface::{ChromiumSurface, SimulatedSurface, SimulationConfig, Surface, SurfaceError};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_thresholds() {
        let config = Config::default();
        assert_eq!(config.extraction.scroll_increment, 150.0);
        assert_eq!(config.extraction.max_ticks, 800);
        assert_eq!(config.extraction.reverse_threshold, 0.98);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.scrape.max_passes, 3);
        assert_eq!(config.extraction.termination_policy(), TerminationPolicy::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let yaml = "extraction:\n  max_ticks: 40\n  min_delay_ms: 0\nbrowser:\n  headless: true\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.extraction.max_ticks, 40);
        assert_eq!(config.extraction.min_delay_ms, 0);
        assert_eq!(config.extraction.max_delay_ms, 2000);
        assert!(config.browser.headless);
        assert_eq!(config.browser.window, WindowConfig::default());
        assert_eq!(config.retry, RetryConfig::default());
    }

    #[test]
    fn validate_rejects_inverted_delays() {
        let mut config = Config::default();
        config.extraction.min_delay_ms = 5000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_ratios_out_of_range() {
        let mut config = Config::default();
        config.scrape.accept_completeness = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.extraction.reverse_threshold = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let path = std::env::temp_dir().join(format!("roster-missing-{}.yaml", uuid::Uuid::new_v4()));
        assert!(load_yaml_config(Some(&path)).is_err());
    }

    #[test]
    fn explicit_file_is_loaded() {
        let path = std::env::temp_dir().join(format!("roster-config-{}.yaml", uuid::Uuid::new_v4()));
        fs::write(&path, "scrape:\n  max_passes: 1\n").unwrap();
        let config = load_yaml_config(Some(&path)).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(config.scrape.max_passes, 1);
    }
}

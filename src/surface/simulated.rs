//! Deterministic in-memory virtualized list
//!
//! Models the behaviors that make the real modal hard to read:
//! - rows load lazily in batches as the bottom is approached
//! - only rows inside the visible area plus a small overscan are rendered
//! - a seeded fraction of rows is "lost" to viewport reads during the first
//!   downward pass (inserted and recycled between two polls); rows become
//!   readable once the list has been scrolled back up
//! - every row entering the render window is an insertion event for installed
//!   capture feeds, lost or not
//! - optionally, a link-free loading footer keeps growing once every row has
//!   loaded
//!
//! Used by the integration tests and handy for exercising the engine without a
//! browser.

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeSet, HashMap};
use std::ops::Range;

use super::{
    Anchor, CaptureDrain, CaptureFeedHandle, Region, ScrollSnapshot, Surface, SurfaceError,
    SurfaceResult,
};

/// Layout and failure knobs for [`SimulatedSurface`]
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Member handles in list order, rendered as `/<handle>/`
    pub members: Vec<String>,
    /// Keep generating `member_NNNNNN` rows past `members` forever
    pub endless: bool,
    pub row_height: f64,
    pub visible_extent: f64,
    /// Rows appended each time the bottom is approached
    pub batch_size: usize,
    /// Rows rendered beyond each edge of the visible area
    pub overscan_rows: usize,
    /// Probability that a row is missed by reads during the first downward pass
    pub forward_loss_rate: f64,
    pub seed: u64,
    /// Render a post link (`/p/<code>/`) beside every member link
    pub noise_links: bool,
    /// Pixels the trailing footer grows on each scroll that reaches the end
    /// of a fully loaded list
    pub footer_growth: f64,
}

impl SimulationConfig {
    pub fn with_members<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            members: members.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// `count` generated members named `member_000000`, `member_000001`, ...
    pub fn numbered(count: usize) -> Self {
        Self::with_members((0..count).map(member_name))
    }

    /// A list that never ends and never stops yielding new rows.
    pub fn endless() -> Self {
        Self {
            endless: true,
            ..Self::default()
        }
    }

    pub fn loss(mut self, rate: f64, seed: u64) -> Self {
        self.forward_loss_rate = rate;
        self.seed = seed;
        self
    }

    pub fn noise_links(mut self, enabled: bool) -> Self {
        self.noise_links = enabled;
        self
    }

    pub fn footer_growth(mut self, pixels: f64) -> Self {
        self.footer_growth = pixels;
        self
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            members: Vec::new(),
            endless: false,
            row_height: 50.0,
            visible_extent: 400.0,
            batch_size: 12,
            overscan_rows: 2,
            forward_loss_rate: 0.0,
            seed: 7,
            noise_links: false,
            footer_growth: 0.0,
        }
    }
}

fn member_name(index: usize) -> String {
    format!("member_{index:06}")
}

/// Offset of the list container inside the page
const VIEWPORT_LEFT: f64 = 0.0;
const VIEWPORT_TOP: f64 = 120.0;
const VIEWPORT_WIDTH: f64 = 400.0;

#[derive(Debug)]
struct Row {
    handle: String,
    lost: bool,
}

#[derive(Debug, Default)]
struct FeedState {
    seen: BTreeSet<String>,
    events: u64,
}

#[derive(Debug)]
struct SimState {
    rows: Vec<Row>,
    loaded: usize,
    footer: f64,
    position: f64,
    rendered: Range<usize>,
    rewound: bool,
    available: bool,
    close_after_scrolls: Option<u64>,
    fail_at_scroll: Option<u64>,
    transient_failures: u32,
    scroll_calls: u64,
    feeds: HashMap<String, FeedState>,
    next_feed: u64,
    protected_rows: usize,
    rng: StdRng,
}

/// In-memory [`Surface`] over a simulated virtualized list
#[derive(Debug)]
pub struct SimulatedSurface {
    config: SimulationConfig,
    state: Mutex<SimState>,
}

impl SimulatedSurface {
    pub fn new(config: SimulationConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let loss = config.forward_loss_rate.clamp(0.0, 1.0);

        // Rows painted before any scrolling are stable; loss only hits rows
        // that flash past while the list moves.
        let protected_rows = Self::window_for(&config, 0.0, usize::MAX).end;

        let rows = config
            .members
            .iter()
            .enumerate()
            .map(|(index, handle)| Row {
                handle: handle.clone(),
                lost: index >= protected_rows && rng.random_bool(loss),
            })
            .collect();

        let mut state = SimState {
            rows,
            loaded: 0,
            footer: 0.0,
            position: 0.0,
            rendered: 0..0,
            rewound: false,
            available: true,
            close_after_scrolls: None,
            fail_at_scroll: None,
            transient_failures: 0,
            scroll_calls: 0,
            feeds: HashMap::new(),
            next_feed: 0,
            protected_rows,
            rng,
        };
        Self::load_batch(&config, &mut state);
        Self::render(&config, &mut state);

        Self {
            config,
            state: Mutex::new(state),
        }
    }

    /// Make the container disappear (or come back).
    pub fn set_available(&self, available: bool) {
        self.state.lock().available = available;
    }

    /// Make the container disappear once `scrolls` scroll commands have run.
    pub fn close_after(&self, scrolls: u64) {
        self.state.lock().close_after_scrolls = Some(scrolls);
    }

    /// Fail scroll command number `scroll` (1-based, counted over the surface's
    /// lifetime) once with a transient error.
    pub fn fail_scroll(&self, scroll: u64) {
        self.state.lock().fail_at_scroll = Some(scroll);
    }

    /// Fail the next `count` scroll or metrics calls with a transient error.
    pub fn fail_next(&self, count: u32) {
        self.state.lock().transient_failures = count;
    }

    /// Listeners currently attached.
    pub fn installed_feeds(&self) -> usize {
        self.state.lock().feeds.len()
    }

    pub fn scroll_calls(&self) -> u64 {
        self.state.lock().scroll_calls
    }

    /// Members the list will ever render (finite lists only).
    pub fn member_count(&self) -> usize {
        self.config.members.len()
    }

    pub fn lost_count(&self) -> usize {
        self.state.lock().rows.iter().filter(|row| row.lost).count()
    }

    fn window_for(config: &SimulationConfig, position: f64, loaded: usize) -> Range<usize> {
        let h = config.row_height.max(1.0);
        let first = ((position / h).floor() as usize).saturating_sub(config.overscan_rows);
        let last = ((position + config.visible_extent) / h).ceil() as usize + config.overscan_rows;
        first.min(loaded)..last.min(loaded)
    }

    fn content_extent(config: &SimulationConfig, state: &SimState) -> f64 {
        state.loaded as f64 * config.row_height + state.footer
    }

    fn load_batch(config: &SimulationConfig, state: &mut SimState) {
        let target = state.loaded + config.batch_size.max(1);
        if config.endless {
            let loss = config.forward_loss_rate.clamp(0.0, 1.0);
            while state.rows.len() < target {
                let index = state.rows.len();
                let lost = index >= state.protected_rows && state.rng.random_bool(loss);
                state.rows.push(Row {
                    handle: member_name(index),
                    lost,
                });
            }
        }
        state.loaded = target.min(state.rows.len());
    }

    fn render(config: &SimulationConfig, state: &mut SimState) {
        let window = Self::window_for(config, state.position, state.loaded);
        let previous = state.rendered.clone();
        for index in window.clone() {
            if previous.contains(&index) {
                continue;
            }
            let hrefs = Self::row_hrefs(config, index, &state.rows[index].handle);
            for feed in state.feeds.values_mut() {
                feed.events += 1;
                feed.seen.extend(hrefs.iter().cloned());
            }
        }
        state.rendered = window;
    }

    fn row_hrefs(config: &SimulationConfig, index: usize, handle: &str) -> Vec<String> {
        let mut hrefs = vec![format!("/{handle}/")];
        if config.noise_links {
            hrefs.push(format!("/p/c{index:x}/"));
        }
        hrefs
    }

    fn viewport(config: &SimulationConfig) -> Region {
        Region::new(VIEWPORT_LEFT, VIEWPORT_TOP, VIEWPORT_WIDTH, config.visible_extent)
    }

    fn snapshot(config: &SimulationConfig, state: &SimState) -> ScrollSnapshot {
        ScrollSnapshot {
            position: state.position,
            content_extent: Self::content_extent(config, state),
            visible_extent: config.visible_extent,
            viewport: Self::viewport(config),
        }
    }

    fn rendered_anchors(config: &SimulationConfig, state: &SimState) -> Vec<Anchor> {
        let mut anchors = Vec::new();
        for index in state.rendered.clone() {
            let row = &state.rows[index];
            if row.lost && !state.rewound {
                continue;
            }
            let row_top = VIEWPORT_TOP + index as f64 * config.row_height - state.position;
            for (slot, href) in Self::row_hrefs(config, index, &row.handle)
                .into_iter()
                .enumerate()
            {
                anchors.push(Anchor {
                    href,
                    region: Region::new(
                        VIEWPORT_LEFT + 60.0 + slot as f64 * 200.0,
                        row_top + 10.0,
                        180.0,
                        config.row_height - 20.0,
                    ),
                });
            }
        }
        anchors
    }

    fn check_available(state: &SimState) -> SurfaceResult<()> {
        if state.available {
            Ok(())
        } else {
            Err(SurfaceError::Unavailable(
                "simulated dialog is closed".to_string(),
            ))
        }
    }

    fn take_failure(state: &mut SimState) -> SurfaceResult<()> {
        if state.transient_failures > 0 {
            state.transient_failures -= 1;
            return Err(SurfaceError::Transient(
                "simulated surface did not respond".to_string(),
            ));
        }
        Ok(())
    }

    fn move_to(&self, state: &mut SimState, target: f64) -> SurfaceResult<ScrollSnapshot> {
        let config = &self.config;
        Self::check_available(state)?;
        Self::take_failure(state)?;

        state.scroll_calls += 1;
        if state.fail_at_scroll == Some(state.scroll_calls) {
            state.fail_at_scroll = None;
            return Err(SurfaceError::Transient(format!(
                "simulated scroll {} timed out",
                state.scroll_calls
            )));
        }
        if state
            .close_after_scrolls
            .is_some_and(|limit| state.scroll_calls > limit)
        {
            state.available = false;
            return Err(SurfaceError::Unavailable(
                "simulated dialog closed while scrolling".to_string(),
            ));
        }

        let max_position = (Self::content_extent(config, state) - config.visible_extent).max(0.0);
        let next = target.clamp(0.0, max_position);
        if next < state.position {
            state.rewound = true;
        }
        state.position = next;

        let near_bottom = state.position + config.visible_extent
            >= Self::content_extent(config, state) - config.row_height;
        if near_bottom {
            if !config.endless && state.loaded == state.rows.len() {
                state.footer += config.footer_growth;
            } else {
                Self::load_batch(config, state);
            }
        }
        Self::render(config, state);
        Ok(Self::snapshot(config, state))
    }
}

#[async_trait]
impl Surface for SimulatedSurface {
    async fn metrics(&self) -> SurfaceResult<ScrollSnapshot> {
        let mut state = self.state.lock();
        Self::check_available(&state)?;
        Self::take_failure(&mut state)?;
        Ok(Self::snapshot(&self.config, &state))
    }

    async fn scroll_by(&self, delta: f64) -> SurfaceResult<ScrollSnapshot> {
        let mut state = self.state.lock();
        let target = state.position + delta;
        self.move_to(&mut state, target)
    }

    async fn scroll_to(&self, position: f64) -> SurfaceResult<ScrollSnapshot> {
        let mut state = self.state.lock();
        self.move_to(&mut state, position)
    }

    async fn anchors_within(&self, region: &Region) -> SurfaceResult<Vec<Anchor>> {
        let state = self.state.lock();
        Self::check_available(&state)?;
        Ok(Self::rendered_anchors(&self.config, &state)
            .into_iter()
            .filter(|anchor| anchor.region.intersects(region))
            .collect())
    }

    async fn anchors_in_subtree(&self) -> SurfaceResult<Vec<Anchor>> {
        let state = self.state.lock();
        Self::check_available(&state)?;
        Ok(Self::rendered_anchors(&self.config, &state))
    }

    async fn install_capture(&self) -> SurfaceResult<CaptureFeedHandle> {
        let mut state = self.state.lock();
        Self::check_available(&state)?;
        state.next_feed += 1;
        let key = format!("sim-feed-{}", state.next_feed);
        state.feeds.insert(key.clone(), FeedState::default());
        Ok(CaptureFeedHandle::new(key))
    }

    async fn drain_capture(&self, handle: &CaptureFeedHandle) -> SurfaceResult<CaptureDrain> {
        let state = self.state.lock();
        let feed = state
            .feeds
            .get(handle.key())
            .ok_or_else(|| SurfaceError::Capture(format!("unknown feed {}", handle.key())))?;
        Ok(CaptureDrain {
            raw: feed.seen.iter().cloned().collect(),
            events: feed.events,
        })
    }

    async fn uninstall_capture(&self, handle: CaptureFeedHandle) -> SurfaceResult<()> {
        let key = handle.release();
        self.state.lock().feeds.remove(&key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lazy_loading_extends_content() {
        let surface = SimulatedSurface::new(SimulationConfig::numbered(100));
        let start = surface.metrics().await.unwrap();
        assert_eq!(start.content_extent, 600.0);
        let after = surface.scroll_by(150.0).await.unwrap();
        assert_eq!(after.position, 150.0);
        assert_eq!(after.content_extent, 1200.0);
    }

    #[tokio::test]
    async fn scrolling_clamps_at_the_end() {
        let surface = SimulatedSurface::new(SimulationConfig::numbered(10));
        let snap = surface.scroll_by(10_000.0).await.unwrap();
        assert_eq!(snap.position, 100.0);
        assert_eq!(snap.position + snap.visible_extent, snap.content_extent);
    }

    #[tokio::test]
    async fn footer_keeps_growing_past_the_last_row() {
        let surface = SimulatedSurface::new(SimulationConfig::numbered(10).footer_growth(8.0));
        let first = surface.scroll_by(10_000.0).await.unwrap();
        assert_eq!(first.position, 100.0);
        assert_eq!(first.content_extent, 508.0);

        let second = surface.scroll_by(150.0).await.unwrap();
        assert_eq!(second.position, 108.0);
        assert_eq!(second.content_extent, 516.0);
        assert_eq!(surface.anchors_in_subtree().await.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn lost_rows_reappear_after_rewind() {
        let surface = SimulatedSurface::new(SimulationConfig::numbered(100).loss(1.0, 1));
        surface.scroll_by(150.0).await.unwrap();
        // Only rows painted before the first scroll survive the forward pass
        assert_eq!(surface.anchors_in_subtree().await.unwrap().len(), 9);

        surface.scroll_to(0.0).await.unwrap();
        surface.scroll_by(150.0).await.unwrap();
        assert_eq!(surface.anchors_in_subtree().await.unwrap().len(), 12);
    }

    #[tokio::test]
    async fn feeds_count_insertions() {
        let surface = SimulatedSurface::new(SimulationConfig::numbered(50));
        let handle = surface.install_capture().await.unwrap();
        surface.scroll_by(150.0).await.unwrap();
        let drain = surface.drain_capture(&handle).await.unwrap();
        assert_eq!(drain.events, 3);
        assert!(drain.raw.contains(&"/member_000010/".to_string()));
        surface.uninstall_capture(handle).await.unwrap();
        assert_eq!(surface.installed_feeds(), 0);
    }

    #[tokio::test]
    async fn closed_dialog_is_unavailable() {
        let surface = SimulatedSurface::new(SimulationConfig::numbered(5));
        surface.set_available(false);
        assert!(surface.metrics().await.unwrap_err().is_unavailable());
    }
}

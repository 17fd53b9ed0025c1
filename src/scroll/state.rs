//! Per-session scroll bookkeeping

use super::ring::RingBuffer;
use crate::surface::ScrollSnapshot;

/// Number of per-tick samples retained by [`ScrollMetrics`]
pub const METRICS_CAPACITY: usize = 10;

/// Position and progress counters for one extraction session
///
/// Updated once per tick by the session driver; never shared.
#[derive(Debug, Clone, Default)]
pub struct ScrollState {
    pub position: f64,
    pub max_position: f64,
    pub content_extent: f64,
    pub visible_extent: f64,
    /// Consecutive ticks that produced no new identifier
    pub no_new_ticks: u32,
    /// Distinct identifiers collected so far
    pub total_found: usize,
    pub ticks: u32,
}

impl ScrollState {
    pub fn apply(&mut self, snapshot: &ScrollSnapshot) {
        self.position = snapshot.position;
        self.max_position = self.max_position.max(snapshot.position);
        self.content_extent = snapshot.content_extent;
        self.visible_extent = snapshot.visible_extent;
    }

    /// Distance between the bottom edge of the visible area and the end of content.
    pub fn distance_to_bottom(&self) -> f64 {
        (self.content_extent - (self.position + self.visible_extent)).max(0.0)
    }

    pub fn is_at_bottom(&self, tolerance: f64) -> bool {
        self.distance_to_bottom() <= tolerance
    }
}

/// Rolling per-tick samples used to tell "still scrolling" from "stuck"
#[derive(Debug, Clone, Default)]
pub struct ScrollMetrics {
    items_added: RingBuffer<usize, METRICS_CAPACITY>,
    position_deltas: RingBuffer<f64, METRICS_CAPACITY>,
}

impl ScrollMetrics {
    pub fn record(&mut self, items_added: usize, position_delta: f64) {
        self.items_added.push(items_added);
        self.position_deltas.push(position_delta);
    }

    /// `true` when each of the last `window` ticks moved no more than `noise`.
    ///
    /// Returns `false` until `window` samples exist.
    pub fn position_stalled(&self, window: usize, noise: f64) -> bool {
        window > 0
            && self.position_deltas.len() >= window
            && self
                .position_deltas
                .recent(window)
                .all(|delta| delta.abs() <= noise)
    }

    /// Items added across the last `window` ticks.
    pub fn recent_items(&self, window: usize) -> usize {
        self.items_added.recent(window).sum()
    }

    /// Position stalled over `window` and none of those ticks added an item.
    pub fn frozen(&self, window: usize, noise: f64) -> bool {
        self.position_stalled(window, noise) && self.recent_items(window) == 0
    }
}

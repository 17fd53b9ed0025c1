//! Termination decisions for the scroll loop
//!
//! A single "no new items" counter is not enough for a virtualized list: rows can
//! stop arriving long before the container stops scrolling (lazy render lag), and
//! the container can stop scrolling while late rows are still painting. The
//! oracle therefore checks three stall signals, most specific first, after the
//! target check.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::state::{ScrollMetrics, ScrollState};
use crate::surface::ScrollSnapshot;

/// Why an extraction session stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// Collected at least as many identifiers as the profile reports
    ReachedTarget,
    /// No new identifiers for the configured number of ticks, or tick ceiling hit
    Stalled,
    /// At the bottom of the container with no new identifiers for a short run
    AtBottomStalled,
    /// The container refuses to scroll further and nothing new is arriving
    ScrollStuck,
    /// The scrollable container could not be located
    SurfaceUnavailable,
    /// The progress sink asked the session to stop
    Cancelled,
}

impl TerminationReason {
    pub fn as_str(self) -> &'static str {
        match self {
            TerminationReason::ReachedTarget => "reached_target",
            TerminationReason::Stalled => "stalled",
            TerminationReason::AtBottomStalled => "at_bottom_stalled",
            TerminationReason::ScrollStuck => "scroll_stuck",
            TerminationReason::SurfaceUnavailable => "surface_unavailable",
            TerminationReason::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thresholds consulted by [`ScrollOracle::should_terminate`]
#[derive(Debug, Clone, PartialEq)]
pub struct TerminationPolicy {
    /// General stall threshold (ticks without a new identifier)
    pub max_no_new_ticks: u32,
    /// How close to the end of content counts as "at the bottom"
    pub bottom_tolerance: f64,
    /// Stall ticks required once the bottom is reached
    pub bottom_stall_ticks: u32,
    /// Number of recent ticks inspected for scroll movement
    pub stuck_window: usize,
    /// Position deltas at or below this are treated as no movement
    pub stuck_noise: f64,
    /// Stall ticks required alongside a frozen position
    pub stuck_stall_ticks: u32,
}

impl Default for TerminationPolicy {
    fn default() -> Self {
        Self {
            max_no_new_ticks: 25,
            bottom_tolerance: 10.0,
            bottom_stall_ticks: 5,
            stuck_window: 3,
            stuck_noise: 5.0,
            stuck_stall_ticks: 3,
        }
    }
}

/// Tracks one scan phase and decides when it should stop
#[derive(Debug, Clone)]
pub struct ScrollOracle {
    policy: TerminationPolicy,
    state: ScrollState,
    metrics: ScrollMetrics,
}

impl ScrollOracle {
    /// Start tracking with `already_found` identifiers collected by earlier phases.
    pub fn new(policy: TerminationPolicy, already_found: usize) -> Self {
        Self {
            policy,
            state: ScrollState {
                total_found: already_found,
                ..ScrollState::default()
            },
            metrics: ScrollMetrics::default(),
        }
    }

    pub fn state(&self) -> &ScrollState {
        &self.state
    }

    /// Record the container metrics observed after a scroll command.
    pub fn update(&mut self, snapshot: &ScrollSnapshot) {
        self.state.apply(snapshot);
    }

    /// Record the outcome of one tick.
    pub fn record_delta(&mut self, items_added: usize, scroll_delta: f64) {
        self.state.ticks += 1;
        self.state.total_found += items_added;
        if items_added == 0 {
            self.state.no_new_ticks += 1;
        } else {
            self.state.no_new_ticks = 0;
        }
        self.metrics.record(items_added, scroll_delta);
    }

    /// `true` once the last `stuck_window` ticks all moved less than the noise floor.
    pub fn position_stalled(&self) -> bool {
        self.metrics
            .position_stalled(self.policy.stuck_window, self.policy.stuck_noise)
    }

    /// Decide whether the phase should stop, and why.
    ///
    /// `expected_total == 0` means the total is unknown and never satisfies the
    /// target check.
    pub fn should_terminate(
        &self,
        expected_total: u64,
        max_no_new_ticks: u32,
    ) -> Option<TerminationReason> {
        let state = &self.state;

        if expected_total > 0 && state.total_found as u64 >= expected_total {
            return Some(TerminationReason::ReachedTarget);
        }
        if state.no_new_ticks >= max_no_new_ticks {
            return Some(TerminationReason::Stalled);
        }
        if state.is_at_bottom(self.policy.bottom_tolerance)
            && state.no_new_ticks >= self.policy.bottom_stall_ticks
        {
            return Some(TerminationReason::AtBottomStalled);
        }
        if self
            .metrics
            .frozen(self.policy.stuck_window, self.policy.stuck_noise)
            && state.no_new_ticks >= self.policy.stuck_stall_ticks
        {
            return Some(TerminationReason::ScrollStuck);
        }
        None
    }
}

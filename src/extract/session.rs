//! One extraction session against an open list surface
//!
//! Phases run strictly in order:
//!
//! 1. **init**: read metrics, wait for the list to settle, install the capture
//!    feed and seed the result with a full-subtree scan.
//! 2. **forward**: scroll down one increment per tick, reading the rows around
//!    the visible window, until the oracle gives a termination reason or the
//!    tick ceiling is hit.
//! 3. **reverse** (conditional): when completeness is below the reverse
//!    threshold, jump back to the top and sweep down again with a larger stride.
//!    Rows recycled before they could be read during the forward pass are
//!    usually rendered again on the way down.
//! 4. **merge**: drain and release the capture feed, take a last full-subtree
//!    scan and union everything, minus the subject.
//!
//! A missing container ends the session with `surface_unavailable` and whatever
//! was collected. Transient failures propagate so the caller's retry policy can
//! start a fresh session; the capture feed is released on every path.

use std::collections::BTreeSet;
use std::ops::ControlFlow;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::capture::CaptureFeed;
use super::merge::{completeness, merge_sets};
use super::progress::{NoProgress, Phase, Progress, ProgressSink};
use super::viewport::ViewportExtractor;
use crate::ExtractionConfig;
use crate::identifier::{Identifier, normalize};
use crate::scroll::{ScrollOracle, TerminationReason};
use crate::surface::{Anchor, ScrollSnapshot, Surface, SurfaceError, SurfaceResult};

/// Ticks between periodic progress log lines
const LOG_EVERY_TICKS: u32 = 25;

/// Outcome of a finished session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub identifiers: BTreeSet<Identifier>,
    /// `identifiers.len() / expected_total`, 1.0 when the total is unknown
    pub completeness: f64,
    pub termination_reason: TerminationReason,
    pub expected_total: u64,
    pub forward_ticks: u32,
    pub reverse_ticks: u32,
    /// Raw insertion events seen by the capture feed
    pub capture_events: u64,
    pub reverse_pass_ran: bool,
}

impl ExtractionResult {
    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }
}

#[derive(Debug, Default)]
struct PassStats {
    forward_ticks: u32,
    reverse_ticks: u32,
    reverse_ran: bool,
}

/// Drives a [`Surface`] through the extraction phases
pub struct ExtractionSession<'a> {
    surface: &'a dyn Surface,
    config: &'a ExtractionConfig,
    sink: &'a dyn ProgressSink,
    subject: Option<Identifier>,
    expected_total: u64,
    extractor: ViewportExtractor,
}

impl<'a> ExtractionSession<'a> {
    pub fn new(surface: &'a dyn Surface, config: &'a ExtractionConfig) -> Self {
        Self {
            surface,
            config,
            sink: &NoProgress,
            subject: None,
            expected_total: 0,
            extractor: ViewportExtractor::new(config.viewport_margin),
        }
    }

    /// Identifier of the profile owning the list; never part of the result.
    pub fn subject(mut self, subject: Option<Identifier>) -> Self {
        self.subject = subject;
        self
    }

    /// Member count the surface claims, 0 when unknown.
    pub fn expected_total(mut self, expected_total: u64) -> Self {
        self.expected_total = expected_total;
        self
    }

    pub fn progress(mut self, sink: &'a dyn ProgressSink) -> Self {
        self.sink = sink;
        self
    }

    pub async fn run(&self) -> SurfaceResult<ExtractionResult> {
        let surface = self.surface;
        let mut found = BTreeSet::new();
        let mut stats = PassStats::default();

        info!(
            "Starting extraction (expected {})",
            self.describe_expected()
        );

        let initial = match surface.metrics().await {
            Ok(snapshot) => snapshot,
            Err(SurfaceError::Unavailable(msg)) => {
                warn!("List container not found at start: {}", msg);
                return Ok(self.finish(
                    found,
                    TerminationReason::SurfaceUnavailable,
                    &stats,
                    0,
                ));
            }
            Err(e) => return Err(e),
        };

        tokio::time::sleep(self.config.settle_delay()).await;

        let feed = match CaptureFeed::install(surface).await {
            Ok(feed) => Some(feed),
            Err(e) if e.is_transient() => return Err(e),
            Err(SurfaceError::Unavailable(msg)) => {
                warn!("List container vanished before capture install: {}", msg);
                return Ok(self.finish(
                    found,
                    TerminationReason::SurfaceUnavailable,
                    &stats,
                    0,
                ));
            }
            Err(e) => {
                warn!("Continuing without capture feed: {}", e);
                None
            }
        };

        let reason = match self.scan(&mut found, initial, &mut stats).await {
            Ok(reason) => reason,
            Err(SurfaceError::Unavailable(msg)) => {
                warn!(
                    "List container lost after {} identifiers: {}",
                    found.len(),
                    msg
                );
                TerminationReason::SurfaceUnavailable
            }
            Err(e) => {
                if let Some(feed) = feed {
                    feed.uninstall(surface).await;
                }
                return Err(e);
            }
        };

        let (merged, capture_events) = self.merge(found, feed).await;
        Ok(self.finish(merged, reason, &stats, capture_events))
    }

    /// INIT scan, forward pass and the optional reverse pass.
    async fn scan(
        &self,
        found: &mut BTreeSet<Identifier>,
        initial: ScrollSnapshot,
        stats: &mut PassStats,
    ) -> SurfaceResult<TerminationReason> {
        let anchors = self.surface.anchors_in_subtree().await?;
        let seeded = self.absorb_anchors(found, &anchors);
        debug!("Initial scan found {} identifiers", seeded);

        if self.report(found.len(), Phase::Init).is_break() {
            info!("Extraction cancelled before scrolling");
            return Ok(TerminationReason::Cancelled);
        }

        let reason = self.forward(found, initial, stats).await?;
        info!(
            "Forward pass ended after {} ticks: {} ({}/{})",
            stats.forward_ticks,
            reason,
            found.len(),
            self.describe_expected()
        );

        let ratio = completeness(found.len(), self.expected_total);
        let wants_reverse = reason != TerminationReason::Cancelled
            && self.expected_total > 0
            && ratio < self.config.reverse_threshold;
        if !wants_reverse {
            return Ok(reason);
        }

        info!(
            "Completeness {:.1}% below {:.1}%, starting reverse pass",
            ratio * 100.0,
            self.config.reverse_threshold * 100.0
        );
        stats.reverse_ran = true;
        let cancelled = match self.reverse(found, stats).await {
            Ok(cancelled) => cancelled,
            // The forward pass already decided why scanning stopped
            Err(SurfaceError::Unavailable(msg)) => {
                warn!(
                    "List container lost during reverse pass with {} identifiers: {}",
                    found.len(),
                    msg
                );
                false
            }
            Err(e) => return Err(e),
        };
        info!(
            "Reverse pass ended after {} ticks with {} identifiers",
            stats.reverse_ticks,
            found.len()
        );

        Ok(if cancelled {
            TerminationReason::Cancelled
        } else {
            reason
        })
    }

    async fn forward(
        &self,
        found: &mut BTreeSet<Identifier>,
        initial: ScrollSnapshot,
        stats: &mut PassStats,
    ) -> SurfaceResult<TerminationReason> {
        let config = self.config;
        let delay = config.adaptive_delay();
        let mut oracle = ScrollOracle::new(config.termination_policy(), found.len());
        oracle.update(&initial);

        for tick in 1..=config.max_ticks {
            let before = oracle.state().position;
            let snapshot = self.surface.scroll_by(config.scroll_increment).await?;
            oracle.update(&snapshot);

            let added = self.read_viewport(found, &snapshot).await?;
            oracle.record_delta(added, snapshot.position - before);
            stats.forward_ticks = tick;

            let flow = self.report(found.len(), Phase::Forward);
            tokio::time::sleep(delay.next(added, oracle.state().no_new_ticks)).await;

            if tick % LOG_EVERY_TICKS == 0 {
                debug!(
                    "Tick {}: {}/{} identifiers, position {:.0}/{:.0}, {} ticks without new",
                    tick,
                    found.len(),
                    self.describe_expected(),
                    snapshot.position,
                    snapshot.content_extent,
                    oracle.state().no_new_ticks
                );
            }

            if flow.is_break() {
                return Ok(TerminationReason::Cancelled);
            }
            if let Some(reason) = oracle.should_terminate(self.expected_total, config.max_no_new_ticks)
            {
                return Ok(reason);
            }
        }

        warn!(
            "Forward pass hit the {} tick ceiling with {} identifiers",
            config.max_ticks,
            found.len()
        );
        Ok(TerminationReason::Stalled)
    }

    /// Returns `true` when the progress sink cancelled the pass.
    async fn reverse(
        &self,
        found: &mut BTreeSet<Identifier>,
        stats: &mut PassStats,
    ) -> SurfaceResult<bool> {
        let config = self.config;
        let delay = config.adaptive_delay();
        let stride = config.scroll_increment * config.reverse_multiplier;

        let top = self.surface.scroll_to(0.0).await?;
        let added = self.read_viewport(found, &top).await?;
        debug!("Reverse pass: {} identifiers at the top", added);

        let mut oracle = ScrollOracle::new(config.termination_policy(), found.len());
        oracle.update(&top);

        for tick in 1..=config.max_ticks / 2 {
            if self.target_reached(found) {
                break;
            }
            let before = oracle.state().position;
            let snapshot = self.surface.scroll_by(stride).await?;
            oracle.update(&snapshot);

            let added = self.read_viewport(found, &snapshot).await?;
            oracle.record_delta(added, snapshot.position - before);
            stats.reverse_ticks = tick;

            let flow = self.report(found.len(), Phase::Reverse);
            tokio::time::sleep(delay.next(added, oracle.state().no_new_ticks)).await;

            if flow.is_break() {
                return Ok(true);
            }
            if oracle.position_stalled() {
                break;
            }
        }
        Ok(false)
    }

    /// Drain and release the feed, take a last full scan, and union everything.
    /// Failing sources are logged and skipped.
    async fn merge(
        &self,
        found: BTreeSet<Identifier>,
        feed: Option<CaptureFeed>,
    ) -> (BTreeSet<Identifier>, u64) {
        let mut sources = vec![found];
        let mut capture_events = 0;

        if let Some(feed) = feed {
            match feed.drain(self.surface).await {
                Ok(report) => {
                    capture_events = report.events;
                    sources.push(report.identifiers);
                }
                Err(e) => warn!("Skipping capture feed at merge: {}", e),
            }
            feed.uninstall(self.surface).await;
        }

        match self.surface.anchors_in_subtree().await {
            Ok(anchors) => sources.push(anchors.iter().filter_map(|a| normalize(&a.href)).collect()),
            Err(e) => warn!("Skipping final scan at merge: {}", e),
        }

        let merged = merge_sets(&sources, self.subject.as_ref());
        debug!(
            "Merged {} sources: {} -> {} identifiers",
            sources.len(),
            sources[0].len(),
            merged.len()
        );
        let _ = self.report(merged.len(), Phase::Merge);
        (merged, capture_events)
    }

    fn finish(
        &self,
        identifiers: BTreeSet<Identifier>,
        reason: TerminationReason,
        stats: &PassStats,
        capture_events: u64,
    ) -> ExtractionResult {
        let ratio = completeness(identifiers.len(), self.expected_total);
        info!(
            "Extraction finished: {} | {} identifiers of {} ({:.1}%) | forward {} ticks, reverse {} ticks{} | {} capture events",
            reason,
            identifiers.len(),
            self.describe_expected(),
            ratio * 100.0,
            stats.forward_ticks,
            stats.reverse_ticks,
            if stats.reverse_ran { "" } else { " (skipped)" },
            capture_events
        );
        ExtractionResult {
            identifiers,
            completeness: ratio,
            termination_reason: reason,
            expected_total: self.expected_total,
            forward_ticks: stats.forward_ticks,
            reverse_ticks: stats.reverse_ticks,
            capture_events,
            reverse_pass_ran: stats.reverse_ran,
        }
    }

    async fn read_viewport(
        &self,
        found: &mut BTreeSet<Identifier>,
        snapshot: &ScrollSnapshot,
    ) -> SurfaceResult<usize> {
        let fresh = self
            .extractor
            .extract(self.surface, &snapshot.viewport, found)
            .await?;
        Ok(self.absorb(found, fresh))
    }

    fn absorb_anchors(&self, found: &mut BTreeSet<Identifier>, anchors: &[Anchor]) -> usize {
        self.absorb(found, anchors.iter().filter_map(|a| normalize(&a.href)))
    }

    /// Insert everything but the subject; returns how many were new.
    fn absorb(
        &self,
        found: &mut BTreeSet<Identifier>,
        ids: impl IntoIterator<Item = Identifier>,
    ) -> usize {
        ids.into_iter()
            .filter(|id| self.subject.as_ref() != Some(id))
            .filter(|id| found.insert(id.clone()))
            .count()
    }

    fn target_reached(&self, found: &BTreeSet<Identifier>) -> bool {
        self.expected_total > 0 && found.len() as u64 >= self.expected_total
    }

    fn report(&self, current: usize, phase: Phase) -> ControlFlow<()> {
        self.sink.report(&Progress {
            current,
            expected: self.expected_total,
            phase,
        })
    }

    fn describe_expected(&self) -> String {
        if self.expected_total == 0 {
            "unknown".to_string()
        } else {
            self.expected_total.to_string()
        }
    }
}

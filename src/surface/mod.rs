//! The list surface the extraction engine drives
//!
//! Everything the engine needs from a rendered list (scroll metrics, scroll
//! commands, anchor reads and a passive insertion listener) is expressed as typed
//! methods on [`Surface`]. [`chromium::ChromiumSurface`] realizes it over CDP;
//! [`simulated::SimulatedSurface`] is a deterministic in-memory virtualized list.

pub mod chromium;
mod scripts;
pub mod simulated;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use chromium::ChromiumSurface;
pub use simulated::{SimulatedSurface, SimulationConfig};

/// Axis-aligned rectangle in surface coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Region {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// Grow the region by `margin` on every side.
    pub fn expand(&self, margin: f64) -> Self {
        Self {
            left: self.left - margin,
            top: self.top - margin,
            width: self.width + 2.0 * margin,
            height: self.height + 2.0 * margin,
        }
    }

    /// `true` when the two regions overlap or touch.
    pub fn intersects(&self, other: &Region) -> bool {
        self.left <= other.right()
            && other.left <= self.right()
            && self.top <= other.bottom()
            && other.top <= self.bottom()
    }
}

/// Scroll metrics of the list container
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrollSnapshot {
    /// Current scroll offset from the top of the content
    pub position: f64,
    /// Total scrollable content height
    pub content_extent: f64,
    /// Height of the visible part of the container
    pub visible_extent: f64,
    /// Container's visible rectangle, in the same coordinates as [`Anchor::region`]
    pub viewport: Region,
}

/// A rendered link-like element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    /// Raw `href` attribute as rendered
    pub href: String,
    /// Bounding rectangle at read time
    pub region: Region,
}

/// Raw insertions accumulated by a capture feed since it was installed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureDrain {
    /// Distinct raw `href` values seen on inserted nodes and their descendants
    pub raw: Vec<String>,
    /// Number of insertion events observed
    pub events: u64,
}

/// Opaque token for a capture listener installed on a surface
///
/// Single use: [`Surface::uninstall_capture`] consumes it. A handle dropped while
/// still armed means the listener leaked into the surface, which is logged.
#[derive(Debug)]
pub struct CaptureFeedHandle {
    key: String,
    armed: bool,
}

impl CaptureFeedHandle {
    /// Wrap the surface-specific listener key. Called by [`Surface`] implementations.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            armed: true,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Mark the listener released and hand back its key.
    pub fn release(mut self) -> String {
        self.armed = false;
        std::mem::take(&mut self.key)
    }
}

impl Drop for CaptureFeedHandle {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!(
                "Capture feed {} dropped without uninstall. \
                 The listener stays attached to the surface until the page is closed.",
                self.key
            );
        }
    }
}

#[derive(Error, Debug)]
pub enum SurfaceError {
    #[error("Scrollable container not found: {0}")]
    Unavailable(String),

    #[error("Surface did not respond: {0}")]
    Transient(String),

    #[error("Capture feed error: {0}")]
    Capture(String),
}

impl SurfaceError {
    /// Whether retrying the whole session may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, SurfaceError::Transient(_))
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, SurfaceError::Unavailable(_))
    }
}

pub type SurfaceResult<T> = Result<T, SurfaceError>;

/// Typed operations over a scrollable, virtualized list container
///
/// Implementations locate the container themselves and return
/// [`SurfaceError::Unavailable`] from any method when it cannot be found.
#[async_trait]
pub trait Surface: Send + Sync {
    /// Read the container's scroll metrics.
    async fn metrics(&self) -> SurfaceResult<ScrollSnapshot>;

    /// Scroll by `delta` units and report the resulting metrics.
    async fn scroll_by(&self, delta: f64) -> SurfaceResult<ScrollSnapshot>;

    /// Scroll to an absolute offset and report the resulting metrics.
    async fn scroll_to(&self, position: f64) -> SurfaceResult<ScrollSnapshot>;

    /// Rendered anchors whose bounds intersect `region`.
    async fn anchors_within(&self, region: &Region) -> SurfaceResult<Vec<Anchor>>;

    /// Every rendered anchor under the container.
    async fn anchors_in_subtree(&self) -> SurfaceResult<Vec<Anchor>>;

    /// Begin observing insertions under the container.
    async fn install_capture(&self) -> SurfaceResult<CaptureFeedHandle>;

    /// Snapshot everything the listener has accumulated so far.
    async fn drain_capture(&self, handle: &CaptureFeedHandle) -> SurfaceResult<CaptureDrain>;

    /// Stop observing and release listener state.
    async fn uninstall_capture(&self, handle: CaptureFeedHandle) -> SurfaceResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expanded_region_catches_near_misses() {
        let viewport = Region::new(0.0, 100.0, 300.0, 400.0);
        let row_below = Region::new(0.0, 550.0, 300.0, 50.0);
        let far_row = Region::new(0.0, 700.0, 300.0, 50.0);
        assert!(!viewport.intersects(&row_below));
        assert!(viewport.expand(100.0).intersects(&row_below));
        assert!(!viewport.expand(100.0).intersects(&far_row));
    }

    #[test]
    fn released_handle_returns_key() {
        let handle = CaptureFeedHandle::new("feed-1");
        assert_eq!(handle.key(), "feed-1");
        assert_eq!(handle.release(), "feed-1");
    }

    #[test]
    fn only_transient_errors_retry() {
        assert!(SurfaceError::Transient("timeout".into()).is_transient());
        assert!(!SurfaceError::Unavailable("no dialog".into()).is_transient());
        assert!(!SurfaceError::Capture("missing".into()).is_transient());
    }
}

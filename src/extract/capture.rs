//! Passive insertion listener with scoped release

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::identifier::{Identifier, normalize};
use crate::surface::{CaptureFeedHandle, Surface, SurfaceResult};

/// Normalized content of a capture feed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureReport {
    pub identifiers: BTreeSet<Identifier>,
    /// Raw insertion events observed by the surface
    pub events: u64,
}

/// An installed capture listener
///
/// Drain any number of times, then [`CaptureFeed::uninstall`] exactly once.
#[derive(Debug)]
pub struct CaptureFeed {
    handle: CaptureFeedHandle,
}

impl CaptureFeed {
    pub async fn install(surface: &dyn Surface) -> SurfaceResult<Self> {
        let handle = surface.install_capture().await?;
        debug!("Capture feed {} installed", handle.key());
        Ok(Self { handle })
    }

    /// Every identifier inserted since install, normalized and deduplicated.
    pub async fn drain(&self, surface: &dyn Surface) -> SurfaceResult<CaptureReport> {
        let drain = surface.drain_capture(&self.handle).await?;
        let identifiers: BTreeSet<Identifier> =
            drain.raw.iter().filter_map(|href| normalize(href)).collect();
        debug!(
            "Capture feed {} drained: {} identifiers from {} raw links, {} events",
            self.handle.key(),
            identifiers.len(),
            drain.raw.len(),
            drain.events
        );
        Ok(CaptureReport {
            identifiers,
            events: drain.events,
        })
    }

    /// Release the listener. Failures are logged, never propagated.
    pub async fn uninstall(self, surface: &dyn Surface) {
        let key = self.handle.key().to_string();
        if let Err(e) = surface.uninstall_capture(self.handle).await {
            warn!("Failed to uninstall capture feed {}: {}", key, e);
        }
    }
}

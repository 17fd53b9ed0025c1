//! Reads identifiers from rows currently rendered near the visible window

use std::collections::BTreeSet;

use crate::identifier::{Identifier, normalize};
use crate::surface::{Anchor, Region, Surface, SurfaceResult};

/// Default margin added around the visible rectangle
pub const DEFAULT_MARGIN: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportExtractor {
    margin: f64,
}

impl ViewportExtractor {
    pub fn new(margin: f64) -> Self {
        Self {
            margin: margin.max(0.0),
        }
    }

    pub fn margin(&self) -> f64 {
        self.margin
    }

    /// New identifiers rendered within `viewport` grown by the margin.
    ///
    /// Anchors reported by the surface are re-checked against the window, so
    /// nothing wholly outside it is returned whatever the surface hands back.
    pub async fn extract(
        &self,
        surface: &dyn Surface,
        viewport: &Region,
        seen: &BTreeSet<Identifier>,
    ) -> SurfaceResult<Vec<Identifier>> {
        let window = viewport.expand(self.margin);
        let anchors = surface.anchors_within(&window).await?;
        Ok(Self::select(&anchors, &window, seen))
    }

    fn select(anchors: &[Anchor], window: &Region, seen: &BTreeSet<Identifier>) -> Vec<Identifier> {
        let mut fresh = BTreeSet::new();
        for anchor in anchors {
            if !anchor.region.intersects(window) {
                continue;
            }
            if let Some(id) = normalize(&anchor.href) {
                if !seen.contains(&id) {
                    fresh.insert(id);
                }
            }
        }
        fresh.into_iter().collect()
    }
}

impl Default for ViewportExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_MARGIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{CaptureDrain, CaptureFeedHandle, ScrollSnapshot, SurfaceError};
    use async_trait::async_trait;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Surface that ignores the requested region and returns every anchor.
    struct FixedLayout {
        anchors: Vec<Anchor>,
    }

    #[async_trait]
    impl Surface for FixedLayout {
        async fn metrics(&self) -> SurfaceResult<ScrollSnapshot> {
            Err(SurfaceError::Unavailable("layout only".into()))
        }
        async fn scroll_by(&self, _delta: f64) -> SurfaceResult<ScrollSnapshot> {
            self.metrics().await
        }
        async fn scroll_to(&self, _position: f64) -> SurfaceResult<ScrollSnapshot> {
            self.metrics().await
        }
        async fn anchors_within(&self, _region: &Region) -> SurfaceResult<Vec<Anchor>> {
            Ok(self.anchors.clone())
        }
        async fn anchors_in_subtree(&self) -> SurfaceResult<Vec<Anchor>> {
            Ok(self.anchors.clone())
        }
        async fn install_capture(&self) -> SurfaceResult<CaptureFeedHandle> {
            Err(SurfaceError::Capture("layout only".into()))
        }
        async fn drain_capture(&self, _handle: &CaptureFeedHandle) -> SurfaceResult<CaptureDrain> {
            Err(SurfaceError::Capture("layout only".into()))
        }
        async fn uninstall_capture(&self, handle: CaptureFeedHandle) -> SurfaceResult<()> {
            handle.release();
            Ok(())
        }
    }

    fn anchor(href: &str, top: f64) -> Anchor {
        Anchor {
            href: href.to_string(),
            region: Region::new(10.0, top, 200.0, 30.0),
        }
    }

    #[tokio::test]
    async fn filters_seen_and_out_of_window() {
        let viewport = Region::new(0.0, 100.0, 300.0, 400.0);
        let surface = FixedLayout {
            anchors: vec![
                anchor("/bob/", 120.0),
                anchor("/carol/?igsh=1", 580.0),
                anchor("/dave/", 900.0),
                anchor("/explore/", 150.0),
                anchor("/erin/", 200.0),
            ],
        };
        let seen: BTreeSet<_> = normalize("erin").into_iter().collect();

        let found = ViewportExtractor::default()
            .extract(&surface, &viewport, &seen)
            .await
            .unwrap();
        let names: Vec<_> = found.iter().map(Identifier::as_str).collect();
        assert_eq!(names, ["bob", "carol"]);
    }

    #[tokio::test]
    async fn empty_container_yields_nothing() {
        let surface = FixedLayout { anchors: vec![] };
        let found = ViewportExtractor::default()
            .extract(&surface, &Region::new(0.0, 0.0, 300.0, 400.0), &BTreeSet::new())
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn never_returns_rows_outside_window_for_random_layouts() {
        let mut rng = StdRng::seed_from_u64(42);
        let extractor = ViewportExtractor::new(100.0);
        for _ in 0..50 {
            let viewport = Region::new(
                rng.random_range(-200.0..200.0),
                rng.random_range(-200.0..600.0),
                rng.random_range(50.0..500.0),
                rng.random_range(50.0..800.0),
            );
            let anchors: Vec<Anchor> = (0..40)
                .map(|i| Anchor {
                    href: format!("/user_{i}/"),
                    region: Region::new(
                        rng.random_range(-1500.0..1500.0),
                        rng.random_range(-1500.0..2500.0),
                        rng.random_range(0.0..300.0),
                        rng.random_range(0.0..80.0),
                    ),
                })
                .collect();
            let surface = FixedLayout {
                anchors: anchors.clone(),
            };
            let window = viewport.expand(100.0);

            let found = extractor
                .extract(&surface, &viewport, &BTreeSet::new())
                .await
                .unwrap();
            for id in &found {
                let source = anchors
                    .iter()
                    .find(|a| normalize(&a.href).as_ref() == Some(id))
                    .unwrap();
                assert!(source.region.intersects(&window));
            }
            let expected = anchors
                .iter()
                .filter(|a| a.region.intersects(&window))
                .count();
            assert_eq!(found.len(), expected);
        }
    }
}

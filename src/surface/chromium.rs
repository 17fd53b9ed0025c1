//! [`Surface`] over a live Chromium page

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide_cdp::cdp::js_protocol::runtime::{CallArgument, CallFunctionOnParams};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use super::{
    Anchor, CaptureDrain, CaptureFeedHandle, Region, ScrollSnapshot, Surface, SurfaceError,
    SurfaceResult, scripts,
};

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    found: bool,
    data: Option<T>,
}

/// Drives the list container inside the currently open dialog of `page`
#[derive(Debug, Clone)]
pub struct ChromiumSurface {
    page: Page,
}

impl ChromiumSurface {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// Evaluate one of the page-side functions with JSON arguments.
    async fn evaluate<T: DeserializeOwned>(
        &self,
        script: &str,
        args: Vec<Value>,
    ) -> SurfaceResult<Envelope<T>> {
        let mut builder = CallFunctionOnParams::builder()
            .function_declaration(script)
            .return_by_value(true)
            .await_promise(true);
        for arg in args {
            builder = builder.argument(CallArgument::builder().value(arg).build());
        }
        let call = builder
            .build()
            .map_err(|e| SurfaceError::Transient(format!("Failed to build call params: {e}")))?;

        self.page
            .evaluate_function(call)
            .await
            .map_err(|e| SurfaceError::Transient(format!("Script evaluation failed: {e}")))?
            .into_value::<Envelope<T>>()
            .map_err(|e| SurfaceError::Transient(format!("Unexpected script result: {e}")))
    }

    /// Like [`Self::evaluate`] but requires the container to exist.
    async fn call<T: DeserializeOwned>(&self, script: &str, args: Vec<Value>) -> SurfaceResult<T> {
        let envelope = self.evaluate::<T>(script, args).await?;
        if !envelope.found {
            return Err(SurfaceError::Unavailable(
                "no scrollable list inside the open dialog".to_string(),
            ));
        }
        envelope
            .data
            .ok_or_else(|| SurfaceError::Transient("script returned no data".to_string()))
    }
}

#[async_trait]
impl Surface for ChromiumSurface {
    async fn metrics(&self) -> SurfaceResult<ScrollSnapshot> {
        self.call(scripts::METRICS, vec![]).await
    }

    async fn scroll_by(&self, delta: f64) -> SurfaceResult<ScrollSnapshot> {
        self.call(scripts::SCROLL_BY, vec![json!(delta)]).await
    }

    async fn scroll_to(&self, position: f64) -> SurfaceResult<ScrollSnapshot> {
        self.call(scripts::SCROLL_TO, vec![json!(position)]).await
    }

    async fn anchors_within(&self, region: &Region) -> SurfaceResult<Vec<Anchor>> {
        self.call(
            scripts::ANCHORS_WITHIN,
            vec![
                json!(region.left),
                json!(region.top),
                json!(region.width),
                json!(region.height),
            ],
        )
        .await
    }

    async fn anchors_in_subtree(&self) -> SurfaceResult<Vec<Anchor>> {
        self.call(scripts::ANCHORS_IN_SUBTREE, vec![]).await
    }

    async fn install_capture(&self) -> SurfaceResult<CaptureFeedHandle> {
        let key = format!("__roster_feed_{}", uuid::Uuid::new_v4().simple());
        let envelope = self
            .evaluate::<Value>(scripts::CAPTURE_INSTALL, vec![json!(key)])
            .await?;
        if !envelope.found {
            return Err(SurfaceError::Unavailable(
                "no scrollable list to observe".to_string(),
            ));
        }
        debug!("Installed capture feed {}", key);
        Ok(CaptureFeedHandle::new(key))
    }

    async fn drain_capture(&self, handle: &CaptureFeedHandle) -> SurfaceResult<CaptureDrain> {
        let envelope = self
            .evaluate::<CaptureDrain>(scripts::CAPTURE_DRAIN, vec![json!(handle.key())])
            .await?;
        match envelope {
            Envelope {
                found: true,
                data: Some(drain),
            } => Ok(drain),
            _ => Err(SurfaceError::Capture(format!(
                "feed {} is no longer attached",
                handle.key()
            ))),
        }
    }

    async fn uninstall_capture(&self, handle: CaptureFeedHandle) -> SurfaceResult<()> {
        let key = handle.release();
        let envelope = self
            .evaluate::<Value>(scripts::CAPTURE_UNINSTALL, vec![json!(key)])
            .await?;
        if !envelope.found {
            debug!("Capture feed {} was already gone", key);
        }
        Ok(())
    }
}

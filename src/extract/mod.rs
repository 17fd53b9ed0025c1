//! The scroll-driven extraction engine

mod capture;
mod merge;
mod progress;
mod retry;
mod session;
mod viewport;

use thiserror::Error;

use crate::browser::BrowserError;
use crate::surface::SurfaceError;

pub use capture::{CaptureFeed, CaptureReport};
pub use merge::{completeness, merge_sets};
pub use progress::{NoProgress, Phase, Progress, ProgressSink};
pub use retry::{backoff_delay, retry_with_backoff};
pub use session::{ExtractionResult, ExtractionSession};
pub use viewport::{DEFAULT_MARGIN, ViewportExtractor};

/// Failures that end a scrape
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Extraction failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: SurfaceError },

    #[error(transparent)]
    Surface(#[from] SurfaceError),

    #[error(transparent)]
    Browser(#[from] BrowserError),
}

pub type ExtractResult<T> = Result<T, ExtractError>;

//! Progress reporting and caller cancellation

use serde::Serialize;
use std::fmt;
use std::ops::ControlFlow;

/// Session phase a progress report was emitted from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Init,
    Forward,
    Reverse,
    Merge,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Init => "init",
            Phase::Forward => "forward",
            Phase::Reverse => "reverse",
            Phase::Merge => "merge",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    /// Distinct identifiers collected so far
    pub current: usize,
    /// Expected total, 0 when unknown
    pub expected: u64,
    pub phase: Phase,
}

/// Receives at most one report per scroll tick.
///
/// Returning [`ControlFlow::Break`] cancels the session once the current tick
/// has finished.
pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: &Progress) -> ControlFlow<()>;
}

impl<F> ProgressSink for F
where
    F: Fn(&Progress) -> ControlFlow<()> + Send + Sync,
{
    fn report(&self, progress: &Progress) -> ControlFlow<()> {
        self(progress)
    }
}

/// Sink that ignores every report
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _progress: &Progress) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

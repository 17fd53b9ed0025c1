//! Scroll tracking, termination policy and pacing

mod delay;
mod oracle;
mod ring;
mod state;

pub use delay::AdaptiveDelay;
pub use oracle::{ScrollOracle, TerminationPolicy, TerminationReason};
pub use ring::RingBuffer;
pub use state::{METRICS_CAPACITY, ScrollMetrics, ScrollState};

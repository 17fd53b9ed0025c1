//! Adaptive pacing between scroll ticks
//!
//! The virtualization layer needs time to render after a scroll. Productive ticks
//! sleep close to the floor; empty ticks back off toward the ceiling as the stall
//! counter climbs.

use std::time::Duration;

/// Items per tick at or above which the minimum delay applies
const FAST_TICK_ITEMS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveDelay {
    min: Duration,
    max: Duration,
}

impl AdaptiveDelay {
    /// Bounds are swapped if given in the wrong order.
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// Delay to apply after a tick that added `items_added` identifiers while the
    /// consecutive stall counter reads `no_new_ticks`.
    pub fn next(&self, items_added: usize, no_new_ticks: u32) -> Duration {
        let fraction = if items_added >= FAST_TICK_ITEMS {
            0.0
        } else if items_added >= 5 {
            0.25
        } else if items_added > 0 {
            0.5
        } else {
            (0.5 + f64::from(no_new_ticks) * 0.1).min(1.0)
        };
        self.interpolate(fraction)
    }

    fn interpolate(&self, fraction: f64) -> Duration {
        let span = self.max.saturating_sub(self.min);
        self.min + span.mul_f64(fraction.clamp(0.0, 1.0))
    }
}

impl Default for AdaptiveDelay {
    fn default() -> Self {
        Self::new(Duration::from_millis(200), Duration::from_millis(2000))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn productive_ticks_are_fast() {
        let delay = AdaptiveDelay::default();
        assert_eq!(delay.next(12, 0), delay.min());
        assert!(delay.next(6, 0) < delay.next(1, 0));
    }

    #[test]
    fn stalls_back_off_to_ceiling() {
        let delay = AdaptiveDelay::default();
        let early = delay.next(0, 1);
        let late = delay.next(0, 4);
        assert!(early < late);
        assert_eq!(delay.next(0, 50), delay.max());
    }

    #[test]
    fn bounds_are_ordered_and_zero_is_allowed() {
        let delay = AdaptiveDelay::new(Duration::from_millis(900), Duration::from_millis(100));
        assert_eq!(delay.min(), Duration::from_millis(100));
        let zero = AdaptiveDelay::new(Duration::ZERO, Duration::ZERO);
        assert_eq!(zero.next(0, 30), Duration::ZERO);
    }
}

//! Fixed-capacity ring buffer for per-tick samples
//!
//! # Layout
//! - `head < N` and `len <= N`.
//! - The logical element `i` lives at `(head + i) % N`.
//! - Pushing into a full buffer overwrites the oldest sample.

/// Overwriting ring buffer with inline storage
///
/// Sized at compile time so per-tick bookkeeping stays constant no matter how
/// long a session runs.
#[derive(Debug, Clone)]
pub struct RingBuffer<T, const N: usize> {
    buf: [T; N],
    head: usize,
    len: usize,
}

impl<T: Copy + Default, const N: usize> RingBuffer<T, N> {
    const CAPACITY: usize = {
        assert!(N > 0, "RingBuffer capacity must be > 0");
        N
    };

    pub fn new() -> Self {
        let _ = Self::CAPACITY;
        Self {
            buf: [T::default(); N],
            head: 0,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append a sample, evicting the oldest one when full.
    pub fn push(&mut self, value: T) {
        if self.len < N {
            self.buf[(self.head + self.len) % N] = value;
            self.len += 1;
        } else {
            self.buf[self.head] = value;
            self.head = (self.head + 1) % N;
        }
    }

    /// Iterate the `count` most recent samples, newest first.
    pub fn recent(&self, count: usize) -> impl Iterator<Item = T> + '_ {
        let take = count.min(self.len);
        (0..take).map(move |back| self.buf[(self.head + self.len - 1 - back) % N])
    }
}

impl<T: Copy + Default, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overwrites_oldest_when_full() {
        let mut ring: RingBuffer<u32, 3> = RingBuffer::new();
        for v in 1..=5 {
            ring.push(v);
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.recent(3).collect::<Vec<_>>(), vec![5, 4, 3]);
    }

    #[test]
    fn recent_is_bounded_by_len() {
        let mut ring: RingBuffer<f64, 10> = RingBuffer::new();
        assert!(ring.is_empty());
        ring.push(1.5);
        assert_eq!(ring.recent(5).collect::<Vec<_>>(), vec![1.5]);
        assert_eq!(ring.recent(0).count(), 0);
    }
}

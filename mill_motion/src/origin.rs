//! The write-once machine origin.
//!
//! The co-processor's counters boot at an arbitrary (mid-range) value;
//! the counter snapshot taken at the first readiness signal becomes the
//! origin for the whole run. The sequencer captures it exactly once and
//! the monitor only ever reads it.

use std::sync::{Arc, OnceLock};

use mill_common::types::StepTriple;

/// Shared handle to the once-captured origin counters.
#[derive(Debug, Clone, Default)]
pub struct OriginLatch(Arc<OnceLock<StepTriple>>);

impl OriginLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latch the origin. Returns `false` if it was already captured, in
    /// which case the stored value is left untouched.
    pub fn capture(&self, origin: StepTriple) -> bool {
        self.0.set(origin).is_ok()
    }

    /// The captured origin, if the first readiness signal has been seen.
    pub fn get(&self) -> Option<StepTriple> {
        self.0.get().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        assert_eq!(OriginLatch::new().get(), None);
    }

    #[test]
    fn captures_once() {
        let latch = OriginLatch::new();
        assert!(latch.capture([10, 20, 30]));
        assert!(!latch.capture([99, 99, 99]));
        assert_eq!(latch.get(), Some([10, 20, 30]));
    }

    #[test]
    fn clones_share_the_latch() {
        let latch = OriginLatch::new();
        let reader = latch.clone();
        latch.capture([1, 2, 3]);
        assert_eq!(reader.get(), Some([1, 2, 3]));
    }
}

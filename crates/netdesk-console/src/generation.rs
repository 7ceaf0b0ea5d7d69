//! Latest-request-wins tagging
//!
//! Every fetch takes a [`Generation`] before it starts. When the response
//! arrives it is applied only if no newer fetch was started in the meantime,
//! so a slow response can never overwrite fresher state.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

/// Tag of one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

/// Monotonic request counter shared by a store's fetches
#[derive(Debug, Clone, Default)]
pub struct RequestGeneration {
    latest: Arc<AtomicU64>,
}

impl RequestGeneration {
    /// Fresh counter
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a request, superseding every earlier one
    #[must_use]
    pub fn begin(&self) -> Generation {
        Generation(self.latest.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Whether `generation` is still the newest request
    #[must_use]
    pub fn is_current(&self, generation: Generation) -> bool {
        self.latest.load(Ordering::Acquire) == generation.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_latest_is_current() {
        let counter = RequestGeneration::new();
        let first = counter.begin();
        assert!(counter.is_current(first));

        let second = counter.begin();
        assert!(!counter.is_current(first));
        assert!(counter.is_current(second));
        assert!(second > first);
    }

    #[test]
    fn test_clones_share_the_counter() {
        let counter = RequestGeneration::new();
        let clone = counter.clone();

        let tag = counter.begin();
        let _ = clone.begin();

        assert!(!counter.is_current(tag));
    }
}

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic seconds counter standing in for the host environment's block
/// time. Pools read it for the price accumulators and the delay gate for
/// eta/grace arithmetic; tests advance it explicitly so every timing-
/// sensitive scenario is reproducible.
#[derive(Clone, Default, Debug)]
pub struct LogicalClock(Arc<AtomicU64>);

impl LogicalClock {
    pub fn new(start: u64) -> Self {
        LogicalClock(Arc::new(AtomicU64::new(start)))
    }

    pub fn now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn advance(&self, secs: u64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_is_visible_to_clones() {
        let clock = LogicalClock::new(100);
        let observer = clock.clone();

        clock.advance(42);

        assert_eq!(observer.now(), 142);
    }
}

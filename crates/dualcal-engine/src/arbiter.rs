//! Arbitration of the shared noise source between concurrently running units.
//!
//! All units are fed by one physical noise source, and the driver only
//! guarantees concurrent safety for different frequencies. The arbiter
//! holds one async lock per plan entry; a unit holds the entry's lock for
//! the whole measurement. Units start their walk at staggered offsets, so
//! in the common case they never meet on the same entry.

use tokio::sync::{Mutex, MutexGuard};

/// One lock per frequency plan entry.
#[derive(Debug)]
pub struct NoiseSourceArbiter {
    slots: Vec<Mutex<()>>,
}

impl NoiseSourceArbiter {
    /// Arbiter for a plan of `plan_len` frequencies.
    #[must_use]
    pub fn new(plan_len: usize) -> Self {
        Self {
            slots: (0..plan_len).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Number of plan entries guarded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// `true` when guarding an empty plan.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Wait for exclusive use of plan entry `index`.
    ///
    /// Returns `None` if `index` is outside the plan.
    pub async fn acquire(&self, index: usize) -> Option<MutexGuard<'_, ()>> {
        match self.slots.get(index) {
            Some(slot) => Some(slot.lock().await),
            None => None,
        }
    }

    /// First plan index visited by unit `unit_index` of `unit_count`.
    #[must_use]
    pub fn start_offset(&self, unit_index: usize, unit_count: usize) -> usize {
        if unit_count == 0 || self.slots.is_empty() {
            return 0;
        }
        (unit_index % unit_count) * self.slots.len() / unit_count
    }

    /// Plan indices in visiting order, starting at `start` and wrapping.
    pub fn walk(&self, start: usize) -> impl Iterator<Item = usize> {
        let len = self.slots.len();
        (0..len).map(move |step| (start + step) % len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn offsets_are_spread_across_plan() {
        let arbiter = NoiseSourceArbiter::new(31);
        assert_eq!(arbiter.start_offset(0, 2), 0);
        assert_eq!(arbiter.start_offset(1, 2), 15);

        let arbiter = NoiseSourceArbiter::new(10);
        let offsets: Vec<_> = (0..4).map(|u| arbiter.start_offset(u, 4)).collect();
        assert_eq!(offsets, vec![0, 2, 5, 7]);
    }

    #[test]
    fn walk_wraps_and_visits_each_entry_once() {
        let arbiter = NoiseSourceArbiter::new(5);
        let order: Vec<_> = arbiter.walk(3).collect();
        assert_eq!(order, vec![3, 4, 0, 1, 2]);
        assert_eq!(NoiseSourceArbiter::new(0).walk(0).count(), 0);
    }

    #[tokio::test]
    async fn out_of_range_index_is_none() {
        let arbiter = NoiseSourceArbiter::new(2);
        assert!(arbiter.acquire(2).await.is_none());
        assert!(arbiter.acquire(1).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn same_entry_is_exclusive() {
        let arbiter = Arc::new(NoiseSourceArbiter::new(3));
        let guard = arbiter.acquire(1).await.unwrap();

        let contender = {
            let arbiter = Arc::clone(&arbiter);
            tokio::spawn(async move {
                let _g = arbiter.acquire(1).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!contender.is_finished());

        // A different entry is free while entry 1 is held.
        assert!(arbiter.acquire(2).await.is_some());

        drop(guard);
        contender.await.unwrap();
    }
}

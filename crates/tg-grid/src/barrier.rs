use std::hint;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};

use tracing::warn;

/// Busy-wait iterations before a waiting work-item parks.
const SPIN_LIMIT: u32 = 64;

/// Why a work-item arrives at the barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrival {
    /// An explicit barrier call from the kernel body.
    Sync,
    /// The implicit barrier after a work-item finished the kernel body.
    Retire,
}

/// A barrier phase completed with only part of the group retired: some
/// work-items skipped a barrier their peers were waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Divergence {
    /// Phase in which the mixed arrival was observed.
    pub phase: u64,
    /// Work-items that had already retired in that phase. Zero when the
    /// barrier was aborted from outside.
    pub retired: usize,
}

/// Reusable work-group barrier.
///
/// An atomic arrival counter collects the group. The last work-item to
/// arrive resets the counter and advances the phase counter, which releases
/// every waiter. Each phase is one synchronization point, so a kernel with
/// two barriers per sweep step passes two phases per step. Waiters spin
/// briefly, then park on a condition variable until the phase moves.
///
/// Arrivals are tagged with [`Arrival`]. A phase that collects both kinds
/// means the group's work-items did not execute the same barrier sequence;
/// the barrier is poisoned and every current and future arrival returns
/// [`Divergence`] instead of blocking forever.
#[derive(Debug)]
pub struct GroupBarrier {
    size: usize,
    arrived: AtomicUsize,
    retiring: AtomicUsize,
    phase: AtomicU64,
    poisoned: AtomicBool,
    poison_phase: AtomicU64,
    poison_retired: AtomicUsize,
    park: Mutex<()>,
    wake: Condvar,
}

impl GroupBarrier {
    /// Create a barrier for a group of `size` work-items.
    ///
    /// # Panics
    /// Panics if `size` is zero.
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "barrier group size must be > 0");
        GroupBarrier {
            size,
            arrived: AtomicUsize::new(0),
            retiring: AtomicUsize::new(0),
            phase: AtomicU64::new(0),
            poisoned: AtomicBool::new(false),
            poison_phase: AtomicU64::new(0),
            poison_retired: AtomicUsize::new(0),
            park: Mutex::new(()),
            wake: Condvar::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of completed phases.
    pub fn phase(&self) -> u64 {
        self.phase.load(Ordering::Acquire)
    }

    /// Block until every work-item of the group has called `wait`.
    ///
    /// Returns the phase the group has entered.
    pub fn wait(&self) -> Result<u64, Divergence> {
        self.arrive(Arrival::Sync)
    }

    /// Implicit barrier at the end of a work-item's kernel body.
    pub fn retire(&self) -> Result<u64, Divergence> {
        self.arrive(Arrival::Retire)
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::Acquire)
    }

    /// Poison the barrier from outside the group. Current waiters are
    /// released with an error and every later arrival fails. Used when the
    /// group could not be fully formed.
    pub fn abort(&self) {
        self.poison(self.phase.load(Ordering::Acquire), 0);
    }

    pub fn arrive(&self, kind: Arrival) -> Result<u64, Divergence> {
        if let Some(d) = self.divergence() {
            return Err(d);
        }

        let phase = self.phase.load(Ordering::Acquire);
        if kind == Arrival::Retire {
            self.retiring.fetch_add(1, Ordering::AcqRel);
        }
        let arrived = self.arrived.fetch_add(1, Ordering::AcqRel) + 1;

        if arrived == self.size {
            let retired = self.retiring.swap(0, Ordering::AcqRel);
            if retired != 0 && retired != self.size {
                warn!(phase, retired, size = self.size, "work-group barrier divergence");
                self.poison(phase, retired);
            }
            self.arrived.store(0, Ordering::Relaxed);
            self.phase.store(phase + 1, Ordering::Release);
            self.wake_all();
        } else {
            self.wait_for_phase(phase);
        }

        match self.divergence() {
            Some(d) => Err(d),
            None => Ok(phase + 1),
        }
    }

    fn released(&self, phase: u64) -> bool {
        self.phase.load(Ordering::Acquire) != phase || self.is_poisoned()
    }

    fn wait_for_phase(&self, phase: u64) {
        for _ in 0..SPIN_LIMIT {
            if self.released(phase) {
                return;
            }
            hint::spin_loop();
        }
        // The releasing side updates the atomics before taking the lock, so a
        // waiter that checks under the lock cannot miss the notification.
        let mut guard = self.park.lock().unwrap_or_else(|p| p.into_inner());
        while !self.released(phase) {
            guard = self.wake.wait(guard).unwrap_or_else(|p| p.into_inner());
        }
    }

    fn wake_all(&self) {
        let _guard = self.park.lock().unwrap_or_else(|p| p.into_inner());
        self.wake.notify_all();
    }

    fn poison(&self, phase: u64, retired: usize) {
        self.poison_phase.store(phase, Ordering::Relaxed);
        self.poison_retired.store(retired, Ordering::Relaxed);
        self.poisoned.store(true, Ordering::Release);
        self.wake_all();
    }

    fn divergence(&self) -> Option<Divergence> {
        if self.is_poisoned() {
            Some(Divergence {
                phase: self.poison_phase.load(Ordering::Relaxed),
                retired: self.poison_retired.load(Ordering::Relaxed),
            })
        } else {
            None
        }
    }
}

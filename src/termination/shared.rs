//! Condition-variable based shared termination detection.
//!
//! When a worker runs out of immediate work it must not simply park: another
//! worker may be inserting a task at that exact moment, and a worker that
//! sleeps through the insertion can deadlock the pool, while a pool that
//! declares completion too eagerly drops work on the floor. The detector
//! closes both races by serializing every "observe the queue, then decide"
//! step under one mutex:
//!
//! 1. [`SharedTermination::begin_sleep`] — enters the critical section (and
//!    publishes a lock-free hint that someone is near sleeping).
//! 2. The worker checks the external work queue *while holding the guard*.
//! 3. Queue non-empty → [`SleepCriticalSection::cancel`]; the worker stays
//!    active and goes back to work.
//! 4. Queue empty → [`SleepCriticalSection::end`]; the worker either parks,
//!    or — if it was the last active worker — declares global termination
//!    and wakes everyone.
//!
//! Producers call [`SharedTermination::new_job`] after every insertion; the
//! hint counter lets that call return without locking in the common case
//! where nobody is anywhere near sleeping.
//!
//! Why an empty queue plus a zero active count proves completion: the active
//! count is only decremented inside the critical section, a worker inserting
//! work is by definition active, and queue checks are serialized by the
//! mutex — so when the last active worker sees an empty queue, no insertion
//! can be in flight anywhere.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crossbeam_utils::CachePadded;

use crate::WorkerId;

struct DetectorState {
    /// Workers currently outside the sleep critical section, in `[0, N]`.
    num_active: usize,
    /// Monotonic false -> true within a super-step; cleared only by `reset`.
    done: bool,
}

/// Shared termination detector for a fixed-size worker pool.
///
/// One instance per engine run, shared by all workers (and by whoever
/// produces work). [`reset`](Self::reset) re-arms it between successive
/// synchronous super-steps without reallocation.
pub struct SharedTermination {
    state: Mutex<DetectorState>,
    cond: Condvar,
    /// Workers currently attempting to enter the critical section; a
    /// lock-free fast-path hint for [`new_job`](Self::new_job), never a
    /// correctness input.
    trying_to_sleep: CachePadded<AtomicUsize>,
    /// Per-worker flag, true between `begin_sleep` and the guard's release.
    sleeping: Box<[CachePadded<AtomicBool>]>,
}

impl SharedTermination {
    /// Creates a detector for `num_workers` workers, all initially active.
    ///
    /// Panics if `num_workers` is zero.
    pub fn new(num_workers: usize) -> Self {
        assert!(num_workers > 0, "termination detector needs a worker");
        Self {
            state: Mutex::new(DetectorState {
                num_active: num_workers,
                done: false,
            }),
            cond: Condvar::new(),
            trying_to_sleep: CachePadded::new(AtomicUsize::new(0)),
            sleeping: (0..num_workers)
                .map(|_| CachePadded::new(AtomicBool::new(false)))
                .collect(),
        }
    }

    /// The fixed worker count N.
    pub fn num_workers(&self) -> usize {
        self.sleeping.len()
    }

    fn lock(&self) -> MutexGuard<'_, DetectorState> {
        // A worker that panicked mid-protocol must not wedge the rest of the
        // pool behind a poisoned lock.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enters the sleep critical section for `worker`.
    ///
    /// While the returned guard is alive this worker holds the detector's
    /// lock; the caller must check the external work queue and then resolve
    /// the guard with [`cancel`](SleepCriticalSection::cancel) (work found)
    /// or [`end`](SleepCriticalSection::end) (queue empty).
    pub fn begin_sleep(&self, worker: WorkerId) -> SleepCriticalSection<'_> {
        assert!(
            worker < self.sleeping.len(),
            "worker id {worker} out of range for {} workers",
            self.sleeping.len()
        );
        self.trying_to_sleep.fetch_add(1, Ordering::SeqCst);
        self.sleeping[worker].store(true, Ordering::SeqCst);
        let guard = self.lock();
        SleepCriticalSection {
            detector: self,
            worker,
            guard: Some(guard),
        }
    }

    /// Notifies the detector that work has been enqueued.
    ///
    /// Call after *every* insertion into the work source. Returns without
    /// locking when no worker is attempting to sleep.
    pub fn new_job(&self) {
        if self.trying_to_sleep.load(Ordering::SeqCst) == 0 {
            return;
        }
        self.wake_sleepers();
    }

    /// Like [`new_job`](Self::new_job), for producers that know which
    /// worker's queue received the work: the fast path checks only that
    /// worker's flag instead of the shared hint counter.
    pub fn new_job_hint(&self, worker: WorkerId) {
        if !self.sleeping[worker].load(Ordering::SeqCst) {
            return;
        }
        self.wake_sleepers();
    }

    fn wake_sleepers(&self) {
        let state = self.lock();
        if state.num_active < self.sleeping.len() {
            // Broadcast: a single signal could land on a worker that is
            // about to terminate anyway while a viable one stays parked.
            self.cond.notify_all();
        }
    }

    /// Re-arms the detector for the next super-step: all workers active,
    /// `done` cleared, hint and sleeping flags zeroed.
    ///
    /// Call only while no worker is inside the protocol.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.num_active = self.sleeping.len();
        state.done = false;
        self.trying_to_sleep.store(0, Ordering::SeqCst);
        for flag in &self.sleeping {
            flag.store(false, Ordering::SeqCst);
        }
        drop(state);
        tracing::debug!(num_workers = self.sleeping.len(), "termination detector reset");
    }

    /// Snapshot of the active-worker count, for diagnostics and progress
    /// reporting only; by the time the caller looks at it, it may be stale.
    pub fn num_active(&self) -> usize {
        self.lock().num_active
    }
}

/// The sleep-decision critical section, held between
/// [`SharedTermination::begin_sleep`] and the worker's decision.
///
/// Consuming methods make protocol misordering unrepresentable: there is no
/// way to end a critical section that was never begun, or to resolve one
/// twice. Dropping the guard without deciding behaves like
/// [`cancel`](Self::cancel).
#[must_use = "resolve the critical section with cancel() or end()"]
pub struct SleepCriticalSection<'a> {
    detector: &'a SharedTermination,
    worker: WorkerId,
    guard: Option<MutexGuard<'a, DetectorState>>,
}

impl SleepCriticalSection<'_> {
    /// The worker this critical section belongs to.
    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    /// Leaves the critical section after finding work: the lock is released,
    /// the sleeping flag and hint are cleared, and the active count is left
    /// untouched. The worker goes back to doing work.
    pub fn cancel(self) {
        // Dropping the guard is exactly a cancellation.
    }

    /// Leaves the critical section after observing an empty queue.
    ///
    /// Returns `true` if global termination has been declared (by this call
    /// or a previous one) and the worker may stop. Returns `false` after a
    /// wakeup — whether from [`SharedTermination::new_job`] or spurious — in
    /// which case the worker is active again and must re-attempt the whole
    /// protocol if it still finds nothing to do.
    ///
    /// Blocks while other workers remain active and no work appears; the
    /// wait is always bounded by either a termination declaration or a
    /// `new_job` broadcast.
    pub fn end(mut self) -> bool {
        let mut guard = self.guard.take().expect("guard held until resolution");

        // Workers arriving after termination was declared exit without
        // touching the active count.
        if guard.done {
            return true;
        }

        guard.num_active -= 1;

        if guard.num_active == 0 {
            // This worker is the last active one and it just observed an
            // empty queue under the lock, which proves global completion:
            // any inserting worker would still be counted active.
            guard.done = true;
            tracing::debug!(worker = self.worker, "global termination declared");
            self.detector.cond.notify_all();
        } else {
            tracing::trace!(worker = self.worker, "worker parked");
            guard = self
                .detector
                .cond
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
            tracing::trace!(worker = self.worker, done = guard.done, "worker woke");
            if !guard.done {
                // Optimistic re-arm: resume as active and let the caller
                // re-run the protocol.
                guard.num_active += 1;
            }
        }

        guard.done
        // `guard` unlocks here, then `self`'s Drop clears the sleeping flag
        // and the hint, mirroring the order they were set in `begin_sleep`.
    }
}

impl Drop for SleepCriticalSection<'_> {
    fn drop(&mut self) {
        // Release the lock before clearing the flags so a producer that sees
        // the flags set can always make progress on the lock.
        self.guard = None;
        self.detector.sleeping[self.worker].store(false, Ordering::SeqCst);
        self.detector.trying_to_sleep.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_leaves_active_count_alone() {
        let term = SharedTermination::new(2);
        let cs = term.begin_sleep(0);
        cs.cancel();
        assert_eq!(term.num_active(), 2);
    }

    #[test]
    fn drop_behaves_like_cancel() {
        let term = SharedTermination::new(2);
        {
            let _cs = term.begin_sleep(1);
        }
        assert_eq!(term.num_active(), 2);
        // Flags must be clear again or the next begin would double-count.
        let cs = term.begin_sleep(1);
        cs.cancel();
        assert_eq!(term.num_active(), 2);
    }

    #[test]
    fn single_worker_terminates_immediately() {
        let term = SharedTermination::new(1);
        let cs = term.begin_sleep(0);
        assert!(cs.end(), "the only worker seeing an empty queue is done");
        assert_eq!(term.num_active(), 0);
    }

    #[test]
    fn late_arrival_exits_fast() {
        let term = SharedTermination::new(1);
        assert!(term.begin_sleep(0).end());

        // Termination already declared: return true without touching the
        // active count.
        assert!(term.begin_sleep(0).end());
        assert_eq!(term.num_active(), 0);
    }

    #[test]
    fn reset_rearms_regardless_of_prior_state() {
        let term = SharedTermination::new(3);
        assert_eq!(term.num_workers(), 3);

        // Drive one worker through a cancel, then reset.
        term.begin_sleep(2).cancel();
        term.reset();
        assert_eq!(term.num_active(), 3);

        // Reset after a full run to done.
        let term = SharedTermination::new(1);
        assert!(term.begin_sleep(0).end());
        term.reset();
        assert_eq!(term.num_active(), 1);
        assert!(term.begin_sleep(0).end(), "detector works again after reset");

        // Reset is idempotent.
        term.reset();
        term.reset();
        assert_eq!(term.num_active(), 1);
    }

    #[test]
    fn new_job_without_sleepers_is_a_no_op() {
        let term = SharedTermination::new(4);
        term.new_job();
        term.new_job_hint(3);
        assert_eq!(term.num_active(), 4);
    }
}

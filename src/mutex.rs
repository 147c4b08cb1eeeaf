// Copyright 2026 The Greenlock Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Recursive Mutex
//!
//! This module provides the mutual exclusion lock for cooperative runtimes.
//! The mutex tracks ownership, supports recursive re-entry by the owning
//! thread, and coordinates blocking with the external scheduler.
//!
//! # Design
//!
//! - **Ownership tracking**: Each mutex knows which thread owns it
//! - **Recursive holds**: The owner may re-lock; each extra lock must be
//!   matched by an unlock before the mutex becomes free
//! - **Single acquisition test**: Both the direct path and the
//!   scheduler-mediated grant path resolve through one routine, the only
//!   place where owner, hold count and waiter count move together
//! - **No suspension inside the mutex**: Blocking is delegated to the
//!   scheduler through [`Scheduler::wait_on_mutex`]
//!
//! # Lock states
//!
//! ```text
//! free (owner = none, count = 0)
//!   | lock                            | unlock at count 1
//!   v                                 |
//! held (owner = T, count = n) --------+
//!   | lock by T: count = n + 1
//!   | lock by other: denied -> waiter, scheduler retries after release
//! ```

use crate::sched::Scheduler;
use crate::types::{Nanoseconds, ThreadId, TID_INVALID, TID_SCHEDULER};
use core::fmt;
use spin::Mutex as SpinMutex;

// Import logging macros
use crate::{log_debug, log_trace_if};

const LOCAL_TRACE: bool = false;

/// ============================================================================
/// Mutex
/// ============================================================================

/// Magic number for mutex validation
const MUTEX_MAGIC: u32 = 0x474C434B; // "GLCK" in hex

/// Capacity of the diagnostic name, including the NUL terminator
pub const MUTEX_NAME_LEN: usize = 32;

/// Lock state record
///
/// The three counters only ever change together, under the one guard in
/// [`Mutex`]; `owner == TID_INVALID` if and only if `count == 0`.
struct MutexState {
    /// Thread currently holding the lock (TID_INVALID = unlocked)
    owner: ThreadId,

    /// Recursive hold depth of `owner`
    count: u32,

    /// Number of threads registered as wanting this lock
    waits: u32,
}

/// Recursive mutual exclusion lock
///
/// Tracks ownership and integrates with the runtime's scheduler for
/// blocking. The scheduler is handed in by reference at every entry point;
/// the mutex holds no scheduler state and never suspends a thread itself.
pub struct Mutex {
    /// Lock state, guarded so owner/count/waits always move as one
    state: SpinMutex<MutexState>,

    /// Diagnostic name, truncated and NUL-terminated
    name: [u8; MUTEX_NAME_LEN],

    /// Magic number for validation
    magic: u32,
}

impl Mutex {
    /// Create a new, unowned mutex with a diagnostic name.
    ///
    /// Names longer than `MUTEX_NAME_LEN - 1` bytes are silently truncated
    /// on a character boundary; the stored name is always NUL-terminated.
    pub fn new(name: &str) -> Self {
        let mut buf = [0u8; MUTEX_NAME_LEN];
        let mut len = name.len().min(MUTEX_NAME_LEN - 1);
        while len > 0 && !name.is_char_boundary(len) {
            len -= 1;
        }
        buf[..len].copy_from_slice(&name.as_bytes()[..len]);

        log_trace_if!(LOCAL_TRACE, "created mutex '{}'", &name[..len]);

        Self {
            state: SpinMutex::new(MutexState {
                owner: TID_INVALID,
                count: 0,
                waits: 0,
            }),
            name: buf,
            magic: MUTEX_MAGIC,
        }
    }

    /// Destroy the mutex.
    ///
    /// Panics if the mutex is still owned, held recursively, or has
    /// registered waiters. Destroying a live mutex is caller misuse, not a
    /// recoverable condition.
    pub fn destroy(self) {
        self.validate();

        let state = self.state.lock();
        assert_eq!(
            state.owner, TID_INVALID,
            "mutex_destroy: tried to destroy locked mutex '{}'",
            self.name()
        );
        assert_eq!(
            state.count, 0,
            "mutex_destroy: tried to destroy held mutex '{}'",
            self.name()
        );
        assert_eq!(
            state.waits, 0,
            "mutex_destroy: tried to destroy contended mutex '{}'",
            self.name()
        );
    }

    /// Get the diagnostic name
    pub fn name(&self) -> &str {
        let end = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.name.len());
        core::str::from_utf8(&self.name[..end]).unwrap_or("")
    }

    /// Acquire the mutex.
    ///
    /// Registers the calling thread (identified by
    /// [`Scheduler::current_thread_id`]) as a waiter and runs the
    /// acquisition test. On denial with `timeout == 0` the attempt is
    /// abandoned immediately. On denial with a nonzero `timeout` the call
    /// suspends in [`Scheduler::wait_on_mutex`] until the scheduler grants
    /// the lock through [`Mutex::acquire_on_behalf_of`] or the timeout
    /// elapses.
    ///
    /// Returns `true` if the lock was acquired.
    pub fn lock<S: Scheduler>(&self, sched: &S, timeout: Nanoseconds) -> bool {
        self.validate();

        let tid = sched.current_thread_id();

        {
            let mut state = self.state.lock();

            // Register as a candidate; the acquisition test consumes the
            // registration on success.
            state.waits += 1;

            if self.try_acquire_for(&mut state, tid) {
                return true;
            }

            if timeout == 0 {
                // Abandoning the attempt resolves the registration here.
                state.waits -= 1;
                return false;
            }
        }

        log_debug!("thread {} blocking on mutex '{}'", tid, self.name());

        // The scheduler suspends this thread and re-runs the acquisition
        // test on its behalf once the mutex may have become free.
        let granted = sched.wait_on_mutex(self, timeout);

        if !granted {
            // Timed out; the registration is still ours to resolve.
            let mut state = self.state.lock();
            assert!(
                state.waits > 0,
                "mutex_lock: wait count underflow on '{}'",
                self.name()
            );
            state.waits -= 1;

            log_debug!("thread {} timed out on mutex '{}'", tid, self.name());
        }

        granted
    }

    /// Try to acquire the mutex without blocking.
    ///
    /// Equivalent to [`Mutex::lock`] with a zero timeout: on contention the
    /// attempt is abandoned immediately and `false` is returned.
    pub fn try_lock<S: Scheduler>(&self, sched: &S) -> bool {
        self.lock(sched, 0)
    }

    /// Release the mutex.
    ///
    /// Panics unless the calling thread is the current owner with a
    /// positive hold count. Decrements the hold depth; at zero the mutex
    /// becomes free. Waiter bookkeeping is untouched: whichever waiter the
    /// scheduler retries next gets the lock.
    pub fn unlock<S: Scheduler>(&self, sched: &S) {
        self.validate();

        let tid = sched.current_thread_id();
        let mut state = self.state.lock();

        assert_ne!(
            tid, TID_INVALID,
            "mutex_unlock: invalid thread id on '{}'",
            self.name()
        );
        assert_eq!(
            state.owner,
            tid,
            "mutex_unlock: thread {} tried to unlock mutex '{}' it doesn't own",
            tid,
            self.name()
        );
        assert!(
            state.count > 0,
            "mutex_unlock: hold count underflow on '{}'",
            self.name()
        );

        state.count -= 1;
        if state.count == 0 {
            state.owner = TID_INVALID;
        }
    }

    /// Attempt to grant the mutex to a blocked thread.
    ///
    /// Scheduler-thread-only entry point: the runtime calls this on behalf
    /// of a thread suspended in [`Mutex::lock`] whenever the mutex may have
    /// become free. On success the scheduler resumes `thread` with the
    /// `true` result of its original `lock` call; on failure the thread
    /// stays suspended and remains a registered waiter.
    ///
    /// Panics if called from any thread other than the scheduler thread, or
    /// if the grant fails for the scheduler/idle thread itself, which must
    /// never be left blocked.
    pub fn acquire_on_behalf_of<S: Scheduler>(&self, sched: &S, thread: ThreadId) -> bool {
        self.validate();

        let caller = sched.current_thread_id();
        assert_eq!(
            caller, TID_SCHEDULER,
            "mutex_grant: called from non-scheduler thread {}",
            caller
        );

        let mut state = self.state.lock();
        let granted = self.try_acquire_for(&mut state, thread);

        if granted {
            log_trace_if!(
                LOCAL_TRACE,
                "granted mutex '{}' to thread {}",
                self.name(),
                thread
            );
        } else {
            assert_ne!(
                thread, TID_SCHEDULER,
                "mutex_grant: scheduler thread left blocked on '{}'",
                self.name()
            );
        }

        granted
    }

    /// Get the owner thread ID, or `None` if unlocked
    pub fn owner(&self) -> Option<ThreadId> {
        match self.state.lock().owner {
            TID_INVALID => None,
            tid => Some(tid),
        }
    }

    /// Check if the mutex is currently locked
    pub fn is_locked(&self) -> bool {
        self.state.lock().owner != TID_INVALID
    }

    /// Get the recursive hold depth of the current owner
    pub fn hold_count(&self) -> u32 {
        self.state.lock().count
    }

    /// Get the number of threads registered as waiting for this mutex
    pub fn waiters(&self) -> u32 {
        self.state.lock().waits
    }

    /// Acquisition test shared by the direct and scheduler-mediated paths.
    ///
    /// The caller must already hold the state guard and have `thread`
    /// registered in `waits`. Grants to a free mutex or recursively to the
    /// owner, consuming the registration; denies otherwise, leaving the
    /// registration in place.
    fn try_acquire_for(&self, state: &mut MutexState, thread: ThreadId) -> bool {
        assert!(
            state.waits > 0,
            "mutex_acquire: no registered waiter for '{}'",
            self.name()
        );
        assert_ne!(
            thread, TID_INVALID,
            "mutex_acquire: invalid thread id on '{}'",
            self.name()
        );

        if state.owner == TID_INVALID {
            assert_eq!(
                state.count, 0,
                "mutex_acquire: free mutex '{}' has nonzero hold count",
                self.name()
            );

            // The thread is now owner of the mutex
            state.owner = thread;
            state.count = 1;
            state.waits -= 1;
            true
        } else if state.owner == thread {
            assert!(
                state.count > 0,
                "mutex_acquire: owned mutex '{}' has zero hold count",
                self.name()
            );

            // Recursive re-entry by the owner
            state.count += 1;
            state.waits -= 1;
            true
        } else {
            // Denied; the caller stays registered
            false
        }
    }

    /// Validate that this is a valid mutex
    fn validate(&self) {
        debug_assert_eq!(self.magic, MUTEX_MAGIC, "invalid mutex magic");
    }
}

impl fmt::Debug for Mutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Mutex")
            .field("name", &self.name())
            .field("owner", &state.owner)
            .field("count", &state.count)
            .field("waits", &state.waits)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TIMEOUT_INFINITE;
    use core::cell::Cell;

    const THREAD_A: ThreadId = 2;
    const THREAD_B: ThreadId = 3;

    /// Scheduler double with a switchable current thread. Never grants, so
    /// a nonzero-timeout wait behaves like a timeout expiry.
    struct TestSched {
        current: Cell<ThreadId>,
    }

    impl TestSched {
        fn new(tid: ThreadId) -> Self {
            Self {
                current: Cell::new(tid),
            }
        }

        fn switch_to(&self, tid: ThreadId) {
            self.current.set(tid);
        }
    }

    impl Scheduler for TestSched {
        fn current_thread_id(&self) -> ThreadId {
            self.current.get()
        }

        fn wait_on_mutex(&self, _mutex: &Mutex, _timeout: Nanoseconds) -> bool {
            false
        }
    }

    /// Scheduler double that plays out a release and grant while the waiter
    /// is suspended: the owner unlocks, then the scheduler thread retries
    /// on the waiter's behalf.
    struct HandoffSched {
        current: Cell<ThreadId>,
        release_from: ThreadId,
    }

    impl Scheduler for HandoffSched {
        fn current_thread_id(&self) -> ThreadId {
            self.current.get()
        }

        fn wait_on_mutex(&self, mutex: &Mutex, _timeout: Nanoseconds) -> bool {
            let waiter = self.current.get();
            assert_eq!(mutex.waiters(), 1);

            self.current.set(self.release_from);
            mutex.unlock(self);

            self.current.set(TID_SCHEDULER);
            let granted = mutex.acquire_on_behalf_of(self, waiter);

            self.current.set(waiter);
            granted
        }
    }

    /// Scheduler double that retries on the waiter's behalf without any
    /// release having happened, then reports a timeout.
    struct RetryNoReleaseSched {
        current: Cell<ThreadId>,
    }

    impl Scheduler for RetryNoReleaseSched {
        fn current_thread_id(&self) -> ThreadId {
            self.current.get()
        }

        fn wait_on_mutex(&self, mutex: &Mutex, _timeout: Nanoseconds) -> bool {
            let waiter = self.current.get();
            assert_eq!(mutex.waiters(), 1);

            self.current.set(TID_SCHEDULER);
            let granted = mutex.acquire_on_behalf_of(self, waiter);

            // A denied retry must leave the waiter registered
            if !granted {
                assert_eq!(mutex.waiters(), 1);
            }

            self.current.set(waiter);
            granted
        }
    }

    #[test]
    fn test_mutex_new() {
        let mutex = Mutex::new("test");
        assert_eq!(mutex.name(), "test");
        assert!(!mutex.is_locked());
        assert!(mutex.owner().is_none());
        assert_eq!(mutex.hold_count(), 0);
        assert_eq!(mutex.waiters(), 0);
        mutex.destroy();
    }

    #[test]
    fn test_name_truncation() {
        let mutex = Mutex::new("a_rather_long_name_that_exceeds_the_capacity");
        assert_eq!(mutex.name().len(), MUTEX_NAME_LEN - 1);
        assert_eq!(mutex.name(), "a_rather_long_name_that_exceeds");
        mutex.destroy();
    }

    #[test]
    fn test_name_truncation_char_boundary() {
        // 30 ASCII bytes, then a 2-byte char straddling the capacity limit
        let name = "abcdefghijklmnopqrstuvwxyz0123é";
        let mutex = Mutex::new(name);
        assert_eq!(mutex.name(), "abcdefghijklmnopqrstuvwxyz0123");
        mutex.destroy();
    }

    #[test]
    fn test_lock_uncontended() {
        let sched = TestSched::new(THREAD_A);
        let mutex = Mutex::new("uncontended");

        assert!(mutex.lock(&sched, TIMEOUT_INFINITE));
        assert_eq!(mutex.owner(), Some(THREAD_A));
        assert_eq!(mutex.hold_count(), 1);
        assert_eq!(mutex.waiters(), 0);

        mutex.unlock(&sched);
        assert!(!mutex.is_locked());
        mutex.destroy();
    }

    #[test]
    fn test_recursive_lock_depth() {
        let sched = TestSched::new(THREAD_A);
        let mutex = Mutex::new("recursive");

        assert!(mutex.lock(&sched, TIMEOUT_INFINITE));
        assert!(mutex.lock(&sched, TIMEOUT_INFINITE));
        assert!(mutex.lock(&sched, 0));
        assert_eq!(mutex.owner(), Some(THREAD_A));
        assert_eq!(mutex.hold_count(), 3);

        mutex.unlock(&sched);
        assert_eq!(mutex.hold_count(), 2);
        assert_eq!(mutex.owner(), Some(THREAD_A));

        mutex.unlock(&sched);
        assert_eq!(mutex.hold_count(), 1);

        mutex.unlock(&sched);
        assert_eq!(mutex.hold_count(), 0);
        assert!(mutex.owner().is_none());
        mutex.destroy();
    }

    #[test]
    fn test_try_lock_contended_fails() {
        let sched = TestSched::new(THREAD_A);
        let mutex = Mutex::new("contended");

        assert!(mutex.try_lock(&sched));

        // Another thread fails immediately, leaving the state untouched
        sched.switch_to(THREAD_B);
        assert!(!mutex.try_lock(&sched));
        assert_eq!(mutex.owner(), Some(THREAD_A));
        assert_eq!(mutex.hold_count(), 1);
        assert_eq!(mutex.waiters(), 0);

        sched.switch_to(THREAD_A);
        mutex.unlock(&sched);
        mutex.destroy();
    }

    #[test]
    fn test_try_lock_recursive() {
        let sched = TestSched::new(THREAD_A);
        let mutex = Mutex::new("try_recursive");

        assert!(mutex.try_lock(&sched));
        assert!(mutex.try_lock(&sched));
        assert_eq!(mutex.hold_count(), 2);

        mutex.unlock(&sched);
        mutex.unlock(&sched);
        mutex.destroy();
    }

    #[test]
    fn test_lock_timeout_abandons_waiter() {
        let sched = TestSched::new(THREAD_A);
        let mutex = Mutex::new("timeout");

        assert!(mutex.lock(&sched, TIMEOUT_INFINITE));

        sched.switch_to(THREAD_B);
        assert!(!mutex.lock(&sched, 1_000_000));
        assert_eq!(mutex.owner(), Some(THREAD_A));
        assert_eq!(mutex.waiters(), 0);

        sched.switch_to(THREAD_A);
        mutex.unlock(&sched);
        mutex.destroy();
    }

    #[test]
    fn test_scheduler_handoff() {
        let sched = HandoffSched {
            current: Cell::new(THREAD_A),
            release_from: THREAD_A,
        };
        let mutex = Mutex::new("handoff");

        assert!(mutex.lock(&sched, TIMEOUT_INFINITE));

        // The blocked lock resolves through the scheduler grant path once
        // the owner releases
        sched.current.set(THREAD_B);
        assert!(mutex.lock(&sched, TIMEOUT_INFINITE));
        assert_eq!(mutex.owner(), Some(THREAD_B));
        assert_eq!(mutex.hold_count(), 1);
        assert_eq!(mutex.waiters(), 0);

        mutex.unlock(&sched);
        mutex.destroy();
    }

    #[test]
    fn test_grant_denied_waiter_remains() {
        let sched = RetryNoReleaseSched {
            current: Cell::new(THREAD_A),
        };
        let mutex = Mutex::new("denied");

        assert!(mutex.lock(&sched, TIMEOUT_INFINITE));

        sched.current.set(THREAD_B);
        assert!(!mutex.lock(&sched, 1_000_000));
        assert_eq!(mutex.owner(), Some(THREAD_A));
        assert_eq!(mutex.waiters(), 0);

        sched.current.set(THREAD_A);
        mutex.unlock(&sched);
        mutex.destroy();
    }

    #[test]
    #[should_panic(expected = "doesn't own")]
    fn test_unlock_not_owner() {
        let sched = TestSched::new(THREAD_A);
        let mutex = Mutex::new("foreign_unlock");

        assert!(mutex.lock(&sched, TIMEOUT_INFINITE));

        sched.switch_to(THREAD_B);
        mutex.unlock(&sched);
    }

    #[test]
    #[should_panic(expected = "mutex_unlock")]
    fn test_over_unlock() {
        let sched = TestSched::new(THREAD_A);
        let mutex = Mutex::new("over_unlock");

        assert!(mutex.lock(&sched, TIMEOUT_INFINITE));
        mutex.unlock(&sched);
        mutex.unlock(&sched);
    }

    #[test]
    #[should_panic(expected = "invalid thread")]
    fn test_lock_invalid_thread() {
        let sched = TestSched::new(TID_INVALID);
        let mutex = Mutex::new("invalid_tid");

        mutex.lock(&sched, TIMEOUT_INFINITE);
    }

    #[test]
    #[should_panic(expected = "non-scheduler")]
    fn test_grant_from_application_thread() {
        let sched = TestSched::new(THREAD_A);
        let mutex = Mutex::new("bad_grant");

        mutex.acquire_on_behalf_of(&sched, THREAD_B);
    }

    #[test]
    #[should_panic(expected = "left blocked")]
    fn test_grant_failure_for_scheduler_thread() {
        let sched = RetryNoReleaseSched {
            current: Cell::new(THREAD_A),
        };
        let mutex = Mutex::new("idle_blocked");

        assert!(mutex.lock(&sched, TIMEOUT_INFINITE));

        // The scheduler/idle thread must never be left blocked; a denied
        // grant on its behalf is fatal
        sched.current.set(TID_SCHEDULER);
        mutex.lock(&sched, TIMEOUT_INFINITE);
    }

    #[test]
    #[should_panic(expected = "mutex_destroy")]
    fn test_destroy_locked() {
        let sched = TestSched::new(THREAD_A);
        let mutex = Mutex::new("destroy_locked");

        assert!(mutex.lock(&sched, TIMEOUT_INFINITE));
        mutex.destroy();
    }

    #[test]
    fn test_debug_format() {
        let mutex = Mutex::new("debuggable");
        let rendered = format!("{:?}", mutex);
        assert!(rendered.contains("debuggable"));
        mutex.destroy();
    }
}

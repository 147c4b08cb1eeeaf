// Copyright 2026 The Greenlock Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Scheduler Contract
//!
//! The mutex never suspends a thread itself; it only decides lock-grant
//! eligibility. Suspension, wakeup and timeout expiry belong to the
//! runtime's scheduler, reached through the [`Scheduler`] trait. The trait
//! also supplies thread identity, so the mutex carries no dependency on an
//! ambient current-thread singleton.
//!
//! # Protocol
//!
//! ```text
//! app thread                 mutex                    scheduler thread
//! ----------                 -----                    ----------------
//! lock(sched, t) ──────────► register waiter
//!                            acquisition test
//!                            denied, t != 0
//!            ◄────────────── wait_on_mutex(mutex, t)
//! (suspended)                                         ... lock released ...
//!                            acquisition test ◄────── acquire_on_behalf_of
//!                            granted
//! (resumed, lock() = true) ◄───────────────────────── make thread runnable
//! ```

use crate::mutex::Mutex;
use crate::types::{Nanoseconds, ThreadId};

/// Interface the mutex requires from the runtime's thread scheduler.
///
/// An implementation is handed to every mutex entry point by reference; the
/// mutex holds no scheduler state of its own.
pub trait Scheduler {
    /// Identity of the thread the call is executing on.
    ///
    /// Must never return [`TID_INVALID`](crate::TID_INVALID). Returns
    /// [`TID_SCHEDULER`](crate::TID_SCHEDULER) exactly when the scheduler
    /// thread itself is running.
    fn current_thread_id(&self) -> ThreadId;

    /// Suspend the calling thread until its pending acquisition attempt on
    /// `mutex` resolves.
    ///
    /// Called by [`Mutex::lock`] after the calling thread has been
    /// registered as a waiter and denied, with a nonzero `timeout`. The
    /// scheduler suspends the thread and, whenever the mutex may have
    /// become free, retries on its behalf through
    /// [`Mutex::acquire_on_behalf_of`]. Returns `true` once a retry is
    /// granted, or `false` when `timeout` elapses first.
    ///
    /// The waiter registration stays with the mutex: a granting retry
    /// consumes it inside the acquisition test, and a `false` return makes
    /// the `lock` call itself abandon it. `wait_on_mutex` must not touch
    /// the mutex counters.
    fn wait_on_mutex(&self, mutex: &Mutex, timeout: Nanoseconds) -> bool;
}

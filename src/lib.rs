// Copyright 2026 The Greenlock Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Greenlock
//!
//! A recursive mutual-exclusion primitive for cooperative runtimes with a
//! single scheduler thread. The mutex tracks ownership, counts recursive
//! holds, and coordinates a bounded-wait blocking protocol with the
//! external scheduler; it never suspends a thread itself.
//!
//! # Design
//!
//! - **Two call surfaces**: the direct path ([`Mutex::lock`],
//!   [`Mutex::try_lock`], [`Mutex::unlock`]) used by any running thread,
//!   and the scheduler-mediated path ([`Mutex::acquire_on_behalf_of`])
//!   reserved for the scheduler thread
//! - **One acquisition test**: both paths resolve through a single routine,
//!   the only place where owner, hold count and waiter count move together
//! - **Explicit identity**: thread identity is supplied by the
//!   [`Scheduler`] passed to every entry point; there is no ambient
//!   current-thread singleton
//! - **Two failure classes**: contention and timeout are ordinary `bool`
//!   outcomes; invariant violations (foreign unlock, over-unlock,
//!   destroying a held mutex) are programming errors and panic
//!
//! # Usage
//!
//! ```rust
//! use greenlock::{Mutex, Nanoseconds, Scheduler, ThreadId};
//!
//! // The runtime supplies thread identity and the blocking primitive.
//! struct RunToCompletion(ThreadId);
//!
//! impl Scheduler for RunToCompletion {
//!     fn current_thread_id(&self) -> ThreadId {
//!         self.0
//!     }
//!
//!     fn wait_on_mutex(&self, _mutex: &Mutex, _timeout: Nanoseconds) -> bool {
//!         false
//!     }
//! }
//!
//! let sched = RunToCompletion(2);
//! let mutex = Mutex::new("demo");
//!
//! assert!(mutex.lock(&sched, 0));
//! assert!(mutex.lock(&sched, 0)); // recursive re-entry by the owner
//! mutex.unlock(&sched);
//! mutex.unlock(&sched);
//!
//! mutex.destroy();
//! ```

#![cfg_attr(not(test), no_std)]

pub mod debug;
pub mod mutex;
pub mod sched;
pub mod types;

// Re-exports
pub use mutex::*;
pub use sched::*;
pub use types::*;

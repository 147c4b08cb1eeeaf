// Copyright 2026 The Greenlock Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Common type aliases and reserved identities used throughout the crate

/// Thread ID type
pub type ThreadId = u64;

/// Invalid thread ID, doubles as the "no owner" sentinel
///
/// The scheduler must never hand this value out as a real thread identity.
pub const TID_INVALID: ThreadId = 0;

/// Thread ID of the distinguished scheduler/idle thread
///
/// The scheduler-mediated grant path may only be entered by this thread,
/// and this thread must never be left blocked on a mutex.
pub const TID_SCHEDULER: ThreadId = 1;

/// Time value in nanoseconds
pub type Nanoseconds = u64;

/// Timeout value meaning "wait without bound"
pub const TIMEOUT_INFINITE: Nanoseconds = u64::MAX;

// Copyright 2026 The Greenlock Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Logging macros
//!
//! Thin wrappers over the `log` facade. The embedding runtime decides where
//! the records go by installing its own `log` backend; with the `logging`
//! feature disabled every macro expands to nothing.
//!
//! Modules gate their verbose tracing behind a local `LOCAL_TRACE` constant:
//!
//! ```text
//! const LOCAL_TRACE: bool = false;
//!
//! log_trace_if!(LOCAL_TRACE, "granted mutex '{}' to thread {}", name, tid);
//! ```

/// Log a trace message
#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {{
        #[cfg(feature = "logging")]
        ::log::trace!($($arg)*);
    }};
}

/// Log a trace message if condition is true
#[macro_export]
macro_rules! log_trace_if {
    ($cond:expr, $($arg:tt)*) => {{
        if $cond {
            $crate::log_trace!($($arg)*);
        }
    }};
}

/// Log a debug message
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {{
        #[cfg(feature = "logging")]
        ::log::debug!($($arg)*);
    }};
}

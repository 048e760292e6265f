//! Logging macros gated by a module-level `ENABLE_LOGS` flag.
//!
//! The background loops are chatty at `info` level (one line per cycle), so
//! each loop module owns a switch to silence itself without touching
//! `RUST_LOG` for the rest of the process:
//!
//! ```ignore
//! const ENABLE_LOGS: bool = true;
//!
//! use crate::{log_info, log_warn};
//!
//! log_info!("reminder cycle: {} due", due.len());
//! ```

/// Info-level log line, emitted only when the calling module's
/// `ENABLE_LOGS` const is `true`.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// Debug-level counterpart of [`log_info!`].
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!($($arg)*);
        }
    };
}

/// Warn-level counterpart of [`log_info!`].
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

/// Error-level log line. Cycle failures always go through here, so a module
/// that disables its chatter still reports what went wrong when `ENABLE_LOGS`
/// is on.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}

//! Logging macros gated by a module-level `ENABLE_LOGS` flag.
//!
//! The frame driver and the fusion loop run once per display refresh, so
//! their per-frame chatter is switched off per module instead of through
//! `RUST_LOG` filtering alone.
//!
//! ```ignore
//! const ENABLE_LOGS: bool = true;
//!
//! use crate::{log_debug, log_info};
//!
//! log_info!("pose detector ready");
//! ```

/// `log::info!` when the calling module sets `ENABLE_LOGS`.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// `log::warn!` when the calling module sets `ENABLE_LOGS`.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

/// `log::error!` when the calling module sets `ENABLE_LOGS`.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}

/// Per-frame tracing. Also requires `WRISTGUARD_DEBUG` so a release run
/// with `RUST_LOG=debug` is not flooded at 60 Hz.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS && $crate::utils::logging::verbose() {
            log::debug!($($arg)*);
        }
    };
}

use std::sync::OnceLock;

static VERBOSE: OnceLock<bool> = OnceLock::new();

/// Whether `WRISTGUARD_DEBUG` is set to `1` or `true`. Read once.
pub fn verbose() -> bool {
    *VERBOSE.get_or_init(|| {
        std::env::var("WRISTGUARD_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    })
}

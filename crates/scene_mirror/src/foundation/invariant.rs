//! Internal invariant reporting
//!
//! A broken invariant means the synchronization logic itself is wrong. Debug
//! builds stop on it; release builds log it and the caller backs out without
//! touching renderer state.

/// Report a violated internal invariant.
///
/// Logs at error level, then fails a `debug_assert!` with the same message.
#[macro_export]
macro_rules! invariant_violation {
    ($($arg:tt)+) => {{
        let message = format!($($arg)+);
        log::error!("invariant violated: {}", message);
        debug_assert!(false, "invariant violated: {}", message);
    }};
}

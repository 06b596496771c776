//! Logging infrastructure for keyed-table observability.
//!
//! The crate uses `tracing` for structured logging. All events use target
//! "keyed_table" and include an `event` field for filtering.
//!
//! ## Library Integration
//!
//! The crate never initializes a global subscriber. Applications configure
//! tracing via `tracing_subscriber` or similar.
//!
//! ## Conventions
//!
//! - `event`: snake_case event name (required)
//! - `component`: subsystem (e.g., "stats", "rewrite", "scan", "catalog", "store")
//! - Use `%` for Display, `?` for Debug formatting
//! - Avoid high-cardinality fields such as file paths at info level

/// Target for all keyed-table log events.
pub(crate) const KEYED_TABLE_TARGET: &str = "keyed_table";

/// Macro for info-level log events.
///
/// # Example
/// ```ignore
/// log_info!(
///     component = "rewrite",
///     event = "rewrite_committed",
///     table = %identifier,
///     transaction_id = txn_id,
/// );
/// ```
macro_rules! log_info {
    ($($field:tt)*) => {
        ::tracing::info!(target: $crate::observability::KEYED_TABLE_TARGET, $($field)*)
    };
}

/// Macro for debug-level log events.
macro_rules! log_debug {
    ($($field:tt)*) => {
        ::tracing::debug!(target: $crate::observability::KEYED_TABLE_TARGET, $($field)*)
    };
}

/// Macro for warn-level log events.
macro_rules! log_warn {
    ($($field:tt)*) => {
        ::tracing::warn!(target: $crate::observability::KEYED_TABLE_TARGET, $($field)*)
    };
}

/// Macro for error-level log events.
macro_rules! log_error {
    ($($field:tt)*) => {
        ::tracing::error!(target: $crate::observability::KEYED_TABLE_TARGET, $($field)*)
    };
}

pub(crate) use log_debug;
pub(crate) use log_error;
pub(crate) use log_info;
pub(crate) use log_warn;

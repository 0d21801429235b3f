//! Process-wide logging setup shared by the binaries.

/// Initialize tracing/logging with the format chosen by `STOCKLEDGER_LOG_FORMAT`.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(tracing::LogFormat::from_env());
}

/// Subscriber configuration (filters, formatters).
pub mod tracing;

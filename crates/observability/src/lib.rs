//! Tracing and logging setup shared by hooksink processes.

/// Initialize process-wide logging with an `info` default filter.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init("info");
}

/// Initialize logging with `default_filter` used when `RUST_LOG` is unset.
pub fn init_with_default(default_filter: &str) {
    tracing::init(default_filter);
}

/// Tracing configuration (filters, layers).
pub mod tracing;

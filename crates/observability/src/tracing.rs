//! Tracing/logging initialization.
//!
//! JSON lines on stderr, one object per event, with the structured
//! fields (`project_id`, `table`, `suffix`, `index`, ...) flattened into it.

use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins over `default_filter`; an unparsable default falls back to `info`.
pub(crate) fn filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init(default_filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(default_filter))
        .json()
        .with_writer(std::io::stderr)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_a_no_op() {
        init("debug");
        init("info");
    }

    #[test]
    fn bad_default_falls_back_to_info() {
        let rendered = filter("not a [valid filter").to_string();
        assert!(!rendered.is_empty());
    }
}

//! Telemetry helpers for structured logging and tracing.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "workqueue=info";

/// Initialize tracing. Users can install their own subscriber; this helper
/// installs an env-filtered `fmt` subscriber (falling back to
/// [`DEFAULT_FILTER`]) only if none is set.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    install(filter);
}

/// Like [`init_tracing`] but with an explicit filter directive such as
/// `"workqueue=debug"`. Invalid directives fall back to [`DEFAULT_FILTER`].
pub fn init_tracing_with(directives: &str) {
    let filter = EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    install(filter);
}

fn install(filter: EnvFilter) {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_tracing_with("workqueue=debug");
        init_tracing();
        assert!(tracing::dispatcher::has_been_set());
    }
}

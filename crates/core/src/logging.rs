use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Default filter directive when `RUST_LOG` does not mention this crate.
pub const DEFAULT_DIRECTIVE: &str = "finance_tracker_core=info";

/// Installs a global `tracing` fmt subscriber filtered by `RUST_LOG`.
///
/// The library never calls this itself; binaries and tests opt in. Safe to
/// call more than once, and harmless if another subscriber is already set.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, EnvFilter};

        let mut filter = EnvFilter::from_default_env();
        if let Ok(directive) = DEFAULT_DIRECTIVE.parse() {
            filter = filter.add_directive(directive);
        }

        if fmt().with_env_filter(filter).try_init().is_ok() {
            tracing::info!("finance tracker tracing initialized");
        }
    });
}

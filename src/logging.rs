use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "clue=info";

/// Installs the global subscriber. `RUST_LOG` overrides the default filter.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    if let Err(err) = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .try_init()
    {
        eprintln!("clue: logging already initialized: {err}");
    }
}

use tracing_subscriber::EnvFilter;
use crate::cli::LogLevel;

/// Installs a stderr fmt subscriber. `RUST_LOG` wins over `level`.
pub fn init_tracing(level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("toolsetup={}", level.as_str())));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

//! Logging initialization and utilities

/// Initialize the logging system
///
/// Uses env_logger with default filter level of `info`.
/// Override with RUST_LOG environment variable.
///
/// # Example
/// ```
/// assetflow::core::logging::init();
/// log::info!("Runtime started");
/// ```
pub fn init() {
    init_with_filter("info");
}

/// Initialize logging with a custom default filter.
///
/// Does nothing if a logger is already installed, so hosts and tests can
/// call it freely.
pub fn init_with_filter(default_filter: &str) {
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter)
    ).try_init();
}

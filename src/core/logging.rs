//! Logger setup

use super::RegistryConfig;

/// Initialise `env_logger` with the configured default filter.
///
/// `RUST_LOG` still takes precedence. Calling this more than once is harmless.
pub fn init(config: &RegistryConfig) {
    let env = env_logger::Env::default().default_filter_or(config.log_level.as_str());
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init();
}

//! Merge rules: defaults, override order, conflict handling.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("api.base_url", crate::config::DEFAULT_API_BASE_URL)?
        .set_default("api.connect_timeout_ms", 10_000)?
        .set_default("api.request_timeout_ms", 30_000)?
        .set_default("fetch.ready_timeout_ms", 5_000)?
        .set_default("fetch.stale_chain_after_ms", 1_000)?
        .set_default("push.enabled", true)
}

// config.rs

use config::{Config, Environment, File};
use log::debug;
use serde::Deserialize;
use std::path::Path;

pub use config::ConfigError;

pub const DEFAULT_CLIENT_NAME: &str = "Combine Client";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
pub const ENV_PREFIX: &str = "MIDIBRIDGE";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Name the platform session is opened with; also the base of every
    /// generated port name
    pub client_name: String,
    /// Walk source indices `0..=count` instead of `0..count` when
    /// refreshing, attempting one extra out-of-range source per port
    pub inclusive_source_range: bool,
    /// How often the binary polls the platform for topology changes
    pub poll_interval_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            inclusive_source_range: false,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl ClientConfig {
    /// Loads defaults, then `path` if given, then `MIDIBRIDGE_*` environment
    /// variables, each layer overriding the previous one.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = ClientConfig::default();
        let mut builder = Config::builder()
            .set_default("client_name", defaults.client_name)?
            .set_default("inclusive_source_range", defaults.inclusive_source_range)?
            .set_default("poll_interval_ms", defaults.poll_interval_ms)?;

        if let Some(path) = path {
            debug!("Loading configuration from {}", path.display());
            builder = builder.add_source(File::from(path).required(true));
        }

        let config: ClientConfig = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;

        debug!("Effective configuration: {:?}", config);
        Ok(config)
    }
}

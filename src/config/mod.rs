//! Configuration management

use config::{ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub core: CoreConfig,
    pub interfaces: InterfacesConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Size of the call context pool
    pub max_calls: usize,
    /// Size of the bearer pool, and so the highest local id handed out
    pub max_bearers: usize,
    /// Parked tokens older than this are failed; 0 keeps them forever
    pub pending_timeout_secs: u64,
    pub tick_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfacesConfig {
    /// Bearer with local id N uses interface `{prefix}{N-1}`
    pub prefix: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when RUST_LOG is not set
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            core: CoreConfig {
                max_calls: 7,
                max_bearers: 4,
                pending_timeout_secs: 30,
                tick_interval_ms: 1000,
            },
            interfaces: InterfacesConfig {
                prefix: "tun".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

impl CoreConfig {
    pub fn pending_timeout(&self) -> Option<chrono::Duration> {
        match self.pending_timeout_secs {
            0 => None,
            secs => Some(chrono::Duration::seconds(secs as i64)),
        }
    }

    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.tick_interval_ms)
    }
}

impl Config {
    /// Defaults, then the optional file, then `MODEMLINK__SECTION__KEY` variables
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder().add_source(config::Config::try_from(&Config::default())?);
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let config: Config = builder
            .add_source(
                Environment::with_prefix("MODEMLINK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.core.max_calls == 0 {
            return Err(ConfigError::Message("core.max_calls must be at least 1".to_string()));
        }
        if self.core.max_bearers == 0 {
            return Err(ConfigError::Message("core.max_bearers must be at least 1".to_string()));
        }
        if self.core.tick_interval_ms == 0 {
            return Err(ConfigError::Message("core.tick_interval_ms must be at least 1".to_string()));
        }
        if self.interfaces.prefix.is_empty() {
            return Err(ConfigError::Message("interfaces.prefix must not be empty".to_string()));
        }
        Ok(())
    }
}

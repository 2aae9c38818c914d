//! Application configuration loading and validation.
//!
//! The top-level [`Config`] aggregates logging, snapshot source, Home
//! Assistant and MQTT transport settings. It is read once from a TOML file at
//! startup, patched with credential overrides from the environment, validated,
//! and never mutated afterwards.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use validator::Validate;

use self::{homeassistant::HomeAssistantConfig, logger::LoggerConfig, source::SourceConfig};

pub mod homeassistant;
pub mod logger;
pub mod source;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "FUELBEE_CONFIG";
/// Overrides `transport.username` when set.
pub const USERNAME_ENV: &str = "FUELBEE_MQTT_USERNAME";
/// Overrides `transport.password` when set.
pub const PASSWORD_ENV: &str = "FUELBEE_MQTT_PASSWORD";

const SYSTEM_CONFIG: &str = "/etc/fuelbee/config.toml";
const LOCAL_CONFIG: &str = "config.toml";

#[doc(hidden)]
#[macro_export]
macro_rules! __print_status {
    ($level:expr, $($arg:tt)*) => {
        println!("{}  {} {}",
            console::style(
                time::OffsetDateTime::now_utc()
                    .format(time::macros::format_description!(
                        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
                    ))
                    .unwrap_or_default()
            ).dim(),
            $level,
            format_args!($($arg)*)
        )
    };
}

/// Timestamped output for use before the tracing subscriber is installed.
#[macro_export]
macro_rules! print_info {
    ($($arg:tt)*) => { $crate::__print_status!(console::style("INFO").green(), $($arg)*) };
}

#[macro_export]
macro_rules! print_warn {
    ($($arg:tt)*) => { $crate::__print_status!(console::style("WARN").yellow(), $($arg)*) };
}

#[macro_export]
macro_rules! print_error {
    ($($arg:tt)*) => { $crate::__print_status!(console::style("ERROR").red(), $($arg)*) };
}

/// Errors raised while locating, reading, parsing, or validating the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error while reading configuration {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error while reading configuration: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

/// Top-level application configuration.
#[derive(Serialize, Deserialize, Debug, Validate, Clone, Default)]
#[serde(default)]
pub struct Config {
    #[validate(nested)]
    pub logger: LoggerConfig,

    #[validate(nested)]
    pub source: SourceConfig,

    #[validate(nested)]
    pub homeassistant: HomeAssistantConfig,

    #[validate(nested)]
    pub transport: TransportConfig,
}

pub type TransportConfig = fuelbee_mqtt_v4::Config;

impl Config {
    /// Locates, loads, and validates the configuration.
    ///
    /// `explicit` is the path given on the command line, if any.
    pub fn new(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = Self::resolve_path(explicit, std::env::var_os(CONFIG_ENV).map(PathBuf::from))?;
        let mut config = Self::from_file(&path)?;
        config.apply_env_overrides(
            std::env::var(USERNAME_ENV).ok(),
            std::env::var(PASSWORD_ENV).ok(),
        );
        config.validate()?;

        print_info!("Successfully loaded config from: {}", path.display());
        Ok(config)
    }

    /// Picks the configuration file.
    ///
    /// Priority: command-line argument, `FUELBEE_CONFIG`,
    /// `/etc/fuelbee/config.toml`, `./config.toml`. Explicit paths are
    /// returned as given; a missing file surfaces when it is read.
    fn resolve_path(
        explicit: Option<PathBuf>,
        from_env: Option<PathBuf>,
    ) -> Result<PathBuf, ConfigError> {
        if let Some(path) = explicit {
            print_info!("Using config from command line: {}", path.display());
            return Ok(path);
        }

        if let Some(path) = from_env {
            print_info!("Using config from {}: {}", CONFIG_ENV, path.display());
            return Ok(path);
        }

        for fallback in [SYSTEM_CONFIG, LOCAL_CONFIG] {
            let fallback = Path::new(fallback);
            if fallback.is_file() {
                print_info!("Using default config path: {}", fallback.display());
                return Ok(fallback.to_path_buf());
            }
        }

        Err(ConfigError::Config(format!(
            "No configuration file found (pass a path, set {CONFIG_ENV}, or create {SYSTEM_CONFIG})"
        )))
    }

    /// Reads and parses a TOML file without validating it.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        print_info!("Loading configuration from: {}", path.display());

        let text = fs::read_to_string(path).map_err(|source| ConfigError::IoError {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&text)?)
    }

    fn apply_env_overrides(&mut self, username: Option<String>, password: Option<String>) {
        if let Some(username) = username {
            self.transport.username = username;
        }
        if let Some(password) = password {
            self.transport.password = password;
        }
    }
}

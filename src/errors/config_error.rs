use thiserror::Error;

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Startup configuration failures
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable / YAML key is absent
    #[error("Missing {0} variable")]
    MissingVariable(&'static str),

    /// A value was present but could not be parsed
    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },

    /// Duration string not in the `1h30m` / `15m` / `90s` / `500ms` grammar
    #[error("Invalid duration '{0}'")]
    InvalidDuration(String),

    /// Scenario definition is unusable (no stages, unknown behavior, ...)
    #[error("Invalid scenario '{name}': {reason}")]
    InvalidScenario { name: String, reason: String },

    #[error("Failed to read config file {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

use crate::BoxError;
use thiserror::Error;

/// Errors raised by a stage itself, as opposed to the wrapped handler.
#[derive(Debug, Error)]
pub enum StageError {
    /// The settings store rejected the bootstrapped site URL.
    #[error("failed to persist site url {url}")]
    PersistSiteUrl {
        /// The URL that was being written.
        url: String,
        /// The store's error.
        #[source]
        source: BoxError,
    },
}

/// A locale tag that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid locale tag: {0:?}")]
pub struct InvalidLocale(pub String);

/// Errors produced while loading a [`PipelineConfig`](crate::PipelineConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A configured locale tag is malformed.
    #[error(transparent)]
    Locale(#[from] InvalidLocale),

    /// A configured value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

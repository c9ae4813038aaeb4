use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML deserialization error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration validation failed: {details}")]
    Validation { details: String },
}

impl ConfigError {
    pub fn validation(details: impl Into<String>) -> Self {
        Self::Validation {
            details: details.into(),
        }
    }
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

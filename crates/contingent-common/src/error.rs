use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContingentError {
    #[error("Invalid contingency table: {0}")]
    InvalidTable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ContingentError>;

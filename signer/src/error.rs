use std::{error::Error, fmt};

#[derive(Debug)]
pub enum SignerError {
    ConfigError(String),
    NetworkError(String),
    StorageError(String),
    RequestError(String),
}

impl fmt::Display for SignerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignerError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            SignerError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            SignerError::StorageError(msg) => write!(f, "Storage error: {}", msg),
            SignerError::RequestError(msg) => write!(f, "Request error: {}", msg),
        }
    }
}

impl Error for SignerError {}

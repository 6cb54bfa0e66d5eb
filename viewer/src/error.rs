use player::PlayerError;
use std::{error::Error, fmt};

#[derive(Debug)]
pub enum ViewerError {
    ConfigError(String),
    NetworkError(String),
    StorageError(String),
    RequestError(String),
    Player(PlayerError),
}

impl fmt::Display for ViewerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewerError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            ViewerError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            ViewerError::StorageError(msg) => write!(f, "Storage error: {}", msg),
            ViewerError::RequestError(msg) => write!(f, "Request error: {}", msg),
            ViewerError::Player(e) => write!(f, "{}", e),
        }
    }
}

impl Error for ViewerError {}

impl From<PlayerError> for ViewerError {
    fn from(e: PlayerError) -> Self {
        match e {
            PlayerError::ConfigError(msg) => ViewerError::ConfigError(msg),
            PlayerError::HandError(msg) => ViewerError::StorageError(msg),
            PlayerError::NetworkError(msg) => ViewerError::NetworkError(msg),
            PlayerError::RequestError(msg) => ViewerError::RequestError(msg),
            e => ViewerError::Player(e),
        }
    }
}

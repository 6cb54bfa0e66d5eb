use crate::classifier::PlaybackError;
use crate::playback::PlayerStatus;
use std::{error::Error, fmt};

#[derive(Debug, Clone)]
pub enum PlayerError {
    ConfigError(String),
    HandError(String),
    NetworkError(String),
    RequestError(String),
    InvalidTransition {
        command: &'static str,
        status: PlayerStatus,
    },
    Playback(PlaybackError),
    /// The owning session was torn down before the operation finished.
    Cancelled,
    /// The player task is gone.
    Closed,
}

impl fmt::Display for PlayerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            PlayerError::HandError(msg) => write!(f, "Hand data error: {}", msg),
            PlayerError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            PlayerError::RequestError(msg) => write!(f, "Request error: {}", msg),
            PlayerError::InvalidTransition { command, status } => {
                write!(f, "Cannot {} while {}", command, status)
            }
            PlayerError::Playback(e) => write!(f, "Playback error: {}", e),
            PlayerError::Cancelled => write!(f, "Operation cancelled"),
            PlayerError::Closed => write!(f, "Player is closed"),
        }
    }
}

impl Error for PlayerError {}

impl From<PlaybackError> for PlayerError {
    fn from(e: PlaybackError) -> Self {
        PlayerError::Playback(e)
    }
}

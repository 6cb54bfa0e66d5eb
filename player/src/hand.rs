use crate::error::PlayerError;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::fmt;
use std::path::Path;

/// Betting round. The derived ordering is the order streets are dealt in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Street {
    Preflop,
    Flop,
    Turn,
    River,
}

impl Street {
    pub fn as_str(&self) -> &'static str {
        match self {
            Street::Preflop => "PREFLOP",
            Street::Flop => "FLOP",
            Street::Turn => "TURN",
            Street::River => "RIVER",
        }
    }
}

impl fmt::Display for Street {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    PostAnte,
    PostBlind,
    Straddle,
    Fold,
    Check,
    Call,
    Bet,
    Raise,
    AllIn,
    Show,
    Muck,
    Collect,
}

impl ActionKind {
    pub fn category(&self) -> MarkerCategory {
        match self {
            ActionKind::PostAnte | ActionKind::PostBlind | ActionKind::Straddle => {
                MarkerCategory::Forced
            }
            ActionKind::Check | ActionKind::Call => MarkerCategory::Passive,
            ActionKind::Bet | ActionKind::Raise | ActionKind::AllIn => MarkerCategory::Aggressive,
            ActionKind::Fold => MarkerCategory::Fold,
            ActionKind::Show | ActionKind::Muck | ActionKind::Collect => MarkerCategory::Showdown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::PostAnte => "POST_ANTE",
            ActionKind::PostBlind => "POST_BLIND",
            ActionKind::Straddle => "STRADDLE",
            ActionKind::Fold => "FOLD",
            ActionKind::Check => "CHECK",
            ActionKind::Call => "CALL",
            ActionKind::Bet => "BET",
            ActionKind::Raise => "RAISE",
            ActionKind::AllIn => "ALL_IN",
            ActionKind::Show => "SHOW",
            ActionKind::Muck => "MUCK",
            ActionKind::Collect => "COLLECT",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visual weight class of a timeline marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarkerCategory {
    Forced,
    Passive,
    Aggressive,
    Fold,
    Showdown,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    /// `None` for dealer/site actions.
    #[serde(default)]
    pub player: Option<String>,
    pub kind: ActionKind,
    #[serde(default)]
    pub amount: Option<f64>,
    /// Seconds from the start of the recording.
    #[serde(default)]
    pub timestamp: Option<f64>,
}

impl Action {
    pub fn new(kind: ActionKind, timestamp: Option<f64>) -> Self {
        Self {
            player: None,
            kind,
            amount: None,
            timestamp,
        }
    }

    pub fn with_player(mut self, player: &str) -> Self {
        self.player = Some(player.to_string());
        self
    }

    /// Timestamp usable on the timeline (present and finite).
    pub fn time(&self) -> Option<f64> {
        self.timestamp.filter(|t| t.is_finite())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreetRecord {
    pub street: Street,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub community_cards: Vec<String>,
}

impl StreetRecord {
    pub fn new(street: Street, actions: Vec<Action>) -> Self {
        Self {
            street,
            actions,
            community_cards: Vec::new(),
        }
    }

    /// Earliest usable timestamp among this street's actions.
    pub fn first_time(&self) -> Option<f64> {
        self.actions
            .iter()
            .filter_map(Action::time)
            .fold(None, |min, t| match min {
                Some(m) if m <= t => Some(m),
                _ => Some(t),
            })
    }
}

/// A recorded hand as delivered by the hand data source.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hand {
    pub id: String,
    /// Length of the companion recording in seconds.
    pub duration: f64,
    pub streets: Vec<StreetRecord>,
    #[serde(default)]
    pub hero: Option<String>,
    #[serde(default)]
    pub villain: Option<String>,
}

impl Hand {
    pub fn from_json(data: &[u8]) -> Result<Self, PlayerError> {
        serde_json::from_slice(data)
            .map_err(|e| PlayerError::HandError(format!("Invalid hand JSON: {}", e)))
    }

    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, PlayerError> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await.map_err(|e| {
            PlayerError::HandError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&data)
    }
}

use serde::Deserialize;
use std::time::Duration;

/// Tunables for a player session, usually embedded as a `[player]` table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlayerSettings {
    /// Maximum distance in seconds for a nearest-action hit.
    #[serde(default = "default_nearest_epsilon")]
    pub nearest_epsilon: f64,
    /// Remaining URL lifetime below which a warning is raised.
    #[serde(default = "default_expiration_warning", with = "humantime_serde")]
    pub expiration_warning: Duration,
    #[serde(default = "default_tick", with = "humantime_serde")]
    pub tick: Duration,
}

fn default_nearest_epsilon() -> f64 {
    0.5
}

fn default_expiration_warning() -> Duration {
    Duration::from_secs(300)
}

fn default_tick() -> Duration {
    Duration::from_secs(1)
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            nearest_epsilon: default_nearest_epsilon(),
            expiration_warning: default_expiration_warning(),
            tick: default_tick(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_table_uses_defaults() {
        let settings: PlayerSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, PlayerSettings::default());
    }

    #[test]
    fn durations_are_human_readable() {
        let settings: PlayerSettings = serde_json::from_str(
            r#"{"nearest_epsilon": 0.25, "expiration_warning": "2m", "tick": "500ms"}"#,
        )
        .unwrap();
        assert_eq!(settings.nearest_epsilon, 0.25);
        assert_eq!(settings.expiration_warning, Duration::from_secs(120));
        assert_eq!(settings.tick, Duration::from_millis(500));
    }
}

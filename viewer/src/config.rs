use player::PlayerSettings;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for the viewer
#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub runtime: Runtime,
    #[serde(default)]
    pub issuer: Issuer,
    #[serde(default)]
    pub player: PlayerSettings,
    #[serde(default)]
    pub sink: SinkSettings,
}

#[derive(Debug, Deserialize)]
pub struct Runtime {
    #[serde(default = "Runtime::default_threads")]
    pub threads: Option<usize>,
}

impl Runtime {
    fn default_threads() -> Option<usize> {
        Some(1)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self {
            threads: Self::default_threads(),
        }
    }
}

/// Where signed video links come from
#[derive(Debug, Deserialize)]
pub struct Issuer {
    #[serde(default = "Issuer::default_url")]
    pub url: String,
}

impl Issuer {
    fn default_url() -> String {
        "http://127.0.0.1:9092".to_string()
    }
}

impl Default for Issuer {
    fn default() -> Self {
        Self {
            url: Self::default_url(),
        }
    }
}

/// Simulated playback
#[derive(Debug, Clone, Deserialize)]
pub struct SinkSettings {
    /// Interval between time updates
    #[serde(default = "SinkSettings::default_poll", with = "humantime_serde")]
    pub poll: Duration,
    /// How often the link is probed again while playing
    #[serde(default = "SinkSettings::default_recheck", with = "humantime_serde")]
    pub recheck: Duration,
    /// Retries for retryable errors before giving up
    #[serde(default = "SinkSettings::default_retries")]
    pub retries: u32,
}

impl SinkSettings {
    fn default_poll() -> Duration {
        Duration::from_millis(250)
    }

    fn default_recheck() -> Duration {
        Duration::from_secs(30)
    }

    fn default_retries() -> u32 {
        3
    }
}

impl Default for SinkSettings {
    fn default() -> Self {
        Self {
            poll: Self::default_poll(),
            recheck: Self::default_recheck(),
            retries: Self::default_retries(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings.runtime.threads, Some(1));
        assert_eq!(settings.issuer.url, "http://127.0.0.1:9092");
        assert_eq!(settings.player, PlayerSettings::default());
        assert_eq!(settings.sink.poll, Duration::from_millis(250));
        assert_eq!(settings.sink.retries, 3);
    }

    #[test]
    fn player_section_overrides() {
        let settings: Settings = toml::from_str(
            r#"
            [issuer]
            url = "http://signer.local:9092/api"

            [player]
            nearest_epsilon = 1.0
            expiration_warning = "1m"

            [sink]
            poll = "100ms"
            recheck = "5s"
            "#,
        )
        .unwrap();
        assert_eq!(settings.issuer.url, "http://signer.local:9092/api");
        assert_eq!(settings.player.nearest_epsilon, 1.0);
        assert_eq!(settings.player.expiration_warning, Duration::from_secs(60));
        assert_eq!(settings.player.tick, Duration::from_secs(1));
        assert_eq!(settings.sink.recheck, Duration::from_secs(5));
    }
}

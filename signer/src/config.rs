use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for the signer
#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub runtime: Runtime,
    #[serde(default)]
    pub http: HttpServer,
    pub storage: Storage,
    pub signing: Signing,
}

#[derive(Debug, Default, Deserialize)]
pub struct Runtime {
    pub threads: Option<usize>,
}

/// HTTP server configuration
#[derive(Debug, Deserialize)]
pub struct HttpServer {
    #[serde(default = "HttpServer::default_addr")]
    pub addr: String,
    /// Base for issued links; the request's Host header is used when unset.
    pub public_url: Option<String>,
    #[serde(default = "HttpServer::default_shutdown_timeout", with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

impl HttpServer {
    fn default_addr() -> String {
        "0.0.0.0:9092".to_string()
    }

    fn default_shutdown_timeout() -> Duration {
        Duration::from_secs(30)
    }
}

impl Default for HttpServer {
    fn default() -> Self {
        Self {
            addr: Self::default_addr(),
            public_url: None,
            shutdown_timeout: Self::default_shutdown_timeout(),
        }
    }
}

/// Directory holding `{hand_id}.mp4` files
#[derive(Debug, Deserialize)]
pub struct Storage {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct Signing {
    pub secret: String,
    /// Lifetime of an issued link
    #[serde(default = "Signing::default_ttl", with = "humantime_serde")]
    pub ttl: Duration,
}

impl Signing {
    fn default_ttl() -> Duration {
        Duration::from_secs(3600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config() {
        let settings: Settings = toml::from_str(
            r#"
            [storage]
            path = "/var/lib/hands"

            [signing]
            secret = "dev"
            "#,
        )
        .unwrap();
        assert_eq!(settings.http.addr, "0.0.0.0:9092");
        assert_eq!(settings.http.public_url, None);
        assert_eq!(settings.signing.ttl, Duration::from_secs(3600));
        assert_eq!(settings.runtime.threads, None);
    }

    #[test]
    fn full_config() {
        let settings: Settings = toml::from_str(
            r#"
            [runtime]
            threads = 2

            [http]
            addr = ":9100"
            public_url = "http://videos.local:9100"
            shutdown_timeout = "5s"

            [storage]
            path = "./videos"

            [signing]
            secret = "s3cr3t"
            ttl = "10m"
            "#,
        )
        .unwrap();
        assert_eq!(settings.runtime.threads, Some(2));
        assert_eq!(settings.http.addr, ":9100");
        assert_eq!(settings.http.shutdown_timeout, Duration::from_secs(5));
        assert_eq!(settings.signing.ttl, Duration::from_secs(600));
    }
}

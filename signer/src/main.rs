mod config;
mod error;
mod service;
mod signing;
mod storage;

use crate::config::Settings;
use crate::error::SignerError;
use crate::service::SignerService;
use crate::signing::UrlSigner;
use crate::storage::VideoStorage;
use clap::Parser as ClapParser;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use std::sync::Arc;
use std::{fs, pin, process};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{debug, error, info};

#[derive(ClapParser, Debug)]
#[command(version)]
struct Cli {
    #[arg(short, long, default_value = "signer.toml")]
    config: String,
}

fn main() {
    common::logging::init("info");

    let cli = Cli::parse();
    let settings = match build_settings(cli.config.as_str()) {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let runtime = match common::runtime::build(settings.runtime.threads) {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("failed to create runtime: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(&settings)) {
        error!("Server error: {}", e);
        process::exit(1);
    }

    info!("done");
}

pub async fn run(settings: &Settings) -> Result<(), SignerError> {
    let addr = common::socket::parse_address(&settings.http.addr)
        .map_err(|e| SignerError::NetworkError(e.to_string()))?;
    let socket = common::socket::listen_reuse_socket(&addr, None)
        .map_err(|e| SignerError::NetworkError(e.to_string()))?;
    let listener = TcpListener::from_std(socket.into())
        .map_err(|e| SignerError::NetworkError(e.to_string()))?;

    info!("Listening on http://{}", addr);

    let storage = VideoStorage::new(settings.storage.path.clone());
    let signer = UrlSigner::new(&settings.signing.secret, settings.signing.ttl);
    let service = SignerService::new(storage, signer, settings.http.public_url.clone());
    let http = http1::Builder::new();

    let notifier = Arc::new(Notify::new());
    common::systemd::run(notifier.clone());

    let graceful = hyper_util::server::graceful::GracefulShutdown::new();
    let mut signal = pin::pin!(notifier.notified());

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, remote_addr) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        error!("accept: {}", e);
                        continue;
                    }
                };
                debug!("Connection accepted from {}", remote_addr);
                let conn = http.serve_connection(TokioIo::new(stream), service.clone());
                let fut = graceful.watch(conn);
                tokio::spawn(async move {
                    if let Err(e) = fut.await {
                        error!("Connection error: {:?}", e);
                    }
                });
            },
            _ = &mut signal => {
                info!("http server: graceful shutdown");
                break;
            }
        }
    }

    tokio::select! {
        _ = graceful.shutdown() => {
            info!("http server: all connections gracefully closed");
        },
        _ = tokio::time::sleep(settings.http.shutdown_timeout) => {
            info!("http server: timed out waiting for connections to close");
        }
    }
    Ok(())
}

fn build_settings(config_path: &str) -> Result<Settings, SignerError> {
    let data = fs::read_to_string(config_path).map_err(|_| {
        SignerError::ConfigError(format!("Config file '{}' does not exist", config_path))
    })?;

    toml::from_str(&data)
        .map_err(|e| SignerError::ConfigError(format!("Invalid configuration: {}", e)))
}

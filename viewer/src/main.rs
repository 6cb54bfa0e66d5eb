mod config;
mod error;
mod sink;

use crate::config::Settings;
use crate::error::ViewerError;
use crate::sink::HttpSink;
use clap::Parser as ClapParser;
use player::time::format_time;
use player::{
    ActionMarker, Hand, HttpIssuer, Player, PlayerHandle, PlayerSnapshot, PlayerStatus,
    Recovery, ResourceManager, Street, SystemClock, Timeline,
};
use std::sync::Arc;
use std::{fs, process};
use tokio::sync::{mpsc, Notify};
use tracing::{error, info, warn};

#[derive(ClapParser, Debug)]
#[command(version)]
struct Cli {
    /// Configuration file; defaults are used when omitted
    #[arg(short, long)]
    config: Option<String>,

    /// Print the timeline and exit
    #[arg(short, long)]
    print: bool,

    /// Start position in seconds
    #[arg(short, long)]
    seek: Option<f64>,

    /// Playback rate
    #[arg(short, long)]
    rate: Option<f64>,

    /// Hand history JSON
    hand: String,
}

fn main() {
    common::logging::init("info");

    let cli = Cli::parse();
    let settings = match build_settings(cli.config.as_deref()) {
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

    if let Err(e) = runtime.block_on(run(&cli, &settings)) {
        error!("{}", e);
        process::exit(1);
    }
}

async fn run(cli: &Cli, settings: &Settings) -> Result<(), ViewerError> {
    let hand = Hand::from_file(&cli.hand).await?;
    let timeline = Timeline::new(&hand.streets, hand.duration);
    print_timeline(&hand, &timeline);
    if cli.print {
        return Ok(());
    }

    let issuer = HttpIssuer::new(&settings.issuer.url)?;
    let resources = ResourceManager::new(
        &hand.id,
        Arc::new(issuer),
        Arc::new(SystemClock),
        settings.player.expiration_warning,
    );

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let sink = HttpSink::spawn(events_tx, hand.duration, &settings.sink);
    let (player, handle) = Player::new(&settings.player, &hand, resources, sink, events_rx);
    let task = tokio::spawn(player.run());

    if let Some(rate) = cli.rate {
        handle.set_playback_rate(rate)?;
    }
    if let Some(seek) = cli.seek {
        handle.seek(seek)?;
    }
    handle.play()?;

    let notifier = Arc::new(Notify::new());
    common::systemd::run(notifier.clone());

    let result = watch(&handle, settings.sink.retries, notifier).await;
    handle.shutdown();
    if let Err(e) = task.await {
        error!("player task: {}", e);
    }
    result
}

/// Follows the player until the hand ends, a terminal error or a signal.
async fn watch(
    handle: &PlayerHandle,
    retries: u32,
    notifier: Arc<Notify>,
) -> Result<(), ViewerError> {
    let mut snapshots = handle.subscribe();
    let mut signal = std::pin::pin!(notifier.notified());
    let mut progress = Progress::default();
    let mut retries_left = retries;

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
            }
            _ = &mut signal => {
                info!("stopping");
                return Ok(());
            }
        }

        let snapshot = snapshots.borrow_and_update().clone();
        progress.report(handle, &snapshot);

        if snapshot.expiration_warning && !progress.refreshed {
            progress.refreshed = true;
            let handle = handle.clone();
            tokio::spawn(async move {
                match handle.refresh_url().await {
                    Ok(resource) => info!("link refreshed, valid until {}", resource.expires_at),
                    Err(e) => warn!("link refresh failed: {}", e),
                }
            });
        }
        if !snapshot.expiration_warning {
            progress.refreshed = false;
        }

        if let Some(e) = &snapshot.error {
            if progress.reported.as_ref() != Some(e) {
                error!("{} ({})", e.message, e.details);
                progress.reported = Some(e.clone());

                if e.recovery() == Recovery::Terminal || retries_left == 0 {
                    return Err(ViewerError::Player(e.clone().into()));
                }
                retries_left -= 1;
                info!("retrying ({} left)", retries_left);
                handle.retry()?;
            }
        } else {
            progress.reported = None;
        }

        if snapshot.status == PlayerStatus::Ended {
            info!("end of hand at {}", format_time(snapshot.playback.current_time));
            return Ok(());
        }
    }
}

#[derive(Default)]
struct Progress {
    time: f64,
    street: Option<Street>,
    // a refresh was requested for the current warning
    refreshed: bool,
    reported: Option<player::PlaybackError>,
}

impl Progress {
    fn report(&mut self, handle: &PlayerHandle, snapshot: &PlayerSnapshot) {
        let now = snapshot.playback.current_time;
        if snapshot.current_street != self.street {
            if let Some(street) = snapshot.current_street {
                info!("{} {}", format_time(now), street);
            }
            self.street = snapshot.current_street;
        }

        if now > self.time {
            for marker in handle.timeline().markers_between(self.time, now) {
                info!("{} {}", format_time(marker.time), describe(marker));
            }
        }
        self.time = now;
    }
}

fn describe(marker: &ActionMarker) -> String {
    let action = &marker.action;
    let mut text = action.player.clone().unwrap_or_else(|| "dealer".to_string());
    text.push(' ');
    text.push_str(action.kind.as_str());
    if let Some(amount) = action.amount {
        text.push_str(&format!(" {}", amount));
    }
    text
}

fn print_timeline(hand: &Hand, timeline: &Timeline) {
    println!("hand {} ({})", hand.id, format_time(timeline.duration()));
    if let (Some(hero), Some(villain)) = (&hand.hero, &hand.villain) {
        println!("{} vs {}", hero, villain);
    }

    for segment in timeline.segments() {
        let cards = if segment.community_cards.is_empty() {
            String::new()
        } else {
            format!("  [{}]", segment.community_cards.join(" "))
        };
        println!(
            "{:<8} {:>8} - {:<8} {:>6.2}%{}",
            segment.street.as_str(),
            format_time(segment.start_time),
            format_time(segment.end_time),
            segment.width_percent,
            cards
        );
    }

    for marker in timeline.markers() {
        println!(
            "  {:>8} {:>6.2}% {:<10} {:?}",
            format_time(marker.time),
            marker.position_percent,
            describe(marker),
            marker.category
        );
    }
}

fn build_settings(config_path: Option<&str>) -> Result<Settings, ViewerError> {
    let Some(config_path) = config_path else {
        return Ok(Settings::default());
    };
    let data = fs::read_to_string(config_path).map_err(|_| {
        ViewerError::ConfigError(format!("Config file '{}' does not exist", config_path))
    })?;

    toml::from_str(&data)
        .map_err(|e| ViewerError::ConfigError(format!("Invalid configuration: {}", e)))
}

//! Session actor tying the timeline, the playback machine and the signed URL
//! together.
//!
//! Everything that mutates a session runs on one task: commands from the
//! view, sink events, refresh completions and the expiration tick are all
//! handled inside a single `select!` loop, and the view only ever sees
//! [`PlayerSnapshot`]s published over a `watch` channel.

use crate::classifier::{self, ErrorCode, PlaybackError};
use crate::config::PlayerSettings;
use crate::error::PlayerError;
use crate::hand::{Hand, Street};
use crate::playback::{PlaybackMachine, PlaybackState, PlayerStatus};
use crate::resource::{Expiration, ResourceManager, VideoResource};
use crate::sink::{MediaSink, SinkEvent, SinkEventKind};
use crate::time::percent_to_time;
use crate::timeline::{ActionMarker, Timeline};
use futures_util::future::{BoxFuture, FutureExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch, Notify};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

type Reply = oneshot::Sender<Result<VideoResource, PlayerError>>;

#[derive(Debug)]
enum Command {
    Play,
    Pause,
    Seek(f64),
    SetVolume(f64),
    ToggleMute,
    SetPlaybackRate(f64),
    ToggleFullscreen,
    RefreshUrl(Reply),
    Retry,
}

/// Read-only view of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub status: PlayerStatus,
    pub playback: PlaybackState,
    /// Generation of the source the sink is attached to.
    pub generation: u64,
    /// Seconds left on the signed URL, negative once expired.
    pub expires_in: Option<f64>,
    pub expiration_warning: bool,
    pub error: Option<PlaybackError>,
    pub current_street: Option<Street>,
}

/// Cloneable front of a running [`Player`].
#[derive(Clone)]
pub struct PlayerHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<PlayerSnapshot>,
    timeline: Arc<Timeline>,
    shutdown: Arc<Notify>,
    nearest_epsilon: f64,
}

impl PlayerHandle {
    fn send(&self, command: Command) -> Result<(), PlayerError> {
        self.commands.send(command).map_err(|_| PlayerError::Closed)
    }

    pub fn play(&self) -> Result<(), PlayerError> {
        self.send(Command::Play)
    }

    pub fn pause(&self) -> Result<(), PlayerError> {
        self.send(Command::Pause)
    }

    pub fn seek(&self, time: f64) -> Result<(), PlayerError> {
        self.send(Command::Seek(time))
    }

    /// Seeks to a position on the progress bar, in percent.
    pub fn seek_percent(&self, percent: f64) -> Result<(), PlayerError> {
        let reported = self.snapshots.borrow().playback.duration;
        let duration = if reported > 0.0 {
            reported
        } else {
            self.timeline.duration()
        };
        self.seek(percent_to_time(percent, duration))
    }

    pub fn set_volume(&self, volume: f64) -> Result<(), PlayerError> {
        self.send(Command::SetVolume(volume))
    }

    pub fn toggle_mute(&self) -> Result<(), PlayerError> {
        self.send(Command::ToggleMute)
    }

    pub fn set_playback_rate(&self, rate: f64) -> Result<(), PlayerError> {
        self.send(Command::SetPlaybackRate(rate))
    }

    pub fn toggle_fullscreen(&self) -> Result<(), PlayerError> {
        self.send(Command::ToggleFullscreen)
    }

    /// Fetches a new signed URL and re-attaches the sink at the current
    /// position. Overlapping calls share one request.
    pub async fn refresh_url(&self) -> Result<VideoResource, PlayerError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::RefreshUrl(tx))?;
        rx.await.map_err(|_| PlayerError::Closed)?
    }

    /// Re-runs the recovery path of the last retryable error.
    pub fn retry(&self) -> Result<(), PlayerError> {
        self.send(Command::Retry)
    }

    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlayerSnapshot> {
        self.snapshots.clone()
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Action under the pointer, within the configured epsilon.
    pub fn nearest_action(&self, time: f64) -> Option<&ActionMarker> {
        self.timeline.nearest_action(time, self.nearest_epsilon)
    }
}

/// Synchronous core of a session. The actor feeds it inputs one at a time
/// and starts a refresh whenever `refresh_wanted` is raised.
struct Session<S> {
    machine: PlaybackMachine<S>,
    timeline: Arc<Timeline>,
    resources: ResourceManager,
    error: Option<PlaybackError>,
    // an expired-URL failure may trigger one automatic refresh; re-armed
    // when a source reaches ready
    recovery_armed: bool,
    recovering: bool,
    refresh_wanted: bool,
    surface_refresh_failure: bool,
    play_after_refresh: bool,
    seek_after_refresh: Option<f64>,
    waiters: Vec<Reply>,
    expiration: Expiration,
}

impl<S: MediaSink> Session<S> {
    fn new(machine: PlaybackMachine<S>, timeline: Arc<Timeline>, resources: ResourceManager) -> Self {
        Self {
            machine,
            timeline,
            resources,
            error: None,
            recovery_armed: true,
            recovering: false,
            refresh_wanted: false,
            surface_refresh_failure: false,
            play_after_refresh: false,
            seek_after_refresh: None,
            waiters: Vec::new(),
            expiration: Expiration::Unknown,
        }
    }

    fn request_refresh(&mut self, surface_failure: bool) {
        self.refresh_wanted = true;
        self.surface_refresh_failure |= surface_failure;
    }

    fn start(&mut self) {
        info!("loading video for hand {}", self.resources.hand_id());
        self.request_refresh(true);
    }

    fn on_command(&mut self, command: Command) {
        debug!("command {:?}", command);
        match command {
            Command::Play => {
                let active = matches!(
                    self.machine.status(),
                    PlayerStatus::Paused | PlayerStatus::Ended
                );
                if active && self.recover_expired() {
                    self.play_after_refresh = true;
                } else if let Err(e) = self.machine.play() {
                    warn!("{}", e);
                }
            }
            Command::Pause => {
                self.play_after_refresh = false;
                if let Err(e) = self.machine.pause() {
                    warn!("{}", e);
                }
            }
            Command::Seek(time) => {
                let active = matches!(
                    self.machine.status(),
                    PlayerStatus::Playing
                        | PlayerStatus::Paused
                        | PlayerStatus::Seeking
                        | PlayerStatus::Ended
                );
                if active && self.recover_expired() {
                    self.seek_after_refresh = Some(time);
                } else {
                    self.machine.seek(time);
                }
            }
            Command::SetVolume(volume) => self.machine.set_volume(volume),
            Command::ToggleMute => self.machine.toggle_mute(),
            Command::SetPlaybackRate(rate) => self.machine.set_playback_rate(rate),
            Command::ToggleFullscreen => self.machine.toggle_fullscreen(),
            Command::RefreshUrl(reply) => {
                self.waiters.push(reply);
                self.request_refresh(false);
            }
            Command::Retry => self.retry(),
        }
    }

    /// Playback attempt against an expired URL: refresh instead of handing
    /// the command to the sink.
    fn recover_expired(&mut self) -> bool {
        let Some(error) = self.resources.expired_error() else {
            return false;
        };
        info!("{}, refreshing before playback", error.details);
        self.recovering = true;
        self.request_refresh(true);
        true
    }

    fn retry(&mut self) {
        let Some(error) = self.error.take() else {
            debug!("retry: nothing to recover from");
            return;
        };
        if error.is_terminal() {
            warn!("retry: {} is not retryable", error.code);
            self.error = Some(error);
            return;
        }

        info!("retry after {}", error.code);
        // the automatic refresh ran and its source never became ready, so the
        // committed URL is the one that was rejected
        let stale = !self.recovery_armed
            || error.code == ErrorCode::UrlExpired
            || self.resources.expiration() == Expiration::Expired;
        match self.resources.current() {
            Some(resource) if !stale => {
                self.machine.attach(&resource.url, resource.generation)
            }
            _ => {
                self.recovering = true;
                self.request_refresh(true);
            }
        }
    }

    fn on_sink_event(&mut self, event: SinkEvent) {
        let loading = self.machine.status() == PlayerStatus::Loading;
        let ready = matches!(event.kind, SinkEventKind::Ready { .. });
        let generation = event.generation;

        let Some(failure) = self.machine.handle(event) else {
            if ready && loading && self.machine.status() != PlayerStatus::Loading {
                self.resources.commit(generation);
                self.recovery_armed = true;
                info!("source generation {} ready", generation);
            }
            return;
        };

        if self.recovering {
            debug!("ignoring {:?} while recovering", failure);
            return;
        }

        let error = classifier::classify(&failure, self.resources.expiration());
        if error.code != ErrorCode::UrlExpired {
            self.surface(error);
        } else if self.recovery_armed {
            info!("{}, refreshing", error);
            self.recovery_armed = false;
            self.recovering = true;
            self.request_refresh(true);
        } else {
            // the refreshed URL was rejected as well
            self.surface(classifier::refresh_failed(error));
        }
    }

    fn on_refresh(&mut self, result: Result<VideoResource, PlayerError>) {
        let surface = std::mem::take(&mut self.surface_refresh_failure);
        let waiters = std::mem::take(&mut self.waiters);
        self.recovering = false;

        match result {
            Ok(resource) => {
                self.error = None;
                self.machine.attach(&resource.url, resource.generation);
                if std::mem::take(&mut self.play_after_refresh) {
                    if let Err(e) = self.machine.play() {
                        warn!("{}", e);
                    }
                }
                if let Some(time) = self.seek_after_refresh.take() {
                    self.machine.seek(time);
                }
                for waiter in waiters {
                    let _ = waiter.send(Ok(resource.clone()));
                }
            }
            Err(e) => {
                self.play_after_refresh = false;
                for waiter in waiters {
                    let _ = waiter.send(Err(e.clone()));
                }
                match e {
                    PlayerError::Cancelled => {}
                    PlayerError::Playback(error) if surface => self.surface(error),
                    e if surface => self.surface(classifier::refresh_failed(e)),
                    e => warn!("refresh: {}", e),
                }
                if let Some(time) = self.seek_after_refresh.take() {
                    self.machine.seek(time);
                }
            }
        }
    }

    fn surface(&mut self, error: PlaybackError) {
        warn!("playback error: {}", error);
        self.resources.discard_pending(self.machine.generation());
        self.machine.fail();
        self.error = Some(error);
    }

    fn on_tick(&mut self) {
        let expiration = self.resources.expiration();
        if expiration == self.expiration {
            return;
        }
        let left = self.resources.time_until_expiration().unwrap_or(0.0);
        match expiration {
            Expiration::Warning => warn!("video link expires in {:.0}s", left),
            Expiration::Expired => warn!("video link expired {:.0}s ago", -left),
            Expiration::Valid | Expiration::Unknown => {
                debug!("video link valid for {:.0}s", left)
            }
        }
        self.expiration = expiration;
    }

    fn teardown(&mut self) {
        self.resources.close();
        self.machine.detach();
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(Err(PlayerError::Cancelled));
        }
        info!("player for hand {} stopped", self.resources.hand_id());
    }

    fn snapshot(&self) -> PlayerSnapshot {
        let playback = self.machine.state().clone();
        let current_street = self.timeline.street_at(playback.current_time);
        let expiration = self.resources.expiration();
        PlayerSnapshot {
            status: self.machine.status(),
            generation: self.machine.generation(),
            expires_in: self.resources.time_until_expiration(),
            expiration_warning: matches!(expiration, Expiration::Warning | Expiration::Expired),
            error: self.error.clone(),
            current_street,
            playback,
        }
    }
}

/// Single-task player actor. Build with [`Player::new`] and drive with
/// [`Player::run`]; interact through the returned [`PlayerHandle`].
pub struct Player<S> {
    session: Session<S>,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedReceiver<SinkEvent>,
    snapshots: watch::Sender<PlayerSnapshot>,
    shutdown: Arc<Notify>,
    tick: Duration,
    refresh: Option<BoxFuture<'static, Result<VideoResource, PlayerError>>>,
}

impl<S: MediaSink> Player<S> {
    /// `events` is the receiving end of the channel the sink reports on.
    pub fn new(
        settings: &PlayerSettings,
        hand: &Hand,
        resources: ResourceManager,
        sink: S,
        events: mpsc::UnboundedReceiver<SinkEvent>,
    ) -> (Self, PlayerHandle) {
        let timeline = Arc::new(Timeline::new(&hand.streets, hand.duration));
        let machine = PlaybackMachine::new(sink).with_duration(timeline.duration());
        let session = Session::new(machine, timeline.clone(), resources);

        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (snapshots, snapshots_rx) = watch::channel(session.snapshot());
        let shutdown = Arc::new(Notify::new());

        let handle = PlayerHandle {
            commands: commands_tx,
            snapshots: snapshots_rx,
            timeline,
            shutdown: shutdown.clone(),
            nearest_epsilon: settings.nearest_epsilon,
        };
        let player = Self {
            session,
            commands,
            events,
            snapshots,
            shutdown,
            tick: settings.tick,
            refresh: None,
        };

        (player, handle)
    }

    /// Runs until [`PlayerHandle::shutdown`] is called or every handle is
    /// dropped.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.session.start();
        self.start_refresh();
        self.publish();

        loop {
            tokio::select! {
                _ = self.shutdown.notified() => break,
                command = self.commands.recv() => match command {
                    Some(command) => self.session.on_command(command),
                    None => break,
                },
                Some(event) = self.events.recv() => self.session.on_sink_event(event),
                result = wait_refresh(&mut self.refresh) => {
                    self.refresh = None;
                    self.session.on_refresh(result);
                }
                _ = ticker.tick() => self.session.on_tick(),
            }

            self.start_refresh();
            self.publish();
        }

        // commands already queued will never run
        self.commands.close();
        while let Ok(command) = self.commands.try_recv() {
            if let Command::RefreshUrl(reply) = command {
                let _ = reply.send(Err(PlayerError::Cancelled));
            }
        }
        self.refresh = None;
        self.session.teardown();
        self.publish();
    }

    fn start_refresh(&mut self) {
        if !std::mem::take(&mut self.session.refresh_wanted) || self.refresh.is_some() {
            return;
        }
        let resources = self.session.resources.clone();
        self.refresh = Some(async move { resources.refresh().await }.boxed());
    }

    fn publish(&self) {
        let snapshot = self.session.snapshot();
        self.snapshots.send_if_modified(|current| {
            if *current == snapshot {
                return false;
            }
            *current = snapshot;
            true
        });
    }
}

async fn wait_refresh(
    refresh: &mut Option<BoxFuture<'static, Result<VideoResource, PlayerError>>>,
) -> Result<VideoResource, PlayerError> {
    match refresh {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

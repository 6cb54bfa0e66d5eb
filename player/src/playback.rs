use crate::error::PlayerError;
use crate::sink::{MediaSink, SinkCommand, SinkCommandKind, SinkEvent, SinkEventKind, SinkFailure};
use serde::Serialize;
use std::fmt;
use tracing::{debug, trace};

pub const MIN_PLAYBACK_RATE: f64 = 0.25;
pub const MAX_PLAYBACK_RATE: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStatus {
    Idle,
    Loading,
    Playing,
    Paused,
    Seeking,
    Ended,
    Error,
}

impl fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlayerStatus::Idle => "idle",
            PlayerStatus::Loading => "loading",
            PlayerStatus::Playing => "playing",
            PlayerStatus::Paused => "paused",
            PlayerStatus::Seeking => "seeking",
            PlayerStatus::Ended => "ended",
            PlayerStatus::Error => "failed",
        };
        f.write_str(name)
    }
}

/// What the view renders for the transport bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub current_time: f64,
    pub duration: f64,
    pub is_playing: bool,
    pub volume: f64,
    pub is_muted: bool,
    pub playback_rate: f64,
    pub is_fullscreen: bool,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            current_time: 0.0,
            duration: 0.0,
            is_playing: false,
            volume: 1.0,
            is_muted: false,
            playback_rate: 1.0,
            is_fullscreen: false,
        }
    }
}

/// Transport state machine in front of a [`MediaSink`].
///
/// Position, duration, end of media and failures only ever change through
/// sink events. Every transport command takes the next sequence number and
/// every source load carries the resource generation, so late or reordered
/// events from an older command or an older URL are dropped in [`handle`].
///
/// [`handle`]: PlaybackMachine::handle
#[derive(Debug)]
pub struct PlaybackMachine<S> {
    sink: S,
    status: PlayerStatus,
    state: PlaybackState,
    generation: u64,
    // last transport command issued
    seq: u64,
    // the load that started the current source
    load_seq: u64,
    // last command that moved the playhead (load or seek)
    position_seq: u64,
    // highest sequence number admitted so far
    acked_seq: u64,
    want_play: bool,
    play_pending: bool,
    seek_resume: bool,
    sink_playing: bool,
    resume_at: Option<f64>,
    // target of a seek the sink has not confirmed yet
    seek_target: Option<f64>,
}

impl<S: MediaSink> PlaybackMachine<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            status: PlayerStatus::Idle,
            state: PlaybackState::default(),
            generation: 0,
            seq: 0,
            load_seq: 0,
            position_seq: 0,
            acked_seq: 0,
            want_play: false,
            play_pending: false,
            seek_resume: false,
            sink_playing: false,
            resume_at: None,
            seek_target: None,
        }
    }

    /// Duration to clamp seeks against until the sink reports its own.
    pub fn with_duration(mut self, duration: f64) -> Self {
        self.set_duration(duration);
        self
    }

    pub fn status(&self) -> PlayerStatus {
        self.status
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Whether the user wants media to be playing, regardless of whether the
    /// sink has caught up yet.
    pub fn playing_intent(&self) -> bool {
        match self.status {
            PlayerStatus::Playing => true,
            PlayerStatus::Seeking => self.seek_resume,
            PlayerStatus::Paused => self.play_pending,
            PlayerStatus::Ended => false,
            PlayerStatus::Idle | PlayerStatus::Loading | PlayerStatus::Error => self.want_play,
        }
    }

    /// Points the sink at a new source. The current position and playing
    /// intent carry over and are re-applied once the sink reports ready.
    pub fn attach(&mut self, url: &str, generation: u64) {
        let intent = self.playing_intent();
        let resume = self
            .resume_at
            .take()
            .or(self.seek_target.take())
            .unwrap_or(self.state.current_time);

        self.want_play = intent;
        self.resume_at = (resume > 0.0).then_some(resume);
        self.play_pending = false;
        self.seek_resume = false;
        self.sink_playing = false;
        self.generation = generation;
        self.status = PlayerStatus::Loading;

        let seq = self.transport(SinkCommandKind::Load {
            url: url.to_string(),
        });
        self.load_seq = seq;
        self.position_seq = seq;
        debug!(
            "attach generation {} (resume at {:?}, play: {})",
            generation, self.resume_at, intent
        );
    }

    pub fn detach(&mut self) {
        self.setting(SinkCommandKind::Detach);
        self.status = PlayerStatus::Idle;
        self.state.is_playing = false;
        self.sink_playing = false;
        self.play_pending = false;
        self.seek_target = None;
    }

    pub fn play(&mut self) -> Result<(), PlayerError> {
        match self.status {
            PlayerStatus::Idle | PlayerStatus::Loading => {
                self.want_play = true;
                Ok(())
            }
            PlayerStatus::Paused | PlayerStatus::Ended => {
                if !self.play_pending {
                    self.transport(SinkCommandKind::Play);
                    self.play_pending = true;
                }
                Ok(())
            }
            PlayerStatus::Playing => Ok(()),
            status => Err(PlayerError::InvalidTransition {
                command: "play",
                status,
            }),
        }
    }

    pub fn pause(&mut self) -> Result<(), PlayerError> {
        match self.status {
            PlayerStatus::Playing | PlayerStatus::Seeking => {
                self.transport(SinkCommandKind::Pause);
                self.status = PlayerStatus::Paused;
                self.state.is_playing = false;
                self.seek_resume = false;
                self.play_pending = false;
                Ok(())
            }
            PlayerStatus::Paused => {
                if self.play_pending {
                    self.transport(SinkCommandKind::Pause);
                    self.play_pending = false;
                    self.state.is_playing = false;
                }
                Ok(())
            }
            PlayerStatus::Idle | PlayerStatus::Loading => {
                self.want_play = false;
                self.state.is_playing = false;
                Ok(())
            }
            status => Err(PlayerError::InvalidTransition {
                command: "pause",
                status,
            }),
        }
    }

    /// Seeks to `time`, clamped to `[0, duration]`. Without a loaded source
    /// the position is remembered and applied on the next load.
    pub fn seek(&mut self, time: f64) {
        let target = self.clamp_time(time);
        match self.status {
            PlayerStatus::Playing
            | PlayerStatus::Paused
            | PlayerStatus::Ended
            | PlayerStatus::Seeking => {
                self.seek_resume = self.playing_intent();
                self.play_pending = false;
                self.position_seq = self.transport(SinkCommandKind::Seek { time: target });
                self.seek_target = Some(target);
                self.status = PlayerStatus::Seeking;
            }
            PlayerStatus::Idle | PlayerStatus::Loading | PlayerStatus::Error => {
                self.resume_at = Some(target);
            }
        }
    }

    pub fn set_volume(&mut self, volume: f64) {
        if volume.is_nan() {
            return;
        }
        self.state.volume = volume.clamp(0.0, 1.0);
        self.setting(SinkCommandKind::SetVolume(self.state.volume));
    }

    pub fn toggle_mute(&mut self) {
        self.state.is_muted = !self.state.is_muted;
        self.setting(SinkCommandKind::SetMuted(self.state.is_muted));
    }

    pub fn set_playback_rate(&mut self, rate: f64) {
        if rate.is_nan() {
            return;
        }
        self.state.playback_rate = rate.clamp(MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE);
        self.setting(SinkCommandKind::SetRate(self.state.playback_rate));
    }

    pub fn toggle_fullscreen(&mut self) {
        self.state.is_fullscreen = !self.state.is_fullscreen;
        self.setting(SinkCommandKind::SetFullscreen(self.state.is_fullscreen));
    }

    /// Puts the machine in the error state, keeping the playing intent so a
    /// retry can pick up where playback stopped.
    pub fn fail(&mut self) {
        self.want_play = self.playing_intent();
        self.status = PlayerStatus::Error;
        self.state.is_playing = false;
        self.play_pending = false;
        self.seek_resume = false;
    }

    /// Applies a sink event. Failures are handed back to the caller for
    /// classification; the machine itself does not change state for them.
    pub fn handle(&mut self, event: SinkEvent) -> Option<SinkFailure> {
        if !self.admit(&event) {
            trace!(
                "dropping stale event {:?} (generation {}, seq {})",
                event.kind,
                event.generation,
                event.seq
            );
            return None;
        }

        // a newer transport command supersedes this acknowledgement
        let latest = event.seq >= self.seq;
        match event.kind {
            SinkEventKind::Ready { duration } => self.on_ready(duration),
            SinkEventKind::Playing => {
                self.sink_playing = true;
                if latest
                    && matches!(
                        self.status,
                        PlayerStatus::Paused | PlayerStatus::Playing | PlayerStatus::Ended
                    )
                {
                    self.play_pending = false;
                    self.status = PlayerStatus::Playing;
                    self.state.is_playing = true;
                }
            }
            SinkEventKind::Paused => {
                self.sink_playing = false;
                if latest && self.status == PlayerStatus::Playing {
                    self.status = PlayerStatus::Paused;
                    self.state.is_playing = false;
                }
            }
            SinkEventKind::Seeked { time } => {
                self.state.current_time = self.clamp_time(time);
                self.seek_target = None;
                if latest && self.status == PlayerStatus::Seeking {
                    self.on_seeked();
                }
            }
            SinkEventKind::TimeUpdate { time } => {
                self.state.current_time = self.clamp_time(time);
            }
            SinkEventKind::DurationChange { duration } => self.set_duration(duration),
            SinkEventKind::Ended => {
                self.status = PlayerStatus::Ended;
                self.state.is_playing = false;
                self.sink_playing = false;
                self.play_pending = false;
                if self.state.duration > 0.0 {
                    self.state.current_time = self.state.duration;
                }
            }
            SinkEventKind::Error(failure) => return Some(failure),
        }

        None
    }

    fn on_ready(&mut self, duration: f64) {
        self.set_duration(duration);
        if self.status != PlayerStatus::Loading {
            return;
        }

        // a fresh source starts from the element defaults
        self.setting(SinkCommandKind::SetVolume(self.state.volume));
        self.setting(SinkCommandKind::SetMuted(self.state.is_muted));
        self.setting(SinkCommandKind::SetRate(self.state.playback_rate));

        self.status = PlayerStatus::Paused;
        let want_play = std::mem::take(&mut self.want_play);
        if let Some(at) = self.resume_at.take() {
            let at = self.clamp_time(at);
            self.seek_resume = want_play;
            self.position_seq = self.transport(SinkCommandKind::Seek { time: at });
            self.seek_target = Some(at);
            self.status = PlayerStatus::Seeking;
        } else if want_play {
            self.transport(SinkCommandKind::Play);
            self.play_pending = true;
        }
    }

    fn on_seeked(&mut self) {
        let resume = std::mem::take(&mut self.seek_resume);
        if !resume {
            self.status = PlayerStatus::Paused;
            self.state.is_playing = false;
        } else if self.sink_playing {
            self.status = PlayerStatus::Playing;
            self.state.is_playing = true;
        } else {
            self.status = PlayerStatus::Paused;
            self.transport(SinkCommandKind::Play);
            self.play_pending = true;
        }
    }

    fn admit(&mut self, event: &SinkEvent) -> bool {
        if self.status == PlayerStatus::Idle
            || event.generation != self.generation
            || event.seq < self.load_seq
            || event.seq < self.acked_seq
        {
            return false;
        }

        let positional = matches!(
            event.kind,
            SinkEventKind::TimeUpdate { .. } | SinkEventKind::Seeked { .. } | SinkEventKind::Ended
        );
        if positional && event.seq < self.position_seq {
            return false;
        }

        self.acked_seq = event.seq;
        true
    }

    fn set_duration(&mut self, duration: f64) {
        if duration.is_finite() && duration >= 0.0 {
            self.state.duration = duration;
        }
    }

    fn clamp_time(&self, time: f64) -> f64 {
        if time.is_nan() {
            return 0.0;
        }
        let time = time.max(0.0);
        if self.state.duration > 0.0 {
            time.min(self.state.duration)
        } else {
            time
        }
    }

    fn transport(&mut self, kind: SinkCommandKind) -> u64 {
        self.seq += 1;
        self.sink.dispatch(SinkCommand {
            generation: self.generation,
            seq: self.seq,
            kind,
        });
        self.seq
    }

    fn setting(&mut self, kind: SinkCommandKind) {
        self.sink.dispatch(SinkCommand {
            generation: self.generation,
            seq: self.seq,
            kind,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::testing::RecordingSink;

    fn ev(machine: &PlaybackMachine<RecordingSink>, kind: SinkEventKind) -> SinkEvent {
        SinkEvent::new(machine.generation, machine.seq, kind)
    }

    /// Machine with a loaded source, paused at 0.
    fn loaded() -> PlaybackMachine<RecordingSink> {
        let mut machine = PlaybackMachine::new(RecordingSink::default());
        machine.attach("https://cdn/video.mp4?sig=1", 1);
        let ready = ev(&machine, SinkEventKind::Ready { duration: 60.0 });
        machine.handle(ready);
        machine.sink().clear();
        machine
    }

    fn playing() -> PlaybackMachine<RecordingSink> {
        let mut machine = loaded();
        machine.play().unwrap();
        let playing = ev(&machine, SinkEventKind::Playing);
        machine.handle(playing);
        machine.sink().clear();
        machine
    }

    #[test]
    fn play_before_load_waits_for_ready() {
        let mut machine = PlaybackMachine::new(RecordingSink::default());
        machine.play().unwrap();
        assert!(machine.sink().commands().is_empty());
        assert!(machine.playing_intent());

        machine.attach("https://cdn/a.mp4", 1);
        assert_eq!(machine.status(), PlayerStatus::Loading);
        assert_eq!(
            machine.sink().kinds(),
            vec![SinkCommandKind::Load {
                url: "https://cdn/a.mp4".to_string()
            }]
        );

        let ready = ev(&machine, SinkEventKind::Ready { duration: 60.0 });
        machine.handle(ready);
        assert_eq!(machine.state().duration, 60.0);
        assert_eq!(machine.sink().last().unwrap().kind, SinkCommandKind::Play);
        assert_eq!(machine.status(), PlayerStatus::Paused);

        let playing = ev(&machine, SinkEventKind::Playing);
        machine.handle(playing);
        assert_eq!(machine.status(), PlayerStatus::Playing);
        assert!(machine.state().is_playing);
    }

    #[test]
    fn pause_applies_immediately() {
        let mut machine = playing();
        machine.pause().unwrap();
        assert_eq!(machine.status(), PlayerStatus::Paused);
        assert!(!machine.state().is_playing);
        assert_eq!(machine.sink().kinds(), vec![SinkCommandKind::Pause]);
    }

    #[test]
    fn late_playing_ack_does_not_override_pause() {
        let mut machine = loaded();
        machine.play().unwrap();
        let stale = ev(&machine, SinkEventKind::Playing);
        machine.pause().unwrap();
        machine.handle(stale);
        assert_eq!(machine.status(), PlayerStatus::Paused);
        assert!(!machine.state().is_playing);
    }

    #[test]
    fn seek_clamps_and_returns_to_playing() {
        let mut machine = playing();
        machine.seek(500.0);
        assert_eq!(machine.status(), PlayerStatus::Seeking);
        assert_eq!(
            machine.sink().kinds(),
            vec![SinkCommandKind::Seek { time: 60.0 }]
        );

        let seeked = ev(&machine, SinkEventKind::Seeked { time: 60.0 });
        machine.handle(seeked);
        assert_eq!(machine.status(), PlayerStatus::Playing);
        assert_eq!(machine.state().current_time, 60.0);

        machine.seek(-3.0);
        assert_eq!(
            machine.sink().last().unwrap().kind,
            SinkCommandKind::Seek { time: 0.0 }
        );
    }

    #[test]
    fn seek_while_paused_stays_paused() {
        let mut machine = loaded();
        machine.seek(20.0);
        let seeked = ev(&machine, SinkEventKind::Seeked { time: 20.0 });
        machine.handle(seeked);
        assert_eq!(machine.status(), PlayerStatus::Paused);
        assert_eq!(machine.state().current_time, 20.0);
    }

    #[test]
    fn seek_then_pause_is_not_reordered() {
        let mut machine = playing();
        machine.seek(30.0);
        let seeked = ev(&machine, SinkEventKind::Seeked { time: 30.0 });
        machine.pause().unwrap();
        let paused = ev(&machine, SinkEventKind::Paused);

        // acknowledgements arrive in reverse order
        machine.handle(paused);
        machine.handle(seeked);
        assert_eq!(machine.status(), PlayerStatus::Paused);
        assert!(!machine.state().is_playing);
    }

    #[test]
    fn time_updates_from_before_a_seek_are_dropped() {
        let mut machine = playing();
        let stale = ev(&machine, SinkEventKind::TimeUpdate { time: 5.0 });
        machine.seek(40.0);
        machine.handle(stale);
        assert_eq!(machine.state().current_time, 0.0);

        let fresh = ev(&machine, SinkEventKind::TimeUpdate { time: 40.2 });
        machine.handle(fresh);
        assert_eq!(machine.state().current_time, 40.2);
    }

    #[test]
    fn events_from_previous_generation_are_dropped() {
        let mut machine = playing();
        let old = ev(&machine, SinkEventKind::TimeUpdate { time: 12.0 });
        machine.attach("https://cdn/b.mp4", 2);
        machine.handle(old.clone());
        assert_eq!(machine.state().current_time, 0.0);

        let old_error = SinkEvent::new(1, old.seq + 10, SinkEventKind::Error(SinkFailure::Stalled));
        assert_eq!(machine.handle(old_error), None);
    }

    #[test]
    fn attach_preserves_position_and_intent() {
        let mut machine = playing();
        let update = ev(&machine, SinkEventKind::TimeUpdate { time: 12.5 });
        machine.handle(update);
        machine.sink().clear();

        machine.attach("https://cdn/fresh.mp4", 2);
        assert_eq!(machine.state().current_time, 12.5);
        assert!(machine.state().is_playing);
        assert!(machine.playing_intent());

        let ready = ev(&machine, SinkEventKind::Ready { duration: 60.0 });
        machine.handle(ready);
        assert_eq!(machine.status(), PlayerStatus::Seeking);
        assert_eq!(
            machine.sink().last().unwrap().kind,
            SinkCommandKind::Seek { time: 12.5 }
        );

        let seeked = ev(&machine, SinkEventKind::Seeked { time: 12.5 });
        machine.handle(seeked);
        assert_eq!(machine.sink().last().unwrap().kind, SinkCommandKind::Play);
        let playing = ev(&machine, SinkEventKind::Playing);
        machine.handle(playing);
        assert_eq!(machine.status(), PlayerStatus::Playing);
        assert_eq!(machine.state().current_time, 12.5);
    }

    #[test]
    fn source_swap_mid_seek_resumes_at_seek_target() {
        let mut machine = playing();
        let update = ev(&machine, SinkEventKind::TimeUpdate { time: 10.0 });
        machine.handle(update);
        machine.seek(40.0);
        assert_eq!(machine.state().current_time, 10.0);

        machine.attach("https://cdn/b.mp4", 2);
        let ready = ev(&machine, SinkEventKind::Ready { duration: 60.0 });
        machine.handle(ready);
        assert_eq!(
            machine.sink().last().unwrap().kind,
            SinkCommandKind::Seek { time: 40.0 }
        );

        let seeked = ev(&machine, SinkEventKind::Seeked { time: 40.0 });
        machine.handle(seeked);
        assert_eq!(machine.sink().last().unwrap().kind, SinkCommandKind::Play);
        assert_eq!(machine.state().current_time, 40.0);
    }

    #[test]
    fn confirmed_seek_is_not_replayed_on_source_swap() {
        let mut machine = playing();
        machine.seek(40.0);
        let seeked = ev(&machine, SinkEventKind::Seeked { time: 40.0 });
        machine.handle(seeked);
        let update = ev(&machine, SinkEventKind::TimeUpdate { time: 45.0 });
        machine.handle(update);

        machine.attach("https://cdn/b.mp4", 2);
        let ready = ev(&machine, SinkEventKind::Ready { duration: 60.0 });
        machine.handle(ready);
        assert_eq!(
            machine.sink().last().unwrap().kind,
            SinkCommandKind::Seek { time: 45.0 }
        );
    }

    #[test]
    fn ready_reapplies_settings() {
        let mut machine = PlaybackMachine::new(RecordingSink::default());
        machine.set_volume(0.3);
        machine.toggle_mute();
        machine.attach("https://cdn/a.mp4", 1);
        machine.sink().clear();
        let ready = ev(&machine, SinkEventKind::Ready { duration: 10.0 });
        machine.handle(ready);
        assert_eq!(
            machine.sink().kinds(),
            vec![
                SinkCommandKind::SetVolume(0.3),
                SinkCommandKind::SetMuted(true),
                SinkCommandKind::SetRate(1.0),
            ]
        );
    }

    #[test]
    fn invalid_transitions() {
        let mut machine = playing();
        machine.seek(10.0);
        assert!(matches!(
            machine.play(),
            Err(PlayerError::InvalidTransition {
                command: "play",
                status: PlayerStatus::Seeking
            })
        ));

        let mut machine = playing();
        let ended = ev(&machine, SinkEventKind::Ended);
        machine.handle(ended);
        assert_eq!(machine.status(), PlayerStatus::Ended);
        assert_eq!(machine.state().current_time, 60.0);
        assert!(machine.pause().is_err());
    }

    #[test]
    fn ended_can_play_or_seek_again() {
        let mut machine = playing();
        let ended = ev(&machine, SinkEventKind::Ended);
        machine.handle(ended);

        machine.seek(5.0);
        let seeked = ev(&machine, SinkEventKind::Seeked { time: 5.0 });
        machine.handle(seeked);
        assert_eq!(machine.status(), PlayerStatus::Paused);

        machine.play().unwrap();
        let playing = ev(&machine, SinkEventKind::Playing);
        machine.handle(playing);
        assert_eq!(machine.status(), PlayerStatus::Playing);
    }

    #[test]
    fn setters_clamp_without_taking_a_sequence_number() {
        let mut machine = loaded();
        let seq = machine.seq;
        machine.set_volume(1.7);
        machine.set_volume(f64::NAN);
        machine.set_playback_rate(10.0);
        machine.set_playback_rate(0.0);
        machine.toggle_mute();
        machine.toggle_fullscreen();

        let state = machine.state();
        assert_eq!(state.volume, 1.0);
        assert_eq!(state.playback_rate, MIN_PLAYBACK_RATE);
        assert!(state.is_muted);
        assert!(state.is_fullscreen);
        assert!(machine.sink().commands().iter().all(|c| c.seq == seq));
        assert_eq!(
            machine.sink().kinds(),
            vec![
                SinkCommandKind::SetVolume(1.0),
                SinkCommandKind::SetRate(MAX_PLAYBACK_RATE),
                SinkCommandKind::SetRate(MIN_PLAYBACK_RATE),
                SinkCommandKind::SetMuted(true),
                SinkCommandKind::SetFullscreen(true),
            ]
        );
    }

    #[test]
    fn errors_are_returned_for_classification() {
        let mut machine = playing();
        let error = ev(&machine, SinkEventKind::Error(SinkFailure::Stalled));
        assert_eq!(machine.handle(error), Some(SinkFailure::Stalled));
        assert_eq!(machine.status(), PlayerStatus::Playing);

        machine.fail();
        assert_eq!(machine.status(), PlayerStatus::Error);
        assert!(machine.playing_intent());
        assert!(machine.play().is_err());
    }

    #[test]
    fn seek_without_source_is_applied_on_load() {
        let mut machine = PlaybackMachine::new(RecordingSink::default()).with_duration(60.0);
        machine.seek(70.0);
        machine.attach("https://cdn/a.mp4", 1);
        let ready = ev(&machine, SinkEventKind::Ready { duration: 60.0 });
        machine.handle(ready);
        assert_eq!(
            machine.sink().last().unwrap().kind,
            SinkCommandKind::Seek { time: 60.0 }
        );
    }

    #[test]
    fn detached_machine_ignores_events() {
        let mut machine = playing();
        let update = ev(&machine, SinkEventKind::TimeUpdate { time: 9.0 });
        machine.detach();
        assert_eq!(machine.sink().last().unwrap().kind, SinkCommandKind::Detach);
        machine.handle(update);
        assert_eq!(machine.state().current_time, 0.0);
        assert_eq!(machine.status(), PlayerStatus::Idle);
    }
}

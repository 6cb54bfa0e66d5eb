//! Boundary with the media sink, the primitive that actually decodes and
//! renders video. The controller only ever talks to it through tagged
//! commands and receives tagged events back over a channel.

use tokio::sync::mpsc;

/// Anything that can play a URL.
///
/// `dispatch` must not block; acknowledgements and progress come back as
/// [`SinkEvent`]s carrying the command's `generation` and `seq`.
pub trait MediaSink {
    fn dispatch(&mut self, command: SinkCommand);
}

impl<S: MediaSink + ?Sized> MediaSink for Box<S> {
    fn dispatch(&mut self, command: SinkCommand) {
        (**self).dispatch(command)
    }
}

pub type SinkEvents = mpsc::UnboundedSender<SinkEvent>;

#[derive(Debug, Clone, PartialEq)]
pub struct SinkCommand {
    pub generation: u64,
    pub seq: u64,
    pub kind: SinkCommandKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SinkCommandKind {
    Load { url: String },
    Play,
    Pause,
    Seek { time: f64 },
    SetVolume(f64),
    SetMuted(bool),
    SetRate(f64),
    SetFullscreen(bool),
    Detach,
}

impl SinkCommandKind {
    /// Commands that move the transport and therefore take a fresh sequence
    /// number.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            SinkCommandKind::Load { .. }
                | SinkCommandKind::Play
                | SinkCommandKind::Pause
                | SinkCommandKind::Seek { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SinkEvent {
    pub generation: u64,
    /// Sequence number of the last command the sink had processed.
    pub seq: u64,
    pub kind: SinkEventKind,
}

impl SinkEvent {
    pub fn new(generation: u64, seq: u64, kind: SinkEventKind) -> Self {
        Self {
            generation,
            seq,
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SinkEventKind {
    Ready { duration: f64 },
    Playing,
    Paused,
    Seeked { time: f64 },
    TimeUpdate { time: f64 },
    DurationChange { duration: f64 },
    Ended,
    Error(SinkFailure),
}

/// Low-level failure as reported by a sink, before classification.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkFailure {
    Aborted,
    Network(String),
    Stalled,
    Decode(String),
    UnsupportedFormat(String),
    Http { status: u16, reason: String },
    Other(String),
}

impl SinkFailure {
    pub fn details(&self) -> String {
        match self {
            SinkFailure::Aborted => "aborted".to_string(),
            SinkFailure::Network(msg) => format!("network: {}", msg),
            SinkFailure::Stalled => "stalled".to_string(),
            SinkFailure::Decode(msg) => format!("decode: {}", msg),
            SinkFailure::UnsupportedFormat(msg) => format!("unsupported format: {}", msg),
            SinkFailure::Http { status, reason } => format!("http {}: {}", status, reason),
            SinkFailure::Other(msg) => msg.clone(),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Sink that only records what it was asked to do.
    #[derive(Debug, Clone, Default)]
    pub struct RecordingSink {
        commands: Arc<Mutex<Vec<SinkCommand>>>,
    }

    impl RecordingSink {
        pub fn commands(&self) -> Vec<SinkCommand> {
            self.commands.lock().clone()
        }

        pub fn kinds(&self) -> Vec<SinkCommandKind> {
            self.commands.lock().iter().map(|c| c.kind.clone()).collect()
        }

        pub fn last(&self) -> Option<SinkCommand> {
            self.commands.lock().last().cloned()
        }

        pub fn clear(&self) {
            self.commands.lock().clear();
        }
    }

    impl MediaSink for RecordingSink {
        fn dispatch(&mut self, command: SinkCommand) {
            self.commands.lock().push(command);
        }
    }
}

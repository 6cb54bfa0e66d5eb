pub mod classifier;
pub mod config;
pub mod controller;
pub mod error;
pub mod hand;
pub mod issuer;
pub mod playback;
pub mod resource;
pub mod sink;
pub mod time;
pub mod timeline;

pub use classifier::{ErrorCode, PlaybackError, Recovery};
pub use config::PlayerSettings;
pub use controller::{Player, PlayerHandle, PlayerSnapshot};
pub use error::PlayerError;
pub use hand::{Action, ActionKind, Hand, MarkerCategory, Street, StreetRecord};
pub use issuer::{HttpIssuer, SignedUrl, UrlIssuer};
pub use playback::{PlaybackMachine, PlaybackState, PlayerStatus};
pub use resource::{Clock, Expiration, ResourceManager, SystemClock, VideoResource};
pub use sink::{MediaSink, SinkCommand, SinkCommandKind, SinkEvent, SinkEventKind, SinkFailure};
pub use timeline::{ActionMarker, Timeline, TimelineSegment};

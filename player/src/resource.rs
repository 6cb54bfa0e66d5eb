use crate::classifier::{self, PlaybackError};
use crate::error::PlayerError;
use crate::issuer::UrlIssuer;
use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

type RefreshFuture = Shared<BoxFuture<'static, Result<VideoResource, PlayerError>>>;

/// Wall clock, injectable so expiry can be tested.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A signed video URL. Never mutated: a refresh produces a new value with a
/// higher generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoResource {
    pub url: String,
    pub expires_at: DateTime<Utc>,
    pub hand_id: String,
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Expiration {
    /// No URL has been issued yet.
    Unknown,
    Valid,
    /// Inside the warning window but still usable.
    Warning,
    Expired,
}

#[derive(Default)]
struct Inner {
    active: Option<VideoResource>,
    // issued but not yet confirmed loaded by the sink
    pending: Option<VideoResource>,
    generation: u64,
    in_flight: Option<RefreshFuture>,
    closed: bool,
}

/// Owns the signed URL for one hand and coordinates its refreshes.
///
/// Clones share state. Concurrent [`refresh`](ResourceManager::refresh)
/// calls join the request already in flight, so the issuer is called once
/// and every caller receives the same [`VideoResource`].
#[derive(Clone)]
pub struct ResourceManager {
    hand_id: Arc<str>,
    issuer: Arc<dyn UrlIssuer + Send + Sync>,
    clock: Arc<dyn Clock>,
    warning_threshold: Duration,
    inner: Arc<Mutex<Inner>>,
}

impl ResourceManager {
    pub fn new(
        hand_id: &str,
        issuer: Arc<dyn UrlIssuer + Send + Sync>,
        clock: Arc<dyn Clock>,
        warning_threshold: Duration,
    ) -> Self {
        Self {
            hand_id: Arc::from(hand_id),
            issuer,
            clock,
            warning_threshold,
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    pub fn hand_id(&self) -> &str {
        &self.hand_id
    }

    /// Last resource the sink confirmed as loaded.
    pub fn active(&self) -> Option<VideoResource> {
        self.inner.lock().active.clone()
    }

    /// The newest resource: pending if one is being loaded, else active.
    pub fn current(&self) -> Option<VideoResource> {
        let inner = self.inner.lock();
        inner.pending.clone().or_else(|| inner.active.clone())
    }

    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.lock().in_flight.is_some()
    }

    /// Seconds until the current URL expires; negative once it has.
    pub fn time_until_expiration(&self) -> Option<f64> {
        let resource = self.current()?;
        let left = resource.expires_at - self.clock.now();
        Some(left.num_milliseconds() as f64 / 1000.0)
    }

    pub fn expiration(&self) -> Expiration {
        match self.time_until_expiration() {
            None => Expiration::Unknown,
            Some(left) if left <= 0.0 => Expiration::Expired,
            Some(left) if left < self.warning_threshold.as_secs_f64() => Expiration::Warning,
            Some(_) => Expiration::Valid,
        }
    }

    /// Requests a fresh URL, or joins the request already in flight.
    ///
    /// On success the new resource becomes pending under the next
    /// generation; the previous one stays active until [`commit`] is called.
    /// On failure nothing changes and a `NETWORK_ERROR` is returned.
    ///
    /// [`commit`]: ResourceManager::commit
    pub async fn refresh(&self) -> Result<VideoResource, PlayerError> {
        let fut = {
            let mut inner = self.inner.lock();
            if inner.closed {
                return Err(PlayerError::Cancelled);
            }
            match &inner.in_flight {
                Some(fut) => {
                    debug!("refresh: joining request in flight");
                    fut.clone()
                }
                None => {
                    let fut = self.start_refresh();
                    inner.in_flight = Some(fut.clone());
                    fut
                }
            }
        };

        fut.await
    }

    fn start_refresh(&self) -> RefreshFuture {
        let issuer = Arc::clone(&self.issuer);
        let inner = Arc::clone(&self.inner);
        let hand_id = Arc::clone(&self.hand_id);

        async move {
            info!("refresh: requesting signed url for hand {}", hand_id);
            let result = issuer.issue(&hand_id).await;

            let mut inner = inner.lock();
            inner.in_flight = None;
            if inner.closed {
                debug!("refresh: discarded after close");
                return Err(PlayerError::Cancelled);
            }

            match result {
                Ok(signed) => {
                    inner.generation += 1;
                    let resource = VideoResource {
                        url: signed.url,
                        expires_at: signed.expires_at,
                        hand_id: hand_id.to_string(),
                        generation: inner.generation,
                    };
                    inner.pending = Some(resource.clone());
                    info!(
                        "refresh: generation {} valid until {}",
                        resource.generation, resource.expires_at
                    );
                    Ok(resource)
                }
                Err(e) => {
                    warn!("refresh: {}", e);
                    Err(PlayerError::Playback(classifier::refresh_failed(e)))
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Promotes the pending resource once the sink has loaded it.
    pub fn commit(&self, generation: u64) -> bool {
        let mut inner = self.inner.lock();
        if inner.pending.as_ref().map(|r| r.generation) != Some(generation) {
            return false;
        }
        inner.active = inner.pending.take();
        debug!("resource generation {} is active", generation);
        true
    }

    /// Drops a pending resource whose load failed; the active one stays.
    pub fn discard_pending(&self, generation: u64) {
        let mut inner = self.inner.lock();
        if inner.pending.as_ref().map(|r| r.generation) == Some(generation) {
            inner.pending = None;
        }
    }

    /// Marks the manager as torn down; refreshes still in flight are
    /// discarded when they complete.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        inner.in_flight = None;
    }

    /// Error for an attempt to play against an expired URL, if it is one.
    pub fn expired_error(&self) -> Option<PlaybackError> {
        if self.expiration() != Expiration::Expired {
            return None;
        }
        let resource = self.current()?;
        let past = -self.time_until_expiration().unwrap_or(0.0);
        Some(classifier::expired(&resource.url, past))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::issuer::SignedUrl;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    #[derive(Debug)]
    pub struct ManualClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        pub fn new(now: DateTime<Utc>) -> Self {
            Self {
                now: Mutex::new(now),
            }
        }

        pub fn advance(&self, seconds: i64) {
            let mut now = self.now.lock();
            *now += chrono::Duration::seconds(seconds);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock()
        }
    }

    /// Issuer answering from a script, optionally held until released.
    pub struct ScriptedIssuer {
        clock: Arc<ManualClock>,
        calls: AtomicUsize,
        script: Mutex<VecDeque<Result<i64, String>>>,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedIssuer {
        /// Each entry is either the lifetime in seconds of the issued URL
        /// or an error message.
        pub fn new(clock: Arc<ManualClock>, script: Vec<Result<i64, String>>) -> Self {
            Self {
                clock,
                calls: AtomicUsize::new(0),
                script: Mutex::new(script.into()),
                gate: None,
            }
        }

        pub fn gated(mut self, gate: Arc<Notify>) -> Self {
            self.gate = Some(gate);
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl UrlIssuer for ScriptedIssuer {
        async fn issue(&self, hand_id: &str) -> Result<SignedUrl, PlayerError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            let next = self.script.lock().pop_front().unwrap_or(Ok(3600));
            match next {
                Ok(ttl) => Ok(SignedUrl {
                    url: format!("https://cdn.test/{}.mp4?sig={}", hand_id, call),
                    expires_at: self.clock.now() + chrono::Duration::seconds(ttl),
                }),
                Err(msg) => Err(PlayerError::NetworkError(msg)),
            }
        }
    }
}

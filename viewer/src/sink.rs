use crate::config::SinkSettings;
use bytes::Bytes;
use http_body_util::Empty;
use hyper::client::conn::http1;
use hyper::{header, Method, Request, Uri};
use hyper_util::rt::TokioIo;
use player::sink::SinkEvents;
use player::{MediaSink, SinkCommand, SinkCommandKind, SinkEvent, SinkEventKind, SinkFailure};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};

/// Simulated media sink.
///
/// A load probes the URL with `HEAD` and reports ready, an HTTP failure or a
/// network failure accordingly. While playing, time advances at the
/// playback rate and the link is probed again every `recheck`, so an
/// expiring signature shows up the way it would for a real player fetching
/// ranges.
pub struct HttpSink {
    commands: mpsc::UnboundedSender<SinkCommand>,
}

impl HttpSink {
    /// Spawns the driver task; `duration` is the length of the recording.
    pub fn spawn(events: SinkEvents, duration: f64, settings: &SinkSettings) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let driver = Driver {
            commands: rx,
            events,
            transport: Transport::new(duration),
            url: None,
            poll: settings.poll,
            recheck: settings.recheck,
        };
        tokio::spawn(driver.run());
        Self { commands }
    }
}

impl MediaSink for HttpSink {
    fn dispatch(&mut self, command: SinkCommand) {
        if self.commands.send(command).is_err() {
            debug!("sink driver is gone");
        }
    }
}

struct Driver {
    commands: mpsc::UnboundedReceiver<SinkCommand>,
    events: SinkEvents,
    transport: Transport,
    url: Option<String>,
    poll: Duration,
    recheck: Duration,
}

impl Driver {
    async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.poll);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_tick = Instant::now();
        let mut last_probe = Instant::now();

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        break;
                    };
                    if matches!(command.kind, SinkCommandKind::Load { .. }) {
                        last_probe = Instant::now();
                    }
                    self.on_command(command).await;
                }
                _ = ticker.tick() => {
                    let elapsed = last_tick.elapsed().as_secs_f64();
                    last_tick = Instant::now();

                    if self.transport.playing && last_probe.elapsed() >= self.recheck {
                        last_probe = Instant::now();
                        if let Some(url) = self.url.clone() {
                            if let Err(failure) = probe(&url).await {
                                self.transport.playing = false;
                                self.emit(SinkEventKind::Error(failure));
                                continue;
                            }
                        }
                    }

                    for kind in self.transport.advance(elapsed) {
                        self.emit(kind);
                    }
                }
            }
        }

        debug!("sink driver stopped");
    }

    async fn on_command(&mut self, command: SinkCommand) {
        let SinkCommandKind::Load { url } = &command.kind else {
            if let Some(kind) = self.transport.apply(&command) {
                self.emit(kind);
            }
            return;
        };

        self.transport.load(&command);
        self.url = Some(url.clone());
        info!("sink: loading {}", url);
        match probe(url).await {
            Ok(size) => {
                debug!("sink: {} bytes available", size);
                self.transport.loaded = true;
                self.emit(SinkEventKind::Ready {
                    duration: self.transport.duration,
                });
            }
            Err(failure) => self.emit(SinkEventKind::Error(failure)),
        }
    }

    fn emit(&self, kind: SinkEventKind) {
        let event = SinkEvent::new(self.transport.generation, self.transport.seq, kind);
        if self.events.send(event).is_err() {
            debug!("sink: player is gone");
        }
    }
}

/// Playhead of the simulated sink.
#[derive(Debug)]
struct Transport {
    generation: u64,
    seq: u64,
    duration: f64,
    position: f64,
    rate: f64,
    playing: bool,
    loaded: bool,
}

impl Transport {
    fn new(duration: f64) -> Self {
        Self {
            generation: 0,
            seq: 0,
            duration: duration.max(0.0),
            position: 0.0,
            rate: 1.0,
            playing: false,
            loaded: false,
        }
    }

    fn load(&mut self, command: &SinkCommand) {
        self.generation = command.generation;
        self.seq = command.seq;
        self.position = 0.0;
        self.playing = false;
        self.loaded = false;
    }

    /// Applies everything but a load, returning the acknowledgement.
    fn apply(&mut self, command: &SinkCommand) -> Option<SinkEventKind> {
        self.generation = command.generation;
        self.seq = command.seq;

        match command.kind {
            SinkCommandKind::Play if self.loaded => {
                if self.position >= self.duration {
                    self.position = 0.0;
                }
                self.playing = true;
                Some(SinkEventKind::Playing)
            }
            SinkCommandKind::Pause if self.loaded => {
                self.playing = false;
                Some(SinkEventKind::Paused)
            }
            SinkCommandKind::Seek { time } if self.loaded => {
                self.position = time.clamp(0.0, self.duration);
                Some(SinkEventKind::Seeked {
                    time: self.position,
                })
            }
            SinkCommandKind::SetRate(rate) => {
                self.rate = rate;
                None
            }
            SinkCommandKind::Detach => {
                self.loaded = false;
                self.playing = false;
                None
            }
            ref kind => {
                debug!("sink: {:?}", kind);
                None
            }
        }
    }

    fn advance(&mut self, elapsed: f64) -> Vec<SinkEventKind> {
        if !self.playing || !self.loaded {
            return Vec::new();
        }

        self.position += elapsed * self.rate;
        if self.position >= self.duration {
            self.position = self.duration;
            self.playing = false;
            return vec![
                SinkEventKind::TimeUpdate {
                    time: self.position,
                },
                SinkEventKind::Ended,
            ];
        }
        vec![SinkEventKind::TimeUpdate {
            time: self.position,
        }]
    }
}

/// `HEAD` request against a video link, returning its size.
async fn probe(url: &str) -> Result<u64, SinkFailure> {
    let uri = Uri::try_from(url).map_err(|e| SinkFailure::Other(format!("invalid url: {}", e)))?;
    if uri.scheme_str() != Some("http") {
        return Err(SinkFailure::UnsupportedFormat(format!(
            "scheme {:?}",
            uri.scheme_str()
        )));
    }
    let host = uri.host().unwrap_or("localhost");
    let port = uri.port_u16().unwrap_or(80);
    let addr = format!("{}:{}", host, port);

    let stream = TcpStream::connect(addr.as_str())
        .await
        .map_err(|e| SinkFailure::Network(format!("connect to {}: {}", addr, e)))?;
    let (mut sender, conn) = http1::handshake(TokioIo::new(stream))
        .await
        .map_err(|e| SinkFailure::Network(format!("handshake: {}", e)))?;
    tokio::task::spawn(async move {
        if let Err(err) = conn.await {
            error!("sink connection: {:?}", err);
        }
    });

    let req = Request::builder()
        .method(Method::HEAD)
        .uri(uri.clone())
        .header(header::HOST, uri.authority().map_or("", |a| a.as_str()))
        .header(header::USER_AGENT, "hand-viewer/1.0")
        .body(Empty::<Bytes>::new())
        .map_err(|e| SinkFailure::Other(format!("build request: {}", e)))?;
    let res = sender
        .send_request(req)
        .await
        .map_err(|e| SinkFailure::Network(format!("send request: {}", e)))?;

    let status = res.status();
    if !status.is_success() {
        return Err(SinkFailure::Http {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("").to_string(),
        });
    }

    let headers = res.headers();
    if let Some(content_type) = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
        if !content_type.starts_with("video/") {
            return Err(SinkFailure::UnsupportedFormat(content_type.to_string()));
        }
    }

    Ok(headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::server::conn::http1 as server_http1;
    use hyper::service::service_fn;
    use hyper::{Response, StatusCode};
    use std::convert::Infallible;
    use tokio::net::TcpListener;

    fn command(seq: u64, kind: SinkCommandKind) -> SinkCommand {
        SinkCommand {
            generation: 1,
            seq,
            kind,
        }
    }

    fn loaded(duration: f64) -> Transport {
        let mut transport = Transport::new(duration);
        transport.load(&command(1, SinkCommandKind::Load { url: String::new() }));
        transport.loaded = true;
        transport
    }

    /// Serves every request on one connection with `status` and `content_type`.
    async fn origin(status: StatusCode, content_type: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let service = service_fn(move |_req| async move {
                let res = Response::builder()
                    .status(status)
                    .header(header::CONTENT_TYPE, content_type)
                    .header(header::CONTENT_LENGTH, "1024")
                    .body(Empty::<Bytes>::new())
                    .unwrap();
                Ok::<_, Infallible>(res)
            });
            let _ = server_http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await;
        });
        format!("http://{}/video/h1?expires=1&token=ab", addr)
    }

    #[test]
    fn commands_before_load_are_not_acknowledged() {
        let mut transport = Transport::new(60.0);
        assert_eq!(transport.apply(&command(1, SinkCommandKind::Play)), None);
        assert!(!transport.playing);
    }

    #[test]
    fn playback_advances_at_rate_and_ends() {
        let mut transport = loaded(10.0);
        assert_eq!(
            transport.apply(&command(2, SinkCommandKind::Play)),
            Some(SinkEventKind::Playing)
        );
        assert_eq!(transport.apply(&command(2, SinkCommandKind::SetRate(2.0))), None);
        assert_eq!(
            transport.advance(1.5),
            vec![SinkEventKind::TimeUpdate { time: 3.0 }]
        );
        assert_eq!(
            transport.advance(10.0),
            vec![SinkEventKind::TimeUpdate { time: 10.0 }, SinkEventKind::Ended]
        );
        assert!(!transport.playing);
        assert!(transport.advance(1.0).is_empty());

        // playing again from the end starts over
        transport.apply(&command(3, SinkCommandKind::Play));
        assert_eq!(transport.position, 0.0);
        assert_eq!(transport.seq, 3);
    }

    #[test]
    fn seek_is_clamped_and_pause_stops_time() {
        let mut transport = loaded(10.0);
        assert_eq!(
            transport.apply(&command(2, SinkCommandKind::Seek { time: 42.0 })),
            Some(SinkEventKind::Seeked { time: 10.0 })
        );
        transport.apply(&command(3, SinkCommandKind::Seek { time: 4.0 }));
        transport.apply(&command(4, SinkCommandKind::Play));
        assert_eq!(
            transport.apply(&command(5, SinkCommandKind::Pause)),
            Some(SinkEventKind::Paused)
        );
        assert!(transport.advance(3.0).is_empty());
        assert_eq!(transport.position, 4.0);

        transport.apply(&command(5, SinkCommandKind::Detach));
        assert!(!transport.loaded);
    }

    #[tokio::test]
    async fn probe_reports_size() {
        let url = origin(StatusCode::OK, "video/mp4").await;
        assert_eq!(probe(&url).await, Ok(1024));
    }

    #[tokio::test]
    async fn probe_reports_http_failures() {
        let url = origin(StatusCode::FORBIDDEN, "text/plain").await;
        assert_eq!(
            probe(&url).await,
            Err(SinkFailure::Http {
                status: 403,
                reason: "Forbidden".to_string()
            })
        );
    }

    #[tokio::test]
    async fn probe_rejects_non_video() {
        let url = origin(StatusCode::OK, "text/html").await;
        assert!(matches!(
            probe(&url).await,
            Err(SinkFailure::UnsupportedFormat(_))
        ));
    }

    #[tokio::test]
    async fn probe_reports_network_failures() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let result = probe(&format!("http://{}/video/h1", addr)).await;
        assert!(matches!(result, Err(SinkFailure::Network(_))));
    }

    #[tokio::test]
    async fn driver_reports_ready_after_load() {
        let url = origin(StatusCode::OK, "video/mp4").await;
        let (events, mut rx) = mpsc::unbounded_channel();
        let mut sink = HttpSink::spawn(events, 30.0, &SinkSettings::default());
        sink.dispatch(SinkCommand {
            generation: 4,
            seq: 9,
            kind: SinkCommandKind::Load { url },
        });

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            event,
            SinkEvent::new(4, 9, SinkEventKind::Ready { duration: 30.0 })
        );
    }
}

use crate::error::PlayerError;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http_body_util::{BodyExt, Empty};
use hyper::client::conn::http1;
use hyper::{header, Method, Request, StatusCode, Uri};
use hyper_util::rt::TokioIo;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tracing::{debug, error};

/// Characters escaped in the hand id path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// A time-limited video link as returned by the issuer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedUrl {
    pub url: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

/// Source of fresh signed URLs for a hand's video.
#[async_trait]
pub trait UrlIssuer {
    async fn issue(&self, hand_id: &str) -> Result<SignedUrl, PlayerError>;
}

/// Issuer reached over plain HTTP/1.1: `GET {base}/hands/{id}/video-url`.
#[derive(Debug, Clone)]
pub struct HttpIssuer {
    base: Uri,
}

impl HttpIssuer {
    pub fn new(base: &str) -> Result<Self, PlayerError> {
        let base = Uri::try_from(base.trim_end_matches('/'))
            .map_err(|e| PlayerError::ConfigError(format!("Invalid issuer URL: {}", e)))?;
        if base.host().is_none() {
            return Err(PlayerError::ConfigError(format!(
                "Issuer URL has no host: {}",
                base
            )));
        }
        if base.scheme_str().is_some_and(|s| s != "http") {
            return Err(PlayerError::ConfigError(format!(
                "Unsupported issuer scheme: {}",
                base
            )));
        }

        Ok(Self { base })
    }

    fn request_uri(&self, hand_id: &str) -> Result<Uri, PlayerError> {
        let prefix = self.base.path().trim_end_matches('/');
        let id = utf8_percent_encode(hand_id, SEGMENT);
        let path = format!("{}/hands/{}/video-url", prefix, id);
        let authority = self
            .base
            .authority()
            .map(|a| a.to_string())
            .unwrap_or_default();

        Uri::builder()
            .scheme("http")
            .authority(authority)
            .path_and_query(path)
            .build()
            .map_err(|e| PlayerError::RequestError(format!("build uri: {}", e)))
    }

    async fn connect(&self) -> Result<http1::SendRequest<Empty<Bytes>>, PlayerError> {
        let host = self.base.host().unwrap_or("localhost");
        let port = self.base.port_u16().unwrap_or(80);
        let addr = format!("{}:{}", host, port);
        let stream = TcpStream::connect(addr.as_str())
            .await
            .map_err(|e| PlayerError::NetworkError(format!("connect to {}: {}", addr, e)))?;

        let (sender, conn) = http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|e| PlayerError::RequestError(format!("http1 handshake: {}", e)))?;
        tokio::task::spawn(async move {
            if let Err(err) = conn.await {
                error!("issuer connection: {:?}", err);
            }
        });

        Ok(sender)
    }
}

#[async_trait]
impl UrlIssuer for HttpIssuer {
    async fn issue(&self, hand_id: &str) -> Result<SignedUrl, PlayerError> {
        let uri = self.request_uri(hand_id)?;
        let mut sender = self.connect().await?;

        let req = Request::builder()
            .method(Method::GET)
            .uri(uri.clone())
            .header(header::HOST, uri.authority().map_or("", |a| a.as_str()))
            .header(header::USER_AGENT, "hand-viewer/1.0")
            .header(header::ACCEPT, "application/json")
            .body(Empty::<Bytes>::new())
            .map_err(|e| PlayerError::RequestError(format!("build request: {}", e)))?;

        let res = sender
            .send_request(req)
            .await
            .map_err(|e| PlayerError::NetworkError(format!("send request: {}", e)))?;
        let status = res.status();
        let body = res
            .into_body()
            .collect()
            .await
            .map_err(|e| PlayerError::NetworkError(format!("read body: {}", e)))?
            .to_bytes();

        if status != StatusCode::OK {
            return Err(PlayerError::RequestError(format!(
                "issuer answered {} for hand {}",
                status, hand_id
            )));
        }

        let signed: SignedUrl = serde_json::from_slice(&body)
            .map_err(|e| PlayerError::RequestError(format!("invalid issuer response: {}", e)))?;
        debug!("issued {} until {}", signed.url, signed.expires_at);
        Ok(signed)
    }
}

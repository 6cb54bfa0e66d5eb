use crate::signing::{Rejection, UrlSigner};
use crate::storage::VideoStorage;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{self, HeaderValue};
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode, Uri};
use serde::Serialize;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IssuedUrl {
    url: String,
    /// Epoch seconds
    expires_at: i64,
}

/// Issues signed video links and serves the videos behind them
#[derive(Clone)]
pub struct SignerService {
    storage: VideoStorage,
    signer: UrlSigner,
    public_url: Option<Arc<str>>,
}

impl SignerService {
    pub fn new(storage: VideoStorage, signer: UrlSigner, public_url: Option<String>) -> Self {
        Self {
            storage,
            signer,
            public_url: public_url.map(|url| Arc::from(url.trim_end_matches('/'))),
        }
    }

    pub async fn handle(&self, req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
        let host = req
            .headers()
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .map(|h| h.to_string());
        let res = self
            .respond(req.method(), req.uri(), host.as_deref(), Utc::now())
            .await;
        debug!("{} {} -> {}", req.method(), req.uri().path(), res.status());
        Ok(res)
    }

    async fn respond(
        &self,
        method: &Method,
        uri: &Uri,
        host: Option<&str>,
        now: DateTime<Utc>,
    ) -> Response<Full<Bytes>> {
        let route = match Route::from_path(uri.path()) {
            Ok(route) => route,
            Err(e) => {
                debug!("Unknown path: {}", e);
                return empty_response(StatusCode::NOT_FOUND);
            }
        };

        match route {
            Route::VideoUrl(hand_id) => {
                if method != Method::GET {
                    return empty_response(StatusCode::METHOD_NOT_ALLOWED);
                }
                self.issue(hand_id, host, now).await
            }
            Route::Video(hand_id) => {
                if method != Method::GET && method != Method::HEAD {
                    return empty_response(StatusCode::METHOD_NOT_ALLOWED);
                }
                self.serve(hand_id, uri.query().unwrap_or(""), method == Method::HEAD, now)
                    .await
            }
        }
    }

    async fn issue(
        &self,
        hand_id: &str,
        host: Option<&str>,
        now: DateTime<Utc>,
    ) -> Response<Full<Bytes>> {
        if self.storage.size(hand_id).await.is_none() {
            info!("No video for hand {}", hand_id);
            return empty_response(StatusCode::NOT_FOUND);
        }

        let (expires_at, token) = self.signer.sign(hand_id, now);
        let base = match (&self.public_url, host) {
            (Some(url), _) => url.to_string(),
            (None, Some(host)) => format!("http://{}", host),
            (None, None) => "http://localhost".to_string(),
        };
        let issued = IssuedUrl {
            url: format!(
                "{}/video/{}?expires={}&token={}",
                base,
                hand_id,
                expires_at.timestamp(),
                token
            ),
            expires_at: expires_at.timestamp(),
        };
        info!("Issued link for hand {} until {}", hand_id, expires_at);

        match serde_json::to_vec(&issued) {
            Ok(body) => {
                let mut res = response(StatusCode::OK, Bytes::from(body));
                let headers = res.headers_mut();
                headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
                headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
                res
            }
            Err(e) => {
                warn!("Failed to encode response: {}", e);
                empty_response(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    async fn serve(
        &self,
        hand_id: &str,
        query: &str,
        head: bool,
        now: DateTime<Utc>,
    ) -> Response<Full<Bytes>> {
        let expires = query_param(query, "expires").and_then(|v| v.parse::<i64>().ok());
        let token = query_param(query, "token");
        let (Some(expires), Some(token)) = (expires, token) else {
            return text_response(StatusCode::FORBIDDEN, "missing signature");
        };

        match self.signer.verify(hand_id, expires, token, now) {
            Ok(()) => {}
            Err(Rejection::Expired) => {
                info!("Expired link for hand {}", hand_id);
                return text_response(StatusCode::FORBIDDEN, "link expired");
            }
            Err(Rejection::BadToken) => {
                warn!("Bad signature for hand {}", hand_id);
                return text_response(StatusCode::FORBIDDEN, "signature mismatch");
            }
        }

        let Some(size) = self.storage.size(hand_id).await else {
            return empty_response(StatusCode::NOT_FOUND);
        };

        let body = if head {
            Bytes::new()
        } else {
            match self.storage.read(hand_id).await {
                Ok(data) => data,
                Err(e) => {
                    warn!("{}", e);
                    return empty_response(StatusCode::INTERNAL_SERVER_ERROR);
                }
            }
        };

        let mut res = response(StatusCode::OK, body);
        let headers = res.headers_mut();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("video/mp4"));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size));
        res
    }
}

impl Service<Request<Incoming>> for SignerService {
    type Response = Response<Full<Bytes>>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let this = self.clone();
        Box::pin(async move { this.handle(req).await })
    }
}

/// Routes served by the signer
#[derive(Debug, PartialEq)]
enum Route<'a> {
    /// /hands/<id>/video-url
    VideoUrl(&'a str),
    /// /video/<id>
    Video(&'a str),
}

impl<'a> Route<'a> {
    fn from_path(path: &'a str) -> Result<Self, String> {
        let parts: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        match parts.as_slice() {
            ["hands", id, "video-url"] if !id.is_empty() => Ok(Route::VideoUrl(*id)),
            ["video", id] if !id.is_empty() => Ok(Route::Video(*id)),
            _ => Err(format!("Invalid path: {}", path)),
        }
    }
}

fn query_param<'a>(query: &'a str, name: &str) -> Option<&'a str> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

fn response(status: StatusCode, body: Bytes) -> Response<Full<Bytes>> {
    let mut res = Response::new(Full::new(body));
    *res.status_mut() = status;
    res
}

fn empty_response(status: StatusCode) -> Response<Full<Bytes>> {
    response(status, Bytes::new())
}

fn text_response(status: StatusCode, text: &'static str) -> Response<Full<Bytes>> {
    let mut res = response(status, Bytes::from_static(text.as_bytes()));
    res.headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    res
}

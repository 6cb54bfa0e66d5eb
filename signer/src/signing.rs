use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Expired,
    BadToken,
}

/// Issues and checks `expires`/`token` query pairs for video links.
///
/// The token is an HMAC-SHA256 over the hand id and expiry. Good enough to
/// exercise link expiry during development; not an access-control boundary.
#[derive(Clone)]
pub struct UrlSigner {
    secret: Vec<u8>,
    ttl: Duration,
}

impl UrlSigner {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            ttl,
        }
    }

    fn mac(&self, hand_id: &str, expires: i64) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key length");
        mac.update(hand_id.as_bytes());
        mac.update(b":");
        mac.update(expires.to_string().as_bytes());
        mac
    }

    /// Returns the expiry and token for a link issued at `now`.
    pub fn sign(&self, hand_id: &str, now: DateTime<Utc>) -> (DateTime<Utc>, String) {
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::hours(1));
        let expires_at = now + ttl;
        let token = hex::encode(self.mac(hand_id, expires_at.timestamp()).finalize().into_bytes());
        (expires_at, token)
    }

    pub fn verify(
        &self,
        hand_id: &str,
        expires: i64,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<(), Rejection> {
        let Ok(token) = hex::decode(token) else {
            return Err(Rejection::BadToken);
        };
        self.mac(hand_id, expires)
            .verify_slice(&token)
            .map_err(|_| Rejection::BadToken)?;

        if now.timestamp() >= expires {
            return Err(Rejection::Expired);
        }
        Ok(())
    }
}

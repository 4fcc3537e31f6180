//! HMAC-SHA256 request signing shared by [`crate::webhook::WebhookTransport`]
//! and the hub's callback webhook sender — both sign `timestamp + body` the
//! way `fc-router`'s `HttpMediator` signs outbound calls.

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

pub const SIGNATURE_HEADER: &str = "X-NotifyHub-Signature";
pub const TIMESTAMP_HEADER: &str = "X-NotifyHub-Timestamp";

type HmacSha256 = Hmac<Sha256>;

/// Returns `(hex signature, timestamp)` for `timestamp + body` signed with
/// `secret`.
pub fn sign(body: &str, secret: &str) -> (String, String) {
    let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();
    let payload = format!("{timestamp}{body}");
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts a key of any size");
    mac.update(payload.as_bytes());
    (hex::encode(mac.finalize().into_bytes()), timestamp)
}

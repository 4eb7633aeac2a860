// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Web Push delivery.
//!
//! Payloads are encrypted with the `aes128gcm` content coding (RFC 8291 on
//! top of RFC 8188) as a single record, and requests carry a VAPID
//! (RFC 8292) ES256 token signed with the server key.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as B64URL, Engine as _};
use hkdf::Hkdf;
use ring::rand::{SecureRandom, SystemRandom};
use ring::{aead, agreement, signature};
use sha2::Sha256;

use crate::models::notification::{PushPayload, PushSubscription};

/// Record size advertised in the content coding header.
const RECORD_SIZE: u32 = 4096;
/// salt (16) + rs (4) + idlen (1) + keyid (65)
const HEADER_LEN: usize = 86;
const TAG_LEN: usize = 16;
/// Largest plaintext that fits one record with its padding delimiter.
pub const MAX_PAYLOAD_LEN: usize = RECORD_SIZE as usize - HEADER_LEN - TAG_LEN - 1;

const P256_POINT_LEN: usize = 65;
const AUTH_SECRET_LEN: usize = 16;

/// VAPID tokens are valid for 12 hours.
const VAPID_TTL_SECS: i64 = 12 * 60 * 60;
/// How long the push service should hold an undelivered message.
const MESSAGE_TTL_SECS: u32 = 24 * 60 * 60;

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("Invalid subscription: {0}")]
    InvalidSubscription(String),

    #[error("Invalid VAPID key: {0}")]
    InvalidVapidKey(String),

    #[error("Payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Encryption failed")]
    Crypto,

    #[error("Subscription expired or unsubscribed")]
    Expired,

    #[error("Push service rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Push request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<ring::error::Unspecified> for PushError {
    fn from(_: ring::error::Unspecified) -> Self {
        PushError::Crypto
    }
}

impl From<PushError> for crate::error::AppError {
    fn from(err: PushError) -> Self {
        match err {
            PushError::InvalidSubscription(msg) => crate::error::AppError::BadRequest(msg),
            other => crate::error::AppError::Push(other.to_string()),
        }
    }
}

/// Decode base64url, tolerating padding and the standard alphabet.
fn decode_b64(value: &str) -> Option<Vec<u8>> {
    let trimmed = value.trim().trim_end_matches('=');
    B64URL
        .decode(trimmed)
        .ok()
        .or_else(|| B64URL.decode(trimmed.replace('+', "-").replace('/', "_")).ok())
}

/// The server's VAPID signing key.
pub struct VapidKey {
    key_pair: signature::EcdsaKeyPair,
    public_b64: String,
}

impl VapidKey {
    /// Load a key from its base64url raw private scalar (32 bytes) and
    /// uncompressed public point (65 bytes).
    pub fn from_base64(private_key: &str, public_key: &str) -> Result<Self, PushError> {
        let private = decode_b64(private_key)
            .ok_or_else(|| PushError::InvalidVapidKey("private key is not base64url".into()))?;
        let public = decode_b64(public_key)
            .ok_or_else(|| PushError::InvalidVapidKey("public key is not base64url".into()))?;
        let key_pair = signature::EcdsaKeyPair::from_private_key_and_public_key(
            &signature::ECDSA_P256_SHA256_FIXED_SIGNING,
            &private,
            &public,
            &SystemRandom::new(),
        )
        .map_err(|e| PushError::InvalidVapidKey(e.to_string()))?;
        Ok(Self {
            key_pair,
            public_b64: B64URL.encode(public),
        })
    }

    pub fn public_key_b64(&self) -> &str {
        &self.public_b64
    }

    /// Signed ES256 JWT for the push service at `audience`.
    pub fn token(&self, audience: &str, subject: &str, now_secs: i64) -> Result<String, PushError> {
        let header = B64URL.encode(br#"{"typ":"JWT","alg":"ES256"}"#);
        let claims = serde_json::json!({
            "aud": audience,
            "exp": now_secs + VAPID_TTL_SECS,
            "sub": subject,
        });
        let claims = B64URL.encode(claims.to_string());
        let signing_input = format!("{}.{}", header, claims);
        let sig = self
            .key_pair
            .sign(&SystemRandom::new(), signing_input.as_bytes())?;
        Ok(format!("{}.{}", signing_input, B64URL.encode(sig.as_ref())))
    }

    /// Value of the `Authorization` header.
    pub fn authorization(
        &self,
        audience: &str,
        subject: &str,
        now_secs: i64,
    ) -> Result<String, PushError> {
        Ok(format!(
            "vapid t={}, k={}",
            self.token(audience, subject, now_secs)?,
            self.public_b64
        ))
    }
}

fn hkdf_expand<const N: usize>(salt: &[u8], ikm: &[u8], info: &[u8]) -> Result<[u8; N], PushError> {
    let mut okm = [0u8; N];
    Hkdf::<Sha256>::new(Some(salt), ikm)
        .expand(info, &mut okm)
        .map_err(|_| PushError::Crypto)?;
    Ok(okm)
}

/// Content encryption key and nonce for one message.
fn derive_keys(
    ecdh_secret: &[u8],
    auth_secret: &[u8],
    ua_public: &[u8],
    as_public: &[u8],
    salt: &[u8],
) -> Result<([u8; 16], [u8; 12]), PushError> {
    let mut key_info = Vec::with_capacity(14 + 2 * P256_POINT_LEN);
    key_info.extend_from_slice(b"WebPush: info\0");
    key_info.extend_from_slice(ua_public);
    key_info.extend_from_slice(as_public);
    let ikm: [u8; 32] = hkdf_expand(auth_secret, ecdh_secret, &key_info)?;

    let cek = hkdf_expand(salt, &ikm, b"Content-Encoding: aes128gcm\0")?;
    let nonce = hkdf_expand(salt, &ikm, b"Content-Encoding: nonce\0")?;
    Ok((cek, nonce))
}

/// Encrypt `plaintext` for the browser holding `subscription`.
///
/// Returns the full request body: RFC 8188 header followed by one record.
pub fn encrypt(
    subscription: &PushSubscription,
    plaintext: &[u8],
    rng: &dyn SecureRandom,
) -> Result<Vec<u8>, PushError> {
    if plaintext.len() > MAX_PAYLOAD_LEN {
        return Err(PushError::PayloadTooLarge(plaintext.len()));
    }
    let ua_public = decode_b64(&subscription.keys.p256dh)
        .filter(|k| k.len() == P256_POINT_LEN)
        .ok_or_else(|| PushError::InvalidSubscription("Invalid p256dh key".into()))?;
    let auth_secret = decode_b64(&subscription.keys.auth)
        .filter(|k| k.len() == AUTH_SECRET_LEN)
        .ok_or_else(|| PushError::InvalidSubscription("Invalid auth secret".into()))?;

    let as_private = agreement::EphemeralPrivateKey::generate(&agreement::ECDH_P256, rng)?;
    let as_public = as_private.compute_public_key()?;
    let ecdh_secret = agreement::agree_ephemeral(
        as_private,
        &agreement::UnparsedPublicKey::new(&agreement::ECDH_P256, &ua_public),
        |secret| secret.to_vec(),
    )
    .map_err(|_| PushError::InvalidSubscription("p256dh is not a valid P-256 point".into()))?;

    let mut salt = [0u8; 16];
    rng.fill(&mut salt)?;
    let (cek, nonce) = derive_keys(
        &ecdh_secret,
        &auth_secret,
        &ua_public,
        as_public.as_ref(),
        &salt,
    )?;

    // Padding delimiter 0x02 marks the last (only) record
    let mut record = Vec::with_capacity(plaintext.len() + 1 + TAG_LEN);
    record.extend_from_slice(plaintext);
    record.push(0x02);
    let key = aead::LessSafeKey::new(aead::UnboundKey::new(&aead::AES_128_GCM, &cek)?);
    key.seal_in_place_append_tag(
        aead::Nonce::assume_unique_for_key(nonce),
        aead::Aad::empty(),
        &mut record,
    )?;

    let mut body = Vec::with_capacity(HEADER_LEN + record.len());
    body.extend_from_slice(&salt);
    body.extend_from_slice(&RECORD_SIZE.to_be_bytes());
    body.push(P256_POINT_LEN as u8);
    body.extend_from_slice(as_public.as_ref());
    body.extend_from_slice(&record);
    Ok(body)
}

/// Origin of a push endpoint, used as the VAPID audience.
pub fn audience(endpoint: &str) -> Result<String, PushError> {
    let url = reqwest::Url::parse(endpoint)
        .map_err(|e| PushError::InvalidSubscription(format!("Invalid endpoint: {}", e)))?;
    if url.scheme() != "https" || url.host_str().is_none() {
        return Err(PushError::InvalidSubscription(
            "Endpoint must be an https URL".into(),
        ));
    }
    Ok(url.origin().ascii_serialization())
}

/// Sends encrypted messages to browser push services.
pub struct PushService {
    http: reqwest::Client,
    vapid: VapidKey,
    subject: String,
    rng: SystemRandom,
}

impl PushService {
    pub fn new(vapid: VapidKey, subject: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            vapid,
            subject,
            rng: SystemRandom::new(),
        }
    }

    pub fn public_key(&self) -> &str {
        self.vapid.public_key_b64()
    }

    /// Deliver one message. There is no retry here; the scheduler tries
    /// again on its next tick.
    pub async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &PushPayload,
    ) -> Result<(), PushError> {
        let aud = audience(&subscription.endpoint)?;
        let plaintext = serde_json::to_vec(payload).map_err(|_| PushError::Crypto)?;
        let body = encrypt(subscription, &plaintext, &self.rng)?;
        let auth = self
            .vapid
            .authorization(&aud, &self.subject, chrono::Utc::now().timestamp())?;

        let response = self
            .http
            .post(&subscription.endpoint)
            .header("Authorization", auth)
            .header("TTL", MESSAGE_TTL_SECS.to_string())
            .header("Content-Encoding", "aes128gcm")
            .header("Content-Type", "application/octet-stream")
            .header("Urgency", "normal")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(audience = %aud, status = status.as_u16(), "Push delivered");
            return Ok(());
        }
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE {
            return Err(PushError::Expired);
        }
        let body = response.text().await.unwrap_or_default();
        Err(PushError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::notification::PushKeys;

    /// Receiver side of RFC 8291, for checking what `encrypt` produces.
    fn decrypt(
        body: &[u8],
        ua_private: agreement::EphemeralPrivateKey,
        ua_public: &[u8],
        auth: &[u8],
    ) -> Vec<u8> {
        let salt = &body[..16];
        let rs = u32::from_be_bytes(body[16..20].try_into().unwrap());
        assert_eq!(rs, RECORD_SIZE);
        let idlen = usize::from(body[20]);
        let as_public = &body[21..21 + idlen];
        let ciphertext = &body[21 + idlen..];

        let ecdh_secret = agreement::agree_ephemeral(
            ua_private,
            &agreement::UnparsedPublicKey::new(&agreement::ECDH_P256, as_public),
            |s| s.to_vec(),
        )
        .unwrap();
        let (cek, nonce) = derive_keys(&ecdh_secret, auth, ua_public, as_public, salt).unwrap();

        let key = aead::LessSafeKey::new(aead::UnboundKey::new(&aead::AES_128_GCM, &cek).unwrap());
        let mut buf = ciphertext.to_vec();
        let plain = key
            .open_in_place(aead::Nonce::assume_unique_for_key(nonce), aead::Aad::empty(), &mut buf)
            .unwrap();
        assert_eq!(plain.last(), Some(&0x02));
        plain[..plain.len() - 1].to_vec()
    }

    fn receiver() -> (agreement::EphemeralPrivateKey, Vec<u8>, [u8; 16]) {
        let rng = SystemRandom::new();
        let private =
            agreement::EphemeralPrivateKey::generate(&agreement::ECDH_P256, &rng).unwrap();
        let public = private.compute_public_key().unwrap().as_ref().to_vec();
        let mut auth = [0u8; 16];
        rng.fill(&mut auth).unwrap();
        (private, public, auth)
    }

    fn subscription(public: &[u8], auth: &[u8]) -> PushSubscription {
        PushSubscription {
            endpoint: "https://push.example.com/send/abc".to_string(),
            keys: PushKeys {
                p256dh: B64URL.encode(public),
                auth: B64URL.encode(auth),
            },
        }
    }

    #[test]
    fn test_payload_decrypts_with_receiver_key() {
        let (private, public, auth) = receiver();
        let sub = subscription(&public, &auth);
        let message = br#"{"title":"Assignment Reminder: Pit map","body":"Due soon"}"#;

        let body = encrypt(&sub, message, &SystemRandom::new()).unwrap();

        assert_eq!(body[20], 65);
        assert_eq!(body[21], 0x04, "keyid is an uncompressed P-256 point");
        assert_eq!(body.len(), HEADER_LEN + message.len() + 1 + TAG_LEN);
        assert_eq!(decrypt(&body, private, &public, &auth), message.to_vec());
    }

    #[test]
    fn test_each_message_uses_fresh_salt_and_key() {
        let (_, public, auth) = receiver();
        let sub = subscription(&public, &auth);
        let rng = SystemRandom::new();
        let a = encrypt(&sub, b"same", &rng).unwrap();
        let b = encrypt(&sub, b"same", &rng).unwrap();
        assert_ne!(a[..16], b[..16]);
        assert_ne!(a[21..86], b[21..86]);
    }

    #[test]
    fn test_rejects_bad_keys_and_oversized_payloads() {
        let (_, public, auth) = receiver();
        let rng = SystemRandom::new();

        let short_auth = subscription(&public, &auth[..8]);
        assert!(matches!(
            encrypt(&short_auth, b"x", &rng),
            Err(PushError::InvalidSubscription(_))
        ));

        let sub = subscription(&public, &auth);
        let big = vec![b'a'; MAX_PAYLOAD_LEN + 1];
        assert!(matches!(encrypt(&sub, &big, &rng), Err(PushError::PayloadTooLarge(_))));
        assert!(encrypt(&sub, &big[..MAX_PAYLOAD_LEN], &rng).is_ok());
    }

    #[test]
    fn test_padded_keys_accepted() {
        let (_, public, auth) = receiver();
        let mut sub = subscription(&public, &auth);
        sub.keys.auth.push_str("==");
        assert!(encrypt(&sub, b"x", &SystemRandom::new()).is_ok());
    }

    fn vapid_key() -> VapidKey {
        let rng = SystemRandom::new();
        let pkcs8 = signature::EcdsaKeyPair::generate_pkcs8(
            &signature::ECDSA_P256_SHA256_FIXED_SIGNING,
            &rng,
        )
        .unwrap();
        // PKCS#8 v1 for P-256 from ring: the 32-byte scalar follows a fixed
        // 36-byte prefix; the public point sits at the end.
        let der = pkcs8.as_ref();
        let private = &der[36..68];
        let public = &der[der.len() - 65..];
        VapidKey::from_base64(&B64URL.encode(private), &B64URL.encode(public)).unwrap()
    }

    #[test]
    fn test_vapid_token_verifies_against_public_key() {
        let key = vapid_key();
        let token = key
            .token("https://push.example.com", "mailto:team334@gmail.com", 1_700_000_000)
            .unwrap();

        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);

        let claims: serde_json::Value =
            serde_json::from_slice(&B64URL.decode(parts[1]).unwrap()).unwrap();
        assert_eq!(claims["aud"], "https://push.example.com");
        assert_eq!(claims["exp"], 1_700_000_000 + VAPID_TTL_SECS);
        assert_eq!(claims["sub"], "mailto:team334@gmail.com");

        let public = B64URL.decode(key.public_key_b64()).unwrap();
        let sig = B64URL.decode(parts[2]).unwrap();
        signature::UnparsedPublicKey::new(&signature::ECDSA_P256_SHA256_FIXED, public)
            .verify(format!("{}.{}", parts[0], parts[1]).as_bytes(), &sig)
            .unwrap();
    }

    #[test]
    fn test_authorization_header_shape() {
        let key = vapid_key();
        let header = key.authorization("https://fcm.googleapis.com", "mailto:a@b.c", 0).unwrap();
        assert!(header.starts_with("vapid t="));
        assert!(header.ends_with(&format!(", k={}", key.public_key_b64())));
    }

    #[test]
    fn test_audience_is_endpoint_origin() {
        assert_eq!(
            audience("https://fcm.googleapis.com/fcm/send/abc123").unwrap(),
            "https://fcm.googleapis.com"
        );
        assert_eq!(
            audience("https://push.example.com:8443/x").unwrap(),
            "https://push.example.com:8443"
        );
        assert!(audience("http://push.example.com/x").is_err());
        assert!(audience("not a url").is_err());
    }
}

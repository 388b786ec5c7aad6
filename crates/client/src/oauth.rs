//! OAuth 1.0a request signing (header scheme).

use std::fmt;

use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha256;

pub use crunch_config::SignatureMethod;

use crate::error::TransportError;

// ── Key material ────────────────────────────────────────────────────

/// Application credentials issued by the API provider.
#[derive(Clone, PartialEq, Eq)]
pub struct Consumer {
    pub key: String,
    pub secret: String,
}

impl Consumer {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self { key: key.into(), secret: secret.into() }
    }
}

impl fmt::Debug for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// A request token or access token with its secret.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub token: String,
    pub secret: String,
}

impl TokenPair {
    pub fn new(token: impl Into<String>, secret: impl Into<String>) -> Self {
        Self { token: token.into(), secret: secret.into() }
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("token", &self.token)
            .field("secret", &"<redacted>")
            .finish()
    }
}

// ── Encoding ────────────────────────────────────────────────────────

/// RFC 3986 percent-encoding: everything but the unreserved set.
pub fn percent_encode(s: &str) -> String {
    let mut encoded = String::with_capacity(s.len() * 2);
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                encoded.push(byte as char);
            }
            _ => {
                encoded.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    encoded
}

fn normalize_url(url: &url::Url) -> String {
    let host = url.host_str().unwrap_or("");
    match url.port() {
        Some(port) => format!("{}://{}:{}{}", url.scheme(), host, port, url.path()),
        None => format!("{}://{}{}", url.scheme(), host, url.path()),
    }
}

/// `METHOD&enc(base_url)&enc(sorted_params)`. Query parameters of `url`
/// are folded into `params`.
pub fn signature_base_string(
    http_method: &str,
    url: &str,
    params: &[(String, String)],
) -> Result<String, TransportError> {
    let parsed = url::Url::parse(url)
        .map_err(|e| TransportError::Network(format!("invalid URL {:?}: {}", url, e)))?;

    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .chain(
            parsed
                .query_pairs()
                .map(|(k, v)| (percent_encode(&k), percent_encode(&v))),
        )
        .collect();
    encoded.sort();

    let sorted_str = encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    Ok(format!(
        "{}&{}&{}",
        http_method.to_uppercase(),
        percent_encode(&normalize_url(&parsed)),
        percent_encode(&sorted_str)
    ))
}

fn sign(method: SignatureMethod, key: &str, base_string: &str) -> Result<String, TransportError> {
    let b64 = base64::engine::general_purpose::STANDARD;
    let bad_key = |e: hmac::digest::InvalidLength| TransportError::Network(format!("signing key: {}", e));
    let digest = match method {
        SignatureMethod::HmacSha1 => {
            let mut mac = Hmac::<Sha1>::new_from_slice(key.as_bytes()).map_err(bad_key)?;
            mac.update(base_string.as_bytes());
            b64.encode(mac.finalize().into_bytes())
        }
        SignatureMethod::HmacSha256 => {
            let mut mac = Hmac::<Sha256>::new_from_slice(key.as_bytes()).map_err(bad_key)?;
            mac.update(base_string.as_bytes());
            b64.encode(mac.finalize().into_bytes())
        }
    };
    Ok(digest)
}

// ── Signer ──────────────────────────────────────────────────────────

/// Everything needed to sign one request: consumer, optional token, and
/// handshake-only parameters (`oauth_callback`, `oauth_verifier`).
#[derive(Debug, Clone)]
pub struct OAuthSigner {
    pub consumer: Consumer,
    pub token: Option<TokenPair>,
    pub method: SignatureMethod,
    pub extra: Vec<(String, String)>,
}

impl OAuthSigner {
    pub fn new(consumer: Consumer, token: Option<TokenPair>, method: SignatureMethod) -> Self {
        Self { consumer, token, method, extra: Vec::new() }
    }

    pub fn with_param(mut self, key: &str, value: &str) -> Self {
        self.extra.push((key.to_string(), value.to_string()));
        self
    }

    /// `Authorization` header value with a fresh nonce and timestamp.
    pub fn authorization_header(&self, http_method: &str, url: &str) -> Result<String, TransportError> {
        let nonce: String = (0..32)
            .map(|_| format!("{:x}", rand::random::<u8>() % 16))
            .collect();
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
            .to_string();
        self.authorization_header_with(http_method, url, &nonce, &timestamp)
    }

    /// Deterministic variant of [`authorization_header`](Self::authorization_header).
    pub fn authorization_header_with(
        &self,
        http_method: &str,
        url: &str,
        nonce: &str,
        timestamp: &str,
    ) -> Result<String, TransportError> {
        let mut params = self.oauth_params(nonce, timestamp);
        let base_string = signature_base_string(http_method, url, &params)?;
        let signature = sign(self.method, &self.signing_key(), &base_string)?;
        params.push(("oauth_signature".to_string(), signature));
        params.sort();

        let header_params = params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join(", ");

        Ok(format!("OAuth {}", header_params))
    }

    fn oauth_params(&self, nonce: &str, timestamp: &str) -> Vec<(String, String)> {
        let mut params = vec![
            ("oauth_consumer_key".to_string(), self.consumer.key.clone()),
            ("oauth_nonce".to_string(), nonce.to_string()),
            ("oauth_signature_method".to_string(), self.method.as_str().to_string()),
            ("oauth_timestamp".to_string(), timestamp.to_string()),
            ("oauth_version".to_string(), "1.0".to_string()),
        ];
        if let Some(token) = &self.token {
            params.push(("oauth_token".to_string(), token.token.clone()));
        }
        params.extend(self.extra.iter().cloned());
        params
    }

    fn signing_key(&self) -> String {
        format!(
            "{}&{}",
            percent_encode(&self.consumer.secret),
            percent_encode(self.token.as_ref().map(|t| t.secret.as_str()).unwrap_or(""))
        )
    }
}

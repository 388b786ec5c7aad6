//! Three-legged authorization handshake and the resulting access token.
//!
//! ```text
//! Unauthenticated ──begin──▶ PendingAuthorization ──complete──▶ Authenticated
//!        ▲                           │ (bad verifier)
//!        └───────────────────────────┘
//! ```
//!
//! A session constructed with an existing token pair starts Authenticated.
//! Every resource call is signed with the session's credentials; none is
//! attempted before the handshake completes.

use std::fmt;

use crunch_config::ClientConfig;

use crate::error::{CrunchError, TransportError};
use crate::oauth::{percent_encode, Consumer, OAuthSigner, SignatureMethod, TokenPair};
use crate::transport::{HttpTransport, Method, SigningTransport};

// ── Constants ───────────────────────────────────────────────────────

pub const REQUEST_TOKEN_PATH: &str = "/crunch-core/oauth/request_token";
pub const AUTHORIZE_PATH: &str = "/crunch-core/login/oauth-login.seam";
pub const ACCESS_TOKEN_PATH: &str = "/crunch-core/oauth/access_token";
pub const API_BASE_PATH: &str = "/rest/v2";

/// Out-of-band: the user copies the verifier back by hand.
const OAUTH_CALLBACK: &str = "oob";

// ── Types ───────────────────────────────────────────────────────────

/// Long-lived access token pair. Callers persist these to resume later.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub oauth_token: String,
    pub oauth_token_secret: String,
}

impl Credentials {
    pub fn new(oauth_token: impl Into<String>, oauth_token_secret: impl Into<String>) -> Self {
        Self {
            oauth_token: oauth_token.into(),
            oauth_token_secret: oauth_token_secret.into(),
        }
    }

    fn token_pair(&self) -> TokenPair {
        TokenPair::new(self.oauth_token.clone(), self.oauth_token_secret.clone())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("oauth_token", &self.oauth_token)
            .field("oauth_token_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    PendingAuthorization,
    Authenticated,
}

#[derive(Debug, Clone)]
enum Phase {
    Unauthenticated,
    Pending(TokenPair),
    Authenticated(Credentials),
}

/// Base URLs: `api` serves `/rest/v2/...`, `auth` serves the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub api: String,
    pub auth: String,
}

impl Endpoints {
    pub fn new(api: impl Into<String>, auth: impl Into<String>) -> Self {
        Self { api: api.into(), auth: auth.into() }
    }
}

fn join(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

/// A 4xx from a token endpoint is a refusal; anything else stays a transport error.
fn rejected(err: TransportError, refusal: fn(String) -> CrunchError) -> CrunchError {
    match err {
        TransportError::Http { status: 400..=499, .. } => refusal(err.to_string()),
        other => CrunchError::Transport(other),
    }
}

// ── Session ─────────────────────────────────────────────────────────

pub struct AuthSession<T = HttpTransport> {
    transport: T,
    consumer: Consumer,
    signature_method: SignatureMethod,
    endpoints: Endpoints,
    phase: Phase,
}

impl AuthSession<HttpTransport> {
    /// Build from configuration. Resumes an Authenticated session when the
    /// config carries a token pair.
    pub fn from_config(config: &ClientConfig) -> Result<Self, CrunchError> {
        config.validate()?;
        let transport = HttpTransport::new(config.debug)?;
        let consumer = Consumer::new(config.consumer_key.clone(), config.consumer_secret.clone());
        let endpoints = Endpoints::new(config.api_endpoint.clone(), config.auth_endpoint.clone());

        let session = match (&config.oauth_token, &config.oauth_token_secret) {
            (Some(token), Some(secret)) => AuthSession::with_credentials(
                transport,
                consumer,
                endpoints,
                Credentials::new(token.clone(), secret.clone()),
            ),
            _ => AuthSession::new(transport, consumer, endpoints),
        };
        Ok(session.with_signature_method(config.signature_method))
    }
}

impl<T: SigningTransport> AuthSession<T> {
    pub fn new(transport: T, consumer: Consumer, endpoints: Endpoints) -> Self {
        Self {
            transport,
            consumer,
            signature_method: SignatureMethod::default(),
            endpoints,
            phase: Phase::Unauthenticated,
        }
    }

    /// Resume with an access token obtained earlier.
    pub fn with_credentials(
        transport: T,
        consumer: Consumer,
        endpoints: Endpoints,
        credentials: Credentials,
    ) -> Self {
        Self {
            phase: Phase::Authenticated(credentials),
            ..Self::new(transport, consumer, endpoints)
        }
    }

    pub fn with_signature_method(mut self, method: SignatureMethod) -> Self {
        self.signature_method = method;
        self
    }

    pub fn state(&self) -> AuthState {
        match self.phase {
            Phase::Unauthenticated => AuthState::Unauthenticated,
            Phase::Pending(_) => AuthState::PendingAuthorization,
            Phase::Authenticated(_) => AuthState::Authenticated,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.phase, Phase::Authenticated(_))
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        match &self.phase {
            Phase::Authenticated(c) => Some(c),
            _ => None,
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Step 1: obtain a request token and return the URL the user must visit.
    ///
    /// Starting a new handshake discards any existing credentials.
    pub fn begin_authorization(&mut self) -> Result<String, CrunchError> {
        let url = join(&self.endpoints.auth, REQUEST_TOKEN_PATH);
        let signer = OAuthSigner::new(self.consumer.clone(), None, self.signature_method)
            .with_param("oauth_callback", OAUTH_CALLBACK);

        let response = self
            .transport
            .fetch_token(&url, &signer)
            .map_err(|e| rejected(e, CrunchError::AuthorizationRequest))?;
        let request_token = response.token_pair().ok_or_else(|| {
            CrunchError::AuthorizationRequest("response missing oauth_token / oauth_token_secret".into())
        })?;

        let authorize_url = format!(
            "{}?oauth_token={}",
            join(&self.endpoints.auth, AUTHORIZE_PATH),
            percent_encode(&request_token.token)
        );

        log::info!("authorization started; awaiting verifier");
        self.phase = Phase::Pending(request_token);
        Ok(authorize_url)
    }

    /// Step 3: exchange the pending request token plus the user's verifier
    /// for an access token.
    ///
    /// The request token is single-use: it is gone afterwards whether the
    /// exchange succeeded or not, and a failure leaves the session
    /// Unauthenticated.
    pub fn complete_authorization(&mut self, verifier: &str) -> Result<Credentials, CrunchError> {
        let request_token = match std::mem::replace(&mut self.phase, Phase::Unauthenticated) {
            Phase::Pending(token) => token,
            other => {
                self.phase = other;
                return Err(CrunchError::NoPendingAuthorization);
            }
        };

        let url = join(&self.endpoints.auth, ACCESS_TOKEN_PATH);
        let signer = OAuthSigner::new(self.consumer.clone(), Some(request_token), self.signature_method)
            .with_param("oauth_verifier", verifier.trim());

        let response = self
            .transport
            .fetch_token(&url, &signer)
            .map_err(|e| rejected(e, CrunchError::Verification))?;
        let access = response.token_pair().ok_or_else(|| {
            CrunchError::Verification("response missing oauth_token / oauth_token_secret".into())
        })?;

        let credentials = Credentials::new(access.token, access.secret);
        log::info!("authorization complete");
        self.phase = Phase::Authenticated(credentials.clone());
        Ok(credentials)
    }

    // ── Signed resource calls ───────────────────────────────────────

    pub fn get(&self, path: &str) -> Result<serde_json::Value, CrunchError> {
        self.call(Method::Get, path, None)
    }

    pub fn post(&self, path: &str, body: &serde_json::Value) -> Result<serde_json::Value, CrunchError> {
        self.call(Method::Post, path, Some(body))
    }

    pub fn put(&self, path: &str, body: Option<&serde_json::Value>) -> Result<serde_json::Value, CrunchError> {
        self.call(Method::Put, path, body)
    }

    pub fn delete(&self, path: &str) -> Result<serde_json::Value, CrunchError> {
        self.call(Method::Delete, path, None)
    }

    /// Full URL for a resource path such as `/expenses`.
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}{}", self.endpoints.api.trim_end_matches('/'), API_BASE_PATH, path)
    }

    fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value, CrunchError> {
        let credentials = self.credentials().ok_or(CrunchError::NotAuthenticated)?;
        let signer = OAuthSigner::new(
            self.consumer.clone(),
            Some(credentials.token_pair()),
            self.signature_method,
        );
        let url = self.api_url(path);
        Ok(self.transport.sign_and_send(method, &url, body, &signer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_trims_slash() {
        assert_eq!(join("https://a.test/", "/x"), "https://a.test/x");
        assert_eq!(join("https://a.test", "/x"), "https://a.test/x");
    }

    #[test]
    fn test_from_config_resumes_session() {
        let config = ClientConfig {
            api_endpoint: "https://api.test/".into(),
            auth_endpoint: "https://auth.test".into(),
            consumer_key: "ck".into(),
            consumer_secret: "cs".into(),
            oauth_token: Some("tok".into()),
            oauth_token_secret: Some("sec".into()),
            ..ClientConfig::default()
        };
        let session = AuthSession::from_config(&config).unwrap();
        assert!(session.is_authenticated());
        assert_eq!(session.credentials().unwrap().oauth_token, "tok");
        assert_eq!(session.api_url("/expenses"), "https://api.test/rest/v2/expenses");
    }

    #[test]
    fn test_from_config_without_tokens() {
        let config = ClientConfig {
            api_endpoint: "https://api.test".into(),
            consumer_key: "ck".into(),
            consumer_secret: "cs".into(),
            ..ClientConfig::default()
        };
        let session = AuthSession::from_config(&config).unwrap();
        assert_eq!(session.state(), AuthState::Unauthenticated);
        assert!(matches!(session.get("/expenses"), Err(CrunchError::NotAuthenticated)));
    }

    #[test]
    fn test_from_config_invalid() {
        let err = AuthSession::from_config(&ClientConfig::default()).err().unwrap();
        assert!(matches!(err, CrunchError::Config(_)));
    }

    #[test]
    fn test_credentials_debug_redacted() {
        let dbg = format!("{:?}", Credentials::new("tok", "very-secret"));
        assert!(dbg.contains("tok"));
        assert!(!dbg.contains("very-secret"));
    }
}

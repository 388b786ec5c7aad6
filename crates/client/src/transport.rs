//! Signed HTTP boundary.
//!
//! The core only talks to the remote system through [`SigningTransport`].
//! [`HttpTransport`] is the production implementation: blocking reqwest
//! (no Tokio runtime required), one request per call, no retries.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION};

use crate::error::TransportError;
use crate::oauth::{OAuthSigner, TokenPair};

pub const USER_AGENT: &str = concat!("crunch-client/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(m: Method) -> Self {
        match m {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Form-encoded body returned by the request-token and access-token endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenResponse {
    params: HashMap<String, String>,
}

impl TokenResponse {
    pub fn from_form(body: &str) -> Self {
        let params = url::form_urlencoded::parse(body.trim().as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Self { params }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// `oauth_token` + `oauth_token_secret`, if both are present and non-empty.
    pub fn token_pair(&self) -> Option<TokenPair> {
        let token = self.get("oauth_token").filter(|s| !s.is_empty())?;
        let secret = self.get("oauth_token_secret").filter(|s| !s.is_empty())?;
        Some(TokenPair::new(token, secret))
    }
}

/// Signs, sends, and decodes. Implementations must not retry.
pub trait SigningTransport {
    /// Signed request with an optional JSON body; returns the decoded JSON
    /// response (`Null` for an empty body).
    fn sign_and_send(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
        signer: &OAuthSigner,
    ) -> Result<serde_json::Value, TransportError>;

    /// Signed POST to a token endpoint.
    fn fetch_token(&self, url: &str, signer: &OAuthSigner) -> Result<TokenResponse, TransportError>;
}

/// Blocking HTTP transport.
#[derive(Clone)]
pub struct HttpTransport {
    http: reqwest::blocking::Client,
    debug: bool,
}

impl HttpTransport {
    /// `debug` logs every request and response body at `debug` level.
    pub fn new(debug: bool) -> Result<Self, TransportError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| TransportError::Network(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { http, debug })
    }

    fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
        signer: &OAuthSigner,
        accept: &str,
    ) -> Result<String, TransportError> {
        let auth = signer.authorization_header(method.as_str(), url)?;

        let mut req = self
            .http
            .request(method.into(), url)
            .header(AUTHORIZATION, auth)
            .header(ACCEPT, accept);
        if let Some(body) = body {
            req = req.json(body);
        }

        if self.debug {
            log::debug!("-> {} {}", method, url);
            if let Some(body) = body {
                log::debug!("-> {}", body);
            }
        }

        let response = req.send().map_err(|e| TransportError::Network(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .map_err(|e| TransportError::Network(format!("failed to read response body: {}", e)))?;

        if self.debug {
            log::debug!("<- {} {}", status.as_u16(), text);
        }

        if !status.is_success() {
            return Err(TransportError::Http { status: status.as_u16(), body: text });
        }

        Ok(text)
    }
}

impl SigningTransport for HttpTransport {
    fn sign_and_send(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
        signer: &OAuthSigner,
    ) -> Result<serde_json::Value, TransportError> {
        let text = self.send(method, url, body, signer, "application/json")?;
        let trimmed = text.trim_start_matches('\u{feff}').trim();
        if trimmed.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(trimmed).map_err(|e| {
            TransportError::Json(format!(
                "{} (body: {})",
                e,
                trimmed.chars().take(200).collect::<String>()
            ))
        })
    }

    fn fetch_token(&self, url: &str, signer: &OAuthSigner) -> Result<TokenResponse, TransportError> {
        let text = self.send(Method::Post, url, None, signer, "*/*")?;
        Ok(TokenResponse::from_form(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    // httpmock's prelude also exports a `Method`
    use super::Method;
    use crate::oauth::{Consumer, SignatureMethod};
    use httpmock::prelude::*;

    fn signer() -> OAuthSigner {
        OAuthSigner::new(
            Consumer::new("ck", "cs"),
            Some(TokenPair::new("at", "as")),
            SignatureMethod::HmacSha1,
        )
    }

    #[test]
    fn test_token_response_from_form() {
        let resp = TokenResponse::from_form("oauth_token=abc&oauth_token_secret=x%2By&oauth_callback_confirmed=true");
        assert_eq!(resp.get("oauth_callback_confirmed"), Some("true"));
        let pair = resp.token_pair().unwrap();
        assert_eq!(pair.token, "abc");
        assert_eq!(pair.secret, "x+y");
    }

    #[test]
    fn test_token_response_missing_secret() {
        assert!(TokenResponse::from_form("oauth_token=abc").token_pair().is_none());
        assert!(TokenResponse::from_form("oauth_token=abc&oauth_token_secret=").token_pair().is_none());
        assert!(TokenResponse::from_form("").token_pair().is_none());
    }

    #[test]
    fn test_get_sends_signed_header() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/rest/v2/suppliers")
                .header("Accept", "application/json")
                .header_exists("Authorization");
            then.status(200)
                .json_body(serde_json::json!({ "supplier": [] }));
        });

        let transport = HttpTransport::new(false).unwrap();
        let body = transport
            .sign_and_send(Method::Get, &server.url("/rest/v2/suppliers"), None, &signer())
            .unwrap();

        mock.assert();
        assert_eq!(body, serde_json::json!({ "supplier": [] }));
    }

    #[test]
    fn test_post_sends_json_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/rest/v2/expenses")
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({ "amount": 12.5 }));
            then.status(201)
                .json_body(serde_json::json!({ "expenseId": 7 }));
        });

        let transport = HttpTransport::new(true).unwrap();
        let body = transport
            .sign_and_send(
                Method::Post,
                &server.url("/rest/v2/expenses"),
                Some(&serde_json::json!({ "amount": 12.5 })),
                &signer(),
            )
            .unwrap();

        mock.assert();
        assert_eq!(body["expenseId"], 7);
    }

    #[test]
    fn test_empty_body_is_null() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(PUT).path("/rest/v2/sales_invoices/5/issue");
            then.status(204);
        });

        let transport = HttpTransport::new(false).unwrap();
        let body = transport
            .sign_and_send(Method::Put, &server.url("/rest/v2/sales_invoices/5/issue"), None, &signer())
            .unwrap();
        assert!(body.is_null());
    }

    #[test]
    fn test_http_error_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/rest/v2/expenses");
            then.status(401).body("token_rejected");
        });

        let transport = HttpTransport::new(false).unwrap();
        let err = transport
            .sign_and_send(Method::Get, &server.url("/rest/v2/expenses"), None, &signer())
            .unwrap_err();
        assert_eq!(err, TransportError::Http { status: 401, body: "token_rejected".into() });
    }

    #[test]
    fn test_malformed_json() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/rest/v2/clients");
            then.status(200).body("<html>oops</html>");
        });

        let transport = HttpTransport::new(false).unwrap();
        let err = transport
            .sign_and_send(Method::Get, &server.url("/rest/v2/clients"), None, &signer())
            .unwrap_err();
        assert!(matches!(err, TransportError::Json(ref m) if m.contains("<html>")));
    }

    #[test]
    fn test_fetch_token_parses_form() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/crunch-core/oauth/request_token");
            then.status(200)
                .body("oauth_token=req&oauth_token_secret=reqsec&oauth_callback_confirmed=true");
        });

        let transport = HttpTransport::new(false).unwrap();
        let resp = transport
            .fetch_token(&server.url("/crunch-core/oauth/request_token"), &signer())
            .unwrap();
        assert_eq!(resp.token_pair(), Some(TokenPair::new("req", "reqsec")));
    }
}

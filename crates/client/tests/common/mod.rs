#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use crunch_client::{
    AuthSession, Consumer, Credentials, CrunchClient, Endpoints, Method, OAuthSigner, SigningTransport, TokenResponse,
    TransportError, VatRate,
};
use serde_json::Value;

pub const API: &str = "https://api.test";
pub const AUTH: &str = "https://auth.test";

/// One request seen by the fake.
#[derive(Debug, Clone)]
pub struct Call {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
    /// Token the request was signed with, if any.
    pub token: Option<String>,
    pub extra: Vec<(String, String)>,
}

struct Route {
    method: Method,
    path: String,
    response: Result<Value, TransportError>,
}

struct TokenRoute {
    path: String,
    verifier: Option<String>,
    response: Result<String, TransportError>,
}

#[derive(Default)]
struct State {
    routes: Vec<Route>,
    tokens: Vec<TokenRoute>,
    calls: Vec<Call>,
}

/// In-memory transport. Routes match on URL suffix; the most recently
/// registered route wins, so tests can change "remote" state mid-flow.
#[derive(Clone, Default)]
pub struct FakeTransport {
    state: Rc<RefCell<State>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&self, method: Method, path: &str, response: Value) {
        self.state.borrow_mut().routes.push(Route { method, path: path.to_string(), response: Ok(response) });
    }

    pub fn fail(&self, method: Method, path: &str, error: TransportError) {
        self.state.borrow_mut().routes.push(Route { method, path: path.to_string(), response: Err(error) });
    }

    /// Token endpoint answering with a form body.
    pub fn token(&self, path: &str, form: &str) {
        self.state.borrow_mut().tokens.push(TokenRoute {
            path: path.to_string(),
            verifier: None,
            response: Ok(form.to_string()),
        });
    }

    /// Token endpoint that only accepts `verifier`; anything else gets a 401.
    pub fn token_for_verifier(&self, path: &str, verifier: &str, form: &str) {
        self.state.borrow_mut().tokens.push(TokenRoute {
            path: path.to_string(),
            verifier: Some(verifier.to_string()),
            response: Ok(form.to_string()),
        });
    }

    pub fn token_fail(&self, path: &str, error: TransportError) {
        self.state.borrow_mut().tokens.push(TokenRoute { path: path.to_string(), verifier: None, response: Err(error) });
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub fn calls_to(&self, method: Method, path: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.method == method && c.url.ends_with(path))
            .collect()
    }

    fn record(&self, method: Method, url: &str, body: Option<&Value>, signer: &OAuthSigner) {
        self.state.borrow_mut().calls.push(Call {
            method,
            url: url.to_string(),
            body: body.cloned(),
            token: signer.token.as_ref().map(|t| t.token.clone()),
            extra: signer.extra.clone(),
        });
    }
}

impl SigningTransport for FakeTransport {
    fn sign_and_send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        signer: &OAuthSigner,
    ) -> Result<Value, TransportError> {
        // signing must succeed for every request the client makes
        signer.authorization_header(method.as_str(), url)?;
        self.record(method, url, body, signer);

        let state = self.state.borrow();
        state
            .routes
            .iter()
            .rev()
            .find(|r| r.method == method && url.ends_with(&r.path))
            .map(|r| r.response.clone())
            .unwrap_or_else(|| Err(TransportError::Http { status: 404, body: format!("no route for {} {}", method, url) }))
    }

    fn fetch_token(&self, url: &str, signer: &OAuthSigner) -> Result<TokenResponse, TransportError> {
        signer.authorization_header("POST", url)?;
        self.record(Method::Post, url, None, signer);

        let verifier = signer
            .extra
            .iter()
            .find(|(k, _)| k == "oauth_verifier")
            .map(|(_, v)| v.clone());
        let state = self.state.borrow();
        let route = state
            .tokens
            .iter()
            .rev()
            .find(|t| url.ends_with(&t.path))
            .ok_or_else(|| TransportError::Http { status: 404, body: format!("no token route for {}", url) })?;
        if route.verifier.is_some() && route.verifier != verifier {
            return Err(TransportError::Http { status: 401, body: "oauth_problem=verifier_invalid".into() });
        }
        route.response.clone().map(|form| TokenResponse::from_form(&form))
    }
}

pub fn consumer() -> Consumer {
    Consumer::new("consumer-key", "consumer-secret")
}

pub fn endpoints() -> Endpoints {
    Endpoints::new(API, AUTH)
}

pub fn authenticated_client(transport: &FakeTransport) -> CrunchClient<FakeTransport> {
    let session = AuthSession::with_credentials(
        transport.clone(),
        consumer(),
        endpoints(),
        Credentials::new("access-token", "access-secret"),
    );
    CrunchClient::new(session, VatRate::STANDARD)
}

//! Authenticated HTTP transport for the Gramps Web REST API.
//!
//! The engine talks through the [`Transport`] trait so tests can substitute
//! a scripted in-memory implementation. [`HttpTransport`] is the real one:
//! blocking reqwest, a lazily-acquired bearer token, bounded per-request
//! timeouts, and no internal retries; retry policy belongs to the poll
//! cycle above us.

use std::cell::RefCell;
use std::fmt;
use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

/// Per-request timeout for data fetches.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Tighter timeout for the token exchange.
const AUTH_TIMEOUT: Duration = Duration::from_secs(10);

/// Read access to the remote service. Single-threaded by design; the engine
/// never issues concurrent requests.
pub trait Transport {
    /// Authenticated GET returning the decoded JSON body.
    fn get_json(&self, path: &str, params: &[(&str, &str)]) -> Result<Value, TransportError>;

    /// Authenticated GET returning the raw body (thumbnails).
    fn get_bytes(&self, path: &str) -> Result<Vec<u8>, TransportError>;

    /// Absolute URL for an API path, for references that leave the process.
    fn url_for(&self, path: &str) -> String;
}

/// Classified transport failure — tells the caller *why* the remote call
/// failed without leaking reqwest types upward.
#[derive(Debug)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// 401/403 — bad credentials or missing token.
    Auth,
    /// 404 — unknown handle or endpoint.
    NotFound,
    /// 408 or the client-side timeout fired.
    Timeout,
    /// Connection refused, DNS failure, reset, etc.
    Network,
    /// 500/502/503/504 — remote-side outage.
    ServerError,
    /// Body was not the JSON shape we expected.
    Decode,
    /// Anything else.
    Unknown,
}

impl TransportError {
    pub fn from_status(status: u16, body: &str) -> Self {
        let kind = match status {
            401 | 403 => TransportErrorKind::Auth,
            404 => TransportErrorKind::NotFound,
            408 => TransportErrorKind::Timeout,
            500 | 502 | 503 | 504 => TransportErrorKind::ServerError,
            _ => TransportErrorKind::Unknown,
        };
        Self {
            kind,
            status: Some(status),
            message: truncate_body(body),
        }
    }

    pub fn network(err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else {
            TransportErrorKind::Network
        };
        Self {
            kind,
            status: None,
            message: err.to_string(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Decode,
            status: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(
                f,
                "gramps web request failed ({}, {:?}): {}",
                status, self.kind, self.message
            ),
            None => write!(
                f,
                "gramps web request failed ({:?}): {}",
                self.kind, self.message
            ),
        }
    }
}

impl std::error::Error for TransportError {}

/// Validate the service base URL. Both schemes are accepted, since
/// self-hosted Gramps instances commonly sit on plain HTTP inside a LAN,
/// but HTTP gets a warning: credentials travel in cleartext.
pub fn validate_base_url(base_url: &str) -> Result<(), String> {
    let parsed = reqwest::Url::parse(base_url)
        .map_err(|e| format!("Invalid url '{}': {}", base_url, e))?;

    match parsed.scheme() {
        "https" => Ok(()),
        "http" => {
            warn!(
                "Using unencrypted HTTP for Gramps Web at '{}'. \
                 Credentials will be transmitted in cleartext.",
                base_url
            );
            Ok(())
        }
        other => Err(format!(
            "Unsupported URL scheme '{}' in url '{}'. Only http and https are allowed.",
            other, base_url
        )),
    }
}

pub struct HttpTransport {
    client: Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
    token: RefCell<Option<String>>,
}

impl HttpTransport {
    pub fn new(
        base_url: &str,
        username: Option<&str>,
        password: Option<&str>,
    ) -> anyhow::Result<Self> {
        validate_base_url(base_url).map_err(|e| anyhow::anyhow!(e))?;

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.filter(|s| !s.is_empty()).map(str::to_string),
            password: password.filter(|s| !s.is_empty()).map(str::to_string),
            token: RefCell::new(None),
        })
    }

    /// Exchange the configured credentials for a bearer token. No-op success
    /// when credentials are absent.
    pub fn authenticate(&self) -> Result<(), TransportError> {
        let (Some(username), Some(password)) = (&self.username, &self.password) else {
            return Ok(());
        };

        let url = format!("{}/api/token/", self.base_url);
        debug!(url = %url, "Requesting access token");

        let resp = self
            .client
            .post(&url)
            .timeout(AUTH_TIMEOUT)
            .json(&json!({ "username": username, "password": password }))
            .send()
            .map_err(|e| TransportError::network(&e))?;

        let status = resp.status();
        let text = resp.text().map_err(|e| TransportError::network(&e))?;
        if !status.is_success() {
            return Err(TransportError::from_status(status.as_u16(), &text));
        }

        let data: Value =
            serde_json::from_str(&text).map_err(|e| TransportError::decode(e.to_string()))?;
        match data["access_token"].as_str() {
            Some(token) if !token.is_empty() => {
                *self.token.borrow_mut() = Some(token.to_string());
                Ok(())
            }
            _ => Err(TransportError::decode(
                "token response carried no access_token",
            )),
        }
    }

    /// Lazy authentication before the first authenticated request. A failure
    /// here is logged and the request proceeds without a token; the server
    /// answers 401 if it actually requires one.
    fn ensure_token(&self) {
        if self.token.borrow().is_some() || self.username.is_none() {
            return;
        }
        if let Err(e) = self.authenticate() {
            warn!("Failed to authenticate with Gramps Web: {}", e);
        }
    }

    fn execute(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<reqwest::blocking::Response, TransportError> {
        self.ensure_token();

        let url = self.url_for(path);
        debug!(url = %url, "GET");

        let mut req = self.client.get(&url);
        if !params.is_empty() {
            req = req.query(params);
        }
        let token = self.token.borrow().clone();
        if let Some(token) = &token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().map_err(|e| TransportError::network(&e))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(TransportError::from_status(status.as_u16(), &body));
        }
        Ok(resp)
    }
}

impl Transport for HttpTransport {
    fn get_json(&self, path: &str, params: &[(&str, &str)]) -> Result<Value, TransportError> {
        let resp = self.execute(path, params)?;
        let text = resp.text().map_err(|e| TransportError::network(&e))?;
        serde_json::from_str(&text).map_err(|e| TransportError::decode(e.to_string()))
    }

    fn get_bytes(&self, path: &str) -> Result<Vec<u8>, TransportError> {
        let resp = self.execute(path, &[])?;
        resp.bytes()
            .map(|b| b.to_vec())
            .map_err(|e| TransportError::network(&e))
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }
}

/// Keep error bodies loggable without dumping whole HTML error pages,
/// respecting UTF-8 char boundaries.
fn truncate_body(body: &str) -> String {
    const MAX: usize = 300;
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while end > 0 && !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

//! REST client module
//!
//! Handles:
//! - Blocking HTTPS calls against the console API
//! - HTTP basic (admin password) or service-token (SEC header) auth
//! - 404 translated to None, other non-success statuses to RestError::Api
//! - Translation of auth failures into operator-facing messages

use crate::errors::RestError;
use crate::models::ApiError;
use log::debug;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

const SEC_HEADER: &str = "SEC";
const REQUEST_TIMEOUT_SECS: u64 = 60;

pub const LOCKED_OUT_MARKER: &str = "locked out";
pub const LOCKED_OUT_ERROR: &str =
    "Your host has been locked out due to too many failed login attempts. Please try again later.";
pub const PASSWORD_AUTH_ERROR: &str =
    "You have provided an incorrect password. Please re-run the script and try again.";
pub const TOKEN_AUTH_ERROR: &str =
    "You have provided an incorrect token. Please re-run the script and try again.";
pub const TOKEN_PERMISSIONS_ERROR: &str =
    "The token provided has incorrect permissions. Please re-run the script and try again.";

/// Credentials supplied once at startup: admin password or an authorized
/// service token, never both.
#[derive(Debug, Clone)]
pub enum ClientAuth {
    Password { username: String, password: String },
    Token(String),
}

impl ClientAuth {
    pub fn with_password(password: &str) -> Self {
        ClientAuth::Password {
            username: "admin".to_string(),
            password: password.to_string(),
        }
    }

    pub fn with_token(token: &str) -> Self {
        ClientAuth::Token(token.to_string())
    }

    pub fn is_password_auth(&self) -> bool {
        matches!(self, ClientAuth::Password { .. })
    }

    pub fn is_token_auth(&self) -> bool {
        matches!(self, ClientAuth::Token(_))
    }
}

/// Translate a REST failure into the message shown to the operator.
/// Pure function of (status, body-contains-lockout-marker, auth mode);
/// anything that is not an auth failure passes through unchanged.
pub fn auth_error_message(auth: &ClientAuth, error: &RestError) -> String {
    let detailed = error.to_string();
    match error.response_code() {
        Some(401) => {
            if detailed.contains(LOCKED_OUT_MARKER) {
                LOCKED_OUT_ERROR.to_string()
            } else if auth.is_password_auth() {
                PASSWORD_AUTH_ERROR.to_string()
            } else {
                TOKEN_AUTH_ERROR.to_string()
            }
        }
        Some(403) if auth.is_token_auth() => TOKEN_PERMISSIONS_ERROR.to_string(),
        _ => detailed,
    }
}

/// Blocking HTTPS client for the console API
pub struct RestClient {
    hostname: String,
    auth: ClientAuth,
    client: Client,
}

impl RestClient {
    /// Build a client for the given console hostname. `insecure` skips
    /// certificate validation, as most consoles run self-signed certs.
    pub fn new(hostname: &str, auth: ClientAuth, insecure: bool) -> Result<Self, RestError> {
        let client = Client::builder()
            .danger_accept_invalid_certs(insecure)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|err| RestError::Transport(err.to_string()))?;
        Ok(RestClient {
            hostname: hostname.to_string(),
            auth,
            client,
        })
    }

    pub fn auth(&self) -> &ClientAuth {
        &self.auth
    }

    /// GET a JSON resource. Returns None on 404, the decoded body on the
    /// expected success status, and an error for anything else.
    pub fn get(
        &self,
        path: &str,
        success_code: StatusCode,
        extra_headers: &[(&str, &str)],
    ) -> Result<Option<Value>, RestError> {
        let request = self.client.get(self.build_url(path));
        self.execute(request, success_code, extra_headers, &[])
    }

    /// POST with query parameters, JSON response semantics as for `get`
    pub fn post(
        &self,
        path: &str,
        success_code: StatusCode,
        params: &[(&str, &str)],
    ) -> Result<Option<Value>, RestError> {
        let request = self.client.post(self.build_url(path));
        self.execute(request, success_code, &[], params)
    }

    fn execute(
        &self,
        mut request: RequestBuilder,
        success_code: StatusCode,
        extra_headers: &[(&str, &str)],
        params: &[(&str, &str)],
    ) -> Result<Option<Value>, RestError> {
        request = request.header("Accept", "application/json");
        for (name, value) in extra_headers {
            request = request.header(*name, *value);
        }
        if !params.is_empty() {
            request = request.query(params);
        }
        request = match &self.auth {
            ClientAuth::Password { username, password } => {
                request.basic_auth(username, Some(password))
            }
            ClientAuth::Token(token) => request.header(SEC_HEADER, token),
        };
        let response = request
            .send()
            .map_err(|err| RestError::Transport(err.to_string()))?;
        self.decode(response, success_code)
    }

    fn decode(&self, response: Response, success_code: StatusCode) -> Result<Option<Value>, RestError> {
        let status = response.status();
        debug!("API call returned status {}", status);
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if status == success_code {
            let body = response
                .json()
                .map_err(|err| RestError::Transport(err.to_string()))?;
            return Ok(Some(body));
        }
        let text = response
            .text()
            .map_err(|err| RestError::Transport(err.to_string()))?;
        let api_error = serde_json::from_str::<ApiError>(&text)
            .ok()
            .filter(|error| error.response_code().is_some() || error.detailed_message.is_some())
            .unwrap_or_else(|| ApiError::from_status_and_text(status.as_u16(), &text));
        Err(RestError::Api(api_error))
    }

    fn build_url(&self, path: &str) -> String {
        format!("https://{}{}", self.hostname, path)
    }
}

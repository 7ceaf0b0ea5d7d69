//! HTTP client for the back-office API
//!
//! Every call carries `Content-Type: application/json` and the stored bearer
//! token. Without a token the call never leaves the client: the navigator is
//! sent to the login page and the caller gets [`Error::AuthRequired`].

use crate::session::SessionStore;
use netdesk_core::{Error, Result, config::ApiConfig};
use parking_lot::Mutex;
use reqwest::{
    Client, Method,
    header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue},
};
use serde::{Serialize, de::DeserializeOwned};
use std::{fmt, sync::Arc, time::Duration};
use tracing::{debug, warn};

/// Page the user is sent to when no valid token is available
pub const LOGIN_PAGE: &str = "/login.html";

/// Moves the user to another page
pub trait Navigator: Send + Sync + fmt::Debug {
    /// Navigate to `location`
    fn redirect(&self, location: &str);
}

/// Navigator for the terminal: there is nothing to navigate, so it asks the
/// operator to log in again
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn redirect(&self, location: &str) {
        warn!(location, "Session missing or expired, login required");
    }
}

/// Navigator that remembers every redirect
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visits: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    /// Redirects seen so far
    #[must_use]
    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn redirect(&self, location: &str) {
        self.visits.lock().push(location.to_string());
    }
}

/// Extra headers for a single call, merged over the defaults
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    headers: Vec<(String, String)>,
}

impl RequestOptions {
    /// No extra headers
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header for this call
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// API client for the back-office backend
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: Arc<dyn SessionStore>,
    navigator: Arc<dyn Navigator>,
    default_headers: Vec<(String, String)>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("default_headers", &self.default_headers)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a new API client
    pub fn new(
        base_url: impl Into<String>,
        session: Arc<dyn SessionStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
            navigator,
            default_headers: Vec::new(),
        }
    }

    /// Create a client using the configured base URL and timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(
        config: &ApiConfig,
        session: Arc<dyn SessionStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| Error::configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            ..Self::new(config.base_url.clone(), session, navigator)
        })
    }

    /// Add a header sent with every call
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Base URL the client talks to
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Session the token is read from
    #[must_use]
    pub fn session(&self) -> &Arc<dyn SessionStore> {
        &self.session
    }

    /// `GET path`
    ///
    /// # Errors
    ///
    /// Returns [`Error::AuthRequired`] without a token, [`Error::Network`] on
    /// transport failures or non-2xx responses.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(Method::GET, path, None, &RequestOptions::default())
            .await
    }

    /// `POST path` with a JSON body
    ///
    /// # Errors
    ///
    /// See [`ApiClient::get`]; also fails if the body cannot be serialized.
    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_value(body)?;
        self.send(Method::POST, path, Some(body), &RequestOptions::default())
            .await
    }

    /// `PUT path` with a JSON body
    ///
    /// # Errors
    ///
    /// See [`ApiClient::post`].
    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_value(body)?;
        self.send(Method::PUT, path, Some(body), &RequestOptions::default())
            .await
    }

    /// `DELETE path`
    ///
    /// # Errors
    ///
    /// See [`ApiClient::get`].
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(Method::DELETE, path, None, &RequestOptions::default())
            .await
    }

    /// Issue a call with explicit method, body and per-call headers
    ///
    /// # Errors
    ///
    /// Returns [`Error::AuthRequired`] when no token is stored or the server
    /// answers 401, [`Error::Network`] for any other failure.
    pub async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        options: &RequestOptions,
    ) -> Result<T> {
        let Some(token) = self.session.token() else {
            self.navigator.redirect(LOGIN_PAGE);
            return Err(Error::AuthRequired);
        };

        let url = self.url(path);
        let headers = self.headers(&token, options)?;
        debug!(%method, %url, "Sending API request");

        let mut request = self.client.request(method, &url).headers(headers);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::network(format!("Failed to reach {url}: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            warn!(%url, "Token rejected by the server");
            if let Err(e) = self.session.clear() {
                warn!("Failed to clear session: {e}");
            }
            self.navigator.redirect(LOGIN_PAGE);
            return Err(Error::AuthRequired);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::network(format!("Failed to read response from {url}: {e}")))?;

        if !status.is_success() {
            return Err(Error::http_status(
                status.as_u16(),
                error_message(&bytes)
                    .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string()),
            ));
        }

        if bytes.is_empty() {
            return Ok(serde_json::from_value(serde_json::Value::Null)?);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    fn headers(&self, token: &str, options: &RequestOptions) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| Error::validation("token", "Token is not a valid header value"))?,
        );

        for (name, value) in self.default_headers.iter().chain(&options.headers) {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| Error::validation("headers", format!("Invalid header name {name}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| Error::validation("headers", format!("Invalid value for {name}")))?;
            headers.insert(name, value);
        }

        Ok(headers)
    }
}

/// Pull `message` or `error` out of a JSON error body
fn error_message(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    ["message", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySession;
    use pretty_assertions::assert_eq;

    fn client(session: MemorySession) -> (ApiClient, Arc<RecordingNavigator>) {
        let navigator = Arc::new(RecordingNavigator::default());
        let client = ApiClient::new(
            "http://backend.local/",
            Arc::new(session),
            Arc::clone(&navigator) as Arc<dyn Navigator>,
        );
        (client, navigator)
    }

    #[test]
    fn test_url_joining() {
        let (client, _) = client(MemorySession::new());

        assert_eq!(client.base_url(), "http://backend.local");
        assert_eq!(
            client.url("/api/customers"),
            "http://backend.local/api/customers"
        );
        assert_eq!(client.url("api/tickets"), "http://backend.local/api/tickets");
        assert_eq!(
            client.url("https://other.host/x"),
            "https://other.host/x"
        );
    }

    #[test]
    fn test_caller_headers_override_defaults() {
        let (client, _) = client(MemorySession::with_token("t0k"));
        let client = client.with_header("X-Branch", "north");
        let options = RequestOptions::new()
            .header("X-Branch", "south")
            .header("X-Request-Source", "console");

        let headers = client.headers("t0k", &options).unwrap();

        assert_eq!(headers[AUTHORIZATION], "Bearer t0k");
        assert_eq!(headers[CONTENT_TYPE], "application/json");
        assert_eq!(headers["x-branch"], "south");
        assert_eq!(headers["x-request-source"], "console");
    }

    #[test]
    fn test_invalid_header_name_is_validation_error() {
        let (client, _) = client(MemorySession::with_token("t"));
        let options = RequestOptions::new().header("bad header", "v");

        assert!(client.headers("t", &options).unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn test_missing_token_redirects_without_request() {
        let (client, navigator) = client(MemorySession::new());

        let result: Result<serde_json::Value> = client.get("/api/customers").await;

        assert!(matches!(result, Err(Error::AuthRequired)));
        assert_eq!(navigator.visits(), vec![LOGIN_PAGE.to_string()]);
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(br#"{"message":"Invoice not found"}"#).as_deref(),
            Some("Invoice not found")
        );
        assert_eq!(
            error_message(br#"{"error":"Forbidden"}"#).as_deref(),
            Some("Forbidden")
        );
        assert_eq!(error_message(b"<html>502</html>"), None);
    }
}

//! HTTP transport abstraction
//!
//! The engine speaks in terms of [`HttpRequest`] and [`HttpResponse`]; any
//! HTTP client can back it by implementing [`Transport`]. The default
//! implementation is [`ReqwestTransport`].

use crate::error::{Error, Result};
use crate::types::Method;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// An outgoing HTTP request
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HttpRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL (may already carry a query string)
    pub url: String,
    /// Query parameters, in insertion order
    pub query: Vec<(String, String)>,
    /// Request headers, in insertion order
    pub headers: Vec<(String, String)>,
    /// Form-encoded body
    pub form: Option<Vec<(String, String)>>,
    /// JSON body
    pub json: Option<Value>,
}

impl HttpRequest {
    /// Create a request
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            ..Default::default()
        }
    }

    /// Create a GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Create a POST request
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Add a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_query(key, value);
        self
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(key, value);
        self
    }

    /// Set a form-encoded body
    #[must_use]
    pub fn form(mut self, form: Vec<(String, String)>) -> Self {
        self.form = Some(form);
        self
    }

    /// Set or replace a query parameter
    pub fn set_query(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self.query.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.query.push((key, value));
        }
    }

    /// Remove a query parameter
    pub fn remove_query(&mut self, key: &str) {
        self.query.retain(|(k, _)| k != key);
    }

    /// Get a query parameter value
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set or replace a header (names compare case-insensitively)
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&key))
        {
            slot.1 = value;
        } else {
            self.headers.push((key, value));
        }
    }

    /// Get a header value
    pub fn header_value(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Follow an absolute URL, dropping the query params of this request
    #[must_use]
    pub fn follow(&self, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
            ..self.clone()
        }
    }
}

/// A received HTTP response
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HttpResponse {
    /// Status code
    pub status: u16,
    /// Response headers, names lowercased
    pub headers: HashMap<String, String>,
    /// Raw body text
    pub body: String,
}

impl HttpResponse {
    /// Create a response
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.insert(key.to_ascii_lowercase(), value.into());
        self
    }

    /// 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Get a header value (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Parse the body as JSON
    pub fn json(&self) -> Result<Value> {
        serde_json::from_str(&self.body)
            .map_err(|e| Error::decode(format!("Failed to parse JSON body: {e}")))
    }
}

/// Anything that can send an [`HttpRequest`]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and return the response, whatever its status.
    ///
    /// Only network-level failures are errors.
    async fn send(&self, request: &HttpRequest, timeout: Duration) -> Result<HttpResponse>;
}

/// [`Transport`] backed by `reqwest`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport with the given user agent
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| Error::transport(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wrap an existing reqwest client
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest, timeout: Duration) -> Result<HttpResponse> {
        let mut req = self
            .client
            .request(request.method.into(), &request.url)
            .timeout(timeout);

        for (key, value) in &request.headers {
            req = req.header(key.as_str(), value.as_str());
        }
        if !request.query.is_empty() {
            req = req.query(&request.query);
        }
        if let Some(form) = &request.form {
            req = req.form(form);
        }
        if let Some(body) = &request.json {
            req = req.json(body);
        }

        let response = req.send().await.map_err(|e| map_reqwest_error(&e, timeout))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| map_reqwest_error(&e, timeout))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn map_reqwest_error(e: &reqwest::Error, timeout: Duration) -> Error {
    if e.is_timeout() {
        Error::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }
    } else {
        Error::transport(e.to_string())
    }
}

//! In-memory transport

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;

use super::{AsyncHttpClient, HttpClient, HttpResponse, Method, TransportError};

const HTML_FALLBACK: &str = "<!DOCTYPE html>\n<html><body>index</body></html>";

/// In-memory static file server
///
/// Serves files keyed by URL path (origin and query string ignored) and
/// records every request. Missing files answer 404, or the index page
/// when HTML fallback is enabled, as single-page dev servers do.
#[derive(Debug, Clone, Default)]
pub struct MemoryHttpClient {
    files: Arc<RwLock<HashMap<String, String>>>,
    failures: Arc<RwLock<HashMap<String, String>>>,
    requests: Arc<Mutex<Vec<(Method, String)>>>,
    html_fallback: bool,
}

impl MemoryHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` at `path`
    pub fn with_file(self, path: &str, body: &str) -> Self {
        self.insert(path, body);
        self
    }

    /// Fail requests for `path` at the transport level
    pub fn with_failure(self, path: &str, message: &str) -> Self {
        if let Ok(mut failures) = self.failures.write() {
            failures.insert(key_of(path), message.to_string());
        }
        self
    }

    /// Answer unknown paths with an HTML page instead of 404
    pub fn with_html_fallback(mut self) -> Self {
        self.html_fallback = true;
        self
    }

    /// Add or replace a served file
    pub fn insert(&self, path: &str, body: &str) {
        if let Ok(mut files) = self.files.write() {
            files.insert(key_of(path), body.to_string());
        }
    }

    /// All requests so far, in order
    pub fn requests(&self) -> Vec<(Method, String)> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    /// Number of requests with `method` for `path`
    pub fn count(&self, method: Method, path: &str) -> usize {
        let key = key_of(path);
        self.requests()
            .iter()
            .filter(|(m, url)| *m == method && key_of(url) == key)
            .count()
    }

    fn respond(&self, method: Method, url: &str) -> Result<HttpResponse, TransportError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((method, url.to_string()));
        }

        let key = key_of(url);
        if let Some(message) = self.failures.read().ok().and_then(|f| f.get(&key).cloned()) {
            return Err(TransportError(message));
        }

        let body = self.files.read().ok().and_then(|f| f.get(&key).cloned());
        let response = match (body, self.html_fallback) {
            (Some(body), _) => HttpResponse::ok(body),
            (None, true) => HttpResponse::ok(HTML_FALLBACK),
            (None, false) => HttpResponse::with_status(404),
        };

        Ok(match method {
            Method::Head => HttpResponse::with_status(response.status),
            Method::Get => response,
        })
    }
}

impl HttpClient for MemoryHttpClient {
    fn send(&self, method: Method, url: &str) -> Result<HttpResponse, TransportError> {
        self.respond(method, url)
    }
}

#[async_trait(?Send)]
impl AsyncHttpClient for MemoryHttpClient {
    async fn fetch(&self, method: Method, url: &str) -> Result<HttpResponse, TransportError> {
        self.respond(method, url)
    }
}

/// URL path without scheme, host or query
fn key_of(url: &str) -> String {
    let without_scheme = match url.split_once("://") {
        Some((_, rest)) => rest.split_once('/').map(|(_, path)| path).unwrap_or(""),
        None => url,
    };
    let path = without_scheme.split('?').next().unwrap_or("");
    path.trim_start_matches('/').to_string()
}

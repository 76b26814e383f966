//! Local directory transport
//!
//! Serves files from a directory on disk the way a static dev server
//! would: the URL path is resolved under the directory, the host and
//! query string are ignored.

use std::io::ErrorKind;
use std::path::{Component as PathComponent, Path, PathBuf};

use async_trait::async_trait;
use beepy_loader::{AsyncHttpClient, HttpClient, HttpResponse, Method, TransportError};
use tracing::trace;

const TARGET: &str = "beepy::cli";

/// Origin the gateway resolves relative paths against
pub const LOCAL_ORIGIN: &str = "http://localhost";

/// Static file server over a local directory
#[derive(Debug, Clone)]
pub struct LocalOrigin {
    root: PathBuf,
}

impl LocalOrigin {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// File behind `url`, or None if it escapes the root
    fn file_for(&self, url: &str) -> Option<PathBuf> {
        let path = match url.split_once("://") {
            Some((_, rest)) => rest.split_once('/').map(|(_, p)| p).unwrap_or(""),
            None => url,
        };
        let path = path.split('?').next().unwrap_or("");
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, PathComponent::Normal(_)))
        {
            return None;
        }
        Some(self.root.join(relative))
    }

    fn respond(&self, method: Method, url: &str) -> Result<HttpResponse, TransportError> {
        let Some(file) = self.file_for(url) else {
            return Ok(HttpResponse::with_status(403));
        };
        trace!(target: TARGET, ?method, file = %file.display(), "serving");

        if file.is_dir() {
            return Ok(HttpResponse::with_status(404));
        }
        match std::fs::read_to_string(&file) {
            Ok(body) => Ok(match method {
                Method::Get => HttpResponse::ok(body),
                Method::Head => HttpResponse::with_status(200),
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(HttpResponse::with_status(404)),
            Err(e) => Err(TransportError(format!("{}: {}", file.display(), e))),
        }
    }
}

impl HttpClient for LocalOrigin {
    fn send(&self, method: Method, url: &str) -> Result<HttpResponse, TransportError> {
        self.respond(method, url)
    }
}

#[async_trait(?Send)]
impl AsyncHttpClient for LocalOrigin {
    async fn fetch(&self, method: Method, url: &str) -> Result<HttpResponse, TransportError> {
        self.respond(method, url)
    }
}

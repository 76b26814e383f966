//! File gateway
//!
//! Fetches files over HTTP-style transports and writes them into the
//! virtual filesystem. Both a blocking and an asynchronous variant exist:
//! the import path of the interpreter is synchronous, everything else runs
//! on the event loop.

mod memory;

pub use memory::MemoryHttpClient;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use beepy_config::Component;
use beepy_vfs::VirtualFileSystem;
use tracing::{debug, trace};

use crate::context::LoadContext;
use crate::error::GatewayError;
use crate::module_id::lstrip;

const TARGET: &str = Component::Gateway.target();

/// Request method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
}

/// Response of a completed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            body: String::new(),
        }
    }

    /// 4xx responses count as "not found"
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }
}

/// The request never produced a response
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Blocking transport
pub trait HttpClient {
    fn send(&self, method: Method, url: &str) -> Result<HttpResponse, TransportError>;
}

/// Non-blocking transport
#[async_trait(?Send)]
pub trait AsyncHttpClient {
    async fn fetch(&self, method: Method, url: &str) -> Result<HttpResponse, TransportError>;
}

/// Transport usable from both the import path and the event loop
pub trait Transport: HttpClient + AsyncHttpClient {}

impl<T: HttpClient + AsyncHttpClient + ?Sized> Transport for T {}

/// Options for a single load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Issue a HEAD request first and fail fast on 4xx
    pub check_exists: bool,
}

/// A file written into the virtual filesystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Path relative to the virtual root
    pub virtual_path: String,
    pub content: String,
}

/// File gateway
pub struct FileGateway {
    client: Arc<dyn Transport>,
    origin: String,
    dev_extra_query: String,
    root: String,
}

impl FileGateway {
    /// Create a gateway resolving relative paths against `origin`
    ///
    /// Writes land under `root` in the virtual filesystem.
    pub fn new(client: Arc<dyn Transport>, origin: impl Into<String>, root: impl Into<String>) -> Self {
        Self {
            client,
            origin: origin.into().trim_end_matches('/').to_string(),
            dev_extra_query: String::new(),
            root: root.into(),
        }
    }

    /// Append a query string to every request URL
    pub fn with_dev_extra_query(mut self, query: impl Into<String>) -> Self {
        self.dev_extra_query = query.into();
        self
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Absolute request URL for `path`
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    /// use beepy_loader::{FileGateway, MemoryHttpClient};
    ///
    /// let gw = FileGateway::new(Arc::new(MemoryHttpClient::new()), "http://localhost:8000", "root")
    ///     .with_dev_extra_query("t=1");
    /// assert_eq!(gw.url_for("/app/x.py"), "http://localhost:8000/app/x.py?t=1");
    /// assert_eq!(gw.url_for("https://cdn/x.py?v=2"), "https://cdn/x.py?v=2&t=1");
    /// ```
    pub fn url_for(&self, path: &str) -> String {
        let path = lstrip(path);
        let mut url = if path.contains("://") {
            path.to_string()
        } else {
            format!("{}/{}", self.origin, path)
        };

        if !self.dev_extra_query.is_empty() {
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(&self.dev_extra_query);
        }
        url
    }

    /// Blocking load
    ///
    /// Records `path` as the context's last loaded file.
    pub fn load_sync(
        &self,
        ctx: &mut LoadContext,
        path: &str,
        options: LoadOptions,
    ) -> Result<String, GatewayError> {
        let url = self.begin(ctx, path);

        if options.check_exists {
            let head = self
                .client
                .send(Method::Head, &url)
                .map_err(|e| network(&url, e))?;
            check_status(&url, &head)?;
        }

        let response = self
            .client
            .send(Method::Get, &url)
            .map_err(|e| network(&url, e))?;
        check_status(&url, &response)?;
        trace!(target: TARGET, %url, bytes = response.body.len(), "loaded");
        Ok(response.body)
    }

    /// Asynchronous load
    ///
    /// Records `path` as the context's last loaded file.
    pub async fn load(
        &self,
        ctx: &mut LoadContext,
        path: &str,
        options: LoadOptions,
    ) -> Result<String, GatewayError> {
        let url = self.begin(ctx, path);

        if options.check_exists {
            let head = self
                .client
                .fetch(Method::Head, &url)
                .await
                .map_err(|e| network(&url, e))?;
            check_status(&url, &head)?;
        }

        let response = self
            .client
            .fetch(Method::Get, &url)
            .await
            .map_err(|e| network(&url, e))?;
        check_status(&url, &response)?;
        trace!(target: TARGET, %url, bytes = response.body.len(), "loaded");
        Ok(response.body)
    }

    /// Blocking write
    ///
    /// Without `content` the file is first loaded from `virtual_path`
    /// itself. An empty string is written as-is.
    pub fn write_sync(
        &self,
        ctx: &mut LoadContext,
        vfs: &dyn VirtualFileSystem,
        virtual_path: &str,
        content: Option<&str>,
    ) -> Result<FileRecord, GatewayError> {
        let content = match content {
            Some(content) => content.to_string(),
            None => self.load_sync(ctx, virtual_path, LoadOptions::default())?,
        };
        self.store(vfs, virtual_path, content)
    }

    /// Asynchronous write, see [`FileGateway::write_sync`]
    pub async fn write(
        &self,
        ctx: &mut LoadContext,
        vfs: &dyn VirtualFileSystem,
        virtual_path: &str,
        content: Option<&str>,
    ) -> Result<FileRecord, GatewayError> {
        let content = match content {
            Some(content) => content.to_string(),
            None => {
                self.load(ctx, virtual_path, LoadOptions::default())
                    .await?
            }
        };
        self.store(vfs, virtual_path, content)
    }

    fn begin(&self, ctx: &mut LoadContext, path: &str) -> String {
        ctx.record_load(path);
        let url = self.url_for(path);
        debug!(target: TARGET, %url, "fetching");
        url
    }

    fn store(
        &self,
        vfs: &dyn VirtualFileSystem,
        virtual_path: &str,
        content: String,
    ) -> Result<FileRecord, GatewayError> {
        let virtual_path = lstrip(virtual_path).to_string();
        let target = format!("{}/{}", self.root, virtual_path);
        vfs.write_file(Path::new(&target), content.as_bytes())?;
        debug!(target: TARGET, path = %target, bytes = content.len(), "wrote file");
        Ok(FileRecord {
            virtual_path,
            content,
        })
    }
}

fn network(url: &str, error: TransportError) -> GatewayError {
    GatewayError::Network {
        url: url.to_string(),
        message: error.0,
    }
}

fn check_status(url: &str, response: &HttpResponse) -> Result<(), GatewayError> {
    if response.is_client_error() {
        return Err(GatewayError::NotFound {
            url: url.to_string(),
            status: response.status,
        });
    }
    Ok(())
}

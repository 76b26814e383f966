//! Dev reload channel
//!
//! In development mode the loader connects once to a local file-watch
//! server. Each message names a changed source file, or is `__` to rerun
//! the entry point only.

use async_trait::async_trait;
use beepy_config::Component;
use futures::stream::{LocalBoxStream, StreamExt};
use tracing::{debug, info};

use crate::error::ReloadError;
use crate::loader::ReloadCache;

pub(crate) const TARGET: &str = Component::Reload.target();

/// Address of the local file-watch server
pub const DEV_SERVER_URL: &str = "ws://localhost:8998/";

/// Message that only reruns the entry point
pub const RELOAD_ALL: &str = "__";

/// Incoming change notifications
pub type MessageStream = LocalBoxStream<'static, String>;

/// Connection to the file-watch server
#[async_trait(?Send)]
pub trait ReloadTransport {
    async fn connect(&self, url: &str) -> Result<MessageStream, ReloadError>;
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connected,
}

/// Work requested by one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadPlan {
    /// Rerun the entry point in reload mode
    EntryOnly,
    /// Refresh after a source file changed
    FileChanged {
        /// Changed source path
        source_path: String,
        /// Rewrite target and owning module, when the file is a known module
        rewrite: Option<(String, String)>,
    },
}

impl ReloadPlan {
    /// Plan the work for `message` given what has been loaded so far
    ///
    /// Files without a cache entry, and the root package file, are not
    /// rewritten; the root package and entry point are refreshed anyway.
    pub fn for_message(message: &str, cache: &ReloadCache) -> Self {
        if message == RELOAD_ALL {
            return ReloadPlan::EntryOnly;
        }

        let rewrite = cache
            .get(message)
            .and_then(|entry| entry.module.map(|module| (entry.virtual_path, module)));
        ReloadPlan::FileChanged {
            source_path: message.to_string(),
            rewrite,
        }
    }
}

/// Dev reload channel
///
/// Connects at most once; a failed connection is logged and never retried.
pub struct DevReloadChannel {
    url: String,
    state: ChannelState,
    attempted: bool,
    messages: Option<MessageStream>,
}

impl DevReloadChannel {
    pub fn new() -> Self {
        Self::with_url(DEV_SERVER_URL)
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            state: ChannelState::Disconnected,
            attempted: false,
            messages: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Connect through `transport`, once
    pub async fn open(&mut self, transport: &dyn ReloadTransport) -> ChannelState {
        if self.attempted {
            debug!(target: TARGET, "reload channel already initialized");
            return self.state;
        }
        self.attempted = true;

        match transport.connect(&self.url).await {
            Ok(messages) => {
                self.messages = Some(messages);
                self.state = ChannelState::Connected;
                info!(target: TARGET, url = %self.url, "dev reload channel connected");
            }
            Err(err) => {
                debug!(target: TARGET, error = %err, "dev reload channel unavailable");
            }
        }
        self.state
    }

    /// Next message, or None once the server closes the connection
    pub async fn next_message(&mut self) -> Option<String> {
        let message = match self.messages.as_mut() {
            Some(messages) => messages.next().await,
            None => return None,
        };
        if message.is_none() {
            self.messages = None;
            self.state = ChannelState::Disconnected;
            info!(target: TARGET, "dev reload channel closed");
        }
        message
    }
}

impl Default for DevReloadChannel {
    fn default() -> Self {
        Self::new()
    }
}

//! Browser abstraction for driving the chat application.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over the
//! browser engine (currently Chromium via chromiumoxide), so the page host
//! and download sink can be tested against scripted contexts.

pub mod chromium;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// A browser engine that can hand out page contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Open a new tab.
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
    /// Reuse an already open tab whose URL starts with `url_prefix`, if any.
    async fn find_context(&self, url_prefix: &str) -> Result<Option<Box<dyn RenderContext>>>;
    /// Shut down the browser engine.
    async fn shutdown(&self) -> Result<()>;
}

/// A single page the runtime can script.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate to a URL with a timeout.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult>;
    /// Execute JavaScript in the page context and return the result.
    async fn execute_js(&self, script: &str) -> Result<serde_json::Value>;
    /// Get the current URL.
    async fn get_url(&self) -> Result<String>;
    /// Close this context.
    async fn close(self: Box<Self>) -> Result<()>;
}

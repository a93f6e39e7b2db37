//! Chromium-based renderer using chromiumoxide.
//!
//! Two ways in: launch a Chromium with a persistent profile (so the chat
//! application's login survives between runs), or attach to a browser the
//! user already started with `--remote-debugging-port`.

use super::{NavigationResult, RenderContext, Renderer};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Instant;
use tokio::task::JoinHandle;

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. CARDHARVEST_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("CARDHARVEST_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. ~/.cardharvest/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".cardharvest/chromium/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".cardharvest/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".cardharvest/chromium/chrome-linux64/chrome"),
                home.join(".cardharvest/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 3. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 4. Common macOS locations
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Default persistent profile directory: `~/.cardharvest/profile`.
pub fn default_profile_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".cardharvest")
        .join("profile")
}

/// How to launch a browser.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    pub profile_dir: PathBuf,
    /// Overrides [`find_chromium`].
    pub executable: Option<PathBuf>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: false,
            profile_dir: default_profile_dir(),
            executable: None,
        }
    }
}

/// Chromium-based renderer.
pub struct ChromiumRenderer {
    browser: Browser,
    handler_task: JoinHandle<()>,
}

impl ChromiumRenderer {
    /// Launch a Chromium instance with a persistent profile.
    pub async fn launch(options: &LaunchOptions) -> Result<Self> {
        let chrome_path = options
            .executable
            .clone()
            .or_else(find_chromium)
            .context("Chromium not found. Set CARDHARVEST_CHROMIUM_PATH or run `cardharvest doctor`.")?;

        std::fs::create_dir_all(&options.profile_dir).with_context(|| {
            format!("failed to create profile dir {}", options.profile_dir.display())
        })?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .user_data_dir(&options.profile_dir)
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-background-networking");
        if options.headless {
            builder = builder.arg("--headless=new");
        } else {
            builder = builder.with_head().viewport(None);
        }
        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        tracing::info!(profile = %options.profile_dir.display(), headless = options.headless, "chromium launched");
        Ok(Self {
            browser,
            handler_task,
        })
    }

    /// Attach to a running browser through its DevTools websocket URL.
    pub async fn connect(ws_url: &str) -> Result<Self> {
        let (mut browser, mut handler) = Browser::connect(ws_url)
            .await
            .with_context(|| format!("failed to connect to browser at {ws_url}"))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        // Make already open tabs visible to `pages()`.
        if let Err(e) = browser.fetch_targets().await {
            tracing::warn!("could not enumerate existing tabs: {e}");
        }

        tracing::info!(%ws_url, "attached to running browser");
        Ok(Self {
            browser,
            handler_task,
        })
    }

    fn wrap(&self, page: Page) -> Box<dyn RenderContext> {
        Box::new(ChromiumContext { page })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;
        Ok(self.wrap(page))
    }

    async fn find_context(&self, url_prefix: &str) -> Result<Option<Box<dyn RenderContext>>> {
        let pages = self.browser.pages().await.context("failed to list pages")?;
        for page in pages {
            let url = page.url().await.ok().flatten().unwrap_or_default();
            if url.starts_with(url_prefix) {
                tracing::debug!(%url, "reusing open tab");
                return Ok(Some(self.wrap(page)));
            }
        }
        Ok(None)
    }

    async fn shutdown(&self) -> Result<()> {
        // A launched browser is killed when the Browser is dropped; an attached
        // one is left running.
        self.handler_task.abort();
        Ok(())
    }
}

/// A single Chromium page context.
pub struct ChromiumContext {
    page: Page,
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult> {
        let start = Instant::now();

        let result = tokio::time::timeout(
            std::time::Duration::from_millis(timeout_ms),
            self.page.goto(url),
        )
        .await;

        let load_time_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(_response)) => {
                let _ = self.page.wait_for_navigation().await;

                let final_url = self
                    .page
                    .url()
                    .await
                    .unwrap_or_default()
                    .unwrap_or_else(|| url.to_string());

                Ok(NavigationResult {
                    final_url,
                    load_time_ms,
                })
            }
            Ok(Err(e)) => bail!("navigation failed: {e}"),
            Err(_) => bail!("navigation timed out after {timeout_ms}ms"),
        }
    }

    async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("JS execution failed")?;

        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert JS result: {e:?}"))
    }

    async fn get_url(&self) -> Result<String> {
        let url = self
            .page
            .url()
            .await
            .context("failed to get URL")?
            .unwrap_or_default();
        Ok(url)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let _ = self.page.close().await;
        Ok(())
    }
}

//! Browser session shared by `run` and `interactive`: open (or attach to) the
//! chat tab, wait until it is usable, pick an export sink, report progress.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use cardharvest::events::EventReceiver;
use cardharvest::{ExportSink, FileSink, HarvestConfig, HarvestEvent, HostSelectors};
use clap::{Args, ValueEnum};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use url::Url;

use crate::cli::output::{self, Styled};
use crate::page_host::PageHost;
use crate::page_sink::PageDownloadSink;
use crate::renderer::chromium::{ChromiumRenderer, LaunchOptions};
use crate::renderer::{RenderContext, Renderer};
use crate::settings::Overrides;
use crate::trigger::SpinnerTrigger;

pub const DEFAULT_CHAT_URL: &str = "https://notebooklm.google.com/";

const NAV_TIMEOUT_MS: u64 = 30_000;
const READY_POLL: Duration = Duration::from_millis(500);

#[derive(Args, Debug, Clone)]
pub struct BrowserArgs {
    /// Chat application URL; an open tab under this URL is reused
    #[arg(long, default_value = DEFAULT_CHAT_URL)]
    pub url: String,

    /// Attach to a running browser (DevTools websocket URL) instead of launching one
    #[arg(long, value_name = "WS_URL")]
    pub connect: Option<String>,

    /// Launch Chromium without a window
    #[arg(long)]
    pub headless: bool,

    /// Browser profile directory (default: ~/.cardharvest/profile)
    #[arg(long)]
    pub profile: Option<PathBuf>,

    /// Seconds to wait for the prompt input to appear (time to log in)
    #[arg(long, default_value = "180")]
    pub ready_timeout: u64,
}

/// Per-invocation overrides of the configured timing and export directory.
#[derive(Args, Debug, Clone, Default)]
pub struct TuningArgs {
    /// Give up on the response after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Milliseconds between response samples
    #[arg(long, value_name = "MS")]
    pub poll_interval: Option<u64>,

    /// Identical samples required before the response counts as finished
    #[arg(long, value_name = "N")]
    pub stable_samples: Option<u32>,

    /// Directory for `--sink file`
    #[arg(long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,
}

impl TuningArgs {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            timeout_secs: self.timeout,
            poll_interval_ms: self.poll_interval,
            stable_samples: self.stable_samples,
            out_dir: self.out_dir.clone(),
        }
    }
}

/// Where exported records go.
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SinkKind {
    /// Let the browser download `anki-import.txt`
    #[default]
    Browser,
    /// Write the file directly (export.directory, else the download directory)
    File,
}

pub struct ChatSession {
    renderer: ChromiumRenderer,
    ctx: Arc<dyn RenderContext>,
    host: Arc<PageHost>,
}

impl ChatSession {
    pub async fn open(args: &BrowserArgs, selectors: HostSelectors) -> Result<Self> {
        let renderer = match &args.connect {
            Some(ws) => ChromiumRenderer::connect(ws).await?,
            None => {
                let mut options = LaunchOptions {
                    headless: args.headless,
                    ..LaunchOptions::default()
                };
                if let Some(p) = &args.profile {
                    options.profile_dir = p.clone();
                }
                ChromiumRenderer::launch(&options).await?
            }
        };

        // Any open tab on the same origin will do; the chat app rewrites paths.
        let origin = Url::parse(&args.url)
            .with_context(|| format!("invalid chat URL {}", args.url))?
            .origin()
            .ascii_serialization();
        let ctx: Box<dyn RenderContext> = match renderer.find_context(&origin).await? {
            Some(ctx) => {
                let url = ctx.get_url().await.unwrap_or_default();
                tracing::info!(%url, "reusing open chat tab");
                ctx
            }
            None => {
                let mut ctx = renderer.new_context().await?;
                let nav = ctx.navigate(&args.url, NAV_TIMEOUT_MS).await?;
                tracing::info!(url = %nav.final_url, load_time_ms = nav.load_time_ms, "chat page opened");
                ctx
            }
        };
        let ctx: Arc<dyn RenderContext> = Arc::from(ctx);
        let host = Arc::new(PageHost::new(Arc::clone(&ctx), selectors));

        Ok(Self {
            renderer,
            ctx,
            host,
        })
    }

    pub fn host(&self) -> Arc<PageHost> {
        Arc::clone(&self.host)
    }

    /// Poll until the prompt input is rendered.
    pub async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut hinted = false;
        loop {
            match self.host.input_present().await {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(e) => tracing::debug!("readiness probe failed: {e}"),
            }
            if tokio::time::Instant::now() >= deadline {
                bail!(
                    "prompt input did not appear within {}s; is the chat page open and logged in?",
                    timeout.as_secs()
                );
            }
            if !hinted && output::is_chatty() {
                eprintln!("  Waiting for the chat page. Log in in the browser window if asked.");
                hinted = true;
            }
            tokio::time::sleep(READY_POLL).await;
        }
    }

    pub fn sink(&self, kind: SinkKind, config: &HarvestConfig) -> Arc<dyn ExportSink> {
        match kind {
            SinkKind::Browser => Arc::new(PageDownloadSink::new(Arc::clone(&self.ctx))),
            SinkKind::File => Arc::new(FileSink::from_config(&config.export)),
        }
    }

    pub async fn close(self) -> Result<()> {
        self.renderer.shutdown().await
    }
}

/// One human-readable line per milestone event. `Sampled` and `Failed`
/// produce none; failures are surfaced by the trigger.
pub fn describe(event: &HarvestEvent) -> Option<String> {
    let s = Styled::new();
    match event {
        HarvestEvent::SessionStarted { session, watermark, .. } => Some(format!(
            "  {} session {session} ({watermark} messages before prompt)",
            s.info_sym()
        )),
        HarvestEvent::PromptSubmitted { attempts, .. } => Some(format!(
            "  {} prompt submitted{}",
            s.info_sym(),
            if *attempts > 0 {
                format!(" after {attempts} retries")
            } else {
                String::new()
            }
        )),
        HarvestEvent::Stabilized { chars, elapsed_ms, .. } => Some(format!(
            "  {} response stable: {chars} chars after {:.1}s",
            s.info_sym(),
            *elapsed_ms as f64 / 1000.0
        )),
        HarvestEvent::Parsed { records, discarded, .. } => Some(format!(
            "  {} {records} flashcards parsed, {discarded} non-card segments skipped",
            s.info_sym()
        )),
        HarvestEvent::Exported { location, records, bytes, .. } => Some(format!(
            "  {} exported {records} flashcards ({bytes} bytes) to {location}",
            s.ok_sym()
        )),
        HarvestEvent::Sampled { .. } | HarvestEvent::Failed { .. } => None,
    }
}

/// Print milestone lines above the spinner until the channel closes.
pub fn spawn_reporter(mut rx: EventReceiver, trigger: Arc<SpinnerTrigger>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(line) = describe(&event) {
                        trigger.println(&line);
                    }
                }
                Err(RecvError::Lagged(n)) => tracing::debug!(skipped = n, "event reporter lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_describe_milestones_only() {
        std::env::set_var(output::NO_COLOR_ENV, "1");
        let id = Uuid::nil();
        let sampled = HarvestEvent::Sampled {
            session: id,
            chars: 10,
            stable_run: 1,
            threshold: 5,
        };
        assert!(describe(&sampled).is_none());

        let exported = HarvestEvent::Exported {
            session: id,
            location: "/tmp/anki-import.txt".into(),
            records: 2,
            bytes: 30,
        };
        assert_eq!(
            describe(&exported).unwrap(),
            "  [OK] exported 2 flashcards (30 bytes) to /tmp/anki-import.txt"
        );

        let submitted = HarvestEvent::PromptSubmitted {
            session: id,
            attempts: 0,
        };
        assert_eq!(describe(&submitted).unwrap(), "  [..] prompt submitted");
    }
}

//! `cardharvest run`: one generation against the chat page, then exit.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use cardharvest::{HarvestConfig, Orchestrator, TriggerOutcome};

use crate::cli::output;
use crate::cli::session::{spawn_reporter, BrowserArgs, ChatSession, SinkKind};
use crate::trigger::SpinnerTrigger;

/// Time for the browser to finish writing a download before it is shut down.
const DOWNLOAD_GRACE: Duration = Duration::from_secs(2);

pub async fn run(config: HarvestConfig, browser: &BrowserArgs, sink: SinkKind) -> Result<()> {
    let session = ChatSession::open(browser, config.selectors.clone()).await?;
    session
        .wait_ready(Duration::from_secs(browser.ready_timeout))
        .await?;

    // main prints the error, so the trigger only restores its label.
    let trigger = if output::is_chatty() {
        SpinnerTrigger::new()
    } else {
        SpinnerTrigger::hidden()
    };
    let trigger = Arc::new(trigger.without_alerts());

    let (tx, rx) = cardharvest::events::channel();
    let reporter = output::is_chatty().then(|| spawn_reporter(rx, Arc::clone(&trigger)));

    let export_sink = session.sink(sink, &config);
    let orchestrator = Orchestrator::new(session.host(), export_sink, config)?.with_events(tx);

    let outcome = orchestrator.trigger(trigger.as_ref()).await;
    // Dropping the orchestrator closes the event channel so the reporter drains and exits.
    drop(orchestrator);
    if let Some(handle) = reporter {
        let _ = handle.await;
    }
    trigger.finish();

    let result = match outcome {
        TriggerOutcome::Exported(receipt) => {
            if sink == SinkKind::Browser {
                tokio::time::sleep(DOWNLOAD_GRACE).await;
            }
            if output::is_json() {
                output::print_json(&serde_json::json!({
                    "ok": true,
                    "location": receipt.location,
                    "records": receipt.records,
                    "bytes": receipt.bytes,
                }));
            }
            Ok(())
        }
        TriggerOutcome::Failed(e) => Err(anyhow::Error::new(e)),
        TriggerOutcome::Ignored => bail!("a generation is already running"),
    };

    finish(result, session.close().await)
}

/// The generation's own outcome wins; a failed browser shutdown is only logged.
fn finish(result: Result<()>, closed: Result<()>) -> Result<()> {
    if let Err(e) = closed {
        tracing::warn!("failed to close browser session: {e:#}");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_close_failure_keeps_generation_error() {
        let err = finish(Err(anyhow!("timed out after 10m")), Err(anyhow!("browser gone"))).unwrap_err();
        assert_eq!(err.to_string(), "timed out after 10m");
    }

    #[test]
    fn test_close_failure_after_success_is_not_fatal() {
        assert!(finish(Ok(()), Err(anyhow!("browser gone"))).is_ok());
    }
}

//! Generation orchestrator.
//!
//! Sequences one run: submit the instruction prompt, wait for the response to
//! converge, parse records, export them. At most one run is active; a trigger
//! that arrives while busy is ignored. Whatever path a run exits through, the
//! busy flag is released, the status returns to `Idle` and the trigger
//! control is restored.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::config::HarvestConfig;
use crate::convergence::ConvergenceDetector;
use crate::events::{self, EventSender, HarvestEvent};
use crate::export::{ExportPayload, ExportReceipt, ExportSink};
use crate::host::{HostSurface, TriggerControl};
use crate::parser::parse_records;
use crate::prompt::FLASHCARD_PROMPT;
use crate::types::{GenerationSession, HarvestError, HarvestResult, SessionStatus};

/// Result of a trigger.
#[derive(Debug)]
pub enum TriggerOutcome {
    /// Another run was in progress; nothing happened.
    Ignored,
    Exported(ExportReceipt),
    Failed(HarvestError),
}

impl TriggerOutcome {
    pub fn is_ignored(&self) -> bool {
        matches!(self, Self::Ignored)
    }
}

pub struct Orchestrator {
    host: Arc<dyn HostSurface>,
    sink: Arc<dyn ExportSink>,
    config: HarvestConfig,
    busy: AtomicBool,
    status: watch::Sender<SessionStatus>,
    events: Option<EventSender>,
}

impl Orchestrator {
    pub fn new(
        host: Arc<dyn HostSurface>,
        sink: Arc<dyn ExportSink>,
        config: HarvestConfig,
    ) -> HarvestResult<Self> {
        config.validate()?;
        let (status, _) = watch::channel(SessionStatus::Idle);
        Ok(Self {
            host,
            sink,
            config,
            busy: AtomicBool::new(false),
            status,
            events: None,
        })
    }

    pub fn with_events(mut self, tx: EventSender) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    /// Watch status transitions.
    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    /// Run one generation unless one is already active.
    ///
    /// Failures are reported through `control.alert` and the log, and
    /// returned; they never propagate as panics or leave the trigger disabled.
    pub async fn trigger(&self, control: &dyn TriggerControl) -> TriggerOutcome {
        let Some(_guard) = BusyGuard::acquire(&self.busy, &self.status, control) else {
            tracing::debug!("generation already in progress, trigger ignored");
            return TriggerOutcome::Ignored;
        };
        control.set_busy();

        let mut session = GenerationSession::new(self.config.detector.timeout());
        match self.run(&mut session).await {
            Ok(receipt) => {
                tracing::info!(
                    session = %session.id,
                    records = receipt.records,
                    location = %receipt.location,
                    elapsed_ms = session.elapsed_ms(),
                    "flashcards exported"
                );
                TriggerOutcome::Exported(receipt)
            }
            Err(e) => {
                let failed_in = session.status;
                self.transition(&mut session, SessionStatus::Failed);
                tracing::error!(
                    session = %session.id,
                    kind = e.kind(),
                    stage = %failed_in,
                    error = %e,
                    "flashcard generation failed"
                );
                control.alert(&e.to_string());
                events::emit(
                    &self.events,
                    HarvestEvent::Failed {
                        session: session.id,
                        kind: e.kind().to_string(),
                        message: e.to_string(),
                    },
                );
                TriggerOutcome::Failed(e)
            }
        }
    }

    async fn run(&self, session: &mut GenerationSession) -> HarvestResult<ExportReceipt> {
        self.transition(session, SessionStatus::Submitting);
        session.watermark = self.host.message_count().await?;
        events::emit(
            &self.events,
            HarvestEvent::SessionStarted {
                session: session.id,
                watermark: session.watermark,
                timestamp: chrono::Utc::now().to_rfc3339(),
            },
        );
        tracing::info!(session = %session.id, watermark = session.watermark, "submitting flashcard prompt");

        let attempts = self.submit().await?;
        events::emit(
            &self.events,
            HarvestEvent::PromptSubmitted {
                session: session.id,
                attempts,
            },
        );

        self.transition(session, SessionStatus::Polling);
        let detector = ConvergenceDetector::new(self.config.detector.clone())
            .with_events(self.events.clone(), session.id);
        let text = detector
            .await_stable_text_until(self.host.as_ref(), session.watermark, session.deadline)
            .await?;

        self.transition(session, SessionStatus::Parsing);
        let report = parse_records(&text)?;
        events::emit(
            &self.events,
            HarvestEvent::Parsed {
                session: session.id,
                records: report.len(),
                discarded: report.discarded,
            },
        );

        self.transition(session, SessionStatus::Exporting);
        let payload = ExportPayload::new(self.config.export.filename.clone(), &report.records);
        let receipt = self.sink.export(&payload).await?;
        events::emit(
            &self.events,
            HarvestEvent::Exported {
                session: session.id,
                location: receipt.location.clone(),
                records: receipt.records,
                bytes: receipt.bytes,
            },
        );
        Ok(receipt)
    }

    /// Write the prompt, wait for the submit control to enable, click it.
    /// Returns the number of backoff waits needed.
    async fn submit(&self) -> HarvestResult<u32> {
        self.host.write_prompt(FLASHCARD_PROMPT).await?;

        let max_attempts = self.config.submit.max_attempts;
        let backoff = Duration::from_millis(self.config.submit.backoff_ms);
        let mut attempts = 0;
        while !self.host.submit_enabled().await? {
            if attempts >= max_attempts {
                return Err(HarvestError::SubmitBlocked { attempts });
            }
            tokio::time::sleep(backoff).await;
            attempts += 1;
        }

        self.host.click_submit().await?;
        Ok(attempts)
    }

    fn transition(&self, session: &mut GenerationSession, to: SessionStatus) {
        tracing::debug!(session = %session.id, from = %session.status, %to, "status");
        session.status = to;
        self.status.send_replace(to);
    }
}

/// Holds the single-flight flag for the duration of one run.
struct BusyGuard<'a> {
    busy: &'a AtomicBool,
    status: &'a watch::Sender<SessionStatus>,
    control: &'a dyn TriggerControl,
}

impl<'a> BusyGuard<'a> {
    fn acquire(
        busy: &'a AtomicBool,
        status: &'a watch::Sender<SessionStatus>,
        control: &'a dyn TriggerControl,
    ) -> Option<Self> {
        busy.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(Self {
            busy,
            status,
            control,
        })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.status.send_replace(SessionStatus::Idle);
        self.control.restore();
        self.busy.store(false, Ordering::Release);
    }
}

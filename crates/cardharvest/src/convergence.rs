//! Convergence detection for a streaming response.
//!
//! The host gives no completion signal, so completion is inferred by
//! debouncing: sample the response text on a fixed period and declare it
//! finished once `stable_samples` consecutive samples are identical and
//! non-empty. A deadline bounds the wait.
//!
//! [`StabilityTracker`] holds the debounce state and knows nothing about
//! time. [`ConvergenceDetector`] drives it from a `tokio::time::interval`
//! raced against a deadline sleep; both timers live on the same stack frame
//! and are dropped together when either resolves the outcome.

use tokio::time::{self, Instant, MissedTickBehavior};
use uuid::Uuid;

use crate::config::DetectorConfig;
use crate::events::{self, EventSender, HarvestEvent};
use crate::extract::extract_text;
use crate::host::ResponseSource;
use crate::types::{HarvestError, HarvestResult};

/// Run-length tracker over consecutive samples.
#[derive(Debug, Clone)]
pub struct StabilityTracker {
    last: String,
    run: u32,
    threshold: u32,
}

impl StabilityTracker {
    /// `threshold` is clamped to at least 1.
    pub fn new(threshold: u32) -> Self {
        Self {
            last: String::new(),
            run: 0,
            threshold: threshold.max(1),
        }
    }

    /// Feed one sample. Returns `true` once the last `threshold` samples were
    /// identical and non-empty.
    pub fn observe(&mut self, sample: &str) -> bool {
        if sample.is_empty() {
            self.run = 0;
            self.last.clear();
            return false;
        }

        if sample == self.last {
            self.run += 1;
        } else {
            self.run = 1;
            self.last.clear();
            self.last.push_str(sample);
        }
        self.run >= self.threshold
    }

    /// Length of the current run of identical non-empty samples.
    pub fn run(&self) -> u32 {
        self.run
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// The most recent non-empty sample.
    pub fn last(&self) -> &str {
        &self.last
    }
}

/// Waits for the response to the latest message to stop changing.
#[derive(Debug, Clone)]
pub struct ConvergenceDetector {
    config: DetectorConfig,
    events: Option<EventSender>,
    session: Uuid,
}

impl ConvergenceDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            events: None,
            session: Uuid::nil(),
        }
    }

    /// Report `Sampled`/`Stabilized` events for `session` on `tx`.
    pub fn with_events(mut self, tx: Option<EventSender>, session: Uuid) -> Self {
        self.events = tx;
        self.session = session;
        self
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Poll `source` until the response to a message beyond `watermark` is
    /// stable, or fail with [`HarvestError::Timeout`].
    ///
    /// Ticks where the message count has not exceeded `watermark`, where the
    /// latest message has no response element yet, or where the probe fails
    /// are skipped and leave the stability run untouched.
    pub async fn await_stable_text<S>(&self, source: &S, watermark: usize) -> HarvestResult<String>
    where
        S: ResponseSource + ?Sized,
    {
        let deadline = Instant::now() + self.config.timeout();
        self.await_stable_text_until(source, watermark, deadline).await
    }

    /// Same as [`Self::await_stable_text`] with an absolute deadline, for
    /// callers whose timeout started before polling did.
    pub async fn await_stable_text_until<S>(
        &self,
        source: &S,
        watermark: usize,
        deadline: Instant,
    ) -> HarvestResult<String>
    where
        S: ResponseSource + ?Sized,
    {
        let period = self.config.poll_interval();
        let start = Instant::now();

        let mut ticker = time::interval_at(start + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let expiry = time::sleep_until(deadline);
        tokio::pin!(expiry);

        let mut tracker = StabilityTracker::new(self.config.stable_samples);

        loop {
            tokio::select! {
                biased;

                _ = &mut expiry => return Err(self.expired(&tracker)),

                _ = ticker.tick() => {
                    // A hung page read must not outlive the deadline.
                    let probed = tokio::select! {
                        biased;
                        _ = &mut expiry => return Err(self.expired(&tracker)),
                        r = source.probe() => r,
                    };
                    let probe = match probed {
                        Ok(p) => p,
                        Err(e) => {
                            tracing::warn!(error = %e, "probe failed, skipping tick");
                            continue;
                        }
                    };

                    if probe.message_count <= watermark {
                        tracing::trace!(
                            count = probe.message_count,
                            watermark,
                            "response message not yet present"
                        );
                        continue;
                    }

                    let Some(snapshot) = probe.response else {
                        tracing::trace!("latest message has no response element yet");
                        continue;
                    };

                    let text = extract_text(&snapshot);
                    let settled = tracker.observe(&text);

                    tracing::debug!(
                        chars = text.len(),
                        stable_run = tracker.run(),
                        threshold = tracker.threshold(),
                        "sampled response"
                    );
                    events::emit(
                        &self.events,
                        HarvestEvent::Sampled {
                            session: self.session,
                            chars: text.len(),
                            stable_run: tracker.run(),
                            threshold: tracker.threshold(),
                        },
                    );

                    if settled {
                        let elapsed_ms = start.elapsed().as_millis() as u64;
                        tracing::info!(chars = text.len(), elapsed_ms, "response stabilized");
                        events::emit(
                            &self.events,
                            HarvestEvent::Stabilized {
                                session: self.session,
                                chars: text.len(),
                                elapsed_ms,
                            },
                        );
                        return Ok(text);
                    }
                }
            }
        }
    }

    fn expired(&self, tracker: &StabilityTracker) -> HarvestError {
        tracing::warn!(
            timeout_ms = self.config.timeout_ms,
            stable_run = tracker.run(),
            "response did not stabilize before deadline"
        );
        HarvestError::Timeout {
            timeout: self.config.timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ContentSnapshot;
    use crate::host::{HostError, ResponseProbe};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replays scripted probes, then reports "no response" forever.
    struct ScriptedSource {
        probes: Mutex<VecDeque<Result<ResponseProbe, HostError>>>,
        calls: Mutex<usize>,
    }

    impl ScriptedSource {
        fn new(probes: Vec<Result<ResponseProbe, HostError>>) -> Self {
            Self {
                probes: Mutex::new(probes.into()),
                calls: Mutex::new(0),
            }
        }

        fn texts(count: usize, texts: &[&str]) -> Self {
            Self::new(
                texts
                    .iter()
                    .map(|t| Ok(probe(count, Some(*t))))
                    .collect(),
            )
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl ResponseSource for ScriptedSource {
        async fn probe(&self) -> Result<ResponseProbe, HostError> {
            *self.calls.lock().unwrap() += 1;
            self.probes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(ResponseProbe::default()))
        }
    }

    fn probe(count: usize, text: Option<&str>) -> ResponseProbe {
        ResponseProbe {
            message_count: count,
            response: text.map(ContentSnapshot::flat),
        }
    }

    fn config(stable: u32, timeout_ms: u64) -> DetectorConfig {
        DetectorConfig {
            poll_interval_ms: 500,
            stable_samples: stable,
            timeout_ms,
        }
    }

    #[test]
    fn test_tracker_counts_run() {
        let mut t = StabilityTracker::new(3);
        assert!(!t.observe("a"));
        assert!(!t.observe("a"));
        assert!(t.observe("a"));
        assert_eq!(t.run(), 3);
    }

    #[test]
    fn test_tracker_resets_on_change_and_empty() {
        let mut t = StabilityTracker::new(2);
        assert!(!t.observe("a"));
        assert!(!t.observe("b"));
        assert_eq!(t.run(), 1);
        assert!(!t.observe(""));
        assert_eq!(t.run(), 0);
        assert_eq!(t.last(), "");
        assert!(!t.observe("b"));
        assert!(t.observe("b"));
    }

    #[test]
    fn test_tracker_empty_never_stable() {
        let mut t = StabilityTracker::new(1);
        for _ in 0..10 {
            assert!(!t.observe(""));
        }
        assert!(t.observe("x"));
    }

    #[test]
    fn test_tracker_threshold_clamped() {
        let t = StabilityTracker::new(0);
        assert_eq!(t.threshold(), 1);
    }

    /// Resolves iff `threshold` consecutive equal non-empty samples exist.
    #[test]
    fn test_tracker_matches_run_definition() {
        let cases: Vec<(Vec<&str>, u32, bool)> = vec![
            (vec!["A", "A", "A", "A", "A"], 5, true),
            (vec!["A", "B", "B", "B", "B"], 5, false),
            (vec!["", "", "", "", ""], 5, false),
            (vec!["A", "A", "", "A", "A"], 3, false),
            (vec!["x", "A", "A", "A"], 3, true),
        ];
        for (samples, threshold, expected) in cases {
            let mut t = StabilityTracker::new(threshold);
            let resolved = samples.iter().any(|s| t.observe(s));
            assert_eq!(resolved, expected, "samples {samples:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolves_after_five_identical_samples() {
        let source = ScriptedSource::texts(4, &["A", "A", "A", "A", "A"]);
        let detector = ConvergenceDetector::new(config(5, 600_000));
        let start = Instant::now();

        let text = detector.await_stable_text(&source, 3).await.unwrap();

        assert_eq!(text, "A");
        assert_eq!(source.calls(), 5);
        assert_eq!(start.elapsed(), Duration::from_millis(2500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_until_fifth_tick() {
        let source = ScriptedSource::texts(2, &["A"; 5]);
        let detector = ConvergenceDetector::new(config(5, 600_000));
        let mut wait = tokio_test::task::spawn(detector.await_stable_text(&source, 1));

        tokio_test::assert_pending!(wait.poll());
        for _ in 0..4 {
            time::advance(Duration::from_millis(500)).await;
            tokio_test::assert_pending!(wait.poll());
        }
        time::advance(Duration::from_millis(500)).await;
        let text = tokio_test::assert_ready_ok!(wait.poll());
        assert_eq!(text, "A");
    }

    #[tokio::test(start_paused = true)]
    async fn test_changing_tail_never_resolves() {
        let source = ScriptedSource::texts(4, &["A", "B", "B", "B", "B"]);
        let detector = ConvergenceDetector::new(config(5, 10_000));

        let err = detector.await_stable_text(&source, 3).await.unwrap_err();

        match err {
            HarvestError::Timeout { timeout } => assert_eq!(timeout, Duration::from_secs(10)),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    /// Never answers, like a page stuck behind a modal dialog.
    struct HungSource;

    #[async_trait]
    impl ResponseSource for HungSource {
        async fn probe(&self) -> Result<ResponseProbe, HostError> {
            time::sleep(Duration::from_secs(3600)).await;
            Ok(probe(2, Some("late")))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_interrupts_hung_probe() {
        let detector = ConvergenceDetector::new(config(5, 3_000));
        let start = Instant::now();

        let err = detector.await_stable_text(&HungSource, 0).await.unwrap_err();

        assert!(matches!(err, HarvestError::Timeout { .. }));
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ignores_ticks_at_or_below_watermark() {
        let mut probes = vec![Ok(probe(3, Some("stale"))); 6];
        probes.extend(vec![Ok(probe(4, Some("fresh"))); 2]);
        let source = ScriptedSource::new(probes);
        let detector = ConvergenceDetector::new(config(2, 600_000));

        let text = detector.await_stable_text(&source, 3).await.unwrap();

        assert_eq!(text, "fresh");
        assert_eq!(source.calls(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_skipped_ticks_do_not_break_run() {
        let source = ScriptedSource::new(vec![
            Ok(probe(2, Some("A"))),
            Ok(probe(2, None)),
            Err(HostError::Script("target detached".into())),
            Ok(probe(2, Some("A"))),
        ]);
        let detector = ConvergenceDetector::new(config(2, 600_000));

        let text = detector.await_stable_text(&source, 1).await.unwrap();
        assert_eq!(text, "A");
    }

    #[tokio::test(start_paused = true)]
    async fn test_streaming_text_resets_until_quiet() {
        let source = ScriptedSource::texts(
            1,
            &["\"Q", "\"Q1\";\"A", "\"Q1\";\"A1\"", "\"Q1\";\"A1\"", "\"Q1\";\"A1\""],
        );
        let detector = ConvergenceDetector::new(config(3, 600_000));

        let text = detector.await_stable_text(&source, 0).await.unwrap();
        assert_eq!(text, "\"Q1\";\"A1\"");
        assert_eq!(source.calls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_container_times_out() {
        let source = ScriptedSource::new(Vec::new());
        let detector = ConvergenceDetector::new(config(5, 3_000));

        let start = Instant::now();
        let err = detector.await_stable_text(&source, 0).await.unwrap_err();

        assert_eq!(err.kind(), "timeout");
        assert_eq!(start.elapsed(), Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_wins_tie_with_final_sample() {
        // Fifth sample lands exactly on the deadline: not strictly before it.
        let source = ScriptedSource::texts(1, &["A"; 5]);
        let detector = ConvergenceDetector::new(config(5, 2_500));
        assert!(detector.await_stable_text(&source, 0).await.is_err());

        let source = ScriptedSource::texts(1, &["A"; 5]);
        let detector = ConvergenceDetector::new(config(5, 2_501));
        assert_eq!(detector.await_stable_text(&source, 0).await.unwrap(), "A");
    }

    #[tokio::test(start_paused = true)]
    async fn test_emits_sample_and_stabilized_events() {
        let (tx, mut rx) = events::channel();
        let session = Uuid::new_v4();
        let source = ScriptedSource::texts(1, &["A", "A"]);
        let detector = ConvergenceDetector::new(config(2, 600_000)).with_events(Some(tx), session);

        detector.await_stable_text(&source, 0).await.unwrap();

        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            kinds.push(ev);
        }
        assert_eq!(kinds.len(), 3);
        assert!(matches!(kinds[1], HarvestEvent::Sampled { stable_run: 2, .. }));
        assert!(matches!(kinds[2], HarvestEvent::Stabilized { chars: 1, .. }));
    }
}

//! The poll loop: fetch → detect → filter → dedup → dispatch → sleep.
//!
//! One [`Monitor`] owns the detected set for the whole process. Cycles never
//! overlap and never propagate failures; every cycle ends in a
//! [`CycleOutcome`] that picks the next delay.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, error, info, instrument, warn};

use alphawatch_detector::{Detector, retain_actionable};
use alphawatch_net::{DispatchReport, OutboundMessage, PageFetcher, TelegramNotifier};
use alphawatch_shared::{AlphaWatchError, MAX_JITTER_SECS, MonitorConfig, Result};
use alphawatch_storage::DetectedStore;

use crate::alert::{compose_alert_now, startup_notice};

/// Floor for the jittered poll delay.
const MIN_DELAY: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Collaborator seams
// ---------------------------------------------------------------------------

/// Something that yields the monitored page body.
pub trait PageSource: Send + Sync {
    fn fetch(&self) -> impl Future<Output = Result<String>> + Send;
}

/// Something that delivers a message to every configured recipient.
pub trait Notifier: Send + Sync {
    fn recipient_count(&self) -> usize;

    fn send(&self, message: &OutboundMessage) -> impl Future<Output = DispatchReport> + Send;
}

impl PageSource for PageFetcher {
    fn fetch(&self) -> impl Future<Output = Result<String>> + Send {
        PageFetcher::fetch(self)
    }
}

impl Notifier for TelegramNotifier {
    fn recipient_count(&self) -> usize {
        TelegramNotifier::recipient_count(self)
    }

    fn send(&self, message: &OutboundMessage) -> impl Future<Output = DispatchReport> + Send {
        TelegramNotifier::send(self, message)
    }
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

/// How one poll cycle ended.
#[derive(Debug)]
pub enum CycleOutcome {
    Completed {
        /// Records extracted from the page, actionable or not.
        found: usize,
        /// Alerts sent this cycle.
        dispatched: usize,
        /// Actionable records already notified earlier.
        skipped: usize,
    },
    /// The page could not be fetched; the rest of the cycle was skipped.
    FetchFailed(AlphaWatchError),
    /// Anything else went wrong mid-cycle.
    Failed(String),
}

/// Sequential poll loop over a page source and a notifier.
pub struct Monitor<S, N> {
    source: S,
    notifier: N,
    detector: Arc<Detector>,
    store: DetectedStore,
    config: MonitorConfig,
    button_text: String,
}

impl<S: PageSource, N: Notifier> Monitor<S, N> {
    pub fn new(
        source: S,
        notifier: N,
        detector: Detector,
        store: DetectedStore,
        config: MonitorConfig,
        button_text: impl Into<String>,
    ) -> Self {
        Self {
            source,
            notifier,
            detector: Arc::new(detector),
            store,
            config,
            button_text: button_text.into(),
        }
    }

    pub fn store(&self) -> &DetectedStore {
        &self.store
    }

    /// Tell every recipient the monitor is up.
    pub async fn announce_startup(&self) -> DispatchReport {
        let report = self
            .notifier
            .send(&startup_notice(self.notifier.recipient_count()))
            .await;
        info!(
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "startup notice sent"
        );
        report
    }

    /// Run one full cycle. Never panics and never returns an error.
    #[instrument(skip_all)]
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        debug!(url = %self.config.url, "checking page");

        let html = match self.source.fetch().await {
            Ok(html) => html,
            Err(e) => {
                warn!(error = %e, "fetch failed, skipping cycle");
                return CycleOutcome::FetchFailed(e);
            }
        };

        // Parsing runs off the async workers so a panic surfaces as a JoinError.
        let detector = Arc::clone(&self.detector);
        let records = match tokio::task::spawn_blocking(move || detector.scan(&html)).await {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, "page parsing failed");
                return CycleOutcome::Failed(format!("page parsing failed: {e}"));
            }
        };

        let found = records.len();
        let actionable = retain_actionable(records);
        debug!(found, actionable = actionable.len(), "page scanned");

        let mut dispatched = 0;
        let mut skipped = 0;

        for record in actionable {
            if !self.store.is_new(&record.identifier) {
                debug!(
                    project = %record.project,
                    points = %record.required_points,
                    "already notified"
                );
                skipped += 1;
                continue;
            }

            info!(
                identifier = %record.identifier,
                project = %record.project,
                "new announcement, dispatching alert"
            );

            let message = compose_alert_now(&record, self.config.url.as_str(), &self.button_text);
            let report = self.notifier.send(&message).await;
            if !report.all_delivered() {
                warn!(
                    identifier = %record.identifier,
                    failed = report.failed.len(),
                    "alert not delivered to every recipient"
                );
            }

            // Marked once every recipient has been attempted, failures included.
            self.store.mark_notified(&record.identifier);
            dispatched += 1;

            tokio::time::sleep(self.config.dispatch_pause).await;
        }

        if dispatched == 0 {
            info!(found, skipped, "no new signals");
        }

        CycleOutcome::Completed {
            found,
            dispatched,
            skipped,
        }
    }

    /// Delay before the next cycle.
    pub fn next_delay(&self, outcome: &CycleOutcome) -> Duration {
        match outcome {
            CycleOutcome::Completed { .. } => {
                jittered_delay(self.config.interval, self.config.jitter_secs)
            }
            CycleOutcome::FetchFailed(_) => self.config.fetch_backoff,
            CycleOutcome::Failed(_) => self.config.error_backoff,
        }
    }

    /// Poll until `shutdown` resolves. Checked at every await boundary.
    pub async fn run(&mut self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);

        info!(
            url = %self.config.url,
            interval_secs = self.config.interval.as_secs_f64(),
            known = self.store.len(),
            "monitor started"
        );

        if self.config.announce_startup {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("monitor stopped");
                    return;
                }
                _ = self.announce_startup() => {}
            }
        }

        loop {
            let outcome = tokio::select! {
                _ = &mut shutdown => break,
                outcome = self.run_cycle() => outcome,
            };

            let delay = self.next_delay(&outcome);
            debug!(?delay, "sleeping");

            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("monitor stopped");
    }
}

/// `max(1s, interval + uniform(-jitter, +jitter))`.
///
/// Non-finite jitter counts as none and is capped at [`MAX_JITTER_SECS`]. A
/// sum too large for a `Duration` falls back to `interval`.
pub fn jittered_delay(interval: Duration, jitter_secs: f64) -> Duration {
    let jitter = if jitter_secs.is_finite() {
        jitter_secs.abs().min(MAX_JITTER_SECS)
    } else {
        0.0
    };
    let offset = if jitter > 0.0 {
        rand::thread_rng().gen_range(-jitter..=jitter)
    } else {
        0.0
    };
    let secs = (interval.as_secs_f64() + offset).max(MIN_DELAY.as_secs_f64());
    Duration::try_from_secs_f64(secs).unwrap_or(interval.max(MIN_DELAY))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    use alphawatch_shared::{AppConfig, DetectorConfig, TelegramConfig};
    use url::Url;
    use uuid::Uuid;

    const COOLCOIN: &str = "<html><body><div>CoolCoin Успейте принять участие \
        Требуемые баллы: 15 Сумма получения: 20 USDT</div></body></html>";
    const COMPLETED: &str = "<html><body><div>OldCoin Завершено Успейте принять участие \
        Требуемые баллы: 15 Сумма получения: 20 USDT</div></body></html>";

    struct ScriptedSource {
        pages: Mutex<VecDeque<Result<String>>>,
    }

    impl ScriptedSource {
        fn new(pages: Vec<Result<String>>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
            }
        }
    }

    impl PageSource for ScriptedSource {
        fn fetch(&self) -> impl Future<Output = Result<String>> + Send {
            let next = self
                .pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(String::new()));
            std::future::ready(next)
        }
    }

    #[derive(Clone, Default)]
    struct RecordingNotifier {
        sent: Arc<Mutex<Vec<OutboundMessage>>>,
    }

    impl RecordingNotifier {
        fn sent(&self) -> Vec<OutboundMessage> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn recipient_count(&self) -> usize {
            1
        }

        fn send(&self, message: &OutboundMessage) -> impl Future<Output = DispatchReport> + Send {
            self.sent.lock().unwrap().push(message.clone());
            std::future::ready(DispatchReport {
                delivered: vec!["1".into()],
                failed: Vec::new(),
            })
        }
    }

    fn temp_store_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("aw_monitor_test_{}", Uuid::now_v7()))
            .join("detected.json")
    }

    fn test_config(store_path: &Path) -> MonitorConfig {
        let mut config = MonitorConfig::from(&AppConfig::default());
        config.url = Url::parse("https://example.com/feed").unwrap();
        config.dispatch_pause = Duration::ZERO;
        config.detected_file = store_path.to_path_buf();
        config.announce_startup = false;
        config
    }

    fn monitor<S: PageSource, N: Notifier>(source: S, notifier: N, path: &Path) -> Monitor<S, N> {
        Monitor::new(
            source,
            notifier,
            Detector::new(&DetectorConfig::default()).unwrap(),
            DetectedStore::open(path),
            test_config(path),
            "Open",
        )
    }

    fn cleanup(path: &Path) {
        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[tokio::test]
    async fn new_announcement_is_dispatched_once() {
        let path = temp_store_path();
        let notifier = RecordingNotifier::default();
        let source = ScriptedSource::new(vec![Ok(COOLCOIN.into()), Ok(COOLCOIN.into())]);
        let mut monitor = monitor(source, notifier.clone(), &path);

        let first = monitor.run_cycle().await;
        assert!(matches!(first, CycleOutcome::Completed { dispatched: 1, skipped: 0, .. }));
        assert!(!monitor.store().is_new("CoolCoin_15_20_USDT"));

        let second = monitor.run_cycle().await;
        assert!(matches!(second, CycleOutcome::Completed { dispatched: 0, skipped: 1, .. }));

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].text.contains("CoolCoin"));
        assert_eq!(sent[0].button.as_ref().unwrap().url, "https://example.com/feed");
        cleanup(&path);
    }

    #[tokio::test]
    async fn dedup_survives_restart() {
        let path = temp_store_path();
        let notifier = RecordingNotifier::default();

        let mut first = monitor(
            ScriptedSource::new(vec![Ok(COOLCOIN.into())]),
            notifier.clone(),
            &path,
        );
        first.run_cycle().await;
        drop(first);

        let mut restarted = monitor(
            ScriptedSource::new(vec![Ok(COOLCOIN.into())]),
            notifier.clone(),
            &path,
        );
        restarted.run_cycle().await;

        assert_eq!(notifier.sent().len(), 1);
        cleanup(&path);
    }

    #[tokio::test]
    async fn completed_announcement_is_never_dispatched() {
        let path = temp_store_path();
        let notifier = RecordingNotifier::default();
        let mut monitor = monitor(
            ScriptedSource::new(vec![Ok(COMPLETED.into())]),
            notifier.clone(),
            &path,
        );

        let outcome = monitor.run_cycle().await;
        assert!(matches!(outcome, CycleOutcome::Completed { dispatched: 0, .. }));
        assert!(notifier.sent().is_empty());
        assert!(monitor.store().is_empty());
        cleanup(&path);
    }

    #[tokio::test]
    async fn fetch_failure_uses_fetch_backoff() {
        let path = temp_store_path();
        let notifier = RecordingNotifier::default();
        let source = ScriptedSource::new(vec![
            Err(AlphaWatchError::Network("HTTP 503".into())),
            Ok(COOLCOIN.into()),
        ]);
        let mut monitor = monitor(source, notifier.clone(), &path);

        let outcome = monitor.run_cycle().await;
        assert!(matches!(outcome, CycleOutcome::FetchFailed(_)));
        assert_eq!(monitor.next_delay(&outcome), Duration::from_secs(5));

        // The loop carries on with the next cycle.
        let outcome = monitor.run_cycle().await;
        assert!(matches!(outcome, CycleOutcome::Completed { dispatched: 1, .. }));
        cleanup(&path);
    }

    #[tokio::test]
    async fn http_503_from_live_fetcher() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let path = temp_store_path();
        let mut config = test_config(&path);
        config.url = Url::parse(&server.uri()).unwrap();
        let fetcher = PageFetcher::new(&config).unwrap();

        let mut monitor = Monitor::new(
            fetcher,
            RecordingNotifier::default(),
            Detector::new(&DetectorConfig::default()).unwrap(),
            DetectedStore::open(&path),
            config,
            "Open",
        );

        let outcome = monitor.run_cycle().await;
        match outcome {
            CycleOutcome::FetchFailed(e) => assert!(e.to_string().contains("503")),
            other => panic!("expected fetch failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn partial_delivery_still_marks_notified() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::body_partial_json(serde_json::json!({"chat_id": "1"})))
            .respond_with(wiremock::ResponseTemplate::new(500))
            .mount(&server)
            .await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::body_partial_json(serde_json::json!({"chat_id": "2"})))
            .respond_with(wiremock::ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let telegram = TelegramConfig {
            api_base: server.uri(),
            chat_ids: vec!["1".into(), "2".into()],
            ..TelegramConfig::default()
        };
        let notifier = TelegramNotifier::new(&telegram, "123:TEST").unwrap();

        let path = temp_store_path();
        let source = ScriptedSource::new(vec![Ok(COOLCOIN.into()), Ok(COOLCOIN.into())]);
        let mut monitor = monitor(source, notifier, &path);

        monitor.run_cycle().await;
        assert!(!monitor.store().is_new("CoolCoin_15_20_USDT"));

        let second = monitor.run_cycle().await;
        assert!(matches!(second, CycleOutcome::Completed { dispatched: 0, .. }));
        cleanup(&path);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let path = temp_store_path();
        let notifier = RecordingNotifier::default();
        let mut monitor = monitor(
            ScriptedSource::new(vec![Ok(COOLCOIN.into())]),
            notifier.clone(),
            &path,
        );

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            monitor
                .run(async {
                    let _ = rx.await;
                })
                .await;
            monitor
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        tx.send(()).unwrap();
        let monitor = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(notifier.sent().len(), 1);
        assert!(!monitor.store().is_new("CoolCoin_15_20_USDT"));
        cleanup(&path);
    }

    #[tokio::test]
    async fn startup_notice_goes_out_first() {
        let path = temp_store_path();
        let notifier = RecordingNotifier::default();
        let monitor = monitor(ScriptedSource::new(Vec::new()), notifier.clone(), &path);

        let report = monitor.announce_startup().await;
        assert!(report.all_delivered());
        assert!(notifier.sent()[0].text.contains("Бот запущен"));
    }

    #[test]
    fn jitter_stays_in_bounds() {
        for _ in 0..200 {
            let delay = jittered_delay(Duration::from_secs(5), 1.0);
            assert!(delay >= Duration::from_secs(4));
            assert!(delay <= Duration::from_secs(6));
        }
    }

    #[test]
    fn jitter_never_drops_below_floor() {
        for _ in 0..200 {
            assert!(jittered_delay(Duration::ZERO, 3.0) >= MIN_DELAY);
        }
        assert_eq!(jittered_delay(Duration::from_secs(2), 0.0), Duration::from_secs(2));
    }

    #[test]
    fn non_finite_jitter_is_ignored() {
        assert_eq!(jittered_delay(Duration::from_secs(5), f64::INFINITY), Duration::from_secs(5));
        assert_eq!(jittered_delay(Duration::from_secs(5), f64::NAN), Duration::from_secs(5));

        let delay = jittered_delay(Duration::from_secs(5), f64::MAX);
        assert!(delay >= MIN_DELAY);
    }

    #[test]
    fn huge_interval_does_not_overflow() {
        let interval = Duration::from_secs(u64::MAX);
        assert_eq!(jittered_delay(interval, 1.0), interval);
    }
}

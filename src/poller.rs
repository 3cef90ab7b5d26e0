//! Periodic release / exchange-rate poller.
//!
//! Threading model
//! ───────────────
//! One tokio task per running poller.  Cycles run inside the task's loop
//! body, so a tick that fires while a fetch is still in flight is skipped
//! (`MissedTickBehavior::Skip`) instead of starting a second, overlapping
//! cycle.  Results are published through a `watch` channel; the UI reads it
//! on its own timer.
//!
//! Each `start()` gets a fresh liveness flag.  `stop()` clears it and aborts
//! the task, and a cycle re-checks it before publishing, so nothing that
//! completes after teardown reaches the caller.

use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    error::{FetchError, PollerError},
    version::VersionOrdering,
};

// ── Source seam ──────────────────────────────────────────────────────────────

/// Where a poll cycle gets its two observations from.
pub trait StatusSource: Send + Sync + 'static {
    /// Tag of the most recent release.
    fn latest_version(&self) -> impl Future<Output = Result<String, FetchError>> + Send;
    /// Current HDD price in USD.
    fn exchange_rate(&self) -> impl Future<Output = Result<f64, FetchError>> + Send;
}

// ── Published state ──────────────────────────────────────────────────────────

/// Banner styling level; not an error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
}

/// The dashboard's update banner, derived from a `PollResult`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub severity: Severity,
    pub message:  &'static str,
    pub visible:  bool,
}

impl Banner {
    /// Only an actionable (warning) banner opens the releases page.
    pub fn click_opens_releases(&self) -> bool {
        self.severity == Severity::Warning
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PollResult {
    pub current_version:   String,
    pub latest_version:    Option<String>,
    pub update_available:  bool,
    pub exchange_rate_usd: Option<f64>,
}

impl PollResult {
    pub fn new(current_version: impl Into<String>) -> Self {
        Self {
            current_version:   current_version.into(),
            latest_version:    None,
            update_available:  false,
            exchange_rate_usd: None,
        }
    }

    pub fn banner(&self) -> Banner {
        match (&self.latest_version, self.update_available) {
            (None, _) => Banner { severity: Severity::Info, message: "Check..", visible: false },
            (Some(_), false) => Banner {
                severity: Severity::Info,
                message:  "No updates available",
                visible:  false,
            },
            (Some(_), true) => Banner {
                severity: Severity::Warning,
                message:  "Update available!",
                visible:  true,
            },
        }
    }

    pub fn rate_label(&self) -> String {
        match self.exchange_rate_usd {
            None => "Checking...".to_owned(),
            Some(usd) if usd > 0.0 => format!("HDD/USD: ${usd:.2}"),
            // The ticker answered but had no usable price.
            Some(_) => "HDD/USD: ...".to_owned(),
        }
    }

    /// Version outcome: failures keep whatever was shown before.
    fn apply_version(&mut self, outcome: Result<String, FetchError>, ordering: VersionOrdering) {
        match outcome {
            Ok(tag) => {
                self.update_available = ordering.is_newer(&self.current_version, &tag);
                debug!(
                    current = %self.current_version,
                    latest = %tag,
                    update_available = self.update_available,
                    "release check"
                );
                self.latest_version = Some(tag);
            }
            Err(e) => warn!("release check failed, keeping previous state: {e}"),
        }
    }

    /// Rate outcome: failures fall back to the "Checking..." placeholder.
    fn apply_rate(&mut self, outcome: Result<f64, FetchError>) {
        match outcome {
            Ok(usd) => {
                debug!(usd, "exchange rate");
                self.exchange_rate_usd = Some(usd);
            }
            Err(e) => {
                warn!("exchange rate check failed: {e}");
                self.exchange_rate_usd = None;
            }
        }
    }
}

// ── StatusPoller ─────────────────────────────────────────────────────────────

pub struct StatusPoller<S> {
    source:   Arc<S>,
    ordering: VersionOrdering,
    state_tx: watch::Sender<PollResult>,
    live:     Arc<AtomicBool>,
    task:     Option<JoinHandle<()>>,
}

impl<S: StatusSource> StatusPoller<S> {
    pub fn new(source: S, current_version: impl Into<String>, ordering: VersionOrdering) -> Self {
        let (state_tx, _) = watch::channel(PollResult::new(current_version));
        Self {
            source: Arc::new(source),
            ordering,
            state_tx,
            live: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    /// Begin polling: one cycle now, then every `interval`.
    ///
    /// Must be called from within a tokio runtime.  Restarts the schedule if
    /// already running.
    pub fn start(&mut self, interval: Duration) -> Result<(), PollerError> {
        if interval.is_zero() {
            return Err(PollerError::ZeroInterval);
        }
        self.stop();

        let live = Arc::new(AtomicBool::new(true));
        self.live = Arc::clone(&live);

        let source   = Arc::clone(&self.source);
        let tx       = self.state_tx.clone();
        let ordering = self.ordering;

        info!(?interval, "status poller started");
        self.task = Some(tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if !live.load(Ordering::Acquire) {
                    break;
                }
                run_cycle(source.as_ref(), ordering, &tx, &live).await;
            }
        }));
        Ok(())
    }

    /// Cancel the timer.  Idempotent; a no-op if never started.
    pub fn stop(&mut self) {
        self.live.store(false, Ordering::Release);
        if let Some(task) = self.task.take() {
            task.abort();
            info!("status poller stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some() && self.live.load(Ordering::Acquire)
    }

    pub fn subscribe(&self) -> watch::Receiver<PollResult> {
        self.state_tx.subscribe()
    }

    pub fn snapshot(&self) -> PollResult {
        self.state_tx.borrow().clone()
    }
}

impl<S> Drop for StatusPoller<S> {
    fn drop(&mut self) {
        self.live.store(false, Ordering::Release);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// One fetch-compare-publish cycle.  Both fetches run concurrently; the
/// result is dropped if the poller was stopped while they were in flight.
async fn run_cycle<S: StatusSource>(
    source: &S,
    ordering: VersionOrdering,
    tx: &watch::Sender<PollResult>,
    live: &AtomicBool,
) {
    let (version, rate) = tokio::join!(source.latest_version(), source.exchange_rate());

    if !live.load(Ordering::Acquire) {
        debug!("poller stopped mid-cycle, discarding results");
        return;
    }

    tx.send_modify(|state| {
        state.apply_version(version, ordering);
        state.apply_rate(rate);
    });
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{atomic::AtomicUsize, Mutex},
    };

    use super::*;

    const FIFTEEN_MIN: Duration = Duration::from_millis(900_000);

    fn outage(field: &'static str) -> FetchError {
        FetchError::Status { url: format!("http://test/{field}"), status: 503 }
    }

    /// Scripted source: pops one outcome per call, repeating the last
    /// `Err` once the script runs out.
    #[derive(Default)]
    struct FakeSource {
        versions:      Mutex<VecDeque<Result<String, FetchError>>>,
        rates:         Mutex<VecDeque<Result<f64, FetchError>>>,
        version_calls: AtomicUsize,
        rate_calls:    AtomicUsize,
    }

    impl FakeSource {
        fn scripted(versions: Vec<Result<&str, ()>>, rates: Vec<Result<f64, ()>>) -> Self {
            Self {
                versions: Mutex::new(
                    versions
                        .into_iter()
                        .map(|v| v.map(str::to_owned).map_err(|_| outage("release")))
                        .collect(),
                ),
                rates: Mutex::new(
                    rates.into_iter().map(|r| r.map_err(|_| outage("price"))).collect(),
                ),
                ..Self::default()
            }
        }
    }

    impl StatusSource for Arc<FakeSource> {
        async fn latest_version(&self) -> Result<String, FetchError> {
            self.version_calls.fetch_add(1, Ordering::SeqCst);
            let next = self.versions.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Err(outage("release")))
        }

        async fn exchange_rate(&self) -> Result<f64, FetchError> {
            self.rate_calls.fetch_add(1, Ordering::SeqCst);
            let next = self.rates.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Err(outage("price")))
        }
    }

    /// Never resolves until `release` is notified.
    struct GatedSource {
        gate: Arc<tokio::sync::Notify>,
    }

    impl StatusSource for GatedSource {
        async fn latest_version(&self) -> Result<String, FetchError> {
            self.gate.notified().await;
            Ok("9.9.9".into())
        }

        async fn exchange_rate(&self) -> Result<f64, FetchError> {
            Ok(1.0)
        }
    }

    // ── Derivation ───────────────────────────────────────────────────────────

    #[test]
    fn older_or_equal_remote_is_up_to_date() {
        for (current, remote) in [("1.2.0", "1.1.9"), ("1.2.0", "1.2.0"), ("2.0", "10.0")] {
            let mut s = PollResult::new(current);
            s.apply_version(Ok(remote.into()), VersionOrdering::Lexicographic);
            assert!(!s.update_available, "{current} vs {remote}");
            assert_eq!(s.banner().severity, Severity::Info);
            assert!(!s.banner().visible);
        }
    }

    #[test]
    fn newer_remote_raises_warning_banner() {
        let mut s = PollResult::new("1.2.0");
        s.apply_version(Ok("1.3.0".into()), VersionOrdering::Lexicographic);
        assert!(s.update_available);
        let banner = s.banner();
        assert_eq!(banner.severity, Severity::Warning);
        assert_eq!(banner.message, "Update available!");
        assert!(banner.visible);
        assert!(banner.click_opens_releases());
    }

    #[test]
    fn update_flag_is_recomputed_each_poll() {
        let mut s = PollResult::new("1.2.0");
        s.apply_version(Ok("1.3.0".into()), VersionOrdering::Lexicographic);
        assert!(s.update_available);
        s.apply_version(Ok("1.1.0".into()), VersionOrdering::Lexicographic);
        assert!(!s.update_available);
        assert_eq!(s.banner().message, "No updates available");
    }

    #[test]
    fn initial_banner_is_hidden_checking() {
        let s = PollResult::new("1.2.0");
        let banner = s.banner();
        assert_eq!(banner.message, "Check..");
        assert!(!banner.visible);
        assert!(!banner.click_opens_releases());
        assert_eq!(s.rate_label(), "Checking...");
    }

    #[test]
    fn version_failure_retains_previous_state() {
        let mut s = PollResult::new("1.2.0");
        s.apply_version(Ok("1.3.0".into()), VersionOrdering::Lexicographic);
        s.apply_version(Err(outage("release")), VersionOrdering::Lexicographic);
        assert_eq!(s.latest_version.as_deref(), Some("1.3.0"));
        assert!(s.update_available);
    }

    #[test]
    fn rate_failures_reset_to_placeholder() {
        let mut s = PollResult::new("1.2.0");
        s.apply_rate(Ok(0.0312));
        assert_eq!(s.rate_label(), "HDD/USD: $0.03");
        s.apply_rate(Err(outage("price")));
        s.apply_rate(Err(outage("price")));
        assert_eq!(s.exchange_rate_usd, None);
        assert_eq!(s.rate_label(), "Checking...");
    }

    #[test]
    fn zero_price_shows_unpriced_label() {
        let mut s = PollResult::new("1.2.0");
        s.apply_rate(Ok(0.0));
        assert_eq!(s.rate_label(), "HDD/USD: ...");
    }

    // ── Scheduling ───────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn zero_interval_is_rejected() {
        let mut poller = StatusPoller::new(
            Arc::new(FakeSource::default()),
            "1.2.0",
            VersionOrdering::Lexicographic,
        );
        assert_eq!(poller.start(Duration::ZERO), Err(PollerError::ZeroInterval));
        assert!(!poller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn first_cycle_is_immediate_then_every_interval() {
        let source = Arc::new(FakeSource::scripted(
            vec![Ok("1.1.9"), Ok("1.3.0")],
            vec![Ok(0.05), Ok(0.06)],
        ));
        let mut poller =
            StatusPoller::new(Arc::clone(&source), "1.2.0", VersionOrdering::Lexicographic);
        poller.start(FIFTEEN_MIN).unwrap();

        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(source.version_calls.load(Ordering::SeqCst), 1);
        let first = poller.snapshot();
        assert_eq!(first.latest_version.as_deref(), Some("1.1.9"));
        assert!(!first.update_available);

        time::sleep(FIFTEEN_MIN).await;
        assert_eq!(source.version_calls.load(Ordering::SeqCst), 2);
        assert_eq!(source.rate_calls.load(Ordering::SeqCst), 2);
        let second = poller.snapshot();
        assert!(second.update_available);
        assert_eq!(second.banner().severity, Severity::Warning);
        assert_eq!(second.rate_label(), "HDD/USD: $0.06");

        poller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn failures_do_not_end_the_loop() {
        let source = Arc::new(FakeSource::scripted(
            vec![Ok("1.3.0"), Err(()), Err(())],
            vec![Ok(0.05), Err(()), Err(())],
        ));
        let mut poller =
            StatusPoller::new(Arc::clone(&source), "1.2.0", VersionOrdering::Lexicographic);
        poller.start(FIFTEEN_MIN).unwrap();

        time::sleep(Duration::from_millis(10)).await;
        time::sleep(FIFTEEN_MIN * 2).await;

        assert_eq!(source.version_calls.load(Ordering::SeqCst), 3);
        let state = poller.snapshot();
        assert!(state.update_available, "version result retained");
        assert_eq!(state.rate_label(), "Checking...", "rate reset");
        assert!(poller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_before_first_tick_issues_no_fetches() {
        let source = Arc::new(FakeSource::default());
        let mut poller =
            StatusPoller::new(Arc::clone(&source), "1.2.0", VersionOrdering::Lexicographic);
        poller.start(FIFTEEN_MIN).unwrap();
        poller.stop();
        poller.stop();

        time::sleep(FIFTEEN_MIN * 3).await;
        assert_eq!(source.version_calls.load(Ordering::SeqCst), 0);
        assert_eq!(source.rate_calls.load(Ordering::SeqCst), 0);
        assert!(!poller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_without_start_is_noop() {
        let mut poller = StatusPoller::new(
            Arc::new(FakeSource::default()),
            "1.2.0",
            VersionOrdering::Lexicographic,
        );
        poller.stop();
        assert!(!poller.is_running());
        assert_eq!(poller.snapshot(), PollResult::new("1.2.0"));
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_cycle_after_stop_is_discarded() {
        let gate = Arc::new(tokio::sync::Notify::new());
        let mut poller = StatusPoller::new(
            GatedSource { gate: Arc::clone(&gate) },
            "1.2.0",
            VersionOrdering::Lexicographic,
        );
        let rx = poller.subscribe();
        poller.start(FIFTEEN_MIN).unwrap();

        // Let the first cycle reach its await point, then tear down.
        time::sleep(Duration::from_millis(10)).await;
        poller.stop();
        gate.notify_one();
        time::sleep(Duration::from_millis(10)).await;

        assert!(!rx.has_changed().unwrap());
        assert_eq!(poller.snapshot().latest_version, None);
    }

    #[tokio::test]
    async fn cycle_checks_liveness_before_publishing() {
        let source = Arc::new(FakeSource::scripted(vec![Ok("1.3.0")], vec![Ok(0.05)]));
        let (tx, mut rx) = watch::channel(PollResult::new("1.2.0"));
        let live = AtomicBool::new(false);

        run_cycle(&source, VersionOrdering::Lexicographic, &tx, &live).await;

        assert_eq!(source.version_calls.load(Ordering::SeqCst), 1);
        assert!(!rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().latest_version, None);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_runs_an_immediate_cycle() {
        let source = Arc::new(FakeSource::scripted(
            vec![Ok("1.1.0"), Ok("1.3.0")],
            vec![Ok(0.05), Ok(0.05)],
        ));
        let mut poller =
            StatusPoller::new(Arc::clone(&source), "1.2.0", VersionOrdering::Lexicographic);
        poller.start(FIFTEEN_MIN).unwrap();
        time::sleep(Duration::from_millis(10)).await;
        assert!(!poller.snapshot().update_available);

        poller.start(FIFTEEN_MIN).unwrap();
        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(source.version_calls.load(Ordering::SeqCst), 2);
        assert!(poller.snapshot().update_available);
    }

    #[tokio::test(start_paused = true)]
    async fn end_to_end_version_transition() {
        let source = Arc::new(FakeSource::scripted(
            vec![Ok("1.1.9"), Ok("1.3.0")],
            vec![Ok(0.05), Ok(0.05)],
        ));
        let mut poller =
            StatusPoller::new(Arc::clone(&source), "1.2.0", VersionOrdering::Lexicographic);
        let mut rx = poller.subscribe();
        poller.start(FIFTEEN_MIN).unwrap();

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().banner().message, "No updates available");

        rx.changed().await.unwrap();
        let state = rx.borrow_and_update().clone();
        assert!(state.update_available);
        assert_eq!(state.banner().message, "Update available!");
    }
}

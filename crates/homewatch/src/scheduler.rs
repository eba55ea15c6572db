//! Periodic screenshot capture.
//!
//! The scheduler waits one full interval, captures, and repeats. The wait is
//! split into short slices that each watch the stop signal, so shutdown is
//! observed within one slice. Capture runs on the blocking pool because
//! platform backends shell out or call synchronous APIs.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::capture::ScreenCapture;
use crate::error::{Error, Result};
use crate::lifecycle::StopSignal;
use crate::store::DailyLogStore;

/// Longest uninterrupted wait between stop checks.
pub const DEFAULT_SLICE: Duration = Duration::from_secs(5);

/// Pause after a failed capture before trying again.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(60);

/// Fires screen captures at a fixed interval.
#[derive(Debug, Clone)]
pub struct CaptureScheduler {
    interval_minutes: f64,
    slice: Duration,
    backoff: Duration,
}

impl CaptureScheduler {
    /// Create a scheduler firing every `interval_minutes` (fractions allowed).
    #[must_use]
    pub fn new(interval_minutes: f64) -> Self {
        Self {
            interval_minutes,
            slice: DEFAULT_SLICE,
            backoff: DEFAULT_BACKOFF,
        }
    }

    /// Set the stop-check slice.
    #[must_use]
    pub fn with_slice(mut self, slice: Duration) -> Self {
        self.slice = slice.max(Duration::from_millis(1));
        self
    }

    /// Set the back-off after a failed capture.
    #[must_use]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// The configured interval.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInterval`] if the interval is zero, negative,
    /// or not a finite number.
    pub fn interval(&self) -> Result<Duration> {
        let minutes = self.interval_minutes;
        if minutes.is_nan() || minutes <= 0.0 {
            return Err(Error::InvalidInterval { minutes });
        }
        let interval = Duration::try_from_secs_f64(minutes * 60.0)
            .map_err(|_| Error::InvalidInterval { minutes })?;
        if interval.is_zero() {
            return Err(Error::InvalidInterval { minutes });
        }
        Ok(interval)
    }

    /// Spawn the capture loop.
    ///
    /// Nothing is spawned when the interval is invalid.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInterval`] as described in
    /// [`CaptureScheduler::interval`].
    pub fn spawn(
        self,
        capture: Arc<dyn ScreenCapture>,
        store: Arc<DailyLogStore>,
        stop: StopSignal,
    ) -> Result<JoinHandle<()>> {
        let interval = self.interval()?;
        info!(
            backend = capture.name(),
            interval_secs = interval.as_secs_f64(),
            "Screenshot scheduler started"
        );
        Ok(tokio::spawn(self.run(interval, capture, store, stop)))
    }

    async fn run(
        self,
        interval: Duration,
        capture: Arc<dyn ScreenCapture>,
        store: Arc<DailyLogStore>,
        stop: StopSignal,
    ) {
        loop {
            if self.wait(interval, &stop).await {
                break;
            }

            if !tick(&capture, &store).await && stop.sleep(self.backoff).await {
                break;
            }
        }
        debug!("Screenshot scheduler stopped");
    }

    /// Wait `total` in slices. Returns `true` if stopped.
    async fn wait(&self, total: Duration, stop: &StopSignal) -> bool {
        let mut remaining = total;
        while !remaining.is_zero() {
            let step = remaining.min(self.slice);
            if stop.sleep(step).await {
                return true;
            }
            remaining -= step;
        }
        stop.is_stopped()
    }
}

/// Capture once and store the result. Returns `false` if the backend
/// failed and the loop should back off.
async fn tick(capture: &Arc<dyn ScreenCapture>, store: &Arc<DailyLogStore>) -> bool {
    let backend = Arc::clone(capture);
    let result = tokio::task::spawn_blocking(move || backend.capture()).await;

    match result {
        Ok(Ok(Some(bytes))) if !bytes.is_empty() => {
            save(store, bytes).await;
            true
        }
        Ok(Ok(_)) => {
            warn!(backend = capture.name(), "Screenshot capture produced no data");
            store.log_error("Screenshot capture returned no image data.", false);
            true
        }
        Ok(Err(e)) => {
            warn!(backend = capture.name(), error = %e, "Screenshot capture failed");
            store.log_error(&format!("Screenshot capture failed: {e}"), false);
            false
        }
        Err(e) => {
            warn!(backend = capture.name(), error = %e, "Screenshot capture panicked");
            store.log_error(&format!("Screenshot capture task failed: {e}"), true);
            false
        }
    }
}

/// Encrypt and write on the blocking pool.
async fn save(store: &Arc<DailyLogStore>, bytes: Vec<u8>) {
    let writer = Arc::clone(store);
    match tokio::task::spawn_blocking(move || writer.save_screenshot(&bytes)).await {
        Ok(Ok(path)) => debug!(path = %path.display(), "Screenshot saved"),
        Ok(Err(e)) => {
            warn!(error = %e, "Screenshot save failed");
            store.log_error(&format!("Failed to save screenshot: {e}"), false);
        }
        Err(e) => {
            warn!(error = %e, "Screenshot save task failed");
            store.log_error(&format!("Screenshot save task failed: {e}"), true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::{KeyStore, KEY_LEN};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Plays back scripted outcomes, then keeps returning the last one.
    struct Scripted {
        calls: AtomicUsize,
        script: Mutex<Vec<Outcome>>,
    }

    #[derive(Clone)]
    enum Outcome {
        Image,
        Empty,
        Fail,
        Panic,
    }

    impl Scripted {
        fn new(script: Vec<Outcome>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                script: Mutex::new(script),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ScreenCapture for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn capture(&self) -> Result<Option<Vec<u8>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = {
                let mut script = self.script.lock().unwrap();
                if script.len() > 1 {
                    script.remove(0)
                } else {
                    script[0].clone()
                }
            };
            match next {
                Outcome::Image => Ok(Some(b"png".to_vec())),
                Outcome::Empty => Ok(None),
                Outcome::Fail => Err(Error::capture("display unavailable")),
                Outcome::Panic => panic!("backend crashed"),
            }
        }
    }

    fn store(dir: &tempfile::TempDir) -> Arc<DailyLogStore> {
        Arc::new(DailyLogStore::new(
            dir.path().join("data"),
            Arc::new(KeyStore::from_bytes(vec![2u8; KEY_LEN])),
            dir.path().join("error.log"),
        ))
    }

    fn fast(minutes: f64) -> CaptureScheduler {
        CaptureScheduler::new(minutes)
            .with_slice(Duration::from_millis(10))
            .with_backoff(Duration::from_millis(10))
    }

    fn error_log(dir: &tempfile::TempDir) -> String {
        std::fs::read_to_string(dir.path().join("error.log")).unwrap_or_default()
    }

    async fn stop_and_join(stop: &StopSignal, handle: JoinHandle<()>) {
        stop.stop();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("scheduler stopped in time")
            .unwrap();
    }

    #[test]
    fn test_interval_validation() {
        assert_eq!(
            CaptureScheduler::new(0.5).interval().unwrap(),
            Duration::from_secs(30)
        );
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = CaptureScheduler::new(bad).interval().unwrap_err();
            assert!(err.is_configuration_invalid(), "{bad}");
        }
    }

    #[tokio::test]
    async fn test_invalid_interval_never_fires() {
        let dir = tempfile::tempdir().unwrap();
        let capture = Scripted::new(vec![Outcome::Image]);

        let result = CaptureScheduler::new(0.0).spawn(
            capture.clone(),
            store(&dir),
            StopSignal::new(),
        );
        assert!(matches!(result, Err(Error::InvalidInterval { .. })));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(capture.calls(), 0);
        assert!(!dir.path().join("data").exists());
    }

    #[tokio::test]
    async fn test_fires_repeatedly_and_saves() {
        let dir = tempfile::tempdir().unwrap();
        let capture = Scripted::new(vec![Outcome::Image]);
        let stop = StopSignal::new();

        // 0.0005 minutes = 30ms
        let handle = fast(0.0005)
            .spawn(capture.clone(), store(&dir), stop.clone())
            .unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        stop_and_join(&stop, handle).await;

        assert!(capture.calls() >= 2);
        let partitions = crate::store::list_partitions(&dir.path().join("data")).unwrap();
        assert_eq!(partitions.len(), 1);
        assert!(error_log(&dir).is_empty());
    }

    #[tokio::test]
    async fn test_waits_a_full_interval_before_first_capture() {
        let dir = tempfile::tempdir().unwrap();
        let capture = Scripted::new(vec![Outcome::Image]);
        let stop = StopSignal::new();

        let handle = fast(1.0)
            .spawn(capture.clone(), store(&dir), stop.clone())
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        stop_and_join(&stop, handle).await;

        assert_eq!(capture.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_capture_is_logged_and_loop_continues() {
        let dir = tempfile::tempdir().unwrap();
        let capture = Scripted::new(vec![Outcome::Empty, Outcome::Image]);
        let stop = StopSignal::new();

        let handle = fast(0.0005)
            .spawn(capture.clone(), store(&dir), stop.clone())
            .unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        stop_and_join(&stop, handle).await;

        assert!(capture.calls() >= 2);
        let log = error_log(&dir);
        assert_eq!(log.matches("returned no image data").count(), 1);
        assert!(!log.contains("CRITICAL"));
    }

    #[tokio::test]
    async fn test_failures_and_panics_do_not_kill_loop() {
        let dir = tempfile::tempdir().unwrap();
        let capture = Scripted::new(vec![Outcome::Fail, Outcome::Panic, Outcome::Image]);
        let stop = StopSignal::new();

        let handle = fast(0.0005)
            .spawn(capture.clone(), store(&dir), stop.clone())
            .unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        stop_and_join(&stop, handle).await;

        assert!(capture.calls() >= 3);
        let log = error_log(&dir);
        assert!(log.contains("Screenshot capture failed"));
        assert!(log.contains("CRITICAL: Screenshot capture task failed"));
        assert!(dir.path().join("data").exists());
    }

    #[tokio::test]
    async fn test_save_failure_is_logged_and_loop_continues() {
        let dir = tempfile::tempdir().unwrap();
        // A file where the partition tree should be.
        std::fs::write(dir.path().join("data"), b"").unwrap();
        let capture = Scripted::new(vec![Outcome::Image]);
        let stop = StopSignal::new();

        let handle = fast(0.0005)
            .spawn(capture.clone(), store(&dir), stop.clone())
            .unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        stop_and_join(&stop, handle).await;

        assert!(capture.calls() >= 2);
        let log = error_log(&dir);
        assert!(log.contains("Failed to save screenshot"));
        assert!(!log.contains("CRITICAL"));
    }

    #[tokio::test]
    async fn test_backoff_is_cancellable() {
        let dir = tempfile::tempdir().unwrap();
        let capture = Scripted::new(vec![Outcome::Fail]);
        let stop = StopSignal::new();

        let handle = fast(0.0005)
            .with_backoff(Duration::from_secs(600))
            .spawn(capture.clone(), store(&dir), stop.clone())
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(capture.calls(), 1);

        stop_and_join(&stop, handle).await;
    }
}

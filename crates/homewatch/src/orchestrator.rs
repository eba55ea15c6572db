//! Capture orchestration.
//!
//! [`CaptureOrchestrator`] owns both capture streams for one monitoring
//! session:
//!
//! ```text
//! KeySource ─mpsc─▶ segmentation task ─▶ FilterPolicy ─▶ DailyLogStore::log_keyword
//! CaptureScheduler ─▶ ScreenCapture ─▶ DailyLogStore::save_screenshot
//! ```
//!
//! It is the only component that writes lifecycle events and capture
//! failures to the event log. The session counts as running while at least
//! one stream is up.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::capture::{
    ActiveWindow, KeyEvent, KeySource, KeywordEntry, ScreenCapture, UnknownWindow,
};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::filter::{FilterDecision, FilterPolicy};
use crate::lifecycle::{JoinOutcome, StopSignal, TaskKind, TaskSet};
use crate::scheduler::CaptureScheduler;
use crate::segmenter::WordSegmenter;
use crate::store::DailyLogStore;

/// Capacity of the key event channel.
pub const KEY_CHANNEL_CAPACITY: usize = 1024;

/// Default time allowed for tasks to finish after a stop.
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Session settings derived from [`Config`].
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Run the keystroke stream.
    pub keystrokes_enabled: bool,
    /// Run the screenshot stream.
    pub screenshots_enabled: bool,
    /// Inactivity before a partial word is flushed.
    pub buffer_timeout: Duration,
    /// Longest buffered word before a forced flush.
    pub max_word_length: usize,
    /// Screenshot scheduler.
    pub scheduler: CaptureScheduler,
    /// Time allowed for tasks to finish after a stop.
    pub join_timeout: Duration,
}

impl OrchestratorSettings {
    /// Settings for `config`.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            keystrokes_enabled: config.capture.keystrokes_enabled,
            screenshots_enabled: config.capture.screenshots_enabled,
            buffer_timeout: config.buffer_timeout(),
            max_word_length: config.capture.max_word_length,
            scheduler: CaptureScheduler::new(config.capture.screenshot_interval_minutes),
            join_timeout: DEFAULT_JOIN_TIMEOUT,
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Starts and stops the keyword and screenshot streams.
pub struct CaptureOrchestrator {
    store: Arc<DailyLogStore>,
    filter: Arc<FilterPolicy>,
    window: Arc<dyn ActiveWindow>,
    key_source: Option<Box<dyn KeySource>>,
    screen: Option<Arc<dyn ScreenCapture>>,
    settings: OrchestratorSettings,
    stop: StopSignal,
    tasks: TaskSet,
    running: bool,
}

impl std::fmt::Debug for CaptureOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureOrchestrator")
            .field("store", &self.store)
            .field("key_source", &self.key_source.as_ref().map(|s| s.name()))
            .field("screen", &self.screen.as_ref().map(|s| s.name()))
            .field("settings", &self.settings)
            .field("tasks", &self.tasks)
            .field("running", &self.running)
            .finish_non_exhaustive()
    }
}

impl CaptureOrchestrator {
    /// Create an orchestrator with no capture backends attached.
    #[must_use]
    pub fn new(
        store: Arc<DailyLogStore>,
        filter: FilterPolicy,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            store,
            filter: Arc::new(filter),
            window: Arc::new(UnknownWindow),
            key_source: None,
            screen: None,
            settings,
            stop: StopSignal::new(),
            tasks: TaskSet::new(),
            running: false,
        }
    }

    /// Attach the keystroke source.
    #[must_use]
    pub fn with_key_source(mut self, source: Box<dyn KeySource>) -> Self {
        self.key_source = Some(source);
        self
    }

    /// Attach the foreground window resolver.
    #[must_use]
    pub fn with_active_window(mut self, window: Arc<dyn ActiveWindow>) -> Self {
        self.window = window;
        self
    }

    /// Attach the screen capture backend.
    #[must_use]
    pub fn with_screen_capture(mut self, screen: Arc<dyn ScreenCapture>) -> Self {
        self.screen = Some(screen);
        self
    }

    /// The store records are written to.
    #[must_use]
    pub fn store(&self) -> &Arc<DailyLogStore> {
        &self.store
    }

    /// Whether a session is running with at least one stream still up.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running && self.tasks.any_running()
    }

    /// Whether the stream of `kind` is up.
    #[must_use]
    pub fn is_active(&self, kind: TaskKind) -> bool {
        self.tasks.is_running(kind)
    }

    /// Start every enabled stream that can run.
    ///
    /// A stream that cannot start is reported to the event log and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoCaptureActive`] if no stream started.
    pub async fn start(&mut self) -> Result<()> {
        if self.running {
            warn!("Monitoring already running");
            return Ok(());
        }

        self.stop = StopSignal::new();

        if self.settings.keystrokes_enabled {
            self.start_keywords().await;
        } else {
            info!("Keystroke capture disabled by configuration");
        }

        if self.settings.screenshots_enabled {
            self.start_screenshots();
        } else {
            info!("Screenshot capture disabled by configuration");
        }

        if self.tasks.count() == 0 {
            self.store
                .log_error("No capture subsystem could be started.", true);
            return Err(Error::NoCaptureActive);
        }

        self.running = true;
        info!(tasks = self.tasks.count(), "Monitoring started");
        self.store.log_error("Monitoring services started.", false);
        Ok(())
    }

    async fn start_keywords(&mut self) {
        let Some(source) = self.key_source.as_mut() else {
            warn!("No keystroke source for this platform");
            self.store.log_error(
                "Keystroke capture is not supported on this platform. Keyword logging disabled.",
                false,
            );
            return;
        };

        let (tx, rx) = mpsc::channel(KEY_CHANNEL_CAPACITY);
        if let Err(e) = source.start(tx).await {
            warn!(source = source.name(), error = %e, "Keystroke source failed to start");
            self.store
                .log_error(&format!("Failed to start keystroke capture: {e}"), true);
            return;
        }
        debug!(source = source.name(), "Keystroke source started");

        let segmenter = WordSegmenter::new(
            self.settings.buffer_timeout,
            self.settings.max_word_length,
            Instant::now(),
        );
        let pipeline = KeywordPipeline {
            filter: Arc::clone(&self.filter),
            window: Arc::clone(&self.window),
            store: Arc::clone(&self.store),
        };
        let handle = tokio::spawn(segment_keys(rx, segmenter, pipeline, self.stop.clone()));
        self.tasks.add(TaskKind::Keywords, handle);
    }

    fn start_screenshots(&mut self) {
        let Some(screen) = self.screen.clone() else {
            let e = Error::UnsupportedPlatform {
                source_name: "screenshots",
                platform: crate::platform::platform_name(),
            };
            warn!(error = %e, "No screenshot backend");
            self.store.log_error(
                &format!("Configuration warning: {e}. Screenshots disabled."),
                false,
            );
            return;
        };

        match self.settings.scheduler.clone().spawn(
            screen,
            Arc::clone(&self.store),
            self.stop.clone(),
        ) {
            Ok(handle) => self.tasks.add(TaskKind::Screenshots, handle),
            Err(e) => {
                warn!(error = %e, "Screenshot scheduler not started");
                self.store.log_error(
                    &format!("Configuration warning: {e}. Screenshots disabled."),
                    false,
                );
            }
        }
    }

    /// Stop every stream and wait for it to finish.
    ///
    /// Any partially typed word is flushed once. A task that does not finish
    /// within the join timeout is reported and abandoned.
    ///
    /// # Errors
    ///
    /// Currently always succeeds; failures are written to the event log.
    pub async fn stop(&mut self) -> Result<()> {
        if !self.running {
            debug!("Monitoring not running");
            return Ok(());
        }

        self.stop.stop();

        if let Some(source) = self.key_source.as_mut() {
            if source.is_running() {
                if let Err(e) = source.stop() {
                    warn!(source = source.name(), error = %e, "Keystroke source failed to stop");
                    self.store
                        .log_error(&format!("Failed to stop keystroke capture: {e}"), false);
                }
            }
        }

        for (kind, outcome) in self.tasks.join_all(self.settings.join_timeout).await {
            match outcome {
                JoinOutcome::Finished => {}
                JoinOutcome::Failed(e) => self
                    .store
                    .log_error(&format!("The {kind} task ended abnormally: {e}"), true),
                JoinOutcome::TimedOut => self
                    .store
                    .log_error(&format!("The {kind} task did not stop in time."), false),
            }
        }

        self.running = false;
        info!("Monitoring stopped");
        self.store.log_error("Monitoring services stopped.", false);
        Ok(())
    }
}

impl Drop for CaptureOrchestrator {
    fn drop(&mut self) {
        self.stop.stop();
    }
}

/// Everything a completed word passes through on its way to disk.
#[derive(Clone)]
struct KeywordPipeline {
    filter: Arc<FilterPolicy>,
    window: Arc<dyn ActiveWindow>,
    store: Arc<DailyLogStore>,
}

impl KeywordPipeline {
    /// Record `word` on the blocking pool. Awaited before the next key is
    /// read, so lines keep their typing order.
    async fn record(&self, word: String) {
        let pipeline = self.clone();
        let task = tokio::task::spawn_blocking(move || pipeline.record_blocking(word));
        if let Err(e) = task.await {
            warn!(error = %e, "Keyword task failed");
            self.store
                .log_error(&format!("Keyword logging task failed: {e}"), true);
        }
    }

    /// Window lookup, filter, encrypt and append.
    fn record_blocking(&self, word: String) {
        let window = self.window.resolve();

        match self.filter.decide(&word, &window.process_name) {
            FilterDecision::Log => {
                let entry = KeywordEntry::from_window(self.store.now(), word, window);
                if let Err(e) = self.store.log_keyword(&entry) {
                    warn!(error = %e, "Keyword write failed");
                    self.store
                        .log_error(&format!("Failed to write keyword log: {e}"), false);
                }
            }
            decision => trace!(?decision, "Word dropped"),
        }
    }
}

/// Segmentation loop. Owns the buffer; the watchdog is a timer arm of the
/// same `select!`, so no lock is needed.
async fn segment_keys(
    mut rx: mpsc::Receiver<KeyEvent>,
    mut segmenter: WordSegmenter,
    pipeline: KeywordPipeline,
    stop: StopSignal,
) {
    let mut watchdog = tokio::time::interval(segmenter.watchdog_period());
    watchdog.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = stop.stopped() => break,
            event = rx.recv() => match event {
                Some(key) => {
                    if let Some(word) = segmenter.on_key(key, Instant::now()) {
                        pipeline.record(word).await;
                    }
                }
                None => {
                    if !stop.is_stopped() {
                        warn!("Key channel closed while monitoring");
                        pipeline.store.log_error(
                            "Keystroke source ended unexpectedly. Keyword logging stopped.",
                            false,
                        );
                    }
                    break;
                }
            },
            _ = watchdog.tick() => {
                if let Some(word) = segmenter.flush_if_idle(Instant::now()) {
                    pipeline.record(word).await;
                }
            }
        }
    }

    // Keys already queued were typed before the stop.
    while let Ok(key) = rx.try_recv() {
        if let Some(word) = segmenter.on_key(key, Instant::now()) {
            pipeline.record(word).await;
        }
    }
    if let Some(word) = segmenter.finish() {
        pipeline.record(word).await;
    }
    debug!("Segmentation task stopped");
}

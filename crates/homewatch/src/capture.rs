//! Core capture types for homewatch.
//!
//! This module defines the records that flow from the capture side into the
//! store, and the collaborator traits that platform code implements: a
//! source of key presses, a resolver for the foreground window, and a
//! screen grabber.

use chrono::{DateTime, Local, Timelike};
use tokio::sync::mpsc;

use crate::error::Result;

/// Process name used when the foreground window cannot be resolved.
pub const UNKNOWN_PROCESS: &str = "unknown_process";

/// Longest window title kept in a keyword line, in characters.
pub const MAX_TITLE_CHARS: usize = 100;

/// Titles that resolvers report when they have nothing useful.
const PLACEHOLDER_TITLES: &[&str] = &["Unknown Title", "Error"];

/// A single key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyEvent {
    /// A key that produced a character.
    Char(char),
    /// The space bar.
    Space,
    /// Return/Enter.
    Enter,
    /// Tab.
    Tab,
    /// Any other named key (Backspace, arrows, modifiers, ...).
    Other,
}

/// Foreground window as reported by an [`ActiveWindow`] resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    /// Name of the process owning the window.
    pub process_name: String,
    /// Window title, if it could be read.
    pub title: Option<String>,
}

impl WindowInfo {
    /// Create window info for a known process.
    #[must_use]
    pub fn new(process_name: impl Into<String>, title: Option<String>) -> Self {
        Self {
            process_name: process_name.into(),
            title,
        }
    }

    /// Placeholder used when resolution fails.
    #[must_use]
    pub fn unknown() -> Self {
        Self::new(UNKNOWN_PROCESS, None)
    }
}

/// A word accepted for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordEntry {
    timestamp: DateTime<Local>,
    owner_process: String,
    word: String,
    window_title: Option<String>,
}

impl KeywordEntry {
    /// Create an entry, truncating the timestamp to whole seconds.
    #[must_use]
    pub fn new(
        timestamp: DateTime<Local>,
        owner_process: impl Into<String>,
        word: impl Into<String>,
        window_title: Option<String>,
    ) -> Self {
        Self {
            timestamp: timestamp.with_nanosecond(0).unwrap_or(timestamp),
            owner_process: owner_process.into(),
            word: word.into(),
            window_title,
        }
    }

    /// Build an entry for `word` typed into `window`.
    #[must_use]
    pub fn from_window(
        timestamp: DateTime<Local>,
        word: impl Into<String>,
        window: WindowInfo,
    ) -> Self {
        Self::new(timestamp, window.process_name, word, window.title)
    }

    /// When the word was completed.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    /// Process the word was typed into.
    #[must_use]
    pub fn owner_process(&self) -> &str {
        &self.owner_process
    }

    /// The word itself.
    #[must_use]
    pub fn word(&self) -> &str {
        &self.word
    }

    /// Window title, if known.
    #[must_use]
    pub fn window_title(&self) -> Option<&str> {
        self.window_title.as_deref()
    }

    /// Plaintext log line for this entry, without a trailing newline.
    ///
    /// `[2026-10-16 14:03:07] firefox: "weather" (Window: Forecast)`; the
    /// window segment is left out when the title is missing or a placeholder.
    #[must_use]
    pub fn to_line(&self) -> String {
        let stamp = self.timestamp.format("%Y-%m-%d %H:%M:%S");
        match self.display_title() {
            Some(title) => format!(
                "[{stamp}] {}: \"{}\" (Window: {title})",
                self.owner_process, self.word
            ),
            None => format!("[{stamp}] {}: \"{}\"", self.owner_process, self.word),
        }
    }

    fn display_title(&self) -> Option<String> {
        let title = self.window_title.as_deref()?.trim();
        if title.is_empty() || PLACEHOLDER_TITLES.contains(&title) {
            return None;
        }
        Some(title.chars().take(MAX_TITLE_CHARS).collect())
    }
}

/// A captured screen image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenshotRecord {
    /// When the image was captured.
    pub timestamp: DateTime<Local>,
    /// Encoded image (PNG).
    pub image_bytes: Vec<u8>,
}

impl ScreenshotRecord {
    /// Create a record for an image captured at `timestamp`.
    #[must_use]
    pub fn new(timestamp: DateTime<Local>, image_bytes: Vec<u8>) -> Self {
        Self {
            timestamp,
            image_bytes,
        }
    }

    /// File name the encrypted image is stored under.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}.png.enc", self.timestamp.format("%Y%m%d_%H%M%S"))
    }
}

/// Platform source of raw key presses.
///
/// Implementations usually sit on an OS hook in their own thread and push
/// events into the channel with `blocking_send`.
#[async_trait::async_trait]
pub trait KeySource: Send + Sync {
    /// The name of this source (for logging/debugging).
    fn name(&self) -> &'static str;

    /// Start delivering key presses through `sender`.
    ///
    /// Must return once the source is listening, not when it finishes.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot start, such as when required
    /// permissions are missing or platform APIs are unavailable.
    async fn start(&mut self, sender: mpsc::Sender<KeyEvent>) -> Result<()>;

    /// Stop delivering key presses.
    ///
    /// # Errors
    ///
    /// Returns an error if the source fails to stop cleanly.
    fn stop(&mut self) -> Result<()>;

    /// Check if the source is currently running.
    fn is_running(&self) -> bool;
}

/// Resolves the foreground window. Best effort; never fails.
pub trait ActiveWindow: Send + Sync {
    /// Current foreground window, or [`WindowInfo::unknown`].
    fn resolve(&self) -> WindowInfo;
}

/// Resolver for platforms without window introspection.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnknownWindow;

impl ActiveWindow for UnknownWindow {
    fn resolve(&self) -> WindowInfo {
        WindowInfo::unknown()
    }
}

/// Grabs the whole screen as an encoded image.
///
/// Called from the blocking pool, so implementations may block.
pub trait ScreenCapture: Send + Sync {
    /// The name of this capture backend.
    fn name(&self) -> &'static str;

    /// Capture the screen. `Ok(None)` means nothing was produced.
    ///
    /// # Errors
    ///
    /// Returns an error if the capture backend failed.
    fn capture(&self) -> Result<Option<Vec<u8>>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 10, 16, h, m, s).unwrap()
    }

    #[test]
    fn test_line_with_title() {
        let entry = KeywordEntry::new(at(14, 3, 7), "firefox", "weather", Some("Forecast".into()));
        assert_eq!(
            entry.to_line(),
            "[2026-10-16 14:03:07] firefox: \"weather\" (Window: Forecast)"
        );
    }

    #[test]
    fn test_line_without_title() {
        let entry = KeywordEntry::new(at(9, 0, 0), "slack", "lunch", None);
        assert_eq!(entry.to_line(), "[2026-10-16 09:00:00] slack: \"lunch\"");
    }

    #[test]
    fn test_placeholder_titles_omitted() {
        for title in ["Unknown Title", "Error", "   "] {
            let entry = KeywordEntry::new(at(9, 0, 0), "chrome", "hi", Some(title.into()));
            assert!(!entry.to_line().contains("Window"), "title {title:?}");
        }
    }

    #[test]
    fn test_title_truncated_to_100_chars() {
        let long: String = "é".repeat(150);
        let entry = KeywordEntry::new(at(9, 0, 0), "chrome", "hi", Some(long));
        let line = entry.to_line();
        let title = line
            .split("(Window: ")
            .nth(1)
            .unwrap()
            .trim_end_matches(')');
        assert_eq!(title.chars().count(), MAX_TITLE_CHARS);
    }

    #[test]
    fn test_timestamp_second_precision() {
        let precise = at(10, 0, 0) + chrono::Duration::milliseconds(750);
        let entry = KeywordEntry::new(precise, "chrome", "hi", None);
        assert_eq!(entry.timestamp(), at(10, 0, 0));
    }

    #[test]
    fn test_from_window() {
        let window = WindowInfo::new("brave", Some("News".into()));
        let entry = KeywordEntry::from_window(at(8, 0, 0), "headline", window);
        assert_eq!(entry.owner_process(), "brave");
        assert_eq!(entry.word(), "headline");
        assert_eq!(entry.window_title(), Some("News"));
    }

    #[test]
    fn test_unknown_window() {
        let info = UnknownWindow.resolve();
        assert_eq!(info.process_name, UNKNOWN_PROCESS);
        assert!(info.title.is_none());
    }

    #[test]
    fn test_screenshot_file_name() {
        let record = ScreenshotRecord::new(at(7, 5, 9), vec![1, 2, 3]);
        assert_eq!(record.file_name(), "20261016_070509.png.enc");
    }
}

//! Keystroke-to-word segmentation.
//!
//! [`WordSegmenter`] turns a stream of [`KeyEvent`]s into candidate words.
//! Characters accumulate until a delimiter arrives, the user goes idle for
//! longer than the timeout, the buffer hits its length cap, or the session
//! ends. Editing keys are not interpreted: a typo followed by backspace is
//! kept verbatim, including the mistyped characters.
//!
//! The segmenter never reads the clock itself; callers pass `now` so the
//! state machine stays deterministic under test.

use std::time::Duration;

use tokio::time::Instant;

use crate::capture::KeyEvent;

/// Shortest word, in characters, that is ever emitted.
pub const MIN_WORD_CHARS: usize = 2;

/// Buffers key presses and emits completed words.
#[derive(Debug)]
pub struct WordSegmenter {
    buffer: String,
    buffered_chars: usize,
    last_activity: Instant,
    timeout: Duration,
    max_chars: usize,
}

impl WordSegmenter {
    /// Create a segmenter that flushes after `timeout` of inactivity and
    /// whenever the buffer reaches `max_chars` characters.
    #[must_use]
    pub fn new(timeout: Duration, max_chars: usize, now: Instant) -> Self {
        Self {
            buffer: String::new(),
            buffered_chars: 0,
            last_activity: now,
            timeout,
            max_chars: max_chars.max(MIN_WORD_CHARS),
        }
    }

    /// How often the inactivity check should run.
    #[must_use]
    pub fn watchdog_period(&self) -> Duration {
        (self.timeout / 2).max(Duration::from_millis(1))
    }

    /// Whether no characters are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Number of pending characters.
    #[must_use]
    pub fn pending_chars(&self) -> usize {
        self.buffered_chars
    }

    /// Feed one key press. Returns a word if this press completed one.
    pub fn on_key(&mut self, event: KeyEvent, now: Instant) -> Option<String> {
        self.last_activity = now;

        match event {
            KeyEvent::Char(c) if c.is_whitespace() => self.flush(),
            KeyEvent::Char(c) => {
                self.buffer.push(c);
                self.buffered_chars += 1;
                if self.buffered_chars >= self.max_chars {
                    self.flush()
                } else {
                    None
                }
            }
            KeyEvent::Space | KeyEvent::Enter | KeyEvent::Tab => self.flush(),
            KeyEvent::Other => None,
        }
    }

    /// Flush the buffer if it has been idle for longer than the timeout.
    pub fn flush_if_idle(&mut self, now: Instant) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        if now.saturating_duration_since(self.last_activity) > self.timeout {
            self.flush()
        } else {
            None
        }
    }

    /// Force-flush whatever is pending. Used when the session ends.
    pub fn finish(&mut self) -> Option<String> {
        self.flush()
    }

    fn flush(&mut self) -> Option<String> {
        let candidate = std::mem::take(&mut self.buffer);
        self.buffered_chars = 0;
        normalize_word(&candidate)
    }
}

/// Trim and lower-case a candidate; drop it if it is too short.
#[must_use]
pub fn normalize_word(candidate: &str) -> Option<String> {
    let word = candidate.trim().to_lowercase();
    if word.chars().count() < MIN_WORD_CHARS {
        None
    } else {
        Some(word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn segmenter(now: Instant) -> WordSegmenter {
        WordSegmenter::new(TIMEOUT, 256, now)
    }

    fn keys(text: &str) -> Vec<KeyEvent> {
        text.chars()
            .map(|c| match c {
                ' ' => KeyEvent::Space,
                '\n' => KeyEvent::Enter,
                '\t' => KeyEvent::Tab,
                c => KeyEvent::Char(c),
            })
            .collect()
    }

    fn feed(seg: &mut WordSegmenter, text: &str, now: Instant) -> Vec<String> {
        keys(text)
            .into_iter()
            .filter_map(|k| seg.on_key(k, now))
            .collect()
    }

    #[test]
    fn test_one_word_per_run() {
        let now = Instant::now();
        let mut seg = segmenter(now);
        let words = feed(&mut seg, "Hello  World\tfoo\nBar ", now);
        assert_eq!(words, vec!["hello", "world", "foo", "bar"]);
        assert!(seg.is_empty());
    }

    #[test]
    fn test_short_words_dropped() {
        let now = Instant::now();
        let mut seg = segmenter(now);
        let words = feed(&mut seg, "a I to x ok\n", now);
        assert_eq!(words, vec!["to", "ok"]);
    }

    #[test]
    fn test_enter_flushes_whole_buffer() {
        let now = Instant::now();
        let mut seg = segmenter(now);
        assert!(feed(&mut seg, "partial", now).is_empty());
        assert_eq!(seg.on_key(KeyEvent::Enter, now), Some("partial".to_string()));
        assert!(seg.is_empty());
    }

    #[test]
    fn test_whitespace_char_is_delimiter() {
        let now = Instant::now();
        let mut seg = segmenter(now);
        feed(&mut seg, "abc", now);
        assert_eq!(seg.on_key(KeyEvent::Char(' '), now), Some("abc".to_string()));
    }

    #[test]
    fn test_editing_keys_do_not_edit() {
        let now = Instant::now();
        let mut seg = segmenter(now);
        feed(&mut seg, "helo", now);
        assert_eq!(seg.on_key(KeyEvent::Other, now), None);
        feed(&mut seg, "lo", now);
        assert_eq!(seg.on_key(KeyEvent::Space, now), Some("helolo".to_string()));
    }

    #[test]
    fn test_inactivity_flushes_once() {
        let start = Instant::now();
        let mut seg = segmenter(start);
        feed(&mut seg, "pending", start);

        assert_eq!(seg.flush_if_idle(start + Duration::from_secs(3)), None);
        assert_eq!(seg.flush_if_idle(start + TIMEOUT), None);
        assert_eq!(
            seg.flush_if_idle(start + TIMEOUT + Duration::from_millis(1)),
            Some("pending".to_string())
        );
        assert!(seg.is_empty());
        assert_eq!(seg.flush_if_idle(start + TIMEOUT * 4), None);
    }

    #[test]
    fn test_typing_resets_idle_timer() {
        let start = Instant::now();
        let mut seg = segmenter(start);
        feed(&mut seg, "ab", start);
        let later = start + Duration::from_secs(4);
        feed(&mut seg, "cd", later);

        assert_eq!(seg.flush_if_idle(start + Duration::from_secs(6)), None);
        assert_eq!(
            seg.flush_if_idle(later + Duration::from_secs(6)),
            Some("abcd".to_string())
        );
    }

    #[test]
    fn test_finish_flushes_exactly_once() {
        let now = Instant::now();
        let mut seg = segmenter(now);
        feed(&mut seg, "unfinished", now);

        assert_eq!(seg.finish(), Some("unfinished".to_string()));
        assert_eq!(seg.finish(), None);
    }

    #[test]
    fn test_length_cap_bounds_buffer() {
        let now = Instant::now();
        let mut seg = WordSegmenter::new(TIMEOUT, 4, now);
        let words = feed(&mut seg, "abcdefghij", now);
        assert_eq!(words, vec!["abcd", "efgh"]);
        assert_eq!(seg.pending_chars(), 2);
    }

    #[test]
    fn test_watchdog_period_is_half_timeout() {
        let seg = segmenter(Instant::now());
        assert_eq!(seg.watchdog_period(), Duration::from_millis(2500));
    }

    #[test]
    fn test_normalize_word() {
        assert_eq!(normalize_word("  MiXeD "), Some("mixed".to_string()));
        assert_eq!(normalize_word("Ä"), None);
        assert_eq!(normalize_word("ÄÖ"), Some("äö".to_string()));
        assert_eq!(normalize_word(""), None);
    }
}

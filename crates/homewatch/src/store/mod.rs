//! Encrypted, day-partitioned storage for homewatch.
//!
//! Layout under the base directory:
//!
//! ```text
//! <base>/<YYYYMMDD>/keywords.log.enc            one encrypted record per line
//! <base>/<YYYYMMDD>/Screenshots/<YYYYMMDD_HHMMSS>.png.enc
//! ```
//!
//! The current partition is chosen from the clock on every write, so the
//! first write after midnight lands in a new directory and the previous day
//! is never appended to again. The unencrypted event log sits outside this
//! tree (see [`ErrorLog`]).

mod error_log;
pub mod partition;
mod reader;

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Local};
use tracing::{debug, trace};

use crate::capture::{KeywordEntry, ScreenshotRecord};
use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::keystore::KeyStore;

pub use error_log::ErrorLog;
pub use partition::{ensure_partition, list_partitions, Partition};
pub use reader::{decrypt_keyword_log, decrypt_screenshot, KeywordLine};

/// Storage engine for keyword and screenshot records.
///
/// Keyword appends are serialized by an internal lock. Screenshot writes go
/// to distinct files and take no lock.
#[derive(Debug)]
pub struct DailyLogStore {
    base: PathBuf,
    keys: Arc<KeyStore>,
    clock: Arc<dyn Clock>,
    error_log: ErrorLog,
    keyword_lock: Mutex<()>,
}

impl DailyLogStore {
    /// Open a store rooted at `base`, encrypting with `keys` and reporting
    /// to the event log at `error_log`.
    #[must_use]
    pub fn new(
        base: impl Into<PathBuf>,
        keys: Arc<KeyStore>,
        error_log: impl Into<PathBuf>,
    ) -> Self {
        Self::with_clock(base, keys, error_log, Arc::new(SystemClock))
    }

    /// Like [`DailyLogStore::new`], reading the time from `clock`.
    #[must_use]
    pub fn with_clock(
        base: impl Into<PathBuf>,
        keys: Arc<KeyStore>,
        error_log: impl Into<PathBuf>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            base: base.into(),
            keys,
            error_log: ErrorLog::with_clock(error_log, Arc::clone(&clock)),
            clock,
            keyword_lock: Mutex::new(()),
        }
    }

    /// The key used for every record.
    #[must_use]
    pub fn keys(&self) -> &Arc<KeyStore> {
        &self.keys
    }

    /// Current time according to the store's clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Local> {
        self.clock.now()
    }

    /// The unencrypted event log.
    #[must_use]
    pub fn error_log(&self) -> &ErrorLog {
        &self.error_log
    }

    /// Create (if needed) and return the current day's partition.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DirectoryCreate`] if the directories cannot be made.
    pub fn ensure_partition(&self) -> Result<Partition> {
        ensure_partition(&self.base, self.clock.now())
    }

    /// Encrypt `entry` and append it to today's keyword log.
    ///
    /// Returns the path of the log that was written.
    ///
    /// # Errors
    ///
    /// Returns an error if the partition cannot be created, the key is
    /// unusable, or the append fails.
    pub fn log_keyword(&self, entry: &KeywordEntry) -> Result<PathBuf> {
        let record = self.keys.encrypt(entry.to_line().as_bytes())?;
        let mut line = record;
        line.push(b'\n');

        let _guard = self.keyword_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let partition = self.ensure_partition()?;
        let path = partition.keyword_log();
        append_private(&path, &line)?;

        trace!(path = %path.display(), "Appended keyword record");
        Ok(path)
    }

    /// Encrypt `image_bytes` and write them as a new screenshot file.
    ///
    /// Two captures within the same second share a name; the later wins.
    ///
    /// # Errors
    ///
    /// Returns an error if the partition cannot be created, the key is
    /// unusable, or the write fails.
    pub fn save_screenshot(&self, image_bytes: &[u8]) -> Result<PathBuf> {
        let now = self.clock.now();
        let record = ScreenshotRecord::new(now, image_bytes.to_vec());
        let sealed = self.keys.encrypt(&record.image_bytes)?;

        let partition = ensure_partition(&self.base, now)?;
        let path = partition.screenshots_dir.join(record.file_name());
        write_private(&path, &sealed)?;

        debug!(path = %path.display(), bytes = image_bytes.len(), "Saved screenshot");
        Ok(path)
    }

    /// Append an operational message to the unencrypted event log.
    pub fn log_error(&self, message: &str, critical: bool) {
        self.error_log.log(message, critical);
    }
}

fn private_options() -> OpenOptions {
    let mut options = OpenOptions::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options
}

/// Append `bytes` in a single write.
fn append_private(path: &Path, bytes: &[u8]) -> Result<()> {
    let write_err = |source| Error::FileWrite {
        path: path.to_path_buf(),
        source,
    };
    let mut file = private_options()
        .create(true)
        .append(true)
        .open(path)
        .map_err(write_err)?;
    file.write_all(bytes).map_err(write_err)
}

fn write_private(path: &Path, bytes: &[u8]) -> Result<()> {
    let write_err = |source| Error::FileWrite {
        path: path.to_path_buf(),
        source,
    };
    let mut file = private_options()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .map_err(write_err)?;
    file.write_all(bytes).map_err(write_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::keystore::KEY_LEN;
    use chrono::{DateTime, Duration, Local, TimeZone};

    struct Fixture {
        _dir: tempfile::TempDir,
        base: PathBuf,
        clock: ManualClock,
        store: DailyLogStore,
    }

    fn at(day: u32, h: u32, m: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 10, day, h, m, s).unwrap()
    }

    fn fixture(start: DateTime<Local>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("data");
        let clock = ManualClock::new(start);
        let store = DailyLogStore::with_clock(
            &base,
            Arc::new(KeyStore::from_bytes(vec![5u8; KEY_LEN])),
            dir.path().join("error.log"),
            Arc::new(clock.clone()),
        );
        Fixture {
            _dir: dir,
            base,
            clock,
            store,
        }
    }

    fn entry(now: DateTime<Local>, word: &str) -> KeywordEntry {
        KeywordEntry::new(now, "firefox", word, Some("Search".into()))
    }

    #[test]
    fn test_log_keyword_appends_encrypted_lines() {
        let f = fixture(at(16, 10, 0, 0));
        let path = f.store.log_keyword(&entry(at(16, 10, 0, 0), "weather")).unwrap();
        f.store.log_keyword(&entry(at(16, 10, 0, 1), "forecast")).unwrap();

        assert_eq!(path, f.base.join("20261016").join("keywords.log.enc"));
        let raw = std::fs::read(&path).unwrap();
        assert!(!String::from_utf8_lossy(&raw).contains("weather"));
        assert_eq!(raw.iter().filter(|b| **b == b'\n').count(), 2);

        let lines = decrypt_keyword_log(f.store.keys(), &path).unwrap();
        let texts: Vec<_> = lines.into_iter().map(|l| l.text.unwrap()).collect();
        assert_eq!(
            texts,
            vec![
                "[2026-10-16 10:00:00] firefox: \"weather\" (Window: Search)",
                "[2026-10-16 10:00:01] firefox: \"forecast\" (Window: Search)",
            ]
        );
    }

    #[test]
    fn test_ensure_partition_twice_same_day() {
        let f = fixture(at(16, 9, 0, 0));
        let first = f.store.ensure_partition().unwrap();
        f.clock.advance(Duration::hours(5));
        let second = f.store.ensure_partition().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_rollover_starts_new_partition() {
        let f = fixture(at(16, 23, 59, 58));
        let yesterday = f.store.log_keyword(&entry(f.clock.now(), "late")).unwrap();
        let before = std::fs::read(&yesterday).unwrap();

        f.clock.advance(Duration::seconds(5));
        let today = f.store.log_keyword(&entry(f.clock.now(), "early")).unwrap();

        assert_eq!(today, f.base.join("20261017").join("keywords.log.enc"));
        assert_ne!(today, yesterday);
        assert_eq!(std::fs::read(&yesterday).unwrap(), before);
        assert_eq!(list_partitions(&f.base).unwrap().len(), 2);
    }

    #[test]
    fn test_save_screenshot() {
        let f = fixture(at(16, 14, 5, 9));
        let png = b"\x89PNG\r\n\x1a\nfake image body".to_vec();

        let path = f.store.save_screenshot(&png).unwrap();
        assert_eq!(
            path,
            f.base
                .join("20261016")
                .join("Screenshots")
                .join("20261016_140509.png.enc")
        );
        assert_ne!(std::fs::read(&path).unwrap(), png);
        assert_eq!(decrypt_screenshot(f.store.keys(), &path).unwrap(), png);
    }

    #[test]
    fn test_same_second_screenshot_last_write_wins() {
        let f = fixture(at(16, 14, 5, 9));
        let first = f.store.save_screenshot(b"first").unwrap();
        let second = f.store.save_screenshot(b"second").unwrap();

        assert_eq!(first, second);
        assert_eq!(decrypt_screenshot(f.store.keys(), &second).unwrap(), b"second");
    }

    #[cfg(unix)]
    #[test]
    fn test_record_files_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let f = fixture(at(16, 14, 0, 0));
        let log = f.store.log_keyword(&entry(f.clock.now(), "hello")).unwrap();
        let shot = f.store.save_screenshot(b"img").unwrap();
        for path in [log, shot] {
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600, "{}", path.display());
        }
    }

    #[test]
    fn test_invalid_key_fails_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("data");
        let store = DailyLogStore::new(
            &base,
            Arc::new(KeyStore::from_bytes(b"short".to_vec())),
            dir.path().join("error.log"),
        );

        let err = store.log_keyword(&entry(Local::now(), "hello")).unwrap_err();
        assert!(matches!(err, Error::InvalidKey { .. }));
        assert!(!base.exists());
    }

    #[test]
    fn test_unwritable_base_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("data");
        std::fs::write(&blocker, b"a file, not a directory").unwrap();

        let store = DailyLogStore::new(
            &blocker,
            Arc::new(KeyStore::from_bytes(vec![1u8; KEY_LEN])),
            dir.path().join("error.log"),
        );
        let err = store.save_screenshot(b"img").unwrap_err();
        assert!(matches!(err, Error::DirectoryCreate { .. }));
    }

    #[test]
    fn test_concurrent_keyword_appends() {
        let f = fixture(at(16, 12, 0, 0));
        let store = Arc::new(f.store);

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = Arc::clone(&store);
                let now = f.clock.now();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        store.log_keyword(&entry(now, &format!("w{t}x{i}"))).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let path = f.base.join("20261016").join("keywords.log.enc");
        let lines = decrypt_keyword_log(store.keys(), &path).unwrap();
        assert_eq!(lines.len(), 100);
        assert!(lines.iter().all(|l| l.text.is_ok()));
    }
}

//! Day partitions.
//!
//! A partition is `<base>/<YYYYMMDD>` holding the encrypted keyword log and
//! a `Screenshots` directory. Creation is idempotent and safe to race.

use std::fs::{self, DirBuilder};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDate};

use crate::error::{Error, Result};

/// Encrypted keyword log file name inside a partition.
pub const KEYWORD_LOG_NAME: &str = "keywords.log.enc";

/// Screenshot directory name inside a partition.
pub const SCREENSHOTS_DIR_NAME: &str = "Screenshots";

/// Directories of one day partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// Calendar date of the partition.
    pub date: NaiveDate,
    /// The partition directory.
    pub dir: PathBuf,
    /// The screenshot directory inside it.
    pub screenshots_dir: PathBuf,
}

impl Partition {
    /// Describe the partition for `now` under `base` without creating it.
    #[must_use]
    pub fn locate(base: &Path, now: DateTime<Local>) -> Self {
        let date = now.date_naive();
        let dir = base.join(partition_name(date));
        let screenshots_dir = dir.join(SCREENSHOTS_DIR_NAME);
        Self {
            date,
            dir,
            screenshots_dir,
        }
    }

    /// Path of the encrypted keyword log.
    #[must_use]
    pub fn keyword_log(&self) -> PathBuf {
        self.dir.join(KEYWORD_LOG_NAME)
    }
}

/// Directory name for a calendar date.
#[must_use]
pub fn partition_name(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Create today's partition under `base` with owner-only permissions.
///
/// Calling it again for the same day returns the same directories.
///
/// # Errors
///
/// Returns [`Error::DirectoryCreate`] if a directory cannot be created.
pub fn ensure_partition(base: &Path, now: DateTime<Local>) -> Result<Partition> {
    let partition = Partition::locate(base, now);

    for dir in [base, partition.dir.as_path(), partition.screenshots_dir.as_path()] {
        create_private_dir(dir)?;
    }

    Ok(partition)
}

/// Create `dir` (and parents) with mode 0700 on Unix, tolerating races.
pub(crate) fn create_private_dir(dir: &Path) -> Result<()> {
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }

    builder.create(dir).map_err(|source| Error::DirectoryCreate {
        path: dir.to_path_buf(),
        source,
    })
}

/// List the partitions under `base`, oldest first.
///
/// # Errors
///
/// Returns an error if `base` exists but cannot be read.
pub fn list_partitions(base: &Path) -> Result<Vec<NaiveDate>> {
    if !base.exists() {
        return Ok(Vec::new());
    }

    let mut dates: Vec<NaiveDate> = fs::read_dir(base)?
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| {
            let name = entry.file_name();
            NaiveDate::parse_from_str(name.to_str()?, "%Y%m%d").ok()
        })
        .collect();
    dates.sort_unstable();
    Ok(dates)
}

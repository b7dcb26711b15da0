//! File rotation
//!
//! A [`Rotator`] owns one on-disk log file: it decides when the file must be
//! rolled over, performs the rename, and prunes old backups. Rotators are
//! confined to a single writer thread and need no locking of their own.

mod size;
mod time;
mod time_and_size;

pub use size::SizeRotator;
pub use time::TimeRotator;
pub use time_and_size::{TimeAndSizeRotator, TimeAndSizeRotatorBuilder};

use crate::core::error::{LoggerError, Result};
use chrono::{DateTime, Duration as ChronoDuration, Local, TimeZone, Timelike};
use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One rotating log file
pub trait Rotator: Send {
    /// Whether writing `candidate` requires a rollover first
    fn need_rollover(&mut self, candidate: &[u8]) -> Result<bool>;

    /// Rename the live file away, prune backups and open a fresh live file
    fn do_rollover(&mut self) -> Result<()>;

    /// The live file, opened on demand
    fn file(&mut self) -> Result<&mut File>;

    /// Fsync and release the live file. Closing an unopened rotator is a no-op.
    fn close(&mut self) -> Result<()>;

    /// Path of the current live file
    fn path(&self) -> &Path;

    /// Roll over if needed, then append `buf` to the live file
    fn write(&mut self, buf: &[u8]) -> Result<()> {
        if self.need_rollover(buf)? {
            self.do_rollover()?;
        }
        let path = self.path().to_path_buf();
        let file = self.file()?;
        file.write_all(buf).map_err(|e| {
            LoggerError::io_operation(
                "write log file",
                format!("Failed to write to '{}'", path.display()),
                e,
            )
        })
    }
}

impl Rotator for Box<dyn Rotator> {
    fn need_rollover(&mut self, candidate: &[u8]) -> Result<bool> {
        (**self).need_rollover(candidate)
    }

    fn do_rollover(&mut self) -> Result<()> {
        (**self).do_rollover()
    }

    fn file(&mut self) -> Result<&mut File> {
        (**self).file()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn path(&self) -> &Path {
        (**self).path()
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        (**self).write(buf)
    }
}

/// Source of wall-clock time for rollover deadlines
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Local>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, now: DateTime<Local>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: std::time::Duration) {
        let by = ChronoDuration::from_std(by).unwrap_or(ChronoDuration::zero());
        let mut now = self.now.lock();
        *now = *now + by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock()
    }
}

pub type SharedClock = Arc<dyn Clock>;

pub(crate) fn system_clock() -> SharedClock {
    Arc::new(SystemClock)
}

/// Granularity of time-based rollover
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RolloverUnit {
    Second,
    Minute,
    #[default]
    Hour,
    Day,
}

impl RolloverUnit {
    pub fn seconds(&self) -> i64 {
        match self {
            RolloverUnit::Second => 1,
            RolloverUnit::Minute => 60,
            RolloverUnit::Hour => 60 * 60,
            RolloverUnit::Day => 24 * 60 * 60,
        }
    }

    /// Start of the unit containing `t`, in local time
    pub fn truncate(&self, t: DateTime<Local>) -> DateTime<Local> {
        let base = t.with_nanosecond(0).unwrap_or(t);
        let truncated = match self {
            RolloverUnit::Second => Some(base),
            RolloverUnit::Minute => base.with_second(0),
            RolloverUnit::Hour => base.with_second(0).and_then(|t| t.with_minute(0)),
            RolloverUnit::Day => t
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .and_then(|midnight| Local.from_local_datetime(&midnight).earliest()),
        };
        truncated.unwrap_or(base)
    }
}

/// Length of one rollover period
pub(crate) fn period(unit: RolloverUnit, step: u32) -> ChronoDuration {
    ChronoDuration::seconds(unit.seconds() * i64::from(step.max(1)))
}

/// Next deadline anchored to the unit boundary at or before `now`
pub(crate) fn next_deadline(unit: RolloverUnit, step: u32, now: DateTime<Local>) -> DateTime<Local> {
    unit.truncate(now) + period(unit, step)
}

/// Timestamp layout used to name time-based backups, with its retention
/// pattern. Layouts sort chronologically as plain strings.
///
/// Built-in patterns also accept a `_NNNN` counter, which is added when two
/// rollovers land on the same timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuffixFormat {
    /// `20240309140507`
    Compact,
    /// `2024-03-09T14-05-07`
    DashedT,
    /// `2024-03-09_14-05-07`
    #[default]
    DashedUnderscore,
    Custom { layout: String, pattern: String },
}

impl SuffixFormat {
    pub fn layout(&self) -> &str {
        match self {
            SuffixFormat::Compact => "%Y%m%d%H%M%S",
            SuffixFormat::DashedT => "%Y-%m-%dT%H-%M-%S",
            SuffixFormat::DashedUnderscore => "%Y-%m-%d_%H-%M-%S",
            SuffixFormat::Custom { layout, .. } => layout,
        }
    }

    pub fn pattern(&self) -> &str {
        match self {
            SuffixFormat::Compact => r"^\d{14}(_\d+)?(\.\w+)?$",
            SuffixFormat::DashedT => r"^\d{4}-\d{2}-\d{2}T\d{2}-\d{2}-\d{2}(_\d+)?(\.\w+)?$",
            SuffixFormat::DashedUnderscore => {
                r"^\d{4}-\d{2}-\d{2}_\d{2}-\d{2}-\d{2}(_\d+)?(\.\w+)?$"
            }
            SuffixFormat::Custom { pattern, .. } => pattern,
        }
    }

    pub fn regex(&self) -> Result<Regex> {
        Regex::new(self.pattern()).map_err(|e| {
            LoggerError::config(
                "SuffixFormat",
                format!("invalid retention pattern '{}': {}", self.pattern(), e),
            )
        })
    }

    pub fn stamp(&self, t: &DateTime<Local>) -> String {
        t.format(self.layout()).to_string()
    }

    pub fn validate(&self) -> Result<()> {
        use chrono::format::{Item, StrftimeItems};
        if self.layout().is_empty()
            || StrftimeItems::new(self.layout()).any(|item| matches!(item, Item::Error))
        {
            return Err(LoggerError::config(
                "SuffixFormat",
                format!("invalid timestamp layout '{}'", self.layout()),
            ));
        }
        self.regex().map(|_| ())
    }
}

/// Time-based rollover settings shared by the time rotators
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimePolicy {
    pub when: RolloverUnit,
    pub interval_step: u32,
    /// Backups to keep; 0 keeps everything
    pub backup_count: usize,
    pub suffix_format: SuffixFormat,
}

impl Default for TimePolicy {
    fn default() -> Self {
        Self {
            when: RolloverUnit::Hour,
            interval_step: 1,
            backup_count: 0,
            suffix_format: SuffixFormat::default(),
        }
    }
}

impl TimePolicy {
    pub fn validate(&self) -> Result<()> {
        if self.interval_step == 0 {
            return Err(LoggerError::config("TimePolicy", "interval_step must be at least 1"));
        }
        self.suffix_format.validate()
    }
}

/// `mkdir -p`, skipped for the current directory
pub(crate) fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.as_os_str().is_empty() || dir == Path::new(".") {
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|e| {
        LoggerError::io_operation(
            "create log directory",
            format!("Failed to create directory '{}'", dir.display()),
            e,
        )
    })
}

pub(crate) fn parent_dir(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

pub(crate) fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(String::from)
        .ok_or_else(|| {
            LoggerError::config(
                "Rotator",
                format!("'{}' has no usable file name", path.display()),
            )
        })
}

pub(crate) fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| {
            LoggerError::io_operation(
                "open log file",
                format!("Failed to open '{}'", path.display()),
                e,
            )
        })
}

/// The live file in `slot`, opening `path` if nothing is open yet
pub(crate) fn ensure_open<'a>(slot: &'a mut Option<File>, path: &Path) -> Result<&'a mut File> {
    if slot.is_none() {
        *slot = Some(open_append(path)?);
    }
    slot.as_mut()
        .ok_or_else(|| LoggerError::other(format!("'{}' is not open", path.display())))
}

pub(crate) fn file_size(file: &File, path: &Path) -> Result<u64> {
    file.metadata().map(|m| m.len()).map_err(|e| {
        LoggerError::io_operation(
            "stat log file",
            format!("Cannot access metadata of '{}'", path.display()),
            e,
        )
    })
}

pub(crate) fn sync_and_release(file: Option<File>, path: &Path) -> Result<()> {
    match file {
        Some(file) => file.sync_all().map_err(|e| {
            LoggerError::io_operation(
                "sync log file",
                format!("Failed to sync '{}'", path.display()),
                e,
            )
        }),
        None => Ok(()),
    }
}

pub(crate) fn rename(from: &Path, to: &Path) -> Result<()> {
    fs::rename(from, to).map_err(|e| {
        LoggerError::file_rotation(
            from.display().to_string(),
            format!("Failed to rename to '{}': {}", to.display(), e),
        )
    })
}

/// Name for a new timestamped backup that sorts after every existing backup
/// with the same stamp: `make(stamp)` while that is free, then
/// `make(stamp_0001)`, `make(stamp_0002)`, ... counting up from the highest
/// counter on disk, so names freed by pruning are never reused.
pub(crate) fn free_backup_path(
    dir: &Path,
    stamp: &str,
    make: impl Fn(&str) -> String,
) -> Result<PathBuf> {
    let template = make("\u{0}");
    let (head, tail) = template
        .split_once('\u{0}')
        .unwrap_or((template.as_str(), ""));
    let counted = format!("{}{}_", head, stamp);

    let highest = list_file_names(dir)?
        .iter()
        .filter_map(|name| name.strip_prefix(counted.as_str())?.strip_suffix(tail))
        .filter(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|n| n.parse::<u32>().ok())
        .max();

    let bare = dir.join(make(stamp));
    Ok(match highest {
        None if !bare.exists() => bare,
        None => dir.join(make(&format!("{}_{:04}", stamp, 1))),
        Some(n) => dir.join(make(&format!("{}_{:04}", stamp, n + 1))),
    })
}

fn list_file_names(dir: &Path) -> Result<Vec<String>> {
    let listing = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };
    let entries = fs::read_dir(listing).map_err(|e| {
        LoggerError::io_operation(
            "list log directory",
            format!("Failed to read '{}'", listing.display()),
            e,
        )
    })?;
    Ok(entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect())
}

/// Delete all but the newest `keep` files in `dir` named `<prefix><rest>`
/// where `rest` matches `pattern`. `skip` is never counted or removed.
/// Returns the number of files removed.
pub(crate) fn prune_backups(
    dir: &Path,
    prefix: &str,
    pattern: &Regex,
    keep: usize,
    skip: Option<&Path>,
) -> Result<usize> {
    let skip_name = skip.and_then(|p| p.file_name());
    let mut matched: Vec<String> = list_file_names(dir)?
        .into_iter()
        .filter(|name| Some(std::ffi::OsStr::new(name)) != skip_name)
        .filter(|name| {
            name.strip_prefix(prefix)
                .map(|rest| pattern.is_match(rest))
                .unwrap_or(false)
        })
        .collect();

    if matched.len() <= keep {
        return Ok(0);
    }
    matched.sort();
    let excess = matched.len() - keep;
    let mut removed = 0;
    for name in matched.into_iter().take(excess) {
        let path = dir.join(&name);
        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) => eprintln!(
                "[LOGGER WARNING] Failed to remove old backup {}: {}",
                path.display(),
                e
            ),
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_truncate_units() {
        let t = at(2024, 3, 9, 14, 25, 37) + ChronoDuration::milliseconds(250);
        assert_eq!(RolloverUnit::Second.truncate(t), at(2024, 3, 9, 14, 25, 37));
        assert_eq!(RolloverUnit::Minute.truncate(t), at(2024, 3, 9, 14, 25, 0));
        assert_eq!(RolloverUnit::Hour.truncate(t), at(2024, 3, 9, 14, 0, 0));
        assert_eq!(RolloverUnit::Day.truncate(t), at(2024, 3, 9, 0, 0, 0));
    }

    #[test]
    fn test_next_deadline_with_step() {
        let t = at(2024, 3, 9, 14, 25, 37);
        assert_eq!(next_deadline(RolloverUnit::Hour, 1, t), at(2024, 3, 9, 15, 0, 0));
        assert_eq!(next_deadline(RolloverUnit::Minute, 5, t), at(2024, 3, 9, 14, 30, 0));
    }

    #[test]
    fn test_suffix_formats_match_their_stamps() {
        let t = at(2024, 3, 9, 14, 5, 7);
        for format in [
            SuffixFormat::Compact,
            SuffixFormat::DashedT,
            SuffixFormat::DashedUnderscore,
        ] {
            let re = format.regex().unwrap();
            let stamp = format.stamp(&t);
            assert!(re.is_match(&stamp), "{:?} {}", format, stamp);
            assert!(re.is_match(&format!("{}.log", stamp)));
            assert!(re.is_match(&format!("{}_0002.log", stamp)));
            assert!(!re.is_match("log"));
        }
        assert_eq!(SuffixFormat::Compact.stamp(&t), "20240309140507");
        assert_eq!(SuffixFormat::DashedT.stamp(&t), "2024-03-09T14-05-07");
    }

    #[test]
    fn test_custom_suffix_validation() {
        let bad = SuffixFormat::Custom {
            layout: "%Y".into(),
            pattern: "(".into(),
        };
        assert!(bad.validate().is_err());
        let ok = SuffixFormat::Custom {
            layout: "%Y%m%d".into(),
            pattern: r"^\d{8}$".into(),
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_prune_keeps_newest() {
        let dir = TempDir::new().unwrap();
        for stamp in ["20240101000000", "20240102000000", "20240103000000"] {
            fs::write(dir.path().join(format!("app.log.{}", stamp)), "x").unwrap();
        }
        fs::write(dir.path().join("app.log"), "live").unwrap();
        fs::write(dir.path().join("app.log.notes"), "other").unwrap();

        let re = SuffixFormat::Compact.regex().unwrap();
        let removed = prune_backups(dir.path(), "app.log.", &re, 2, None).unwrap();
        assert_eq!(removed, 1);
        assert!(!dir.path().join("app.log.20240101000000").exists());
        assert!(dir.path().join("app.log.20240103000000").exists());
        assert!(dir.path().join("app.log").exists());
        assert!(dir.path().join("app.log.notes").exists());

        // keep == 0 removes every match
        assert_eq!(prune_backups(dir.path(), "app.log.", &re, 0, None).unwrap(), 2);
        assert!(dir.path().join("app.log").exists());
    }

    #[test]
    fn test_free_backup_path_adds_counter() {
        let dir = TempDir::new().unwrap();
        let make = |s: &str| format!("app.{}.log", s);
        let first = free_backup_path(dir.path(), "20240101000000", make).unwrap();
        assert_eq!(first, dir.path().join("app.20240101000000.log"));
        fs::write(&first, "x").unwrap();
        let second = free_backup_path(dir.path(), "20240101000000", make).unwrap();
        assert_eq!(second, dir.path().join("app.20240101000000_0001.log"));
        fs::write(&second, "x").unwrap();

        // Freed names are not reused once a counter is on disk
        fs::remove_file(&first).unwrap();
        let third = free_backup_path(dir.path(), "20240101000000", make).unwrap();
        assert_eq!(third, dir.path().join("app.20240101000000_0002.log"));
        assert!(second < third);
    }

    #[test]
    fn test_free_backup_path_without_tail() {
        let dir = TempDir::new().unwrap();
        let make = |s: &str| format!("app.log.{}", s);
        fs::write(dir.path().join("app.log.20240101000000"), "x").unwrap();
        fs::write(dir.path().join("app.log.20240101000000_0009"), "x").unwrap();
        let next = free_backup_path(dir.path(), "20240101000000", make).unwrap();
        assert_eq!(next, dir.path().join("app.log.20240101000000_0010"));
    }

    #[test]
    fn test_ensure_dir_skips_current() {
        assert!(ensure_dir(Path::new("")).is_ok());
        assert!(ensure_dir(Path::new(".")).is_ok());
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a/b/c");
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
        // idempotent
        ensure_dir(&nested).unwrap();
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(at(2024, 1, 1, 0, 59, 59));
        clock.advance(std::time::Duration::from_secs(1));
        assert_eq!(clock.now(), at(2024, 1, 1, 1, 0, 0));
    }
}

use super::{
    ensure_dir, ensure_open, file_size, free_backup_path, next_deadline, open_append,
    prune_backups, rename, sync_and_release, system_clock, Rotator, SharedClock, TimePolicy,
};
use crate::core::error::{LoggerError, Result};
use chrono::{DateTime, Local};
use regex::Regex;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Rotates on a wall-clock boundary or a size limit, whichever comes first.
///
/// Single-writer mode writes `dir/name.suffix` and renames it to
/// `dir/name.<open time>.suffix` on rollover. Concurrent mode never renames:
/// each period gets its own `dir/name.<open time>.suffix`, and every write
/// holds an exclusive advisory lock so several processes can share it.
pub struct TimeAndSizeRotator {
    dir: PathBuf,
    name: String,
    suffix: String,
    path: PathBuf,
    file: Option<File>,
    max_size: u64,
    policy: TimePolicy,
    retention: Regex,
    concurrent_write: bool,
    opened_at: DateTime<Local>,
    rollover_at: DateTime<Local>,
    clock: SharedClock,
}

#[must_use = "builder methods return a new value"]
pub struct TimeAndSizeRotatorBuilder {
    dir: PathBuf,
    name: String,
    suffix: String,
    max_size: u64,
    policy: TimePolicy,
    concurrent_write: bool,
    clock: Option<SharedClock>,
}

impl TimeAndSizeRotatorBuilder {
    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// 0 disables the size trigger
    pub fn max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn policy(mut self, policy: TimePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn concurrent_write(mut self, enabled: bool) -> Self {
        self.concurrent_write = enabled;
        self
    }

    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// # Errors
    ///
    /// Invalid policy or empty name, directory creation failure, or failure
    /// to rotate a stale file left by a previous run.
    pub fn build(self) -> Result<TimeAndSizeRotator> {
        self.policy.validate()?;
        let name = self.name.trim_end_matches(&format!(".{}", self.suffix)).to_string();
        if name.is_empty() {
            return Err(LoggerError::config("TimeAndSizeRotator", "file name is empty"));
        }
        ensure_dir(&self.dir)?;

        let clock = self.clock.unwrap_or_else(system_clock);
        let now = clock.now();
        let mut rotator = TimeAndSizeRotator {
            retention: self.policy.suffix_format.regex()?,
            path: PathBuf::new(),
            dir: self.dir,
            name,
            suffix: self.suffix,
            file: None,
            max_size: self.max_size,
            concurrent_write: self.concurrent_write,
            opened_at: self.policy.when.truncate(now),
            rollover_at: next_deadline(self.policy.when, self.policy.interval_step, now),
            policy: self.policy,
            clock,
        };

        if rotator.concurrent_write {
            rotator.path = rotator.shared_path(&rotator.opened_at);
        } else {
            rotator.path = rotator.dir.join(rotator.with_suffix(&rotator.name));
            rotator.rotate_if_stale()?;
        }
        Ok(rotator)
    }
}

impl TimeAndSizeRotator {
    pub fn builder(dir: impl AsRef<Path>, name: impl Into<String>) -> TimeAndSizeRotatorBuilder {
        TimeAndSizeRotatorBuilder {
            dir: dir.as_ref().to_path_buf(),
            name: name.into(),
            suffix: "log".to_string(),
            max_size: 0,
            policy: TimePolicy::default(),
            concurrent_write: false,
            clock: None,
        }
    }

    fn with_suffix(&self, base: &str) -> String {
        if self.suffix.is_empty() {
            base.to_string()
        } else {
            format!("{}.{}", base, self.suffix)
        }
    }

    fn stamped_path(&self, at: &DateTime<Local>) -> Result<PathBuf> {
        let stamp = self.policy.suffix_format.stamp(at);
        free_backup_path(&self.dir, &stamp, |s| {
            self.with_suffix(&format!("{}.{}", self.name, s))
        })
    }

    // Concurrent writers of the same period agree on this name
    fn shared_path(&self, at: &DateTime<Local>) -> PathBuf {
        let stamp = self.policy.suffix_format.stamp(&self.policy.when.truncate(*at));
        self.dir
            .join(self.with_suffix(&format!("{}.{}", self.name, stamp)))
    }

    // A live file last written before the current period belongs to an
    // earlier run and is rotated out under its own modification time.
    fn rotate_if_stale(&mut self) -> Result<()> {
        let modified = match std::fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(modified) => DateTime::<Local>::from(modified),
            Err(_) => return Ok(()),
        };
        if modified < self.opened_at {
            self.opened_at = self.policy.when.truncate(modified);
            self.do_rollover()?;
        }
        Ok(())
    }

    pub fn rollover_at(&self) -> DateTime<Local> {
        self.rollover_at
    }

    pub fn is_concurrent(&self) -> bool {
        self.concurrent_write
    }

    fn retention_prefix(&self) -> String {
        format!("{}.", self.name)
    }
}

impl Rotator for TimeAndSizeRotator {
    fn need_rollover(&mut self, candidate: &[u8]) -> Result<bool> {
        if self.clock.now() >= self.rollover_at {
            return Ok(true);
        }
        if self.max_size == 0 {
            return Ok(false);
        }
        let size = file_size(ensure_open(&mut self.file, &self.path)?, &self.path)?;
        Ok(size + candidate.len() as u64 >= self.max_size)
    }

    fn do_rollover(&mut self) -> Result<()> {
        sync_and_release(self.file.take(), &self.path)?;
        let now = self.clock.now();

        let keep = self.policy.backup_count;
        if self.concurrent_write {
            // a size rollover inside the period gets a private name
            self.path = if now < self.rollover_at {
                self.stamped_path(&now)?
            } else {
                self.shared_path(&now)
            };
            // The new live file matches the retention pattern too
            if keep > 0 {
                prune_backups(
                    &self.dir,
                    &self.retention_prefix(),
                    &self.retention,
                    keep - 1,
                    Some(&self.path),
                )?;
            }
        } else {
            if self.path.exists() {
                let backup = self.stamped_path(&self.opened_at)?;
                rename(&self.path, &backup)?;
            }
            if keep > 0 {
                prune_backups(
                    &self.dir,
                    &self.retention_prefix(),
                    &self.retention,
                    keep,
                    Some(&self.path),
                )?;
            }
        }

        self.opened_at = now;
        self.rollover_at = next_deadline(self.policy.when, self.policy.interval_step, now);
        self.file = Some(open_append(&self.path)?);
        Ok(())
    }

    fn file(&mut self) -> Result<&mut File> {
        ensure_open(&mut self.file, &self.path)
    }

    fn close(&mut self) -> Result<()> {
        sync_and_release(self.file.take(), &self.path)
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        if self.need_rollover(buf)? {
            self.do_rollover()?;
        }
        let concurrent = self.concurrent_write;
        let file = ensure_open(&mut self.file, &self.path)?;
        let path = &self.path;
        let io_err = |e| {
            LoggerError::io_operation(
                "write log file",
                format!("Failed to write to '{}'", path.display()),
                e,
            )
        };

        #[cfg(feature = "file")]
        if concurrent {
            use fs2::FileExt;
            file.lock_exclusive().map_err(io_err)?;
            let written = file.write_all(buf);
            let unlocked = FileExt::unlock(file);
            written.map_err(io_err)?;
            return unlocked.map_err(io_err);
        }
        #[cfg(not(feature = "file"))]
        let _ = concurrent;

        file.write_all(buf).map_err(io_err)
    }
}

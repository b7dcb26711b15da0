use super::{
    ensure_dir, ensure_open, file_name, free_backup_path, next_deadline, open_append, parent_dir,
    prune_backups, rename, sync_and_release, system_clock, Rotator, SharedClock, TimePolicy,
};
use crate::core::error::Result;
use chrono::{DateTime, Local};
use regex::Regex;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Rotates on wall-clock boundaries. The live file keeps its name; backups
/// are `name.<period start>`.
pub struct TimeRotator {
    path: PathBuf,
    dir: PathBuf,
    prefix: String,
    file: Option<File>,
    policy: TimePolicy,
    retention: Regex,
    period_start: DateTime<Local>,
    rollover_at: DateTime<Local>,
    clock: SharedClock,
}

impl TimeRotator {
    pub fn new<P: AsRef<Path>>(path: P, policy: TimePolicy) -> Result<Self> {
        Self::with_clock(path, policy, system_clock())
    }

    pub fn with_clock<P: AsRef<Path>>(path: P, policy: TimePolicy, clock: SharedClock) -> Result<Self> {
        policy.validate()?;
        let path = path.as_ref().to_path_buf();
        let dir = parent_dir(&path);
        let prefix = format!("{}.", file_name(&path)?);
        ensure_dir(&dir)?;

        let now = clock.now();
        Ok(Self {
            retention: policy.suffix_format.regex()?,
            period_start: policy.when.truncate(now),
            rollover_at: next_deadline(policy.when, policy.interval_step, now),
            path,
            dir,
            prefix,
            file: None,
            policy,
            clock,
        })
    }

    pub fn rollover_at(&self) -> DateTime<Local> {
        self.rollover_at
    }

    pub fn policy(&self) -> &TimePolicy {
        &self.policy
    }
}

impl Rotator for TimeRotator {
    fn need_rollover(&mut self, _candidate: &[u8]) -> Result<bool> {
        Ok(self.clock.now() >= self.rollover_at)
    }

    fn do_rollover(&mut self) -> Result<()> {
        sync_and_release(self.file.take(), &self.path)?;

        if self.path.exists() {
            let stamp = self.policy.suffix_format.stamp(&self.period_start);
            let prefix = &self.prefix;
            let backup = free_backup_path(&self.dir, &stamp, |s| format!("{}{}", prefix, s))?;
            rename(&self.path, &backup)?;
        }
        if self.policy.backup_count > 0 {
            prune_backups(
                &self.dir,
                &self.prefix,
                &self.retention,
                self.policy.backup_count,
                None,
            )?;
        }

        let now = self.clock.now();
        self.period_start = self.policy.when.truncate(now);
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
}

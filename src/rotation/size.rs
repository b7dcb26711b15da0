use super::{
    ensure_dir, ensure_open, file_size, open_append, parent_dir, rename, sync_and_release, Rotator,
};
use crate::core::error::{LoggerError, Result};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Rotates by size into numbered backups `name.1` (newest) .. `name.N`.
pub struct SizeRotator {
    path: PathBuf,
    file: Option<File>,
    max_size: u64,
    backup_count: usize,
}

impl SizeRotator {
    /// # Errors
    ///
    /// `InvalidConfiguration` when `backup_count` is 0 or `max_size` is 0,
    /// IO errors when the directory cannot be created.
    pub fn new<P: AsRef<Path>>(path: P, max_size: u64, backup_count: usize) -> Result<Self> {
        if backup_count == 0 {
            return Err(LoggerError::config(
                "SizeRotator",
                "backup_count must be at least 1",
            ));
        }
        if max_size == 0 {
            return Err(LoggerError::config("SizeRotator", "max_size must be positive"));
        }
        let path = path.as_ref().to_path_buf();
        ensure_dir(&parent_dir(&path))?;

        Ok(Self {
            path,
            file: None,
            max_size,
            backup_count,
        })
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    pub fn backup_count(&self) -> usize {
        self.backup_count
    }
}

impl Rotator for SizeRotator {
    fn need_rollover(&mut self, candidate: &[u8]) -> Result<bool> {
        let size = file_size(ensure_open(&mut self.file, &self.path)?, &self.path)?;
        Ok(size + candidate.len() as u64 >= self.max_size)
    }

    fn do_rollover(&mut self) -> Result<()> {
        sync_and_release(self.file.take(), &self.path)?;

        // name.(N-1) -> name.N, ..., name.1 -> name.2; the old name.N is replaced
        for i in (1..self.backup_count).rev() {
            let from = self.backup_path(i);
            if from.exists() {
                rename(&from, &self.backup_path(i + 1))?;
            }
        }
        if self.path.exists() {
            let first = self.backup_path(1);
            if first.exists() {
                let _ = fs::remove_file(&first);
            }
            rename(&self.path, &first)?;
        }

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

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_zero_backups_rejected() {
        let dir = TempDir::new().unwrap();
        let err = SizeRotator::new(dir.path().join("app.log"), 100, 0)
            .err()
            .unwrap();
        assert!(matches!(err, LoggerError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_rollover_exactly_at_threshold() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let mut rotator = SizeRotator::new(&path, 30, 3).unwrap();
        let line = [b'x'; 10];

        assert!(!rotator.need_rollover(&line).unwrap());
        rotator.write(&line).unwrap();
        assert!(!rotator.need_rollover(&line).unwrap());
        rotator.write(&line).unwrap();
        // 20 + 10 reaches 30
        assert!(rotator.need_rollover(&line).unwrap());

        rotator.do_rollover().unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
        assert_eq!(fs::metadata(dir.path().join("app.log.1")).unwrap().len(), 20);
    }

    #[test]
    fn test_backups_shift_and_oldest_dropped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let mut rotator = SizeRotator::new(&path, 1_000, 2).unwrap();

        for generation in ["first", "second", "third"] {
            rotator.write(generation.as_bytes()).unwrap();
            rotator.do_rollover().unwrap();
        }
        rotator.close().unwrap();

        assert_eq!(fs::read_to_string(dir.path().join("app.log.1")).unwrap(), "third");
        assert_eq!(fs::read_to_string(dir.path().join("app.log.2")).unwrap(), "second");
        assert!(!dir.path().join("app.log.3").exists());
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_close_without_open_is_ok() {
        let dir = TempDir::new().unwrap();
        let mut rotator = SizeRotator::new(dir.path().join("app.log"), 10, 1).unwrap();
        rotator.close().unwrap();
        rotator.close().unwrap();
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/logs/app.log");
        let mut rotator = SizeRotator::new(&path, 10, 1).unwrap();
        rotator.write(b"hi").unwrap();
        assert!(path.exists());
    }
}

//! Buffered rotating file sink
//!
//! Producers format on their own thread and push finished lines onto a
//! bounded queue without blocking. A single writer thread owns the rotator,
//! coalesces queued lines into bulk writes and performs every file operation.

use super::Sink;
use crate::config::{FileSinkConfig, RotatorKind};
use crate::core::error::{panic_message, ErrorCallback, LoggerError, Result};
use crate::core::filter::Filter;
use crate::core::formatter::{Formatter, TextFormatter};
use crate::core::log_record::LogRecord;
use crate::rotation::{Rotator, SizeRotator, TimeAndSizeRotator, TimePolicy, TimeRotator};
use crossbeam_channel::{bounded, select, Receiver, Sender, TryRecvError, TrySendError};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const DEFAULT_QUEUE_SIZE: usize = 1024;
pub const DEFAULT_BULK_WRITE_SIZE: usize = 10 * 1024 * 1024;

const CLOSE_POLL_INTERVAL: Duration = Duration::from_millis(10);
const CLOSE_POLL_ATTEMPTS: u32 = 300;
const FLUSH_TIMEOUT: Duration = Duration::from_secs(3);

enum Control {
    Flush(Sender<Result<()>>),
    Close,
}

pub struct FileSink {
    name: String,
    path: PathBuf,
    formatter: Box<dyn Formatter>,
    filter: Option<Box<dyn Filter>>,
    queue: Option<Sender<Vec<u8>>>,
    queue_size: usize,
    control: Option<Sender<Control>>,
    handoff: Receiver<Box<dyn Rotator>>,
    writer: Option<JoinHandle<()>>,
}

#[must_use = "builder methods return a new value"]
pub struct FileSinkBuilder {
    rotator: Box<dyn Rotator>,
    name: Option<String>,
    formatter: Box<dyn Formatter>,
    filter: Option<Box<dyn Filter>>,
    queue_size: usize,
    bulk_write_size: usize,
    on_error: Option<ErrorCallback>,
}

impl FileSinkBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn formatter(mut self, formatter: impl Formatter + 'static) -> Self {
        self.formatter = Box::new(formatter);
        self
    }

    pub fn boxed_formatter(mut self, formatter: Box<dyn Formatter>) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn filter(mut self, filter: impl Filter + 'static) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    pub fn boxed_filter(mut self, filter: Option<Box<dyn Filter>>) -> Self {
        self.filter = filter;
        self
    }

    pub fn queue_size(mut self, size: usize) -> Self {
        self.queue_size = size;
        self
    }

    pub fn bulk_write_size(mut self, size: usize) -> Self {
        self.bulk_write_size = size;
        self
    }

    /// Receives write failures from the writer thread
    pub fn on_error(mut self, callback: ErrorCallback) -> Self {
        self.on_error = Some(callback);
        self
    }

    /// Spawn the writer thread
    pub fn build(self) -> Result<FileSink> {
        if self.queue_size == 0 {
            return Err(LoggerError::config("FileSink", "queue_size must be positive"));
        }
        if self.bulk_write_size == 0 {
            return Err(LoggerError::config("FileSink", "bulk_write_size must be positive"));
        }

        let path = self.rotator.path().to_path_buf();
        let name = self
            .name
            .unwrap_or_else(|| format!("file:{}", path.display()));
        let on_error = self
            .on_error
            .unwrap_or_else(crate::core::error::default_error_callback);

        let (queue_tx, queue_rx) = bounded::<Vec<u8>>(self.queue_size);
        let (control_tx, control_rx) = bounded::<Control>(1);
        let (handoff_tx, handoff_rx) = bounded::<Box<dyn Rotator>>(1);

        let writer = Writer {
            rotator: self.rotator,
            queue: queue_rx,
            bulk_write_size: self.bulk_write_size,
            on_error,
            sink_name: name.clone(),
        };
        let handle = thread::Builder::new()
            .name("log-file-writer".to_string())
            .spawn(move || writer.run(control_rx, handoff_tx))
            .map_err(|e| {
                LoggerError::io_operation(
                    "spawn writer thread",
                    format!("Failed to start writer for '{}'", path.display()),
                    e,
                )
            })?;

        Ok(FileSink {
            name,
            path,
            formatter: self.formatter,
            filter: self.filter,
            queue: Some(queue_tx),
            queue_size: self.queue_size,
            control: Some(control_tx),
            handoff: handoff_rx,
            writer: Some(handle),
        })
    }
}

impl FileSink {
    pub fn builder(rotator: impl Rotator + 'static) -> FileSinkBuilder {
        Self::builder_boxed(Box::new(rotator))
    }

    pub fn builder_boxed(rotator: Box<dyn Rotator>) -> FileSinkBuilder {
        FileSinkBuilder {
            rotator,
            name: None,
            formatter: Box::new(TextFormatter::default()),
            filter: None,
            queue_size: DEFAULT_QUEUE_SIZE,
            bulk_write_size: DEFAULT_BULK_WRITE_SIZE,
            on_error: None,
        }
    }

    /// Build the rotator described by `config` and start the sink
    pub fn from_config(
        config: &FileSinkConfig,
        formatter: Box<dyn Formatter>,
        filter: Option<Box<dyn Filter>>,
        on_error: ErrorCallback,
    ) -> Result<Self> {
        config.validate()?;
        let policy = TimePolicy {
            when: config.when,
            interval_step: config.interval_step,
            backup_count: config.backup_count,
            suffix_format: config.suffix_format.clone(),
        };
        let rotator: Box<dyn Rotator> = match config.rotator {
            RotatorKind::Size => Box::new(SizeRotator::new(
                config.live_path(),
                config.max_size,
                config.backup_count,
            )?),
            RotatorKind::Time => Box::new(TimeRotator::new(config.live_path(), policy)?),
            RotatorKind::TimeAndSize => Box::new(
                TimeAndSizeRotator::builder(&config.dir, &config.name)
                    .suffix(config.suffix.clone())
                    .max_size(config.max_size)
                    .policy(policy)
                    .concurrent_write(config.concurrent_write)
                    .build()?,
            ),
        };

        Self::builder_boxed(rotator)
            .name(format!("file:{}", config.name))
            .boxed_formatter(formatter)
            .boxed_filter(filter)
            .queue_size(config.queue_size)
            .bulk_write_size(config.bulk_write_size)
            .on_error(on_error)
            .build()
    }

    /// Live file path at construction time
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Lines waiting for the writer thread
    pub fn pending(&self) -> usize {
        self.queue.as_ref().map(|q| q.len()).unwrap_or(0)
    }

    pub fn is_closed(&self) -> bool {
        self.control.is_none()
    }
}

impl Sink for FileSink {
    fn emit(&mut self, record: &LogRecord) -> Result<()> {
        let Some(queue) = &self.queue else {
            return Err(LoggerError::LoggerStopped);
        };
        if let Some(filter) = &self.filter {
            if !filter.filter(record) {
                return Ok(());
            }
        }

        let mut line = self.formatter.format(record)?;
        line.push(b'\n');
        match queue.try_send(line) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(LoggerError::queue_full(queue.len(), self.queue_size)),
            Err(TrySendError::Disconnected(_)) => Err(LoggerError::LoggerStopped),
        }
    }

    /// Wait until everything queued so far is written and synced
    fn flush(&mut self) -> Result<()> {
        let Some(control) = &self.control else {
            return Ok(());
        };
        let (reply_tx, reply_rx) = bounded(1);
        control
            .send(Control::Flush(reply_tx))
            .map_err(|_| LoggerError::LoggerStopped)?;
        reply_rx.recv_timeout(FLUSH_TIMEOUT).map_err(|_| {
            LoggerError::other(format!("Flush of '{}' timed out", self.name))
        })?
    }

    fn close(&mut self) -> Result<()> {
        let Some(control) = self.control.take() else {
            return Ok(());
        };
        self.queue = None;
        let _ = control.send(Control::Close);

        for _ in 0..CLOSE_POLL_ATTEMPTS {
            match self.handoff.try_recv() {
                Ok(mut rotator) => {
                    if let Some(handle) = self.writer.take() {
                        let _ = handle.join();
                    }
                    return rotator.close();
                }
                Err(TryRecvError::Disconnected) => {
                    eprintln!(
                        "[LOGGER ERROR] Writer of '{}' exited without returning its file",
                        self.name
                    );
                    return Ok(());
                }
                Err(TryRecvError::Empty) => thread::sleep(CLOSE_POLL_INTERVAL),
            }
        }

        eprintln!(
            "[LOGGER WARNING] Writer of '{}' did not finish within {:?}. \
             Buffered records may be lost.",
            self.name,
            CLOSE_POLL_INTERVAL * CLOSE_POLL_ATTEMPTS
        );
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            eprintln!("[LOGGER ERROR] Failed to close '{}': {}", self.name, e);
        }
    }
}

struct Writer {
    rotator: Box<dyn Rotator>,
    queue: Receiver<Vec<u8>>,
    bulk_write_size: usize,
    on_error: ErrorCallback,
    sink_name: String,
}

impl Writer {
    fn run(mut self, control: Receiver<Control>, handoff: Sender<Box<dyn Rotator>>) {
        loop {
            select! {
                recv(self.queue) -> msg => match msg {
                    Ok(first) => self.write_batch(first),
                    Err(_) => break,
                },
                recv(control) -> msg => match msg {
                    Ok(Control::Flush(reply)) => {
                        self.drain();
                        let _ = reply.send(self.sync());
                    }
                    Ok(Control::Close) | Err(_) => break,
                },
            }
        }
        self.drain();
        let _ = handoff.send(self.rotator);
    }

    fn drain(&mut self) {
        while let Ok(first) = self.queue.try_recv() {
            self.write_batch(first);
        }
    }

    // One write per batch: the first line plus whatever else is already
    // queued, up to the bulk size
    fn write_batch(&mut self, first: Vec<u8>) {
        let mut batch = first;
        while batch.len() < self.bulk_write_size {
            match self.queue.try_recv() {
                Ok(more) => batch.extend_from_slice(&more),
                Err(_) => break,
            }
        }

        let rotator = &mut self.rotator;
        let result = catch_unwind(AssertUnwindSafe(|| rotator.write(&batch)));
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => (self.on_error)(&e),
            Err(payload) => (self.on_error)(&LoggerError::sink_panicked(
                self.sink_name.clone(),
                panic_message(payload.as_ref()),
            )),
        }
    }

    fn sync(&mut self) -> Result<()> {
        self.rotator.file()?.sync_data()?;
        Ok(())
    }
}

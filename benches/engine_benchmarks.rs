//! Criterion benchmarks for rust_log_engine

use chrono::{Local, TimeZone};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rust_log_engine::core::error::{LoggerError, Result};
use rust_log_engine::prelude::*;
use rust_log_engine::RenderOptions;
use std::sync::Arc;
use tempfile::TempDir;

/// Discards everything
struct NullSink;

impl Sink for NullSink {
    fn emit(&mut self, record: &LogRecord) -> Result<()> {
        black_box(record);
        Ok(())
    }
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
    fn name(&self) -> &str {
        "null"
    }
}

fn quiet() -> ErrorCallback {
    Arc::new(|_: &LoggerError| {})
}

fn sample_record() -> LogRecord {
    LogRecord::new("bench", LogLevel::Info, "user 42 logged in from 10.0.0.7")
        .with_timestamp(Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap())
        .with_caller(CallerInfo::new("src/server/auth.rs", "server::auth", 120))
        .with_trace_id("7f3a9c")
}

// ============================================================================
// Pattern Benchmarks
// ============================================================================

fn bench_pattern(c: &mut Criterion) {
    let mut group = c.benchmark_group("pattern");
    group.throughput(Throughput::Elements(1));
    let record = sample_record();
    let opts = RenderOptions::default();

    group.bench_function("compile_default", |b| {
        b.iter(|| black_box(PatternProgram::compile(black_box(PATTERN_DEFAULT))));
    });

    for (name, template) in [
        ("default", PATTERN_DEFAULT),
        ("simple", PATTERN_SIMPLE),
        ("trace", PATTERN_TRACE),
    ] {
        let program = PatternProgram::compile(template);
        let mut out = Vec::with_capacity(256);
        group.bench_function(format!("execute_{}", name), |b| {
            b.iter(|| {
                out.clear();
                program.execute(black_box(&record), &opts, &mut out);
                black_box(out.len())
            });
        });
    }

    group.finish();
}

// ============================================================================
// Logging Performance Benchmarks
// ============================================================================

fn bench_logging(c: &mut Criterion) {
    let mut group = c.benchmark_group("logging");
    group.throughput(Throughput::Elements(1));

    let logger = Logger::builder()
        .record_caller(false)
        .worker(WorkerSpec::new(NullSink).capacity(65_536))
        .on_error(quiet())
        .build()
        .unwrap();

    group.bench_function("filtered_out", |b| {
        b.iter(|| logger.debug(black_box("below threshold")));
    });

    group.bench_function("info_no_caller", |b| {
        b.iter(|| logger.info(black_box("Info message")));
    });

    let with_caller = Logger::builder()
        .worker(WorkerSpec::new(NullSink).capacity(65_536))
        .on_error(quiet())
        .build()
        .unwrap();

    group.bench_function("info_with_caller", |b| {
        b.iter(|| with_caller.info(black_box("Info message")));
    });

    group.finish();
    logger.stop();
    with_caller.stop();
}

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");
    group.throughput(Throughput::Elements(1));

    for workers in [1usize, 4] {
        let specs = (0..workers)
            .map(|_| WorkerSpec::new(NullSink).capacity(65_536))
            .collect();
        let engine = DispatchEngine::new(specs, quiet()).unwrap();
        group.bench_function(format!("{}_workers", workers), |b| {
            b.iter(|| {
                let _ = engine.send(LogRecord::new("bench", LogLevel::Info, "fan out"));
            });
        });
        engine.stop();
    }

    group.finish();
}

// ============================================================================
// File Sink Benchmarks
// ============================================================================

fn bench_file_sink(c: &mut Criterion) {
    let mut group = c.benchmark_group("file_sink");
    group.throughput(Throughput::Elements(1));

    let dir = TempDir::new().unwrap();
    let rotator = SizeRotator::new(dir.path().join("bench.log"), 64 * 1024 * 1024, 2).unwrap();
    let mut sink = FileSink::builder(rotator)
        .queue_size(65_536)
        .on_error(quiet())
        .build()
        .unwrap();
    let record = sample_record();

    group.bench_function("emit", |b| {
        b.iter(|| {
            let _ = sink.emit(black_box(&record));
        });
    });

    group.finish();
    let _ = sink.close();
}

criterion_group!(
    benches,
    bench_pattern,
    bench_logging,
    bench_fan_out,
    bench_file_sink
);
criterion_main!(benches);

//! Async logging example
//!
//! Demonstrates multi-threaded logging, backpressure policies and metrics.
//!
//! Run with: cargo run --example async_logging

use rust_log_engine::prelude::*;
use rust_log_engine::rotation::SizeRotator;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() -> Result<()> {
    println!("=== Rust Log Engine - Async Logging Example ===\n");

    let file = FileSink::builder(SizeRotator::new("async_test.log", 256 * 1024, 3)?)
        .formatter(TextFormatter::new(PATTERN_TRACE))
        .build()?;

    let logger = Logger::builder()
        .name("async-demo")
        .trace_id_fn(|| Some(format!("req-{}", rust_log_engine::core::log_record::current_thread_id())))
        // Never blocks producers; drops are counted and reported
        .worker(WorkerSpec::new(ConsoleSink::stdout()).capacity(64))
        // Never loses a record; producers wait when the file falls behind
        .worker(
            WorkerSpec::new(file)
                .capacity(1024)
                .backpressure(BackpressurePolicy::Block),
        )
        .on_error(Arc::new(|err: &LoggerError| {
            if !err.is_queue_full() {
                eprintln!("[demo] {}", err);
            }
        }))
        .build()?;

    println!("1. High-performance async logging:");
    for i in 0..100 {
        logger.info(format!("Message #{}", i));
    }
    println!("   Logged 100 messages asynchronously");

    println!("\n2. Multi-threaded logging:");
    let handles: Vec<_> = (0..5)
        .map(|thread_id| {
            let logger = logger.clone();
            thread::spawn(move || {
                for i in 0..20 {
                    logger.info(format!("Thread {} - Message {}", thread_id, i));
                    thread::sleep(Duration::from_millis(10));
                }
            })
        })
        .collect();
    for handle in handles {
        let _ = handle.join();
    }
    println!("   5 threads logged 20 messages each");

    logger.stop();

    let metrics = logger.metrics();
    println!("\n3. Metrics:");
    println!("   enqueued:  {}", metrics.enqueued());
    println!("   delivered: {}", metrics.delivered());
    println!("   dropped:   {} ({:.2}%)", metrics.dropped(), metrics.drop_rate());

    println!("\n=== Example completed successfully! ===");
    println!("Check 'async_test.log' for file output");

    Ok(())
}

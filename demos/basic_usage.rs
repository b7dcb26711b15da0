//! Basic logger usage example
//!
//! Demonstrates console logging, level thresholds and the formatting macros.
//!
//! Run with: cargo run --example basic_usage

use rust_log_engine::prelude::*;
use rust_log_engine::{info, warn};

fn main() -> Result<()> {
    println!("=== Rust Log Engine - Basic Usage Example ===\n");

    let logger = Logger::builder()
        .name("demo")
        .level(LogLevel::Debug)
        .worker(WorkerSpec::new(ConsoleSink::stdout()).threshold(LogLevel::Debug))
        .build()?;

    println!("1. Logging at different levels:");
    logger.debug("This is a debug message");
    logger.print("This is a print message");
    logger.info("This is an info message");
    logger.warn("This is a warning message");
    logger.error("This is an error message");

    println!("\n2. Raising the logger level to WARN:");
    logger.set_level(LogLevel::Warn);
    logger.info("Info message (hidden)");
    warn!(logger, "Disk usage at {}%", 91);

    println!("\n3. Child logger with structured fields:");
    let db = logger.named("db");
    db.set_level(LogLevel::Info);
    info!(db, "connected to {}", "postgres://localhost/app");
    db.log_with_context(
        LogLevel::Info,
        "query finished",
        LogContext::new().with_field("rows", 42).with_field("ms", 3.5),
    );

    logger.stop();
    println!("\n=== Example completed successfully! ===");
    Ok(())
}

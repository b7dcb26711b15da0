//! File logging example
//!
//! Demonstrates a console worker and a rotating file worker fed by the same
//! logger, configured from JSON.
//!
//! Run with: cargo run --example file_logging

use rust_log_engine::prelude::*;

const CONFIG: &str = r#"{
    "name": "file-demo",
    "level": "debug",
    "workers": [
        {
            "level": "info",
            "sink": { "type": "stdout" },
            "formatter": { "pattern": "%[LevelName]s %[DateTime]s %[ShortCaller]s %[Message]v", "colors": true }
        },
        {
            "level": "debug",
            "sink": {
                "type": "file",
                "dir": "logs",
                "name": "application",
                "rotator": "time_and_size",
                "when": "hour",
                "max_size": 1048576,
                "backup_count": 5
            }
        }
    ]
}"#;

fn main() -> Result<()> {
    println!("=== Rust Log Engine - File Logging Example ===\n");

    let logger = LoggerConfig::from_json(CONFIG)?.build()?;

    println!("1. Logging to both console and file:");
    logger.info("Application started");
    logger.debug("Loading configuration... (file only)");
    logger.info("Configuration loaded successfully");
    logger.warn("Using default settings for some options");
    logger.error("Failed to load optional plugin");

    println!("\n2. Performing some operations:");
    for i in 1..=5 {
        logger.info(format!("Processing item {}/5", i));
        if i == 3 {
            logger.warn("Item 3 took longer than expected");
        }
    }
    logger.info("All operations completed");

    // Drains both workers and syncs the file
    logger.stop();

    println!("\n=== Example completed successfully! ===");
    println!("Check 'logs/application.log' for the full log output");

    Ok(())
}

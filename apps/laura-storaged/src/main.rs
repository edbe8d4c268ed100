//! # laura-storaged
//!
//! Entry point for a non-networked host process around the storage engine:
//! loads config, opens the engine (running recovery), performs one
//! illustrative write and read through the library API, then checkpoints
//! and closes. No listener, no wire protocol, no REPL.

use std::error::Error;
use std::path::Path;
use storage_api::{EngineConfig, StorageEngine};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use wal::{WalRecord, WalRecordType};

const CONFIG_PATH: &str = "laura-storaged.toml";

fn main() {
    let cfg = match EngineConfig::load_from_file(CONFIG_PATH) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };

    let _logging_guard = match init_logging(&cfg.storage.logs_dir) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("failed to initialize logging: {e}");
            std::process::exit(2);
        }
    };

    let engine = match StorageEngine::open(&cfg) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!(error = %e, "failed to open storage engine");
            std::process::exit(1);
        }
    };

    if let Err(e) = run_demo(&engine) {
        tracing::error!(error = %e, "demo operation failed");
        std::process::exit(1);
    }

    if let Err(e) = engine.checkpoint() {
        tracing::warn!(error = %e, "checkpoint failed");
    }
    if let Err(e) = engine.close() {
        tracing::error!(error = %e, "failed to close storage engine cleanly");
        std::process::exit(1);
    }

    tracing::info!("shutdown complete");
}

/// Allocates a page, writes a small payload to it, logs the mutation ahead
/// of the page write, then re-fetches the page and logs what was read.
fn run_demo(engine: &StorageEngine) -> Result<(), storage_api::EngineError> {
    let pin = engine.new_page()?;
    let id = pin.id();
    const PAYLOAD: &[u8] = b"hello, laura";
    pin.write().payload_mut()[..PAYLOAD.len()].copy_from_slice(PAYLOAD);
    drop(pin);

    engine.log_operation(WalRecord::new(WalRecordType::Insert, 1, id.as_u32(), 0, PAYLOAD.to_vec()))?;
    engine.unpin(id, true)?;

    let pin = engine.fetch_page(id)?;
    let read_back = &pin.read().payload()[..PAYLOAD.len()];
    tracing::info!(page_id = id.as_u32(), payload = ?String::from_utf8_lossy(read_back), "demo round-trip complete");
    drop(pin);
    engine.unpin(id, false)?;

    Ok(())
}

/// Sets up console and daily-rolling-file logging.
fn init_logging(log_dir: &Path) -> Result<WorkerGuard, Box<dyn Error + Send + Sync>> {
    let file_appender = tracing_appender::rolling::daily(log_dir, "laura-storaged.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    let console_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false)
        .with_level(true)
        .compact();

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .json()
        .with_current_span(true)
        .with_span_list(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

pub mod browser;
pub mod config;
pub mod db;
pub mod errors;
pub mod instance;
pub mod models;
pub mod port;
pub mod process;
pub mod server;
pub mod startup;
#[cfg(feature = "tray")]
mod tray;

use crate::config::AppConfig;
use crate::startup::ExitStatus;
use std::path::Path;
use std::sync::Mutex;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: Mutex<Option<WorkerGuard>> = Mutex::new(None);

pub fn run() -> ExitStatus {
    let config = AppConfig::resolve();
    let logging = config
        .ensure_data_dir()
        .map_err(|error| error.to_string())
        .and_then(|()| init_tracing(&config.log_dir()));
    if let Err(error) = logging {
        eprintln!("warning: logging disabled: {}", error);
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        database = %config.database_path.display(),
        lock = %config.lock_path.display(),
        "starting"
    );
    let status = startup::run(config);
    tracing::info!(code = status.code(), "exiting");
    flush_logs();
    status
}

/// Drops the log writer guard so pending lines reach the file. Call before
/// `std::process::exit`; later events are discarded.
pub fn flush_logs() {
    let guard = match LOG_GUARD.lock() {
        Ok(mut slot) => slot.take(),
        Err(poisoned) => poisoned.into_inner().take(),
    };
    drop(guard);
}

fn store_log_guard(guard: WorkerGuard) {
    match LOG_GUARD.lock() {
        Ok(mut slot) => *slot = Some(guard),
        Err(poisoned) => *poisoned.into_inner() = Some(guard),
    }
}

fn init_tracing(log_dir: &Path) -> Result<(), String> {
    std::fs::create_dir_all(log_dir).map_err(|error| error.to_string())?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "benutzerverwaltung.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    store_log_guard(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| error.to_string())
}

#[cfg(test)]
mod tests {
    use super::{flush_logs, store_log_guard, LOG_GUARD};

    fn slot_is_empty() -> bool {
        LOG_GUARD.lock().map(|slot| slot.is_none()).unwrap_or(false)
    }

    #[test]
    fn flush_logs_drops_the_writer_guard() {
        let (_writer, guard) = tracing_appender::non_blocking(std::io::sink());
        store_log_guard(guard);
        assert!(!slot_is_empty());

        flush_logs();
        assert!(slot_is_empty());
        flush_logs();
        assert!(slot_is_empty());
    }
}

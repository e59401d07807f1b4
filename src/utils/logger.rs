use anyhow::{Context, Result};
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging system. With `log_file` set, output goes to that
/// file (ANSI colours off) in either format.
pub fn init_logger(level: &str, json_output: bool, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);

    match (json_output, log_file) {
        // JSON formatting for production
        (true, Some(path)) => registry
            .with(fmt::layer().json().with_ansi(false).with_writer(open_log_file(path)?))
            .try_init()?,
        (true, None) => registry.with(fmt::layer().json()).try_init()?,
        // Pretty formatting for development
        (false, Some(path)) => registry
            .with(fmt::layer().pretty().with_ansi(false).with_writer(open_log_file(path)?))
            .try_init()?,
        (false, None) => registry.with(fmt::layer().pretty()).try_init()?,
    }

    Ok(())
}

fn open_log_file(path: &Path) -> Result<Mutex<File>> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;
    Ok(Mutex::new(file))
}

/// Initialize logger from config
pub fn init_from_config(config: &crate::utils::config::LoggingConfig) -> Result<()> {
    let json = config.output == "json";
    let log_file = if !config.file_path.is_empty() {
        Some(Path::new(&config.file_path))
    } else {
        None
    };

    init_logger(&config.level, json, log_file)
}

//! Structured logging for hookfxr using tracing.
//!
//! Logs to `hookfxr.log` next to the launcher executable. The file is never
//! rotated and writes are blocking, so nothing spawns a thread while the
//! loader lock is held. Log level can be controlled via the `HOOKFXR_LOG` env
//! var.
//!
//! Falls back to stderr logging if the file appender cannot be created.

use fs_err as fs;
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const LOG_ENV: &str = "HOOKFXR_LOG";
pub const LOG_FILE_PREFIX: &str = "hookfxr";
pub const DEFAULT_FILTER: &str = "hostfxr=info,hookfxr_core=info";

pub fn init(log_dir: &Path) {
    let _ = fs::create_dir_all(log_dir);

    let env_filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // A host that already installed a subscriber keeps it.
    match create_file_appender(log_dir) {
        Ok(file_appender) => {
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(file_appender)
                        .with_timer(fmt::time::UtcTime::rfc_3339())
                        .with_ansi(false),
                )
                .try_init();
        }
        Err(_) => {
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_timer(fmt::time::UtcTime::rfc_3339())
                        .with_ansi(true),
                )
                .try_init();
        }
    }
}

fn create_file_appender(
    log_dir: &Path,
) -> Result<RollingFileAppender, tracing_appender::rolling::InitError> {
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .build(log_dir)
}

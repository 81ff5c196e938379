use std::path::Path;

use anyhow::Result;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_DIR: &str = ".logs";
const LOG_FILE_PREFIX: &str = "playhead";

/// Set up daily-rotating file logs. The binary owns the terminal for its
/// command loop, so nothing is written to stdout.
///
/// `RUST_LOG` overrides the default filter (`playhead=debug,warn`).
pub fn init(log_dir: Option<&str>) -> Result<()> {
    let dir = log_dir.unwrap_or(DEFAULT_LOG_DIR);
    let dir_path = Path::new(dir);
    if !dir_path.exists() {
        std::fs::create_dir_all(dir_path)?;
    }

    let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    // The guard must outlive the process or buffered lines are lost.
    Box::leak(Box::new(guard));

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("playhead=debug,warn"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();

    tracing::info!(dir, "logging initialized");
    Ok(())
}

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::error::LoadError;

const HEADER_LINE: &str = "-------------------------------------------------------------------------------";
const HEADER_TITLE: &str = "itemcore - item ownership engine";
const GAME_LOG: &str = "game.log";

/// Game log timestamps, UTC.
const GAME_TIME_FORMAT: &str = "%d.%m.%Y %H:%M:%S";
const HEADER_TIME_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

fn game_clock() -> ChronoUtc {
    ChronoUtc::new(GAME_TIME_FORMAT.to_string())
}

/// Installs the global subscriber. `RUST_LOG` wins over `level`. With a log
/// directory everything goes to `<dir>/game.log`, otherwise to stderr. A
/// second call leaves the first subscriber in place.
pub fn init(log_dir: Option<&Path>, level: &str) -> Result<(), LoadError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let installed = match log_dir {
        Some(dir) => {
            let file = open_game_log(dir)?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_timer(game_clock())
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .try_init()
        }
        None => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_timer(game_clock())
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };
    if installed.is_ok() {
        tracing::info!(level, "logging initialized");
    }
    Ok(())
}

/// Opens `<dir>/game.log` for appending, writing the header block when the
/// file is new.
pub fn open_game_log(dir: &Path) -> Result<File, LoadError> {
    std::fs::create_dir_all(dir).map_err(|source| LoadError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = game_log_path(dir);
    let io_error = |source: std::io::Error| LoadError::Io {
        path: path.clone(),
        source,
    };
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(io_error)?;
    if file.metadata().map(|m| m.len()).unwrap_or(0) == 0 {
        write_header(&mut file, GAME_LOG).map_err(io_error)?;
    }
    Ok(file)
}

fn game_log_path(dir: &Path) -> PathBuf {
    dir.join(GAME_LOG)
}

fn write_header(file: &mut File, name: &str) -> std::io::Result<()> {
    let timestamp = format_header_timestamp(Utc::now());
    writeln!(file, "{HEADER_LINE}")?;
    writeln!(file, "{HEADER_TITLE}")?;
    writeln!(file, "{name} - started {timestamp}")?;
    Ok(())
}

fn format_header_timestamp(at: DateTime<Utc>) -> String {
    at.format(HEADER_TIME_FORMAT).to_string()
}

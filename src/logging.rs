//! Subscriber setup for hosts embedding a queue provider
//!
//! The crate only emits `tracing` events; nothing here runs unless the host
//! asks for it. `init_logging` installs console output plus an optional
//! rolling file, filtered by `RUST_LOG` when set and by the configured level
//! otherwise.

use std::fs;
use std::path::Path;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::LoggingSettings;
use crate::error::{Error, Result};

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync>;

/// Keeps the background file writer alive; drop it last to flush
pub struct LogGuards {
    file_guard: Option<WorkerGuard>,
}

impl LogGuards {
    pub fn has_file_output(&self) -> bool {
        self.file_guard.is_some()
    }
}

/// Install the global subscriber described by `settings`
///
/// Fails if a subscriber is already installed.
pub fn init_logging(settings: &LoggingSettings) -> Result<LogGuards> {
    let level = parse_level(&settings.level);

    let (file_layer, file_guard) = match settings.file.as_deref() {
        Some(path) => {
            let (layer, guard) = build_file_layer(path, settings.max_files, settings.json_format)?;
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(build_env_filter(level)?)
        .with(format_layer(settings.json_format, std::io::stderr, true))
        .with(file_layer)
        .try_init()
        .map_err(already_installed)?;

    tracing::debug!(
        level = %level,
        file = ?settings.file,
        json = settings.json_format,
        "Logging initialized"
    );

    Ok(LogGuards { file_guard })
}

/// Console-only subscriber at a fixed level, for tests and small tools
pub fn init_simple(level: Level) -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(level.into()))
        .with(format_layer(false, std::io::stderr, true))
        .try_init()
        .map_err(already_installed)
}

/// Unknown names fall back to info; config validation rejects them earlier
fn parse_level(name: &str) -> Level {
    name.trim().parse().unwrap_or(Level::INFO)
}

/// `RUST_LOG` wins when set; this crate's own events always honour `level`
fn build_env_filter(level: Level) -> Result<EnvFilter> {
    let level_name = level.as_str().to_lowercase();
    let own_events = format!("{}={}", env!("CARGO_CRATE_NAME"), level_name)
        .parse()
        .map_err(|e| Error::Config(format!("Invalid log directive: {}", e)))?;

    let base = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level_name));
    Ok(base.add_directive(own_events))
}

fn format_layer<S, W>(json: bool, writer: W, ansi: bool) -> BoxedLayer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer().with_writer(writer).with_target(true);
    if json {
        Box::new(layer.json().with_current_span(true).with_thread_ids(true))
    } else {
        Box::new(layer.with_ansi(ansi).compact())
    }
}

/// Daily-rotated file output; `node.log` becomes `node.<date>.log`
fn build_file_layer<S>(path: &str, max_files: u32, json: bool) -> Result<(BoxedLayer<S>, WorkerGuard)>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let path = Path::new(path);
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(directory).map_err(|e| {
        Error::Config(format!(
            "Failed to create log directory '{}': {}",
            directory.display(),
            e
        ))
    })?;

    let prefix = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("peerqueue");
    let suffix = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("log");

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .filename_suffix(suffix)
        .max_log_files(max_files.max(1) as usize)
        .build(directory)
        .map_err(|e| Error::Config(format!("Failed to open log file in '{}': {}", directory.display(), e)))?;

    let (writer, guard) = tracing_appender::non_blocking(appender);
    Ok((format_layer(json, writer, false), guard))
}

fn already_installed(e: tracing_subscriber::util::TryInitError) -> Error {
    Error::Config(format!("Failed to initialize logging: {}", e))
}

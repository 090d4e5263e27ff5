//! Logging infrastructure using `tracing` and `tracing-subscriber`.
//!
//! The helper logs to stderr and, at the same time, appends to a log file in
//! the application data directory so failed updates can be diagnosed after
//! the fact. If the log file cannot be opened the helper keeps running with
//! stderr only.
//!
//! Verbosity flags and `RUST_LOG` only shape stderr. The file always records
//! the updater's own events down to debug level.
//!
//! # Log Levels
//!
//! - `error`: the update failed
//! - `warn`: recovered problems (survivors after termination, restart failures)
//! - `info`: state transitions and each observable action
//! - `debug`: installer output, archive details
//! - `trace`: everything else

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Configuration for logging behavior.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level filter.
    pub level_filter: LevelFilter,
    /// Honor `RUST_LOG` over `level_filter`.
    pub use_env_filter: bool,
    /// Whether to include timestamps in stderr output.
    pub with_timestamps: bool,
    /// Whether to include target (module path) in log output.
    pub with_target: bool,
    /// Whether to use ANSI colors on stderr.
    pub with_ansi: bool,
    /// Output format.
    pub format: LogFormat,
    /// Append-only log file, in addition to stderr.
    pub log_file: Option<PathBuf>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable pretty format with colors.
    #[default]
    Pretty,
    /// Compact single-line format.
    Compact,
    /// JSON format for machine parsing.
    Json,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level_filter: LevelFilter::INFO,
            use_env_filter: true,
            with_timestamps: false,
            with_target: true,
            with_ansi: true,
            format: LogFormat::default(),
            log_file: None,
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// Returns the log file that is actually being written, if any.
pub fn init_logging(config: &LogConfig) -> Option<PathBuf> {
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    layers.push(
        fmt_layer(
            config.format,
            io::stderr,
            config.with_ansi,
            config.with_timestamps,
            config.with_target,
        )
        .with_filter(build_env_filter(config))
        .boxed(),
    );

    let active_file = config.log_file.as_ref().and_then(|path| match open_log_file(path) {
        Ok(writer) => {
            layers.push(
                fmt_layer(config.format, writer, false, true, true)
                    .with_filter(file_filter())
                    .boxed(),
            );
            Some(path.clone())
        }
        Err(e) => {
            eprintln!(
                "warning: could not open log file {}: {e}; logging to stderr only",
                path.display()
            );
            None
        }
    });

    if let Err(e) = tracing_subscriber::registry().with(layers).try_init() {
        eprintln!("warning: failed to initialize logging: {e}");
    }
    active_file
}

fn open_log_file(path: &Path) -> io::Result<SharedFileWriter> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(SharedFileWriter::new(file))
}

fn fmt_layer<W>(
    format: LogFormat,
    writer: W,
    ansi: bool,
    timestamps: bool,
    target: bool,
) -> Box<dyn Layer<Registry> + Send + Sync>
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(writer)
            .with_target(target)
            .boxed(),
        LogFormat::Compact => {
            let layer = fmt::layer()
                .compact()
                .with_writer(writer)
                .with_ansi(ansi)
                .with_target(target);
            if timestamps {
                layer.boxed()
            } else {
                layer.without_time().boxed()
            }
        }
        LogFormat::Pretty => {
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(ansi)
                .with_target(target);
            if timestamps {
                layer.boxed()
            } else {
                layer.without_time().boxed()
            }
        }
    }
}

#[derive(Clone)]
struct SharedFileWriter {
    file: Arc<Mutex<std::fs::File>>,
}

impl SharedFileWriter {
    fn new(file: std::fs::File) -> Self {
        Self {
            file: Arc::new(Mutex::new(file)),
        }
    }
}

struct SharedFileGuard {
    file: Arc<Mutex<std::fs::File>>,
}

impl Write for SharedFileGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .file
            .lock()
            .map_err(|_| io::Error::other("log file lock poisoned"))?;
        guard.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = self
            .file
            .lock()
            .map_err(|_| io::Error::other("log file lock poisoned"))?;
        guard.flush()
    }
}

impl<'a> MakeWriter<'a> for SharedFileWriter {
    type Writer = SharedFileGuard;

    fn make_writer(&'a self) -> Self::Writer {
        SharedFileGuard {
            file: Arc::clone(&self.file),
        }
    }
}

/// Fixed filter for the log file, independent of stderr verbosity.
fn file_filter() -> EnvFilter {
    EnvFilter::new(FILE_FILTER)
}

const FILE_FILTER: &str = "warn,lumen_updater=debug,lumen_updater_helper=debug,update=debug";

/// Build an `EnvFilter` from the config, respecting `RUST_LOG` when allowed.
fn build_env_filter(config: &LogConfig) -> EnvFilter {
    let level = config.level_filter.to_string().to_lowercase();
    let fallback = || {
        // External crates stay at warn level to reduce noise
        EnvFilter::new(format!(
            "warn,lumen_updater={level},lumen_updater_helper={level},update={level}"
        ))
    };

    if config.use_env_filter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback())
    } else {
        fallback()
    }
}

//! CLI argument definitions for the update helper.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "lumen-updater-helper",
    version,
    about = "Install a Lumen update and restart the application",
    long_about = "Install a Lumen update and restart the application.\n\n\
                  Closes every running instance of <APP>, runs <INSTALLER>, records\n\
                  <VERSION> as the installed version and starts <APP> again."
)]
pub struct Cli {
    /// Installer package (executable or .zip/.tar.gz archive).
    #[arg(value_name = "INSTALLER")]
    pub installer: PathBuf,

    /// Application executable to close and restart.
    #[arg(value_name = "APP")]
    pub app: PathBuf,

    /// Version being installed (e.g. v93, 1.94, 1.95.2).
    #[arg(value_name = "VERSION")]
    pub target_version: String,

    /// Config file (default: $LUMEN_UPDATER_CONFIG or updater.json in the data directory).
    #[arg(long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the configured installer strategy.
    #[arg(long = "strategy", value_enum)]
    pub strategy: Option<StrategyArg>,

    /// Restart without waiting for confirmation.
    #[arg(long = "non-interactive", visible_alias = "yes")]
    pub non_interactive: bool,

    /// How status events are written.
    #[arg(long = "status-format", value_enum, default_value = "human")]
    pub status_format: StatusFormatArg,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for warnings only).
    #[command(flatten)]
    pub verbosity: Verbosity<InfoLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(long = "log-format", value_enum, default_value = "pretty")]
    pub log_format: LogFormatArg,

    /// Log file (default: logs/updater.log in the data directory).
    #[arg(long = "log-file", value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum StrategyArg {
    Direct,
    Wrapper,
    Archive,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum StatusFormatArg {
    /// Lines on stderr.
    Human,
    /// One JSON object per line on stdout.
    Jsonl,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

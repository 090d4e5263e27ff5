//! Lumen update helper.
//!
//! Spawned by the application with `<INSTALLER> <APP> <VERSION>`. Closes the
//! application, installs the update, records the version and restarts it.

use std::io::{self, IsTerminal};
use std::path::PathBuf;

use clap::{ColorChoice, Parser};
use lumen_updater::installer::strategy_from_config;
use lumen_updater::status::{ConsolePrompt, ConsoleReporter, FanoutReporter, JsonlReporter};
use lumen_updater::{
    AckMode, Orchestrator, ProcessController, StrategyConfig, SystemLauncher, UpdateRequest,
    UpdaterConfig, VersionRecord, VersionStore,
};
use tracing::level_filters::LevelFilter;

mod cli;
mod exit_codes;
mod logging;
mod status_file;

use crate::cli::{Cli, LogFormatArg, LogLevelArg, StatusFormatArg, StrategyArg};
use crate::exit_codes::ExitCode;
use crate::logging::{LogConfig, LogFormat, init_logging};
use crate::status_file::{STATUS_FILE_NAME, StatusFileReporter, UpdateStatus};

const LOG_DIR: &str = "logs";
const LOG_FILE_NAME: &str = "updater.log";

fn main() {
    let cli = Cli::parse();
    cli.color.write_global();

    let code = run(&cli);
    tracing::info!(code = code.as_i32(), name = code.code_name(), "Helper exiting");
    std::process::exit(code.as_i32());
}

fn run(cli: &Cli) -> ExitCode {
    let (mut config, source) = match UpdaterConfig::resolve(cli.config.as_deref()) {
        Ok(resolved) => resolved,
        Err(error) => {
            init_logging(&log_config_from_cli(cli, None));
            tracing::error!(%error, "Failed to load configuration");
            return ExitCode::ConfigError;
        }
    };

    let data_dir = config
        .data_dir()
        .unwrap_or_else(|_| std::env::temp_dir().join(&config.app_data_dir));
    let default_log = data_dir.join(LOG_DIR).join(LOG_FILE_NAME);
    let log_file = init_logging(&log_config_from_cli(cli, Some(default_log)));
    tracing::info!(
        source = %source,
        data_dir = %data_dir.display(),
        log_file = log_file.as_ref().map(|p| p.display().to_string()).unwrap_or_default(),
        "Update helper starting"
    );

    let status_path = data_dir.join(STATUS_FILE_NAME);
    if let Some(previous) = UpdateStatus::read_from(&status_path) {
        tracing::debug!(
            success = previous.success,
            version = %previous.version,
            timestamp = %previous.timestamp,
            "Replacing status from an earlier run"
        );
    }

    let request = match UpdateRequest::from_args([
        cli.installer.clone().into_os_string(),
        cli.app.clone().into_os_string(),
        cli.target_version.clone().into(),
    ]) {
        Ok(request) => request,
        Err(error) => {
            tracing::error!(%error, "Invalid update request");
            eprintln!("error: {error}");
            return ExitCode::from_error(&error);
        }
    };

    apply_overrides(cli, &mut config, io::stdin().is_terminal());

    let store = VersionStore::new(config.version_file_in(&data_dir));
    let previous_version = store.read().unwrap_or_else(|error| {
        tracing::warn!(%error, "Could not read the recorded version");
        None
    });
    let status_file = StatusFileReporter::new(
        status_path,
        request.target_version().to_string(),
        previous_version,
        log_file,
    );

    let orchestrator = build_orchestrator(cli, &config, store, status_file);
    let report = orchestrator.run(&request);
    ExitCode::from_report(&report)
}

fn apply_overrides(cli: &Cli, config: &mut UpdaterConfig, stdin_is_terminal: bool) {
    if let Some(strategy) = cli.strategy {
        let requested = match strategy {
            StrategyArg::Direct => StrategyConfig::default(),
            StrategyArg::Wrapper => StrategyConfig::wrapper(),
            StrategyArg::Archive => StrategyConfig::archive(),
        };
        // Keep configured arguments when the kind already matches.
        if config.strategy.label() != requested.label() {
            config.strategy = requested;
        }
    }
    if cli.non_interactive {
        config.interactive = false;
    } else if config.interactive && !stdin_is_terminal {
        // Nobody could press Enter; dismissing would skip the restart.
        tracing::warn!("stdin is not a terminal; restarting without confirmation");
        config.interactive = false;
    }
}

fn build_orchestrator(
    cli: &Cli,
    config: &UpdaterConfig,
    store: VersionStore,
    status_file: StatusFileReporter,
) -> Orchestrator {
    let reporter = match cli.status_format {
        StatusFormatArg::Human => FanoutReporter::new().with(ConsoleReporter::stderr()),
        StatusFormatArg::Jsonl => FanoutReporter::new().with(JsonlReporter::new(io::stdout())),
    }
    .with(status_file);
    let ack = if config.interactive {
        AckMode::Interactive(Box::new(ConsolePrompt::default()))
    } else {
        AckMode::NonInteractive
    };
    tracing::debug!(
        strategy = config.strategy.label(),
        store = %store.path().display(),
        interactive = config.interactive,
        "Components configured"
    );

    Orchestrator::new(
        Box::new(ProcessController::system(config.termination)),
        strategy_from_config(&config.strategy),
        Box::new(store),
        Box::new(reporter),
        Box::new(SystemLauncher),
    )
    .with_ack(ack)
    .with_restart_delay(config.restart_delay())
}

fn log_config_from_cli(cli: &Cli, default_log_file: Option<PathBuf>) -> LogConfig {
    let mut config = LogConfig {
        level_filter: cli.verbosity.tracing_level_filter(),
        ..LogConfig::default()
    };
    config.use_env_filter = !(cli.verbosity.is_present() || cli.log_level.is_some());
    if let Some(level) = cli.log_level {
        config.level_filter = match level {
            LogLevelArg::Error => LevelFilter::ERROR,
            LogLevelArg::Warn => LevelFilter::WARN,
            LogLevelArg::Info => LevelFilter::INFO,
            LogLevelArg::Debug => LevelFilter::DEBUG,
            LogLevelArg::Trace => LevelFilter::TRACE,
        };
    }
    config.format = match cli.log_format {
        LogFormatArg::Pretty => LogFormat::Pretty,
        LogFormatArg::Compact => LogFormat::Compact,
        LogFormatArg::Json => LogFormat::Json,
    };
    config.log_file = cli.log_file.clone().or(default_log_file);
    config.with_ansi = match cli.color.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => io::stderr().is_terminal(),
    };
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["lumen-updater-helper"];
        argv.extend_from_slice(args);
        argv.extend_from_slice(&["setup.exe", "App.exe", "v93"]);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_strategy_override_replaces_kind() {
        let cli = parse(&["--strategy", "archive"]);
        let mut config = UpdaterConfig::default();
        apply_overrides(&cli, &mut config, true);
        assert_eq!(config.strategy, StrategyConfig::archive());
        assert!(config.interactive);
    }

    #[test]
    fn test_strategy_override_keeps_matching_config() {
        let cli = parse(&["--strategy", "direct", "--non-interactive"]);
        let mut config = UpdaterConfig {
            strategy: StrategyConfig::Direct {
                args: vec!["/quiet".to_string()],
            },
            ..UpdaterConfig::default()
        };
        apply_overrides(&cli, &mut config, true);
        assert_eq!(
            config.strategy,
            StrategyConfig::Direct {
                args: vec!["/quiet".to_string()]
            }
        );
        assert!(!config.interactive);
    }

    #[test]
    fn test_without_terminal_stdin_defaults_to_non_interactive() {
        let cli = parse(&[]);
        let mut config = UpdaterConfig::default();
        assert!(config.interactive);

        apply_overrides(&cli, &mut config, false);
        assert!(!config.interactive);

        let mut config = UpdaterConfig::default();
        apply_overrides(&cli, &mut config, true);
        assert!(config.interactive);
    }

    #[test]
    fn test_log_level_flag_disables_env_filter() {
        let cli = parse(&["--log-level", "debug", "--log-format", "json"]);
        let config = log_config_from_cli(&cli, Some(PathBuf::from("updater.log")));
        assert_eq!(config.level_filter, LevelFilter::DEBUG);
        assert!(!config.use_env_filter);
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.log_file, Some(PathBuf::from("updater.log")));
    }

    #[test]
    fn test_explicit_log_file_wins() {
        let cli = parse(&["--log-file", "custom.log"]);
        let config = log_config_from_cli(&cli, Some(PathBuf::from("updater.log")));
        assert_eq!(config.log_file, Some(PathBuf::from("custom.log")));
        assert!(config.use_env_filter);
    }
}

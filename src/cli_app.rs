//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use loadgraph::chart::registry::ChartRegistry;
use loadgraph::core::config::Config;
use loadgraph::core::errors::LgError;
use loadgraph::daemon::scheduler::{TickOutcome, Ticker, UpdateScheduler};
use loadgraph::daemon::signals::SignalHandler;
use loadgraph::logger::activity::{ActivityLoggerHandle, spawn_logger};
use loadgraph::logger::jsonl::JsonlConfig;
use loadgraph::monitor::fetcher::{HttpStatsFetcher, StatsSource};
use loadgraph::monitor::router::SnapshotRouter;
use loadgraph::tui::theme::Theme;
use loadgraph::tui::{DashboardRuntimeConfig, run_dashboard};

/// Live charts for a running load test.
#[derive(Debug, Parser)]
#[command(
    name = "loadgraph",
    author,
    version,
    about = "Live load-test dashboard fed by a stats endpoint",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Live terminal charts.
    Dashboard(DashboardArgs),
    /// Poll without a display, one line per tick.
    Watch(WatchArgs),
    /// Fetch once and print the points that would be appended.
    Snapshot(SourceArgs),
    /// Inspect configuration.
    Config(ConfigArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args, Default)]
struct SourceArgs {
    /// Stats endpoint URL (overrides `source.url`).
    #[arg(long, value_name = "URL")]
    url: Option<String>,
}

#[derive(Debug, Clone, Args, Default)]
struct DashboardArgs {
    #[command(flatten)]
    source: SourceArgs,
    /// Poll interval in milliseconds (overrides `schedule.poll_interval_ms`; must exceed `source.timeout_ms`).
    #[arg(long, value_name = "MS")]
    interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Args, Default)]
struct WatchArgs {
    #[command(flatten)]
    source: SourceArgs,
    /// Poll interval in milliseconds (overrides `schedule.poll_interval_ms`; must exceed `source.timeout_ms`).
    #[arg(long, value_name = "MS")]
    interval_ms: Option<u64>,
    /// Stop after this many ticks.
    #[arg(long, value_name = "N")]
    ticks: Option<u64>,
}

#[derive(Debug, Clone, Args, Default)]
struct ConfigArgs {
    /// Config operation to run.
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print resolved config file path.
    Path,
    /// Print effective merged configuration.
    Show,
    /// Validate configuration and exit.
    Validate,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completion script for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input or configuration.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// Internal bug or invariant violation.
    #[error("{0}")]
    Internal(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Internal(_) | Self::Json(_) => 3,
        }
    }
}

impl From<LgError> for CliError {
    fn from(err: LgError) -> Self {
        let message = err.to_string();
        if err.is_configuration() {
            Self::User(message)
        } else if matches!(err, LgError::UnknownSeries { .. }) {
            Self::Internal(message)
        } else {
            Self::Runtime(message)
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Dashboard(args) => run_dashboard_command(cli, args),
        Command::Watch(args) => run_watch(cli, args),
        Command::Snapshot(args) => run_snapshot(cli, args),
        Command::Config(args) => run_config(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

// ──────────────────── config loading ────────────────────

/// Load the config and apply per-command flag overrides, then re-validate.
fn load_config(
    cli: &Cli,
    source: &SourceArgs,
    interval_ms: Option<u64>,
) -> Result<Config, CliError> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(url) = &source.url {
        config.source.url.clone_from(url);
    }
    if let Some(ms) = interval_ms {
        config.schedule.poll_interval_ms = ms;
    }
    config.validate()?;
    Ok(config)
}

/// Start the activity logger, or run without one when the log cannot be opened.
fn start_logger(config: &Config) -> (ActivityLoggerHandle, Option<std::thread::JoinHandle<()>>) {
    match spawn_logger(JsonlConfig::for_path(config.paths.jsonl_log.clone())) {
        Ok((handle, join)) => (handle, Some(join)),
        Err(e) => {
            eprintln!("[LG-LOG] activity log disabled: {e}");
            (ActivityLoggerHandle::disabled(), None)
        }
    }
}

fn stop_logger(handle: &ActivityLoggerHandle, join: Option<std::thread::JoinHandle<()>>) {
    handle.shutdown();
    if let Some(join) = join {
        let _ = join.join();
    }
    let dropped = handle.dropped_events();
    if dropped > 0 {
        eprintln!("[LG-LOG] {dropped} activity events were dropped");
    }
}

// ──────────────────── dashboard ────────────────────

fn run_dashboard_command(cli: &Cli, args: &DashboardArgs) -> Result<(), CliError> {
    if !io::stdout().is_terminal() {
        return Err(CliError::User(
            "dashboard needs an interactive terminal; use `loadgraph watch` instead".to_string(),
        ));
    }

    let config = load_config(cli, &args.source, args.interval_ms)?;
    let hash = config.stable_hash()?;
    let (logger, join) = start_logger(&config);
    let mut scheduler = match UpdateScheduler::from_config(&config, logger.clone()) {
        Ok(scheduler) => scheduler,
        Err(e) => {
            stop_logger(&logger, join);
            return Err(e.into());
        }
    };
    let signals = SignalHandler::new();

    let runtime = DashboardRuntimeConfig {
        interval: config.poll_interval(),
        theme: Theme::from_flags(cli.no_color),
    };

    scheduler.log_start(&hash);
    let result = run_dashboard(&mut scheduler, &runtime, || signals.should_shutdown());
    let reason = match &result {
        Ok(reason) => reason.as_str().to_string(),
        Err(e) => format!("error: {e}"),
    };
    scheduler.log_stop(&reason);
    stop_logger(&logger, join);

    result?;
    let stats = scheduler.stats();
    match output_mode(cli) {
        OutputMode::Human => {
            println!(
                "Stopped after {} ticks, {} points appended ({} skipped).",
                stats.ticks,
                stats.points_appended,
                stats.skipped()
            );
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "dashboard",
                "reason": reason,
                "stats": stats,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

// ──────────────────── watch ────────────────────

fn run_watch(cli: &Cli, args: &WatchArgs) -> Result<(), CliError> {
    let config = load_config(cli, &args.source, args.interval_ms)?;
    let hash = config.stable_hash()?;
    let mode = output_mode(cli);
    let (logger, join) = start_logger(&config);
    let mut scheduler = match UpdateScheduler::from_config(&config, logger.clone()) {
        Ok(scheduler) => scheduler,
        Err(e) => {
            stop_logger(&logger, join);
            return Err(e.into());
        }
    };
    let signals = SignalHandler::new();

    if mode == OutputMode::Human {
        println!(
            "Watching {} every {} ms",
            scheduler.source().describe(),
            config.schedule.poll_interval_ms
        );
    }

    scheduler.log_start(&hash);
    let mut ticker = Ticker::new(config.poll_interval());
    let result = scheduler.run_headless(
        &mut ticker,
        args.ticks,
        || signals.should_shutdown(),
        |sched, outcome| {
            let tick = sched.stats().ticks;
            match mode {
                OutputMode::Human => {
                    println!("{}", watch_line(tick, outcome, sched.store().total_points()));
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "watch",
                        "tick": tick,
                        "result": outcome,
                        "total_points": sched.store().total_points(),
                    });
                    if let Err(e) = write_json_line(&payload) {
                        return Err(LgError::Runtime {
                            details: e.to_string(),
                        });
                    }
                }
            }
            Ok(())
        },
    );

    if signals.should_shutdown() {
        eprintln!(
            "[LG-SCHED] shutdown requested after {} ticks",
            scheduler.stats().ticks
        );
    }
    let reason = match &result {
        Ok(_) if signals.should_shutdown() => "signal".to_string(),
        Ok(_) => "tick limit".to_string(),
        Err(e) => format!("error: {e}"),
    };
    scheduler.log_stop(&reason);
    stop_logger(&logger, join);

    let completed = result?;
    let stats = scheduler.stats();
    match mode {
        OutputMode::Human => {
            println!(
                "Done: {completed} ticks, {} applied, {} ignored, {} skipped, {} points.",
                stats.applied,
                stats.ignored,
                stats.skipped(),
                stats.points_appended
            );
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "watch",
                "reason": reason,
                "stats": stats,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn watch_line(tick: u64, outcome: &TickOutcome, total_points: usize) -> String {
    let padded = format!("{:<8}", outcome.label());
    let label = match outcome {
        TickOutcome::Applied { .. } => padded.green(),
        TickOutcome::Ignored { .. } => padded.yellow(),
        TickOutcome::Skipped { .. } => padded.red(),
    };
    let detail = match outcome {
        TickOutcome::Applied { phase, points } => format!("phase={phase} points={points}"),
        TickOutcome::Ignored { phase } => format!("phase={phase} (not charted)"),
        TickOutcome::Skipped { message, .. } => message.clone(),
    };
    format!("tick {tick:>4} {label} {detail}  total={total_points}")
}

// ──────────────────── snapshot ────────────────────

fn run_snapshot(cli: &Cli, args: &SourceArgs) -> Result<(), CliError> {
    let config = load_config(cli, args, None)?;
    let registry = ChartRegistry::from_config(&config.chart)?;
    let fetcher = HttpStatsFetcher::from_config(&config.source)?;
    let router = SnapshotRouter::from_config(&config.source);

    let snapshot = fetcher.fetch()?;
    let instructions = router.route(&snapshot, &registry)?;
    let charted = registry.is_recognized(&snapshot.phase);

    match output_mode(cli) {
        OutputMode::Human => {
            println!("Source: {}", fetcher.url());
            if charted {
                println!("Phase: {}", snapshot.phase);
            } else {
                println!("Phase: {} (not charted; nothing to append)", snapshot.phase);
            }
            for instruction in &instructions {
                println!(
                    "  {:<24} x={:<10} y={}",
                    instruction.metric_key, instruction.x, instruction.y
                );
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "snapshot",
                "url": fetcher.url(),
                "phase": snapshot.phase,
                "charted": charted,
                "instructions": instructions,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

// ──────────────────── config ────────────────────

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match &args.command {
        None | Some(ConfigCommand::Path) => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            let exists = path.exists();

            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{}", path.display());
                    if !exists {
                        println!("  (file does not exist; defaults will be used)");
                    }
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config path",
                        "path": path.to_string_lossy(),
                        "exists": exists,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config = Config::load(cli.config.as_deref())?;

            match output_mode(cli) {
                OutputMode::Human => {
                    let toml_str = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::Runtime(format!("serialize config: {e}")))?;
                    println!("{toml_str}");
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config show",
                        "config": serde_json::to_value(&config)?,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Validate) => match Config::load(cli.config.as_deref()) {
            Ok(config) => {
                let hash = config.stable_hash()?;
                let figures = ChartRegistry::from_config(&config.chart)?.figure_count();

                match output_mode(cli) {
                    OutputMode::Human => {
                        println!("Configuration is valid.");
                        println!("  Source: {}", config.paths.config_file.display());
                        println!("  Figures: {figures}");
                        println!("  Hash: {hash}");
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": true,
                            "path": config.paths.config_file.to_string_lossy(),
                            "figures": figures,
                            "hash": hash,
                        });
                        write_json_line(&payload)?;
                    }
                }
                Ok(())
            }
            Err(e) => {
                match output_mode(cli) {
                    OutputMode::Human => {
                        eprintln!("Configuration is INVALID: {e}");
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": false,
                            "code": e.code(),
                            "error": e.to_string(),
                        });
                        write_json_line(&payload)?;
                    }
                }
                Err(CliError::User(format!("invalid config: {e}")))
            }
        },
    }
}

// ──────────────────── output ────────────────────

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("LG_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}

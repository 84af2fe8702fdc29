// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{info, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::path::PathBuf;

use reelsmith::app_config::{self, Config};
use reelsmith::app_controller::Controller;
use reelsmith::database::JobStatus;
use reelsmith::pipeline::GenerationResult;

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a video from a creative brief
    Run {
        /// Creative brief describing the video
        #[arg(short, long)]
        brief: String,

        /// JSON file with generation settings (defaults come from the config)
        #[arg(short, long, value_name = "FILE")]
        settings: Option<PathBuf>,

        /// User the job belongs to
        #[arg(short, long, default_value = "local")]
        user: String,

        /// Use the built-in mock studio instead of the generation service
        #[arg(long)]
        dry_run: bool,
    },

    /// Resume a job from a given step
    Resume {
        #[arg(value_name = "JOB_ID")]
        job_id: String,

        /// Step number (1-8) to resume from
        #[arg(long)]
        from_step: u8,

        #[arg(long)]
        dry_run: bool,
    },

    /// Print the status of a job as JSON
    Status {
        #[arg(value_name = "JOB_ID")]
        job_id: String,
    },

    /// List jobs, most recently updated first
    Jobs {
        /// Only show jobs with this status (queued, in_progress, completed, failed)
        #[arg(long)]
        status: Option<JobStatus>,
    },

    /// Delete jobs older than the given number of days
    Cleanup {
        #[arg(long, default_value_t = 30)]
        days: i64,
    },

    /// Generate shell completions for reelsmith
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Reelsmith - brief-to-video generation pipeline
///
/// Turns a short creative brief into a rendered video through a resumable
/// sequence of generation steps.
#[derive(Parser, Debug)]
#[command(name = "reelsmith")]
#[command(version)]
#[command(about = "Brief-to-video generation pipeline")]
#[command(long_about = "Reelsmith turns a creative brief into a rendered video.

EXAMPLES:
    reelsmith run --brief \"forest rain at dusk\"          # Run with the configured defaults
    reelsmith run --brief \"city loop\" -s settings.json   # Run with per-job settings
    reelsmith run --brief \"test\" --dry-run               # Run against the built-in mock studio
    reelsmith resume 0f3c9a2e-... --from-step 5          # Resume a failed job from the soundscape step
    reelsmith jobs --status failed                       # List failed jobs
    reelsmith completions bash > reelsmith.bash          # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config. If the config file doesn't exist, a default one
    will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", global = true)]
    config: PathBuf,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color code for log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "1;31",
            Level::Warn => "1;33",
            Level::Info => "1;32",
            Level::Debug => "1;36",
            Level::Trace => "1;35",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let color = Self::color_for_level(record.level());

            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "\x1B[{}m{} {:<5} {}\x1B[0m",
                color,
                now,
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // The logger accepts everything; the effective level is set through max_level
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(shell, &mut cmd, "reelsmith", &mut std::io::stdout());
        return Ok(());
    }

    // If log level is set via command line, apply it immediately
    if let Some(level) = cli.log_level {
        log::set_max_level(app_config::LogLevel::from(level).to_level_filter());
    }

    let mut config = Config::load_or_create(&cli.config)?;
    match cli.log_level {
        Some(level) => config.log_level = level.into(),
        None => log::set_max_level(config.log_level.to_level_filter()),
    }

    match cli.command {
        Commands::Run {
            brief,
            settings,
            user,
            dry_run,
        } => {
            let settings = settings
                .as_deref()
                .map(Controller::load_settings)
                .transpose()?;
            let controller = Controller::with_config(config, dry_run)?;
            let result = controller.run(&brief, settings, &user).await;
            report(&result)
        }
        Commands::Resume {
            job_id,
            from_step,
            dry_run,
        } => {
            let controller = Controller::with_config(config, dry_run)?;
            let result = controller.resume(&job_id, from_step).await;
            report(&result)
        }
        Commands::Status { job_id } => {
            let controller = Controller::with_config(config, true)?;
            let status = controller
                .status(&job_id)
                .await?
                .with_context(|| format!("Job not found: {}", job_id))?;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
        Commands::Jobs { status } => {
            let controller = Controller::with_config(config, true)?;
            let jobs = controller.list_jobs(status).await?;
            if jobs.is_empty() {
                info!("No jobs found");
            }
            for job in jobs {
                println!("{}", job);
            }
            Ok(())
        }
        Commands::Cleanup { days } => {
            let controller = Controller::with_config(config, true)?;
            controller.cleanup(days).await?;
            Ok(())
        }
        Commands::Completions { .. } => Ok(()),
    }
}

/// Print the result as JSON and turn a failed run into a non-zero exit
fn report(result: &GenerationResult) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(result)?);
    if result.success {
        Ok(())
    } else {
        Err(anyhow::anyhow!(
            "{}",
            result.error.clone().unwrap_or_else(|| "generation failed".to_string())
        ))
    }
}

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use interview_core::Config;

pub const LOG_ENV: &str = "INTERVIEW_LOG";
const LOG_FILE: &str = "interview.log";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// The TUI owns the terminal, so logs go to `<config dir>/interview-practice/logs`.
/// Keep the guard alive until exit or buffered lines are lost.
pub fn init_file() -> Result<WorkerGuard> {
    let dir = Config::app_dir()?.join("logs");
    std::fs::create_dir_all(&dir)?;

    let appender = tracing_appender::rolling::never(&dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false),
        )
        .try_init()?;

    Ok(guard)
}

/// Plain subcommands log to stderr so stdout stays clean for piping.
pub fn init_stderr() -> Result<()> {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init()?;
    Ok(())
}

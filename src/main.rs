use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};

use interview_core::questions::{ALL_ANSWERED, NO_QUESTIONS};
use interview_core::{
    is_valid_role, role_suggestions, BackendClient, Config, QuestionSession, RoleQuestionTable,
};

mod app;
mod handler;
mod logging;
mod tui;
mod ui;

use app::App;
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "interview")]
#[command(about = "Practice job interviews against an AI interviewer, by keyboard or voice")]
#[command(version)]
struct Cli {
    /// Interviewer backend base URL (overrides config and INTERVIEW_BACKEND_URL)
    #[arg(long, global = true)]
    backend_url: Option<String>,

    /// Disable speech synthesis and recognition
    #[arg(long, global = true)]
    no_speech: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List roles with built-in questions and the suggested job titles
    Roles,
    /// Draw practice questions for a role without a backend
    Questions {
        /// Role to draw questions for
        #[arg(short, long)]
        role: String,
        /// How many questions to draw
        #[arg(short, long, default_value = "4")]
        count: usize,
        /// Seed for a repeatable order
        #[arg(short, long)]
        seed: Option<u64>,
    },
    /// Check whether text is accepted as a job role
    CheckRole {
        /// Text to check
        text: String,
    },
    /// Ask the backend whether it is up
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load().unwrap_or_else(|err| {
        eprintln!("Ignoring unreadable config: {err}");
        Config::new()
    });
    // The flag beats the environment, which beats the config file.
    let backend_url = cli
        .backend_url
        .unwrap_or_else(|| config.resolved_backend_url());
    if cli.no_speech {
        config.speech.enabled = false;
    }

    match cli.command {
        None => run_tui(config, &backend_url).await,
        Some(command) => {
            logging::init_stderr()?;
            match command {
                Commands::Roles => list_roles(),
                Commands::Questions { role, count, seed } => draw_questions(&role, count, seed),
                Commands::CheckRole { text } => check_role(&text),
                Commands::Health => check_health(&config, &backend_url).await,
            }
        }
    }
}

fn build_backend(config: &Config, url: &str) -> Result<BackendClient> {
    BackendClient::with_timeout(url, Duration::from_secs(config.request_timeout_secs))
        .with_context(|| format!("Could not build HTTP client for {url}"))
}

async fn run_tui(config: Config, backend_url: &str) -> Result<()> {
    let _guard = match logging::init_file() {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("Logging disabled: {err}");
            None
        }
    };

    let backend = build_backend(&config, backend_url)?;
    info!(backend = backend.base_url(), "starting interview practice");

    let mut app = App::new(&config, backend);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new(Duration::from_millis(300));

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;

            if let Some(event) = events.next().await {
                handler::handle_event(&mut app, event).await;
            }
        }
        Ok::<_, anyhow::Error>(())
    }
    .await;

    app.shutdown().await;
    tui::restore()?;

    if let Err(err) = &result {
        warn!("interface loop failed: {err:#}");
    }
    result
}

fn list_roles() -> Result<()> {
    println!("Roles with built-in questions:");
    for role in RoleQuestionTable::builtin().roles() {
        println!("  {role}");
    }

    println!("\nSuggested job titles:");
    for role in role_suggestions() {
        println!("  {role}");
    }
    Ok(())
}

fn draw_questions(role: &str, count: usize, seed: Option<u64>) -> Result<()> {
    let table = RoleQuestionTable::builtin();
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut session = QuestionSession::new();
    session.reset(role);

    for n in 1..=count {
        let question = session.pick_next(&table, &mut rng);
        if question == NO_QUESTIONS || question == ALL_ANSWERED {
            println!("{question}");
            break;
        }
        println!("{n}. {question}");
    }
    Ok(())
}

fn check_role(text: &str) -> Result<()> {
    if is_valid_role(text) {
        println!("\"{}\" looks like a job role.", text.trim());
    } else {
        println!("\"{}\" does not look like a job role.", text.trim());
        std::process::exit(1);
    }
    Ok(())
}

async fn check_health(config: &Config, backend_url: &str) -> Result<()> {
    let backend = build_backend(config, backend_url)?;
    let health = backend
        .health()
        .await
        .with_context(|| format!("Backend at {} is not reachable", backend.base_url()))?;

    println!(
        "{}: {} ({} active sessions)",
        backend.base_url(),
        health.status,
        health.active_sessions
    );
    Ok(())
}

//! Main Entrypoint for the Walkthrough CLI
//!
//! Loads configuration, initializes logging, and runs one subcommand:
//! listing lessons, printing tool definitions, checking the credential
//! backend, or replaying a recorded session offline.

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use walkthrough_core::{lesson, tools};
use walkthrough_realtime::{ConnectError, CredentialSource, HttpCredentialExchange};
use walkthrough_service::{config::Config, replay};

#[derive(Parser)]
#[command(name = "walkthrough")]
#[command(about = "Voice-guided algorithm walkthroughs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the lessons in LESSONS_PATH
    Lessons,
    /// Print the tool definitions advertised to the voice agent
    Tools,
    /// Request a session credential for a lesson from the backend
    Token {
        /// Lesson identifier
        slug: String,
    },
    /// Replay recorded control-channel messages against a lesson
    Replay {
        /// Path to the lesson markdown file
        #[arg(long)]
        lesson: PathBuf,

        /// Path to a JSON Lines file of inbound messages
        #[arg(long)]
        script: PathBuf,

        /// Visible code rows
        #[arg(long, default_value_t = replay::DEFAULT_ROWS)]
        rows: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    // --- 3. Run Command ---
    match cli.command {
        Commands::Lessons => {
            let lessons = lesson::load_all(&config.lessons_path)?;
            info!(path = %config.lessons_path.display(), count = lessons.len(), "Loaded lessons");
            for lesson in lessons {
                println!(
                    "{:<28} {:<32} {:<8} {:>3} lines  ~{} min",
                    lesson.slug,
                    lesson.title,
                    lesson.difficulty,
                    lesson.line_count,
                    lesson.estimated_minutes
                );
            }
        }
        Commands::Tools => {
            println!("{}", serde_json::to_string_pretty(&tools::definitions())?);
        }
        Commands::Token { slug } => {
            let exchange = HttpCredentialExchange::new(config.credential_url.clone());
            match exchange.issue(&slug).await {
                Ok(credential) => match credential.expires_at {
                    Some(expires_at) => {
                        let expires = expires_at.to_rfc3339();
                        println!("Credential issued for {slug}, expires {expires}")
                    }
                    None => println!("Credential issued for {slug}"),
                },
                Err(e) => bail!(ConnectError::from(e).user_message()),
            }
        }
        Commands::Replay { lesson, script, rows } => {
            let slug = lesson
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get lesson file stem")?
                .to_string();
            let source = std::fs::read_to_string(&lesson)
                .with_context(|| format!("Failed to read lesson {}", lesson.display()))?;
            let lesson = lesson::Lesson::parse(&slug, &source)?;
            let script = replay::load_script(&script)?;

            let opening = &config.opening_instruction;
            let report =
                replay::replay(&lesson, script, opening, rows, std::io::stdout()).await?;

            println!();
            for entry in report.page.transcript.entries() {
                println!("{}: {}", entry.role.label(), entry.text);
            }
            println!(
                "\n{} | tool results: {} | turn requests: {} | remote errors: {}",
                report.page.status_text,
                report.tool_results,
                report.turn_requests,
                report.page.remote_errors
            );
        }
    }

    Ok(())
}

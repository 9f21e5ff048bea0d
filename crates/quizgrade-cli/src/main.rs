//! quizgrade CLI: offline quiz validation, grading, and grade reduction.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "quizgrade", version, about = "Quiz scoring and grade reduction")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate quiz TOML files
    Validate {
        /// Path to quiz file or directory
        #[arg(long)]
        quiz: PathBuf,
    },

    /// Grade one set of answers against a quiz
    Grade {
        /// Quiz TOML file
        #[arg(long)]
        quiz: PathBuf,

        /// Answers JSON file (array of submissions)
        #[arg(long)]
        answers: PathBuf,

        /// Student identifier recorded on the attempt
        #[arg(long, default_value = "student")]
        student: String,

        /// Grading time as RFC 3339 (default: now)
        #[arg(long)]
        at: Option<String>,

        /// Output format: text, json, markdown
        #[arg(long, default_value = "text")]
        format: String,

        /// Also write the JSON report here
        #[arg(long)]
        output: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Reduce stored attempts to one score per student
    Reduce {
        /// Attempts JSON file (array of attempts)
        #[arg(long)]
        attempts: PathBuf,

        /// Reduction method: highest, latest, average, first
        #[arg(long, default_value = "highest")]
        method: String,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Create starter config and example quiz
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("quizgrade=info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { quiz } => commands::validate::execute(quiz),
        Commands::Grade {
            quiz,
            answers,
            student,
            at,
            format,
            output,
            config,
        } => commands::grade::execute(quiz, answers, student, at, format, output, config).await,
        Commands::Reduce {
            attempts,
            method,
            format,
        } => commands::reduce::execute(attempts, method, format),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

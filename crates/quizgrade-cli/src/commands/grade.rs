//! The `quizgrade grade` command.
//!
//! Runs one attempt from start to submission against an in-memory store.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use quizgrade_core::config::load_config_from;
use quizgrade_core::engine::AssessmentEngine;
use quizgrade_core::ledger::AnswerSubmission;
use quizgrade_core::memory::{InMemoryAttemptStore, InMemoryCatalog};
use quizgrade_core::model::UserIdentity;
use quizgrade_core::parser;
use quizgrade_core::report::{AttemptReport, LineState};
use quizgrade_core::traits::{Clock, SystemClock};

pub async fn execute(
    quiz_path: PathBuf,
    answers_path: PathBuf,
    student: String,
    at: Option<String>,
    format: String,
    output: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let quiz = parser::parse_quiz(&quiz_path)?;

    let content = std::fs::read_to_string(&answers_path)
        .with_context(|| format!("failed to read answers from {}", answers_path.display()))?;
    let answers: Vec<AnswerSubmission> =
        serde_json::from_str(&content).context("failed to parse answers JSON")?;

    let now: DateTime<Utc> = match at {
        Some(raw) => DateTime::parse_from_rfc3339(&raw)
            .with_context(|| format!("invalid --at timestamp: {raw}"))?
            .with_timezone(&Utc),
        None => SystemClock.now(),
    };

    tracing::info!(
        quiz = %quiz.id,
        questions = quiz.question_count(),
        answers = answers.len(),
        "grading"
    );

    let engine = AssessmentEngine::new(
        Arc::new(InMemoryCatalog::new([quiz.clone()])),
        Arc::new(InMemoryAttemptStore::new()),
        config,
    );
    let user = UserIdentity::student(student);
    let attempt = engine.start_attempt(&quiz.id, &user, now).await?;
    let attempt = engine.submit_attempt(attempt.id, answers, now).await?;

    let report = AttemptReport::new(&quiz, &attempt, now);

    if let Some(path) = &output {
        report.save_json(path)?;
        eprintln!("Report written to {}", path.display());
    }

    match format.as_str() {
        "markdown" | "md" => println!("{}", report.to_markdown()),
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print_summary(&report),
    }

    Ok(())
}

fn print_summary(report: &AttemptReport) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec!["Question", "Type", "Answer", "Points", "State"]);

    for line in &report.lines {
        let points = match line.points_earned {
            Some(p) => format!("{p:.2}/{:.2}", line.points_possible),
            None => format!("-/{:.2}", line.points_possible),
        };
        let state = match line.state {
            LineState::Correct => "correct",
            LineState::Incorrect => "incorrect",
            LineState::AwaitingManual => "awaiting grading",
            LineState::Ungraded => "ungraded",
        };
        table.add_row(vec![
            Cell::new(&line.question_id),
            Cell::new(line.question_type),
            Cell::new(&line.answer),
            Cell::new(points),
            Cell::new(state),
        ]);
    }

    println!("{table}");
    println!(
        "\n{}: {:.2}/{:.2} points ({:.1}%), status {}",
        report.quiz.title,
        report.earned_points,
        report.total_points,
        report.percentage_score,
        report.status
    );
    match report.passed {
        Some(true) => println!("Result: passed"),
        Some(false) => println!("Result: not passed"),
        None => {}
    }
    let pending = report.awaiting_manual();
    if pending > 0 {
        println!("{pending} answer(s) awaiting manual grading");
    }
}

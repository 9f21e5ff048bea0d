//! The `quizgrade reduce` command.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;

use quizgrade_core::attempt::QuizAttempt;
use quizgrade_core::model::ReductionMethod;
use quizgrade_core::reducer::{reduce, FinalScore};

#[derive(Serialize)]
struct StudentScore {
    quiz_id: String,
    student_id: String,
    attempts: usize,
    score: FinalScore,
}

pub fn execute(attempts_path: PathBuf, method: String, format: String) -> Result<()> {
    let method: ReductionMethod = method.parse().map_err(|e: String| anyhow::anyhow!(e))?;

    let content = std::fs::read_to_string(&attempts_path)
        .with_context(|| format!("failed to read attempts from {}", attempts_path.display()))?;
    let attempts: Vec<QuizAttempt> =
        serde_json::from_str(&content).context("failed to parse attempts JSON")?;

    let mut grouped: BTreeMap<(String, String), Vec<QuizAttempt>> = BTreeMap::new();
    for attempt in attempts {
        grouped
            .entry((attempt.quiz_id.clone(), attempt.student_id.clone()))
            .or_default()
            .push(attempt);
    }

    let scores: Vec<StudentScore> = grouped
        .into_iter()
        .map(|((quiz_id, student_id), history)| StudentScore {
            attempts: history.len(),
            score: reduce(&history, method),
            quiz_id,
            student_id,
        })
        .collect();

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&scores)?);
        return Ok(());
    }

    use comfy_table::Table;

    let mut table = Table::new();
    table.set_header(vec!["Quiz", "Student", "Attempts", "Counted", "Score"]);
    for s in &scores {
        let (counted, score) = match &s.score {
            FinalScore::Scored(r) => (
                r.attempts_considered.to_string(),
                format!("{:.1}%", r.percentage),
            ),
            FinalScore::NoScoreYet => ("0".to_string(), "no score yet".to_string()),
        };
        table.add_row(vec![
            s.quiz_id.clone(),
            s.student_id.clone(),
            s.attempts.to_string(),
            counted,
            score,
        ]);
    }
    println!("Method: {method}");
    println!("{table}");

    Ok(())
}

//! Graded attempt reports with JSON persistence and markdown rendering.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::attempt::{AttemptStatus, QuizAttempt};
use crate::model::{QuestionType, Quiz};

/// A report of one attempt, per question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptReport {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub quiz: QuizSummary,
    pub attempt_id: Uuid,
    pub student_id: String,
    pub attempt_number: u32,
    pub status: AttemptStatus,
    pub earned_points: f64,
    pub total_points: f64,
    pub percentage_score: f64,
    /// Share of questions answered; not a score.
    pub completion_percentage: f64,
    /// `None` when the quiz has no passing score or grading is unfinished.
    pub passed: Option<bool>,
    pub auto_submitted: bool,
    pub is_late_submission: bool,
    pub lines: Vec<QuestionLine>,
}

/// Summary of a quiz (without the question bodies).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizSummary {
    pub id: String,
    pub title: String,
    pub question_count: usize,
    pub passing_score: Option<f64>,
}

/// Grading state of one question line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineState {
    Correct,
    Incorrect,
    AwaitingManual,
    Ungraded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionLine {
    pub question_id: String,
    pub question_type: QuestionType,
    pub answer: String,
    pub points_earned: Option<f64>,
    pub points_possible: f64,
    pub state: LineState,
    #[serde(default)]
    pub feedback: Option<String>,
}

impl AttemptReport {
    /// Build a report from an attempt and the live quiz definition.
    pub fn new(quiz: &Quiz, attempt: &QuizAttempt, now: DateTime<Utc>) -> Self {
        let lines = quiz
            .ordered_questions()
            .into_iter()
            .map(|q| {
                let entry = attempt.answer(&q.id);
                let state = match entry {
                    Some(e) if e.is_graded => {
                        if e.is_correct.unwrap_or(false) {
                            LineState::Correct
                        } else {
                            LineState::Incorrect
                        }
                    }
                    _ if q.requires_manual_grading() && !attempt.is_in_progress() => {
                        LineState::AwaitingManual
                    }
                    _ => LineState::Ungraded,
                };
                QuestionLine {
                    question_id: q.id.clone(),
                    question_type: q.question_type,
                    answer: entry
                        .map(|e| e.display_answer())
                        .unwrap_or_else(|| "No answer provided".to_string()),
                    points_earned: entry.and_then(|e| e.points_earned),
                    points_possible: q.points,
                    state,
                    feedback: entry.and_then(|e| e.grader_feedback.clone()),
                }
            })
            .collect();

        let passed = match (quiz.passing_score, attempt.is_completed()) {
            (Some(_), true) => Some(attempt.is_passed(quiz)),
            _ => None,
        };

        Self {
            id: Uuid::new_v4(),
            created_at: now,
            quiz: QuizSummary {
                id: quiz.id.clone(),
                title: quiz.title.clone(),
                question_count: quiz.question_count(),
                passing_score: quiz.passing_score,
            },
            attempt_id: attempt.id,
            student_id: attempt.student_id.clone(),
            attempt_number: attempt.attempt_number,
            status: attempt.status,
            earned_points: attempt.earned_points,
            total_points: attempt.total_points,
            percentage_score: attempt.percentage_score,
            completion_percentage: attempt.completion_percentage(quiz),
            passed,
            auto_submitted: attempt.auto_submitted,
            is_late_submission: attempt.is_late_submission,
            lines,
        }
    }

    /// Lines still waiting for an instructor.
    pub fn awaiting_manual(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| l.state == LineState::AwaitingManual)
            .count()
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        serde_json::from_str(&content).context("failed to parse report JSON")
    }

    /// Format the report as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!(
            "## {} (attempt {})\n\n",
            self.quiz.title, self.attempt_number
        ));
        md.push_str(&format!(
            "**Student:** {}  \n**Status:** {}  \n**Score:** {:.2}/{:.2} ({:.1}%)\n",
            self.student_id,
            self.status,
            self.earned_points,
            self.total_points,
            self.percentage_score
        ));
        match self.passed {
            Some(true) => md.push_str("**Result:** passed\n"),
            Some(false) => md.push_str("**Result:** not passed\n"),
            None => {}
        }
        if self.auto_submitted {
            md.push_str("\n_Auto-submitted when the time limit ran out._\n");
        }
        md.push('\n');

        md.push_str("| Question | Type | Answer | Points | State |\n");
        md.push_str("|----------|------|--------|--------|-------|\n");
        for line in &self.lines {
            let points = match line.points_earned {
                Some(p) => format!("{p:.2}/{:.2}", line.points_possible),
                None => format!("-/{:.2}", line.points_possible),
            };
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                line.question_id,
                line.question_type,
                line.answer.replace('|', "\\|").replace('\n', " "),
                points,
                match line.state {
                    LineState::Correct => "correct",
                    LineState::Incorrect => "incorrect",
                    LineState::AwaitingManual => "awaiting grading",
                    LineState::Ungraded => "ungraded",
                }
            ));
        }

        md
    }
}

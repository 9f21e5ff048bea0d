//! Per-quiz aggregate statistics for reporting.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::attempt::{AttemptStatus, QuizAttempt};
use crate::model::Quiz;
use crate::reducer::{reduce, FinalScore};

/// Aggregate view of every attempt on one quiz.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizStatistics {
    pub quiz_id: String,
    /// Reduced score per student, using the quiz's reduction method.
    pub per_student: BTreeMap<String, FinalScore>,
    /// Attempts counted per status.
    pub status_counts: HashMap<AttemptStatus, usize>,
    /// Mean percentage over completed attempts; `None` if there are none.
    pub mean_completed_percentage: Option<f64>,
    /// Share of scored students whose reduced score passes, in `0.0..=1.0`.
    pub pass_rate: Option<f64>,
    /// Attempts waiting for an instructor.
    pub awaiting_grading: usize,
}

impl QuizStatistics {
    pub fn completed_attempts(&self) -> usize {
        self.status_counts
            .get(&AttemptStatus::Completed)
            .copied()
            .unwrap_or(0)
    }
}

/// Compute statistics over `attempts`, ignoring attempts of other quizzes.
///
/// Scores are recomputed against `quiz` first, so questions added or removed
/// since grading are reflected.
pub fn compute_quiz_statistics(quiz: &Quiz, attempts: &[QuizAttempt]) -> QuizStatistics {
    let rescored: Vec<QuizAttempt> = attempts
        .iter()
        .filter(|a| a.quiz_id == quiz.id)
        .map(|a| {
            let mut a = a.clone();
            a.recompute_score(quiz);
            a
        })
        .collect();
    let own: Vec<&QuizAttempt> = rescored.iter().collect();

    let mut status_counts: HashMap<AttemptStatus, usize> = HashMap::new();
    for a in &own {
        *status_counts.entry(a.status).or_default() += 1;
    }

    let completed: Vec<f64> = own
        .iter()
        .filter(|a| a.is_completed())
        .map(|a| a.percentage_score)
        .collect();
    let mean_completed_percentage = if completed.is_empty() {
        None
    } else {
        Some(completed.iter().sum::<f64>() / completed.len() as f64)
    };

    let mut by_student: BTreeMap<String, Vec<QuizAttempt>> = BTreeMap::new();
    for a in &own {
        by_student
            .entry(a.student_id.clone())
            .or_default()
            .push((*a).clone());
    }
    let per_student: BTreeMap<String, FinalScore> = by_student
        .into_iter()
        .map(|(student, history)| (student, reduce(&history, quiz.reduction)))
        .collect();

    let scores: Vec<f64> = per_student.values().filter_map(FinalScore::percentage).collect();
    let pass_rate = match (quiz.passing_score, scores.is_empty()) {
        (Some(_), false) => {
            let passed = scores.iter().filter(|p| quiz.is_passing(**p)).count();
            Some(passed as f64 / scores.len() as f64)
        }
        _ => None,
    };

    QuizStatistics {
        quiz_id: quiz.id.clone(),
        per_student,
        awaiting_grading: status_counts
            .get(&AttemptStatus::Submitted)
            .copied()
            .unwrap_or(0),
        status_counts,
        mean_completed_percentage,
        pass_rate,
    }
}

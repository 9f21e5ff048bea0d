//! Grade reduction: many attempts, one reportable score.
//!
//! Only `COMPLETED` attempts take part. Attempts in any other state are
//! excluded rather than counted as zero, and a student with no completed
//! attempt has no score yet, which is distinct from scoring zero.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::attempt::QuizAttempt;
use crate::model::ReductionMethod;

/// Outcome of reducing a student's attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FinalScore {
    Scored(ReducedScore),
    NoScoreYet,
}

/// A reported percentage and where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReducedScore {
    pub percentage: f64,
    pub method: ReductionMethod,
    /// Number of completed attempts considered.
    pub attempts_considered: usize,
    /// The attempt that supplied the score; `None` for averages.
    pub source_attempt: Option<Uuid>,
}

impl FinalScore {
    pub fn percentage(&self) -> Option<f64> {
        match self {
            FinalScore::Scored(s) => Some(s.percentage),
            FinalScore::NoScoreYet => None,
        }
    }

    pub fn is_scored(&self) -> bool {
        matches!(self, FinalScore::Scored(_))
    }
}

/// Reduce `attempts` to one score with `method`.
pub fn reduce(attempts: &[QuizAttempt], method: ReductionMethod) -> FinalScore {
    let completed: Vec<&QuizAttempt> = attempts.iter().filter(|a| a.is_completed()).collect();
    if completed.is_empty() {
        return FinalScore::NoScoreYet;
    }

    let scored = |attempt: &QuizAttempt| ReducedScore {
        percentage: attempt.percentage_score,
        method,
        attempts_considered: completed.len(),
        source_attempt: Some(attempt.id),
    };

    let reduced = match method {
        ReductionMethod::Highest => completed
            .iter()
            .copied()
            .max_by(|a, b| {
                a.percentage_score
                    .total_cmp(&b.percentage_score)
                    // earlier attempt wins a tie
                    .then(b.attempt_number.cmp(&a.attempt_number))
            })
            .map(scored),
        ReductionMethod::Latest => completed
            .iter()
            .copied()
            .max_by_key(|a| (a.submitted_at, a.attempt_number))
            .map(scored),
        ReductionMethod::First => completed
            .iter()
            .copied()
            .min_by_key(|a| a.attempt_number)
            .map(scored),
        ReductionMethod::Average => {
            let sum: f64 = completed.iter().map(|a| a.percentage_score).sum();
            Some(ReducedScore {
                percentage: sum / completed.len() as f64,
                method,
                attempts_considered: completed.len(),
                source_attempt: None,
            })
        }
    };

    reduced.map_or(FinalScore::NoScoreYet, FinalScore::Scored)
}

/// The completed attempt with the highest percentage.
pub fn best_attempt(attempts: &[QuizAttempt]) -> Option<&QuizAttempt> {
    attempts
        .iter()
        .filter(|a| a.is_completed())
        .max_by(|a, b| a.percentage_score.total_cmp(&b.percentage_score))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attempt::AttemptStatus;
    use crate::model::fixtures::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap()
    }

    fn completed(number: u32, percentage: f64, submitted_offset_min: i64) -> QuizAttempt {
        let quiz = choice_and_essay_quiz();
        let mut a = QuizAttempt::start(&quiz, "s", number, t0());
        a.status = AttemptStatus::Completed;
        a.percentage_score = percentage;
        a.submitted_at = Some(t0() + Duration::minutes(submitted_offset_min));
        a
    }

    #[test]
    fn average_of_completed() {
        let attempts = vec![completed(1, 80.0, 10), completed(2, 60.0, 20)];
        let score = reduce(&attempts, ReductionMethod::Average);
        assert_eq!(score.percentage(), Some(70.0));
        match score {
            FinalScore::Scored(s) => {
                assert_eq!(s.attempts_considered, 2);
                assert!(s.source_attempt.is_none());
            }
            FinalScore::NoScoreYet => panic!("expected a score"),
        }
    }

    #[test]
    fn no_completed_attempts_is_not_zero() {
        let mut submitted = completed(1, 0.0, 5);
        submitted.status = AttemptStatus::Submitted;
        let mut abandoned = completed(2, 0.0, 5);
        abandoned.status = AttemptStatus::Abandoned;

        for method in [
            ReductionMethod::Highest,
            ReductionMethod::Latest,
            ReductionMethod::Average,
            ReductionMethod::First,
        ] {
            let score = reduce(&[submitted.clone(), abandoned.clone()], method);
            assert_eq!(score, FinalScore::NoScoreYet);
            assert_eq!(score.percentage(), None);
        }
        assert_eq!(reduce(&[], ReductionMethod::Average), FinalScore::NoScoreYet);
    }

    #[test]
    fn zero_score_is_still_a_score() {
        let score = reduce(&[completed(1, 0.0, 1)], ReductionMethod::Highest);
        assert!(score.is_scored());
        assert_eq!(score.percentage(), Some(0.0));
    }

    #[test]
    fn highest_latest_first() {
        let attempts = vec![
            completed(1, 55.0, 10),
            completed(2, 90.0, 20),
            completed(3, 70.0, 30),
        ];
        assert_eq!(
            reduce(&attempts, ReductionMethod::Highest).percentage(),
            Some(90.0)
        );
        assert_eq!(
            reduce(&attempts, ReductionMethod::Latest).percentage(),
            Some(70.0)
        );
        assert_eq!(
            reduce(&attempts, ReductionMethod::First).percentage(),
            Some(55.0)
        );
    }

    #[test]
    fn latest_uses_submit_time_not_attempt_number() {
        // submit times out of attempt-number order
        let attempts = vec![completed(1, 40.0, 50), completed(2, 95.0, 20)];
        assert_eq!(
            reduce(&attempts, ReductionMethod::Latest).percentage(),
            Some(40.0)
        );
    }

    #[test]
    fn incomplete_attempts_are_excluded_not_zeroed() {
        let mut pending = completed(3, 0.0, 40);
        pending.status = AttemptStatus::Submitted;
        let attempts = vec![completed(1, 80.0, 10), completed(2, 60.0, 20), pending];
        assert_eq!(
            reduce(&attempts, ReductionMethod::Average).percentage(),
            Some(70.0)
        );
        assert_eq!(
            reduce(&attempts, ReductionMethod::Latest).percentage(),
            Some(60.0)
        );
    }

    #[test]
    fn first_ignores_incomplete_first_attempt() {
        let mut abandoned = completed(1, 0.0, 1);
        abandoned.status = AttemptStatus::Abandoned;
        let attempts = vec![abandoned, completed(2, 65.0, 5)];
        assert_eq!(
            reduce(&attempts, ReductionMethod::First).percentage(),
            Some(65.0)
        );
    }

    #[test]
    fn best_attempt_picks_highest_completed() {
        let mut top_but_pending = completed(3, 100.0, 30);
        top_but_pending.status = AttemptStatus::Submitted;
        let attempts = vec![completed(1, 20.0, 1), completed(2, 75.0, 2), top_but_pending];
        assert_eq!(best_attempt(&attempts).map(|a| a.attempt_number), Some(2));
        assert!(best_attempt(&[]).is_none());
    }
}

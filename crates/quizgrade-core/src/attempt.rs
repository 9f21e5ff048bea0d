//! Attempt state machine.
//!
//! An attempt moves `IN_PROGRESS → SUBMITTED → COMPLETED`, or ends early in
//! `ABANDONED`, `EXPIRED` or `FLAGGED`. Transitions operate on plain values;
//! persisting the result is the caller's job.
//!
//! ```text
//!                 submit / auto-submit
//!   IN_PROGRESS ───────────────────────► SUBMITTED ──complete grading──► COMPLETED
//!        │   └──── submit (nothing manual) ─────────────────────────────────▲
//!        ├──abandon──► ABANDONED
//!        ├──expire───► EXPIRED
//!        └──flag─────► FLAGGED
//! ```

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ExpiryMode;
use crate::error::{DataIntegrityError, QuizError, QuizResult};
use crate::ledger::{AnswerEntry, AnswerSubmission};
use crate::model::Quiz;
use crate::scoring::Scorer;

/// Lifecycle state of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptStatus {
    InProgress,
    Submitted,
    Completed,
    Abandoned,
    Expired,
    Flagged,
}

impl AttemptStatus {
    /// No further transition leaves this state (re-grading aside).
    pub fn is_terminal(self) -> bool {
        !matches!(self, AttemptStatus::InProgress | AttemptStatus::Submitted)
    }

    /// The transition table.
    pub fn accepts(self, action: AttemptAction) -> bool {
        match self {
            AttemptStatus::InProgress => matches!(
                action,
                AttemptAction::RecordAnswers
                    | AttemptAction::Submit
                    | AttemptAction::ForceExpire
                    | AttemptAction::Abandon
                    | AttemptAction::Flag
            ),
            AttemptStatus::Submitted => matches!(
                action,
                AttemptAction::GradeAnswer | AttemptAction::CompleteGrading
            ),
            AttemptStatus::Completed => action == AttemptAction::GradeAnswer,
            AttemptStatus::Abandoned | AttemptStatus::Expired | AttemptStatus::Flagged => false,
        }
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptStatus::InProgress => write!(f, "in progress"),
            AttemptStatus::Submitted => write!(f, "submitted"),
            AttemptStatus::Completed => write!(f, "completed"),
            AttemptStatus::Abandoned => write!(f, "abandoned"),
            AttemptStatus::Expired => write!(f, "expired"),
            AttemptStatus::Flagged => write!(f, "flagged"),
        }
    }
}

/// Operations that act on an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttemptAction {
    RecordAnswers,
    Submit,
    ForceExpire,
    Abandon,
    Flag,
    GradeAnswer,
    CompleteGrading,
}

impl AttemptAction {
    pub fn name(self) -> &'static str {
        match self {
            AttemptAction::RecordAnswers => "record answers for",
            AttemptAction::Submit => "submit",
            AttemptAction::ForceExpire => "expire",
            AttemptAction::Abandon => "abandon",
            AttemptAction::Flag => "flag",
            AttemptAction::GradeAnswer => "grade an answer of",
            AttemptAction::CompleteGrading => "complete grading of",
        }
    }
}

/// Whether an idempotent transition changed anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied(AttemptStatus),
    Unchanged,
}

/// Time left on an attempt, as advice for the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "minutes", rename_all = "snake_case")]
pub enum RemainingTime {
    Unlimited,
    Minutes(i64),
}

/// One student's single pass through a quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: Uuid,
    pub quiz_id: String,
    pub student_id: String,
    /// 1-based, dense per (student, quiz).
    pub attempt_number: u32,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub graded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub earned_points: f64,
    #[serde(default)]
    pub total_points: f64,
    #[serde(default)]
    pub percentage_score: f64,
    #[serde(default)]
    pub is_late_submission: bool,
    #[serde(default)]
    pub auto_submitted: bool,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default)]
    pub graded_by: Option<String>,
    #[serde(default)]
    pub flag_reason: Option<String>,
    #[serde(default)]
    pub answers: Vec<AnswerEntry>,
}

impl QuizAttempt {
    /// Open a new attempt with one ledger entry per question, in quiz order.
    ///
    /// Start policy is checked by [`crate::policy`], not here.
    pub fn start(quiz: &Quiz, student_id: &str, attempt_number: u32, now: DateTime<Utc>) -> Self {
        let answers = quiz
            .ordered_questions()
            .into_iter()
            .map(|q| AnswerEntry::new(q.id.clone()))
            .collect();
        Self {
            id: Uuid::new_v4(),
            quiz_id: quiz.id.clone(),
            student_id: student_id.to_string(),
            attempt_number,
            status: AttemptStatus::InProgress,
            started_at: now,
            submitted_at: None,
            graded_at: None,
            earned_points: 0.0,
            total_points: quiz.total_points(),
            percentage_score: 0.0,
            is_late_submission: false,
            auto_submitted: false,
            feedback: None,
            graded_by: None,
            flag_reason: None,
            answers,
        }
    }

    pub fn answer(&self, question_id: &str) -> Option<&AnswerEntry> {
        self.answers.iter().find(|a| a.question_id == question_id)
    }

    fn require(&self, action: AttemptAction) -> QuizResult<()> {
        if self.status.accepts(action) {
            Ok(())
        } else {
            Err(QuizError::InvalidTransition {
                from: self.status,
                action: action.name(),
            })
        }
    }

    fn foreign(&self, question_id: &str) -> QuizError {
        DataIntegrityError::ForeignQuestion {
            question_id: question_id.to_string(),
            quiz_id: self.quiz_id.clone(),
        }
        .into()
    }

    /// Store responses while the attempt is in progress.
    ///
    /// The whole batch is validated before anything is written, so a bad
    /// answer leaves the ledger as it was.
    pub fn record_answers(
        &mut self,
        quiz: &Quiz,
        submissions: Vec<AnswerSubmission>,
    ) -> QuizResult<()> {
        self.require(AttemptAction::RecordAnswers)?;

        let mut seen = HashSet::new();
        let mut staged = Vec::with_capacity(submissions.len());
        for submission in submissions {
            let question_id = submission.question_id.clone();
            if quiz.question(&question_id).is_none() || self.answer(&question_id).is_none() {
                return Err(self.foreign(&question_id));
            }
            if !seen.insert(question_id.clone()) {
                return Err(DataIntegrityError::DuplicateQuestion { question_id }.into());
            }
            let time_spent = submission.time_spent_seconds;
            staged.push((question_id, submission.into_response()?, time_spent));
        }

        for (question_id, response, time_spent) in staged {
            if let Some(entry) = self.answers.iter_mut().find(|a| a.question_id == question_id) {
                entry.submit(response);
                if time_spent.is_some() {
                    entry.time_spent_seconds = time_spent;
                }
            }
        }
        Ok(())
    }

    /// Student-initiated submission.
    pub fn submit(
        &mut self,
        quiz: &Quiz,
        scorer: &Scorer,
        now: DateTime<Utc>,
    ) -> QuizResult<AttemptStatus> {
        self.require(AttemptAction::Submit)?;
        Ok(self.finalize_submission(quiz, scorer, now))
    }

    /// System-initiated expiry. A no-op once the attempt has left
    /// `IN_PROGRESS`, so racing with a submission never grades twice.
    pub fn force_expire(
        &mut self,
        quiz: &Quiz,
        scorer: &Scorer,
        mode: ExpiryMode,
        now: DateTime<Utc>,
    ) -> TransitionOutcome {
        if !self.status.accepts(AttemptAction::ForceExpire) {
            return TransitionOutcome::Unchanged;
        }
        let status = match mode {
            ExpiryMode::AutoSubmit => {
                self.auto_submitted = true;
                self.finalize_submission(quiz, scorer, now)
            }
            ExpiryMode::MarkExpired => {
                self.status = AttemptStatus::Expired;
                self.status
            }
        };
        TransitionOutcome::Applied(status)
    }

    fn finalize_submission(
        &mut self,
        quiz: &Quiz,
        scorer: &Scorer,
        now: DateTime<Utc>,
    ) -> AttemptStatus {
        self.submitted_at = Some(now);
        // strictly after the close; a submit exactly at `available_until` is on time
        self.is_late_submission = quiz.available_until.is_some_and(|until| now > until);

        let mut needs_manual = false;
        for entry in &mut self.answers {
            let Some(question) = quiz.question(&entry.question_id) else {
                continue;
            };
            if question.requires_manual_grading() {
                needs_manual = true;
            } else {
                entry.auto_grade(question, scorer, now);
            }
        }
        self.recompute_score(quiz);

        if needs_manual {
            self.status = AttemptStatus::Submitted;
        } else {
            self.status = AttemptStatus::Completed;
            self.graded_at = Some(now);
        }
        tracing::info!(
            attempt = %self.id,
            quiz = %self.quiz_id,
            student = %self.student_id,
            status = %self.status,
            auto_submitted = self.auto_submitted,
            late = self.is_late_submission,
            earned = self.earned_points,
            total = self.total_points,
            "attempt submitted"
        );
        self.status
    }

    /// Recompute earned, total and percentage from the ledger and the live
    /// question set.
    pub fn recompute_score(&mut self, quiz: &Quiz) {
        self.earned_points = self.answers.iter().map(AnswerEntry::points).sum();
        self.total_points = quiz.total_points();
        self.percentage_score = if self.total_points > 0.0 {
            self.earned_points / self.total_points * 100.0
        } else {
            0.0
        };
    }

    /// Award points for one answer. Legal once the attempt has been submitted.
    #[allow(clippy::too_many_arguments)]
    pub fn grade_answer(
        &mut self,
        quiz: &Quiz,
        question_id: &str,
        points: f64,
        correct: bool,
        feedback: Option<String>,
        grader: &str,
        now: DateTime<Utc>,
    ) -> QuizResult<()> {
        self.require(AttemptAction::GradeAnswer)?;
        let Some(question) = quiz.question(question_id) else {
            return Err(self.foreign(question_id));
        };
        if !points.is_finite() || points < 0.0 || points > question.points {
            return Err(DataIntegrityError::PointsOutOfRange {
                question_id: question_id.to_string(),
                points,
                max: question.points,
            }
            .into());
        }
        let foreign = self.foreign(question_id);
        let entry = self
            .answers
            .iter_mut()
            .find(|a| a.question_id == question_id)
            .ok_or(foreign)?;
        entry.manual_grade(points, correct, feedback, grader, now);
        self.recompute_score(quiz);
        tracing::debug!(
            attempt = %self.id,
            question = question_id,
            points,
            grader,
            "answer graded manually"
        );
        Ok(())
    }

    /// Close manual grading and finalize the score.
    pub fn complete_manual_grading(
        &mut self,
        quiz: &Quiz,
        grader: &str,
        feedback: Option<String>,
        now: DateTime<Utc>,
    ) -> QuizResult<()> {
        self.require(AttemptAction::CompleteGrading)?;
        let pending = self.pending_manual_count(quiz);
        if pending > 0 {
            tracing::warn!(
                attempt = %self.id,
                pending,
                "completing grading with ungraded answers; they count as zero"
            );
        }
        self.recompute_score(quiz);
        self.graded_at = Some(now);
        self.graded_by = Some(grader.to_string());
        self.feedback = feedback;
        self.status = AttemptStatus::Completed;
        tracing::info!(
            attempt = %self.id,
            grader,
            percentage = self.percentage_score,
            "manual grading completed"
        );
        Ok(())
    }

    /// Leave the attempt without scoring.
    pub fn abandon(&mut self) -> QuizResult<()> {
        self.require(AttemptAction::Abandon)?;
        self.status = AttemptStatus::Abandoned;
        tracing::info!(attempt = %self.id, "attempt abandoned");
        Ok(())
    }

    /// Pull the attempt for review (suspected cheating).
    pub fn flag(&mut self, reason: impl Into<String>) -> QuizResult<()> {
        self.require(AttemptAction::Flag)?;
        let reason = reason.into();
        tracing::info!(attempt = %self.id, reason = %reason, "attempt flagged");
        self.flag_reason = Some(reason);
        self.status = AttemptStatus::Flagged;
        Ok(())
    }

    pub fn is_completed(&self) -> bool {
        self.status == AttemptStatus::Completed
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == AttemptStatus::InProgress
    }

    pub fn needs_grading(&self) -> bool {
        self.status == AttemptStatus::Submitted
    }

    /// Completed with a percentage at or above the passing score.
    pub fn is_passed(&self, quiz: &Quiz) -> bool {
        self.is_completed() && quiz.is_passing(self.percentage_score)
    }

    /// Answers whose questions need an instructor and have no grade yet.
    pub fn pending_manual_count(&self, quiz: &Quiz) -> usize {
        self.answers
            .iter()
            .filter(|a| !a.is_graded)
            .filter(|a| {
                quiz.question(&a.question_id)
                    .is_some_and(|q| q.requires_manual_grading())
            })
            .count()
    }

    /// Whole minutes between start and submission (or `now` if open).
    pub fn time_spent_minutes(&self, now: DateTime<Utc>) -> i64 {
        let end = self.submitted_at.unwrap_or(now);
        (end - self.started_at).num_minutes().max(0)
    }

    /// When the time limit runs out, if the quiz has one.
    pub fn deadline(&self, quiz: &Quiz) -> Option<DateTime<Utc>> {
        quiz.time_limit().map(|limit| self.started_at + limit)
    }

    /// `max(0, limit - elapsed)` in minutes, or unlimited.
    pub fn remaining_time(&self, quiz: &Quiz, now: DateTime<Utc>) -> RemainingTime {
        match quiz.time_limit() {
            None => RemainingTime::Unlimited,
            Some(limit) => {
                let elapsed = (now - self.started_at).num_minutes();
                RemainingTime::Minutes((limit.num_minutes() - elapsed).max(0))
            }
        }
    }

    /// Share of questions answered. Not a score.
    pub fn completion_percentage(&self, quiz: &Quiz) -> f64 {
        let count = quiz.question_count();
        if count == 0 {
            return 0.0;
        }
        let answered = self.answers.iter().filter(|a| a.has_answer()).count();
        answered as f64 / count as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::*;
    use crate::model::QuestionType;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    fn started(quiz: &Quiz) -> QuizAttempt {
        QuizAttempt::start(quiz, "student-1", 1, t0())
    }

    fn sum_of_entries(attempt: &QuizAttempt) -> f64 {
        attempt.answers.iter().map(|a| a.points_earned.unwrap_or(0.0)).sum()
    }

    #[test]
    fn start_creates_ledger_in_question_order() {
        let mut quiz = choice_and_essay_quiz();
        quiz.questions[0].order_index = 2;
        quiz.questions[1].order_index = 1;
        let attempt = started(&quiz);
        assert_eq!(attempt.status, AttemptStatus::InProgress);
        assert_eq!(attempt.started_at, t0());
        assert_eq!(attempt.answers.len(), 2);
        assert_eq!(attempt.answers[0].question_id, "q2");
        assert_eq!(attempt.total_points, 5.0);
    }

    #[test]
    fn transition_table() {
        use AttemptAction as A;
        use AttemptStatus as S;
        assert!(S::InProgress.accepts(A::Submit));
        assert!(S::InProgress.accepts(A::Abandon));
        assert!(!S::InProgress.accepts(A::GradeAnswer));
        assert!(!S::InProgress.accepts(A::CompleteGrading));
        assert!(S::Submitted.accepts(A::CompleteGrading));
        assert!(!S::Submitted.accepts(A::Submit));
        assert!(!S::Submitted.accepts(A::ForceExpire));
        assert!(S::Completed.accepts(A::GradeAnswer));
        assert!(!S::Completed.accepts(A::CompleteGrading));
        for terminal in [S::Abandoned, S::Expired, S::Flagged] {
            assert!(terminal.is_terminal());
            for action in [A::Submit, A::ForceExpire, A::GradeAnswer, A::Abandon] {
                assert!(!terminal.accepts(action));
            }
        }
    }

    #[test]
    fn choice_and_essay_scenario() {
        let quiz = choice_and_essay_quiz();
        let mut attempt = started(&quiz);
        attempt
            .record_answers(
                &quiz,
                vec![
                    AnswerSubmission::selected("q1", ["a"]),
                    AnswerSubmission::text("q2", "An essay about things."),
                ],
            )
            .unwrap();

        let submit_at = t0() + Duration::minutes(5);
        let status = attempt.submit(&quiz, &Scorer::default(), submit_at).unwrap();
        assert_eq!(status, AttemptStatus::Submitted);
        assert_eq!(attempt.submitted_at, Some(submit_at));
        assert!(attempt.graded_at.is_none());
        assert_eq!(attempt.earned_points, 2.0);
        assert_eq!(attempt.total_points, 5.0);
        assert_eq!(attempt.percentage_score, 40.0);
        assert!(!attempt.answer("q2").unwrap().is_graded);
        assert_eq!(attempt.pending_manual_count(&quiz), 1);

        let grade_at = t0() + Duration::hours(2);
        attempt
            .grade_answer(&quiz, "q2", 2.0, true, Some("solid".into()), "prof", grade_at)
            .unwrap();
        attempt
            .complete_manual_grading(&quiz, "prof", Some("well done".into()), grade_at)
            .unwrap();
        assert_eq!(attempt.status, AttemptStatus::Completed);
        assert_eq!(attempt.earned_points, 4.0);
        assert_eq!(attempt.percentage_score, 80.0);
        assert_eq!(attempt.graded_by.as_deref(), Some("prof"));
        assert_eq!(attempt.graded_at, Some(grade_at));
        assert_eq!(attempt.earned_points, sum_of_entries(&attempt));
        assert!(attempt.is_passed(&quiz));
    }

    #[test]
    fn auto_only_quiz_completes_on_submit() {
        let quiz = quiz(vec![with_options(
            question("q1", QuestionType::SingleChoice, 1.0),
            vec![option("a", "A", true)],
        )]);
        let mut attempt = started(&quiz);
        let status = attempt.submit(&quiz, &Scorer::default(), t0()).unwrap();
        assert_eq!(status, AttemptStatus::Completed);
        assert_eq!(attempt.graded_at, Some(t0()));
        assert_eq!(attempt.percentage_score, 0.0);
        assert!(!attempt.is_passed(&quiz));
    }

    #[test]
    fn empty_quiz_never_divides_by_zero() {
        let quiz = quiz(vec![]);
        let mut attempt = started(&quiz);
        attempt.submit(&quiz, &Scorer::default(), t0()).unwrap();
        assert_eq!(attempt.total_points, 0.0);
        assert_eq!(attempt.percentage_score, 0.0);
        assert_eq!(attempt.completion_percentage(&quiz), 0.0);
    }

    #[test]
    fn submit_twice_is_invalid() {
        let quiz = choice_and_essay_quiz();
        let mut attempt = started(&quiz);
        attempt.submit(&quiz, &Scorer::default(), t0()).unwrap();
        let err = attempt.submit(&quiz, &Scorer::default(), t0()).unwrap_err();
        assert!(matches!(
            err,
            QuizError::InvalidTransition {
                from: AttemptStatus::Submitted,
                ..
            }
        ));
    }

    #[test]
    fn grading_in_progress_attempt_is_rejected() {
        let quiz = choice_and_essay_quiz();
        let mut attempt = started(&quiz);
        let err = attempt
            .grade_answer(&quiz, "q2", 1.0, true, None, "prof", t0())
            .unwrap_err();
        assert!(matches!(err, QuizError::InvalidTransition { .. }));
        let err = attempt
            .complete_manual_grading(&quiz, "prof", None, t0())
            .unwrap_err();
        assert!(matches!(err, QuizError::InvalidTransition { .. }));
    }

    #[test]
    fn grade_answer_validates_points_and_question() {
        let quiz = choice_and_essay_quiz();
        let mut attempt = started(&quiz);
        attempt.submit(&quiz, &Scorer::default(), t0()).unwrap();

        let err = attempt
            .grade_answer(&quiz, "q2", 3.5, true, None, "prof", t0())
            .unwrap_err();
        assert!(matches!(
            err,
            QuizError::DataIntegrity(DataIntegrityError::PointsOutOfRange { .. })
        ));
        let err = attempt
            .grade_answer(&quiz, "q2", -1.0, false, None, "prof", t0())
            .unwrap_err();
        assert!(matches!(err, QuizError::DataIntegrity(_)));
        let err = attempt
            .grade_answer(&quiz, "nope", 1.0, true, None, "prof", t0())
            .unwrap_err();
        assert!(matches!(
            err,
            QuizError::DataIntegrity(DataIntegrityError::ForeignQuestion { .. })
        ));
    }

    #[test]
    fn regrade_after_completion_recomputes() {
        let quiz = choice_and_essay_quiz();
        let mut attempt = started(&quiz);
        attempt.submit(&quiz, &Scorer::default(), t0()).unwrap();
        attempt
            .complete_manual_grading(&quiz, "prof", None, t0())
            .unwrap();
        assert_eq!(attempt.earned_points, 0.0);

        attempt
            .grade_answer(&quiz, "q2", 3.0, true, None, "prof", t0())
            .unwrap();
        assert_eq!(attempt.status, AttemptStatus::Completed);
        assert_eq!(attempt.earned_points, 3.0);
        assert_eq!(attempt.percentage_score, 60.0);
        assert_eq!(attempt.earned_points, sum_of_entries(&attempt));
    }

    #[test]
    fn record_answers_rejects_foreign_and_ambiguous_without_writing() {
        let quiz = choice_and_essay_quiz();
        let mut attempt = started(&quiz);

        let err = attempt
            .record_answers(
                &quiz,
                vec![
                    AnswerSubmission::selected("q1", ["a"]),
                    AnswerSubmission::text("elsewhere", "x"),
                ],
            )
            .unwrap_err();
        assert!(matches!(
            err,
            QuizError::DataIntegrity(DataIntegrityError::ForeignQuestion { .. })
        ));
        assert!(!attempt.answer("q1").unwrap().has_answer());

        let mut ambiguous = AnswerSubmission::text("q2", "essay");
        ambiguous.file_ref = Some("upload.pdf".into());
        let err = attempt.record_answers(&quiz, vec![ambiguous]).unwrap_err();
        assert!(matches!(
            err,
            QuizError::DataIntegrity(DataIntegrityError::AmbiguousSubmission { .. })
        ));

        let err = attempt
            .record_answers(
                &quiz,
                vec![
                    AnswerSubmission::selected("q1", ["a"]),
                    AnswerSubmission::selected("q1", ["b"]),
                ],
            )
            .unwrap_err();
        assert!(matches!(
            err,
            QuizError::DataIntegrity(DataIntegrityError::DuplicateQuestion { .. })
        ));
    }

    #[test]
    fn record_answers_rejects_questions_added_after_start() {
        let mut quiz = choice_and_essay_quiz();
        let mut attempt = started(&quiz);
        quiz.questions.push(question("q3", QuestionType::Essay, 1.0));
        let err = attempt
            .record_answers(&quiz, vec![AnswerSubmission::text("q3", "late")])
            .unwrap_err();
        assert!(matches!(err, QuizError::DataIntegrity(_)));
    }

    #[test]
    fn force_expire_is_idempotent() {
        let quiz = choice_and_essay_quiz();
        let scorer = Scorer::default();
        let mut attempt = started(&quiz);
        attempt
            .record_answers(&quiz, vec![AnswerSubmission::selected("q1", ["a"])])
            .unwrap();

        let at = t0() + Duration::minutes(11);
        let first = attempt.force_expire(&quiz, &scorer, ExpiryMode::AutoSubmit, at);
        assert_eq!(first, TransitionOutcome::Applied(AttemptStatus::Submitted));
        assert!(attempt.auto_submitted);
        let snapshot = attempt.clone();

        let second = attempt.force_expire(
            &quiz,
            &scorer,
            ExpiryMode::AutoSubmit,
            at + Duration::minutes(5),
        );
        assert_eq!(second, TransitionOutcome::Unchanged);
        assert_eq!(attempt, snapshot);
    }

    #[test]
    fn force_expire_after_submit_is_noop() {
        let quiz = choice_and_essay_quiz();
        let scorer = Scorer::default();
        let mut attempt = started(&quiz);
        attempt.submit(&quiz, &scorer, t0()).unwrap();
        let outcome = attempt.force_expire(&quiz, &scorer, ExpiryMode::AutoSubmit, t0());
        assert_eq!(outcome, TransitionOutcome::Unchanged);
        assert!(!attempt.auto_submitted);
    }

    #[test]
    fn mark_expired_skips_scoring() {
        let quiz = choice_and_essay_quiz();
        let mut attempt = started(&quiz);
        attempt
            .record_answers(&quiz, vec![AnswerSubmission::selected("q1", ["a"])])
            .unwrap();
        let outcome =
            attempt.force_expire(&quiz, &Scorer::default(), ExpiryMode::MarkExpired, t0());
        assert_eq!(outcome, TransitionOutcome::Applied(AttemptStatus::Expired));
        assert_eq!(attempt.earned_points, 0.0);
        assert!(attempt.submitted_at.is_none());
    }

    #[test]
    fn abandon_and_flag() {
        let quiz = choice_and_essay_quiz();
        let mut attempt = started(&quiz);
        attempt.abandon().unwrap();
        assert_eq!(attempt.status, AttemptStatus::Abandoned);
        assert!(attempt.abandon().is_err());
        assert!(attempt.flag("late").is_err());

        let mut other = started(&quiz);
        other.flag("second device detected").unwrap();
        assert_eq!(other.status, AttemptStatus::Flagged);
        assert_eq!(other.flag_reason.as_deref(), Some("second device detected"));
    }

    #[test]
    fn late_submission_after_close() {
        let mut quiz = choice_and_essay_quiz();
        quiz.available_until = Some(t0() + Duration::minutes(30));
        let mut attempt = started(&quiz);
        attempt
            .submit(&quiz, &Scorer::default(), t0() + Duration::minutes(31))
            .unwrap();
        assert!(attempt.is_late_submission);

        let mut on_time = started(&quiz);
        on_time
            .submit(&quiz, &Scorer::default(), t0() + Duration::minutes(29))
            .unwrap();
        assert!(!on_time.is_late_submission);
    }

    #[test]
    fn close_instant_is_closed_for_starts_but_on_time_for_submits() {
        let mut quiz = choice_and_essay_quiz();
        let close = t0() + Duration::minutes(30);
        quiz.available_until = Some(close);
        assert!(quiz.is_closed(close));
        assert!(!quiz.is_closed(close - Duration::seconds(1)));

        let mut attempt = started(&quiz);
        attempt.submit(&quiz, &Scorer::default(), close).unwrap();
        assert!(!attempt.is_late_submission);
    }

    #[test]
    fn total_uses_live_question_set() {
        let mut quiz = choice_and_essay_quiz();
        let mut attempt = started(&quiz);
        quiz.questions[1].points = 8.0;
        attempt
            .record_answers(&quiz, vec![AnswerSubmission::selected("q1", ["a"])])
            .unwrap();
        attempt.submit(&quiz, &Scorer::default(), t0()).unwrap();
        assert_eq!(attempt.total_points, 10.0);
        assert_eq!(attempt.percentage_score, 20.0);
    }

    #[test]
    fn remaining_time_and_time_spent() {
        let mut quiz = choice_and_essay_quiz();
        let attempt = started(&quiz);
        assert_eq!(
            attempt.remaining_time(&quiz, t0() + Duration::hours(5)),
            RemainingTime::Unlimited
        );

        quiz.time_limit_minutes = Some(10);
        assert_eq!(
            attempt.remaining_time(&quiz, t0() + Duration::minutes(3)),
            RemainingTime::Minutes(7)
        );
        assert_eq!(
            attempt.remaining_time(&quiz, t0() + Duration::minutes(25)),
            RemainingTime::Minutes(0)
        );
        assert_eq!(attempt.deadline(&quiz), Some(t0() + Duration::minutes(10)));
        assert_eq!(attempt.time_spent_minutes(t0() + Duration::minutes(4)), 4);
    }

    #[test]
    fn completion_percentage_counts_answers_not_points() {
        let quiz = choice_and_essay_quiz();
        let mut attempt = started(&quiz);
        attempt
            .record_answers(&quiz, vec![AnswerSubmission::selected("q1", ["b"])])
            .unwrap();
        assert_eq!(attempt.completion_percentage(&quiz), 50.0);
        attempt.submit(&quiz, &Scorer::default(), t0()).unwrap();
        assert_eq!(attempt.percentage_score, 0.0);
        assert_eq!(attempt.completion_percentage(&quiz), 50.0);
    }
}

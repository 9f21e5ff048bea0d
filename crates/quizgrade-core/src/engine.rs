//! Assessment engine: the entry point the hosting platform calls.
//!
//! The engine loads a quiz and its attempts from the collaborators, runs one
//! transition of the attempt state machine, persists the result and then
//! emits grading signals. Starts are serialized per (quiz, student) and every
//! other transition per attempt id.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, PoisonError};

use anyhow::Context;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::attempt::{AttemptStatus, QuizAttempt, RemainingTime, TransitionOutcome};
use crate::config::QuizgradeConfig;
use crate::error::{QuizError, QuizResult};
use crate::ledger::AnswerSubmission;
use crate::model::{Quiz, UserIdentity};
use crate::policy;
use crate::reducer::{reduce, FinalScore};
use crate::scoring::Scorer;
use crate::statistics::{compute_quiz_statistics, QuizStatistics};
use crate::traits::{
    AttemptStore, Clock, GradingEventSink, GradingSignal, NoopSink, QuizCatalog, SystemClock,
};

/// One async mutex per key, created on first use and dropped with the last
/// guard for that key.
struct KeyedLocks<K> {
    locks: std::sync::Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

/// Holds one key of a [`KeyedLocks`] map.
struct KeyedGuard<'a, K: Eq + Hash> {
    owner: &'a KeyedLocks<K>,
    key: K,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K: Eq + Hash> KeyedLocks<K> {
    // held only for map edits, never across an await
    fn map(&self) -> std::sync::MutexGuard<'_, HashMap<K, Arc<Mutex<()>>>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    fn new() -> Self {
        Self {
            locks: std::sync::Mutex::new(HashMap::new()),
        }
    }

    async fn acquire(&self, key: K) -> KeyedGuard<'_, K> {
        let lock = {
            let mut locks = self.map();
            Arc::clone(locks.entry(key.clone()).or_default())
        };
        let guard = lock.lock_owned().await;
        KeyedGuard {
            owner: self,
            key,
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.map().len()
    }
}

impl<K: Eq + Hash> Drop for KeyedGuard<'_, K> {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = self.owner.map();
        // waiters hold a clone, so a count of one means nobody else wants the key
        if locks
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.key);
        }
    }
}

/// The assessment engine.
pub struct AssessmentEngine {
    catalog: Arc<dyn QuizCatalog>,
    store: Arc<dyn AttemptStore>,
    sink: Arc<dyn GradingEventSink>,
    clock: Arc<dyn Clock>,
    scorer: Scorer,
    config: QuizgradeConfig,
    start_locks: KeyedLocks<(String, String)>,
    attempt_locks: KeyedLocks<Uuid>,
}

impl AssessmentEngine {
    pub fn new(
        catalog: Arc<dyn QuizCatalog>,
        store: Arc<dyn AttemptStore>,
        config: QuizgradeConfig,
    ) -> Self {
        Self {
            catalog,
            store,
            sink: Arc::new(NoopSink),
            clock: Arc::new(SystemClock),
            scorer: Scorer::new(config.scoring.clone()),
            config,
            start_locks: KeyedLocks::new(),
            attempt_locks: KeyedLocks::new(),
        }
    }

    /// Route grading signals to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn GradingEventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Use `clock` for operations that do not take an explicit time.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &QuizgradeConfig {
        &self.config
    }

    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    async fn load_quiz(&self, quiz_id: &str) -> QuizResult<Quiz> {
        self.catalog
            .quiz(quiz_id)
            .await
            .with_context(|| format!("loading quiz {quiz_id}"))?
            .ok_or_else(|| QuizError::not_found("quiz", quiz_id))
    }

    async fn load_attempt(&self, attempt_id: Uuid) -> QuizResult<QuizAttempt> {
        self.store
            .load(attempt_id)
            .await
            .with_context(|| format!("loading attempt {attempt_id}"))?
            .ok_or_else(|| QuizError::not_found("attempt", attempt_id))
    }

    /// Load an attempt together with the live definition of its quiz.
    async fn load_with_quiz(&self, attempt_id: Uuid) -> QuizResult<(QuizAttempt, Quiz)> {
        let attempt = self.load_attempt(attempt_id).await?;
        let quiz = self.load_quiz(&attempt.quiz_id).await?;
        Ok((attempt, quiz))
    }

    async fn persist(&self, attempt: &QuizAttempt) -> QuizResult<()> {
        self.store
            .save(attempt)
            .await
            .with_context(|| format!("saving attempt {}", attempt.id))?;
        Ok(())
    }

    /// Tell the gradebook layer where the attempt landed.
    fn announce(&self, quiz: &Quiz, attempt: &QuizAttempt) {
        let signal = match attempt.status {
            AttemptStatus::Submitted => GradingSignal::ManualGradingRequired {
                attempt_id: attempt.id,
                quiz_id: attempt.quiz_id.clone(),
                student_id: attempt.student_id.clone(),
                pending_answers: attempt.pending_manual_count(quiz),
            },
            AttemptStatus::Completed => GradingSignal::GradeFinalized {
                attempt_id: attempt.id,
                quiz_id: attempt.quiz_id.clone(),
                student_id: attempt.student_id.clone(),
                percentage: attempt.percentage_score,
                passed: attempt.is_passed(quiz),
            },
            _ => return,
        };
        self.sink.emit(&signal);
    }

    fn require_grader(user: &UserIdentity, action: &'static str) -> QuizResult<()> {
        if user.role.can_grade() {
            Ok(())
        } else {
            Err(QuizError::Forbidden {
                user: user.id.clone(),
                action,
            })
        }
    }

    /// Expire `attempt` if its time ran out. Caller holds the attempt lock.
    async fn expire_if_overdue(
        &self,
        quiz: &Quiz,
        attempt: &mut QuizAttempt,
        now: DateTime<Utc>,
    ) -> QuizResult<bool> {
        if !attempt.is_in_progress() || !policy::is_expired(quiz, attempt, now) {
            return Ok(false);
        }
        let outcome = attempt.force_expire(quiz, &self.scorer, self.config.expiry_mode, now);
        if outcome == TransitionOutcome::Unchanged {
            return Ok(false);
        }
        self.persist(attempt).await?;
        self.announce(quiz, attempt);
        tracing::info!(
            attempt = %attempt.id,
            status = %attempt.status,
            "attempt expired on access"
        );
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Student operations
    // -----------------------------------------------------------------------

    /// Open a new attempt for `student` on `quiz_id`.
    ///
    /// The policy check and the insert happen under one per-(quiz, student)
    /// lock, so two concurrent starts cannot both succeed.
    pub async fn start_attempt(
        &self,
        quiz_id: &str,
        student: &UserIdentity,
        now: DateTime<Utc>,
    ) -> QuizResult<QuizAttempt> {
        let quiz = self.load_quiz(quiz_id).await?;
        let _guard = self
            .start_locks
            .acquire((quiz.id.clone(), student.id.clone()))
            .await;

        let mut history = self
            .store
            .list_for_student(&quiz.id, &student.id)
            .await
            .context("listing attempts")?;

        // an overdue attempt should not block a fresh start
        for attempt in history.iter_mut().filter(|a| a.is_in_progress()) {
            let _attempt_guard = self.attempt_locks.acquire(attempt.id).await;
            if let Some(latest) = self.store.load(attempt.id).await? {
                *attempt = latest;
            }
            self.expire_if_overdue(&quiz, attempt, now).await?;
        }

        let number = match policy::check_start(&quiz, &student.id, &history, now) {
            Ok(number) => number,
            Err(violation) => {
                tracing::warn!(
                    quiz = %quiz.id,
                    student = %student.id,
                    reason = %violation,
                    "start rejected"
                );
                return Err(violation.into());
            }
        };

        let attempt = QuizAttempt::start(&quiz, &student.id, number, now);
        self.persist(&attempt).await?;
        tracing::info!(
            attempt = %attempt.id,
            quiz = %quiz.id,
            student = %student.id,
            number,
            "attempt started"
        );
        Ok(attempt)
    }

    /// Store responses on an open attempt without submitting it.
    pub async fn save_answers(
        &self,
        attempt_id: Uuid,
        answers: Vec<AnswerSubmission>,
        now: DateTime<Utc>,
    ) -> QuizResult<QuizAttempt> {
        let _guard = self.attempt_locks.acquire(attempt_id).await;
        let (mut attempt, quiz) = self.load_with_quiz(attempt_id).await?;

        if self.expire_if_overdue(&quiz, &mut attempt, now).await? {
            return Err(QuizError::InvalidTransition {
                from: attempt.status,
                action: "record answers for",
            });
        }
        attempt.record_answers(&quiz, answers)?;
        self.persist(&attempt).await?;
        Ok(attempt)
    }

    /// Record the final answers and submit.
    ///
    /// A submission that arrives after the time limit is not recorded; the
    /// attempt is expired with whatever was saved before. A submission that
    /// loses a race against the expiry sweep returns the swept attempt as is.
    pub async fn submit_attempt(
        &self,
        attempt_id: Uuid,
        answers: Vec<AnswerSubmission>,
        now: DateTime<Utc>,
    ) -> QuizResult<QuizAttempt> {
        let _guard = self.attempt_locks.acquire(attempt_id).await;
        let (mut attempt, quiz) = self.load_with_quiz(attempt_id).await?;

        if self.expire_if_overdue(&quiz, &mut attempt, now).await? {
            tracing::warn!(
                attempt = %attempt.id,
                dropped_answers = answers.len(),
                "submission arrived after the time limit"
            );
            return Ok(attempt);
        }
        if attempt.auto_submitted || attempt.status == AttemptStatus::Expired {
            tracing::debug!(attempt = %attempt.id, "attempt already expired, submit is a no-op");
            return Ok(attempt);
        }

        if !answers.is_empty() {
            attempt.record_answers(&quiz, answers)?;
        }
        attempt.submit(&quiz, &self.scorer, now)?;
        self.persist(&attempt).await?;
        self.announce(&quiz, &attempt);
        Ok(attempt)
    }

    /// Leave an open attempt. Only its student or a grader may do this.
    pub async fn abandon_attempt(
        &self,
        attempt_id: Uuid,
        user: &UserIdentity,
    ) -> QuizResult<QuizAttempt> {
        let _guard = self.attempt_locks.acquire(attempt_id).await;
        let mut attempt = self.load_attempt(attempt_id).await?;
        if attempt.student_id != user.id && !user.role.can_grade() {
            return Err(QuizError::Forbidden {
                user: user.id.clone(),
                action: "abandon another student's attempt",
            });
        }
        attempt.abandon()?;
        self.persist(&attempt).await?;
        Ok(attempt)
    }

    /// Time left on an attempt, advisory only.
    pub async fn remaining_time(
        &self,
        attempt_id: Uuid,
        now: DateTime<Utc>,
    ) -> QuizResult<RemainingTime> {
        let (attempt, quiz) = self.load_with_quiz(attempt_id).await?;
        Ok(attempt.remaining_time(&quiz, now))
    }

    // -----------------------------------------------------------------------
    // Instructor operations
    // -----------------------------------------------------------------------

    /// Award points for one answer of a submitted or completed attempt.
    #[allow(clippy::too_many_arguments)]
    pub async fn grade_answer(
        &self,
        attempt_id: Uuid,
        question_id: &str,
        points: f64,
        correct: bool,
        feedback: Option<String>,
        grader: &UserIdentity,
    ) -> QuizResult<QuizAttempt> {
        Self::require_grader(grader, "grade answers")?;
        let _guard = self.attempt_locks.acquire(attempt_id).await;
        let (mut attempt, quiz) = self.load_with_quiz(attempt_id).await?;

        let regrade = attempt.is_completed();
        attempt.grade_answer(
            &quiz,
            question_id,
            points,
            correct,
            feedback,
            &grader.id,
            self.clock.now(),
        )?;
        self.persist(&attempt).await?;
        if regrade {
            self.announce(&quiz, &attempt);
        }
        Ok(attempt)
    }

    /// Close manual grading on a submitted attempt.
    pub async fn complete_manual_grading(
        &self,
        attempt_id: Uuid,
        grader: &UserIdentity,
        feedback: Option<String>,
    ) -> QuizResult<QuizAttempt> {
        Self::require_grader(grader, "complete grading")?;
        let _guard = self.attempt_locks.acquire(attempt_id).await;
        let (mut attempt, quiz) = self.load_with_quiz(attempt_id).await?;

        attempt.complete_manual_grading(&quiz, &grader.id, feedback, self.clock.now())?;
        self.persist(&attempt).await?;
        self.announce(&quiz, &attempt);
        Ok(attempt)
    }

    /// Pull an open attempt for review.
    pub async fn flag_attempt(
        &self,
        attempt_id: Uuid,
        reason: &str,
        reviewer: &UserIdentity,
    ) -> QuizResult<QuizAttempt> {
        Self::require_grader(reviewer, "flag attempts")?;
        let _guard = self.attempt_locks.acquire(attempt_id).await;
        let mut attempt = self.load_attempt(attempt_id).await?;
        attempt.flag(reason)?;
        self.persist(&attempt).await?;
        Ok(attempt)
    }

    // -----------------------------------------------------------------------
    // System operations
    // -----------------------------------------------------------------------

    /// Expire every open attempt of `quiz_id` whose time limit has run out,
    /// returning the attempts this call transitioned.
    ///
    /// Each attempt is re-read under its lock, so an attempt submitted
    /// since the listing is skipped rather than graded twice. An attempt that
    /// fails to load or persist is logged and skipped; the result holds only
    /// the attempts that were actually stored as expired.
    pub async fn sweep_expired(
        &self,
        quiz_id: &str,
        now: DateTime<Utc>,
    ) -> QuizResult<Vec<QuizAttempt>> {
        let quiz = self.load_quiz(quiz_id).await?;
        let attempts = self
            .store
            .list_for_quiz(&quiz.id)
            .await
            .context("listing attempts")?;

        let limit = self.config.sweep_batch_limit.unwrap_or(usize::MAX);
        let candidates: Vec<Uuid> = policy::expired_attempts(&quiz, &attempts, now)
            .map(|a| a.id)
            .take(limit)
            .collect();

        let mut transitioned = Vec::with_capacity(candidates.len());
        let mut failed = 0usize;
        for attempt_id in candidates {
            match self.expire_one(&quiz, attempt_id, now).await {
                Ok(Some(attempt)) => transitioned.push(attempt),
                Ok(None) => {}
                Err(err) => {
                    failed += 1;
                    tracing::warn!(
                        attempt = %attempt_id,
                        error = %err,
                        "expiry failed, left for the next sweep"
                    );
                }
            }
        }

        if !transitioned.is_empty() || failed > 0 {
            tracing::info!(
                quiz = %quiz.id,
                expired = transitioned.len(),
                failed,
                "expiry sweep finished"
            );
        }
        Ok(transitioned)
    }

    async fn expire_one(
        &self,
        quiz: &Quiz,
        attempt_id: Uuid,
        now: DateTime<Utc>,
    ) -> QuizResult<Option<QuizAttempt>> {
        let _guard = self.attempt_locks.acquire(attempt_id).await;
        let mut attempt = self.load_attempt(attempt_id).await?;
        Ok(self
            .expire_if_overdue(quiz, &mut attempt, now)
            .await?
            .then_some(attempt))
    }

    /// The student's reportable score under the quiz's reduction method.
    ///
    /// Stored scores are recomputed against the live question set before
    /// reduction.
    pub async fn reduce_grade(&self, quiz_id: &str, student_id: &str) -> QuizResult<FinalScore> {
        let quiz = self.load_quiz(quiz_id).await?;
        let mut attempts = self
            .store
            .list_for_student(&quiz.id, student_id)
            .await
            .context("listing attempts")?;
        for attempt in &mut attempts {
            attempt.recompute_score(&quiz);
        }
        Ok(reduce(&attempts, quiz.reduction))
    }

    pub async fn quiz_statistics(&self, quiz_id: &str) -> QuizResult<QuizStatistics> {
        let quiz = self.load_quiz(quiz_id).await?;
        let attempts = self
            .store
            .list_for_quiz(&quiz.id)
            .await
            .context("listing attempts")?;
        Ok(compute_quiz_statistics(&quiz, &attempts))
    }
}

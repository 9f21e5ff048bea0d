//! Collaborator traits: quiz lookup, attempt persistence, grading signals,
//! and the clock.
//!
//! The engine never reaches for global state; everything it needs from the
//! surrounding platform comes through these seams.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::attempt::QuizAttempt;
use crate::model::Quiz;

// ---------------------------------------------------------------------------
// Quiz definitions
// ---------------------------------------------------------------------------

/// Source of quiz definitions.
#[async_trait]
pub trait QuizCatalog: Send + Sync {
    /// Look up a quiz with its current question set.
    async fn quiz(&self, quiz_id: &str) -> anyhow::Result<Option<Quiz>>;
}

// ---------------------------------------------------------------------------
// Attempt persistence
// ---------------------------------------------------------------------------

/// Durable storage for attempts and their answer ledgers.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    async fn load(&self, attempt_id: Uuid) -> anyhow::Result<Option<QuizAttempt>>;

    /// Every attempt by `student_id` on `quiz_id`, in any state.
    async fn list_for_student(
        &self,
        quiz_id: &str,
        student_id: &str,
    ) -> anyhow::Result<Vec<QuizAttempt>>;

    /// Every attempt on `quiz_id`.
    async fn list_for_quiz(&self, quiz_id: &str) -> anyhow::Result<Vec<QuizAttempt>>;

    /// Insert or replace an attempt, ledger included, as one write.
    async fn save(&self, attempt: &QuizAttempt) -> anyhow::Result<()>;
}

// ---------------------------------------------------------------------------
// Grading signals
// ---------------------------------------------------------------------------

/// Signals for the gradebook / notification layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GradingSignal {
    /// The attempt landed in `SUBMITTED` and needs an instructor.
    ManualGradingRequired {
        attempt_id: Uuid,
        quiz_id: String,
        student_id: String,
        pending_answers: usize,
    },
    /// The attempt reached `COMPLETED`.
    GradeFinalized {
        attempt_id: Uuid,
        quiz_id: String,
        student_id: String,
        percentage: f64,
        passed: bool,
    },
}

/// Receiver of [`GradingSignal`]s.
pub trait GradingEventSink: Send + Sync {
    fn emit(&self, signal: &GradingSignal);
}

/// Sink that drops every signal.
pub struct NoopSink;

impl GradingEventSink for NoopSink {
    fn emit(&self, _: &GradingSignal) {}
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Wall clock supplied by the host.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock pinned to one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

//! Error taxonomy for the assessment core.
//!
//! Policy violations are rejections the caller surfaces to the student.
//! Invalid transitions and data-integrity errors fail a single operation and
//! leave every other attempt untouched.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::attempt::AttemptStatus;

/// Reasons an attempt is not allowed to start.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyViolation {
    /// The quiz has not been published.
    #[error("quiz is not published")]
    NotPublished,

    /// The availability window has not opened yet.
    #[error("quiz opens at {opens_at}")]
    NotYetOpen { opens_at: DateTime<Utc> },

    /// The availability window has closed.
    #[error("quiz closed at {closed_at}")]
    Closed { closed_at: DateTime<Utc> },

    /// Every allowed attempt has been used, whatever state it ended in.
    #[error("all {max} attempts used ({used} started)")]
    AttemptsExhausted { used: u32, max: u32 },

    /// The student already has an attempt in progress.
    #[error("attempt {attempt_id} is already in progress")]
    AttemptInProgress { attempt_id: Uuid },
}

/// Inconsistent input that cannot be graded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataIntegrityError {
    /// The answer references a question outside the attempt's quiz.
    #[error("question {question_id} does not belong to quiz {quiz_id}")]
    ForeignQuestion { question_id: String, quiz_id: String },

    /// A submission populated more than one response field.
    #[error("submission for question {question_id} populates {populated} fields, expected one")]
    AmbiguousSubmission { question_id: String, populated: usize },

    /// Manually awarded points fall outside the question's range.
    #[error("{points} points is outside 0..={max} for question {question_id}")]
    PointsOutOfRange {
        question_id: String,
        points: f64,
        max: f64,
    },

    /// The same question appears twice in one submission.
    #[error("question {question_id} answered more than once")]
    DuplicateQuestion { question_id: String },
}

/// Errors returned by the attempt state machine and the engine.
#[derive(Debug, Error)]
pub enum QuizError {
    #[error("attempt rejected: {0}")]
    Policy(#[from] PolicyViolation),

    #[error("cannot {action} an attempt that is {from}")]
    InvalidTransition {
        from: AttemptStatus,
        action: &'static str,
    },

    #[error("data integrity: {0}")]
    DataIntegrity(#[from] DataIntegrityError),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("user {user} may not {action}")]
    Forbidden { user: String, action: &'static str },

    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl QuizError {
    /// Returns `true` if this is a policy rejection rather than a failure.
    pub fn is_rejection(&self) -> bool {
        matches!(self, QuizError::Policy(_))
    }

    pub(crate) fn not_found(kind: &'static str, id: impl ToString) -> Self {
        QuizError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

pub type QuizResult<T> = std::result::Result<T, QuizError>;

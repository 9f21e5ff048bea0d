//! Quiz policy: availability, attempt limits, and time limits.
//!
//! Every check takes `now` explicitly so time-dependent behaviour is
//! deterministic under test.

use chrono::{DateTime, Utc};

use crate::attempt::QuizAttempt;
use crate::error::PolicyViolation;
use crate::model::Quiz;

/// Why the quiz is currently unavailable, if it is.
pub fn check_availability(quiz: &Quiz, now: DateTime<Utc>) -> Result<(), PolicyViolation> {
    if !quiz.published {
        return Err(PolicyViolation::NotPublished);
    }
    if let Some(opens_at) = quiz.available_from {
        if now < opens_at {
            return Err(PolicyViolation::NotYetOpen { opens_at });
        }
    }
    if let Some(closed_at) = quiz.available_until {
        if now >= closed_at {
            return Err(PolicyViolation::Closed { closed_at });
        }
    }
    Ok(())
}

/// Published, opened (inclusive), and not yet closed (exclusive).
pub fn is_available(quiz: &Quiz, now: DateTime<Utc>) -> bool {
    check_availability(quiz, now).is_ok()
}

fn student_attempts<'a>(
    quiz: &'a Quiz,
    student_id: &'a str,
    attempts: &'a [QuizAttempt],
) -> impl Iterator<Item = &'a QuizAttempt> + 'a {
    attempts
        .iter()
        .filter(move |a| a.quiz_id == quiz.id && a.student_id == student_id)
}

/// Decide whether `student_id` may open a new attempt, returning the attempt
/// number it would get.
///
/// Every earlier attempt counts towards the limit, including abandoned and
/// expired ones, so restarting cannot be used to preview questions for free.
pub fn check_start(
    quiz: &Quiz,
    student_id: &str,
    attempts: &[QuizAttempt],
    now: DateTime<Utc>,
) -> Result<u32, PolicyViolation> {
    check_availability(quiz, now)?;

    if let Some(open) = student_attempts(quiz, student_id, attempts).find(|a| a.is_in_progress()) {
        return Err(PolicyViolation::AttemptInProgress {
            attempt_id: open.id,
        });
    }

    let used = student_attempts(quiz, student_id, attempts).count() as u32;
    if let Some(max) = quiz.max_attempts.filter(|m| *m > 0) {
        if used >= max {
            return Err(PolicyViolation::AttemptsExhausted { used, max });
        }
    }

    Ok(next_attempt_number(quiz, student_id, attempts))
}

/// Boolean form of [`check_start`].
pub fn can_start_attempt(
    quiz: &Quiz,
    student_id: &str,
    attempts: &[QuizAttempt],
    now: DateTime<Utc>,
) -> bool {
    check_start(quiz, student_id, attempts, now).is_ok()
}

/// The next 1-based attempt number for this student on this quiz.
pub fn next_attempt_number(quiz: &Quiz, student_id: &str, attempts: &[QuizAttempt]) -> u32 {
    student_attempts(quiz, student_id, attempts)
        .map(|a| a.attempt_number)
        .max()
        .unwrap_or(0)
        + 1
}

/// Whether `now` is past the attempt's start plus the quiz time limit.
pub fn is_expired(quiz: &Quiz, attempt: &QuizAttempt, now: DateTime<Utc>) -> bool {
    attempt.deadline(quiz).is_some_and(|deadline| now > deadline)
}

/// In-progress attempts of `quiz` whose time limit has run out.
pub fn expired_attempts<'a>(
    quiz: &'a Quiz,
    attempts: &'a [QuizAttempt],
    now: DateTime<Utc>,
) -> impl Iterator<Item = &'a QuizAttempt> + 'a {
    attempts
        .iter()
        .filter(move |a| a.quiz_id == quiz.id && a.is_in_progress() && is_expired(quiz, a, now))
}

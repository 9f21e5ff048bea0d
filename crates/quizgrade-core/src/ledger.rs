//! Answer ledger: one entry per (attempt, question).
//!
//! An entry holds the raw response and its grading state. Automatic grading
//! runs once at submission; manual grading may overwrite it later.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DataIntegrityError;
use crate::model::Question;
use crate::scoring::{Response, ScoreOutcome, Scorer};

/// A numeric answer as sent by a client: either a JSON number or raw text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericInput {
    Number(f64),
    Raw(String),
}

impl NumericInput {
    fn into_raw(self) -> String {
        match self {
            NumericInput::Number(n) => n.to_string(),
            NumericInput::Raw(s) => s,
        }
    }

    fn is_empty(&self) -> bool {
        matches!(self, NumericInput::Raw(s) if s.trim().is_empty())
    }
}

/// Wire form of one answer. Exactly one response field may be populated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnswerSubmission {
    pub question_id: String,
    #[serde(default)]
    pub selected_options: Option<Vec<String>>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub numeric: Option<NumericInput>,
    #[serde(default)]
    pub file_ref: Option<String>,
    #[serde(default)]
    pub time_spent_seconds: Option<u32>,
}

impl AnswerSubmission {
    pub fn selected<I, S>(question_id: &str, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            question_id: question_id.into(),
            selected_options: Some(ids.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    pub fn text(question_id: &str, text: impl Into<String>) -> Self {
        Self {
            question_id: question_id.into(),
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn numeric(question_id: &str, raw: impl Into<String>) -> Self {
        Self {
            question_id: question_id.into(),
            numeric: Some(NumericInput::Raw(raw.into())),
            ..Default::default()
        }
    }

    pub fn file(question_id: &str, file_ref: impl Into<String>) -> Self {
        Self {
            question_id: question_id.into(),
            file_ref: Some(file_ref.into()),
            ..Default::default()
        }
    }

    /// Number of response fields carrying a non-empty value.
    fn populated_fields(&self) -> usize {
        let selected = self
            .selected_options
            .as_ref()
            .is_some_and(|ids| ids.iter().any(|id| !id.trim().is_empty()));
        let text = self.text.as_ref().is_some_and(|s| !s.trim().is_empty());
        let numeric = self.numeric.as_ref().is_some_and(|n| !n.is_empty());
        let file = self.file_ref.as_ref().is_some_and(|s| !s.trim().is_empty());
        [selected, text, numeric, file].into_iter().filter(|p| *p).count()
    }

    /// Convert to a [`Response`], rejecting submissions that populate more
    /// than one field. An empty submission clears the answer.
    pub fn into_response(self) -> Result<Option<Response>, DataIntegrityError> {
        let populated = self.populated_fields();
        if populated > 1 {
            return Err(DataIntegrityError::AmbiguousSubmission {
                question_id: self.question_id,
                populated,
            });
        }
        if populated == 0 {
            return Ok(None);
        }

        let blank = |s: &String| s.trim().is_empty();
        let response = if let Some(ids) = self
            .selected_options
            .filter(|ids| ids.iter().any(|id| !blank(id)))
        {
            Response::Selected(ids.into_iter().filter(|id| !blank(id)).collect())
        } else if let Some(text) = self.text.filter(|s| !blank(s)) {
            Response::Text(text)
        } else if let Some(numeric) = self.numeric.filter(|n| !n.is_empty()) {
            Response::Numeric(numeric.into_raw())
        } else if let Some(file) = self.file_ref.filter(|s| !blank(s)) {
            Response::File(file)
        } else {
            return Ok(None);
        };
        Ok(Some(response))
    }
}

/// Grading record for one question within one attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerEntry {
    pub question_id: String,
    #[serde(default)]
    pub response: Option<Response>,
    #[serde(default)]
    pub is_graded: bool,
    #[serde(default)]
    pub points_earned: Option<f64>,
    #[serde(default)]
    pub is_correct: Option<bool>,
    #[serde(default)]
    pub grader_feedback: Option<String>,
    #[serde(default)]
    pub graded_by: Option<String>,
    #[serde(default)]
    pub graded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub time_spent_seconds: Option<u32>,
    #[serde(default)]
    pub is_flagged: bool,
    #[serde(default)]
    pub flag_reason: Option<String>,
}

impl AnswerEntry {
    /// An unanswered, ungraded entry for `question_id`.
    pub fn new(question_id: impl Into<String>) -> Self {
        Self {
            question_id: question_id.into(),
            response: None,
            is_graded: false,
            points_earned: None,
            is_correct: None,
            grader_feedback: None,
            graded_by: None,
            graded_at: None,
            time_spent_seconds: None,
            is_flagged: false,
            flag_reason: None,
        }
    }

    /// Record a response, replacing any earlier one.
    pub fn submit(&mut self, response: Option<Response>) {
        self.response = response;
    }

    pub fn has_answer(&self) -> bool {
        self.response.as_ref().is_some_and(|r| !r.is_empty())
    }

    /// Points counted towards the attempt; ungraded counts as zero.
    pub fn points(&self) -> f64 {
        self.points_earned.unwrap_or(0.0)
    }

    /// Grade automatically. Leaves the entry untouched and returns `false`
    /// when the question needs an instructor.
    pub fn auto_grade(&mut self, question: &Question, scorer: &Scorer, now: DateTime<Utc>) -> bool {
        match scorer.score(question, self.response.as_ref()) {
            ScoreOutcome::ManualRequired => false,
            ScoreOutcome::Points(points) => {
                self.points_earned = Some(points);
                self.is_correct = Some(points > 0.0);
                self.is_graded = true;
                self.graded_at = Some(now);
                true
            }
        }
    }

    /// Overwrite the grading fields with an instructor's decision.
    pub fn manual_grade(
        &mut self,
        points: f64,
        correct: bool,
        feedback: Option<String>,
        grader: &str,
        now: DateTime<Utc>,
    ) {
        self.points_earned = Some(points);
        self.is_correct = Some(correct);
        self.grader_feedback = feedback;
        self.graded_by = Some(grader.to_string());
        self.is_graded = true;
        self.graded_at = Some(now);
    }

    /// Earned share of the question's points, as a percentage.
    pub fn percentage_score(&self, question: &Question) -> f64 {
        match self.points_earned {
            Some(points) if question.points > 0.0 => points / question.points * 100.0,
            _ => 0.0,
        }
    }

    pub fn flag(&mut self, reason: impl Into<String>) {
        self.is_flagged = true;
        self.flag_reason = Some(reason.into());
    }

    pub fn unflag(&mut self) {
        self.is_flagged = false;
        self.flag_reason = None;
    }

    pub fn display_answer(&self) -> String {
        match &self.response {
            Some(r) if !r.is_empty() => r.display(),
            _ => "No answer provided".to_string(),
        }
    }
}

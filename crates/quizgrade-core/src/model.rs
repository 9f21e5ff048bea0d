//! Core data model types for quizgrade.
//!
//! A [`Quiz`] owns its [`Question`]s, and choice-based questions own their
//! [`AnswerOption`]s. These types are authored once and read-only while
//! attempts are graded.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kind of a question, which decides how it is scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    SingleChoice,
    MultiSelect,
    TrueFalse,
    ShortAnswer,
    Essay,
    FillInBlank,
    Matching,
    Ordering,
    Numerical,
    FileUpload,
}

impl QuestionType {
    /// Types whose answers are picked from a discrete option list.
    pub fn has_options(self) -> bool {
        matches!(
            self,
            QuestionType::SingleChoice
                | QuestionType::MultiSelect
                | QuestionType::TrueFalse
                | QuestionType::Matching
                | QuestionType::Ordering
        )
    }

    /// Types answered with free text.
    pub fn is_text_based(self) -> bool {
        matches!(
            self,
            QuestionType::ShortAnswer | QuestionType::Essay | QuestionType::FillInBlank
        )
    }

    /// Exactly one option may be selected.
    pub fn is_single_choice(self) -> bool {
        matches!(self, QuestionType::SingleChoice | QuestionType::TrueFalse)
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QuestionType::SingleChoice => "single_choice",
            QuestionType::MultiSelect => "multi_select",
            QuestionType::TrueFalse => "true_false",
            QuestionType::ShortAnswer => "short_answer",
            QuestionType::Essay => "essay",
            QuestionType::FillInBlank => "fill_in_blank",
            QuestionType::Matching => "matching",
            QuestionType::Ordering => "ordering",
            QuestionType::Numerical => "numerical",
            QuestionType::FileUpload => "file_upload",
        };
        f.write_str(s)
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "single_choice" | "multiple_choice" => Ok(QuestionType::SingleChoice),
            "multi_select" | "multiple_select" => Ok(QuestionType::MultiSelect),
            "true_false" => Ok(QuestionType::TrueFalse),
            "short_answer" => Ok(QuestionType::ShortAnswer),
            "essay" => Ok(QuestionType::Essay),
            "fill_in_blank" => Ok(QuestionType::FillInBlank),
            "matching" => Ok(QuestionType::Matching),
            "ordering" => Ok(QuestionType::Ordering),
            "numerical" | "numeric" => Ok(QuestionType::Numerical),
            "file_upload" => Ok(QuestionType::FileUpload),
            other => Err(format!("unknown question type: {other}")),
        }
    }
}

/// One selectable option of a choice-based question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerOption {
    /// Identifier unique within the question.
    pub id: String,
    /// Option text. For numerical questions this holds the numeric key.
    pub text: String,
    /// Whether selecting this option is (part of) the correct answer.
    #[serde(default)]
    pub is_correct: bool,
    /// Display position.
    #[serde(default)]
    pub order_index: u32,
    /// Partial-credit override, used only by the partial-credit strategy.
    #[serde(default)]
    pub points_if_selected: Option<f64>,
    /// Shown to the student after review.
    #[serde(default)]
    pub explanation: Option<String>,
}

impl AnswerOption {
    /// Value of selecting this option: the override, else 1 if correct.
    pub fn point_value(&self) -> f64 {
        match self.points_if_selected {
            Some(points) => points,
            None if self.is_correct => 1.0,
            None => 0.0,
        }
    }
}

/// A single question in a quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    /// Prompt shown to the student.
    #[serde(default)]
    pub text: String,
    pub question_type: QuestionType,
    /// Points awarded for a fully correct answer.
    #[serde(default = "default_points")]
    pub points: f64,
    #[serde(default)]
    pub order_index: u32,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default = "default_true")]
    pub required: bool,
    /// Per-question time limit; advisory for clients.
    #[serde(default)]
    pub time_limit_seconds: Option<u32>,
    #[serde(default)]
    pub options: Vec<AnswerOption>,
}

fn default_points() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

impl Question {
    /// Options flagged correct, in authoring order.
    pub fn correct_options(&self) -> impl Iterator<Item = &AnswerOption> {
        self.options.iter().filter(|o| o.is_correct)
    }

    /// Whether at least one option is flagged correct.
    pub fn has_answer_key(&self) -> bool {
        self.options.iter().any(|o| o.is_correct)
    }

    /// Whether an instructor has to assign this question's points.
    ///
    /// Every caller that decides attempt completion or reports grading state
    /// goes through this one predicate.
    pub fn requires_manual_grading(&self) -> bool {
        match self.question_type {
            QuestionType::Essay
            | QuestionType::FileUpload
            | QuestionType::FillInBlank
            | QuestionType::Matching
            | QuestionType::Ordering => true,
            QuestionType::ShortAnswer => !self.has_answer_key(),
            QuestionType::SingleChoice
            | QuestionType::MultiSelect
            | QuestionType::TrueFalse
            | QuestionType::Numerical => false,
        }
    }

    pub fn option(&self, option_id: &str) -> Option<&AnswerOption> {
        self.options.iter().find(|o| o.id == option_id)
    }

    pub fn has_options(&self) -> bool {
        self.question_type.has_options()
    }

    pub fn is_text_based(&self) -> bool {
        self.question_type.is_text_based()
    }

    pub fn has_time_limit(&self) -> bool {
        self.time_limit_seconds.is_some_and(|s| s > 0)
    }
}

/// How the quiz counts towards a grade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizType {
    #[default]
    Practice,
    Graded,
    Survey,
    Exam,
}

/// Rule for turning several attempts into one reportable score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReductionMethod {
    #[default]
    Highest,
    Latest,
    Average,
    First,
}

impl fmt::Display for ReductionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReductionMethod::Highest => write!(f, "highest"),
            ReductionMethod::Latest => write!(f, "latest"),
            ReductionMethod::Average => write!(f, "average"),
            ReductionMethod::First => write!(f, "first"),
        }
    }
}

impl FromStr for ReductionMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "highest" | "highest_score" | "best" => Ok(ReductionMethod::Highest),
            "latest" | "latest_score" | "last" => Ok(ReductionMethod::Latest),
            "average" | "average_score" | "mean" => Ok(ReductionMethod::Average),
            "first" | "first_score" => Ok(ReductionMethod::First),
            other => Err(format!("unknown reduction method: {other}")),
        }
    }
}

/// A quiz: the aggregate root for start, expiry, and reduction policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub quiz_type: QuizType,
    #[serde(default)]
    pub published: bool,
    /// Minutes allowed per attempt; `None` or 0 means no limit.
    #[serde(default)]
    pub time_limit_minutes: Option<u32>,
    /// Attempts allowed per student; `None` or 0 means unlimited.
    #[serde(default)]
    pub max_attempts: Option<u32>,
    /// Minimum percentage that counts as a pass.
    #[serde(default)]
    pub passing_score: Option<f64>,
    #[serde(default)]
    pub reduction: ReductionMethod,
    #[serde(default)]
    pub available_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub available_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl Quiz {
    /// Sum of the point values of the current question set.
    ///
    /// Always derived; there is no cached total that could go stale.
    pub fn total_points(&self) -> f64 {
        self.questions.iter().map(|q| q.points).sum()
    }

    pub fn question(&self, question_id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    /// Questions sorted by their ordering index.
    pub fn ordered_questions(&self) -> Vec<&Question> {
        let mut questions: Vec<&Question> = self.questions.iter().collect();
        questions.sort_by_key(|q| q.order_index);
        questions
    }

    pub fn has_time_limit(&self) -> bool {
        self.time_limit_minutes.is_some_and(|m| m > 0)
    }

    /// The per-attempt time limit, if one is configured.
    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_minutes
            .filter(|m| *m > 0)
            .map(|m| Duration::minutes(i64::from(m)))
    }

    pub fn has_attempt_limit(&self) -> bool {
        self.max_attempts.is_some_and(|m| m > 0)
    }

    /// Past the close of the availability window.
    ///
    /// The close instant itself counts as closed for starts, while a
    /// submission at that instant is still on time (see
    /// [`QuizAttempt::submit`](crate::attempt::QuizAttempt::submit)).
    pub fn is_closed(&self, now: DateTime<Utc>) -> bool {
        self.available_until.is_some_and(|until| now >= until)
    }

    /// Whether `percentage` meets the passing threshold.
    pub fn is_passing(&self, percentage: f64) -> bool {
        self.passing_score.is_some_and(|p| percentage >= p)
    }
}

/// Role of the user acting on the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Instructor,
    Admin,
}

impl Role {
    /// Whether this role may award points.
    pub fn can_grade(self) -> bool {
        matches!(self, Role::Instructor | Role::Admin)
    }
}

/// Identity supplied by the authentication layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    pub role: Role,
}

impl UserIdentity {
    pub fn student(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Student,
        }
    }

    pub fn instructor(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Instructor,
        }
    }
}

//! Per-type scoring strategies.
//!
//! Scoring is pure: the same question and response always produce the same
//! outcome, and malformed student input (unknown option ids, unparsable
//! numbers) degrades to zero points instead of failing the grading pass.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::{MultiSelectScoring, ScoringConfig};
use crate::model::{Question, QuestionType};

/// A student's response to one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Response {
    /// Selected option ids.
    Selected(Vec<String>),
    /// Free text.
    Text(String),
    /// Numeric answer as typed; parsed at scoring time.
    Numeric(String),
    /// Reference to an uploaded file.
    File(String),
}

impl Response {
    /// Whether the response carries no actual answer.
    pub fn is_empty(&self) -> bool {
        match self {
            Response::Selected(ids) => ids.iter().all(|id| id.trim().is_empty()),
            Response::Text(s) | Response::Numeric(s) | Response::File(s) => s.trim().is_empty(),
        }
    }

    /// Human-readable rendering for reports.
    pub fn display(&self) -> String {
        match self {
            Response::Selected(ids) => ids.join(","),
            Response::Text(s) | Response::Numeric(s) => s.clone(),
            Response::File(url) => format!("File uploaded: {url}"),
        }
    }
}

/// Result of scoring one answer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreOutcome {
    /// Points earned, never negative.
    Points(f64),
    /// The question has no automatic rule; an instructor must grade it.
    ManualRequired,
}

impl ScoreOutcome {
    pub fn points(self) -> Option<f64> {
        match self {
            ScoreOutcome::Points(p) => Some(p),
            ScoreOutcome::ManualRequired => None,
        }
    }
}

/// The scoring rule applied to one question, chosen by its type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoringStrategy {
    /// Single-choice and true/false.
    SingleChoice,
    MultiSelect(MultiSelectScoring),
    Numerical { tolerance: f64 },
    /// Short answer matched against the answer key.
    ShortAnswer { case_sensitive: bool },
    Manual,
}

impl ScoringStrategy {
    /// Pick the strategy for `question`.
    ///
    /// Returns [`ScoringStrategy::Manual`] exactly when
    /// [`Question::requires_manual_grading`] is true.
    pub fn for_question(question: &Question, config: &ScoringConfig) -> Self {
        if question.requires_manual_grading() {
            return ScoringStrategy::Manual;
        }
        match question.question_type {
            QuestionType::SingleChoice | QuestionType::TrueFalse => ScoringStrategy::SingleChoice,
            QuestionType::MultiSelect => ScoringStrategy::MultiSelect(config.multi_select),
            QuestionType::Numerical => ScoringStrategy::Numerical {
                tolerance: config.numeric_tolerance,
            },
            QuestionType::ShortAnswer => ScoringStrategy::ShortAnswer {
                case_sensitive: config.short_answer_case_sensitive,
            },
            _ => ScoringStrategy::Manual,
        }
    }

    /// Score `response` against `question` with this strategy.
    pub fn score(&self, question: &Question, response: Option<&Response>) -> ScoreOutcome {
        let points = match self {
            ScoringStrategy::Manual => return ScoreOutcome::ManualRequired,
            ScoringStrategy::SingleChoice => score_single_choice(question, response),
            ScoringStrategy::MultiSelect(MultiSelectScoring::AllOrNothing) => {
                score_multi_select(question, response)
            }
            ScoringStrategy::MultiSelect(MultiSelectScoring::PartialCredit) => {
                score_multi_select_partial(question, response)
            }
            ScoringStrategy::Numerical { tolerance } => {
                score_numerical(question, response, *tolerance)
            }
            ScoringStrategy::ShortAnswer { case_sensitive } => {
                score_short_answer(question, response, *case_sensitive)
            }
        };
        ScoreOutcome::Points(points.max(0.0))
    }
}

/// Scores answers according to a [`ScoringConfig`].
#[derive(Debug, Clone, Default)]
pub struct Scorer {
    config: ScoringConfig,
}

impl Scorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn strategy(&self, question: &Question) -> ScoringStrategy {
        ScoringStrategy::for_question(question, &self.config)
    }

    pub fn score(&self, question: &Question, response: Option<&Response>) -> ScoreOutcome {
        let strategy = self.strategy(question);
        let outcome = strategy.score(question, response);
        tracing::debug!(
            question = %question.id,
            ?strategy,
            ?outcome,
            "scored answer"
        );
        outcome
    }
}

fn selected_ids(response: Option<&Response>) -> &[String] {
    match response {
        Some(Response::Selected(ids)) => ids,
        _ => &[],
    }
}

/// Full points iff the single selected option is flagged correct.
pub fn score_single_choice(question: &Question, response: Option<&Response>) -> f64 {
    let [selected] = selected_ids(response) else {
        return 0.0;
    };
    match question.option(selected.trim()) {
        Some(option) if option.is_correct => question.points,
        _ => 0.0,
    }
}

/// All-or-nothing: full points iff the selection equals the correct set.
pub fn score_multi_select(question: &Question, response: Option<&Response>) -> f64 {
    let correct: HashSet<&str> = question.correct_options().map(|o| o.id.as_str()).collect();
    if correct.is_empty() {
        return 0.0;
    }
    let selected: HashSet<&str> = selected_ids(response).iter().map(|s| s.trim()).collect();
    if selected == correct {
        question.points
    } else {
        0.0
    }
}

/// Partial credit: each selected option contributes its override, or an
/// equal share of the question's points if it is correct. The sum is clamped
/// to `0..=points`.
pub fn score_multi_select_partial(question: &Question, response: Option<&Response>) -> f64 {
    let correct_count = question.correct_options().count();
    if correct_count == 0 {
        return 0.0;
    }
    let share = question.points / correct_count as f64;
    let selected: HashSet<&str> = selected_ids(response).iter().map(|s| s.trim()).collect();

    let earned: f64 = selected
        .into_iter()
        .filter_map(|id| question.option(id))
        .map(|option| match option.points_if_selected {
            Some(points) => points,
            None if option.is_correct => share,
            None => 0.0,
        })
        .sum();
    earned.clamp(0.0, question.points)
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Full points if the answer is within `tolerance` of any correct key.
pub fn score_numerical(question: &Question, response: Option<&Response>, tolerance: f64) -> f64 {
    let raw = match response {
        Some(Response::Numeric(s)) | Some(Response::Text(s)) => s,
        _ => return 0.0,
    };
    let Some(value) = parse_number(raw) else {
        return 0.0;
    };
    let matched = question
        .correct_options()
        .filter_map(|o| parse_number(&o.text))
        .any(|key| {
            let diff = (key - value).abs();
            // an exact match counts even at zero tolerance
            diff == 0.0 || diff < tolerance
        });
    if matched {
        question.points
    } else {
        0.0
    }
}

/// Full points if the trimmed text equals any correct option's text.
pub fn score_short_answer(
    question: &Question,
    response: Option<&Response>,
    case_sensitive: bool,
) -> f64 {
    let Some(Response::Text(text)) = response else {
        return 0.0;
    };
    let answer = text.trim();
    if answer.is_empty() {
        return 0.0;
    }
    let matched = question.correct_options().any(|o| {
        let key = o.text.trim();
        if case_sensitive {
            key == answer
        } else {
            key.to_lowercase() == answer.to_lowercase()
        }
    });
    if matched {
        question.points
    } else {
        0.0
    }
}

//! TOML quiz definition parser.
//!
//! Loads quizzes from TOML files and directories, and validates them.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::model::{AnswerOption, Question, QuestionType, Quiz, QuizType, ReductionMethod};

/// Intermediate TOML structure for parsing quiz files.
#[derive(Debug, Deserialize)]
struct TomlQuizFile {
    quiz: TomlQuizHeader,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
}

#[derive(Debug, Deserialize)]
struct TomlQuizHeader {
    id: String,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    quiz_type: QuizType,
    #[serde(default = "default_true")]
    published: bool,
    #[serde(default)]
    time_limit_minutes: Option<u32>,
    #[serde(default)]
    max_attempts: Option<u32>,
    #[serde(default)]
    passing_score: Option<f64>,
    #[serde(default)]
    reduction: Option<String>,
    #[serde(default)]
    available_from: Option<String>,
    #[serde(default)]
    available_until: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    id: String,
    #[serde(rename = "type")]
    question_type: String,
    #[serde(default)]
    text: String,
    #[serde(default = "default_points")]
    points: f64,
    #[serde(default)]
    order_index: Option<u32>,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default = "default_true")]
    required: bool,
    #[serde(default)]
    time_limit_seconds: Option<u32>,
    /// Shorthand answer key for numerical and short-answer questions.
    #[serde(default)]
    answers: Vec<String>,
    #[serde(default)]
    options: Vec<TomlOption>,
}

#[derive(Debug, Deserialize)]
struct TomlOption {
    id: String,
    text: String,
    #[serde(default)]
    correct: bool,
    #[serde(default)]
    points_if_selected: Option<f64>,
    #[serde(default)]
    explanation: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_points() -> f64 {
    1.0
}

fn parse_timestamp(field: &str, raw: Option<String>) -> Result<Option<DateTime<Utc>>> {
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .with_context(|| format!("invalid {field} timestamp: {s}"))
    })
    .transpose()
}

/// Parse a single TOML file into a `Quiz`.
pub fn parse_quiz(path: &Path) -> Result<Quiz> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read quiz file: {}", path.display()))?;

    parse_quiz_str(&content, path)
}

/// Parse a TOML string into a `Quiz`.
pub fn parse_quiz_str(content: &str, source_path: &Path) -> Result<Quiz> {
    let parsed: TomlQuizFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;
    let header = parsed.quiz;

    let reduction: ReductionMethod = header
        .reduction
        .map(|r| r.parse().map_err(|e: String| anyhow::anyhow!("{}", e)))
        .transpose()?
        .unwrap_or_default();

    let questions = parsed
        .questions
        .into_iter()
        .enumerate()
        .map(|(position, q)| {
            let question_type: QuestionType = q
                .question_type
                .parse()
                .map_err(|e: String| anyhow::anyhow!("question {}: {}", q.id, e))?;

            let mut options: Vec<AnswerOption> = q
                .options
                .into_iter()
                .enumerate()
                .map(|(i, o)| AnswerOption {
                    id: o.id,
                    text: o.text,
                    is_correct: o.correct,
                    order_index: i as u32,
                    points_if_selected: o.points_if_selected,
                    explanation: o.explanation,
                })
                .collect();
            let offset = options.len();
            options.extend(q.answers.into_iter().enumerate().map(|(i, text)| AnswerOption {
                id: format!("key-{}", i + 1),
                text,
                is_correct: true,
                order_index: (offset + i) as u32,
                points_if_selected: None,
                explanation: None,
            }));

            Ok(Question {
                id: q.id,
                text: q.text,
                question_type,
                points: q.points,
                order_index: q.order_index.unwrap_or(position as u32),
                explanation: q.explanation,
                required: q.required,
                time_limit_seconds: q.time_limit_seconds,
                options,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Quiz {
        id: header.id,
        title: header.title,
        description: header.description,
        quiz_type: header.quiz_type,
        published: header.published,
        time_limit_minutes: header.time_limit_minutes,
        max_attempts: header.max_attempts,
        passing_score: header.passing_score,
        reduction,
        available_from: parse_timestamp("available_from", header.available_from)?,
        available_until: parse_timestamp("available_until", header.available_until)?,
        questions,
    })
}

/// Recursively load all `.toml` quiz files from a directory.
pub fn load_quiz_directory(dir: &Path) -> Result<Vec<Quiz>> {
    let mut quizzes = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let path = entry?.path();

        if path.is_dir() {
            quizzes.extend(load_quiz_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_quiz(&path) {
                Ok(quiz) => quizzes.push(quiz),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    quizzes.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(quizzes)
}

/// Load one file, or every quiz under a directory.
pub fn load_quizzes(path: &Path) -> Result<Vec<Quiz>> {
    if path.is_dir() {
        load_quiz_directory(path)
    } else {
        Ok(vec![parse_quiz(path)?])
    }
}

/// A warning from quiz validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The question ID (if applicable).
    pub question_id: Option<String>,
    pub message: String,
}

impl ValidationWarning {
    fn quiz(message: impl Into<String>) -> Self {
        Self {
            question_id: None,
            message: message.into(),
        }
    }

    fn question(question: &Question, message: impl Into<String>) -> Self {
        Self {
            question_id: Some(question.id.clone()),
            message: message.into(),
        }
    }
}

/// Validate a quiz for authoring mistakes that would make grading misleading.
pub fn validate_quiz(quiz: &Quiz) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if let (Some(from), Some(until)) = (quiz.available_from, quiz.available_until) {
        if until <= from {
            warnings.push(ValidationWarning::quiz(format!(
                "available_until ({until}) is not after available_from ({from})"
            )));
        }
    }
    if quiz.total_points() <= 0.0 {
        warnings.push(ValidationWarning::quiz(
            "quiz is worth zero points; every percentage will be 0",
        ));
    }
    if let Some(passing) = quiz.passing_score {
        if !(0.0..=100.0).contains(&passing) {
            warnings.push(ValidationWarning::quiz(format!(
                "passing_score {passing} is outside 0..=100"
            )));
        }
    }

    let mut seen_questions = HashSet::new();
    for q in &quiz.questions {
        if !seen_questions.insert(q.id.as_str()) {
            warnings.push(ValidationWarning::question(
                q,
                format!("duplicate question ID: {}", q.id),
            ));
        }
        if q.points < 0.0 {
            warnings.push(ValidationWarning::question(q, "points are negative"));
        }

        let mut seen_options = HashSet::new();
        for o in &q.options {
            if !seen_options.insert(o.id.as_str()) {
                warnings.push(ValidationWarning::question(
                    q,
                    format!("duplicate option ID: {}", o.id),
                ));
            }
        }

        let correct = q.correct_options().count();
        match q.question_type {
            QuestionType::SingleChoice | QuestionType::TrueFalse | QuestionType::MultiSelect
                if correct == 0 =>
            {
                warnings.push(ValidationWarning::question(
                    q,
                    "no option is marked correct; nobody can score",
                ));
            }
            QuestionType::SingleChoice | QuestionType::TrueFalse if correct > 1 => {
                warnings.push(ValidationWarning::question(
                    q,
                    format!("{correct} options marked correct on a single-answer question"),
                ));
            }
            QuestionType::Numerical => {
                if correct == 0 {
                    warnings.push(ValidationWarning::question(q, "numerical question has no key"));
                }
                for key in q.correct_options() {
                    if key.text.trim().parse::<f64>().is_err() {
                        warnings.push(ValidationWarning::question(
                            q,
                            format!("numerical key '{}' does not parse as a number", key.text),
                        ));
                    }
                }
            }
            QuestionType::ShortAnswer if correct == 0 => {
                warnings.push(ValidationWarning::question(
                    q,
                    "short answer has no key and will need manual grading",
                ));
            }
            _ => {}
        }
    }

    warnings
}

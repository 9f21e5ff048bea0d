//! Engine configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Strategy used for multi-select questions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiSelectScoring {
    /// Full points only for exactly the correct set.
    #[default]
    AllOrNothing,
    /// Sum of per-option credit, clamped to the question's points.
    PartialCredit,
}

/// What happens to an attempt that outlives its time limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryMode {
    /// Grade whatever was saved and tag the attempt as auto-submitted.
    #[default]
    AutoSubmit,
    /// Move the attempt to `EXPIRED` without scoring.
    MarkExpired,
}

/// Knobs for the automatic scorer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Absolute tolerance for numerical answers.
    #[serde(default = "default_tolerance")]
    pub numeric_tolerance: f64,
    #[serde(default)]
    pub multi_select: MultiSelectScoring,
    /// Compare short answers byte-for-byte instead of case-insensitively.
    #[serde(default)]
    pub short_answer_case_sensitive: bool,
}

fn default_tolerance() -> f64 {
    0.001
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            numeric_tolerance: default_tolerance(),
            multi_select: MultiSelectScoring::default(),
            short_answer_case_sensitive: false,
        }
    }
}

/// Top-level quizgrade configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuizgradeConfig {
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub expiry_mode: ExpiryMode,
    /// Maximum attempts one sweep transitions (None = no cap).
    #[serde(default)]
    pub sweep_batch_limit: Option<usize>,
}

impl QuizgradeConfig {
    /// Reject values the scorer cannot work with.
    pub fn validate(&self) -> Result<()> {
        let tolerance = self.scoring.numeric_tolerance;
        anyhow::ensure!(
            tolerance.is_finite() && tolerance >= 0.0,
            "numeric_tolerance must be a non-negative number, got {tolerance}"
        );
        if let Some(limit) = self.sweep_batch_limit {
            anyhow::ensure!(limit > 0, "sweep_batch_limit must be at least 1");
        }
        Ok(())
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `quizgrade.toml` in the current directory
/// 2. `~/.config/quizgrade/config.toml`
///
/// Environment variable override: `QUIZGRADE_NUMERIC_TOLERANCE`.
pub fn load_config() -> Result<QuizgradeConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<QuizgradeConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("quizgrade.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            parse_config(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => QuizgradeConfig::default(),
    };

    if let Ok(raw) = std::env::var("QUIZGRADE_NUMERIC_TOLERANCE") {
        config.scoring.numeric_tolerance = raw
            .trim()
            .parse()
            .with_context(|| format!("invalid QUIZGRADE_NUMERIC_TOLERANCE: {raw}"))?;
    }

    config.validate()?;
    Ok(config)
}

/// Parse a TOML config string.
pub fn parse_config(content: &str) -> Result<QuizgradeConfig> {
    let config: QuizgradeConfig = toml::from_str(content)?;
    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("quizgrade"))
}

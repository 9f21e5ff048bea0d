//! In-memory collaborators for tests and offline tooling.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use uuid::Uuid;

use crate::attempt::QuizAttempt;
use crate::model::Quiz;
use crate::traits::{AttemptStore, GradingEventSink, GradingSignal, QuizCatalog};

/// Quiz definitions held in a map.
#[derive(Default)]
pub struct InMemoryCatalog {
    quizzes: RwLock<HashMap<String, Quiz>>,
}

impl InMemoryCatalog {
    pub fn new<I: IntoIterator<Item = Quiz>>(quizzes: I) -> Self {
        Self {
            quizzes: RwLock::new(quizzes.into_iter().map(|q| (q.id.clone(), q)).collect()),
        }
    }

    /// Add or replace a quiz definition.
    pub fn upsert(&self, quiz: Quiz) {
        self.quizzes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(quiz.id.clone(), quiz);
    }
}

#[async_trait]
impl QuizCatalog for InMemoryCatalog {
    async fn quiz(&self, quiz_id: &str) -> anyhow::Result<Option<Quiz>> {
        let quizzes = self
            .quizzes
            .read()
            .map_err(|_| anyhow::anyhow!("quiz catalog lock poisoned"))?;
        Ok(quizzes.get(quiz_id).cloned())
    }
}

/// Attempts held in a map, keyed by id.
#[derive(Default)]
pub struct InMemoryAttemptStore {
    attempts: RwLock<HashMap<Uuid, QuizAttempt>>,
}

impl InMemoryAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored attempts.
    pub fn len(&self) -> usize {
        self.attempts.read().map(|a| a.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn sorted(mut attempts: Vec<QuizAttempt>) -> Vec<QuizAttempt> {
        attempts.sort_by(|a, b| {
            (&a.student_id, a.attempt_number).cmp(&(&b.student_id, b.attempt_number))
        });
        attempts
    }
}

#[async_trait]
impl AttemptStore for InMemoryAttemptStore {
    async fn load(&self, attempt_id: Uuid) -> anyhow::Result<Option<QuizAttempt>> {
        let attempts = self
            .attempts
            .read()
            .map_err(|_| anyhow::anyhow!("attempt store lock poisoned"))?;
        Ok(attempts.get(&attempt_id).cloned())
    }

    async fn list_for_student(
        &self,
        quiz_id: &str,
        student_id: &str,
    ) -> anyhow::Result<Vec<QuizAttempt>> {
        let attempts = self
            .attempts
            .read()
            .map_err(|_| anyhow::anyhow!("attempt store lock poisoned"))?;
        Ok(Self::sorted(
            attempts
                .values()
                .filter(|a| a.quiz_id == quiz_id && a.student_id == student_id)
                .cloned()
                .collect(),
        ))
    }

    async fn list_for_quiz(&self, quiz_id: &str) -> anyhow::Result<Vec<QuizAttempt>> {
        let attempts = self
            .attempts
            .read()
            .map_err(|_| anyhow::anyhow!("attempt store lock poisoned"))?;
        Ok(Self::sorted(
            attempts
                .values()
                .filter(|a| a.quiz_id == quiz_id)
                .cloned()
                .collect(),
        ))
    }

    async fn save(&self, attempt: &QuizAttempt) -> anyhow::Result<()> {
        let mut attempts = self
            .attempts
            .write()
            .map_err(|_| anyhow::anyhow!("attempt store lock poisoned"))?;
        attempts.insert(attempt.id, attempt.clone());
        Ok(())
    }
}

/// Sink that keeps every signal it receives.
#[derive(Default)]
pub struct RecordingSink {
    signals: Mutex<Vec<GradingSignal>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals received so far, oldest first.
    pub fn signals(&self) -> Vec<GradingSignal> {
        self.signals
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

impl GradingEventSink for RecordingSink {
    fn emit(&self, signal: &GradingSignal) {
        if let Ok(mut signals) = self.signals.lock() {
            signals.push(signal.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::*;
    use chrono::Utc;

    #[tokio::test]
    async fn store_lists_by_quiz_and_student() {
        let quiz = choice_and_essay_quiz();
        let store = InMemoryAttemptStore::new();
        let now = Utc::now();
        let a2 = QuizAttempt::start(&quiz, "alice", 2, now);
        let a1 = QuizAttempt::start(&quiz, "alice", 1, now);
        let b1 = QuizAttempt::start(&quiz, "bob", 1, now);
        for a in [&a2, &a1, &b1] {
            store.save(a).await.unwrap();
        }

        let alice = store.list_for_student(&quiz.id, "alice").await.unwrap();
        assert_eq!(
            alice.iter().map(|a| a.attempt_number).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(store.list_for_quiz(&quiz.id).await.unwrap().len(), 3);
        assert!(store.list_for_quiz("missing").await.unwrap().is_empty());
        assert_eq!(store.load(b1.id).await.unwrap().unwrap().student_id, "bob");
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn catalog_upsert_replaces() {
        let mut quiz = choice_and_essay_quiz();
        let catalog = InMemoryCatalog::new([quiz.clone()]);
        quiz.title = "Renamed".into();
        catalog.upsert(quiz.clone());
        let found = catalog.quiz(&quiz.id).await.unwrap().unwrap();
        assert_eq!(found.title, "Renamed");
        assert!(catalog.quiz("nope").await.unwrap().is_none());
    }
}

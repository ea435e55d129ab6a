use async_trait::async_trait;
use quiz_core::model::{
    AttemptResult, NewAttemptResult, Question, QuestionId, Quiz, QuizId, ResultId,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    /// Transient failure; the same write may succeed if retried.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("connection error: {0}")]
    Connection(String),

    /// The backend refused the write, e.g. a constraint violation.
    #[error("rejected by store: {0}")]
    Rejected(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StorageError {
    /// Whether retrying the same operation can reasonably succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Connection(_))
    }
}

/// Repository contract for quizzes.
#[async_trait]
pub trait QuizStore: Send + Sync {
    /// Persist or update a quiz.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the quiz cannot be stored.
    async fn upsert_quiz(&self, quiz: &Quiz) -> Result<(), StorageError>;

    /// Fetch a quiz by ID, returning `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` for backend failures.
    async fn get_quiz(&self, id: QuizId) -> Result<Option<Quiz>, StorageError>;

    /// List quizzes, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` for backend failures.
    async fn list_quizzes(&self) -> Result<Vec<Quiz>, StorageError>;
}

/// Read side used when an attempt starts, plus the write used by seeding.
#[async_trait]
pub trait QuestionStore: Send + Sync {
    /// Persist or update a question.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the question cannot be stored.
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError>;

    /// All questions of a quiz. Order is not significant to scoring.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` for backend failures.
    async fn fetch_questions(&self, quiz_id: QuizId) -> Result<Vec<Question>, StorageError>;

    /// Number of questions across all quizzes.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` for backend failures.
    async fn count_questions(&self) -> Result<u64, StorageError>;
}

/// Append-only store of scored attempts.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Insert a result and return it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Unavailable` on transient failures, or other storage errors.
    async fn insert_result(&self, result: &NewAttemptResult)
    -> Result<AttemptResult, StorageError>;

    /// All results for one quiz, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` for backend failures.
    async fn list_results(&self, quiz_id: QuizId) -> Result<Vec<AttemptResult>, StorageError>;

    /// Results across every quiz.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` for backend failures.
    async fn list_all_results(&self) -> Result<Vec<AttemptResult>, StorageError>;

    /// Number of stored results across all quizzes.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` for backend failures.
    async fn count_results(&self) -> Result<u64, StorageError>;
}

#[derive(Default)]
struct ResultTable {
    next_id: u64,
    rows: Vec<AttemptResult>,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    quizzes: Arc<Mutex<HashMap<QuizId, Quiz>>>,
    questions: Arc<Mutex<HashMap<QuestionId, Question>>>,
    results: Arc<Mutex<ResultTable>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn count_u64(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

#[async_trait]
impl QuizStore for InMemoryRepository {
    async fn upsert_quiz(&self, quiz: &Quiz) -> Result<(), StorageError> {
        let mut guard = self.quizzes.lock().map_err(poisoned)?;
        guard.insert(quiz.id(), quiz.clone());
        Ok(())
    }

    async fn get_quiz(&self, id: QuizId) -> Result<Option<Quiz>, StorageError> {
        let guard = self.quizzes.lock().map_err(poisoned)?;
        Ok(guard.get(&id).cloned())
    }

    async fn list_quizzes(&self) -> Result<Vec<Quiz>, StorageError> {
        let guard = self.quizzes.lock().map_err(poisoned)?;
        let mut quizzes: Vec<Quiz> = guard.values().cloned().collect();
        quizzes.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id().cmp(&a.id()))
        });
        Ok(quizzes)
    }
}

#[async_trait]
impl QuestionStore for InMemoryRepository {
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        let mut guard = self.questions.lock().map_err(poisoned)?;
        guard.insert(question.id(), question.clone());
        Ok(())
    }

    async fn fetch_questions(&self, quiz_id: QuizId) -> Result<Vec<Question>, StorageError> {
        let guard = self.questions.lock().map_err(poisoned)?;
        let mut found: Vec<Question> = guard
            .values()
            .filter(|q| q.quiz_id() == quiz_id)
            .cloned()
            .collect();
        found.sort_by_key(Question::id);
        Ok(found)
    }

    async fn count_questions(&self) -> Result<u64, StorageError> {
        let guard = self.questions.lock().map_err(poisoned)?;
        Ok(count_u64(guard.len()))
    }
}

#[async_trait]
impl ResultStore for InMemoryRepository {
    async fn insert_result(
        &self,
        result: &NewAttemptResult,
    ) -> Result<AttemptResult, StorageError> {
        let mut guard = self.results.lock().map_err(poisoned)?;
        guard.next_id += 1;
        let stored = result.clone().with_id(ResultId::new(guard.next_id));
        guard.rows.push(stored.clone());
        Ok(stored)
    }

    async fn list_results(&self, quiz_id: QuizId) -> Result<Vec<AttemptResult>, StorageError> {
        let guard = self.results.lock().map_err(poisoned)?;
        Ok(guard
            .rows
            .iter()
            .filter(|r| r.quiz_id() == quiz_id)
            .cloned()
            .collect())
    }

    async fn list_all_results(&self) -> Result<Vec<AttemptResult>, StorageError> {
        let guard = self.results.lock().map_err(poisoned)?;
        Ok(guard.rows.clone())
    }

    async fn count_results(&self) -> Result<u64, StorageError> {
        let guard = self.results.lock().map_err(poisoned)?;
        Ok(count_u64(guard.rows.len()))
    }
}

/// Aggregates the stores behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub quizzes: Arc<dyn QuizStore>,
    pub questions: Arc<dyn QuestionStore>,
    pub results: Arc<dyn ResultStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let quizzes: Arc<dyn QuizStore> = Arc::new(repo.clone());
        let questions: Arc<dyn QuestionStore> = Arc::new(repo.clone());
        let results: Arc<dyn ResultStore> = Arc::new(repo);
        Self {
            quizzes,
            questions,
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use quiz_core::model::{OptionKey, QuestionOptions};
    use quiz_core::time::fixed_now;

    fn build_question(id: u64, quiz_id: QuizId) -> Question {
        Question::new(
            QuestionId::new(id),
            quiz_id,
            format!("Q{id}"),
            QuestionOptions::new("a", "b", "c", "d"),
            OptionKey::A,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn questions_are_scoped_to_quiz() {
        let repo = InMemoryRepository::new();
        repo.upsert_question(&build_question(1, QuizId::new(1)))
            .await
            .unwrap();
        repo.upsert_question(&build_question(2, QuizId::new(2)))
            .await
            .unwrap();
        repo.upsert_question(&build_question(3, QuizId::new(1)))
            .await
            .unwrap();

        let fetched = repo.fetch_questions(QuizId::new(1)).await.unwrap();
        let ids: Vec<u64> = fetched.iter().map(|q| q.id().value()).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(repo.count_questions().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn insert_assigns_increasing_ids() {
        let repo = InMemoryRepository::new();
        let draft = NewAttemptResult::new(QuizId::new(1), "Ana", 1, 2, fixed_now()).unwrap();
        let first = repo.insert_result(&draft).await.unwrap();
        let second = repo.insert_result(&draft).await.unwrap();
        assert!(first.id() < second.id());
        assert_eq!(repo.list_results(QuizId::new(1)).await.unwrap().len(), 2);
        assert!(repo.list_results(QuizId::new(2)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn quizzes_list_newest_first() {
        let repo = InMemoryRepository::new();
        let older = Quiz::new(QuizId::new(1), "Old", fixed_now()).unwrap();
        let newer = Quiz::new(QuizId::new(2), "New", fixed_now() + Duration::hours(1)).unwrap();
        repo.upsert_quiz(&older).await.unwrap();
        repo.upsert_quiz(&newer).await.unwrap();

        let listed = repo.list_quizzes().await.unwrap();
        assert_eq!(listed[0].id(), QuizId::new(2));
        assert!(repo.get_quiz(QuizId::new(3)).await.unwrap().is_none());
    }
}

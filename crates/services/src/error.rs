//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::{AttemptResultError, QuizId};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by attempt sessions.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AttemptError {
    #[error("a student name is required to submit")]
    Validation,

    #[error("quiz {quiz_id} has no questions")]
    InvalidQuiz { quiz_id: QuizId },

    #[error("attempt has not been started")]
    NotStarted,

    #[error("attempt was already started")]
    AlreadyStarted,

    /// A write failed but the attempt can still be submitted again.
    #[error("saving the result failed on write {attempt}")]
    Persistence {
        attempt: u32,
        #[source]
        source: StorageError,
    },

    /// Writes were exhausted or refused; the attempt is closed without a stored result.
    #[error("attempt failed: {reason}")]
    Failed { reason: String },

    #[error(transparent)]
    Result(#[from] AttemptResultError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AttemptError {
    /// Whether calling `submit` again may still record the result.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence { .. })
    }
}

/// Errors emitted by `LeaderboardService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LeaderboardError {
    #[error("quiz {0} does not exist")]
    UnknownQuiz(QuizId),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

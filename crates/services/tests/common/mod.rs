use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use quiz_core::model::{AttemptResult, NewAttemptResult, QuizId};
use storage::repository::{InMemoryRepository, ResultStore, StorageError};

/// Result store that fails the first `failures` writes with the given error.
pub struct FlakyResults {
    inner: InMemoryRepository,
    failures: u32,
    transient: bool,
    pub calls: AtomicU32,
}

impl FlakyResults {
    pub fn new(inner: InMemoryRepository, failures: u32, transient: bool) -> Self {
        Self {
            inner,
            failures,
            transient,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl ResultStore for FlakyResults {
    async fn insert_result(
        &self,
        result: &NewAttemptResult,
    ) -> Result<AttemptResult, StorageError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(if self.transient {
                StorageError::Unavailable("database is locked".into())
            } else {
                StorageError::Rejected("FOREIGN KEY constraint failed".into())
            });
        }
        self.inner.insert_result(result).await
    }

    async fn list_results(&self, quiz_id: QuizId) -> Result<Vec<AttemptResult>, StorageError> {
        self.inner.list_results(quiz_id).await
    }

    async fn list_all_results(&self) -> Result<Vec<AttemptResult>, StorageError> {
        self.inner.list_all_results().await
    }

    async fn count_results(&self) -> Result<u64, StorageError> {
        self.inner.count_results().await
    }
}

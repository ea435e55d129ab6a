use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::attempt::AttemptService;
use crate::config::AttemptConfig;
use crate::error::AppServicesError;
use crate::leaderboard_service::LeaderboardService;

/// Assembles the attempt and leaderboard services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    attempts: Arc<AttemptService>,
    leaderboards: Arc<LeaderboardService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        config: AttemptConfig,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock, config))
    }

    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock, config: AttemptConfig) -> Self {
        let attempts = Arc::new(
            AttemptService::new(
                clock,
                Arc::clone(&storage.questions),
                Arc::clone(&storage.results),
            )
            .with_config(config),
        );
        let leaderboards = Arc::new(LeaderboardService::new(
            Arc::clone(&storage.quizzes),
            Arc::clone(&storage.questions),
            Arc::clone(&storage.results),
        ));
        Self {
            attempts,
            leaderboards,
        }
    }

    #[must_use]
    pub fn attempts(&self) -> Arc<AttemptService> {
        Arc::clone(&self.attempts)
    }

    #[must_use]
    pub fn leaderboards(&self) -> Arc<LeaderboardService> {
        Arc::clone(&self.leaderboards)
    }
}

use std::sync::Arc;

use quiz_core::Clock;
use quiz_core::model::QuizId;
use storage::repository::{QuestionStore, ResultStore};

use super::controller::SessionController;
use crate::config::AttemptConfig;
use crate::error::AttemptError;

/// Opens attempt sessions against the configured stores.
#[derive(Clone)]
pub struct AttemptService {
    clock: Clock,
    config: AttemptConfig,
    questions: Arc<dyn QuestionStore>,
    results: Arc<dyn ResultStore>,
}

impl AttemptService {
    #[must_use]
    pub fn new(
        clock: Clock,
        questions: Arc<dyn QuestionStore>,
        results: Arc<dyn ResultStore>,
    ) -> Self {
        Self {
            clock,
            config: AttemptConfig::default(),
            questions,
            results,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: AttemptConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn config(&self) -> &AttemptConfig {
        &self.config
    }

    /// Load the questions of `quiz_id` and start a timed attempt over them.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::InvalidQuiz` if the quiz has no questions, or
    /// `AttemptError::Storage` if they cannot be loaded.
    pub async fn start_attempt(
        &self,
        quiz_id: QuizId,
    ) -> Result<Arc<SessionController>, AttemptError> {
        let questions = self.questions.fetch_questions(quiz_id).await?;
        let controller = SessionController::new(
            quiz_id,
            self.config.clone(),
            self.clock,
            Arc::clone(&self.results),
        );
        controller.start(questions)?;
        Ok(controller)
    }
}

use std::sync::Arc;

use quiz_core::leaderboard::Leaderboard;
use quiz_core::model::{Quiz, QuizId};
use storage::repository::{QuestionStore, QuizStore, ResultStore};

use crate::error::LeaderboardError;

/// Entries shown on the landing page's global board.
pub const DEFAULT_TOP_SCORES: usize = 5;

/// Platform-wide counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlatformOverview {
    pub quizzes: u64,
    pub questions: u64,
    pub attempts: u64,
}

/// A quiz together with its ranked results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizLeaderboard {
    pub quiz: Quiz,
    pub board: Leaderboard,
}

/// Read-only ranking queries over stored results.
#[derive(Clone)]
pub struct LeaderboardService {
    quizzes: Arc<dyn QuizStore>,
    questions: Arc<dyn QuestionStore>,
    results: Arc<dyn ResultStore>,
}

impl LeaderboardService {
    #[must_use]
    pub fn new(
        quizzes: Arc<dyn QuizStore>,
        questions: Arc<dyn QuestionStore>,
        results: Arc<dyn ResultStore>,
    ) -> Self {
        Self {
            quizzes,
            questions,
            results,
        }
    }

    /// Ranked results of one quiz, optionally cut to the first `limit` entries.
    ///
    /// # Errors
    ///
    /// Returns `LeaderboardError::UnknownQuiz` if the quiz does not exist, or
    /// `LeaderboardError::Storage` for backend failures.
    pub async fn leaderboard(
        &self,
        quiz_id: QuizId,
        limit: Option<usize>,
    ) -> Result<QuizLeaderboard, LeaderboardError> {
        let quiz = self
            .quizzes
            .get_quiz(quiz_id)
            .await?
            .ok_or(LeaderboardError::UnknownQuiz(quiz_id))?;
        let mut board = Leaderboard::rank(self.results.list_results(quiz_id).await?);
        if let Some(limit) = limit {
            board = board.top(limit);
        }
        Ok(QuizLeaderboard { quiz, board })
    }

    /// Best results across every quiz.
    ///
    /// # Errors
    ///
    /// Returns `LeaderboardError::Storage` for backend failures.
    pub async fn top_scores(&self, limit: usize) -> Result<Leaderboard, LeaderboardError> {
        let all = self.results.list_all_results().await?;
        Ok(Leaderboard::rank(all).top(limit))
    }

    /// Counts of quizzes, questions and stored attempts.
    ///
    /// # Errors
    ///
    /// Returns `LeaderboardError::Storage` for backend failures.
    pub async fn overview(&self) -> Result<PlatformOverview, LeaderboardError> {
        let quizzes = u64::try_from(self.quizzes.list_quizzes().await?.len()).unwrap_or(u64::MAX);
        Ok(PlatformOverview {
            quizzes,
            questions: self.questions.count_questions().await?,
            attempts: self.results.count_results().await?,
        })
    }
}

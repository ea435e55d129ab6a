use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::QuizId;

/// Title shown when a quiz record is missing its title or cannot be loaded.
pub const FALLBACK_QUIZ_TITLE: &str = "Online Quiz";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("quiz title cannot be empty")]
    EmptyTitle,
}

/// A titled collection of questions.
///
/// Immutable once an attempt references it; edits happen outside the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    id: QuizId,
    title: String,
    created_at: DateTime<Utc>,
}

impl Quiz {
    /// Creates a quiz, trimming the title.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::EmptyTitle` if the title is blank.
    pub fn new(
        id: QuizId,
        title: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, QuizError> {
        let title = title.into().trim().to_owned();
        if title.is_empty() {
            return Err(QuizError::EmptyTitle);
        }
        Ok(Self {
            id,
            title,
            created_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuizId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Title to display for an optional quiz lookup.
#[must_use]
pub fn display_title(quiz: Option<&Quiz>) -> &str {
    quiz.map_or(FALLBACK_QUIZ_TITLE, Quiz::title)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn rejects_blank_title() {
        let err = Quiz::new(QuizId::new(1), "   ", fixed_now()).unwrap_err();
        assert_eq!(err, QuizError::EmptyTitle);
    }

    #[test]
    fn trims_title() {
        let quiz = Quiz::new(QuizId::new(1), "  Rust basics ", fixed_now()).unwrap();
        assert_eq!(quiz.title(), "Rust basics");
    }

    #[test]
    fn display_title_falls_back() {
        assert_eq!(display_title(None), "Online Quiz");
    }
}

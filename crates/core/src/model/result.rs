use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{QuizId, ResultId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AttemptResultError {
    #[error("score ({score}) exceeds total ({total})")]
    ScoreExceedsTotal { score: u32, total: u32 },

    #[error("student name cannot be empty")]
    EmptyStudentName,
}

/// A scored attempt that has not been assigned a store id yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAttemptResult {
    quiz_id: QuizId,
    student_name: String,
    score: u32,
    total: u32,
    submitted_at: DateTime<Utc>,
}

impl NewAttemptResult {
    /// # Errors
    ///
    /// Returns `AttemptResultError::ScoreExceedsTotal` if `score > total`, or
    /// `AttemptResultError::EmptyStudentName` for a blank name.
    pub fn new(
        quiz_id: QuizId,
        student_name: impl Into<String>,
        score: u32,
        total: u32,
        submitted_at: DateTime<Utc>,
    ) -> Result<Self, AttemptResultError> {
        if score > total {
            return Err(AttemptResultError::ScoreExceedsTotal { score, total });
        }
        let student_name = student_name.into();
        if student_name.trim().is_empty() {
            return Err(AttemptResultError::EmptyStudentName);
        }
        Ok(Self {
            quiz_id,
            student_name,
            score,
            total,
            submitted_at,
        })
    }

    /// Attach the id handed out by the result store.
    #[must_use]
    pub fn with_id(self, id: ResultId) -> AttemptResult {
        AttemptResult {
            id,
            quiz_id: self.quiz_id,
            student_name: self.student_name,
            score: self.score,
            total: self.total,
            submitted_at: self.submitted_at,
        }
    }

    #[must_use]
    pub fn quiz_id(&self) -> QuizId {
        self.quiz_id
    }

    #[must_use]
    pub fn student_name(&self) -> &str {
        &self.student_name
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    #[must_use]
    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }
}

/// A persisted, immutable attempt result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptResult {
    id: ResultId,
    quiz_id: QuizId,
    student_name: String,
    score: u32,
    total: u32,
    submitted_at: DateTime<Utc>,
}

impl AttemptResult {
    /// Rehydrate a result from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `AttemptResultError` if the stored values violate result invariants.
    pub fn from_persisted(
        id: ResultId,
        quiz_id: QuizId,
        student_name: String,
        score: u32,
        total: u32,
        submitted_at: DateTime<Utc>,
    ) -> Result<Self, AttemptResultError> {
        NewAttemptResult::new(quiz_id, student_name, score, total, submitted_at)
            .map(|draft| draft.with_id(id))
    }

    #[must_use]
    pub fn id(&self) -> ResultId {
        self.id
    }

    #[must_use]
    pub fn quiz_id(&self) -> QuizId {
        self.quiz_id
    }

    #[must_use]
    pub fn student_name(&self) -> &str {
        &self.student_name
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    #[must_use]
    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }
}

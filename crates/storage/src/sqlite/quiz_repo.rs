use quiz_core::model::{Quiz, QuizId};

use super::SqliteRepository;
use super::mapping::{db_err, id_i64, map_quiz_row};
use crate::repository::{QuizStore, StorageError};

#[async_trait::async_trait]
impl QuizStore for SqliteRepository {
    async fn upsert_quiz(&self, quiz: &Quiz) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO quizzes (id, title, created_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title
            ",
        )
        .bind(id_i64("quiz_id", quiz.id().value())?)
        .bind(quiz.title())
        .bind(quiz.created_at())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_quiz(&self, id: QuizId) -> Result<Option<Quiz>, StorageError> {
        let row = sqlx::query("SELECT id, title, created_at FROM quizzes WHERE id = ?1")
            .bind(id_i64("quiz_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(map_quiz_row).transpose()
    }

    async fn list_quizzes(&self) -> Result<Vec<Quiz>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, title, created_at
                FROM quizzes
                ORDER BY created_at DESC, id DESC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(map_quiz_row).collect()
    }
}

use quiz_core::model::{AttemptResult, NewAttemptResult, QuizId, ResultId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{count_from_i64, db_err, id_i64, map_result_row, ser};
use crate::repository::{ResultStore, StorageError};

#[async_trait::async_trait]
impl ResultStore for SqliteRepository {
    async fn insert_result(
        &self,
        result: &NewAttemptResult,
    ) -> Result<AttemptResult, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO results (quiz_id, student_name, score, total, submitted_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(id_i64("quiz_id", result.quiz_id().value())?)
        .bind(result.student_name())
        .bind(i64::from(result.score()))
        .bind(i64::from(result.total()))
        .bind(result.submitted_at())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        let id = u64::try_from(res.last_insert_rowid())
            .map_err(|_| StorageError::Serialization("result id sign overflow".into()))?;
        Ok(result.clone().with_id(ResultId::new(id)))
    }

    async fn list_results(&self, quiz_id: QuizId) -> Result<Vec<AttemptResult>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, quiz_id, student_name, score, total, submitted_at
                FROM results
                WHERE quiz_id = ?1
            ",
        )
        .bind(id_i64("quiz_id", quiz_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(map_result_row).collect()
    }

    async fn list_all_results(&self) -> Result<Vec<AttemptResult>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, quiz_id, student_name, score, total, submitted_at
                FROM results
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(map_result_row).collect()
    }

    async fn count_results(&self) -> Result<u64, StorageError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM results")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        count_from_i64(row.try_get::<i64, _>("n").map_err(ser)?)
    }
}

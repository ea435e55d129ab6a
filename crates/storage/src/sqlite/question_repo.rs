use quiz_core::model::{OptionKey, Question, QuizId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{count_from_i64, db_err, id_i64, map_question_row, ser};
use crate::repository::{QuestionStore, StorageError};

#[async_trait::async_trait]
impl QuestionStore for SqliteRepository {
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        let options = question.options();
        sqlx::query(
            r"
                INSERT INTO questions (
                    id, quiz_id, question, option_a, option_b, option_c, option_d, correct_option
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(id) DO UPDATE SET
                    quiz_id = excluded.quiz_id,
                    question = excluded.question,
                    option_a = excluded.option_a,
                    option_b = excluded.option_b,
                    option_c = excluded.option_c,
                    option_d = excluded.option_d,
                    correct_option = excluded.correct_option
            ",
        )
        .bind(id_i64("question_id", question.id().value())?)
        .bind(id_i64("quiz_id", question.quiz_id().value())?)
        .bind(question.text())
        .bind(options.get(OptionKey::A))
        .bind(options.get(OptionKey::B))
        .bind(options.get(OptionKey::C))
        .bind(options.get(OptionKey::D))
        .bind(question.correct_option().as_str())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn fetch_questions(&self, quiz_id: QuizId) -> Result<Vec<Question>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, quiz_id, question, option_a, option_b, option_c, option_d, correct_option
                FROM questions
                WHERE quiz_id = ?1
                ORDER BY id ASC
            ",
        )
        .bind(id_i64("quiz_id", quiz_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(map_question_row).collect()
    }

    async fn count_questions(&self) -> Result<u64, StorageError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM questions")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        count_from_i64(row.try_get::<i64, _>("n").map_err(ser)?)
    }
}

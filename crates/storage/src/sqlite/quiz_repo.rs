use quiz_core::model::{Quiz, QuizId};

use super::{SqliteRepository, mapping};
use crate::repository::{QuizRepository, StorageError};

#[async_trait::async_trait]
impl QuizRepository for SqliteRepository {
    async fn upsert_quiz(&self, quiz: &Quiz) -> Result<(), StorageError> {
        let settings = quiz.settings();
        sqlx::query(
            r"
            INSERT INTO quizzes (
                id, title, description, time_limit_minutes, available_from,
                expires_at, max_attempts, reveal_correct_answers, is_published, shuffle
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                time_limit_minutes = excluded.time_limit_minutes,
                available_from = excluded.available_from,
                expires_at = excluded.expires_at,
                max_attempts = excluded.max_attempts,
                reveal_correct_answers = excluded.reveal_correct_answers,
                is_published = excluded.is_published,
                shuffle = excluded.shuffle
            ",
        )
        .bind(mapping::u64_to_i64("quiz_id", quiz.id().value())?)
        .bind(quiz.title().to_owned())
        .bind(quiz.description().map(str::to_owned))
        .bind(settings.time_limit_minutes().map(i64::from))
        .bind(settings.available_from())
        .bind(settings.expires_at())
        .bind(i64::from(settings.max_attempts()))
        .bind(settings.reveal_correct_answers())
        .bind(settings.is_published())
        .bind(settings.shuffle())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn get_quiz(&self, id: QuizId) -> Result<Option<Quiz>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT
                id, title, description, time_limit_minutes, available_from,
                expires_at, max_attempts, reveal_correct_answers, is_published, shuffle
            FROM quizzes
            WHERE id = ?1
            ",
        )
        .bind(mapping::u64_to_i64("quiz_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.map(|row| mapping::map_quiz_row(&row)).transpose()
    }
}

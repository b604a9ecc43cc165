use quiz_core::model::{Attempt, AttemptId, QuizId, StudentId};

use super::{SqliteRepository, mapping};
use crate::repository::{AttemptFinalization, AttemptRepository, NewAttempt, StorageError};

fn write_err(e: sqlx::Error) -> StorageError {
    if e.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
    {
        StorageError::Conflict
    } else {
        StorageError::Connection(e.to_string())
    }
}

#[async_trait::async_trait]
impl AttemptRepository for SqliteRepository {
    async fn list_attempts(
        &self,
        quiz_id: QuizId,
        student_id: StudentId,
    ) -> Result<Vec<Attempt>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT
                id, quiz_id, student_id, attempt_number, started_at,
                submitted_at, duration_seconds, score, meta
            FROM attempts
            WHERE quiz_id = ?1 AND student_id = ?2
            ORDER BY attempt_number DESC
            ",
        )
        .bind(mapping::u64_to_i64("quiz_id", quiz_id.value())?)
        .bind(student_id.value())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut attempts = Vec::with_capacity(rows.len());
        for row in rows {
            attempts.push(mapping::map_attempt_row(&row)?);
        }
        Ok(attempts)
    }

    async fn get_attempt(&self, id: AttemptId) -> Result<Option<Attempt>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT
                id, quiz_id, student_id, attempt_number, started_at,
                submitted_at, duration_seconds, score, meta
            FROM attempts
            WHERE id = ?1
            ",
        )
        .bind(id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.map(|row| mapping::map_attempt_row(&row)).transpose()
    }

    async fn create_attempt(&self, new: &NewAttempt) -> Result<AttemptId, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO attempts (quiz_id, student_id, attempt_number, started_at)
            VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(mapping::u64_to_i64("quiz_id", new.quiz_id.value())?)
        .bind(new.student_id.value())
        .bind(i64::from(new.attempt_number))
        .bind(new.started_at)
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        Ok(AttemptId::new(res.last_insert_rowid()))
    }

    async fn finalize_attempt(
        &self,
        id: AttemptId,
        finalization: &AttemptFinalization,
    ) -> Result<(), StorageError> {
        let meta = mapping::meta_to_json(&finalization.meta)?;
        let res = sqlx::query(
            r"
            UPDATE attempts
            SET submitted_at = ?2,
                duration_seconds = ?3,
                score = ?4,
                meta = ?5
            WHERE id = ?1
            ",
        )
        .bind(id.value())
        .bind(finalization.submitted_at)
        .bind(i64::from(finalization.duration_seconds))
        .bind(i64::from(finalization.score))
        .bind(meta)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn delete_attempt(&self, id: AttemptId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM attempts WHERE id = ?1")
            .bind(id.value())
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}

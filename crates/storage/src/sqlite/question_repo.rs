use quiz_core::model::{Choice, Question, QuestionId, QuizId};

use super::{SqliteRepository, mapping};
use crate::repository::{QuestionRepository, StorageError};

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO questions (
                id, quiz_id, order_index, text, instructions, instruction_image,
                points, underline_text, underline_case_sensitive
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(id) DO UPDATE SET
                quiz_id = excluded.quiz_id,
                order_index = excluded.order_index,
                text = excluded.text,
                instructions = excluded.instructions,
                instruction_image = excluded.instruction_image,
                points = excluded.points,
                underline_text = excluded.underline_text,
                underline_case_sensitive = excluded.underline_case_sensitive
            ",
        )
        .bind(mapping::u64_to_i64("question_id", question.id().value())?)
        .bind(mapping::u64_to_i64("quiz_id", question.quiz_id().value())?)
        .bind(i64::from(question.order_index()))
        .bind(question.text().to_owned())
        .bind(question.instructions().map(str::to_owned))
        .bind(question.instruction_image().map(|url| url.to_string()))
        .bind(i64::from(question.points()))
        .bind(question.underline().map(|u| u.substring().to_owned()))
        .bind(question.underline().map(|u| u.case_sensitive()))
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn upsert_choice(&self, choice: &Choice) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO choices (id, question_id, order_index, text, is_correct)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                question_id = excluded.question_id,
                order_index = excluded.order_index,
                text = excluded.text,
                is_correct = excluded.is_correct
            ",
        )
        .bind(mapping::u64_to_i64("choice_id", choice.id().value())?)
        .bind(mapping::u64_to_i64(
            "question_id",
            choice.question_id().value(),
        )?)
        .bind(i64::from(choice.order_index()))
        .bind(choice.text().to_owned())
        .bind(choice.is_correct())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn list_questions(&self, quiz_id: QuizId) -> Result<Vec<Question>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT
                id, quiz_id, order_index, text, instructions, instruction_image,
                points, underline_text, underline_case_sensitive
            FROM questions
            WHERE quiz_id = ?1
            ORDER BY order_index ASC, id ASC
            ",
        )
        .bind(mapping::u64_to_i64("quiz_id", quiz_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut questions = Vec::with_capacity(rows.len());
        for row in rows {
            questions.push(mapping::map_question_row(&row)?);
        }
        Ok(questions)
    }

    async fn list_choices(
        &self,
        question_ids: &[QuestionId],
    ) -> Result<Vec<Choice>, StorageError> {
        if question_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = String::from(
            r"
            SELECT id, question_id, order_index, text, is_correct
            FROM choices
            WHERE question_id IN (
            ",
        );

        for i in 0..question_ids.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push('?');
            sql.push_str(&(i + 1).to_string());
        }
        sql.push_str(")\n ORDER BY question_id ASC, order_index ASC, id ASC");

        let mut query = sqlx::query(&sql);
        for id in question_ids {
            query = query.bind(mapping::u64_to_i64("question_id", id.value())?);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut choices = Vec::with_capacity(rows.len());
        for row in rows {
            choices.push(mapping::map_choice_row(&row)?);
        }
        Ok(choices)
    }
}

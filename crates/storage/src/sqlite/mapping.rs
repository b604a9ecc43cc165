use quiz_core::model::{
    Attempt, AttemptId, AttemptMeta, Choice, ChoiceId, Question, QuestionId, Quiz, QuizId,
    StudentId, Underline,
};
use sqlx::Row;
use url::Url;
use uuid::Uuid;

use crate::repository::StorageError;

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn u64_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn quiz_id_from_i64(v: i64) -> Result<QuizId, StorageError> {
    Ok(QuizId::new(i64_to_u64("quiz_id", v)?))
}

pub(crate) fn question_id_from_i64(v: i64) -> Result<QuestionId, StorageError> {
    Ok(QuestionId::new(i64_to_u64("question_id", v)?))
}

pub(crate) fn choice_id_from_i64(v: i64) -> Result<ChoiceId, StorageError> {
    Ok(ChoiceId::new(i64_to_u64("choice_id", v)?))
}

pub(crate) fn map_quiz_row(row: &sqlx::sqlite::SqliteRow) -> Result<Quiz, StorageError> {
    let time_limit = row
        .try_get::<Option<i64>, _>("time_limit_minutes")
        .map_err(ser)?
        .map(|v| u32_from_i64("time_limit_minutes", v))
        .transpose()?;
    let max_attempts = u32_from_i64(
        "max_attempts",
        row.try_get::<i64, _>("max_attempts").map_err(ser)?,
    )?;

    Quiz::from_persisted(
        quiz_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        row.try_get("title").map_err(ser)?,
        row.try_get("description").map_err(ser)?,
        time_limit,
        row.try_get("available_from").map_err(ser)?,
        row.try_get("expires_at").map_err(ser)?,
        max_attempts,
        row.try_get("reveal_correct_answers").map_err(ser)?,
        row.try_get("is_published").map_err(ser)?,
        row.try_get("shuffle").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_question_row(row: &sqlx::sqlite::SqliteRow) -> Result<Question, StorageError> {
    let image = row
        .try_get::<Option<String>, _>("instruction_image")
        .map_err(ser)?
        .map(|raw| Url::parse(&raw))
        .transpose()
        .map_err(ser)?;

    let underline = match row
        .try_get::<Option<String>, _>("underline_text")
        .map_err(ser)?
    {
        Some(text) => {
            let case_sensitive: Option<bool> =
                row.try_get("underline_case_sensitive").map_err(ser)?;
            Some(Underline::new(text, case_sensitive.unwrap_or(false)).map_err(ser)?)
        }
        None => None,
    };

    let question = Question::new(
        question_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        quiz_id_from_i64(row.try_get::<i64, _>("quiz_id").map_err(ser)?)?,
        u32_from_i64(
            "order_index",
            row.try_get::<i64, _>("order_index").map_err(ser)?,
        )?,
        row.try_get::<String, _>("text").map_err(ser)?,
        u32_from_i64("points", row.try_get::<i64, _>("points").map_err(ser)?)?,
    )
    .map_err(ser)?;

    Ok(question
        .with_instructions(row.try_get("instructions").map_err(ser)?)
        .with_instruction_image(image)
        .with_underline(underline))
}

pub(crate) fn map_choice_row(row: &sqlx::sqlite::SqliteRow) -> Result<Choice, StorageError> {
    Choice::new(
        choice_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        question_id_from_i64(row.try_get::<i64, _>("question_id").map_err(ser)?)?,
        u32_from_i64(
            "order_index",
            row.try_get::<i64, _>("order_index").map_err(ser)?,
        )?,
        row.try_get::<String, _>("text").map_err(ser)?,
        row.try_get("is_correct").map_err(ser)?,
    )
    .map_err(ser)
}

/// Encodes an attempt meta record for the `meta` TEXT column.
pub(crate) fn meta_to_json(meta: &AttemptMeta) -> Result<String, StorageError> {
    serde_json::to_string(meta).map_err(ser)
}

pub(crate) fn map_attempt_row(row: &sqlx::sqlite::SqliteRow) -> Result<Attempt, StorageError> {
    let meta = row
        .try_get::<Option<String>, _>("meta")
        .map_err(ser)?
        .map(|raw| serde_json::from_str::<AttemptMeta>(&raw))
        .transpose()
        .map_err(ser)?;

    let student: Uuid = row.try_get("student_id").map_err(ser)?;

    Attempt::from_persisted(
        AttemptId::new(row.try_get::<i64, _>("id").map_err(ser)?),
        quiz_id_from_i64(row.try_get::<i64, _>("quiz_id").map_err(ser)?)?,
        StudentId::new(student),
        u32_from_i64(
            "attempt_number",
            row.try_get::<i64, _>("attempt_number").map_err(ser)?,
        )?,
        row.try_get("started_at").map_err(ser)?,
        row.try_get("submitted_at").map_err(ser)?,
        u32_from_i64(
            "duration_seconds",
            row.try_get::<i64, _>("duration_seconds").map_err(ser)?,
        )?,
        u32_from_i64("score", row.try_get::<i64, _>("score").map_err(ser)?)?,
        meta,
    )
    .map_err(ser)
}

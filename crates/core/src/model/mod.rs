mod answers;
mod attempt;
mod identity;
mod ids;
mod question;
mod quiz;

pub use answers::{AnswerMap, AnswerSheet};
pub use attempt::{Attempt, AttemptError, AttemptMeta};
pub use identity::{Role, Viewer};
pub use ids::{AttemptId, ChoiceId, ParseIdError, QuestionId, QuizId, StudentId};
pub use question::{Choice, DEFAULT_POINTS, Question, QuestionError, QuizQuestion, Underline};
pub use quiz::{Quiz, QuizError, QuizSettings};

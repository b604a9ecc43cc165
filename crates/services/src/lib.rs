#![forbid(unsafe_code)]

pub mod attempts;
pub mod error;

pub use quiz_core::Clock;

pub use error::{AttemptError, LoadError, StartDenied};

pub use attempts::{
    AttemptHistory, AttemptProgress, AttemptReview, AttemptReviewService, AttemptRuntime,
    AttemptService, AttemptSession, AttemptState, AttemptTimer, Deadline, ExpiryTrigger,
    QuestionBank, StartOutcome, StartReceipt, SubmitReceipt, SubmitTicket,
};

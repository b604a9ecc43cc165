use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use quiz_core::model::{
    Attempt, AttemptId, Choice, ChoiceId, Question, QuestionId, Quiz, QuizId, QuizSettings,
    StudentId, Viewer,
};
use quiz_core::time::{fixed_clock, fixed_now};
use services::{
    AttemptError, AttemptReviewService, AttemptRuntime, AttemptService, AttemptState, StartDenied,
    StartOutcome,
};
use storage::repository::{
    AttemptFinalization, AttemptRepository, InMemoryRepository, NewAttempt, QuestionRepository,
    QuizRepository, StorageError,
};
use uuid::Uuid;

//
// ─── TEST DOUBLES & BUILDERS ───────────────────────────────────────────────────
//

/// Counts finalize writes and can be told to fail them, so the tests can
/// assert the single-finalize guarantee and the save-may-be-lost path.
struct CountingAttemptRepo {
    inner: InMemoryRepository,
    finalizes: AtomicU32,
    fail_finalize: AtomicBool,
}

impl CountingAttemptRepo {
    fn new(inner: InMemoryRepository) -> Self {
        Self {
            inner,
            finalizes: AtomicU32::new(0),
            fail_finalize: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl AttemptRepository for CountingAttemptRepo {
    async fn list_attempts(
        &self,
        quiz_id: QuizId,
        student_id: StudentId,
    ) -> Result<Vec<Attempt>, StorageError> {
        self.inner.list_attempts(quiz_id, student_id).await
    }

    async fn get_attempt(&self, id: AttemptId) -> Result<Option<Attempt>, StorageError> {
        self.inner.get_attempt(id).await
    }

    async fn create_attempt(&self, new: &NewAttempt) -> Result<AttemptId, StorageError> {
        self.inner.create_attempt(new).await
    }

    async fn finalize_attempt(
        &self,
        id: AttemptId,
        finalization: &AttemptFinalization,
    ) -> Result<(), StorageError> {
        self.finalizes.fetch_add(1, Ordering::SeqCst);
        if self.fail_finalize.load(Ordering::SeqCst) {
            return Err(StorageError::Connection("finalize dropped".into()));
        }
        self.inner.finalize_attempt(id, finalization).await
    }

    async fn delete_attempt(&self, id: AttemptId) -> Result<(), StorageError> {
        self.inner.delete_attempt(id).await
    }
}

fn student() -> StudentId {
    StudentId::new(Uuid::from_u128(42))
}

/// Two single-answer questions worth 1 point each: Q1 {10✓, 11} and
/// Q2 {20✓, 21}.
async fn seed_quiz(repo: &InMemoryRepository, max_attempts: u32, reveal: bool) -> Quiz {
    let settings = QuizSettings::new(max_attempts)
        .unwrap()
        .published(true)
        .with_reveal_correct_answers(reveal);
    let quiz = Quiz::new(QuizId::new(1), "Flow quiz", None, settings).unwrap();
    repo.upsert_quiz(&quiz).await.unwrap();

    for (q, correct, wrong) in [(1_u64, 10_u64, 11_u64), (2, 20, 21)] {
        let question = Question::new(
            QuestionId::new(q),
            quiz.id(),
            u32::try_from(q).unwrap(),
            format!("Question {q}"),
            1,
        )
        .unwrap();
        repo.upsert_question(&question).await.unwrap();
        for (order, (choice, is_correct)) in [(correct, true), (wrong, false)].iter().enumerate() {
            let choice = Choice::new(
                ChoiceId::new(*choice),
                QuestionId::new(q),
                u32::try_from(order).unwrap(),
                format!("Choice {choice}"),
                *is_correct,
            )
            .unwrap();
            repo.upsert_choice(&choice).await.unwrap();
        }
    }

    quiz
}

fn service_with(
    repo: &InMemoryRepository,
    attempts: Arc<dyn AttemptRepository>,
) -> AttemptService {
    AttemptService::new(
        fixed_clock(),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        attempts,
    )
}

fn service(repo: &InMemoryRepository) -> AttemptService {
    service_with(repo, Arc::new(repo.clone()))
}

//
// ─── SCENARIOS ─────────────────────────────────────────────────────────────────
//

#[tokio::test]
async fn scenario_a_manual_submit_scores_answered_question_only() {
    let repo = InMemoryRepository::new();
    let quiz = seed_quiz(&repo, 3, false).await;
    let service = service(&repo);

    let (mut session, history, warning) =
        service.open_session(quiz.id(), student()).await.unwrap();
    assert!(warning.is_none());
    assert_eq!(history.attempts_used(), 0);
    assert_eq!(session.questions().len(), 2);

    service.start(&mut session).await.unwrap();
    // Q1 answered correctly, Q2 left alone
    session.answer(QuestionId::new(1), ChoiceId::new(10)).unwrap();

    let receipt = service.submit(&mut session, false).await.unwrap();
    assert_eq!(receipt.score, 1);
    assert_eq!(receipt.attempt_number, 1);
    assert!(receipt.saved);
    assert!(!receipt.auto_submitted);

    let persisted = repo
        .get_attempt(receipt.attempt_id)
        .await
        .unwrap()
        .expect("attempt row");
    assert_eq!(persisted.submitted_at(), Some(fixed_now()));
    assert_eq!(persisted.score(), 1);
    assert_eq!(persisted.duration_seconds(), 1); // floored, clock never moved
    assert!(!persisted.meta().unwrap().auto_submitted);
}

#[tokio::test]
async fn scenario_c_single_attempt_quiz_reports_no_attempts_left() {
    let repo = InMemoryRepository::new();
    let quiz = seed_quiz(&repo, 1, false).await;
    let service = service(&repo);

    let (mut session, _, _) = service.open_session(quiz.id(), student()).await.unwrap();
    service.start(&mut session).await.unwrap();
    service.submit(&mut session, false).await.unwrap();

    let history = service.load_history(quiz.id(), student()).await.unwrap();
    assert!(!history.can_start(&quiz, fixed_now()));
    let denial = history.start_denial(&quiz, fixed_now()).unwrap();
    assert_eq!(denial, StartDenied::NoAttemptsLeft);
    assert_eq!(denial.to_string(), "no attempts left");

    // a second session cannot start either
    let (mut retake, _, _) = service.open_session(quiz.id(), student()).await.unwrap();
    let err = service.start(&mut retake).await.unwrap_err();
    assert!(matches!(
        err,
        AttemptError::Denied(StartDenied::NoAttemptsLeft)
    ));
}

#[tokio::test]
async fn sequential_starts_number_attempts_even_when_abandoned() {
    let repo = InMemoryRepository::new();
    let quiz = seed_quiz(&repo, 5, false).await;
    let service = service(&repo);

    // three independent sessions (think: three tabs over time), none of
    // which ever submits
    for expected in 1..=3 {
        let (mut session, _, _) = service.open_session(quiz.id(), student()).await.unwrap();
        let receipt = service.start(&mut session).await.unwrap();
        assert_eq!(receipt.attempt_number, expected);
    }

    let history = service.load_history(quiz.id(), student()).await.unwrap();
    assert_eq!(history.attempts_used(), 3);
    assert_eq!(history.last_score(), None);
}

#[tokio::test]
async fn racing_submits_finalize_exactly_once() {
    let repo = InMemoryRepository::new();
    let quiz = seed_quiz(&repo, 3, false).await;
    let counting = Arc::new(CountingAttemptRepo::new(repo.clone()));
    let service = service_with(&repo, counting.clone());

    let (mut session, _, _) = service.open_session(quiz.id(), student()).await.unwrap();
    service.start(&mut session).await.unwrap();

    // manual click wins; the deadline trigger that lost the race is a
    // rejected admission, not a second write
    service.submit(&mut session, false).await.unwrap();
    let err = service.submit(&mut session, true).await.unwrap_err();
    assert!(matches!(err, AttemptError::AlreadySubmitted));

    assert_eq!(counting.finalizes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn runtime_reports_the_losing_submit_as_a_no_op() {
    let repo = InMemoryRepository::new();
    let quiz = seed_quiz(&repo, 3, false).await;
    let service = service(&repo);
    let (session, _, _) = service.open_session(quiz.id(), student()).await.unwrap();
    let questions = session.questions().to_vec();

    let runtime = AttemptRuntime::for_viewer(
        service,
        quiz,
        questions,
        Viewer::student(student()),
    )
    .unwrap();

    let outcome = runtime.start().await.unwrap();
    assert!(matches!(outcome, StartOutcome::Started(_)));

    let first = runtime.submit(false).await.unwrap();
    assert!(first.is_some());
    let second = runtime.submit(true).await.unwrap();
    assert!(second.is_none());
    assert_eq!(runtime.state().await, AttemptState::Submitted);
}

#[tokio::test]
async fn failed_finalize_keeps_the_session_submitted_without_retry() {
    let repo = InMemoryRepository::new();
    let quiz = seed_quiz(&repo, 3, false).await;
    let counting = Arc::new(CountingAttemptRepo::new(repo.clone()));
    counting.fail_finalize.store(true, Ordering::SeqCst);
    let service = service_with(&repo, counting.clone());

    let (mut session, _, _) = service.open_session(quiz.id(), student()).await.unwrap();
    let started = service.start(&mut session).await.unwrap();
    session.answer(QuestionId::new(1), ChoiceId::new(10)).unwrap();

    let receipt = service.submit(&mut session, false).await.unwrap();
    assert!(!receipt.saved); // "your submission may not be saved"
    assert_eq!(receipt.score, 1); // scored locally all the same
    assert_eq!(session.state(), AttemptState::Submitted);

    // the admission has fired; there is no re-submission path
    let err = service.submit(&mut session, false).await.unwrap_err();
    assert!(matches!(err, AttemptError::AlreadySubmitted));
    assert_eq!(counting.finalizes.load(Ordering::SeqCst), 1);

    // the row is still the unsubmitted shell
    let row = repo.get_attempt(started.attempt_id).await.unwrap().unwrap();
    assert!(!row.is_submitted());
}

#[tokio::test]
async fn cancel_discards_the_attempt_without_counting_it() {
    let repo = InMemoryRepository::new();
    let quiz = seed_quiz(&repo, 3, false).await;
    let service = service(&repo);

    let (mut session, _, _) = service.open_session(quiz.id(), student()).await.unwrap();
    let receipt = service.start(&mut session).await.unwrap();
    assert_eq!(receipt.attempt_number, 1);
    service.cancel(&mut session).await.unwrap();

    let history = service.load_history(quiz.id(), student()).await.unwrap();
    assert_eq!(history.attempts_used(), 0);

    // with the row discarded the next start recounts from scratch
    let restart = service.start(&mut session).await.unwrap();
    assert_eq!(restart.attempt_number, 1);
}

#[tokio::test]
async fn review_reconstruction_matches_the_submitted_score() {
    let repo = InMemoryRepository::new();
    let quiz = seed_quiz(&repo, 3, true).await;
    let service = service(&repo);

    let (mut session, _, _) = service.open_session(quiz.id(), student()).await.unwrap();
    service.start(&mut session).await.unwrap();
    session.answer(QuestionId::new(1), ChoiceId::new(10)).unwrap(); // right
    session.answer(QuestionId::new(2), ChoiceId::new(21)).unwrap(); // wrong

    let receipt = service.submit(&mut session, false).await.unwrap();
    assert_eq!(receipt.score, 1);

    let reviews = AttemptReviewService::new(
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
    );

    let reopened = reviews.review_attempt(receipt.attempt_id).await.unwrap();
    assert_eq!(reopened.score(), receipt.score);
    assert!(!reopened.auto_submitted());

    let awarded: u32 = reopened.reviews.iter().map(|r| r.points_awarded).sum();
    assert_eq!(awarded, reopened.score());

    let verdicts: Vec<bool> = reopened.reviews.iter().map(|r| r.is_correct()).collect();
    assert_eq!(verdicts, vec![true, false]);
    // reveal_correct_answers annotates the right choices
    assert_eq!(
        reopened.reviews[0].correct_choices,
        Some(vec![ChoiceId::new(10)])
    );

    // the history-seeded path finds the same attempt without a new start
    let seeded = reviews
        .review_last_submitted(quiz.id(), student())
        .await
        .unwrap()
        .expect("a submitted attempt");
    assert_eq!(seeded.attempt.id(), receipt.attempt_id);
}

#[tokio::test]
async fn teacher_viewer_cannot_build_an_attempt_runtime() {
    let repo = InMemoryRepository::new();
    let quiz = seed_quiz(&repo, 3, false).await;
    let service = service(&repo);

    let err = AttemptRuntime::for_viewer(service, quiz, Vec::new(), Viewer::teacher())
        .unwrap_err();
    assert!(matches!(err, AttemptError::ReadOnlyViewer));
}

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use quiz_core::model::{
    AttemptStatus, AttemptTrigger, OptionKey, Question, QuestionId, QuestionOptions, QuizId,
};
use quiz_core::time::fixed_clock;
use services::{AttemptConfig, AttemptService, RetryConfig, SessionController};
use storage::repository::{InMemoryRepository, QuestionStore, ResultStore};

mod common;

use common::FlakyResults;

const QUIZ: QuizId = QuizId::new(3);

async fn start(repo: &InMemoryRepository, config: AttemptConfig) -> Arc<SessionController> {
    start_with_results(repo, Arc::new(repo.clone()), config).await
}

async fn start_with_results(
    repo: &InMemoryRepository,
    results: Arc<dyn ResultStore>,
    config: AttemptConfig,
) -> Arc<SessionController> {
    for (id, key) in [(1, OptionKey::A), (2, OptionKey::D)] {
        let question = Question::new(
            QuestionId::new(id),
            QUIZ,
            format!("Question {id}"),
            QuestionOptions::new("w", "x", "y", "z"),
            key,
        )
        .unwrap();
        repo.upsert_question(&question).await.unwrap();
    }
    AttemptService::new(fixed_clock(), Arc::new(repo.clone()), results)
        .with_config(config)
        .start_attempt(QUIZ)
        .await
        .unwrap()
}

async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn expiry_submits_exactly_once_at_the_last_tick() {
    let repo = InMemoryRepository::new();
    let attempt = start(&repo, AttemptConfig::default()).await;
    attempt.set_student_name("Ana");
    attempt.select_answer(QuestionId::new(2), "d");

    tokio::time::advance(Duration::from_secs(599)).await;
    settle().await;
    assert_eq!(attempt.status(), AttemptStatus::Active);
    assert_eq!(attempt.remaining(), Duration::from_secs(1));
    assert_eq!(repo.count_results().await.unwrap(), 0);

    tokio::time::advance(Duration::from_secs(1)).await;
    let mut status = attempt.subscribe();
    status.wait_for(|s| s.is_terminal()).await.unwrap();
    assert_eq!(attempt.status(), AttemptStatus::Submitted);

    let result = attempt.result().unwrap();
    assert_eq!(result.student_name(), "Ana");
    assert_eq!((result.score(), result.total()), (1, 2));

    tokio::time::advance(Duration::from_secs(600)).await;
    settle().await;
    assert_eq!(repo.count_results().await.unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn manual_submit_cancels_the_countdown() {
    let repo = InMemoryRepository::new();
    let attempt = start(&repo, AttemptConfig::default()).await;
    attempt.set_student_name("Bo");

    tokio::time::advance(Duration::from_secs(100)).await;
    let outcome = attempt.submit(AttemptTrigger::Manual).await.unwrap();
    assert!(outcome.is_recorded());
    assert_eq!(attempt.remaining(), Duration::ZERO);

    tokio::time::advance(Duration::from_secs(1_000)).await;
    settle().await;
    assert_eq!(repo.count_results().await.unwrap(), 1);
    assert_eq!(attempt.result().unwrap().student_name(), "Bo");
}

#[tokio::test(start_paused = true)]
async fn expiry_without_a_name_records_anonymous() {
    let repo = InMemoryRepository::new();
    let config = AttemptConfig {
        duration_ticks: 30,
        tick: Duration::from_millis(100),
        ..AttemptConfig::default()
    };
    let attempt = start(&repo, config).await;

    tokio::time::advance(Duration::from_secs(3)).await;
    let mut status = attempt.subscribe();
    status.wait_for(|s| *s == AttemptStatus::Submitted).await.unwrap();

    assert_eq!(attempt.result().unwrap().student_name(), "Anonymous");
    assert!(!attempt.select_answer(QuestionId::new(1), "a"));
    assert!(attempt.answer_review().is_some());
}

#[tokio::test(start_paused = true)]
async fn dropped_attempt_never_submits() {
    let repo = InMemoryRepository::new();
    let attempt = start(&repo, AttemptConfig::default()).await;
    attempt.set_student_name("Cy");
    drop(attempt);

    tokio::time::advance(Duration::from_secs(700)).await;
    settle().await;
    assert_eq!(repo.count_results().await.unwrap(), 0);
}

fn short_countdown() -> AttemptConfig {
    AttemptConfig {
        duration_ticks: 5,
        max_persist_attempts: 3,
        expiry_retry: RetryConfig {
            max_attempts: 5,
            base_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(1),
            jitter_max: None,
        },
        ..AttemptConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn expiry_retries_a_failed_write_until_stored() {
    let repo = InMemoryRepository::new();
    let flaky = Arc::new(FlakyResults::new(repo.clone(), 1, true));
    let attempt = start_with_results(&repo, flaky.clone(), short_countdown()).await;
    attempt.set_student_name("Ana");
    attempt.select_answer(QuestionId::new(1), "a");

    tokio::time::advance(Duration::from_secs(5)).await;
    let mut status = attempt.subscribe();
    status.wait_for(|s| s.is_terminal()).await.unwrap();

    assert_eq!(attempt.status(), AttemptStatus::Submitted);
    assert_eq!(flaky.calls.load(Ordering::SeqCst), 2);
    assert_eq!(repo.count_results().await.unwrap(), 1);
    assert_eq!(attempt.result().unwrap().score(), 1);
}

#[tokio::test(start_paused = true)]
async fn expiry_gives_up_after_max_writes() {
    let repo = InMemoryRepository::new();
    let flaky = Arc::new(FlakyResults::new(repo.clone(), u32::MAX, true));
    let attempt = start_with_results(&repo, flaky.clone(), short_countdown()).await;
    attempt.set_student_name("Bo");

    tokio::time::advance(Duration::from_secs(5)).await;
    let mut status = attempt.subscribe();
    status.wait_for(|s| s.is_terminal()).await.unwrap();
    // Let the retry loop observe the failure and return.
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(attempt.status(), AttemptStatus::Failed);
    assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    assert_eq!(repo.count_results().await.unwrap(), 0);
    assert_eq!(attempt.unsaved_result().unwrap().student_name(), "Bo");
}

use chrono::Duration;
use quiz_core::model::{
    NewAttemptResult, OptionKey, Question, QuestionId, QuestionOptions, Quiz, QuizId,
};
use quiz_core::time::fixed_now;
use storage::repository::{QuestionStore, QuizStore, ResultStore, StorageError};
use storage::sqlite::SqliteRepository;

fn build_question(id: u64, quiz_id: QuizId, correct: OptionKey) -> Question {
    Question::new(
        QuestionId::new(id),
        quiz_id,
        format!("Question {id}?"),
        QuestionOptions::new("alpha", "beta", "gamma", "delta"),
        correct,
    )
    .unwrap()
}

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

#[tokio::test]
async fn sqlite_roundtrips_quiz_and_questions() {
    let repo = connect("memdb_quiz_questions").await;

    let quiz = Quiz::new(QuizId::new(1), "Geography", fixed_now()).unwrap();
    repo.upsert_quiz(&quiz).await.unwrap();
    repo.upsert_question(&build_question(10, quiz.id(), OptionKey::C))
        .await
        .unwrap();
    repo.upsert_question(&build_question(11, quiz.id(), OptionKey::A))
        .await
        .unwrap();

    let fetched = repo.get_quiz(quiz.id()).await.unwrap().expect("quiz");
    assert_eq!(fetched.title(), "Geography");

    let questions = repo.fetch_questions(quiz.id()).await.unwrap();
    assert_eq!(questions.len(), 2);
    assert_eq!(questions[0].correct_option(), OptionKey::C);
    assert_eq!(questions[0].options().get(OptionKey::D), "delta");
    assert_eq!(repo.count_questions().await.unwrap(), 2);
}

#[tokio::test]
async fn sqlite_assigns_result_ids_and_lists_by_quiz() {
    let repo = connect("memdb_results").await;

    for id in 1..=2 {
        let quiz = Quiz::new(
            QuizId::new(id),
            format!("Quiz {id}"),
            fixed_now() + Duration::minutes(i64::try_from(id).unwrap()),
        )
        .unwrap();
        repo.upsert_quiz(&quiz).await.unwrap();
    }

    let first = repo
        .insert_result(&NewAttemptResult::new(QuizId::new(1), "Ana", 3, 5, fixed_now()).unwrap())
        .await
        .unwrap();
    let second = repo
        .insert_result(&NewAttemptResult::new(QuizId::new(1), "Ben", 5, 5, fixed_now()).unwrap())
        .await
        .unwrap();
    repo.insert_result(&NewAttemptResult::new(QuizId::new(2), "Cy", 1, 1, fixed_now()).unwrap())
        .await
        .unwrap();

    assert_ne!(first.id(), second.id());
    let quiz_one = repo.list_results(QuizId::new(1)).await.unwrap();
    assert_eq!(quiz_one.len(), 2);
    assert!(quiz_one.iter().any(|r| r.student_name() == "Ben" && r.score() == 5));
    assert_eq!(repo.count_results().await.unwrap(), 3);
    assert_eq!(repo.list_all_results().await.unwrap().len(), 3);

    let quizzes = repo.list_quizzes().await.unwrap();
    assert_eq!(quizzes[0].id(), QuizId::new(2));
}

#[tokio::test]
async fn sqlite_rejects_result_for_unknown_quiz() {
    let repo = connect("memdb_fk").await;

    let err = repo
        .insert_result(&NewAttemptResult::new(QuizId::new(42), "Ana", 0, 1, fixed_now()).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Rejected(_)));
    assert!(!err.is_transient());
}

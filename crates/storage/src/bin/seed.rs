use std::fmt;

use chrono::{DateTime, Duration, Utc};
use quiz_core::model::{
    NewAttemptResult, OptionKey, Question, QuestionId, QuestionOptions, Quiz, QuizId,
};
use storage::repository::Storage;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    quiz_id: QuizId,
    title: String,
    results: u32,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidQuizId { raw: String },
    InvalidResults { raw: String },
    InvalidDbUrl { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidQuizId { raw } => write!(f, "invalid --quiz-id value: {raw}"),
            ArgsError::InvalidResults { raw } => write!(f, "invalid --results value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("QUIZ_DB_URL").unwrap_or_else(|_| "sqlite:dev.sqlite3".into());
        let mut quiz_id = std::env::var("QUIZ_ID")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .map_or_else(|| QuizId::new(1), QuizId::new);
        let mut title = std::env::var("QUIZ_TITLE").unwrap_or_else(|_| "Rust Fundamentals".into());
        let mut results = std::env::var("QUIZ_SEED_RESULTS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(3);
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--quiz-id" => {
                    let value = require_value(&mut args, "--quiz-id")?;
                    let parsed: u64 = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidQuizId { raw: value.clone() })?;
                    quiz_id = QuizId::new(parsed);
                }
                "--title" => {
                    title = require_value(&mut args, "--title")?;
                }
                "--results" => {
                    let value = require_value(&mut args, "--results")?;
                    results = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidResults { raw: value.clone() })?;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            quiz_id,
            title,
            results,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:dev.sqlite3)");
    eprintln!("  --quiz-id <id>            Quiz id to upsert (default: 1)");
    eprintln!("  --title <text>            Quiz title (default: Rust Fundamentals)");
    eprintln!("  --results <n>             Number of sample results to append (default: 3)");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  QUIZ_DB_URL, QUIZ_ID, QUIZ_TITLE, QUIZ_SEED_RESULTS");
}

const SAMPLES: [(&str, [&str; 4], OptionKey); 4] = [
    (
        "Which keyword declares an immutable binding?",
        ["let", "mut", "const fn", "static mut"],
        OptionKey::A,
    ),
    (
        "What does the `?` operator do with an `Err`?",
        ["Panics", "Returns it early", "Ignores it", "Logs it"],
        OptionKey::B,
    ),
    (
        "Which trait enables `{}` formatting?",
        ["Debug", "Clone", "Display", "Default"],
        OptionKey::C,
    ),
    (
        "Which type owns a growable UTF-8 string?",
        ["&str", "char", "Cow<str>", "String"],
        OptionKey::D,
    ),
];

const STUDENTS: [&str; 5] = ["Ana", "Ben", "Chen", "Dara", "Emeka"];

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    let quiz = Quiz::new(args.quiz_id, args.title.clone(), now)?;
    storage.quizzes.upsert_quiz(&quiz).await?;

    // Question ids are namespaced per quiz so reseeding another quiz does not clobber these.
    let base_id = args.quiz_id.value() * 1_000;
    for (offset, (text, options, correct)) in (1_u64..).zip(SAMPLES.iter()) {
        let [a, b, c, d] = *options;
        let question = Question::new(
            QuestionId::new(base_id + offset),
            quiz.id(),
            *text,
            QuestionOptions::new(a, b, c, d),
            *correct,
        )?;
        storage.questions.upsert_question(&question).await?;
    }

    let total = u32::try_from(SAMPLES.len())?;
    for i in 0..args.results {
        let name = STUDENTS[(i as usize) % STUDENTS.len()];
        let submitted_at = now - Duration::minutes(i64::from(i) * 7);
        let draft = NewAttemptResult::new(quiz.id(), name, (i * 3) % (total + 1), total, submitted_at)?;
        let _ = storage.results.insert_result(&draft).await?;
    }

    println!(
        "Seeded quiz {} with {} questions and {} results into {}",
        quiz.id(),
        SAMPLES.len(),
        args.results,
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

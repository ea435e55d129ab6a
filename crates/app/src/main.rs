use std::fmt;

use quiz_core::leaderboard::Leaderboard;
use quiz_core::model::{AttemptStatus, AttemptTrigger, OptionKey, QuestionId, QuizId};
use quiz_core::scoring::Verdict;
use services::{AppServices, AttemptConfig, Clock, DEFAULT_TOP_SCORES, SessionController};
use tracing_subscriber::EnvFilter;

const DEFAULT_DB_URL: &str = "sqlite://quiz.sqlite3";

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidQuizId { raw: String },
    InvalidLimit { raw: String },
    InvalidAnswer { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidQuizId { raw } => write!(f, "invalid --quiz-id value: {raw}"),
            ArgsError::InvalidLimit { raw } => write!(f, "invalid --limit value: {raw}"),
            ArgsError::InvalidAnswer { raw } => {
                write!(f, "invalid --answer value: {raw} (expected <question-id>=<a|b|c|d>)")
            }
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
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

fn print_usage() {
    eprintln!("Usage:");
    eprintln!(
        "  quiz-app attempt     [--db <sqlite_url>] [--quiz-id <id>] [--name <student>] [--answer <qid>=<key>]... [--wait]"
    );
    eprintln!("  quiz-app leaderboard [--db <sqlite_url>] [--quiz-id <id>] [--limit <n>]");
    eprintln!("  quiz-app overview    [--db <sqlite_url>]");
    eprintln!();
    eprintln!("--wait leaves submission to the countdown instead of submitting right away.");
    eprintln!("leaderboard without --quiz-id shows the top {DEFAULT_TOP_SCORES} across all quizzes.");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db {DEFAULT_DB_URL}");
    eprintln!("  --quiz-id 1");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_DB_URL, QUIZ_ID, RUST_LOG");
    eprintln!(
        "  QUIZ_DURATION_TICKS, QUIZ_TICK_MILLIS, QUIZ_PERSIST_TIMEOUT_MS, QUIZ_PERSIST_ATTEMPTS, QUIZ_DEFAULT_NAME"
    );
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Attempt,
    Leaderboard,
    Overview,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "attempt" => Some(Self::Attempt),
            "leaderboard" => Some(Self::Leaderboard),
            "overview" => Some(Self::Overview),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Args {
    db_url: String,
    quiz_id: Option<QuizId>,
    student_name: String,
    answers: Vec<(QuestionId, String)>,
    limit: Option<usize>,
    wait_for_expiry: bool,
}

fn parse_quiz_id(raw: String) -> Result<QuizId, ArgsError> {
    raw.trim()
        .parse::<u64>()
        .map(QuizId::new)
        .map_err(|_| ArgsError::InvalidQuizId { raw })
}

fn parse_answer(raw: String) -> Result<(QuestionId, String), ArgsError> {
    let Some((qid, key)) = raw.split_once('=') else {
        return Err(ArgsError::InvalidAnswer { raw });
    };
    let Ok(qid) = qid.trim().parse::<QuestionId>() else {
        return Err(ArgsError::InvalidAnswer { raw });
    };
    Ok((qid, key.trim().to_owned()))
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("QUIZ_DB_URL")
            .ok()
            .map_or_else(|| DEFAULT_DB_URL.into(), normalize_sqlite_url);
        let mut quiz_id = std::env::var("QUIZ_ID")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .map(QuizId::new);
        let mut student_name = String::new();
        let mut answers = Vec::new();
        let mut limit = None;
        let mut wait_for_expiry = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--quiz-id" => {
                    quiz_id = Some(parse_quiz_id(require_value(args, "--quiz-id")?)?);
                }
                "--name" => student_name = require_value(args, "--name")?,
                "--answer" => answers.push(parse_answer(require_value(args, "--answer")?)?),
                "--limit" => {
                    let value = require_value(args, "--limit")?;
                    let parsed = value
                        .parse::<usize>()
                        .map_err(|_| ArgsError::InvalidLimit { raw: value.clone() })?;
                    limit = Some(parsed);
                }
                "--wait" => wait_for_expiry = true,
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
            student_name,
            answers,
            limit,
            wait_for_expiry,
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_board(board: &Leaderboard) {
    if board.is_empty() {
        println!("  (no results yet)");
        return;
    }
    for entry in board.entries() {
        let result = &entry.result;
        println!(
            "  {:>2}. {:<20} {:>3}/{:<3} {}",
            entry.position,
            result.student_name(),
            result.score(),
            result.total(),
            result.submitted_at().format("%Y-%m-%d %H:%M:%S")
        );
    }
}

fn print_review(attempt: &SessionController) {
    let Some(review) = attempt.answer_review() else {
        return;
    };
    for (question, item) in attempt.questions().iter().zip(review) {
        let mark = match &item.verdict {
            Verdict::Correct => "correct".to_owned(),
            Verdict::Incorrect { selected } => format!("picked {selected:?}"),
            Verdict::Unanswered => "unanswered".to_owned(),
        };
        println!(
            "  [{}] {} -> {} ({mark})",
            question.id(),
            question.text(),
            question.options().get(item.correct_option)
        );
    }
}

async fn run_attempt(app: &AppServices, parsed: Args) -> Result<(), Box<dyn std::error::Error>> {
    let quiz_id = parsed.quiz_id.unwrap_or(QuizId::new(1));
    let attempt = app.attempts().start_attempt(quiz_id).await?;

    println!("Quiz {quiz_id}: {} questions", attempt.questions().len());
    for question in attempt.questions() {
        println!("  [{}] {}", question.id(), question.text());
        for key in OptionKey::ALL {
            println!("      {key}) {}", question.options().get(key));
        }
    }

    attempt.set_student_name(parsed.student_name);
    for (question_id, key) in parsed.answers {
        if !attempt.select_answer(question_id, key) {
            tracing::warn!(%question_id, "question is not part of this quiz; answer skipped");
        }
    }

    let result = if parsed.wait_for_expiry {
        println!("Waiting {:?} for the countdown...", attempt.remaining());
        let mut status = attempt.subscribe();
        status.wait_for(|s| s.is_terminal()).await?;
        if attempt.status() == AttemptStatus::Failed {
            return Err(attempt
                .submit(AttemptTrigger::TimerExpiry)
                .await
                .err()
                .map_or_else(|| "attempt failed".into(), Into::into));
        }
        attempt.result()
    } else {
        attempt
            .submit(AttemptTrigger::Manual)
            .await?
            .result()
            .cloned()
    };

    let Some(result) = result else {
        return Err("attempt finished without a stored result".into());
    };
    println!(
        "{} scored {}/{} (result #{})",
        result.student_name(),
        result.score(),
        result.total(),
        result.id()
    );
    print_review(&attempt);

    let ranked = app.leaderboards().leaderboard(quiz_id, None).await?;
    if let Some(position) = ranked.board.position_of(result.id()) {
        println!("Leaderboard position: {position} of {}", ranked.board.len());
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None | Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };
    argv.remove(0);

    let mut iter = argv.into_iter();
    let parsed = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&parsed.db_url)?;
    let app =
        AppServices::new_sqlite(&parsed.db_url, Clock::default(), AttemptConfig::from_env()).await?;
    tracing::debug!(db = %parsed.db_url, ?cmd, "storage ready");

    match cmd {
        Command::Attempt => run_attempt(&app, parsed).await,
        Command::Leaderboard => {
            let leaderboards = app.leaderboards();
            match parsed.quiz_id {
                Some(quiz_id) => {
                    let ranked = leaderboards.leaderboard(quiz_id, parsed.limit).await?;
                    println!("{}", ranked.quiz.title());
                    print_board(&ranked.board);
                }
                None => {
                    let limit = parsed.limit.unwrap_or(DEFAULT_TOP_SCORES);
                    println!("Top {limit} scores");
                    print_board(&leaderboards.top_scores(limit).await?);
                }
            }
            Ok(())
        }
        Command::Overview => {
            let overview = app.leaderboards().overview().await?;
            println!("quizzes:   {}", overview.quizzes);
            println!("questions: {}", overview.questions);
            println!("attempts:  {}", overview.attempts);
            Ok(())
        }
    }
}

/// File path of a `sqlite://` URL, without query parameters.
fn sqlite_file_path(db_url: &str) -> Option<&str> {
    let path = db_url.strip_prefix("sqlite://")?;
    let path = path.split('?').next().unwrap_or(path);
    (!path.is_empty()).then_some(path)
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = sqlite_file_path(db_url).ok_or_else(|| ArgsError::InvalidDbUrl {
        raw: db_url.to_string(),
    })?;
    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, ArgsError> {
        Args::parse(&mut args.iter().map(|s| (*s).to_owned()))
    }

    #[test]
    fn answers_are_collected_in_order() {
        let args = parse(&["--quiz-id", "2", "--answer", "2001=a", "--answer", "2002 = c"]).unwrap();
        assert_eq!(args.quiz_id, Some(QuizId::new(2)));
        assert_eq!(
            args.answers,
            vec![
                (QuestionId::new(2001), "a".to_owned()),
                (QuestionId::new(2002), "c".to_owned())
            ]
        );
    }

    #[test]
    fn malformed_answers_are_rejected() {
        assert!(matches!(
            parse(&["--answer", "a"]),
            Err(ArgsError::InvalidAnswer { .. })
        ));
        assert!(matches!(
            parse(&["--answer", "x=a"]),
            Err(ArgsError::InvalidAnswer { .. })
        ));
        assert!(matches!(
            parse(&["--limit"]),
            Err(ArgsError::MissingValue { flag: "--limit" })
        ));
    }

    #[test]
    fn default_db_is_a_prepared_sqlite_url() {
        if std::env::var_os("QUIZ_DB_URL").is_some() {
            return;
        }
        let args = parse(&[]).unwrap();
        assert_eq!(args.db_url, DEFAULT_DB_URL);
        assert_eq!(sqlite_file_path(&args.db_url), Some("quiz.sqlite3"));
    }

    #[test]
    fn sqlite_paths_become_absolute_urls() {
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
        assert!(normalize_sqlite_url("sqlite:quiz.sqlite3".into()).starts_with("sqlite:///"));
    }
}

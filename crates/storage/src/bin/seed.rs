use std::fmt;

use chrono::{DateTime, Utc};
use quiz_core::model::{Choice, ChoiceId, Question, QuestionId, Quiz, QuizId, QuizSettings};
use storage::repository::Storage;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    quiz_id: QuizId,
    title: String,
    description: Option<String>,
    questions: u32,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidQuizId { raw: String },
    InvalidQuestions { raw: String },
    InvalidDbUrl { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidQuizId { raw } => write!(f, "invalid --quiz-id value: {raw}"),
            ArgsError::InvalidQuestions { raw } => write!(f, "invalid --questions value: {raw}"),
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
        let mut title = std::env::var("QUIZ_TITLE").unwrap_or_else(|_| "Sample quiz".into());
        let mut description = std::env::var("QUIZ_DESC").ok();
        let mut questions = std::env::var("QUIZ_QUESTIONS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(5);
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
                "--desc" => {
                    description = Some(require_value(&mut args, "--desc")?);
                }
                "--questions" => {
                    let value = require_value(&mut args, "--questions")?;
                    questions = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidQuestions { raw: value.clone() })?;
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
            description,
            questions,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>    SQLite URL (default: sqlite:dev.sqlite3)");
    eprintln!("  --quiz-id <id>       Quiz id to upsert (default: 1)");
    eprintln!("  --title <name>       Quiz title (default: Sample quiz)");
    eprintln!("  --desc <text>        Optional quiz description");
    eprintln!("  --questions <n>      Number of sample questions to upsert (default: 5)");
    eprintln!("  --now <rfc3339>      Availability window opens at this time (default: now)");
    eprintln!("  -h, --help           Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  QUIZ_DB_URL, QUIZ_ID, QUIZ_TITLE, QUIZ_DESC, QUIZ_QUESTIONS");
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    let settings = QuizSettings::new(3)?
        .with_time_limit_minutes(Some(10))
        .with_window(Some(now), None)?
        .with_reveal_correct_answers(true)
        .published(true);
    let quiz = Quiz::new(args.quiz_id, args.title.clone(), args.description.clone(), settings)?;
    storage.quizzes.upsert_quiz(&quiz).await?;

    for i in 0..args.questions {
        let question_id = args.quiz_id.value() * 1_000 + u64::from(i) + 1;
        // every third question is multi-answer
        let multi = i % 3 == 2;
        let question = Question::new(
            QuestionId::new(question_id),
            args.quiz_id,
            i,
            format!("Sample question {}", i + 1),
            1,
        )?;
        storage.questions.upsert_question(&question).await?;

        for (offset, label) in ["A", "B", "C", "D"].iter().enumerate() {
            let correct = offset == 0 || (multi && offset == 1);
            let choice = Choice::new(
                ChoiceId::new(question_id * 10 + offset as u64),
                QuestionId::new(question_id),
                u32::try_from(offset)?,
                format!("Option {label}"),
                correct,
            )?;
            storage.questions.upsert_choice(&choice).await?;
        }
    }

    println!(
        "Seeded quiz {} with {} questions into {}",
        args.quiz_id.value(),
        args.questions,
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

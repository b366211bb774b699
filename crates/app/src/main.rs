use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use academy_core::model::{AchievementId, LessonId};
use services::{Clock, HydrationSource, ProgressEngine};
use tokio::io::{AsyncBufReadExt, BufReader};

mod catalog;
mod commands;
mod logging;

use commands::Command;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    MissingCommand,
    UnknownCommand(String),
    MissingOperand {
        command: &'static str,
        operand: &'static str,
    },
    InvalidIndex { raw: String },
    InvalidChallengeState { raw: String },
    InvalidDbUrl { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::MissingCommand => write!(f, "missing command"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown command: {cmd}"),
            ArgsError::MissingOperand { command, operand } => {
                write!(f, "{command} requires <{operand}>")
            }
            ArgsError::InvalidIndex { raw } => write!(f, "invalid number: {raw}"),
            ArgsError::InvalidChallengeState { raw } => {
                write!(f, "invalid challenge state (expected done|undone): {raw}")
            }
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

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  academy [options] <command> [args]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  status                      current lesson, streak, reviews, toasts");
    eprintln!("  study                       keep a session open and read commands from stdin");
    eprintln!("  goto <index>                open a lesson");
    eprintln!("  complete <index>            mark a lesson complete");
    eprintln!("  answer <lesson-id> <option> answer a lesson's quiz (first answer counts)");
    eprintln!("  reset-quiz <lesson-id>      clear a quiz answer");
    eprintln!("  challenge <lesson-id> done|undone");
    eprintln!("  dismiss [achievement-id..]  dismiss toasts (all pending when none given)");
    eprintln!("  achievements                list every badge");
    eprintln!("  analytics                   learning analytics");
    eprintln!("  certificate <name>          completion certificate");
    eprintln!("  export [path]               write a progress snapshot");
    eprintln!("  import <path>               replace progress with a snapshot");
    eprintln!("  share <base-url>            print a share link");
    eprintln!("  reset                       erase all progress");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>           default sqlite://academy.sqlite3");
    eprintln!("  --curriculum <path>         default: bundled course");
    eprintln!("  --url <launch_url>          consume a share link on start-up (applied once)");
    eprintln!("  --now <rfc3339>             pin the clock");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  ACADEMY_DB_URL, ACADEMY_CURRICULUM, RUST_LOG");
}

#[derive(Debug)]
struct Args {
    db_url: String,
    curriculum: Option<PathBuf>,
    launch_url: Option<String>,
    now: Option<DateTime<Utc>>,
    command: Command,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("ACADEMY_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://academy.sqlite3".into(), normalize_sqlite_url);
        let mut curriculum = std::env::var("ACADEMY_CURRICULUM").ok().map(PathBuf::from);
        let mut launch_url = None;
        let mut now = None;
        let mut positional = Vec::new();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--curriculum" => {
                    curriculum = Some(PathBuf::from(require_value(args, "--curriculum")?));
                }
                "--url" => launch_url = Some(require_value(args, "--url")?),
                "--now" => {
                    let value = require_value(args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?;
                    now = Some(parsed.with_timezone(&Utc));
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                flag if flag.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => positional.push(arg),
            }
        }

        Ok(Self {
            db_url,
            curriculum,
            launch_url,
            now,
            command: parse_command(positional)?,
        })
    }
}

fn parse_command(positional: Vec<String>) -> Result<Command, ArgsError> {
    let mut words = positional.into_iter();
    let Some(name) = words.next() else {
        return Err(ArgsError::MissingCommand);
    };
    let command = match name.as_str() {
        "status" => Command::Status,
        "study" => Command::Study,
        "goto" => Command::Goto(parse_index(operand(&mut words, "goto", "index")?)?),
        "complete" => Command::Complete(parse_index(operand(&mut words, "complete", "index")?)?),
        "answer" => {
            let lesson = LessonId::new(operand(&mut words, "answer", "lesson-id")?);
            let option = parse_index(operand(&mut words, "answer", "option")?)?;
            Command::Answer { lesson, option }
        }
        "reset-quiz" => {
            Command::ResetQuiz(LessonId::new(operand(&mut words, "reset-quiz", "lesson-id")?))
        }
        "challenge" => {
            let lesson = LessonId::new(operand(&mut words, "challenge", "lesson-id")?);
            let state = operand(&mut words, "challenge", "done|undone")?;
            let completed = match state.as_str() {
                "done" => true,
                "undone" => false,
                _ => return Err(ArgsError::InvalidChallengeState { raw: state }),
            };
            Command::Challenge { lesson, completed }
        }
        "dismiss" => Command::Dismiss(words.map(AchievementId::new).collect()),
        "achievements" => Command::Achievements,
        "analytics" => Command::Analytics,
        "certificate" => {
            let first = operand(&mut words, "certificate", "name")?;
            let name = std::iter::once(first).chain(words).collect::<Vec<_>>().join(" ");
            Command::Certificate { name }
        }
        "export" => Command::Export {
            path: words.next().map(PathBuf::from),
        },
        "import" => Command::Import {
            path: PathBuf::from(operand(&mut words, "import", "path")?),
        },
        "share" => Command::Share {
            base_url: operand(&mut words, "share", "base-url")?,
        },
        "reset" => Command::Reset,
        _ => return Err(ArgsError::UnknownCommand(name)),
    };
    Ok(command)
}

fn operand(
    words: &mut impl Iterator<Item = String>,
    command: &'static str,
    operand: &'static str,
) -> Result<String, ArgsError> {
    words
        .next()
        .ok_or(ArgsError::MissingOperand { command, operand })
}

fn parse_index(raw: String) -> Result<usize, ArgsError> {
    raw.parse().map_err(|_| ArgsError::InvalidIndex { raw })
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

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

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

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);
    if std::env::args().len() <= 1 {
        print_usage();
        return Ok(());
    }

    let parsed = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let curriculum = Arc::new(catalog::load(parsed.curriculum.as_deref())?);
    let clock = parsed.now.map_or_else(Clock::default_clock, Clock::fixed);

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&parsed.db_url)?;
    let mut engine = ProgressEngine::sqlite(&parsed.db_url, clock, curriculum).await?;

    let source = engine.hydrate(parsed.launch_url.as_deref()).await;
    tracing::debug!(?source, db = %parsed.db_url, "engine ready");
    if source == HydrationSource::SharedLink {
        eprintln!("loaded shared progress");
    }
    if let Some(cleaned) = engine.launch_url() {
        eprintln!("continue at {cleaned}");
    }

    let studying = parsed.command == Command::Study;
    commands::execute(&mut engine, parsed.command).await?;
    if studying {
        study(&mut engine).await?;
    }
    engine.flush_session().await;
    Ok(())
}

/// Read commands line by line until `quit` or end of input.
///
/// The engine stays alive between lines, so time spent on a lesson is
/// credited when the learner moves on or after each command.
async fn study(engine: &mut ProgressEngine) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("studying; enter commands, `quit` to stop");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let words: Vec<String> = line.split_whitespace().map(str::to_string).collect();
        match words.first().map(String::as_str) {
            None => continue,
            Some("quit" | "exit") => break,
            Some(_) => {}
        }
        match parse_command(words) {
            Ok(Command::Study) => eprintln!("already studying"),
            Ok(command) => {
                if let Err(err) = commands::execute(engine, command).await {
                    eprintln!("{err}");
                }
                engine.flush_session().await;
            }
            Err(err) => eprintln!("{err}"),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    logging::init();
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}

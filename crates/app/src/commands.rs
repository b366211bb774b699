use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use academy_core::achievements::{self, AchievementDef};
use academy_core::analytics::{self, WEAK_TOPIC_LIMIT};
use academy_core::model::{AchievementId, LessonId};
use academy_core::transfer::{ExportError, ImportError};
use services::{Clipboard, ClipboardError, ProgressEngine, ShareError};

/// A single CLI action against the progress engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Status,
    /// Show status, then keep the session open for further commands.
    Study,
    Goto(usize),
    Complete(usize),
    Answer { lesson: LessonId, option: usize },
    ResetQuiz(LessonId),
    Challenge { lesson: LessonId, completed: bool },
    /// Dismiss the listed toasts, or every pending one when empty.
    Dismiss(Vec<AchievementId>),
    Achievements,
    Analytics,
    Certificate { name: String },
    Export { path: Option<PathBuf> },
    Import { path: PathBuf },
    Share { base_url: String },
    Reset,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CommandError {
    #[error("unknown lesson: {0}")]
    UnknownLesson(LessonId),
    #[error("lesson {0} has no quiz")]
    NoQuiz(LessonId),
    #[error("lesson index {index} is out of range (0..{count})")]
    IndexOutOfRange { index: usize, count: usize },
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Share(#[from] ShareError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Terminal stand-in for a system clipboard: prints the text.
struct StdoutClipboard;

#[async_trait]
impl Clipboard for StdoutClipboard {
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        println!("{text}");
        Ok(())
    }
}

pub async fn execute(engine: &mut ProgressEngine, command: Command) -> Result<(), CommandError> {
    match command {
        Command::Status | Command::Study => print_status(engine),
        Command::Goto(index) => {
            check_index(engine, index)?;
            let unlocked = engine.go_to_lesson(index).await;
            announce(engine, &unlocked);
            print_status(engine);
        }
        Command::Complete(index) => {
            check_index(engine, index)?;
            let unlocked = engine.complete_lesson(index).await;
            announce(engine, &unlocked);
            println!(
                "completed {}/{} lessons",
                engine.state().completed_lessons.len(),
                engine.curriculum().lesson_count()
            );
        }
        Command::Answer { lesson, option } => {
            let correct = correct_option(engine, &lesson)?;
            if engine.state().quiz_result(&lesson).is_some() {
                println!("quiz {lesson} already answered; use reset-quiz to retry");
                return Ok(());
            }
            let unlocked = engine.record_quiz_answer(&lesson, option, correct).await;
            if option == correct {
                println!("correct!");
            } else {
                println!("not quite: the answer was option {correct}");
            }
            announce(engine, &unlocked);
        }
        Command::ResetQuiz(lesson) => {
            known_lesson(engine, &lesson)?;
            engine.reset_quiz_answer(&lesson).await;
            println!("quiz {lesson} cleared");
        }
        Command::Challenge { lesson, completed } => {
            known_lesson(engine, &lesson)?;
            let unlocked = engine.record_challenge_result(&lesson, completed).await;
            announce(engine, &unlocked);
        }
        Command::Dismiss(ids) => {
            let ids = if ids.is_empty() {
                engine.view().pending_toasts
            } else {
                ids
            };
            engine.dismiss_achievements(&ids).await;
            println!("{} pending", engine.view().pending_toasts.len());
        }
        Command::Achievements => print_achievements(engine),
        Command::Analytics => print_analytics(engine),
        Command::Certificate { name } => {
            let cert = analytics::certificate_summary(
                engine.state(),
                engine.curriculum(),
                &name,
                engine.clock().today(),
            );
            if !cert.eligible {
                println!(
                    "certificate unlocks after every lesson is complete ({}/{})",
                    cert.completed_lessons, cert.total_lessons
                );
                return Ok(());
            }
            println!("Certificate of Completion");
            println!("  {}", cert.recipient);
            println!(
                "  {}/{} lessons, {}% quiz accuracy",
                cert.completed_lessons, cert.total_lessons, cert.accuracy_percent
            );
            println!("  {}", cert.completion_date);
            println!("  verification code {}", cert.verification_code);
        }
        Command::Export { path } => {
            let snapshot = engine.export_progress()?;
            let path = path.unwrap_or_else(|| PathBuf::from(&snapshot.file_name));
            std::fs::write(&path, snapshot.contents)?;
            println!("exported progress to {}", path.display());
        }
        Command::Import { path } => {
            let text = read_file(&path)?;
            engine.import_progress(&text).await?;
            println!("imported progress from {}", path.display());
        }
        Command::Share { base_url } => {
            engine.share_progress(&StdoutClipboard, &base_url).await?;
        }
        Command::Reset => {
            engine.reset_all().await;
            println!("progress reset");
        }
    }
    Ok(())
}

fn check_index(engine: &ProgressEngine, index: usize) -> Result<(), CommandError> {
    let count = engine.curriculum().lesson_count();
    if index < count {
        Ok(())
    } else {
        Err(CommandError::IndexOutOfRange { index, count })
    }
}

fn known_lesson(engine: &ProgressEngine, lesson: &LessonId) -> Result<usize, CommandError> {
    engine
        .curriculum()
        .index_of(lesson)
        .ok_or_else(|| CommandError::UnknownLesson(lesson.clone()))
}

fn correct_option(engine: &ProgressEngine, lesson: &LessonId) -> Result<usize, CommandError> {
    let index = known_lesson(engine, lesson)?;
    engine
        .curriculum()
        .lesson(index)
        .and_then(|l| l.quiz.as_ref())
        .map(|quiz| quiz.correct)
        .ok_or_else(|| CommandError::NoQuiz(lesson.clone()))
}

fn read_file(path: &Path) -> Result<String, CommandError> {
    Ok(std::fs::read_to_string(path)?)
}

fn definition(engine: &ProgressEngine, id: &AchievementId) -> Option<AchievementDef> {
    achievements::catalog(engine.curriculum())
        .into_iter()
        .find(|def| &def.id == id)
}

fn announce(engine: &ProgressEngine, unlocked: &[AchievementId]) {
    for id in unlocked {
        match definition(engine, id) {
            Some(def) => println!("{} achievement unlocked: {}", def.icon, def.name),
            None => println!("achievement unlocked: {id}"),
        }
    }
}

fn print_status(engine: &ProgressEngine) {
    let view = engine.view();
    let curriculum = engine.curriculum();
    let title = curriculum
        .lesson(view.current_lesson_index)
        .map_or("?", |l| l.title.as_str());

    println!("lesson {}: {title}", view.current_lesson_index);
    println!(
        "completed {}/{}",
        view.completed.len(),
        curriculum.lesson_count()
    );
    println!(
        "streak {} day(s), best {}",
        view.streak.current_streak, view.streak.longest_streak
    );
    println!(
        "quizzes {}/{} correct ({}%)",
        view.total_correct, view.total_answered, view.accuracy_percent
    );
    if !view.due_reviews.is_empty() {
        let due: Vec<&str> = view.due_reviews.iter().map(LessonId::as_str).collect();
        println!("due for review: {}", due.join(", "));
    }
    if !view.pending_toasts.is_empty() {
        announce(engine, &view.pending_toasts);
    }
}

fn print_achievements(engine: &ProgressEngine) {
    let state = engine.state();
    let defs = achievements::catalog(engine.curriculum());
    println!(
        "{}/{} unlocked",
        defs.iter().filter(|d| state.achievements.contains(&d.id)).count(),
        defs.len()
    );
    for def in defs {
        let mark = match state.achievement_dates.get(&def.id) {
            Some(at) => format!("unlocked {}", at.format("%Y-%m-%d")),
            None if state.achievements.contains(&def.id) => "unlocked".to_string(),
            None => "locked".to_string(),
        };
        println!(
            "{} [{}] {}: {} ({mark})",
            def.icon,
            def.category.label(),
            def.name,
            def.description
        );
    }
}

fn print_analytics(engine: &ProgressEngine) {
    let state = engine.state();
    let curriculum = engine.curriculum();

    println!(
        "time invested {}",
        analytics::format_duration(analytics::total_time_seconds(state))
    );
    println!(
        "lessons done {}/{}",
        state.completed_lessons.len(),
        curriculum.lesson_count()
    );
    println!("quiz accuracy {}%", analytics::accuracy_percent(state));
    println!("day streak {}", state.streak.current_streak);

    println!("\nquiz accuracy by module");
    for row in analytics::module_accuracy(state, curriculum) {
        match row.percent {
            Some(pct) => println!(
                "  {:<12} {pct:>3}% ({}/{})",
                row.module, row.correct, row.answered
            ),
            None => println!("  {:<12}   -", row.module),
        }
    }

    println!("\nlesson completion");
    for module in analytics::completion_timeline(state, curriculum) {
        let dots: String = module
            .lessons
            .iter()
            .map(|l| match (l.done, l.current) {
                (_, true) => '>',
                (true, false) => '#',
                (false, false) => '.',
            })
            .collect();
        println!("  {:<12} {dots}", module.module);
    }

    println!("\nareas to improve");
    let weak = analytics::weak_topics(state, curriculum, WEAK_TOPIC_LIMIT);
    if weak.is_empty() {
        println!("  no weak areas detected yet");
    }
    for topic in weak {
        println!("  {} ({})", topic.lesson.title, topic.reason.label());
    }

    println!("\nlast 7 days");
    let week = analytics::weekly_activity(state, engine.clock().today());
    let cells: Vec<String> = week
        .iter()
        .map(|day| format!("{}:{}", day.label, day.level))
        .collect();
    println!("  {}", cells.join(" "));
}

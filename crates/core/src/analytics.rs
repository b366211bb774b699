//! Read-only projections over progress for dashboards and the certificate.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::NaiveDate;

use crate::model::{Curriculum, Lesson, ProgressState};

/// Maximum number of entries returned by [`weak_topics`].
pub const WEAK_TOPIC_LIMIT: usize = 3;

const VERIFICATION_CODE_LEN: usize = 12;
const WEEK_DAYS: u64 = 7;

//
// ─── TOTALS ────────────────────────────────────────────────────────────────────
//

#[must_use]
pub fn total_time_seconds(state: &ProgressState) -> u64 {
    state
        .lesson_time_spent
        .values()
        .fold(0_u64, |acc, secs| acc.saturating_add(*secs))
}

/// Rounded percentage of correct first answers; zero when nothing was answered.
#[must_use]
pub fn accuracy_percent(state: &ProgressState) -> u32 {
    percent(state.total_correct, state.total_answered).unwrap_or(0)
}

fn percent(correct: u32, answered: u32) -> Option<u32> {
    if answered == 0 {
        return None;
    }
    let (correct, answered) = (u64::from(correct), u64::from(answered));
    let rounded = (correct * 100 + answered / 2) / answered;
    Some(u32::try_from(rounded).unwrap_or(u32::MAX))
}

//
// ─── PER MODULE ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleAccuracy {
    pub module: String,
    pub correct: u32,
    pub answered: u32,
    /// `None` when no quiz in the module has been answered.
    pub percent: Option<u32>,
}

#[must_use]
pub fn module_accuracy(state: &ProgressState, curriculum: &Curriculum) -> Vec<ModuleAccuracy> {
    curriculum
        .modules()
        .iter()
        .map(|module| {
            let (correct, answered) = module
                .indices()
                .iter()
                .filter_map(|&i| curriculum.id_at(i))
                .filter_map(|id| state.quiz_result(id))
                .fold((0_u32, 0_u32), |(c, a), r| {
                    (c + u32::from(r.correct), a + 1)
                });
            ModuleAccuracy {
                module: module.label().to_string(),
                correct,
                answered,
                percent: percent(correct, answered),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineLesson {
    pub title: String,
    pub done: bool,
    pub current: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleTimeline {
    pub module: String,
    pub lessons: Vec<TimelineLesson>,
}

#[must_use]
pub fn completion_timeline(state: &ProgressState, curriculum: &Curriculum) -> Vec<ModuleTimeline> {
    curriculum
        .modules()
        .iter()
        .map(|module| ModuleTimeline {
            module: module.label().to_string(),
            lessons: module
                .indices()
                .iter()
                .filter_map(|&i| curriculum.lesson(i).map(|l| (i, l)))
                .map(|(i, lesson)| TimelineLesson {
                    title: lesson.title.clone(),
                    done: state.is_completed(i),
                    current: i == state.current_lesson_index,
                })
                .collect(),
        })
        .collect()
}

//
// ─── WEAK TOPICS ───────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeakReason {
    QuizFailed,
    ChallengeIncomplete,
    Skipped,
}

impl WeakReason {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::QuizFailed => "Quiz failed",
            Self::ChallengeIncomplete => "Challenge incomplete",
            Self::Skipped => "Skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeakTopic<'a> {
    pub index: usize,
    pub lesson: &'a Lesson,
    pub reason: WeakReason,
}

/// The first lessons (curriculum order) that need another look.
///
/// Each lesson reports only its strongest reason: a failed quiz, then a
/// challenge explicitly marked incomplete, then a lesson left behind
/// without being completed.
#[must_use]
pub fn weak_topics<'a>(
    state: &ProgressState,
    curriculum: &'a Curriculum,
    limit: usize,
) -> Vec<WeakTopic<'a>> {
    curriculum
        .lessons()
        .iter()
        .enumerate()
        .filter_map(|(index, lesson)| {
            let reason = if state.quiz_result(&lesson.id).is_some_and(|r| !r.correct) {
                WeakReason::QuizFailed
            } else if state.challenge_results.get(&lesson.id) == Some(&false) {
                WeakReason::ChallengeIncomplete
            } else if !state.is_completed(index) && index < state.current_lesson_index {
                WeakReason::Skipped
            } else {
                return None;
            };
            Some(WeakTopic {
                index,
                lesson,
                reason,
            })
        })
        .take(limit)
        .collect()
}

//
// ─── WEEKLY HEATMAP ────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayHeat {
    pub date: NaiveDate,
    /// Short weekday name (`Mon`, `Tue`, ...).
    pub label: String,
    /// 0 for no recorded activity, otherwise 1..=4.
    pub level: u8,
}

/// The seven days ending at `today`, oldest first.
#[must_use]
pub fn weekly_activity(state: &ProgressState, today: NaiveDate) -> Vec<DayHeat> {
    (0..WEEK_DAYS)
        .rev()
        .filter_map(|back| today.checked_sub_days(chrono::Days::new(back)))
        .map(|date| DayHeat {
            date,
            label: date.format("%a").to_string(),
            level: state.daily_activity.get(&date).map_or(0, |a| {
                let score = u64::from(a.lessons_completed) * 3
                    + u64::from(a.quizzes_taken) * 2
                    + a.time_spent_seconds / 300;
                match score {
                    8.. => 4,
                    5..=7 => 3,
                    2..=4 => 2,
                    _ => 1,
                }
            }),
        })
        .collect()
}

//
// ─── CERTIFICATE ───────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateSummary {
    pub recipient: String,
    pub completed_lessons: usize,
    pub total_lessons: usize,
    pub accuracy_percent: u32,
    /// Every lesson of the curriculum is completed.
    pub eligible: bool,
    /// Long-form date, e.g. `November 14, 2023`.
    pub completion_date: String,
    pub verification_code: String,
}

#[must_use]
pub fn certificate_summary(
    state: &ProgressState,
    curriculum: &Curriculum,
    recipient: &str,
    date: NaiveDate,
) -> CertificateSummary {
    let recipient = recipient.trim().to_string();
    let accuracy = accuracy_percent(state);
    let completion_date = date.format("%B %-d, %Y").to_string();
    let completed_lessons = state.completed_lessons.len();
    CertificateSummary {
        verification_code: verification_code(&recipient, &completion_date, accuracy),
        recipient,
        completed_lessons,
        total_lessons: curriculum.lesson_count(),
        accuracy_percent: accuracy,
        eligible: completed_lessons >= curriculum.lesson_count(),
        completion_date,
    }
}

/// Deterministic 12-character code printed on the certificate.
#[must_use]
pub fn verification_code(recipient: &str, date: &str, accuracy: u32) -> String {
    STANDARD
        .encode(format!("{recipient}|{date}|{accuracy}"))
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(VERIFICATION_CODE_LEN)
        .collect::<String>()
        .to_ascii_uppercase()
}

/// Compact duration label: `< 1m`, `42m` or `2h 5m`.
#[must_use]
pub fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        return "< 1m".to_string();
    }
    let total_minutes = (seconds + 30) / 60;
    let (hours, minutes) = (total_minutes / 60, total_minutes % 60);
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

//! Session timing, the daily activity ledger and streak bookkeeping.

use chrono::{DateTime, NaiveDate, Utc};

use crate::model::{ProgressState, StreakData};

/// Upper bound for a single flushed session. Covers a tab left open or a
/// machine that slept mid-lesson.
pub const MAX_SESSION_SECONDS: u64 = 1_800;

//
// ─── SESSION TIMER ─────────────────────────────────────────────────────────────
//

/// Wall-clock timer for the lesson currently on screen.
///
/// Not part of the persisted state; a fresh timer starts on every load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimer {
    started_at: DateTime<Utc>,
}

impl SessionTimer {
    #[must_use]
    pub fn start(now: DateTime<Utc>) -> Self {
        Self { started_at: now }
    }

    pub fn restart(&mut self, now: DateTime<Utc>) {
        self.started_at = now;
    }

    /// Whole seconds since the timer started, clamped to `0..=MAX_SESSION_SECONDS`.
    ///
    /// A clock that moved backwards yields zero.
    #[must_use]
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> u64 {
        let secs = now.signed_duration_since(self.started_at).num_seconds();
        u64::try_from(secs).unwrap_or(0).min(MAX_SESSION_SECONDS)
    }
}

//
// ─── LEDGER ────────────────────────────────────────────────────────────────────
//

/// A single activity-producing action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    LessonCompleted,
    QuizTaken,
    TimeSpent(u64),
}

/// Bump exactly one counter of `day`'s ledger entry.
pub fn record_activity(state: &mut ProgressState, day: NaiveDate, activity: Activity) {
    let entry = state.daily_activity.entry(day).or_default();
    match activity {
        Activity::LessonCompleted => {
            entry.lessons_completed = entry.lessons_completed.saturating_add(1);
        }
        Activity::QuizTaken => entry.quizzes_taken = entry.quizzes_taken.saturating_add(1),
        Activity::TimeSpent(secs) => {
            entry.time_spent_seconds = entry.time_spent_seconds.saturating_add(secs);
        }
    }
}

/// Attribute `seconds` of study time to lesson `index` on `day`.
pub fn add_time_spent(state: &mut ProgressState, index: usize, day: NaiveDate, seconds: u64) {
    let spent = state.lesson_time_spent.entry(index).or_insert(0);
    *spent = spent.saturating_add(seconds);
    record_activity(state, day, Activity::TimeSpent(seconds));
}

//
// ─── STREAK ────────────────────────────────────────────────────────────────────
//

/// Register activity on `today`.
///
/// Same day: unchanged. Day after the last active day: extends the streak.
/// Any longer gap (or no prior activity) restarts at one. A `today` earlier
/// than the last active day (clock rollback) leaves the streak untouched.
pub fn touch_streak(streak: &mut StreakData, today: NaiveDate) {
    match streak.last_active_date {
        Some(last) if last >= today => return,
        Some(last) if last.succ_opt() == Some(today) => {
            streak.current_streak = streak.current_streak.saturating_add(1);
        }
        _ => streak.current_streak = 1,
    }
    streak.longest_streak = streak.longest_streak.max(streak.current_streak);
    streak.last_active_date = Some(today);
}

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::model::curriculum::Curriculum;
use crate::model::ids::{AchievementId, LessonId};
use crate::scheduler::{DEFAULT_EASE_FACTOR, MIN_EASE_FACTOR};

//
// ─── RECORDS ───────────────────────────────────────────────────────────────────
//

/// First recorded answer to a lesson's quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
    pub answered: bool,
    pub correct: bool,
    pub selected_option_index: usize,
}

impl QuizResult {
    #[must_use]
    pub fn answered(selected_option_index: usize, correct_index: usize) -> Self {
        Self {
            answered: true,
            correct: selected_option_index == correct_index,
            selected_option_index,
        }
    }
}

/// Spaced-repetition state for a previously missed quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewEntry {
    pub next_review_date: NaiveDate,
    pub interval_days: u32,
    pub ease_factor: f64,
    pub repetitions: u32,
}

impl ReviewEntry {
    #[must_use]
    pub fn is_due(&self, today: NaiveDate) -> bool {
        self.next_review_date <= today
    }
}

/// Per-day activity counters. Missing days read as all-zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DailyActivity {
    pub lessons_completed: u32,
    pub quizzes_taken: u32,
    pub time_spent_seconds: u64,
}

/// Consecutive-day learning streak.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreakData {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_active_date: Option<NaiveDate>,
}

//
// ─── AGGREGATE ─────────────────────────────────────────────────────────────────
//

/// The single persisted aggregate of learner progress.
///
/// Field names serialize in camelCase. Missing fields deserialize to their
/// defaults and unknown fields are kept in `extra` so newer records survive a
/// read/write cycle through an older build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressState {
    pub current_lesson_index: usize,
    pub completed_lessons: BTreeSet<usize>,
    pub quiz_results: BTreeMap<LessonId, QuizResult>,
    pub challenge_results: BTreeMap<LessonId, bool>,
    pub review_queue: BTreeMap<LessonId, ReviewEntry>,
    pub lesson_time_spent: BTreeMap<usize, u64>,
    pub daily_activity: BTreeMap<NaiveDate, DailyActivity>,
    pub streak: StreakData,
    pub total_correct: u32,
    pub total_answered: u32,
    pub consecutive_correct_quizzes: u32,
    pub achievements: BTreeSet<AchievementId>,
    pub achievements_seen: BTreeSet<AchievementId>,
    pub achievement_dates: BTreeMap<AchievementId, DateTime<Utc>>,
    /// Share token this state was last hydrated from; a link is applied once.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_share_token: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ProgressState {
    #[must_use]
    pub fn is_completed(&self, index: usize) -> bool {
        self.completed_lessons.contains(&index)
    }

    #[must_use]
    pub fn quiz_result(&self, lesson_id: &LessonId) -> Option<&QuizResult> {
        self.quiz_results.get(lesson_id)
    }

    /// Activity recorded on `day`, or all-zero counters.
    #[must_use]
    pub fn activity_on(&self, day: NaiveDate) -> DailyActivity {
        self.daily_activity.get(&day).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn time_spent_on(&self, index: usize) -> u64 {
        self.lesson_time_spent.get(&index).copied().unwrap_or(0)
    }

    /// Lesson ids whose review date is today or earlier, oldest first.
    #[must_use]
    pub fn due_reviews(&self, today: NaiveDate) -> Vec<LessonId> {
        let mut due: Vec<(&NaiveDate, &LessonId)> = self
            .review_queue
            .iter()
            .filter(|(_, entry)| entry.is_due(today))
            .map(|(id, entry)| (&entry.next_review_date, id))
            .collect();
        due.sort();
        due.into_iter().map(|(_, id)| id.clone()).collect()
    }

    /// Granted achievements that have not been dismissed, in unlock order.
    #[must_use]
    pub fn pending_toasts(&self) -> Vec<AchievementId> {
        let mut pending: Vec<(Option<&DateTime<Utc>>, &AchievementId)> = self
            .achievements
            .difference(&self.achievements_seen)
            .map(|id| (self.achievement_dates.get(id), id))
            .collect();
        pending.sort();
        pending.into_iter().map(|(_, id)| id.clone()).collect()
    }

    /// Quiz totals recomputed from `quiz_results` as `(correct, answered)`.
    #[must_use]
    pub fn counted_totals(&self) -> (u32, u32) {
        self.quiz_results
            .values()
            .filter(|r| r.answered)
            .fold((0_u32, 0_u32), |(correct, answered), r| {
                (
                    correct.saturating_add(u32::from(r.correct)),
                    answered.saturating_add(1),
                )
            })
    }

    /// Restore every structural invariant against `curriculum`.
    ///
    /// Used on state that did not come out of the reducer (imports, share
    /// links). States produced by the reducer are already normalized, so
    /// this is the identity on them.
    pub fn normalize(&mut self, curriculum: &Curriculum) {
        let count = curriculum.lesson_count();

        self.current_lesson_index = self.current_lesson_index.min(count.saturating_sub(1));
        self.completed_lessons.retain(|&i| i < count);
        self.lesson_time_spent.retain(|&i, _| i < count);

        let (correct, answered) = self.counted_totals();
        self.total_correct = correct;
        self.total_answered = answered;
        self.quiz_results.retain(|_, r| r.answered);

        for entry in self.review_queue.values_mut() {
            entry.interval_days = entry.interval_days.max(1);
            if !entry.ease_factor.is_finite() {
                entry.ease_factor = DEFAULT_EASE_FACTOR;
            }
            entry.ease_factor = entry.ease_factor.max(MIN_EASE_FACTOR);
        }

        self.streak.longest_streak = self.streak.longest_streak.max(self.streak.current_streak);

        let granted = &self.achievements;
        self.achievements_seen.retain(|id| granted.contains(id));
        self.achievement_dates.retain(|id, _| granted.contains(id));
    }
}

use std::collections::BTreeSet;

use academy_core::analytics;
use academy_core::model::{AchievementId, LessonId, ProgressState, StreakData};
use chrono::NaiveDate;

/// Presentation-agnostic snapshot of progress for a single render.
///
/// No pre-formatted strings; the front-end decides how to show them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressView {
    pub current_lesson_index: usize,
    pub completed: BTreeSet<usize>,
    /// Lessons whose quiz review is due today or earlier.
    pub due_reviews: Vec<LessonId>,
    /// Unlocked achievements not yet dismissed, in unlock order.
    pub pending_toasts: Vec<AchievementId>,
    pub streak: StreakData,
    pub total_correct: u32,
    pub total_answered: u32,
    pub accuracy_percent: u32,
}

impl ProgressView {
    #[must_use]
    pub fn from_state(state: &ProgressState, today: NaiveDate) -> Self {
        Self {
            current_lesson_index: state.current_lesson_index,
            completed: state.completed_lessons.clone(),
            due_reviews: state.due_reviews(today),
            pending_toasts: state.pending_toasts(),
            streak: state.streak,
            total_correct: state.total_correct,
            total_answered: state.total_answered,
            accuracy_percent: analytics::accuracy_percent(state),
        }
    }
}

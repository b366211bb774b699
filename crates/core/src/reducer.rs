//! Pure state transitions for the progress aggregate.
//!
//! Every transition takes the current state by reference and returns a new
//! one; callers swap it in whole. Achievements are re-evaluated after every
//! transition that changed anything.

use chrono::{DateTime, NaiveDate, Utc};

use crate::achievements;
use crate::activity::{self, Activity};
use crate::model::{AchievementId, Curriculum, LessonId, ProgressState, QuizResult};
use crate::scheduler::{ReviewScheduler, ReviewTransition};

/// Inputs shared by every transition.
#[derive(Debug, Clone, Copy)]
pub struct TransitionContext<'a> {
    pub curriculum: &'a Curriculum,
    pub now: DateTime<Utc>,
}

impl<'a> TransitionContext<'a> {
    #[must_use]
    pub fn new(curriculum: &'a Curriculum, now: DateTime<Utc>) -> Self {
        Self { curriculum, now }
    }

    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }
}

/// A learner action (or timer flush) applied to the aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Credit elapsed study time to the current lesson.
    FlushTime { elapsed_seconds: u64 },
    /// Credit elapsed time to the lesson being left, then move to `index`.
    GoToLesson { index: usize, elapsed_seconds: u64 },
    CompleteLesson { index: usize },
    RecordQuizAnswer {
        lesson_id: LessonId,
        selected_index: usize,
        correct_index: usize,
    },
    ResetQuizAnswer { lesson_id: LessonId },
    RecordChallengeResult { lesson_id: LessonId, completed: bool },
    DismissAchievements { ids: Vec<AchievementId> },
}

/// Result of applying one event.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: ProgressState,
    pub changed: bool,
    pub unlocked: Vec<AchievementId>,
}

/// Apply `event` to `state`.
///
/// Inputs outside their declared constraints (unknown lesson index, a second
/// answer to the same quiz) leave the state unchanged.
#[must_use]
pub fn apply(
    state: &ProgressState,
    event: &ProgressEvent,
    ctx: TransitionContext<'_>,
) -> Transition {
    let mut next = state.clone();
    let changed = match event {
        ProgressEvent::FlushTime { elapsed_seconds } => {
            flush_time(&mut next, *elapsed_seconds, ctx)
        }
        ProgressEvent::GoToLesson {
            index,
            elapsed_seconds,
        } => go_to_lesson(&mut next, *index, *elapsed_seconds, ctx),
        ProgressEvent::CompleteLesson { index } => complete_lesson(&mut next, *index, ctx),
        ProgressEvent::RecordQuizAnswer {
            lesson_id,
            selected_index,
            correct_index,
        } => record_quiz_answer(&mut next, lesson_id, *selected_index, *correct_index, ctx),
        ProgressEvent::ResetQuizAnswer { lesson_id } => reset_quiz_answer(&mut next, lesson_id),
        ProgressEvent::RecordChallengeResult {
            lesson_id,
            completed,
        } => record_challenge_result(&mut next, lesson_id, *completed),
        ProgressEvent::DismissAchievements { ids } => dismiss_achievements(&mut next, ids),
    };

    if !changed {
        return Transition {
            state: next,
            changed: false,
            unlocked: Vec::new(),
        };
    }

    let unlocked = achievements::grant_new(&mut next, ctx.curriculum, ctx.now);
    Transition {
        state: next,
        changed: true,
        unlocked,
    }
}

fn flush_time(state: &mut ProgressState, elapsed_seconds: u64, ctx: TransitionContext<'_>) -> bool {
    if elapsed_seconds < 1 {
        return false;
    }
    let seconds = elapsed_seconds.min(activity::MAX_SESSION_SECONDS);
    let today = ctx.today();
    let index = state.current_lesson_index;
    activity::add_time_spent(state, index, today, seconds);
    activity::touch_streak(&mut state.streak, today);
    true
}

fn go_to_lesson(
    state: &mut ProgressState,
    index: usize,
    elapsed_seconds: u64,
    ctx: TransitionContext<'_>,
) -> bool {
    if !ctx.curriculum.contains_index(index) {
        return false;
    }
    let flushed = flush_time(state, elapsed_seconds, ctx);
    let moved = state.current_lesson_index != index;
    state.current_lesson_index = index;
    flushed || moved
}

fn complete_lesson(state: &mut ProgressState, index: usize, ctx: TransitionContext<'_>) -> bool {
    if !ctx.curriculum.contains_index(index) || !state.completed_lessons.insert(index) {
        return false;
    }
    let today = ctx.today();
    activity::record_activity(state, today, Activity::LessonCompleted);
    activity::touch_streak(&mut state.streak, today);
    true
}

fn record_quiz_answer(
    state: &mut ProgressState,
    lesson_id: &LessonId,
    selected_index: usize,
    correct_index: usize,
    ctx: TransitionContext<'_>,
) -> bool {
    if state.quiz_results.contains_key(lesson_id) {
        return false;
    }
    let result = QuizResult::answered(selected_index, correct_index);
    state.quiz_results.insert(lesson_id.clone(), result);
    state.total_answered = state.total_answered.saturating_add(1);
    if result.correct {
        state.total_correct = state.total_correct.saturating_add(1);
        state.consecutive_correct_quizzes = state.consecutive_correct_quizzes.saturating_add(1);
    } else {
        state.consecutive_correct_quizzes = 0;
    }

    let today = ctx.today();
    match ReviewScheduler::new().next(state.review_queue.get(lesson_id), result.correct, today) {
        ReviewTransition::Unchanged => {}
        ReviewTransition::Scheduled(entry) => {
            state.review_queue.insert(lesson_id.clone(), entry);
        }
        ReviewTransition::Graduated => {
            state.review_queue.remove(lesson_id);
        }
    }

    activity::record_activity(state, today, Activity::QuizTaken);
    activity::touch_streak(&mut state.streak, today);
    true
}

fn reset_quiz_answer(state: &mut ProgressState, lesson_id: &LessonId) -> bool {
    let Some(result) = state.quiz_results.remove(lesson_id) else {
        return false;
    };
    if result.answered {
        state.total_answered = state.total_answered.saturating_sub(1);
    }
    if result.correct {
        state.total_correct = state.total_correct.saturating_sub(1);
    }
    true
}

fn record_challenge_result(
    state: &mut ProgressState,
    lesson_id: &LessonId,
    completed: bool,
) -> bool {
    state.challenge_results.insert(lesson_id.clone(), completed) != Some(completed)
}

fn dismiss_achievements(state: &mut ProgressState, ids: &[AchievementId]) -> bool {
    let mut changed = false;
    for id in ids {
        if state.achievements.contains(id) {
            changed |= state.achievements_seen.insert(id.clone());
        }
    }
    changed
}

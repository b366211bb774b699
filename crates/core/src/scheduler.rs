use chrono::NaiveDate;

use crate::model::ReviewEntry;
use crate::time::add_days;

/// Ease assigned to an item on its first miss.
pub const DEFAULT_EASE_FACTOR: f64 = 2.5;
/// Floor the ease factor never drops below.
pub const MIN_EASE_FACTOR: f64 = 1.3;
/// Ease penalty applied when an already-scheduled item is missed again.
pub const EASE_PENALTY: f64 = 0.2;
/// Correct answers after which an item leaves the review queue.
pub const GRADUATION_REPETITIONS: u32 = 4;

//
// ─── TRANSITIONS ───────────────────────────────────────────────────────────────
//

/// Effect of a quiz answer on an item's review schedule.
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewTransition {
    /// Item was never missed and was answered correctly; nothing to schedule.
    Unchanged,
    /// Item is (re)scheduled with the given entry.
    Scheduled(ReviewEntry),
    /// Item reached the graduation threshold and leaves the queue.
    Graduated,
}

//
// ─── SCHEDULER ─────────────────────────────────────────────────────────────────
//

/// SM-2 style scheduler for missed quiz items.
///
/// Only missed items enter the queue. A miss resets the interval to one day;
/// a correct answer multiplies the interval by the ease factor until the item
/// graduates after [`GRADUATION_REPETITIONS`] correct answers.
///
/// # Examples
///
/// ```
/// # use academy_core::scheduler::{ReviewScheduler, ReviewTransition};
/// let today = academy_core::time::fixed_now().date_naive();
/// let scheduler = ReviewScheduler::new();
///
/// let ReviewTransition::Scheduled(entry) = scheduler.next(None, false, today) else {
///     panic!("a miss always schedules");
/// };
/// assert_eq!(entry.interval_days, 1);
///
/// let ReviewTransition::Scheduled(entry) = scheduler.next(Some(&entry), true, today) else {
///     panic!("one correct answer does not graduate");
/// };
/// assert_eq!(entry.interval_days, 3);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ReviewScheduler;

impl ReviewScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Compute the next review state for an item answered on `today`.
    ///
    /// The ease penalty only applies to items that already have an entry; a
    /// first miss starts at [`DEFAULT_EASE_FACTOR`].
    #[must_use]
    pub fn next(
        &self,
        previous: Option<&ReviewEntry>,
        correct: bool,
        today: NaiveDate,
    ) -> ReviewTransition {
        match (previous, correct) {
            (None, true) => ReviewTransition::Unchanged,
            (None, false) => ReviewTransition::Scheduled(ReviewEntry {
                next_review_date: add_days(today, 1),
                interval_days: 1,
                ease_factor: DEFAULT_EASE_FACTOR,
                repetitions: 0,
            }),
            (Some(entry), false) => ReviewTransition::Scheduled(ReviewEntry {
                next_review_date: add_days(today, 1),
                interval_days: 1,
                ease_factor: (entry.ease_factor - EASE_PENALTY).max(MIN_EASE_FACTOR),
                repetitions: entry.repetitions,
            }),
            (Some(entry), true) => {
                let repetitions = entry.repetitions.saturating_add(1);
                if repetitions >= GRADUATION_REPETITIONS {
                    return ReviewTransition::Graduated;
                }
                let interval_days = scaled_interval(entry.interval_days, entry.ease_factor);
                ReviewTransition::Scheduled(ReviewEntry {
                    next_review_date: add_days(today, interval_days),
                    interval_days,
                    ease_factor: entry.ease_factor,
                    repetitions,
                })
            }
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scaled_interval(interval_days: u32, ease_factor: f64) -> u32 {
    let scaled = (f64::from(interval_days) * ease_factor).round();
    if scaled.is_nan() || scaled < 1.0 {
        1
    } else if scaled >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        scaled as u32
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

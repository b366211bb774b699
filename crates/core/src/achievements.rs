use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::model::{AchievementId, Curriculum, ProgressState};

pub const FIRST_STEPS: &str = "first-steps";
pub const PERFECT_QUIZ: &str = "perfect-quiz";
pub const QUIZ_STREAK_5: &str = "quiz-streak-5";
pub const SCHOLAR: &str = "scholar";
pub const STREAK_3: &str = "streak-3";
pub const STREAK_7: &str = "streak-7";
pub const STREAK_30: &str = "streak-30";
pub const COMPLETIONIST: &str = "completionist";
pub const ALL_CHALLENGES: &str = "all-challenges";

const QUIZ_STREAK_TARGET: u32 = 5;
const STREAK_TIERS: [(u32, &str); 3] = [(3, STREAK_3), (7, STREAK_7), (30, STREAK_30)];

/// Id of the badge for completing every lesson of a module.
#[must_use]
pub fn module_achievement_id(module_slug: &str) -> AchievementId {
    AchievementId::new(format!("module-{module_slug}"))
}

//
// ─── CATALOG ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AchievementCategory {
    Progress,
    Modules,
    Quizzes,
    Streaks,
}

impl AchievementCategory {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Progress => "Progress",
            Self::Modules => "Modules",
            Self::Quizzes => "Quizzes",
            Self::Streaks => "Streaks",
        }
    }
}

/// Display metadata for a badge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AchievementDef {
    pub id: AchievementId,
    pub name: String,
    pub description: String,
    pub icon: &'static str,
    pub category: AchievementCategory,
}

impl AchievementDef {
    fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        icon: &'static str,
        category: AchievementCategory,
    ) -> Self {
        Self {
            id: AchievementId::new(id),
            name: name.into(),
            description: description.into(),
            icon,
            category,
        }
    }
}

/// Every badge available for `curriculum`, in display order.
#[must_use]
pub fn catalog(curriculum: &Curriculum) -> Vec<AchievementDef> {
    use AchievementCategory::{Modules, Progress, Quizzes, Streaks};

    let mut defs = vec![AchievementDef::new(
        FIRST_STEPS,
        "First Steps",
        "Complete your first lesson",
        "\u{1F463}",
        Progress,
    )];
    defs.extend(curriculum.modules().iter().map(|module| AchievementDef {
        id: module_achievement_id(&module.slug()),
        name: format!("{} Master", module.label()),
        description: format!("Complete every lesson in {}", module.label()),
        icon: "\u{1F3C5}",
        category: Modules,
    }));
    defs.extend([
        AchievementDef::new(
            COMPLETIONIST,
            "Completionist",
            "Complete every lesson in the course",
            "\u{1F393}",
            Progress,
        ),
        AchievementDef::new(
            ALL_CHALLENGES,
            "Hands-On Hero",
            "Finish every hands-on challenge",
            "\u{1F6E0}\u{FE0F}",
            Progress,
        ),
        AchievementDef::new(
            PERFECT_QUIZ,
            "Sharp Shooter",
            "Answer a quiz correctly",
            "\u{1F3AF}",
            Quizzes,
        ),
        AchievementDef::new(
            QUIZ_STREAK_5,
            "On a Roll",
            "Answer 5 quizzes correctly in a row",
            "\u{1F525}",
            Quizzes,
        ),
        AchievementDef::new(
            SCHOLAR,
            "Scholar",
            "Answer every quiz correctly",
            "\u{1F4DA}",
            Quizzes,
        ),
    ]);
    defs.extend(STREAK_TIERS.iter().map(|&(days, id)| {
        AchievementDef::new(
            id,
            format!("{days}-Day Streak"),
            format!("Learn on {days} consecutive days"),
            "\u{1F4C5}",
            Streaks,
        )
    }));
    defs
}

//
// ─── EVALUATOR ─────────────────────────────────────────────────────────────────
//

/// Achievements earned by `state`, unioned with those already granted.
///
/// Each rule reads cumulative state, not the last transition, so the result
/// only depends on the current aggregate.
#[must_use]
pub fn evaluate(state: &ProgressState, curriculum: &Curriculum) -> BTreeSet<AchievementId> {
    let mut earned = state.achievements.clone();
    let mut grant = |id: &str, ok: bool| {
        if ok {
            earned.insert(AchievementId::from(id));
        }
    };

    grant(FIRST_STEPS, !state.completed_lessons.is_empty());
    grant(
        PERFECT_QUIZ,
        state.quiz_results.values().any(|r| r.correct),
    );
    grant(
        QUIZ_STREAK_5,
        state.consecutive_correct_quizzes >= QUIZ_STREAK_TARGET,
    );
    grant(
        SCHOLAR,
        curriculum
            .quiz_lesson_ids()
            .all(|id| state.quiz_result(id).is_some_and(|r| r.correct)),
    );
    for (days, id) in STREAK_TIERS {
        grant(id, state.streak.longest_streak >= days);
    }
    grant(
        COMPLETIONIST,
        state.completed_lessons.len() >= curriculum.lesson_count(),
    );
    grant(
        ALL_CHALLENGES,
        curriculum
            .challenge_lesson_ids()
            .all(|id| state.challenge_results.get(id).copied() == Some(true)),
    );

    for module in curriculum.modules() {
        if module.indices().iter().all(|i| state.is_completed(*i)) {
            earned.insert(module_achievement_id(&module.slug()));
        }
    }

    earned
}

/// Re-evaluate and record newly earned achievements with their unlock time.
///
/// Returns the ids granted by this call.
pub fn grant_new(
    state: &mut ProgressState,
    curriculum: &Curriculum,
    now: DateTime<Utc>,
) -> Vec<AchievementId> {
    let earned = evaluate(state, curriculum);
    let fresh: Vec<AchievementId> = earned.difference(&state.achievements).cloned().collect();
    for id in &fresh {
        state.achievement_dates.entry(id.clone()).or_insert(now);
    }
    state.achievements = earned;
    fresh
}

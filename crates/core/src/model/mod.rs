pub mod curriculum;
mod ids;
mod progress;

pub use curriculum::{
    ChallengeBlock, Curriculum, CurriculumDraft, CurriculumError, Lesson, ModuleGroup, QuizBlock,
};
pub use ids::{AchievementId, LessonId};
pub use progress::{DailyActivity, ProgressState, QuizResult, ReviewEntry, StreakData};

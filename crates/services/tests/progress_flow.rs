use std::sync::Arc;

use academy_core::model::{
    AchievementId, ChallengeBlock, Curriculum, Lesson, LessonId, ProgressState, QuizBlock,
};
use academy_core::time::fixed_now;
use async_trait::async_trait;
use chrono::Duration;
use services::{
    Clock, HydrationSource, InMemoryClipboard, ProgressEngine, ShareError,
};
use storage::repository::{
    InMemoryRepository, ProgressRecord, ProgressRepository, StorageError,
};

fn lesson(id: &str, module: &str, quiz: Option<usize>, challenge: bool) -> Lesson {
    Lesson {
        id: LessonId::from(id),
        module: module.to_string(),
        title: id.replace('-', " "),
        quiz: quiz.map(|correct| QuizBlock {
            question: format!("{id}?"),
            options: vec!["a".into(), "b".into(), "c".into()],
            correct,
            explanation: None,
        }),
        challenge: challenge.then(|| ChallengeBlock {
            title: format!("{id} lab"),
            description: None,
            steps: vec!["do the thing".into()],
        }),
    }
}

fn curriculum() -> Arc<Curriculum> {
    Arc::new(
        Curriculum::new(vec![
            lesson("setup", "Setup", None, true),
            lesson("what-is-api", "Foundation", Some(1), false),
            lesson("http-mechanics", "Foundation", Some(2), true),
            lesson("mysql-basics", "Database", Some(0), false),
        ])
        .expect("valid curriculum"),
    )
}

fn engine_with(repo: &InMemoryRepository) -> ProgressEngine {
    ProgressEngine::new(
        Clock::fixed(fixed_now()),
        curriculum(),
        Arc::new(repo.clone()),
    )
}

fn advance(engine: &mut ProgressEngine, delta: Duration) {
    let mut clock = engine.clock();
    clock.advance(delta);
    engine.set_clock(clock);
}

/// Repository whose every call fails.
struct BrokenRepository;

#[async_trait]
impl ProgressRepository for BrokenRepository {
    async fn load(&self) -> Result<Option<ProgressRecord>, StorageError> {
        Err(StorageError::Connection("disk unplugged".into()))
    }

    async fn save(&self, _record: &ProgressRecord) -> Result<(), StorageError> {
        Err(StorageError::Connection("quota exceeded".into()))
    }

    async fn clear(&self) -> Result<(), StorageError> {
        Err(StorageError::Connection("disk unplugged".into()))
    }
}

#[tokio::test]
async fn module_badge_is_granted_once_and_kept() {
    let repo = InMemoryRepository::new();
    let mut engine = engine_with(&repo);
    assert_eq!(engine.hydrate(None).await, HydrationSource::Default);

    let unlocked = engine.complete_lesson(0).await;
    assert!(unlocked.contains(&AchievementId::from("module-setup")));
    assert!(unlocked.contains(&AchievementId::from("first-steps")));
    assert_eq!(
        engine.state().achievement_dates[&AchievementId::from("module-setup")],
        fixed_now()
    );

    advance(&mut engine, Duration::minutes(10));
    engine.complete_lesson(3).await;
    assert!(engine
        .state()
        .achievements
        .contains(&AchievementId::from("module-setup")));
    assert_eq!(
        engine.state().achievement_dates[&AchievementId::from("module-setup")],
        fixed_now()
    );

    let stored = repo.load().await.unwrap().expect("persisted");
    assert_eq!(&stored.state, engine.state());
    assert_eq!(stored.last_visited, Some(fixed_now() + Duration::minutes(10)));
}

#[tokio::test]
async fn reset_all_restores_default_and_clears_storage() {
    let repo = InMemoryRepository::new();
    let mut engine = engine_with(&repo);
    engine.hydrate(None).await;
    engine.complete_lesson(1).await;
    engine
        .record_quiz_answer(&LessonId::from("what-is-api"), 0, 1)
        .await;
    assert!(repo.raw().unwrap().is_some());

    engine.reset_all().await;
    assert_eq!(engine.state(), &ProgressState::default());
    assert!(repo.raw().unwrap().is_none());

    engine.reset_all().await;
    assert_eq!(engine.state(), &ProgressState::default());
}

#[tokio::test]
async fn navigation_credits_time_to_the_lesson_being_left() {
    let repo = InMemoryRepository::new();
    let mut engine = engine_with(&repo);
    engine.hydrate(None).await;

    advance(&mut engine, Duration::seconds(90));
    engine.go_to_lesson(2).await;
    assert_eq!(engine.state().current_lesson_index, 2);
    assert_eq!(engine.state().time_spent_on(0), 90);
    assert_eq!(engine.state().time_spent_on(2), 0);

    advance(&mut engine, Duration::minutes(45));
    assert_eq!(engine.flush_session().await, 1_800);
    assert_eq!(engine.state().time_spent_on(2), 1_800);

    let today = engine.clock().today();
    assert_eq!(engine.state().activity_on(today).time_spent_seconds, 1_890);
    assert_eq!(engine.state().streak.current_streak, 1);
}

#[tokio::test]
async fn sub_second_flush_is_a_no_op() {
    let repo = InMemoryRepository::new();
    let mut engine = engine_with(&repo);
    engine.hydrate(None).await;

    advance(&mut engine, Duration::milliseconds(400));
    assert_eq!(engine.flush_session().await, 0);
    assert_eq!(engine.state(), &ProgressState::default());
    assert!(repo.raw().unwrap().is_none());
}

#[tokio::test]
async fn out_of_range_lessons_are_ignored() {
    let repo = InMemoryRepository::new();
    let mut engine = engine_with(&repo);
    engine.hydrate(None).await;

    assert!(engine.go_to_lesson(99).await.is_empty());
    assert!(engine.complete_lesson(4).await.is_empty());
    assert_eq!(engine.state(), &ProgressState::default());
}

#[tokio::test]
async fn review_schedule_follows_miss_then_reset_and_correct() {
    let repo = InMemoryRepository::new();
    let mut engine = engine_with(&repo);
    engine.hydrate(None).await;
    let id = LessonId::from("http-mechanics");
    let day0 = engine.clock().today();

    engine.record_quiz_answer(&id, 0, 2).await;
    assert!(engine.view().due_reviews.is_empty());

    advance(&mut engine, Duration::days(1));
    assert_eq!(engine.view().due_reviews, vec![id.clone()]);

    engine.reset_quiz_answer(&id).await;
    engine.record_quiz_answer(&id, 2, 2).await;
    let entry = &engine.state().review_queue[&id];
    assert_eq!(entry.repetitions, 1);
    assert_eq!(entry.interval_days, 3);
    assert_eq!(entry.next_review_date, day0 + chrono::Days::new(4));
    assert_eq!(
        (engine.state().total_correct, engine.state().total_answered),
        (1, 1)
    );
}

#[tokio::test]
async fn stored_progress_is_hydrated_by_a_new_engine() {
    let repo = InMemoryRepository::new();
    let mut first = engine_with(&repo);
    first.hydrate(None).await;
    first.go_to_lesson(2).await;
    first.complete_lesson(1).await;

    let mut second = engine_with(&repo);
    assert_eq!(second.hydrate(None).await, HydrationSource::Storage);
    assert_eq!(second.state(), first.state());
}

#[tokio::test]
async fn storage_failures_leave_memory_authoritative() {
    let mut engine = ProgressEngine::new(
        Clock::fixed(fixed_now()),
        curriculum(),
        Arc::new(BrokenRepository),
    );
    assert_eq!(engine.hydrate(None).await, HydrationSource::Default);

    engine.complete_lesson(0).await;
    engine
        .record_challenge_result(&LessonId::from("setup"), true)
        .await;
    assert!(engine.state().is_completed(0));
    assert_eq!(
        engine.state().challenge_results.get(&LessonId::from("setup")),
        Some(&true)
    );

    engine.reset_all().await;
    assert_eq!(engine.state(), &ProgressState::default());
}

#[tokio::test]
async fn dismissed_toasts_stop_pending() {
    let repo = InMemoryRepository::new();
    let mut engine = engine_with(&repo);
    engine.hydrate(None).await;
    engine.complete_lesson(0).await;

    let pending = engine.view().pending_toasts;
    assert_eq!(pending.len(), 2);

    engine
        .dismiss_achievements(&[pending[0].clone(), AchievementId::from("not-granted")])
        .await;
    assert_eq!(engine.view().pending_toasts, vec![pending[1].clone()]);
    assert!(!engine
        .state()
        .achievements_seen
        .contains(&AchievementId::from("not-granted")));
}

#[tokio::test]
async fn import_rejects_bad_files_without_touching_state() {
    let repo = InMemoryRepository::new();
    let mut engine = engine_with(&repo);
    engine.hydrate(None).await;
    engine.complete_lesson(2).await;
    let before = engine.state().clone();

    assert!(engine.import_progress("{\"completedLessons\": []}").await.is_err());
    assert!(engine.import_progress("<html>").await.is_err());
    assert_eq!(engine.state(), &before);
}

#[tokio::test]
async fn export_import_round_trip_through_the_engine() {
    let repo = InMemoryRepository::new();
    let mut engine = engine_with(&repo);
    engine.hydrate(None).await;
    engine.complete_lesson(0).await;
    engine
        .record_quiz_answer(&LessonId::from("what-is-api"), 1, 1)
        .await;
    let snapshot = engine.export_progress().unwrap();
    assert!(snapshot.file_name.starts_with("api-academy-progress-"));

    let other_repo = InMemoryRepository::new();
    let mut other = engine_with(&other_repo);
    other.hydrate(None).await;
    other.import_progress(&snapshot.contents).await.unwrap();
    assert_eq!(other.state(), engine.state());
    assert!(other_repo.raw().unwrap().is_some());

    let v1 = serde_json::json!({
        "currentLesson": 9,
        "completedLessons": [0, 1, 7],
        "quizResults": {"what-is-api": {"answered": true, "correct": false, "selectedIndex": 0}},
        "totalCorrect": 5,
        "totalAnswered": 5
    });
    other.import_progress(&v1.to_string()).await.unwrap();
    let state = other.state();
    assert_eq!(state.current_lesson_index, 3);
    assert_eq!(state.completed_lessons.len(), 2);
    assert_eq!((state.total_correct, state.total_answered), (0, 1));
}

#[tokio::test]
async fn share_link_takes_precedence_and_is_consumed() {
    let sharer_repo = InMemoryRepository::new();
    let mut sharer = engine_with(&sharer_repo);
    sharer.hydrate(None).await;
    sharer.go_to_lesson(2).await;
    sharer.complete_lesson(1).await;
    sharer
        .record_quiz_answer(&LessonId::from("what-is-api"), 1, 1)
        .await;

    let clipboard = InMemoryClipboard::new();
    let url = sharer
        .share_progress(&clipboard, "https://academy.test/?lang=en")
        .await
        .unwrap();
    assert_eq!(clipboard.contents().as_deref(), Some(url.as_str()));

    let receiver_repo = InMemoryRepository::new();
    let mut stale = engine_with(&receiver_repo);
    stale.hydrate(None).await;
    stale.complete_lesson(3).await;

    let mut receiver = engine_with(&receiver_repo);
    let source = receiver.hydrate(Some(url.as_str())).await;
    assert_eq!(source, HydrationSource::SharedLink);
    assert_eq!(receiver.launch_url(), Some("https://academy.test/?lang=en"));

    let state = receiver.state();
    assert_eq!(state.current_lesson_index, 2);
    assert_eq!(state.completed_lessons, sharer.state().completed_lessons);
    assert_eq!(state.quiz_results, sharer.state().quiz_results);
    assert!(!state.is_completed(3));
    assert!(state.achievements.contains(&AchievementId::from("first-steps")));

    let stored = receiver_repo.load().await.unwrap().expect("persisted");
    assert_eq!(&stored.state, receiver.state());
}

#[tokio::test]
async fn replayed_share_link_keeps_later_progress() {
    let mut sharer = engine_with(&InMemoryRepository::new());
    sharer.hydrate(None).await;
    sharer.complete_lesson(0).await;
    let url = sharer.share_url("https://academy.test/").unwrap();

    let repo = InMemoryRepository::new();
    let mut first_launch = engine_with(&repo);
    assert_eq!(
        first_launch.hydrate(Some(url.as_str())).await,
        HydrationSource::SharedLink
    );
    first_launch.complete_lesson(2).await;

    let mut second_launch = engine_with(&repo);
    let source = second_launch.hydrate(Some(url.as_str())).await;
    assert_eq!(source, HydrationSource::Storage);
    assert!(second_launch.state().is_completed(0));
    assert!(second_launch.state().is_completed(2));
    assert_eq!(second_launch.launch_url(), Some("https://academy.test/"));
}

#[tokio::test]
async fn broken_share_link_falls_back_to_storage() {
    let repo = InMemoryRepository::new();
    let mut first = engine_with(&repo);
    first.hydrate(None).await;
    first.complete_lesson(1).await;

    let mut second = engine_with(&repo);
    let source = second
        .hydrate(Some("https://academy.test/?progress=%%%not-base64"))
        .await;
    assert_eq!(source, HydrationSource::Storage);
    assert!(second.state().is_completed(1));
    assert_eq!(second.launch_url(), Some("https://academy.test/"));
}

#[tokio::test]
async fn clipboard_failure_is_reported_without_state_change() {
    let repo = InMemoryRepository::new();
    let mut engine = engine_with(&repo);
    engine.hydrate(None).await;
    engine.complete_lesson(0).await;
    let before = engine.state().clone();

    let err = engine
        .share_progress(&InMemoryClipboard::denied(), "https://academy.test/")
        .await
        .unwrap_err();
    assert!(matches!(err, ShareError::Clipboard(_)));
    assert!(matches!(
        engine.share_url("relative/path"),
        Err(ShareError::BaseUrl(_))
    ));
    assert_eq!(engine.state(), &before);
}

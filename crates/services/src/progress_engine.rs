use std::sync::Arc;

use tracing::{debug, info, warn};
use url::Url;

use academy_core::achievements;
use academy_core::activity::SessionTimer;
use academy_core::model::{AchievementId, Curriculum, LessonId, ProgressState};
use academy_core::reducer::{self, ProgressEvent, TransitionContext};
use academy_core::transfer::{self, ExportError, ImportError, Snapshot};
use storage::repository::{ProgressRecord, ProgressRepository, Storage};

use crate::Clock;
use crate::error::{AppServicesError, ShareError};
use crate::share::{self, Clipboard};
use crate::view::ProgressView;

/// Where the engine's state came from on start-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HydrationSource {
    SharedLink,
    Storage,
    Default,
}

/// Owns the progress aggregate for one learner.
///
/// Every mutation runs through the pure reducer, swaps the new state in and
/// then persists it. Persistence failures are logged and swallowed; the
/// in-memory state stays authoritative until the next successful save.
pub struct ProgressEngine {
    clock: Clock,
    curriculum: Arc<Curriculum>,
    repo: Arc<dyn ProgressRepository>,
    state: ProgressState,
    session: SessionTimer,
    launch_url: Option<String>,
}

impl ProgressEngine {
    #[must_use]
    pub fn new(
        clock: Clock,
        curriculum: Arc<Curriculum>,
        repo: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self {
            session: SessionTimer::start(clock.now()),
            clock,
            curriculum,
            repo,
            state: ProgressState::default(),
            launch_url: None,
        }
    }

    #[must_use]
    pub fn in_memory(clock: Clock, curriculum: Arc<Curriculum>) -> Self {
        Self::new(clock, curriculum, Storage::in_memory().progress)
    }

    /// Build an engine backed by `SQLite`.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Sqlite` if the store cannot be opened or migrated.
    pub async fn sqlite(
        db_url: &str,
        clock: Clock,
        curriculum: Arc<Curriculum>,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::new(clock, curriculum, storage.progress))
    }

    /// Override the clock (usually for deterministic testing).
    pub fn set_clock(&mut self, clock: Clock) {
        self.clock = clock;
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    #[must_use]
    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    #[must_use]
    pub fn curriculum(&self) -> &Curriculum {
        &self.curriculum
    }

    /// The launch URL with any share token removed, once [`hydrate`](Self::hydrate) ran.
    #[must_use]
    pub fn launch_url(&self) -> Option<&str> {
        self.launch_url.as_deref()
    }

    #[must_use]
    pub fn view(&self) -> ProgressView {
        ProgressView::from_state(&self.state, self.clock.today())
    }

    //
    // ─── HYDRATION ─────────────────────────────────────────────────────────────
    //

    /// Load the initial state: a share token in `launch_url` wins over the
    /// stored record, which wins over a fresh default.
    ///
    /// The token is consumed whether or not it decodes, and a token the stored
    /// record was already hydrated from is not applied again. A broken token
    /// or an unreadable record never fails start-up.
    pub async fn hydrate(&mut self, launch_url: Option<&str>) -> HydrationSource {
        let token = launch_url.map(share::take_share_token).and_then(|launch| {
            self.launch_url = Some(launch.cleaned);
            launch.token
        });

        let source = match token {
            Some(token) => self.hydrate_shared(token).await,
            None => self.load_stored().await,
        };

        self.session.restart(self.clock.now());
        debug!(?source, lesson = self.state.current_lesson_index, "progress hydrated");
        source
    }

    async fn hydrate_shared(&mut self, token: String) -> HydrationSource {
        let stored = self.load_stored().await;
        if self.state.applied_share_token.as_deref() == Some(token.as_str()) {
            debug!("share link already applied; keeping stored progress");
            return stored;
        }
        match transfer::decode_share_token(&token, &self.curriculum) {
            Ok(shared) => {
                self.state = shared;
                self.state.applied_share_token = Some(token);
                self.settle();
                self.persist().await;
                HydrationSource::SharedLink
            }
            Err(err) => {
                debug!(error = %err, "ignoring unreadable share link");
                stored
            }
        }
    }

    async fn load_stored(&mut self) -> HydrationSource {
        match self.repo.load().await {
            Ok(Some(record)) => {
                self.state = record.state;
                self.state.normalize(&self.curriculum);
                HydrationSource::Storage
            }
            Ok(None) => {
                self.state = ProgressState::default();
                HydrationSource::Default
            }
            Err(err) => {
                warn!(error = %err, "could not read stored progress; starting fresh");
                self.state = ProgressState::default();
                HydrationSource::Default
            }
        }
    }

    //
    // ─── MUTATIONS ─────────────────────────────────────────────────────────────
    //

    /// Flush the running session into the lesson being left, then open `index`.
    ///
    /// Returns achievements unlocked by the move.
    pub async fn go_to_lesson(&mut self, index: usize) -> Vec<AchievementId> {
        if !self.check_index(index, "go_to_lesson") {
            return Vec::new();
        }
        let elapsed_seconds = self.session.elapsed_seconds(self.clock.now());
        let unlocked = self
            .dispatch(ProgressEvent::GoToLesson {
                index,
                elapsed_seconds,
            })
            .await;
        self.session.restart(self.clock.now());
        unlocked
    }

    pub async fn complete_lesson(&mut self, index: usize) -> Vec<AchievementId> {
        if !self.check_index(index, "complete_lesson") {
            return Vec::new();
        }
        self.dispatch(ProgressEvent::CompleteLesson { index }).await
    }

    /// Record the first answer to a quiz. Later answers are ignored until
    /// [`reset_quiz_answer`](Self::reset_quiz_answer).
    pub async fn record_quiz_answer(
        &mut self,
        lesson_id: &LessonId,
        selected_index: usize,
        correct_index: usize,
    ) -> Vec<AchievementId> {
        self.dispatch(ProgressEvent::RecordQuizAnswer {
            lesson_id: lesson_id.clone(),
            selected_index,
            correct_index,
        })
        .await
    }

    pub async fn reset_quiz_answer(&mut self, lesson_id: &LessonId) {
        self.dispatch(ProgressEvent::ResetQuizAnswer {
            lesson_id: lesson_id.clone(),
        })
        .await;
    }

    pub async fn record_challenge_result(
        &mut self,
        lesson_id: &LessonId,
        completed: bool,
    ) -> Vec<AchievementId> {
        self.dispatch(ProgressEvent::RecordChallengeResult {
            lesson_id: lesson_id.clone(),
            completed,
        })
        .await
    }

    pub async fn dismiss_achievements(&mut self, ids: &[AchievementId]) {
        self.dispatch(ProgressEvent::DismissAchievements { ids: ids.to_vec() })
            .await;
    }

    /// Credit time since the last flush to the current lesson.
    ///
    /// Returns the seconds credited; zero (and nothing persisted) when less
    /// than a second has passed.
    pub async fn flush_session(&mut self) -> u64 {
        let elapsed_seconds = self.session.elapsed_seconds(self.clock.now());
        if elapsed_seconds == 0 {
            return 0;
        }
        self.dispatch(ProgressEvent::FlushTime { elapsed_seconds })
            .await;
        self.session.restart(self.clock.now());
        elapsed_seconds
    }

    /// Replace all progress with a fresh default and clear durable storage.
    pub async fn reset_all(&mut self) {
        self.state = ProgressState::default();
        self.session.restart(self.clock.now());
        if let Err(err) = self.repo.clear().await {
            warn!(error = %err, "failed to clear stored progress");
        }
        info!("progress reset");
    }

    //
    // ─── TRANSFER ──────────────────────────────────────────────────────────────
    //

    /// Serialize the current state as a downloadable snapshot.
    ///
    /// # Errors
    ///
    /// Returns `ExportError` if serialization fails.
    pub fn export_progress(&self) -> Result<Snapshot, ExportError> {
        transfer::export_snapshot(&self.state, self.clock.now())
    }

    /// Replace the current state with a snapshot.
    ///
    /// # Errors
    ///
    /// Returns `ImportError` for malformed or unsupported files; the current
    /// state is left untouched.
    pub async fn import_progress(&mut self, text: &str) -> Result<(), ImportError> {
        let imported = transfer::import_snapshot(text, &self.curriculum)?;
        self.state = imported;
        self.settle();
        self.session.restart(self.clock.now());
        self.persist().await;
        info!(
            completed = self.state.completed_lessons.len(),
            lesson = self.state.current_lesson_index,
            "progress imported"
        );
        Ok(())
    }

    /// Share link for the current state under `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `ShareError` if the token cannot be encoded or `base_url` is invalid.
    pub fn share_url(&self, base_url: &str) -> Result<Url, ShareError> {
        let token = transfer::encode_share_token(&self.state)?;
        Ok(share::build_share_url(base_url, &token)?)
    }

    /// Copy a share link to `clipboard`. State is never modified.
    ///
    /// # Errors
    ///
    /// Returns `ShareError::Clipboard` if the copy fails, or the errors of
    /// [`share_url`](Self::share_url).
    pub async fn share_progress(
        &self,
        clipboard: &dyn Clipboard,
        base_url: &str,
    ) -> Result<Url, ShareError> {
        let url = self.share_url(base_url)?;
        clipboard.write_text(url.as_str()).await?;
        debug!("share link copied");
        Ok(url)
    }

    //
    // ─── PIPELINE ──────────────────────────────────────────────────────────────
    //

    async fn dispatch(&mut self, event: ProgressEvent) -> Vec<AchievementId> {
        let ctx = TransitionContext::new(&self.curriculum, self.clock.now());
        let transition = reducer::apply(&self.state, &event, ctx);
        if !transition.changed {
            debug!(?event, "event left progress unchanged");
            return Vec::new();
        }
        debug!(?event, "progress updated");
        self.state = transition.state;
        for id in &transition.unlocked {
            info!(achievement = %id, "achievement unlocked");
        }
        self.persist().await;
        transition.unlocked
    }

    /// Re-run the achievement evaluator on state that bypassed the reducer.
    fn settle(&mut self) {
        let unlocked = achievements::grant_new(&mut self.state, &self.curriculum, self.clock.now());
        for id in &unlocked {
            info!(achievement = %id, "achievement unlocked");
        }
    }

    async fn persist(&self) {
        let record = ProgressRecord::new(self.state.clone(), self.clock.now());
        if let Err(err) = self.repo.save(&record).await {
            warn!(error = %err, "failed to persist progress; keeping in-memory state");
        }
    }

    fn check_index(&self, index: usize, op: &'static str) -> bool {
        let ok = self.curriculum.contains_index(index);
        if !ok {
            warn!(
                op,
                index,
                lesson_count = self.curriculum.lesson_count(),
                "lesson index out of range"
            );
        }
        ok
    }
}

//! Snapshot export/import and compact share tokens.
//!
//! Snapshots are versioned JSON documents. Older versions are upgraded one
//! step at a time by the functions in [`MIGRATIONS`] before validation.

use std::collections::{BTreeMap, BTreeSet};

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::model::{Curriculum, LessonId, ProgressState, QuizResult};

/// Schema version written by [`export_snapshot`].
pub const SNAPSHOT_VERSION: u64 = 2;

/// Query parameter carrying a share token.
pub const SHARE_PARAM: &str = "progress";

const ENVELOPE_KEYS: [&str; 3] = ["version", "exportedAt", "lastVisited"];

type Migration = fn(&mut Map<String, Value>);

/// `MIGRATIONS[n - 1]` upgrades a version `n` document to version `n + 1`.
const MIGRATIONS: [Migration; 1] = [migrate_v1_to_v2];

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Reasons a snapshot is rejected. The message is suitable for display.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ImportError {
    #[error("could not read file: not valid JSON ({0})")]
    InvalidJson(String),

    #[error("invalid progress file: expected a JSON object")]
    NotAnObject,

    #[error("invalid progress file: missing `{0}`")]
    MissingField(&'static str),

    #[error("invalid progress file: `{field}` must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("progress file version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u64, supported: u64 },

    #[error("invalid progress file: {0}")]
    Schema(String),
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExportError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ShareLinkError {
    #[error("share token is not valid base64url: {0}")]
    Encoding(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Invalid(#[from] ImportError),
}

//
// ─── EXPORT ────────────────────────────────────────────────────────────────────
//

/// A downloadable progress file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub file_name: String,
    pub contents: String,
}

/// Serialize the full state with version and timestamps.
///
/// # Errors
///
/// Returns `ExportError::Json` if serialization fails.
pub fn export_snapshot(state: &ProgressState, now: DateTime<Utc>) -> Result<Snapshot, ExportError> {
    let Value::Object(mut doc) = serde_json::to_value(state)? else {
        return Err(ExportError::Json(serde::ser::Error::custom(
            "progress state did not serialize to an object",
        )));
    };
    for key in ENVELOPE_KEYS {
        doc.remove(key);
    }
    let stamp = Value::String(now.to_rfc3339());
    doc.insert("version".into(), Value::from(SNAPSHOT_VERSION));
    doc.insert("exportedAt".into(), stamp.clone());
    doc.insert("lastVisited".into(), stamp);

    Ok(Snapshot {
        file_name: format!("api-academy-progress-{}.json", now.format("%Y-%m-%d")),
        contents: serde_json::to_string_pretty(&Value::Object(doc))?,
    })
}

//
// ─── IMPORT ────────────────────────────────────────────────────────────────────
//

/// Parse, migrate, validate and normalize a snapshot.
///
/// # Errors
///
/// Returns `ImportError` describing the first structural problem found.
pub fn import_snapshot(text: &str, curriculum: &Curriculum) -> Result<ProgressState, ImportError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ImportError::InvalidJson(e.to_string()))?;
    import_value(value, curriculum)
}

/// Same as [`import_snapshot`] for an already parsed document.
///
/// # Errors
///
/// See [`import_snapshot`].
pub fn import_value(value: Value, curriculum: &Curriculum) -> Result<ProgressState, ImportError> {
    let Value::Object(mut doc) = value else {
        return Err(ImportError::NotAnObject);
    };

    let version = match doc.get("version") {
        None | Some(Value::Null) => 1,
        Some(v) => v.as_u64().ok_or(ImportError::WrongType {
            field: "version",
            expected: "a positive integer",
        })?,
    };
    if version == 0 || version > SNAPSHOT_VERSION {
        return Err(ImportError::UnsupportedVersion {
            found: version,
            supported: SNAPSHOT_VERSION,
        });
    }
    for migrate in MIGRATIONS.iter().skip(usize::try_from(version - 1).unwrap_or(usize::MAX)) {
        migrate(&mut doc);
    }

    validate_required(&mut doc)?;
    for key in ENVELOPE_KEYS {
        doc.remove(key);
    }

    let mut state: ProgressState =
        serde_json::from_value(Value::Object(doc)).map_err(|e| ImportError::Schema(e.to_string()))?;
    state.normalize(curriculum);
    Ok(state)
}

fn validate_required(doc: &mut Map<String, Value>) -> Result<(), ImportError> {
    match doc.get_mut("currentLessonIndex") {
        None => return Err(ImportError::MissingField("currentLessonIndex")),
        Some(v) => {
            let index = lesson_index(v).ok_or(ImportError::WrongType {
                field: "currentLessonIndex",
                expected: "a non-negative integer",
            })?;
            *v = Value::from(index);
        }
    }
    match doc.get("completedLessons") {
        None => Err(ImportError::MissingField("completedLessons")),
        Some(Value::Array(_)) => Ok(()),
        Some(_) => Err(ImportError::WrongType {
            field: "completedLessons",
            expected: "a list",
        }),
    }
}

/// Accepts `3` and `3.0` alike; fractional, negative and non-numeric values are rejected.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn lesson_index(value: &Value) -> Option<u64> {
    if let Some(index) = value.as_u64() {
        return Some(index);
    }
    let float = value.as_f64()?;
    let integral = float.is_finite() && float >= 0.0 && float.fract() == 0.0;
    (integral && float <= f64::from(u32::MAX)).then_some(float as u64)
}

/// Version 1 is the pre-gamification layout.
fn migrate_v1_to_v2(doc: &mut Map<String, Value>) {
    rename_key(doc, "currentLesson", "currentLessonIndex");
    rename_key(doc, "streakData", "streak");

    if let Some(Value::Object(results)) = doc.get_mut("quizResults") {
        for result in results.values_mut() {
            if let Value::Object(result) = result {
                rename_key(result, "selectedIndex", "selectedOptionIndex");
            }
        }
    }
    if let Some(Value::Object(days)) = doc.get_mut("dailyActivity") {
        for day in days.values_mut() {
            if let Value::Object(day) = day {
                rename_key(day, "timeSpent", "timeSpentSeconds");
            }
        }
    }
    doc.insert("version".into(), Value::from(2_u64));
}

fn rename_key(obj: &mut Map<String, Value>, from: &str, to: &str) {
    if obj.contains_key(to) {
        return;
    }
    if let Some(v) = obj.remove(from) {
        obj.insert(to.to_string(), v);
    }
}

//
// ─── SHARE TOKENS ──────────────────────────────────────────────────────────────
//

/// Reduced state carried in a share link. No timestamps or streak data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SharedProgress {
    current_lesson_index: usize,
    completed_lessons: BTreeSet<usize>,
    quiz_results: BTreeMap<LessonId, QuizResult>,
    challenge_results: BTreeMap<LessonId, bool>,
    total_correct: u32,
    total_answered: u32,
}

/// Encode the shareable subset of `state` as a URL-safe token.
///
/// # Errors
///
/// Returns `ShareLinkError::Json` if serialization fails.
pub fn encode_share_token(state: &ProgressState) -> Result<String, ShareLinkError> {
    let shared = SharedProgress {
        current_lesson_index: state.current_lesson_index,
        completed_lessons: state.completed_lessons.clone(),
        quiz_results: state.quiz_results.clone(),
        challenge_results: state.challenge_results.clone(),
        total_correct: state.total_correct,
        total_answered: state.total_answered,
    };
    let json = serde_json::to_vec(&shared)?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

/// Decode a share token into a fresh state, validated like an import.
///
/// # Errors
///
/// Returns `ShareLinkError` if the token is not base64url, not JSON, or
/// fails snapshot validation.
pub fn decode_share_token(
    token: &str,
    curriculum: &Curriculum,
) -> Result<ProgressState, ShareLinkError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(token.trim().trim_end_matches('='))
        .map_err(|e| ShareLinkError::Encoding(e.to_string()))?;
    let value: Value = serde_json::from_slice(&bytes)?;
    Ok(import_value(value, curriculum)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::curriculum::fixtures;
    use crate::model::{AchievementId, ReviewEntry};
    use crate::time::fixed_now;

    fn rich_state() -> ProgressState {
        let mut s = ProgressState {
            current_lesson_index: 2,
            completed_lessons: [0, 1].into_iter().collect(),
            total_correct: 1,
            total_answered: 2,
            consecutive_correct_quizzes: 0,
            ..ProgressState::default()
        };
        s.quiz_results
            .insert(LessonId::from("l1"), QuizResult::answered(2, 2));
        s.quiz_results
            .insert(LessonId::from("l2"), QuizResult::answered(0, 2));
        s.challenge_results.insert(LessonId::from("l0"), true);
        s.review_queue.insert(
            LessonId::from("l2"),
            ReviewEntry {
                next_review_date: fixed_now().date_naive(),
                interval_days: 1,
                ease_factor: 2.3,
                repetitions: 1,
            },
        );
        s.lesson_time_spent.insert(0, 600);
        s.streak.current_streak = 2;
        s.streak.longest_streak = 5;
        s.streak.last_active_date = Some(fixed_now().date_naive());
        s.achievements.insert(AchievementId::from("first-steps"));
        s.achievements_seen.insert(AchievementId::from("first-steps"));
        s.achievement_dates
            .insert(AchievementId::from("first-steps"), fixed_now());
        s.extra.insert("theme".into(), Value::from("dark"));
        s
    }

    #[test]
    fn export_import_round_trips() {
        let c = fixtures::sample();
        let state = rich_state();
        let snap = export_snapshot(&state, fixed_now()).unwrap();
        assert_eq!(snap.file_name, "api-academy-progress-2023-11-14.json");
        assert!(snap.contents.contains("\"version\": 2"));

        let back = import_snapshot(&snap.contents, &c).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn rejects_structurally_invalid_files() {
        let c = fixtures::sample();
        assert!(matches!(
            import_snapshot("not json", &c),
            Err(ImportError::InvalidJson(_))
        ));
        assert_eq!(import_snapshot("[1,2]", &c), Err(ImportError::NotAnObject));
        assert_eq!(
            import_snapshot(r#"{"completedLessons":[]}"#, &c),
            Err(ImportError::MissingField("currentLessonIndex"))
        );
        assert!(matches!(
            import_snapshot(r#"{"currentLessonIndex":"3","completedLessons":[]}"#, &c),
            Err(ImportError::WrongType { field: "currentLessonIndex", .. })
        ));
        assert!(matches!(
            import_snapshot(r#"{"currentLessonIndex":3,"completedLessons":{}}"#, &c),
            Err(ImportError::WrongType { field: "completedLessons", .. })
        ));
        assert!(matches!(
            import_snapshot(r#"{"version":9,"currentLessonIndex":0,"completedLessons":[]}"#, &c),
            Err(ImportError::UnsupportedVersion { found: 9, .. })
        ));
        assert!(matches!(
            import_snapshot(r#"{"currentLessonIndex":0,"completedLessons":["a"]}"#, &c),
            Err(ImportError::Schema(_))
        ));
    }

    #[test]
    fn integral_float_index_is_accepted() {
        let c = fixtures::sample();
        let state =
            import_snapshot(r#"{"currentLessonIndex":3.0,"completedLessons":[0]}"#, &c).unwrap();
        assert_eq!(state.current_lesson_index, 3);

        for raw in ["2.5", "-1", "-1.0"] {
            let text = format!(r#"{{"currentLessonIndex":{raw},"completedLessons":[]}}"#);
            assert!(matches!(
                import_snapshot(&text, &c),
                Err(ImportError::WrongType { field: "currentLessonIndex", .. })
            ));
        }
    }

    #[test]
    fn v1_files_are_migrated() {
        let c = fixtures::sample();
        let v1 = r#"{
            "currentLesson": 4,
            "completedLessons": [0, 1, 2],
            "quizResults": {"l1": {"answered": true, "correct": false, "selectedIndex": 3}},
            "challengeResults": {"l0": true},
            "totalCorrect": 0,
            "totalAnswered": 1,
            "streakData": {"currentStreak": 2, "longestStreak": 3, "lastActiveDate": "2023-11-13"},
            "dailyActivity": {"2023-11-13": {"lessonsCompleted": 1, "quizzesTaken": 1, "timeSpent": 300}},
            "lastVisited": "2023-11-13T10:00:00.000Z"
        }"#;

        let s = import_snapshot(v1, &c).unwrap();
        assert_eq!(s.current_lesson_index, 4);
        assert_eq!(s.quiz_results[&LessonId::from("l1")].selected_option_index, 3);
        assert_eq!(s.streak.longest_streak, 3);
        let day = chrono::NaiveDate::from_ymd_opt(2023, 11, 13).unwrap();
        assert_eq!(s.activity_on(day).time_spent_seconds, 300);
        assert!(s.extra.is_empty());
    }

    #[test]
    fn share_token_carries_only_reduced_subset() {
        let c = fixtures::sample();
        let state = rich_state();
        let token = encode_share_token(&state).unwrap();
        assert!(token.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'));

        let shared = decode_share_token(&token, &c).unwrap();
        assert_eq!(shared.current_lesson_index, 2);
        assert_eq!(shared.completed_lessons, state.completed_lessons);
        assert_eq!(shared.quiz_results, state.quiz_results);
        assert_eq!(shared.challenge_results, state.challenge_results);
        assert_eq!((shared.total_correct, shared.total_answered), (1, 2));
        assert_eq!(shared.streak, crate::model::StreakData::default());
        assert!(shared.review_queue.is_empty());
        assert!(shared.achievements.is_empty());
    }

    #[test]
    fn broken_tokens_are_errors() {
        let c = fixtures::sample();
        assert!(matches!(
            decode_share_token("%%%", &c),
            Err(ShareLinkError::Encoding(_))
        ));
        let not_json = URL_SAFE_NO_PAD.encode(b"hello");
        assert!(matches!(
            decode_share_token(&not_json, &c),
            Err(ShareLinkError::Json(_))
        ));
        let missing = URL_SAFE_NO_PAD.encode(br#"{"completedLessons":[]}"#);
        assert!(matches!(
            decode_share_token(&missing, &c),
            Err(ShareLinkError::Invalid(ImportError::MissingField(_)))
        ));
    }
}

use academy_core::achievements;
use academy_core::model::{
    ChallengeBlock, Curriculum, Lesson, LessonId, ProgressState, QuizBlock,
};
use academy_core::reducer::{ProgressEvent, TransitionContext, apply};
use academy_core::time::fixed_now;
use academy_core::transfer::{export_snapshot, import_snapshot};
use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;

const LESSONS: usize = 6;

fn curriculum() -> Curriculum {
    let lessons = (0..LESSONS)
        .map(|i| Lesson {
            id: LessonId::new(format!("lesson-{i}")),
            module: if i < 3 { "Basics" } else { "Advanced" }.to_string(),
            title: format!("Lesson {i}"),
            quiz: (i % 2 == 0).then(|| QuizBlock {
                question: "?".into(),
                options: vec!["a".into(), "b".into(), "c".into()],
                correct: 1,
                explanation: None,
            }),
            challenge: (i % 3 == 0).then(|| ChallengeBlock {
                title: "Try it".into(),
                description: None,
                steps: vec!["one".into()],
            }),
        })
        .collect();
    Curriculum::new(lessons).expect("valid curriculum")
}

fn lesson_id(i: usize) -> LessonId {
    LessonId::new(format!("lesson-{i}"))
}

fn event() -> impl Strategy<Value = ProgressEvent> {
    // Indices deliberately run past the curriculum to exercise rejection.
    let index = 0..LESSONS + 2;
    prop_oneof![
        (0_u64..4_000).prop_map(|elapsed_seconds| ProgressEvent::FlushTime { elapsed_seconds }),
        (index.clone(), 0_u64..4_000).prop_map(|(index, elapsed_seconds)| {
            ProgressEvent::GoToLesson {
                index,
                elapsed_seconds,
            }
        }),
        index.clone().prop_map(|index| ProgressEvent::CompleteLesson { index }),
        (index.clone(), 0_usize..3).prop_map(|(i, selected_index)| {
            ProgressEvent::RecordQuizAnswer {
                lesson_id: lesson_id(i),
                selected_index,
                correct_index: 1,
            }
        }),
        index.clone().prop_map(|i| ProgressEvent::ResetQuizAnswer {
            lesson_id: lesson_id(i)
        }),
        (index, any::<bool>()).prop_map(|(i, completed)| {
            ProgressEvent::RecordChallengeResult {
                lesson_id: lesson_id(i),
                completed,
            }
        }),
    ]
}

/// Events paired with a number of whole days to advance the clock first.
fn timeline() -> impl Strategy<Value = Vec<(u8, ProgressEvent)>> {
    prop::collection::vec((0_u8..3, event()), 1..40)
}

fn replay<F>(steps: &[(u8, ProgressEvent)], mut check: F) -> ProgressState
where
    F: FnMut(&ProgressState, &ProgressState, &ProgressEvent, DateTime<Utc>),
{
    let c = curriculum();
    let mut now = fixed_now();
    let mut state = ProgressState::default();
    for (days, event) in steps {
        now += Duration::days(i64::from(*days));
        let next = apply(&state, event, TransitionContext::new(&c, now)).state;
        check(&state, &next, event, now);
        state = next;
    }
    state
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        ..ProptestConfig::default()
    })]

    #[test]
    fn totals_match_quiz_results(steps in timeline()) {
        replay(&steps, |_, next, _, _| {
            let (correct, answered) = next.counted_totals();
            assert_eq!((next.total_correct, next.total_answered), (correct, answered));
            assert!(next.total_correct <= next.total_answered);
        });
    }

    #[test]
    fn first_answer_wins(steps in timeline()) {
        replay(&steps, |prev, next, event, _| {
            if let ProgressEvent::RecordQuizAnswer { lesson_id, .. } = event {
                if let Some(existing) = prev.quiz_result(lesson_id) {
                    assert_eq!(next.quiz_result(lesson_id), Some(existing));
                    assert_eq!(next.total_answered, prev.total_answered);
                }
            }
        });
    }

    #[test]
    fn longest_streak_and_achievements_never_shrink(steps in timeline()) {
        replay(&steps, |prev, next, _, _| {
            assert!(next.streak.longest_streak >= prev.streak.longest_streak);
            assert!(next.streak.longest_streak >= next.streak.current_streak);
            assert!(next.achievements.is_superset(&prev.achievements));
            assert!(next.achievements_seen.is_subset(&next.achievements));
        });
    }

    #[test]
    fn structural_invariants_hold(steps in timeline()) {
        let c = curriculum();
        replay(&steps, |prev, next, _, _| {
            assert!(next.current_lesson_index < c.lesson_count());
            assert!(next.completed_lessons.iter().all(|i| *i < c.lesson_count()));
            for (i, secs) in &prev.lesson_time_spent {
                assert!(next.time_spent_on(*i) >= *secs);
            }
            for entry in next.review_queue.values() {
                assert!(entry.interval_days >= 1);
                assert!(entry.ease_factor >= 1.3);
            }
        });
    }

    #[test]
    fn export_then_import_is_lossless(steps in timeline()) {
        let c = curriculum();
        let state = replay(&steps, |_, _, _, _| {});
        let snapshot = export_snapshot(&state, fixed_now()).expect("export");
        let back = import_snapshot(&snapshot.contents, &c).expect("import");
        prop_assert_eq!(back, state);
    }

    #[test]
    fn evaluation_is_a_pure_function_of_state(steps in timeline()) {
        let c = curriculum();
        let state = replay(&steps, |_, _, _, _| {});
        prop_assert_eq!(achievements::evaluate(&state, &c), state.achievements.clone());
    }
}

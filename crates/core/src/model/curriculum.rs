use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::LessonId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CurriculumError {
    #[error("curriculum must contain at least one lesson")]
    Empty,

    #[error("duplicate lesson id: {0}")]
    DuplicateId(LessonId),

    #[error("lesson {id} has an empty {field}")]
    EmptyField { id: LessonId, field: &'static str },

    #[error("quiz in lesson {id} marks option {correct} correct but has {options} options")]
    QuizCorrectOutOfRange {
        id: LessonId,
        correct: usize,
        options: usize,
    },

    #[error("challenge in lesson {0} has no steps")]
    EmptyChallenge(LessonId),
}

//
// ─── CONTENT BLOCKS ────────────────────────────────────────────────────────────
//

/// Multiple-choice check embedded in a lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizBlock {
    pub question: String,
    pub options: Vec<String>,
    /// Zero-based index of the correct option.
    pub correct: usize,
    #[serde(default)]
    pub explanation: Option<String>,
}

/// Checklist-style hands-on task embedded in a lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeBlock {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub steps: Vec<String>,
}

/// One unit of curriculum content.
///
/// Only the parts the progress engine needs are modelled; prose and code
/// samples belong to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: LessonId,
    pub module: String,
    pub title: String,
    #[serde(default)]
    pub quiz: Option<QuizBlock>,
    #[serde(default)]
    pub challenge: Option<ChallengeBlock>,
}

/// A named group of consecutive lessons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleGroup {
    label: String,
    indices: Vec<usize>,
}

impl ModuleGroup {
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Lowercase slug used in achievement ids (`"Setup"` -> `"setup"`).
    #[must_use]
    pub fn slug(&self) -> String {
        module_slug(&self.label)
    }
}

/// Serialized shape of a curriculum file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CurriculumDraft {
    pub lessons: Vec<Lesson>,
}

impl CurriculumDraft {
    /// Validate the lesson list and build the lookup indexes.
    ///
    /// # Errors
    ///
    /// Returns `CurriculumError` for an empty list, duplicate ids, blank
    /// ids/modules, out-of-range quiz answers or empty challenges.
    pub fn validate(self) -> Result<Curriculum, CurriculumError> {
        Curriculum::new(self.lessons)
    }
}

//
// ─── CATALOG ───────────────────────────────────────────────────────────────────
//

/// Immutable, read-only lesson catalog indexed for the progress engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Curriculum {
    lessons: Vec<Lesson>,
    index_by_id: HashMap<LessonId, usize>,
    modules: Vec<ModuleGroup>,
}

impl Curriculum {
    /// Build a catalog from an ordered lesson list.
    ///
    /// # Errors
    ///
    /// See [`CurriculumDraft::validate`].
    pub fn new(lessons: Vec<Lesson>) -> Result<Self, CurriculumError> {
        if lessons.is_empty() {
            return Err(CurriculumError::Empty);
        }

        let mut index_by_id = HashMap::with_capacity(lessons.len());
        let mut modules: Vec<ModuleGroup> = Vec::new();

        for (index, lesson) in lessons.iter().enumerate() {
            if lesson.id.as_str().trim().is_empty() {
                return Err(CurriculumError::EmptyField {
                    id: lesson.id.clone(),
                    field: "id",
                });
            }
            if lesson.module.trim().is_empty() {
                return Err(CurriculumError::EmptyField {
                    id: lesson.id.clone(),
                    field: "module",
                });
            }
            if let Some(quiz) = &lesson.quiz {
                if quiz.correct >= quiz.options.len() {
                    return Err(CurriculumError::QuizCorrectOutOfRange {
                        id: lesson.id.clone(),
                        correct: quiz.correct,
                        options: quiz.options.len(),
                    });
                }
            }
            if let Some(challenge) = &lesson.challenge {
                if challenge.steps.is_empty() {
                    return Err(CurriculumError::EmptyChallenge(lesson.id.clone()));
                }
            }
            if index_by_id.insert(lesson.id.clone(), index).is_some() {
                return Err(CurriculumError::DuplicateId(lesson.id.clone()));
            }

            match modules.iter_mut().find(|m| m.label == lesson.module) {
                Some(group) => group.indices.push(index),
                None => modules.push(ModuleGroup {
                    label: lesson.module.clone(),
                    indices: vec![index],
                }),
            }
        }

        Ok(Self {
            lessons,
            index_by_id,
            modules,
        })
    }

    #[must_use]
    pub fn lesson_count(&self) -> usize {
        self.lessons.len()
    }

    #[must_use]
    pub fn lessons(&self) -> &[Lesson] {
        &self.lessons
    }

    #[must_use]
    pub fn lesson(&self, index: usize) -> Option<&Lesson> {
        self.lessons.get(index)
    }

    #[must_use]
    pub fn id_at(&self, index: usize) -> Option<&LessonId> {
        self.lessons.get(index).map(|l| &l.id)
    }

    #[must_use]
    pub fn index_of(&self, id: &LessonId) -> Option<usize> {
        self.index_by_id.get(id).copied()
    }

    #[must_use]
    pub fn contains_index(&self, index: usize) -> bool {
        index < self.lessons.len()
    }

    /// Module groups in order of first appearance.
    #[must_use]
    pub fn modules(&self) -> &[ModuleGroup] {
        &self.modules
    }

    #[must_use]
    pub fn module_indices(&self, label: &str) -> Option<&[usize]> {
        self.modules
            .iter()
            .find(|m| m.label == label)
            .map(ModuleGroup::indices)
    }

    /// Ids of lessons that embed a quiz, in curriculum order.
    pub fn quiz_lesson_ids(&self) -> impl Iterator<Item = &LessonId> {
        self.lessons
            .iter()
            .filter(|l| l.quiz.is_some())
            .map(|l| &l.id)
    }

    /// Ids of lessons that embed a challenge, in curriculum order.
    pub fn challenge_lesson_ids(&self) -> impl Iterator<Item = &LessonId> {
        self.lessons
            .iter()
            .filter(|l| l.challenge.is_some())
            .map(|l| &l.id)
    }
}

/// Lowercases a module label and replaces every run of non-alphanumerics with `-`.
#[must_use]
pub fn module_slug(label: &str) -> String {
    let mut slug = String::with_capacity(label.len());
    for ch in label.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

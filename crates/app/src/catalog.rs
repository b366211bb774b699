use std::path::Path;

use academy_core::model::{Curriculum, CurriculumDraft, CurriculumError};
use thiserror::Error;

const BUNDLED: &str = include_str!("../curriculum.yaml");

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("could not read curriculum {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("curriculum is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Invalid(#[from] CurriculumError),
}

/// Load and validate the catalog at `path`, or the bundled course when `None`.
pub fn load(path: Option<&Path>) -> Result<Curriculum, CatalogError> {
    let curriculum = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
                path: path.display().to_string(),
                source,
            })?;
            parse(&text)?
        }
        None => parse(BUNDLED)?,
    };
    tracing::debug!(
        lessons = curriculum.lesson_count(),
        modules = curriculum.modules().len(),
        "curriculum loaded"
    );
    Ok(curriculum)
}

fn parse(text: &str) -> Result<Curriculum, CatalogError> {
    let draft: CurriculumDraft = serde_yaml::from_str(text)?;
    Ok(draft.validate()?)
}

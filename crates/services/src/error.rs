//! Shared error types for the services crate.

use thiserror::Error;

use academy_core::transfer::ShareLinkError;
use storage::sqlite::SqliteInitError;

/// Error reported by a [`Clipboard`](crate::share::Clipboard) backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("clipboard unavailable: {0}")]
pub struct ClipboardError(pub String);

/// Errors emitted while building or copying a share link.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ShareError {
    #[error(transparent)]
    Link(#[from] ShareLinkError),
    #[error("invalid base url: {0}")]
    BaseUrl(#[from] url::ParseError),
    #[error(transparent)]
    Clipboard(#[from] ClipboardError),
}

/// Errors emitted while bootstrapping the engine.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}

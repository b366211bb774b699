use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use url::Url;

use academy_core::transfer::SHARE_PARAM;

use crate::error::ClipboardError;

//
// ─── CLIPBOARD ─────────────────────────────────────────────────────────────────
//

/// Destination for copied share links.
#[async_trait]
pub trait Clipboard: Send + Sync {
    /// Replace the clipboard contents with `text`.
    ///
    /// # Errors
    ///
    /// Returns `ClipboardError` if the clipboard is unavailable or denied.
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}

/// Clipboard kept in process memory. Can be told to refuse writes.
#[derive(Clone, Default)]
pub struct InMemoryClipboard {
    contents: Arc<Mutex<Option<String>>>,
    denied: bool,
}

impl InMemoryClipboard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A clipboard whose writes always fail.
    #[must_use]
    pub fn denied() -> Self {
        Self {
            denied: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn contents(&self) -> Option<String> {
        self.contents.lock().ok().and_then(|guard| guard.clone())
    }
}

#[async_trait]
impl Clipboard for InMemoryClipboard {
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        if self.denied {
            return Err(ClipboardError("write permission denied".into()));
        }
        let mut guard = self
            .contents
            .lock()
            .map_err(|e| ClipboardError(e.to_string()))?;
        *guard = Some(text.to_string());
        Ok(())
    }
}

//
// ─── LINKS ─────────────────────────────────────────────────────────────────────
//

/// `base` with its share parameter set to `token`. Other query pairs are kept.
///
/// # Errors
///
/// Returns `url::ParseError` if `base` is not an absolute URL.
pub fn build_share_url(base: &str, token: &str) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(base)?;
    let kept = foreign_pairs(&url);
    url.set_query(None);
    url.query_pairs_mut()
        .extend_pairs(kept)
        .append_pair(SHARE_PARAM, token);
    Ok(url)
}

/// A launch URL split into its share token and the URL with the token removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchUrl {
    pub token: Option<String>,
    pub cleaned: String,
}

/// Take the share token out of `raw`.
///
/// Unparseable input is returned unchanged with no token.
#[must_use]
pub fn take_share_token(raw: &str) -> LaunchUrl {
    let Ok(mut url) = Url::parse(raw) else {
        return LaunchUrl {
            token: None,
            cleaned: raw.to_string(),
        };
    };
    let token = url
        .query_pairs()
        .find(|(key, _)| key == SHARE_PARAM)
        .map(|(_, value)| value.into_owned());
    if token.is_some() {
        let kept = foreign_pairs(&url);
        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    }
    LaunchUrl {
        token,
        cleaned: url.to_string(),
    }
}

fn foreign_pairs(url: &Url) -> Vec<(String, String)> {
    url.query_pairs()
        .filter(|(key, _)| key != SHARE_PARAM)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

#![forbid(unsafe_code)]

pub mod error;
pub mod progress_engine;
pub mod share;
pub mod view;

pub use academy_core::Clock;

pub use error::{AppServicesError, ClipboardError, ShareError};
pub use progress_engine::{HydrationSource, ProgressEngine};
pub use share::{Clipboard, InMemoryClipboard, LaunchUrl};
pub use view::ProgressView;

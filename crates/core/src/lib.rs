#![forbid(unsafe_code)]

pub mod achievements;
pub mod activity;
pub mod analytics;
pub mod model;
pub mod reducer;
pub mod scheduler;
pub mod time;
pub mod transfer;

pub use time::Clock;

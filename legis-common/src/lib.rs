//! # legis common library
//!
//! Shared code for the legis ingestion crates:
//! - Error type
//! - Configuration loading (TOML + environment, with compiled defaults)
//! - Progress event types and the progress channel
//! - Clock abstraction for pacing and retry delays

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
pub use events::{ProgressChannel, ProgressEvent, ProgressStatus};
pub use time::{Clock, ManualClock, TokioClock};

//! Utilities Module - shared infrastructure
//!
//! - `constants`: Centralized limits and file names
//! - `id`: Workflow id validation (ids name files on disk)
//! - `time`: UTC timestamp helpers

pub mod constants;
mod id;
mod time;

pub use constants::{
    DEFAULT_FLUSH_THRESHOLD, DEFAULT_MAX_PENDING, DEFAULT_RECENT_CACHE_SIZE, DEFAULT_RETENTION_DAYS,
    EVENT_LOG_EXTENSION, MAX_WORKFLOW_ID_LEN, RING_BUFFER_SIZE,
};
pub use id::validate_workflow_id;
pub use time::{duration_ms_between, format_utc, to_unix_nanos};

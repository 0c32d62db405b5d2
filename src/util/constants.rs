//! Centralized constants for storage layout and buffering
//!
//! All limit values in one place for easy tuning.

// ═══════════════════════════════════════════════════════════════
// Event log
// ═══════════════════════════════════════════════════════════════

/// Recent events kept in memory per workflow
pub const RING_BUFFER_SIZE: usize = 1000;

/// Extension of per-workflow event log files (line-delimited JSON)
pub const EVENT_LOG_EXTENSION: &str = "jsonl";

/// Workflow ids name files, keep them short
pub const MAX_WORKFLOW_ID_LEN: usize = 128;

// ═══════════════════════════════════════════════════════════════
// Metrics
// ═══════════════════════════════════════════════════════════════

/// Buffered metrics before a flush to disk
pub const DEFAULT_FLUSH_THRESHOLD: usize = 10;

/// Recent metrics kept in memory (FIFO eviction)
pub const DEFAULT_RECENT_CACHE_SIZE: usize = 1000;

/// Unwritten metrics kept while flushes keep failing
pub const DEFAULT_MAX_PENDING: usize = 10_000;

/// Days of date-partitioned metrics files kept by cleanup
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

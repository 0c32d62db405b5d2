//! Analytics side-channel for per-skill outcomes
//!
//! The collector calls the sink after every recorded metric. Sink errors are
//! logged by the collector and never reach `record_execution` callers.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Receives skill/agent outcomes alongside the metrics store
pub trait AnalyticsSink: Send + Sync {
    fn record_outcome(&self, skill: &str, success: bool, duration_ms: u64) -> Result<()>;
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl AnalyticsSink for NoopSink {
    fn record_outcome(&self, _skill: &str, _success: bool, _duration_ms: u64) -> Result<()> {
        Ok(())
    }
}

/// One line of `skill_usage.jsonl`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillOutcome {
    pub skill: String,
    pub success: bool,
    pub duration_ms: u64,
    pub recorded_at: DateTime<Utc>,
}

/// Append-only JSONL sink (`<analytics_dir>/skill_usage.jsonl`)
#[derive(Debug)]
pub struct SkillUsageLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl SkillUsageLog {
    pub const FILE_NAME: &'static str = "skill_usage.jsonl";

    pub fn new(analytics_dir: impl AsRef<Path>) -> Self {
        Self {
            path: analytics_dir.as_ref().join(Self::FILE_NAME),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every parseable outcome, oldest first
    pub fn read_all(&self) -> Result<Vec<SkillOutcome>> {
        if !self.path.is_file() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }
}

impl AnalyticsSink for SkillUsageLog {
    fn record_outcome(&self, skill: &str, success: bool, duration_ms: u64) -> Result<()> {
        let outcome = SkillOutcome {
            skill: skill.to_string(),
            success,
            duration_ms,
            recorded_at: Utc::now(),
        };
        let line = serde_json::to_string(&outcome)?;

        let _guard = self.write_lock.lock();
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn skill_usage_appends_lines() {
        let dir = TempDir::new().unwrap();
        let sink = SkillUsageLog::new(dir.path().join("analytics"));

        sink.record_outcome("rust", true, 120).unwrap();
        sink.record_outcome("python", false, 40).unwrap();

        let outcomes = sink.read_all().unwrap();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].skill, "rust");
        assert!(outcomes[0].success);
        assert_eq!(outcomes[1].duration_ms, 40);
    }

    #[test]
    fn missing_file_reads_empty() {
        let dir = TempDir::new().unwrap();
        let sink = SkillUsageLog::new(dir.path());
        assert!(sink.read_all().unwrap().is_empty());
    }

    #[test]
    fn noop_sink_accepts_everything() {
        assert!(NoopSink.record_outcome("any", false, 0).is_ok());
    }
}

//! Workflow id validation
//!
//! Workflow ids become file names (`<id>.jsonl`), so they are validated
//! before any path is built from them.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ObserveError, Result};
use crate::util::constants::MAX_WORKFLOW_ID_LEN;

static WORKFLOW_ID: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)] // static pattern
    Regex::new(r"^[A-Za-z0-9_.-]+$").unwrap()
});

/// Validate a workflow id.
///
/// Valid ids are non-empty, at most 128 chars, made of `[A-Za-z0-9_.-]`,
/// and never contain `..`.
pub fn validate_workflow_id(id: &str) -> Result<()> {
    let reason = if id.trim().is_empty() {
        Some("cannot be empty")
    } else if id.len() > MAX_WORKFLOW_ID_LEN {
        Some("longer than 128 characters")
    } else if id.contains("..") {
        Some("must not contain '..'")
    } else if !WORKFLOW_ID.is_match(id) {
        Some("only letters, digits, '-', '_' and '.' are allowed")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ObserveError::InvalidWorkflowId {
            id: id.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_typical_ids() {
        for id in ["wf-1", "2026-10-19T12-00-00-abcd", "release_v1.2", "A"] {
            assert!(validate_workflow_id(id).is_ok(), "{id} should be valid");
        }
    }

    #[test]
    fn rejects_path_traversal() {
        for id in ["../evil", "foo/bar", "foo\\bar", "a..b", ".."] {
            let err = validate_workflow_id(id).unwrap_err();
            assert_eq!(err.code(), "OBS-001", "{id}");
        }
    }

    #[test]
    fn rejects_empty_and_blank() {
        assert!(validate_workflow_id("").is_err());
        assert!(validate_workflow_id("   ").is_err());
    }

    #[test]
    fn rejects_overlong() {
        let id = "a".repeat(MAX_WORKFLOW_ID_LEN + 1);
        assert!(validate_workflow_id(&id).is_err());
        assert!(validate_workflow_id(&id[..MAX_WORKFLOW_ID_LEN]).is_ok());
    }
}

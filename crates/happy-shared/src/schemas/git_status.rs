//! Working-tree snapshot for a session's repository.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use crate::validate::{field_error, non_null, nullable};

/// Raw counters a git status snapshot is built from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GitCounts {
    pub branch: Option<String>,
    pub is_dirty: bool,
    pub modified_count: u64,
    pub untracked_count: u64,
    pub staged_count: u64,
    pub last_updated_at: f64,
    pub staged_lines_added: u64,
    pub staged_lines_removed: u64,
    pub unstaged_lines_added: u64,
    pub unstaged_lines_removed: u64,
    pub upstream_branch: Option<String>,
    pub ahead_count: Option<u64>,
    pub behind_count: Option<u64>,
    pub stash_count: Option<u64>,
}

/// Totals are private and derived in [`GitStatus::new`], so they always agree
/// with the staged/unstaged counters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase", try_from = "GitStatusFields")]
#[ts(export)]
#[ts(rename_all = "camelCase")]
pub struct GitStatus {
    pub branch: Option<String>,
    pub is_dirty: bool,
    #[ts(type = "number")]
    pub modified_count: u64,
    #[ts(type = "number")]
    pub untracked_count: u64,
    #[ts(type = "number")]
    pub staged_count: u64,
    pub last_updated_at: f64,
    #[ts(type = "number")]
    pub staged_lines_added: u64,
    #[ts(type = "number")]
    pub staged_lines_removed: u64,
    #[ts(type = "number")]
    pub unstaged_lines_added: u64,
    #[ts(type = "number")]
    pub unstaged_lines_removed: u64,
    #[ts(type = "number")]
    lines_added: u64,
    #[ts(type = "number")]
    lines_removed: u64,
    #[ts(type = "number")]
    lines_changed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(type = "number")]
    pub ahead_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(type = "number")]
    pub behind_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(type = "number")]
    pub stash_count: Option<u64>,
}

/// A derived total does not fit in a `u64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{field} overflows: {rule} does not fit in u64")]
pub struct TotalsOverflow {
    pub field: &'static str,
    pub rule: &'static str,
}

fn checked_total(a: u64, b: u64, field: &'static str, rule: &'static str) -> Result<u64, TotalsOverflow> {
    a.checked_add(b).ok_or(TotalsOverflow { field, rule })
}

impl GitStatus {
    pub fn new(c: GitCounts) -> Result<Self, TotalsOverflow> {
        let lines_added = checked_total(
            c.staged_lines_added,
            c.unstaged_lines_added,
            "linesAdded",
            "stagedLinesAdded + unstagedLinesAdded",
        )?;
        let lines_removed = checked_total(
            c.staged_lines_removed,
            c.unstaged_lines_removed,
            "linesRemoved",
            "stagedLinesRemoved + unstagedLinesRemoved",
        )?;
        let lines_changed = checked_total(
            lines_added,
            lines_removed,
            "linesChanged",
            "linesAdded + linesRemoved",
        )?;
        Ok(Self {
            branch: c.branch,
            is_dirty: c.is_dirty,
            modified_count: c.modified_count,
            untracked_count: c.untracked_count,
            staged_count: c.staged_count,
            last_updated_at: c.last_updated_at,
            staged_lines_added: c.staged_lines_added,
            staged_lines_removed: c.staged_lines_removed,
            unstaged_lines_added: c.unstaged_lines_added,
            unstaged_lines_removed: c.unstaged_lines_removed,
            lines_added,
            lines_removed,
            lines_changed,
            upstream_branch: c.upstream_branch,
            ahead_count: c.ahead_count,
            behind_count: c.behind_count,
            stash_count: c.stash_count,
        })
    }

    pub fn lines_added(&self) -> u64 {
        self.lines_added
    }

    pub fn lines_removed(&self) -> u64 {
        self.lines_removed
    }

    pub fn lines_changed(&self) -> u64 {
        self.lines_changed
    }

    pub fn has_line_changes(&self) -> bool {
        self.lines_changed > 0
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GitStatusFields {
    #[serde(deserialize_with = "nullable")]
    branch: Option<String>,
    is_dirty: bool,
    modified_count: u64,
    untracked_count: u64,
    staged_count: u64,
    last_updated_at: f64,
    staged_lines_added: u64,
    staged_lines_removed: u64,
    unstaged_lines_added: u64,
    unstaged_lines_removed: u64,
    upstream_branch: Option<String>,
    #[serde(default, deserialize_with = "non_null")]
    ahead_count: Option<u64>,
    #[serde(default, deserialize_with = "non_null")]
    behind_count: Option<u64>,
    #[serde(default, deserialize_with = "non_null")]
    stash_count: Option<u64>,
    #[serde(default, deserialize_with = "non_null")]
    lines_added: Option<u64>,
    #[serde(default, deserialize_with = "non_null")]
    lines_removed: Option<u64>,
    #[serde(default, deserialize_with = "non_null")]
    lines_changed: Option<u64>,
}

impl TryFrom<GitStatusFields> for GitStatus {
    type Error = String;

    /// Totals on the wire are redundant; when present they must agree.
    fn try_from(f: GitStatusFields) -> Result<Self, Self::Error> {
        let status = GitStatus::new(GitCounts {
            branch: f.branch,
            is_dirty: f.is_dirty,
            modified_count: f.modified_count,
            untracked_count: f.untracked_count,
            staged_count: f.staged_count,
            last_updated_at: f.last_updated_at,
            staged_lines_added: f.staged_lines_added,
            staged_lines_removed: f.staged_lines_removed,
            unstaged_lines_added: f.unstaged_lines_added,
            unstaged_lines_removed: f.unstaged_lines_removed,
            upstream_branch: f.upstream_branch,
            ahead_count: f.ahead_count,
            behind_count: f.behind_count,
            stash_count: f.stash_count,
        })
        .map_err(|e| field_error(e.field, e))?;

        let totals = [
            ("linesAdded", f.lines_added, status.lines_added),
            ("linesRemoved", f.lines_removed, status.lines_removed),
            ("linesChanged", f.lines_changed, status.lines_changed),
        ];
        for (field, sent, computed) in totals {
            if let Some(sent) = sent
                && sent != computed
            {
                return Err(field_error(field, format!("expected {computed}, found {sent}")));
            }
        }
        Ok(status)
    }
}

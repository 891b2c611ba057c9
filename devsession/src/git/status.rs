// Live git working-tree status and its porcelain parser

use serde::{Deserialize, Serialize};

/// Working-tree status as reported by the git collaborator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitStatus {
    pub branch: String,
    pub commit: String,
    pub is_dirty: bool,
    /// Tracked files modified in the index or the worktree
    pub dirty_files: Vec<String>,
    /// Files added to the index that HEAD does not have
    pub new_files: Vec<String>,
    pub deleted_files: Vec<String>,
    pub untracked_files: Vec<String>,
    /// Every path with a change staged in the index
    #[serde(default)]
    pub staged_files: Vec<String>,
}

impl GitStatus {
    /// Clean status at `branch`/`commit`
    pub fn clean(branch: impl Into<String>, commit: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
            commit: commit.into(),
            ..Self::default()
        }
    }

    /// Build a status from porcelain output plus the already-resolved branch and commit
    pub fn from_porcelain(
        branch: impl Into<String>,
        commit: impl Into<String>,
        porcelain: &str,
    ) -> Self {
        let mut status = parse_porcelain(porcelain);
        status.branch = branch.into();
        status.commit = commit.into();
        status
    }

    /// Total number of changed paths
    pub fn change_count(&self) -> usize {
        self.dirty_files.len()
            + self.new_files.len()
            + self.deleted_files.len()
            + self.untracked_files.len()
    }
}

/// Parse `git status --porcelain=v1` output.
///
/// Format: `XY path` (or `XY old -> new` for renames), where X is the index
/// column and Y the worktree column.
pub fn parse_porcelain(output: &str) -> GitStatus {
    let mut status = GitStatus::default();

    for line in output.lines() {
        if line.len() < 4 {
            continue;
        }

        let mut chars = line.chars();
        let index_status = chars.next().unwrap_or(' ');
        let worktree_status = chars.next().unwrap_or(' ');
        let raw_path = &line[3..];
        // Renames report "old -> new"; the new path is what exists now
        let path = raw_path
            .rsplit_once(" -> ")
            .map(|(_, new)| new)
            .unwrap_or(raw_path)
            .trim_matches('"')
            .to_string();

        if index_status == '?' && worktree_status == '?' {
            status.untracked_files.push(path);
            continue;
        }
        if index_status == '!' {
            // ignored files only show up with --ignored
            continue;
        }

        if index_status != ' ' {
            status.staged_files.push(path.clone());
        }

        if index_status == 'A' {
            status.new_files.push(path);
        } else if index_status == 'D' || worktree_status == 'D' {
            status.deleted_files.push(path);
        } else {
            status.dirty_files.push(path);
        }
    }

    status.is_dirty = status.change_count() > 0;
    status
}

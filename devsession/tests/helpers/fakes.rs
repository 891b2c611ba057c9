//! In-memory collaborators for driving the reconciler without git or a user

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use devsession_lib::error::{GitError, TerminalError};
use devsession_lib::git::{
    CommandOutput, GitCollaborator, GitIdentity, GitStatus, StashOutcome, TerminalCollaborator,
};
use devsession_lib::reconcile::{
    DirtyResolution, SessionDetails, SessionPrompter, SessionReconciler, SessionResumer,
};
use devsession_lib::records::{Session, SessionStore};

/// Mutable state behind [`FakeGit`]
#[derive(Debug, Clone)]
pub struct FakeGitState {
    pub repository: bool,
    pub status: GitStatus,
    pub configured: bool,
    pub identity: Option<GitIdentity>,
    pub fail_commit: bool,
    pub fail_checkout: bool,
    pub fail_stash_apply: bool,
    pub branches: Vec<String>,
    pub stashes: Vec<String>,
    pub commits: Vec<String>,
    pub applied: Vec<String>,
}

/// Git collaborator backed by a scripted status; records every call and
/// the directory it was made in
#[derive(Debug)]
pub struct FakeGit {
    pub state: Mutex<FakeGitState>,
    pub calls: Mutex<Vec<(String, PathBuf)>>,
}

impl FakeGit {
    /// Clean repository on `branch` at `commit`
    pub fn clean(branch: &str, commit: &str) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeGitState {
                repository: true,
                status: GitStatus::clean(branch, commit),
                configured: true,
                identity: None,
                fail_commit: false,
                fail_checkout: false,
                fail_stash_apply: false,
                branches: vec![branch.to_string()],
                stashes: Vec::new(),
                commits: Vec::new(),
                applied: Vec::new(),
            }),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn not_a_repository() -> Arc<Self> {
        let git = Self::clean("", "");
        git.update(|s| s.repository = false);
        git
    }

    pub fn update(&self, f: impl FnOnce(&mut FakeGitState)) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn snapshot(&self) -> FakeGitState {
        self.state.lock().unwrap().clone()
    }

    /// Mark tracked files as modified
    pub fn modify(&self, files: &[&str]) {
        self.update(|s| {
            s.status.dirty_files = files.iter().map(|f| f.to_string()).collect();
            s.status.is_dirty = true;
        });
    }

    /// Add untracked files
    pub fn add_untracked(&self, files: &[&str]) {
        self.update(|s| {
            s.status.untracked_files = files.iter().map(|f| f.to_string()).collect();
            s.status.is_dirty = true;
        });
    }

    pub fn calls(&self) -> Vec<(String, PathBuf)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_names(&self) -> Vec<String> {
        self.calls().into_iter().map(|(name, _)| name).collect()
    }

    fn record(&self, name: &str, dir: &Path) {
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), dir.to_path_buf()));
    }
}

fn clear_changes(status: &mut GitStatus) {
    status.is_dirty = false;
    status.dirty_files.clear();
    status.new_files.clear();
    status.deleted_files.clear();
    status.untracked_files.clear();
    status.staged_files.clear();
}

#[async_trait]
impl GitCollaborator for FakeGit {
    async fn is_repository(&self, dir: &Path) -> bool {
        self.record("is_repository", dir);
        self.state.lock().unwrap().repository
    }

    async fn get_status(&self, dir: &Path) -> Result<GitStatus, GitError> {
        self.record("get_status", dir);
        Ok(self.state.lock().unwrap().status.clone())
    }

    async fn current_branch(&self, dir: &Path) -> Result<String, GitError> {
        self.record("current_branch", dir);
        Ok(self.state.lock().unwrap().status.branch.clone())
    }

    async fn current_commit(&self, dir: &Path) -> Result<String, GitError> {
        self.record("current_commit", dir);
        Ok(self.state.lock().unwrap().status.commit.clone())
    }

    async fn commit(&self, dir: &Path, message: &str) -> Result<(), GitError> {
        self.record("commit", dir);
        let mut state = self.state.lock().unwrap();
        if state.fail_commit {
            return Err(GitError::CommandFailed {
                subcommand: "commit".to_string(),
                status: "exit status: 1".to_string(),
                stderr: "pre-commit hook failed".to_string(),
            });
        }
        state.commits.push(message.to_string());
        state.status.commit = format!("commit{}", state.commits.len());
        clear_changes(&mut state.status);
        Ok(())
    }

    async fn create_stash(&self, dir: &Path, label: &str) -> Result<StashOutcome, GitError> {
        self.record("create_stash", dir);
        let mut state = self.state.lock().unwrap();
        if !state.status.is_dirty {
            return Ok(StashOutcome {
                success: false,
                stash_id: None,
                message: "No local changes to save".to_string(),
            });
        }
        let id = format!("stash{}", state.stashes.len() + 1);
        state.stashes.push(id.clone());
        clear_changes(&mut state.status);
        Ok(StashOutcome {
            success: true,
            stash_id: Some(id),
            message: format!("Saved working directory and index state {}", label),
        })
    }

    async fn apply_stash(&self, dir: &Path, stash_id: &str) -> Result<StashOutcome, GitError> {
        self.record("apply_stash", dir);
        let mut state = self.state.lock().unwrap();
        if state.fail_stash_apply || !state.stashes.iter().any(|s| s == stash_id) {
            return Ok(StashOutcome {
                success: false,
                stash_id: Some(stash_id.to_string()),
                message: "conflict in a.txt".to_string(),
            });
        }
        state.applied.push(stash_id.to_string());
        Ok(StashOutcome {
            success: true,
            stash_id: Some(stash_id.to_string()),
            message: String::new(),
        })
    }

    async fn checkout_branch(&self, dir: &Path, branch: &str) -> Result<(), GitError> {
        self.record("checkout_branch", dir);
        let mut state = self.state.lock().unwrap();
        if state.fail_checkout || !state.branches.iter().any(|b| b == branch) {
            return Err(GitError::CommandFailed {
                subcommand: format!("checkout {}", branch),
                status: "exit status: 1".to_string(),
                stderr: format!("error: pathspec '{}' did not match", branch),
            });
        }
        state.status.branch = branch.to_string();
        Ok(())
    }

    async fn is_configured(&self, dir: &Path) -> bool {
        self.record("is_configured", dir);
        self.state.lock().unwrap().configured
    }

    async fn configure_identity(
        &self,
        dir: &Path,
        identity: &GitIdentity,
    ) -> Result<(), GitError> {
        self.record("configure_identity", dir);
        let mut state = self.state.lock().unwrap();
        state.configured = true;
        state.identity = Some(identity.clone());
        Ok(())
    }
}

/// Terminal collaborator that records commands and exits 0 unless told otherwise
#[derive(Debug, Default)]
pub struct FakeTerminal {
    pub commands: Mutex<Vec<(String, PathBuf)>>,
    pub exit_code: Mutex<i32>,
}

impl FakeTerminal {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .map(|(c, _)| c.clone())
            .collect()
    }
}

#[async_trait]
impl TerminalCollaborator for FakeTerminal {
    async fn execute(&self, dir: &Path, command: &str) -> Result<CommandOutput, TerminalError> {
        self.commands
            .lock()
            .unwrap()
            .push((command.to_string(), dir.to_path_buf()));
        let exit_code = *self.exit_code.lock().unwrap();
        Ok(CommandOutput {
            exit_code,
            stdout: String::new(),
            stderr: if exit_code == 0 {
                String::new()
            } else {
                "fatal: failed".to_string()
            },
        })
    }
}

/// Prompter with canned answers; records which dirty options were offered
#[derive(Debug)]
pub struct ScriptedPrompter {
    pub proceed_without_git: bool,
    pub resolution: DirtyResolution,
    pub commit_message: Option<String>,
    pub identity: Option<GitIdentity>,
    pub stash_fallback: bool,
    /// `None` declines the details prompt; `Some("")` accepts the default name
    pub session_name: Option<String>,
    pub selection: Option<String>,
    pub offered: Mutex<Vec<Vec<DirtyResolution>>>,
    pub details_asked: Mutex<Vec<SessionDetails>>,
}

impl Default for ScriptedPrompter {
    fn default() -> Self {
        Self {
            proceed_without_git: false,
            resolution: DirtyResolution::Cancel,
            commit_message: Some("wip".to_string()),
            identity: None,
            stash_fallback: false,
            session_name: Some("work in progress".to_string()),
            selection: None,
            offered: Mutex::new(Vec::new()),
            details_asked: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedPrompter {
    pub fn choosing(resolution: DirtyResolution) -> Self {
        Self {
            resolution,
            ..Default::default()
        }
    }

    pub fn offered(&self) -> Vec<Vec<DirtyResolution>> {
        self.offered.lock().unwrap().clone()
    }
}

impl SessionPrompter for ScriptedPrompter {
    fn confirm_without_git(&self, _dir: &Path) -> bool {
        self.proceed_without_git
    }

    fn choose_dirty_resolution(
        &self,
        _status: &GitStatus,
        options: &[DirtyResolution],
    ) -> DirtyResolution {
        self.offered.lock().unwrap().push(options.to_vec());
        self.resolution
    }

    fn commit_message(&self) -> Option<String> {
        self.commit_message.clone()
    }

    fn git_identity(&self) -> Option<GitIdentity> {
        self.identity.clone()
    }

    fn confirm_stash_fallback(&self, _error: &GitError) -> bool {
        self.stash_fallback
    }

    fn session_details(&self, defaults: &SessionDetails) -> Option<SessionDetails> {
        self.details_asked.lock().unwrap().push(defaults.clone());
        let name = self.session_name.clone()?;
        Some(SessionDetails {
            name: if name.is_empty() {
                defaults.name.clone()
            } else {
                name
            },
            notes: defaults.notes.clone(),
            tags: defaults.tags.clone(),
        })
    }

    fn select_session(&self, _sessions: &[Session]) -> Option<String> {
        self.selection.clone()
    }
}

/// Resume use case that only records what it was asked to do
#[derive(Debug, Default)]
pub struct RecordingResumer {
    pub resumed: Mutex<Vec<(String, PathBuf)>>,
}

impl RecordingResumer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn resumed(&self) -> Vec<(String, PathBuf)> {
        self.resumed.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionResumer for RecordingResumer {
    async fn resume(&self, session: &Session, original_dir: &Path) -> anyhow::Result<()> {
        self.resumed
            .lock()
            .unwrap()
            .push((session.id.clone(), original_dir.to_path_buf()));
        Ok(())
    }
}

/// Everything a reconciler test needs, wired together
pub struct Harness {
    pub reconciler: SessionReconciler,
    pub sessions: SessionStore,
    pub git: Arc<FakeGit>,
    pub terminal: Arc<FakeTerminal>,
    pub prompter: Arc<ScriptedPrompter>,
    pub resumer: Arc<RecordingResumer>,
}

impl Harness {
    pub fn new(data_dir: &Path, git: Arc<FakeGit>, prompter: ScriptedPrompter) -> Self {
        let sessions = SessionStore::at(data_dir.join("sessions"), None);
        let terminal = FakeTerminal::new();
        let prompter = Arc::new(prompter);
        let resumer = RecordingResumer::new();
        let reconciler = SessionReconciler::new(
            sessions.clone(),
            git.clone(),
            terminal.clone(),
            prompter.clone(),
            resumer.clone(),
        );
        Self {
            reconciler,
            sessions,
            git,
            terminal,
            prompter,
            resumer,
        }
    }
}

//! Integration tests for the save and resume flows
//!
//! Git, the terminal, the user and the resume use case are all fakes from
//! `helpers::fakes`; the session store is real and lives in a temp dir.

mod helpers;

use std::env;
use std::path::Path;

use devsession_lib::error::{GitError, ReconcileError, StoreError, TerminalError};
use devsession_lib::git::{GitIdentity, GitStateSnapshot};
use devsession_lib::reconcile::{
    CancelReason, DirtyResolution, ResumeOutcome, RestoreReport, SaveOutcome, SaveRequest,
    DISCARD_COMMANDS,
};
use devsession_lib::records::Session;
use devsession_lib::store::RecordFilter;
use helpers::fakes::{FakeGit, Harness, ScriptedPrompter};
use tempfile::TempDir;

fn saved(outcome: SaveOutcome) -> Session {
    match outcome {
        SaveOutcome::Saved(session) => session,
        SaveOutcome::Cancelled(reason) => panic!("save was cancelled: {}", reason),
    }
}

fn root_of(dir: &Path) -> String {
    dir.to_string_lossy().into_owned()
}

// ---------------------------------------------------------------------------
// Save
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_save_clean_repo() {
    let data = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let h = Harness::new(
        data.path(),
        FakeGit::clean("main", "abc123"),
        ScriptedPrompter::default(),
    );

    let session = saved(h.reconciler.save(project.path(), SaveRequest::default()).await.unwrap());

    assert_eq!(
        session.git,
        GitStateSnapshot {
            branch: "main".to_string(),
            commit: "abc123".to_string(),
            is_dirty: false,
            stash_id: None,
        }
    );
    assert_eq!(session.project_root, root_of(project.path()));
    assert_eq!(session.name, "work in progress");
    assert!(h.prompter.offered().is_empty());

    let json = serde_json::to_value(&session).unwrap();
    assert_eq!(
        json["git"],
        serde_json::json!({"branch": "main", "commit": "abc123", "isDirty": false, "stashId": null})
    );

    assert_eq!(h.sessions.get(&session.id).unwrap(), session);
}

#[tokio::test]
async fn test_save_dirty_stash_records_stash_id() {
    let data = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let git = FakeGit::clean("main", "abc123");
    git.modify(&["a.txt"]);
    let h = Harness::new(data.path(), git, ScriptedPrompter::choosing(DirtyResolution::Stash));

    let session = saved(h.reconciler.save(project.path(), SaveRequest::default()).await.unwrap());

    assert_eq!(
        h.prompter.offered(),
        vec![vec![
            DirtyResolution::Commit,
            DirtyResolution::Stash,
            DirtyResolution::Discard,
            DirtyResolution::Cancel
        ]]
    );
    assert_eq!(session.git.stash_id.as_deref(), Some("stash1"));
    assert!(!session.git.is_dirty);
    assert_eq!(session.git.branch, "main");
    assert_eq!(h.git.snapshot().stashes, vec!["stash1"]);
}

#[tokio::test]
async fn test_save_does_not_offer_stash_with_untracked_files() {
    let data = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let git = FakeGit::clean("main", "abc123");
    git.modify(&["a.txt"]);
    git.add_untracked(&["notes.txt"]);
    let h = Harness::new(data.path(), git, ScriptedPrompter::choosing(DirtyResolution::Stash));

    let outcome = h.reconciler.save(project.path(), SaveRequest::default()).await.unwrap();

    assert_eq!(outcome, SaveOutcome::Cancelled(CancelReason::DirtyResolution));
    assert!(!h.prompter.offered()[0].contains(&DirtyResolution::Stash));
    assert!(h.git.snapshot().stashes.is_empty());
    assert!(h.sessions.list(&RecordFilter::all()).unwrap().is_empty());
}

#[tokio::test]
async fn test_save_cancel_has_no_side_effects() {
    let data = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let git = FakeGit::clean("main", "abc123");
    git.modify(&["a.txt"]);
    let h = Harness::new(data.path(), git, ScriptedPrompter::choosing(DirtyResolution::Cancel));

    let outcome = h.reconciler.save(project.path(), SaveRequest::default()).await.unwrap();

    assert_eq!(outcome, SaveOutcome::Cancelled(CancelReason::DirtyResolution));
    let state = h.git.snapshot();
    assert!(state.commits.is_empty());
    assert!(state.stashes.is_empty());
    assert!(state.status.is_dirty);
    assert!(h.terminal.commands().is_empty());
    assert!(!h.sessions.index_path().exists());
}

#[tokio::test]
async fn test_save_outside_git() {
    let data = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();

    // Declined
    let h = Harness::new(data.path(), FakeGit::not_a_repository(), ScriptedPrompter::default());
    let outcome = h.reconciler.save(project.path(), SaveRequest::default()).await.unwrap();
    assert_eq!(outcome, SaveOutcome::Cancelled(CancelReason::NoGitDeclined));
    assert!(h.sessions.list(&RecordFilter::all()).unwrap().is_empty());

    // Accepted: sentinel snapshot
    let prompter = ScriptedPrompter {
        proceed_without_git: true,
        ..Default::default()
    };
    let h = Harness::new(data.path(), FakeGit::not_a_repository(), prompter);
    let session = saved(h.reconciler.save(project.path(), SaveRequest::default()).await.unwrap());

    assert_eq!(session.git, GitStateSnapshot::no_git());
    assert_eq!(h.git.call_names(), vec!["is_repository"]);
}

#[tokio::test]
async fn test_save_commit_path() {
    let data = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let git = FakeGit::clean("main", "abc123");
    git.modify(&["a.txt"]);
    git.add_untracked(&["b.txt"]);
    let h = Harness::new(data.path(), git, ScriptedPrompter::choosing(DirtyResolution::Commit));

    let session = saved(h.reconciler.save(project.path(), SaveRequest::default()).await.unwrap());

    assert_eq!(h.git.snapshot().commits, vec!["wip"]);
    assert_eq!(session.git.commit, "commit1");
    assert!(session.git.stash_id.is_none());
    assert!(!session.git.is_dirty);
}

#[tokio::test]
async fn test_save_commit_configures_identity_first() {
    let data = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let git = FakeGit::clean("main", "abc123");
    git.modify(&["a.txt"]);
    git.update(|s| s.configured = false);
    let identity = GitIdentity {
        name: "Dev".to_string(),
        email: "dev@example.com".to_string(),
    };
    let prompter = ScriptedPrompter {
        resolution: DirtyResolution::Commit,
        identity: Some(identity.clone()),
        ..Default::default()
    };
    let h = Harness::new(data.path(), git, prompter);

    saved(h.reconciler.save(project.path(), SaveRequest::default()).await.unwrap());

    let state = h.git.snapshot();
    assert_eq!(state.identity, Some(identity));
    let calls = h.git.call_names();
    let configure = calls.iter().position(|c| c == "configure_identity").unwrap();
    let commit = calls.iter().position(|c| c == "commit").unwrap();
    assert!(configure < commit);
}

#[tokio::test]
async fn test_save_commit_without_identity_is_cancelled() {
    let data = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let git = FakeGit::clean("main", "abc123");
    git.modify(&["a.txt"]);
    git.update(|s| s.configured = false);
    let h = Harness::new(data.path(), git, ScriptedPrompter::choosing(DirtyResolution::Commit));

    let outcome = h.reconciler.save(project.path(), SaveRequest::default()).await.unwrap();

    assert_eq!(outcome, SaveOutcome::Cancelled(CancelReason::GitIdentity));
    assert!(h.git.snapshot().commits.is_empty());
}

#[tokio::test]
async fn test_save_declined_commit_message_leaves_identity_alone() {
    let data = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let git = FakeGit::clean("main", "abc123");
    git.modify(&["a.txt"]);
    git.update(|s| s.configured = false);
    let prompter = ScriptedPrompter {
        resolution: DirtyResolution::Commit,
        commit_message: None,
        identity: Some(GitIdentity {
            name: "Dev".to_string(),
            email: "dev@example.com".to_string(),
        }),
        ..Default::default()
    };
    let h = Harness::new(data.path(), git, prompter);

    let outcome = h.reconciler.save(project.path(), SaveRequest::default()).await.unwrap();

    assert_eq!(outcome, SaveOutcome::Cancelled(CancelReason::CommitMessage));
    let state = h.git.snapshot();
    assert!(!state.configured);
    assert_eq!(state.identity, None);
    assert!(!h.git.call_names().contains(&"configure_identity".to_string()));
}

#[tokio::test]
async fn test_save_failed_commit_falls_back_to_stash() {
    let data = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let git = FakeGit::clean("main", "abc123");
    git.modify(&["a.txt"]);
    git.update(|s| s.fail_commit = true);
    let prompter = ScriptedPrompter {
        resolution: DirtyResolution::Commit,
        stash_fallback: true,
        ..Default::default()
    };
    let h = Harness::new(data.path(), git, prompter);

    let session = saved(h.reconciler.save(project.path(), SaveRequest::default()).await.unwrap());

    assert_eq!(session.git.stash_id.as_deref(), Some("stash1"));
    assert_eq!(session.git.commit, "abc123");
}

#[tokio::test]
async fn test_save_failed_commit_without_fallback_is_an_error() {
    let data = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let git = FakeGit::clean("main", "abc123");
    git.modify(&["a.txt"]);
    git.update(|s| s.fail_commit = true);
    let h = Harness::new(data.path(), git, ScriptedPrompter::choosing(DirtyResolution::Commit));

    let err = h.reconciler.save(project.path(), SaveRequest::default()).await.unwrap_err();

    assert!(matches!(err, ReconcileError::Git(GitError::CommandFailed { .. })));
    assert!(h.sessions.list(&RecordFilter::all()).unwrap().is_empty());
}

#[tokio::test]
async fn test_save_discard_runs_reset_and_clean() {
    let data = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let git = FakeGit::clean("main", "abc123");
    git.modify(&["a.txt"]);
    let h = Harness::new(data.path(), git, ScriptedPrompter::choosing(DirtyResolution::Discard));

    let session = saved(h.reconciler.save(project.path(), SaveRequest::default()).await.unwrap());

    assert_eq!(h.terminal.commands(), DISCARD_COMMANDS.to_vec());
    assert!(h
        .terminal
        .commands
        .lock()
        .unwrap()
        .iter()
        .all(|(_, dir)| dir == project.path()));
    assert!(session.git.stash_id.is_none());
}

#[tokio::test]
async fn test_save_discard_failure_is_reported() {
    let data = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let git = FakeGit::clean("main", "abc123");
    git.modify(&["a.txt"]);
    let h = Harness::new(data.path(), git, ScriptedPrompter::choosing(DirtyResolution::Discard));
    *h.terminal.exit_code.lock().unwrap() = 128;

    let err = h.reconciler.save(project.path(), SaveRequest::default()).await.unwrap_err();

    assert!(matches!(
        err,
        ReconcileError::Terminal(TerminalError::NonZeroExit { exit_code: 128, .. })
    ));
    assert_eq!(h.terminal.commands(), vec!["git reset --hard"]);
}

#[tokio::test]
async fn test_save_request_skips_details_prompt() {
    let data = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let h = Harness::new(
        data.path(),
        FakeGit::clean("main", "abc123"),
        ScriptedPrompter::default(),
    );

    let mut request = SaveRequest::named("release prep");
    request.tags = vec!["release".to_string()];
    request.files = vec!["src/lib.rs".to_string()];
    let session = saved(h.reconciler.save(project.path(), request).await.unwrap());

    assert_eq!(session.name, "release prep");
    assert_eq!(session.tags, vec!["release"]);
    assert_eq!(session.files, vec!["src/lib.rs"]);
    assert!(h.prompter.details_asked.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_save_declined_details() {
    let data = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let prompter = ScriptedPrompter {
        session_name: None,
        ..Default::default()
    };
    let h = Harness::new(data.path(), FakeGit::clean("main", "abc123"), prompter);

    let outcome = h.reconciler.save(project.path(), SaveRequest::default()).await.unwrap();

    assert_eq!(outcome, SaveOutcome::Cancelled(CancelReason::Details));
    let asked = h.prompter.details_asked.lock().unwrap().clone();
    assert!(asked[0].name.ends_with("@ main"));
}

// ---------------------------------------------------------------------------
// Resume
// ---------------------------------------------------------------------------

/// Save a clean session for `project` on `main`, then move the fake repo to `feature`
async fn saved_on_main_now_on_feature(h: &Harness, project: &Path) -> Session {
    h.git.update(|s| s.branches = vec!["main".to_string(), "feature".to_string()]);
    let session = saved(h.reconciler.save(project, SaveRequest::default()).await.unwrap());
    h.git.update(|s| s.status.branch = "feature".to_string());
    h.git.calls.lock().unwrap().clear();
    session
}

#[tokio::test]
async fn test_resume_cross_project_uses_project_root() {
    let data = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let elsewhere = TempDir::new().unwrap();
    let h = Harness::new(
        data.path(),
        FakeGit::clean("main", "abc123"),
        ScriptedPrompter::default(),
    );
    let session = saved_on_main_now_on_feature(&h, project.path()).await;
    let cwd_before = env::current_dir().unwrap();

    let outcome = h
        .reconciler
        .resume(elsewhere.path(), Some(&session.id))
        .await
        .unwrap();

    let ResumeOutcome::Resumed(report) = outcome else {
        panic!("resume was cancelled");
    };
    assert!(report.dirs.is_cross_project());
    assert_eq!(report.dirs.git, project.path());
    assert!(report.divergence.branch);
    assert_eq!(
        report.restore,
        RestoreReport {
            branch_switched: true,
            stash_applied: false
        }
    );
    assert_eq!(h.git.snapshot().status.branch, "main");

    // Every git call ran in the project; the use case got the caller's dir
    assert!(!h.git.calls().is_empty());
    assert!(h.git.calls().iter().all(|(_, dir)| dir == project.path()));
    assert_eq!(
        h.resumer.resumed(),
        vec![(session.id.clone(), elsewhere.path().to_path_buf())]
    );
    assert_eq!(env::current_dir().unwrap(), cwd_before);
}

#[tokio::test]
async fn test_resume_restore_failure_leaves_cwd_and_skips_use_case() {
    let data = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let elsewhere = TempDir::new().unwrap();
    let h = Harness::new(
        data.path(),
        FakeGit::clean("main", "abc123"),
        ScriptedPrompter::default(),
    );
    let session = saved_on_main_now_on_feature(&h, project.path()).await;
    h.git.update(|s| s.fail_checkout = true);
    let cwd_before = env::current_dir().unwrap();

    let err = h
        .reconciler
        .resume(elsewhere.path(), Some(&session.id))
        .await
        .unwrap_err();

    match err {
        ReconcileError::Restore { report, source } => {
            assert_eq!(report, RestoreReport::default());
            assert!(matches!(source, GitError::CommandFailed { .. }));
        }
        other => panic!("expected Restore error, got {:?}", other),
    }
    assert!(h.resumer.resumed().is_empty());
    assert_eq!(env::current_dir().unwrap(), cwd_before);
    assert!(h.git.calls().iter().all(|(_, dir)| dir == project.path()));
}

#[tokio::test]
async fn test_resume_applies_exact_stash() {
    let data = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let git = FakeGit::clean("main", "abc123");
    git.modify(&["a.txt"]);
    let h = Harness::new(data.path(), git, ScriptedPrompter::choosing(DirtyResolution::Stash));
    let session = saved(h.reconciler.save(project.path(), SaveRequest::default()).await.unwrap());

    // A later stash must not be the one applied
    h.git.modify(&["c.txt"]);
    saved(h.reconciler.save(project.path(), SaveRequest::default()).await.unwrap());

    let outcome = h.reconciler.resume(project.path(), Some(&session.id)).await.unwrap();

    let ResumeOutcome::Resumed(report) = outcome else {
        panic!("resume was cancelled");
    };
    assert!(!report.dirs.is_cross_project());
    assert_eq!(
        report.restore,
        RestoreReport {
            branch_switched: false,
            stash_applied: true
        }
    );
    assert_eq!(h.git.snapshot().applied, vec!["stash1"]);
}

#[tokio::test]
async fn test_resume_stash_failure_keeps_branch_switch() {
    let data = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let git = FakeGit::clean("main", "abc123");
    git.update(|s| s.branches = vec!["main".to_string(), "feature".to_string()]);
    git.modify(&["a.txt"]);
    let h = Harness::new(data.path(), git, ScriptedPrompter::choosing(DirtyResolution::Stash));
    let session = saved(h.reconciler.save(project.path(), SaveRequest::default()).await.unwrap());
    h.git.update(|s| {
        s.status.branch = "feature".to_string();
        s.fail_stash_apply = true;
    });

    let err = h
        .reconciler
        .resume(project.path(), Some(&session.id))
        .await
        .unwrap_err();

    match err {
        ReconcileError::Restore { report, .. } => assert_eq!(
            report,
            RestoreReport {
                branch_switched: true,
                stash_applied: false
            }
        ),
        other => panic!("expected Restore error, got {:?}", other),
    }
    // The checkout is not rolled back
    assert_eq!(h.git.snapshot().status.branch, "main");
    assert!(h.resumer.resumed().is_empty());
}

#[tokio::test]
async fn test_resume_dirty_save_as_new_keeps_work() {
    let data = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let h = Harness::new(
        data.path(),
        FakeGit::clean("main", "abc123"),
        ScriptedPrompter::choosing(DirtyResolution::SaveAsNew),
    );
    let target = saved(h.reconciler.save(project.path(), SaveRequest::default()).await.unwrap());
    h.git.modify(&["a.txt"]);

    let outcome = h.reconciler.resume(project.path(), Some(&target.id)).await.unwrap();

    let ResumeOutcome::Resumed(report) = outcome else {
        panic!("resume was cancelled");
    };
    assert_eq!(
        h.prompter.offered(),
        vec![vec![
            DirtyResolution::Commit,
            DirtyResolution::SaveAsNew,
            DirtyResolution::Discard,
            DirtyResolution::Cancel
        ]]
    );

    let new_session = report.saved_as_new.clone().unwrap();
    assert_ne!(new_session.id, target.id);
    assert_eq!(new_session.git.stash_id.as_deref(), Some("stash1"));
    assert!(!new_session.git.is_dirty);
    assert_eq!(report.session.id, target.id);
    assert_eq!(h.sessions.list(&RecordFilter::all()).unwrap().len(), 2);
    assert_eq!(h.resumer.resumed()[0].0, target.id);
}

#[tokio::test]
async fn test_resume_save_as_new_with_untracked_files_saves_without_stash() {
    let data = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let h = Harness::new(
        data.path(),
        FakeGit::clean("main", "abc123"),
        ScriptedPrompter::choosing(DirtyResolution::SaveAsNew),
    );
    let target = saved(h.reconciler.save(project.path(), SaveRequest::default()).await.unwrap());
    h.git.add_untracked(&["scratch.txt"]);

    let outcome = h.reconciler.resume(project.path(), Some(&target.id)).await.unwrap();

    let ResumeOutcome::Resumed(report) = outcome else {
        panic!("resume was cancelled");
    };
    let new_session = report.saved_as_new.clone().unwrap();
    assert!(new_session.git.stash_id.is_none());
    assert!(!new_session.git.is_dirty);
    assert!(h.git.snapshot().stashes.is_empty());
}

#[tokio::test]
async fn test_resume_dirty_cancel() {
    let data = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let h = Harness::new(
        data.path(),
        FakeGit::clean("main", "abc123"),
        ScriptedPrompter::choosing(DirtyResolution::Cancel),
    );
    let target = saved(h.reconciler.save(project.path(), SaveRequest::default()).await.unwrap());
    h.git.modify(&["a.txt"]);

    let outcome = h.reconciler.resume(project.path(), Some(&target.id)).await.unwrap();

    assert_eq!(outcome, ResumeOutcome::Cancelled(CancelReason::DirtyResolution));
    assert!(h.resumer.resumed().is_empty());
    assert!(h.git.snapshot().status.is_dirty);
}

#[tokio::test]
async fn test_resume_selects_session_when_no_id_given() {
    let data = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let h = Harness::new(
        data.path(),
        FakeGit::clean("main", "abc123"),
        ScriptedPrompter::default(),
    );

    // Nothing saved yet
    let outcome = h.reconciler.resume(project.path(), None).await.unwrap();
    assert_eq!(outcome, ResumeOutcome::Cancelled(CancelReason::NoSessionSelected));

    let session = saved(h.reconciler.save(project.path(), SaveRequest::default()).await.unwrap());

    // Prompter picks nothing
    let outcome = h.reconciler.resume(project.path(), None).await.unwrap();
    assert_eq!(outcome, ResumeOutcome::Cancelled(CancelReason::NoSessionSelected));

    let prompter = ScriptedPrompter {
        selection: Some(session.id.clone()),
        ..Default::default()
    };
    let h = Harness::new(data.path(), FakeGit::clean("main", "abc123"), prompter);
    let outcome = h.reconciler.resume(project.path(), None).await.unwrap();
    assert!(matches!(outcome, ResumeOutcome::Resumed(_)));
    assert_eq!(h.resumer.resumed()[0].0, session.id);
}

#[tokio::test]
async fn test_resume_no_git_session_skips_git() {
    let data = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let prompter = ScriptedPrompter {
        proceed_without_git: true,
        ..Default::default()
    };
    let h = Harness::new(data.path(), FakeGit::not_a_repository(), prompter);
    let session = saved(h.reconciler.save(project.path(), SaveRequest::default()).await.unwrap());
    h.git.calls.lock().unwrap().clear();

    let outcome = h.reconciler.resume(project.path(), Some(&session.id)).await.unwrap();

    assert!(matches!(outcome, ResumeOutcome::Resumed(_)));
    assert!(h.git.calls().is_empty());
    assert_eq!(h.resumer.resumed().len(), 1);
}

#[tokio::test]
async fn test_resume_errors() {
    let data = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let h = Harness::new(
        data.path(),
        FakeGit::clean("main", "abc123"),
        ScriptedPrompter::default(),
    );

    let err = h.reconciler.resume(project.path(), Some("missing")).await.unwrap_err();
    assert!(matches!(err, ReconcileError::Store(StoreError::NotFound { .. })));

    // Project root deleted after saving
    let gone = TempDir::new().unwrap();
    let session = saved(h.reconciler.save(gone.path(), SaveRequest::default()).await.unwrap());
    let gone_path = gone.path().to_path_buf();
    drop(gone);
    let err = h.reconciler.resume(project.path(), Some(&session.id)).await.unwrap_err();
    assert!(matches!(err, ReconcileError::ProjectRootMissing { dir } if dir == gone_path));

    // Project root no longer a repository
    let session = saved(h.reconciler.save(project.path(), SaveRequest::default()).await.unwrap());
    h.git.update(|s| s.repository = false);
    let err = h.reconciler.resume(project.path(), Some(&session.id)).await.unwrap_err();
    assert!(matches!(err, ReconcileError::NotARepository { .. }));
}

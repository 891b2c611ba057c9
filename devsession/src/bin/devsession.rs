// devsession: save and resume git-aware developer sessions
//
// Commands:
//   devsession save [--name <name>] [--notes <text>] [--tag <tag>]...
//   devsession resume [<session-id>]
//   devsession list [sessions|scripts|terminals] [--project <path>] [--json]
//   devsession delete <sessions|scripts|terminals> <id>...
//   devsession cleanup

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use devsession_lib::{
    config::Config,
    error::GitError,
    git::{CliGit, GitIdentity, GitStatus, ShellTerminal},
    logging,
    reconcile::{
        DirtyResolution, ResumeOutcome, SaveOutcome, SaveRequest, SessionDetails,
        SessionPrompter, SessionReconciler, SessionResumer,
    },
    records::{Script, Session, TerminalCollection},
    store::{Record, RecordFilter, RecordStore},
};
use std::{
    env,
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

fn print_help() {
    println!(
        r#"devsession - save and resume git-aware developer sessions

USAGE:
    devsession <COMMAND> [OPTIONS]

COMMANDS:
    save                   Save the current project as a session
    resume [id]            Resume a session (asks which one when no id is given)
    list [kind]            List sessions, scripts or terminals (default: sessions)
    delete <kind> <id>...  Delete records; nothing is deleted if any id is unknown
    cleanup                Remove stale temp files left by interrupted writes
    help                   Show this help message

OPTIONS:
    --name <name>      Session name (for save; skips the prompt)
    --notes <text>     Session notes (for save)
    --tag <tag>        Session tag, repeatable (for save)
    --project <path>   Only list records for this root path
    --json             Output in JSON format

ENVIRONMENT:
    DEVSESSION_DATA_DIR    Where records are stored (default: ~/.devsession)
    DEVSESSION_PASSPHRASE  Encrypt record files with this passphrase
    DEVSESSION_LOG         Log filter, e.g. "debug" or "devsession_lib=trace"
"#
    );
}

/// Line-based prompts on stdin/stdout
struct StdinPrompter;

impl StdinPrompter {
    fn ask(&self, question: &str) -> Option<String> {
        print!("{} ", question);
        io::stdout().flush().ok()?;
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }

    fn ask_non_empty(&self, question: &str) -> Option<String> {
        self.ask(question).filter(|answer| !answer.is_empty())
    }

    fn confirm(&self, question: &str) -> bool {
        matches!(
            self.ask(&format!("{} [y/N]", question)).as_deref(),
            Some("y" | "Y" | "yes")
        )
    }
}

impl SessionPrompter for StdinPrompter {
    fn confirm_without_git(&self, dir: &Path) -> bool {
        self.confirm(&format!(
            "{} is not a git repository. Save without git integration?",
            dir.display()
        ))
    }

    fn choose_dirty_resolution(
        &self,
        status: &GitStatus,
        options: &[DirtyResolution],
    ) -> DirtyResolution {
        println!(
            "Uncommitted changes on {} ({} files):",
            status.branch,
            status.change_count()
        );
        for (label, files) in [
            ("modified", &status.dirty_files),
            ("added", &status.new_files),
            ("deleted", &status.deleted_files),
            ("untracked", &status.untracked_files),
        ] {
            for file in files {
                println!("  {:<10} {}", label, file);
            }
        }
        for (i, option) in options.iter().enumerate() {
            println!("  {}) {}", i + 1, option);
        }

        self.ask("Choose:")
            .and_then(|answer| {
                answer
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| options.get(n.wrapping_sub(1)).copied())
                    .or_else(|| options.iter().copied().find(|o| o.as_str() == answer))
            })
            .unwrap_or(DirtyResolution::Cancel)
    }

    fn commit_message(&self) -> Option<String> {
        self.ask_non_empty("Commit message:")
    }

    fn git_identity(&self) -> Option<GitIdentity> {
        println!("git user.name/user.email are not configured for this repository.");
        let name = self.ask_non_empty("Name:")?;
        let email = self.ask_non_empty("Email:")?;
        Some(GitIdentity { name, email })
    }

    fn confirm_stash_fallback(&self, error: &GitError) -> bool {
        eprintln!("Commit failed: {}", error);
        self.confirm("Stash the changes instead?")
    }

    fn session_details(&self, defaults: &SessionDetails) -> Option<SessionDetails> {
        let name = match self.ask(&format!("Session name [{}]:", defaults.name))? {
            answer if answer.is_empty() => defaults.name.clone(),
            answer => answer,
        };
        let notes = match &defaults.notes {
            Some(notes) => Some(notes.clone()),
            None => self.ask_non_empty("Notes (optional):"),
        };
        Some(SessionDetails {
            name,
            notes,
            tags: defaults.tags.clone(),
        })
    }

    fn select_session(&self, sessions: &[Session]) -> Option<String> {
        for (i, session) in sessions.iter().enumerate() {
            println!(
                "  {}) {} ({}, {}) {}",
                i + 1,
                session.name,
                session.git.branch,
                session.updated_at.format("%Y-%m-%d %H:%M"),
                session.project_root
            );
        }
        let answer = self.ask_non_empty("Resume which session?")?;
        answer
            .parse::<usize>()
            .ok()
            .and_then(|n| sessions.get(n.wrapping_sub(1)))
            .map(|s| s.id.clone())
            .or(Some(answer))
    }
}

/// Prints what to reopen; opening editors and terminals is left to the user
struct PrintingResumer;

#[async_trait]
impl SessionResumer for PrintingResumer {
    async fn resume(&self, session: &Session, original_dir: &Path) -> Result<()> {
        let root = Path::new(&session.project_root);
        if root != original_dir {
            println!("Project root: {}", root.display());
        }
        if let Some(notes) = &session.notes {
            println!("Notes: {}", notes);
        }
        for file in &session.files {
            println!("  file      {}", file);
        }
        for id in &session.terminal_refs {
            println!("  terminals {}", id);
        }
        for id in &session.script_refs {
            println!("  script    {}", id);
        }
        Ok(())
    }
}

fn print_records<R: Record>(
    records: &[R],
    json_output: bool,
    line: impl Fn(&R) -> String,
) -> Result<()> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(records)?);
    } else if records.is_empty() {
        println!("No {}", R::KIND);
    } else {
        for record in records {
            println!("[{}] {}", record.id(), line(record));
        }
    }
    Ok(())
}

fn delete_records<R: Record>(config: &Config, ids: &[String]) -> Result<usize> {
    RecordStore::<R>::open(config)
        .delete(ids)
        .with_context(|| format!("Failed to delete {}", R::KIND))
}

fn cleanup_kind<R: Record>(config: &Config) -> Result<()> {
    let (deleted, scanned, hit_limit) = RecordStore::<R>::open(config)
        .cleanup_stale_temps()
        .with_context(|| format!("Failed to clean up {}", R::KIND))?;
    println!(
        "{}: removed {} stale temp files ({} entries scanned{})",
        R::KIND,
        deleted,
        scanned,
        if hit_limit { ", scan limit reached" } else { "" }
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_help();
        return Ok(());
    }

    let command = args[1].as_str();

    // Parse options; everything else is positional
    let mut positional: Vec<String> = Vec::new();
    let mut project_path: Option<String> = None;
    let mut json_output = false;
    let mut request = SaveRequest::default();

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--project" | "-p" => {
                i += 1;
                if i < args.len() {
                    project_path = Some(args[i].clone());
                }
            }
            "--json" => {
                json_output = true;
            }
            "--name" | "-n" => {
                i += 1;
                if i < args.len() {
                    request.name = Some(args[i].clone());
                }
            }
            "--notes" => {
                i += 1;
                if i < args.len() {
                    request.notes = Some(args[i].clone());
                }
            }
            "--tag" | "-t" => {
                i += 1;
                if i < args.len() {
                    request.tags.push(args[i].clone());
                }
            }
            other => positional.push(other.to_string()),
        }
        i += 1;
    }

    let config = Config::from_env();
    logging::init(&config);
    config
        .ensure_dirs()
        .with_context(|| format!("Failed to create {}", config.data_dir().display()))?;

    let cwd = env::current_dir().context("Failed to read current directory")?;

    match command {
        "save" => {
            let reconciler = reconciler(&config);
            match reconciler.save(&cwd, request).await? {
                SaveOutcome::Saved(session) => {
                    println!("Saved session [{}] {}", session.id, session.name);
                    if let Some(stash_id) = &session.git.stash_id {
                        println!("Changes stashed as {}", stash_id);
                    }
                }
                SaveOutcome::Cancelled(reason) => println!("Save cancelled: {}", reason),
            }
            Ok(())
        }

        "resume" => {
            let reconciler = reconciler(&config);
            match reconciler.resume(&cwd, positional.first().map(String::as_str)).await? {
                ResumeOutcome::Resumed(report) => {
                    if let Some(saved) = &report.saved_as_new {
                        println!("Saved current changes as [{}] {}", saved.id, saved.name);
                    }
                    println!(
                        "Resumed [{}] {} ({})",
                        report.session.id, report.session.name, report.restore
                    );
                }
                ResumeOutcome::Cancelled(reason) => println!("Resume cancelled: {}", reason),
            }
            Ok(())
        }

        "list" => {
            let mut filter = RecordFilter::all();
            if let Some(project) = &project_path {
                let root = PathBuf::from(project);
                let root = root.canonicalize().unwrap_or(root);
                filter = filter.root_path(root.to_string_lossy());
            }

            match positional.first().map(String::as_str).unwrap_or("sessions") {
                "sessions" => {
                    let records = RecordStore::<Session>::open(&config).list(&filter)?;
                    print_records(&records, json_output, |s| {
                        format!("{} ({}) {}", s.name, s.git.branch, s.project_root)
                    })
                }
                "scripts" => {
                    let records = RecordStore::<Script>::open(&config).list(&filter)?;
                    print_records(&records, json_output, |s| {
                        format!("{} ({} commands) {}", s.name, s.commands.len(), s.root_path)
                    })
                }
                "terminals" => {
                    let records = RecordStore::<TerminalCollection>::open(&config).list(&filter)?;
                    print_records(&records, json_output, |t| {
                        format!("{} ({} terminals) {}", t.name, t.terminals.len(), t.root_path)
                    })
                }
                other => Err(anyhow!("Unknown record kind: {}", other)),
            }
        }

        "delete" => {
            let Some((kind, ids)) = positional.split_first() else {
                eprintln!("Usage: devsession delete <sessions|scripts|terminals> <id>...");
                std::process::exit(1);
            };
            if ids.is_empty() {
                eprintln!("Usage: devsession delete {} <id>...", kind);
                std::process::exit(1);
            }

            let deleted = match kind.as_str() {
                "sessions" => delete_records::<Session>(&config, ids)?,
                "scripts" => delete_records::<Script>(&config, ids)?,
                "terminals" => delete_records::<TerminalCollection>(&config, ids)?,
                other => return Err(anyhow!("Unknown record kind: {}", other)),
            };
            println!("Deleted {} {}", deleted, kind);
            Ok(())
        }

        "cleanup" => {
            cleanup_kind::<Session>(&config)?;
            cleanup_kind::<Script>(&config)?;
            cleanup_kind::<TerminalCollection>(&config)?;
            Ok(())
        }

        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }

        _ => {
            eprintln!("Unknown command: {}", command);
            print_help();
            std::process::exit(1);
        }
    }
}

fn reconciler(config: &Config) -> SessionReconciler {
    SessionReconciler::new(
        RecordStore::<Session>::open(config),
        Arc::new(CliGit::new()),
        Arc::new(ShellTerminal),
        Arc::new(StdinPrompter),
        Arc::new(PrintingResumer),
    )
}

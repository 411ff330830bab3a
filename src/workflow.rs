//! The safe history rewrite workflow.
//!
//! One pipeline drives both destructive operations (email replacement and
//! file scrubbing): validate the repository, create a recovery snapshot, show
//! the user exactly what is about to happen, run the rewrite, then compact
//! the repository. Each stage completes before the next begins; any failure
//! aborts the rest of the pipeline and leaves the snapshot in place for
//! recovery. A run is never resumed; after manual recovery it starts over.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use console::style;

use crate::banner;
use crate::error::Error;
use crate::git;
use crate::prompt::{self, ConfirmPrompter};

/// A validated repository root. Resolved once at invocation start and
/// read-only for the remainder of the run.
#[derive(Debug)]
pub struct RepositoryTarget {
    root: PathBuf,
}

impl RepositoryTarget {
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// The transformation to apply. Exactly one variant per invocation.
#[derive(Debug)]
pub enum RewriteRequest {
    /// Replace every author/committer email that exactly equals `old_email`.
    ReplaceEmail {
        old_email: String,
        new_email: String,
        /// When set, also replace the display name, but only on commits
        /// whose existing name equals the local part of `old_email`. A
        /// deliberately narrow heuristic; do not widen it.
        new_name: Option<String>,
        engine: EmailEngine,
    },
    /// Exclude a repository-relative path from every historical revision,
    /// across all branches and tags.
    RemovePath { path: String },
}

/// Which mechanism performs an email rewrite.
///
/// The two produce different commit hashes and must never be mixed within
/// one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailEngine {
    /// External `git-filter-repo`: rewrites only affected commits. Default.
    FilterRepo,
    /// Built-in `git filter-branch --env-filter`: needs nothing beyond git,
    /// but rewrites every commit and is markedly slower on large histories.
    FilterBranch,
}

/// How the recovery point is materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    /// A branch ref at the pre-rewrite tip. Does not touch the working tree.
    Branch,
    /// A full copy of the repository directory at the sibling path
    /// `<repo>_backup`. Needs free disk at least the repository's size.
    DirectoryCopy,
}

/// A recovery point created before the destructive step. Left in place
/// indefinitely; this tool never deletes it.
#[derive(Debug)]
pub struct SafetySnapshot {
    pub kind: SnapshotKind,
    /// Branch name, or the backup directory path.
    pub location: String,
}

impl fmt::Display for SafetySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SnapshotKind::Branch => write!(f, "branch '{}'", self.location),
            SnapshotKind::DirectoryCopy => write!(f, "directory '{}'", self.location),
        }
    }
}

/// What a completed run reports back to the user.
#[derive(Debug)]
pub struct CleanupReport {
    pub snapshot: SafetySnapshot,
    /// Commits the rewrite rule matched, counted before the rewrite ran.
    pub commits_matched: usize,
    pub remotes: Vec<String>,
    /// Set when garbage collection failed; the rewrite itself succeeded.
    pub gc_warning: Option<String>,
}

/// A full invocation of the workflow.
#[derive(Debug)]
pub struct RewriteJob {
    pub repo: PathBuf,
    pub request: RewriteRequest,
    pub snapshot: SnapshotKind,
}

/// Runs the whole pipeline:
/// validate → snapshot → confirm → rewrite → finalize.
pub fn run<P: ConfirmPrompter>(job: &RewriteJob, prompter: &mut P) -> Result<CleanupReport, Error> {
    let target = validate(&job.repo, &job.request)?;

    // Scrubbing a path that is absent from the working tree is legitimate
    // (it may exist only in earlier revisions) but needs an explicit
    // acknowledgement before anything else runs.
    if let RewriteRequest::RemovePath { path } = &job.request {
        if !target.root().join(path).is_file() {
            println!(
                "{}",
                style(format!(
                    "Warning: '{path}' does not exist in the current working tree."
                ))
                .yellow()
            );
            let keep_going = prompt::confirm_missing_file(prompter, path).map_err(Error::Prompt)?;
            if !keep_going {
                return Err(Error::Declined);
            }
        }
    }

    let snapshot = snapshot(&target, job.snapshot, &job.request)?;
    println!("Created recovery snapshot: {snapshot}");

    banner::print_banner(&job.request, &snapshot);
    let confirmed = prompt::confirm_rewrite(prompter).map_err(Error::Prompt)?;
    if !confirmed {
        println!(
            "{}",
            style("Operation cancelled. No history was modified.")
                .yellow()
                .bold()
        );
        return Err(Error::Declined);
    }

    let commits_matched = rewrite(&target, &job.request)?;
    println!(
        "{}",
        style(format!(
            "History rewritten; {commits_matched} commit(s) matched the rule."
        ))
        .green()
        .bold()
    );

    Ok(finalize(&target, snapshot, commits_matched))
}

/// Stage 1: check the path, the tools, and the working tree, in that order.
///
/// "Is this a repository" goes through git's own `--is-inside-work-tree`
/// query; checking for a `.git` subdirectory is not reliable.
pub fn validate(repo: &Path, request: &RewriteRequest) -> Result<RepositoryTarget, Error> {
    // filter-branch only rewrites emails; a requested name change must not
    // be half-applied by an irreversible run.
    if let RewriteRequest::ReplaceEmail {
        new_name: Some(_),
        engine: EmailEngine::FilterBranch,
        ..
    } = request
    {
        return Err(Error::NameRewriteNeedsFilterRepo);
    }

    if !repo.is_dir() {
        return Err(Error::NotADirectory(repo.to_path_buf()));
    }
    let root = repo.canonicalize()?;

    if which::which("git").is_err() {
        return Err(Error::ToolNotAvailable {
            tool: "git",
            install: "https://git-scm.com/downloads",
        });
    }
    if !git::is_inside_work_tree(&root) {
        return Err(Error::NotARepository(root));
    }
    if git::has_uncommitted_changes(&root)? {
        return Err(Error::UncommittedChanges);
    }
    if needs_filter_repo(request) && which::which("git-filter-repo").is_err() {
        return Err(Error::ToolNotAvailable {
            tool: "git-filter-repo",
            install: "pip3 install git-filter-repo",
        });
    }

    Ok(RepositoryTarget { root })
}

fn needs_filter_repo(request: &RewriteRequest) -> bool {
    match request {
        RewriteRequest::ReplaceEmail { engine, .. } => *engine == EmailEngine::FilterRepo,
        RewriteRequest::RemovePath { .. } => true,
    }
}

/// Stage 2: create the recovery point.
///
/// A name collision aborts the run rather than risk confusing a prior
/// recovery point with this one; there is no automatic retry.
pub fn snapshot(
    target: &RepositoryTarget,
    kind: SnapshotKind,
    request: &RewriteRequest,
) -> Result<SafetySnapshot, Error> {
    match kind {
        SnapshotKind::Branch => {
            let name = backup_branch_name(request, &Local::now().format("%Y%m%d-%H%M%S"));
            snapshot_branch(target, name)
        }
        SnapshotKind::DirectoryCopy => snapshot_directory_copy(target),
    }
}

/// Derives the backup branch name: a fixed prefix, the operation, and a
/// second-granularity timestamp so names sort chronologically.
fn backup_branch_name(request: &RewriteRequest, timestamp: &impl fmt::Display) -> String {
    let operation = match request {
        RewriteRequest::ReplaceEmail { .. } => "email-rewrite",
        RewriteRequest::RemovePath { .. } => "scrub",
    };
    format!("backup-before-{operation}-{timestamp}")
}

fn snapshot_branch(target: &RepositoryTarget, name: String) -> Result<SafetySnapshot, Error> {
    if git::branch_exists(target.root(), &name) {
        return Err(Error::SnapshotExists(name));
    }
    git::create_branch(target.root(), &name)?;
    Ok(SafetySnapshot {
        kind: SnapshotKind::Branch,
        location: name,
    })
}

fn snapshot_directory_copy(target: &RepositoryTarget) -> Result<SafetySnapshot, Error> {
    let mut backup = target.root().as_os_str().to_os_string();
    backup.push("_backup");
    let backup = PathBuf::from(backup);
    if backup.exists() {
        return Err(Error::SnapshotExists(backup.display().to_string()));
    }
    copy_dir_recursive(target.root(), &backup)?;
    Ok(SafetySnapshot {
        kind: SnapshotKind::DirectoryCopy,
        location: backup.display().to_string(),
    })
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<(), Error> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let to = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &to)?;
        } else {
            fs::copy(entry.path(), &to)?;
        }
    }
    Ok(())
}

/// Stage 4: the destructive step. Returns the number of commits the rule
/// matched, counted against pre-rewrite history.
pub fn rewrite(target: &RepositoryTarget, request: &RewriteRequest) -> Result<usize, Error> {
    match request {
        RewriteRequest::ReplaceEmail {
            old_email,
            new_email,
            new_name,
            engine,
        } => {
            let matched = git::count_commits_with_email(target.root(), old_email)?;
            println!("Rewriting commit emails, this may take a while...");
            match engine {
                EmailEngine::FilterBranch => {
                    git::filter_branch_replace_email(target.root(), old_email, new_email)?;
                }
                EmailEngine::FilterRepo => {
                    let args = filter_repo_email_args(old_email, new_email, new_name.as_deref());
                    git::filter_repo(target.root(), &args)?;
                }
            }
            Ok(matched)
        }
        RewriteRequest::RemovePath { path } => {
            let matched = git::count_commits_touching(target.root(), path)?;
            println!("Removing '{path}' from history, this may take a while...");
            let args = vec![
                "--invert-paths".to_string(),
                "--path".to_string(),
                path.clone(),
                "--force".to_string(),
            ];
            git::filter_repo(target.root(), &args)?;
            Ok(matched)
        }
    }
}

/// Builds the `git-filter-repo` callback arguments for an email rewrite.
///
/// The callbacks compare byte-for-byte, so the replacement only fires on an
/// exact, case-sensitive match.
fn filter_repo_email_args(old_email: &str, new_email: &str, new_name: Option<&str>) -> Vec<String> {
    let mut args = vec![
        "--email-callback".to_string(),
        format!(
            "return {} if email == {} else email",
            py_bytes(new_email),
            py_bytes(old_email)
        ),
    ];
    if let Some(name) = new_name {
        args.push("--name-callback".to_string());
        args.push(format!(
            "return {} if name == {} else name",
            py_bytes(name),
            py_bytes(banner::local_part(old_email))
        ));
    }
    args.push("--force".to_string());
    args
}

/// Renders a string as a Python bytes literal for a filter-repo callback.
///
/// Python bytes literals may contain only ASCII, so anything outside the
/// printable range is hex-escaped from the string's UTF-8 encoding.
fn py_bytes(s: &str) -> String {
    let mut out = String::from("b\"");
    for &byte in s.as_bytes() {
        match byte {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            0x20..=0x7e => out.push(byte as char),
            _ => out.push_str(&format!("\\x{byte:02x}")),
        }
    }
    out.push('"');
    out
}

/// Stage 5: compact the repository and assemble the final report.
///
/// A gc failure is carried as a warning: history has already been rewritten
/// successfully, the user just needs to run the compaction manually.
pub fn finalize(
    target: &RepositoryTarget,
    snapshot: SafetySnapshot,
    commits_matched: usize,
) -> CleanupReport {
    println!("Cleaning up and optimizing repository...");
    let gc_warning = git::gc_aggressive(target.root()).err().map(|e| e.to_string());
    CleanupReport {
        snapshot,
        commits_matched,
        remotes: git::remotes(target.root()),
        gc_warning,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::tests::{all_emails, commit_file, run as git_run, scratch_repo};
    use crate::prompt::tests::MockConfirmPrompter;

    fn email_request(engine: EmailEngine) -> RewriteRequest {
        RewriteRequest::ReplaceEmail {
            old_email: "old@x.com".to_string(),
            new_email: "new@x.com".to_string(),
            new_name: None,
            engine,
        }
    }

    #[test]
    fn validate_rejects_missing_directory() {
        let err = validate(
            Path::new("/no/such/directory"),
            &email_request(EmailEngine::FilterBranch),
        )
        .unwrap_err();
        assert!(matches!(err, Error::NotADirectory(_)));
    }

    #[test]
    fn validate_rejects_name_change_on_filter_branch_engine() {
        // Fires before any path or repository inspection: the request shape
        // itself is invalid.
        let request = RewriteRequest::ReplaceEmail {
            old_email: "old@x.com".to_string(),
            new_email: "new@x.com".to_string(),
            new_name: Some("Jane Doe".to_string()),
            engine: EmailEngine::FilterBranch,
        };
        let err = validate(Path::new("/no/such/directory"), &request).unwrap_err();
        assert!(matches!(err, Error::NameRewriteNeedsFilterRepo));
    }

    #[test]
    fn validate_rejects_plain_directory() {
        if which::which("git").is_err() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let err = validate(dir.path(), &email_request(EmailEngine::FilterBranch)).unwrap_err();
        assert!(matches!(err, Error::NotARepository(_)));
    }

    #[test]
    fn validate_rejects_dirty_tree_before_any_snapshot() {
        let Some((_dir, repo)) = scratch_repo() else {
            return;
        };
        std::fs::write(repo.join("README.md"), "dirty").unwrap();

        let job = RewriteJob {
            repo: repo.clone(),
            request: email_request(EmailEngine::FilterBranch),
            snapshot: SnapshotKind::Branch,
        };
        let mut prompter = MockConfirmPrompter::answering(true);
        let err = run(&job, &mut prompter).unwrap_err();

        assert!(matches!(err, Error::UncommittedChanges));
        // No recovery artifact may exist after a validation failure.
        let out = std::process::Command::new("git")
            .arg("-C")
            .arg(&repo)
            .args(["branch", "--list", "backup-before-*"])
            .output()
            .unwrap();
        assert!(String::from_utf8_lossy(&out.stdout).trim().is_empty());
    }

    #[test]
    fn branch_snapshot_collision_aborts() {
        let Some((_dir, repo)) = scratch_repo() else {
            return;
        };
        let request = email_request(EmailEngine::FilterBranch);
        let target = validate(&repo, &request).unwrap();

        snapshot_branch(&target, "backup-before-email-rewrite-x".to_string()).unwrap();
        let err =
            snapshot_branch(&target, "backup-before-email-rewrite-x".to_string()).unwrap_err();
        assert!(matches!(err, Error::SnapshotExists(_)));
    }

    #[test]
    fn directory_copy_snapshot_collision_aborts() {
        let Some((_dir, repo)) = scratch_repo() else {
            return;
        };
        let request = email_request(EmailEngine::FilterBranch);
        let target = validate(&repo, &request).unwrap();

        let canonical = repo.canonicalize().unwrap();
        std::fs::create_dir(canonical.parent().unwrap().join("repo_backup")).unwrap();
        let err = snapshot_directory_copy(&target).unwrap_err();
        assert!(matches!(err, Error::SnapshotExists(_)));
    }

    #[test]
    fn directory_copy_snapshot_copies_the_repository() {
        let Some((_dir, repo)) = scratch_repo() else {
            return;
        };
        let request = email_request(EmailEngine::FilterBranch);
        let target = validate(&repo, &request).unwrap();

        let snap = snapshot_directory_copy(&target).unwrap();
        assert_eq!(snap.kind, SnapshotKind::DirectoryCopy);
        let backup = PathBuf::from(&snap.location);
        assert!(backup.join("README.md").is_file());
        assert!(backup.join(".git").is_dir());
    }

    #[test]
    fn decline_makes_no_history_change() {
        let Some((_dir, repo)) = scratch_repo() else {
            return;
        };
        commit_file(&repo, "a.txt", "a", "second", Some("old@x.com"));

        let job = RewriteJob {
            repo: repo.clone(),
            request: email_request(EmailEngine::FilterBranch),
            snapshot: SnapshotKind::Branch,
        };
        let mut prompter = MockConfirmPrompter::answering(false);
        let err = run(&job, &mut prompter).unwrap_err();

        assert!(matches!(err, Error::Declined));
        assert!(all_emails(&repo).contains(&"old@x.com".to_string()));
    }

    #[test]
    fn backup_branch_name_is_prefixed_and_sortable() {
        let name = backup_branch_name(
            &RewriteRequest::RemovePath {
                path: "f".to_string(),
            },
            &"20240101-000000",
        );
        assert_eq!(name, "backup-before-scrub-20240101-000000");

        let name = backup_branch_name(&email_request(EmailEngine::FilterRepo), &"20240101-000000");
        assert_eq!(name, "backup-before-email-rewrite-20240101-000000");
    }

    #[test]
    fn filter_repo_args_quote_callbacks() {
        let args = filter_repo_email_args("old@x.com", "new@x.com", None);
        assert_eq!(args[0], "--email-callback");
        assert_eq!(
            args[1],
            "return b\"new@x.com\" if email == b\"old@x.com\" else email"
        );
        assert_eq!(args.last().unwrap(), "--force");

        let args = filter_repo_email_args("old@x.com", "new@x.com", Some("Jane Doe"));
        assert!(args.contains(&"--name-callback".to_string()));
        assert!(
            args.contains(&"return b\"Jane Doe\" if name == b\"old\" else name".to_string())
        );
    }

    #[test]
    fn py_bytes_escapes_quotes_and_backslashes() {
        assert_eq!(py_bytes(r#"a"b\c"#), r#"b"a\"b\\c""#);
    }

    #[test]
    fn py_bytes_is_ascii_clean_for_non_ascii_names() {
        // UTF-8 bytes outside printable ASCII come out hex-escaped.
        assert_eq!(py_bytes("José"), r#"b"Jos\xc3\xa9""#);

        let literal = py_bytes("José García");
        assert!(literal.is_ascii());

        let args = filter_repo_email_args("old@x.com", "new@x.com", Some("José García"));
        assert!(args.iter().all(|a| a.is_ascii()));
    }

    #[test]
    fn email_rewrite_end_to_end_with_filter_branch() {
        let Some((_dir, repo)) = scratch_repo() else {
            return;
        };
        // Three commits: two by old@x.com, one by other@x.com (the initial
        // commit uses the repo default test@example.com and is a bystander).
        commit_file(&repo, "a.txt", "a", "second", Some("old@x.com"));
        commit_file(&repo, "b.txt", "b", "third", Some("old@x.com"));
        commit_file(&repo, "c.txt", "c", "fourth", Some("other@x.com"));

        let job = RewriteJob {
            repo: repo.clone(),
            request: email_request(EmailEngine::FilterBranch),
            snapshot: SnapshotKind::Branch,
        };
        let mut prompter = MockConfirmPrompter::answering(true);
        let report = run(&job, &mut prompter).unwrap();

        assert_eq!(report.commits_matched, 2);

        // Exactly one recovery artifact for this invocation.
        let out = std::process::Command::new("git")
            .arg("-C")
            .arg(&repo)
            .args(["branch", "--list", "backup-before-email-rewrite-*"])
            .output()
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&out.stdout).lines().count(), 1);

        let emails = all_emails(&repo);
        assert_eq!(emails.iter().filter(|e| *e == "new@x.com").count(), 2);
        assert_eq!(emails.iter().filter(|e| *e == "other@x.com").count(), 1);
        assert_eq!(emails.iter().filter(|e| *e == "old@x.com").count(), 0);
    }

    #[test]
    fn email_rewrite_round_trip_restores_emails() {
        let Some((_dir, repo)) = scratch_repo() else {
            return;
        };
        commit_file(&repo, "a.txt", "a", "second", Some("old@x.com"));

        let forward = RewriteJob {
            repo: repo.clone(),
            request: email_request(EmailEngine::FilterBranch),
            snapshot: SnapshotKind::Branch,
        };
        let mut prompter = MockConfirmPrompter::answering(true);
        run(&forward, &mut prompter).unwrap();
        assert!(!all_emails(&repo).contains(&"old@x.com".to_string()));

        // Second snapshot uses the directory strategy so a same-second
        // timestamp cannot collide with the first run's backup branch.
        let backward = RewriteJob {
            repo: repo.clone(),
            request: RewriteRequest::ReplaceEmail {
                old_email: "new@x.com".to_string(),
                new_email: "old@x.com".to_string(),
                new_name: None,
                engine: EmailEngine::FilterBranch,
            },
            snapshot: SnapshotKind::DirectoryCopy,
        };
        let mut prompter = MockConfirmPrompter::answering(true);
        run(&backward, &mut prompter).unwrap();

        let head_emails = std::process::Command::new("git")
            .arg("-C")
            .arg(&repo)
            .args(["log", "--format=%ae"])
            .output()
            .unwrap();
        let head_emails = String::from_utf8_lossy(&head_emails.stdout).to_string();
        assert!(head_emails.contains("old@x.com"));
        assert!(!head_emails.contains("new@x.com"));
    }

    #[test]
    fn scrub_without_filter_repo_fails_fast_with_install_hint() {
        let Some((_dir, repo)) = scratch_repo() else {
            return;
        };
        if which::which("git-filter-repo").is_ok() {
            return;
        }
        let request = RewriteRequest::RemovePath {
            path: "secret.txt".to_string(),
        };
        let err = validate(&repo, &request).unwrap_err();
        assert!(matches!(
            err,
            Error::ToolNotAvailable {
                tool: "git-filter-repo",
                ..
            }
        ));
        assert!(err.to_string().contains("pip3 install git-filter-repo"));
    }

    #[test]
    fn scrub_of_absent_file_requires_extra_acknowledgement() {
        let Some((_dir, repo)) = scratch_repo() else {
            return;
        };
        // The full scrub path needs the external tool even to validate.
        if which::which("git-filter-repo").is_err() {
            return;
        }
        commit_file(&repo, "secret.txt", "hunter2", "add secret", None);
        git_run(&repo, &["rm", "-q", "secret.txt"]);
        git_run(&repo, &["commit", "-q", "-m", "drop secret"]);

        let job = RewriteJob {
            repo: repo.clone(),
            request: RewriteRequest::RemovePath {
                path: "secret.txt".to_string(),
            },
            snapshot: SnapshotKind::Branch,
        };
        // Declining the absence acknowledgement ends the run before any
        // snapshot is taken.
        let mut prompter = MockConfirmPrompter::answering(false);
        let err = run(&job, &mut prompter).unwrap_err();
        assert!(matches!(err, Error::Declined));
        assert_eq!(prompter.prompts_seen.len(), 1);
        assert!(prompter.prompts_seen[0].contains("does not exist"));
    }
}

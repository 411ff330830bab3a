use std::path::Path;
use std::process::{Command, Stdio};

use crate::error::Error;

/// Builds a `git -C <repo>` command so callers never depend on the process
/// working directory.
fn git(repo: &Path) -> Command {
    let mut cmd = Command::new("git");
    cmd.arg("-C").arg(repo);
    cmd
}

/// Runs a git command and returns only its exit status.
fn run_status(mut cmd: Command, what: &str) -> Result<(), Error> {
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::piped());
    let out = cmd.output().map_err(|e| Error::Git {
        command: what.to_string(),
        detail: e.to_string(),
    })?;
    if out.status.success() {
        Ok(())
    } else {
        Err(Error::Git {
            command: what.to_string(),
            detail: String::from_utf8_lossy(&out.stderr).trim().to_string(),
        })
    }
}

/// Runs a git command and returns its trimmed stdout on success, or its
/// trimmed stderr wrapped in an error on failure.
fn run_output(mut cmd: Command, what: &str) -> Result<String, Error> {
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    let out = cmd.output().map_err(|e| Error::Git {
        command: what.to_string(),
        detail: e.to_string(),
    })?;
    if out.status.success() {
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    } else {
        Err(Error::Git {
            command: what.to_string(),
            detail: String::from_utf8_lossy(&out.stderr).trim().to_string(),
        })
    }
}

/// Asks git itself whether `repo` is inside a working tree.
///
/// This is the authoritative check; probing for a `.git` subdirectory breaks
/// on worktrees, submodules, and `GIT_DIR` setups.
pub fn is_inside_work_tree(repo: &Path) -> bool {
    let mut cmd = git(repo);
    cmd.args(["rev-parse", "--is-inside-work-tree"]);
    matches!(run_output(cmd, "rev-parse --is-inside-work-tree"), Ok(s) if s == "true")
}

/// Reports whether the working tree differs from HEAD.
///
/// `git diff-index --quiet HEAD --` exits 0 on a clean tree and 1 when there
/// are staged or unstaged changes; anything else is a real failure.
pub fn has_uncommitted_changes(repo: &Path) -> Result<bool, Error> {
    let mut cmd = git(repo);
    cmd.args(["diff-index", "--quiet", "HEAD", "--"]);
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::null());
    let status = cmd.status().map_err(|e| Error::Git {
        command: "diff-index".to_string(),
        detail: e.to_string(),
    })?;
    match status.code() {
        Some(0) => Ok(false),
        Some(1) => Ok(true),
        _ => Err(Error::Git {
            command: "diff-index --quiet HEAD --".to_string(),
            detail: "unexpected exit status (does the repository have any commits?)".to_string(),
        }),
    }
}

/// Checks whether a local branch of the given name already exists.
pub fn branch_exists(repo: &Path, name: &str) -> bool {
    let mut cmd = git(repo);
    cmd.args(["rev-parse", "--verify", "--quiet"])
        .arg(format!("refs/heads/{name}"));
    run_output(cmd, "rev-parse --verify").is_ok()
}

/// Creates a branch at the current tip of history without checking it out.
pub fn create_branch(repo: &Path, name: &str) -> Result<(), Error> {
    let mut cmd = git(repo);
    cmd.arg("branch").arg(name);
    run_status(cmd, "branch")
}

/// Counts commits (across all refs) whose author or committer email exactly
/// equals `email`. Comparison is byte-for-byte, so case matters.
pub fn count_commits_with_email(repo: &Path, email: &str) -> Result<usize, Error> {
    let mut cmd = git(repo);
    cmd.args(["log", "--all", "--format=%ae%n%ce"]);
    let out = run_output(cmd, "log --all")?;
    let lines: Vec<&str> = out.lines().collect();
    Ok(lines
        .chunks(2)
        .filter(|pair| pair.iter().any(|e| *e == email))
        .count())
}

/// Counts commits (across all refs) that touch the given path.
pub fn count_commits_touching(repo: &Path, path: &str) -> Result<usize, Error> {
    let mut cmd = git(repo);
    cmd.args(["rev-list", "--all", "--count", "--", path]);
    let out = run_output(cmd, "rev-list --all --count")?;
    out.parse().map_err(|_| Error::Git {
        command: "rev-list --all --count".to_string(),
        detail: format!("unexpected output: {out}"),
    })
}

/// Rewrites history with the built-in `git filter-branch --env-filter`
/// mechanism, replacing exact matches of `old_email` in both the author and
/// committer identity of every commit on every branch and tag.
///
/// Slower than `git-filter-repo` on large histories (it re-runs the filter
/// for every commit) but needs nothing beyond git itself.
pub fn filter_branch_replace_email(
    repo: &Path,
    old_email: &str,
    new_email: &str,
) -> Result<(), Error> {
    // The emails land inside double quotes in the sh script below, so the
    // characters sh treats specially there must be backslash-escaped.
    let old_email = sh_escape(old_email);
    let new_email = sh_escape(new_email);
    let filter = format!(
        r#"
if [ "$GIT_COMMITTER_EMAIL" = "{old_email}" ]
then
    export GIT_COMMITTER_EMAIL="{new_email}"
fi
if [ "$GIT_AUTHOR_EMAIL" = "{old_email}" ]
then
    export GIT_AUTHOR_EMAIL="{new_email}"
fi
"#
    );
    let mut cmd = git(repo);
    cmd.args(["filter-branch", "-f", "--env-filter"])
        .arg(filter)
        .args(["--tag-name-filter", "cat", "--", "--branches", "--tags"]);
    cmd.env("FILTER_BRANCH_SQUELCH_WARNING", "1");
    run_rewrite(cmd)?;
    delete_original_refs(repo)
}

/// Escapes a string for interpolation inside a double-quoted sh word:
/// `"`, `$`, backtick, and backslash get a leading backslash.
fn sh_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '"' | '$' | '`' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Drops the `refs/original/*` refs that filter-branch leaves behind.
/// Until they are gone, gc cannot reclaim the pre-rewrite objects.
fn delete_original_refs(repo: &Path) -> Result<(), Error> {
    let mut cmd = git(repo);
    cmd.args(["for-each-ref", "--format=%(refname)", "refs/original/"]);
    let refs = run_output(cmd, "for-each-ref")?;
    for name in refs.lines() {
        let mut cmd = git(repo);
        cmd.args(["update-ref", "-d", name]);
        run_status(cmd, "update-ref -d")?;
    }
    Ok(())
}

/// Rewrites history with `git filter-repo`, passing the already-built
/// callback or path arguments through unchanged.
pub fn filter_repo(repo: &Path, args: &[String]) -> Result<(), Error> {
    let mut cmd = git(repo);
    cmd.arg("filter-repo").args(args);
    run_rewrite(cmd)
}

/// Runs a history-mutating command, preserving the tool's diagnostics
/// verbatim on failure. Never retried: a partial rewrite can leave refs in a
/// mixed state, so recovery goes through the backup instead.
fn run_rewrite(mut cmd: Command) -> Result<(), Error> {
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    let out = cmd
        .output()
        .map_err(|e| Error::RewriteFailed(e.to_string()))?;
    if out.status.success() {
        Ok(())
    } else {
        let mut diag = String::from_utf8_lossy(&out.stderr).trim().to_string();
        if diag.is_empty() {
            diag = String::from_utf8_lossy(&out.stdout).trim().to_string();
        }
        Err(Error::RewriteFailed(diag))
    }
}

/// Prunes unreachable objects immediately and repacks aggressively to reclaim
/// the space freed by a rewrite.
pub fn gc_aggressive(repo: &Path) -> Result<(), Error> {
    let mut cmd = git(repo);
    cmd.args(["gc", "--prune=now", "--aggressive"]);
    run_status(cmd, "gc --prune=now --aggressive")
}

/// Lists the names of configured remotes, if any.
pub fn remotes(repo: &Path) -> Vec<String> {
    let mut cmd = git(repo);
    cmd.arg("remote");
    match run_output(cmd, "remote") {
        Ok(out) if !out.is_empty() => out.lines().map(str::to_string).collect(),
        _ => Vec::new(),
    }
}

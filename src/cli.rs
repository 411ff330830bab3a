use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;

use crate::convert;
use crate::error::Error;
use crate::prompt::DialoguerConfirmPrompter;
use crate::workflow::{
    self, CleanupReport, EmailEngine, RewriteJob, RewriteRequest, SnapshotKind,
};

#[derive(Parser)]
#[command(name = "repo-scrub", version)]
#[command(about = "Rewrite git history safely, plus small file conversion utilities")]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replace a commit author/committer email across all history
    RewriteEmail {
        /// Path to the target git repository
        #[arg(short, long, default_value = ".")]
        repo: PathBuf,

        /// Old email address to replace (exact, case-sensitive match)
        #[arg(short, long)]
        old_email: String,

        /// New email address to use
        #[arg(short, long)]
        new_email: String,

        /// Also set this display name on commits whose name equals the local
        /// part of the old email (git-filter-repo engine only)
        #[arg(long, conflicts_with = "filter_branch")]
        new_name: Option<String>,

        /// Use the built-in `git filter-branch` instead of `git-filter-repo`
        /// (no extra install, but rewrites every commit and is slower)
        #[arg(long)]
        filter_branch: bool,

        /// Back up by copying the repository directory to `<repo>_backup`
        /// instead of creating a backup branch
        #[arg(long)]
        copy_backup: bool,
    },

    /// Remove a file from git history across all branches and tags
    ScrubFile {
        /// Path to the target git repository
        #[arg(short, long, default_value = ".")]
        repo: PathBuf,

        /// Repository-relative path of the file to remove from history
        file_path: String,
    },

    /// Convert a CSV file (with header row) to a sibling JSON file
    CsvToJson {
        /// Path to the csv file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Pretty-print or minify a JSON file in place
    FormatJson {
        /// Path to the json file
        #[arg(short, long)]
        file: PathBuf,

        /// Write prettified JSON (minified without this flag)
        #[arg(short, long)]
        prettify: bool,
    },
}

/// Parses arguments and runs the selected utility.
///
/// All errors propagate here and out to `main`, which owns the exit status;
/// nothing below this layer terminates the process.
pub fn entry() -> Result<(), Error> {
    run_command(Cli::parse().command)
}

fn run_command(command: Command) -> Result<(), Error> {
    match command {
        Command::RewriteEmail {
            repo,
            old_email,
            new_email,
            new_name,
            filter_branch,
            copy_backup,
        } => {
            let job = RewriteJob {
                repo,
                request: RewriteRequest::ReplaceEmail {
                    old_email,
                    new_email,
                    new_name,
                    engine: if filter_branch {
                        EmailEngine::FilterBranch
                    } else {
                        EmailEngine::FilterRepo
                    },
                },
                snapshot: if copy_backup {
                    SnapshotKind::DirectoryCopy
                } else {
                    SnapshotKind::Branch
                },
            };
            let report = workflow::run(&job, &mut DialoguerConfirmPrompter)?;
            print_report(&report);
            Ok(())
        }
        Command::ScrubFile { repo, file_path } => {
            let job = RewriteJob {
                repo,
                request: RewriteRequest::RemovePath { path: file_path },
                snapshot: SnapshotKind::Branch,
            };
            let report = workflow::run(&job, &mut DialoguerConfirmPrompter)?;
            print_report(&report);
            Ok(())
        }
        Command::CsvToJson { file } => {
            let json_path = convert::csv_to_json(&file)?;
            println!(
                "{}",
                style(format!("Wrote {}", json_path.display())).green()
            );
            Ok(())
        }
        Command::FormatJson { file, prettify } => {
            convert::format_json(&file, prettify)?;
            println!(
                "{}",
                style(format!("Rewrote {} in place", file.display())).green()
            );
            Ok(())
        }
    }
}

/// Prints the post-rewrite report: where the recovery point is, and what the
/// user still has to do by hand (force-push, tell collaborators).
fn print_report(report: &CleanupReport) {
    println!();
    println!("{}", style("Operation complete!").green().bold());
    println!("Recovery snapshot (kept indefinitely): {}", report.snapshot);

    if let Some(warning) = &report.gc_warning {
        println!(
            "{}",
            style(format!(
                "Warning: garbage collection failed ({warning}); run \
                 `git gc --prune=now --aggressive` manually to reclaim space."
            ))
            .yellow()
        );
    }

    println!();
    println!("Commit identifiers have changed for every rewritten commit.");
    println!("Collaborators must re-clone or hard-reset their checkouts.");
    for remote in &report.remotes {
        println!("To publish the rewritten history to '{remote}':");
        println!("    git push {remote} --force --all");
        println!("    git push {remote} --force --tags");
    }
}

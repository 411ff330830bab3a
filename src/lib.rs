//! # repo-scrub
//!
//! Small command-line utilities around one risky operation: rewriting git
//! history. The crate provides:
//!
//! - An email rewrite that replaces an exact author/committer email across
//!   all commits, via `git-filter-repo` or the built-in `git filter-branch`.
//! - A file scrub that purges a path from every historical revision.
//! - Two unrelated file helpers: a CSV to JSON converter and a JSON
//!   pretty-printer/minifier.
//!
//! Both history rewrites run through the same safety pipeline: validate the
//! repository, create a recovery snapshot (backup branch or directory copy),
//! confirm interactively, rewrite, then garbage-collect. Any failure leaves
//! the snapshot in place for manual recovery.
//!
//! ## Usage
//!
//! ```bash
//! repo-scrub rewrite-email -r /path/to/repo -o old@x.com -n new@x.com
//! repo-scrub scrub-file -r /path/to/repo secrets/password.txt
//! repo-scrub csv-to-json -f data.csv
//! repo-scrub format-json -f data.json --prettify
//! ```
//!
//! ## Modules
//!
//! - [`cli`] - Command-line interface and entry point
//! - [`workflow`] - The validate/snapshot/confirm/rewrite/cleanup pipeline
//! - [`git`] - Git command wrappers
//! - [`prompt`] - User confirmation abstractions
//! - [`banner`] - Pre-rewrite summary banner
//! - [`convert`] - CSV and JSON file converters
//! - [`error`] - Shared error type

pub mod banner;
pub mod cli;
pub mod convert;
pub mod error;
pub mod git;
pub mod prompt;
pub mod workflow;

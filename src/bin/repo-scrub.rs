use console::style;

/// Entry point for the `repo-scrub` binary.
///
/// Delegates to the CLI entry function; any error is printed in red and the
/// process exits with status 1.
fn main() {
    if let Err(e) = repo_scrub::cli::entry() {
        eprintln!("{}", style(format!("Error: {e}")).red().bold());
        std::process::exit(1);
    }
}

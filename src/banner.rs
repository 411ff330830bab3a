use console::{measure_text_width, style};
use std::iter;

use crate::workflow::{RewriteRequest, SafetySnapshot};

/// Prints the pre-rewrite summary banner: the exact transformation about to
/// be applied and where the recovery snapshot lives.
///
/// The banner is dynamically sized to fit the widest **visible** line of
/// text, using [`console::measure_text_width`] to ignore ANSI color codes
/// when calculating padding, and framed with Unicode box-drawing characters.
/// Borders are styled independently from the inner text so embedded color
/// codes do not bleed into the box edges.
pub fn print_banner(request: &RewriteRequest, snapshot: &SafetySnapshot) {
    let lines = banner_lines(request, snapshot);

    let max_width = lines
        .iter()
        .map(|l| measure_text_width(l)) // ignore ANSI in content
        .max()
        .unwrap_or(0)
        + 2;

    let border = "═".repeat(max_width);
    let top = style(format!("╔{}╗", border)).blue().bold();
    let bottom = style(format!("╚{}╝", border)).blue().bold();
    let left = style("║ ").blue().bold().to_string();
    let right = style("║").blue().bold().to_string();

    println!();
    println!("{top}");
    for line in lines {
        let visible = measure_text_width(&line);
        let pad = max_width - visible; // includes the one space after left border
        println!("{}{}{}{}", left, line, " ".repeat(pad - 1), right);
    }
    println!("{bottom}");
    println!();
}

/// Constructs the banner lines: 1) what the rewrite will do, 2) where the
/// recovery snapshot is, 3) the irreversibility warning.
///
/// Some lines carry ANSI styling, so consumers measuring width must use
/// visible width (e.g. `console::measure_text_width`), not `str::len()`.
fn banner_lines(request: &RewriteRequest, snapshot: &SafetySnapshot) -> Vec<String> {
    let what = match request {
        RewriteRequest::ReplaceEmail {
            old_email,
            new_email,
            new_name,
            ..
        } => {
            let mut lines = vec![
                "Rewrite history: replace commit emails".to_string(),
                String::new(),
                format!("  {} -> {}", old_email, new_email),
            ];
            if let Some(name) = new_name {
                lines.push(format!(
                    "  display name '{}' for commits authored as '{}'",
                    name,
                    local_part(old_email)
                ));
            }
            lines
        }
        RewriteRequest::RemovePath { path } => vec![
            "Rewrite history: scrub file from every revision".to_string(),
            String::new(),
            format!("  {}", path),
        ],
    };

    what.into_iter()
        .chain(iter::once(String::new()))
        .chain(iter::once(format!("Recovery snapshot: {}", snapshot)))
        .chain(iter::once(
            style("This operation cannot be undone!")
                .yellow()
                .bold()
                .to_string(),
        ))
        .collect()
}

/// The text before the `@` of an email address, or the whole string when
/// there is no `@`.
pub(crate) fn local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{EmailEngine, SnapshotKind};

    fn branch_snapshot() -> SafetySnapshot {
        SafetySnapshot {
            kind: SnapshotKind::Branch,
            location: "backup-before-email-rewrite-20240101-000000".to_string(),
        }
    }

    #[test]
    fn email_banner_shows_transformation_and_snapshot() {
        let request = RewriteRequest::ReplaceEmail {
            old_email: "old@x.com".to_string(),
            new_email: "new@x.com".to_string(),
            new_name: None,
            engine: EmailEngine::FilterRepo,
        };
        let lines = banner_lines(&request, &branch_snapshot());
        let s = lines.join("\n");

        assert!(s.contains("replace commit emails"));
        assert!(s.contains("old@x.com -> new@x.com"));
        assert!(s.contains("backup-before-email-rewrite-20240101-000000"));
        assert!(s.contains("cannot be undone"));
    }

    #[test]
    fn email_banner_mentions_name_rule_when_given() {
        let request = RewriteRequest::ReplaceEmail {
            old_email: "old@x.com".to_string(),
            new_email: "new@x.com".to_string(),
            new_name: Some("Jane Doe".to_string()),
            engine: EmailEngine::FilterRepo,
        };
        let lines = banner_lines(&request, &branch_snapshot());
        let s = lines.join("\n");

        assert!(s.contains("Jane Doe"));
        assert!(s.contains("'old'"));
    }

    #[test]
    fn scrub_banner_shows_path() {
        let request = RewriteRequest::RemovePath {
            path: "secrets/password.txt".to_string(),
        };
        let lines = banner_lines(&request, &branch_snapshot());
        let s = lines.join("\n");

        assert!(s.contains("scrub file"));
        assert!(s.contains("secrets/password.txt"));
    }

    #[test]
    fn local_part_handles_plain_strings() {
        assert_eq!(local_part("jane@example.com"), "jane");
        assert_eq!(local_part("no-at-sign"), "no-at-sign");
    }
}

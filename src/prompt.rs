use dialoguer::{Confirm, theme::ColorfulTheme};

/// Abstraction over a yes/no confirmation prompt.
///
/// The workflow only ever cancels through one of these, so injecting a mock
/// implementation lets tests drive a full run without touching stdin.
pub trait ConfirmPrompter {
    /// Prompt the user for a yes/no confirmation.
    ///
    /// # Parameters
    /// - `prompt`: The confirmation message.
    /// - `default`: The answer used if the user just presses Enter.
    ///
    /// # Returns
    /// `Ok(true)` if confirmed, `Ok(false)` if declined, or `Err(String)` on
    /// input failure.
    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool, String>;
}

/// Default implementation of `ConfirmPrompter` using `dialoguer::Confirm`
/// with the `ColorfulTheme` styling.
pub struct DialoguerConfirmPrompter;

impl ConfirmPrompter for DialoguerConfirmPrompter {
    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool, String> {
        let theme = ColorfulTheme::default();
        let confirm = Confirm::with_theme(&theme)
            .with_prompt(prompt)
            .default(default);
        match confirm.interact() {
            Ok(v) => Ok(v),
            Err(e) => Err(e.to_string()),
        }
    }
}

/// Asks for the final go-ahead before the destructive rewrite starts.
///
/// Defaults to "no": anything other than an explicit yes is a decline. This
/// is the sole cancellation point; once confirmed, the rewrite runs to
/// completion or failure.
pub fn confirm_rewrite<P: ConfirmPrompter>(prompter: &mut P) -> Result<bool, String> {
    prompter.confirm("Are you sure you want to continue?", false)
}

/// Asks whether to scrub a file that is absent from the current working tree.
///
/// Purging a historically-present file that was since deleted is legitimate,
/// but it is also the signature of a typo'd path, so it gets its own
/// acknowledgement before anything else runs.
pub fn confirm_missing_file<P: ConfirmPrompter>(
    prompter: &mut P,
    file_path: &str,
) -> Result<bool, String> {
    let prompt = format!(
        "'{file_path}' does not exist in the current working tree; scrub it from history anyway?"
    );
    prompter.confirm(&prompt, false)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) struct MockConfirmPrompter {
        pub response: Result<bool, String>,
        pub prompts_seen: Vec<String>,
    }

    impl MockConfirmPrompter {
        pub(crate) fn answering(response: bool) -> Self {
            Self {
                response: Ok(response),
                prompts_seen: Vec::new(),
            }
        }
    }

    impl ConfirmPrompter for MockConfirmPrompter {
        fn confirm(&mut self, prompt: &str, _default: bool) -> Result<bool, String> {
            self.prompts_seen.push(prompt.to_string());
            self.response.clone()
        }
    }

    #[test]
    fn confirm_rewrite_accepts() {
        let mut prompter = MockConfirmPrompter::answering(true);
        assert_eq!(confirm_rewrite(&mut prompter).unwrap(), true);
        assert_eq!(
            prompter.prompts_seen,
            vec!["Are you sure you want to continue?".to_string()]
        );
    }

    #[test]
    fn confirm_rewrite_declines() {
        let mut prompter = MockConfirmPrompter::answering(false);
        assert_eq!(confirm_rewrite(&mut prompter).unwrap(), false);
    }

    #[test]
    fn confirm_rewrite_propagates_error() {
        let mut prompter = MockConfirmPrompter {
            response: Err("input failed".to_string()),
            prompts_seen: Vec::new(),
        };
        assert!(confirm_rewrite(&mut prompter).is_err());
    }

    #[test]
    fn missing_file_prompt_names_the_path() {
        let mut prompter = MockConfirmPrompter::answering(true);
        confirm_missing_file(&mut prompter, "secrets/password.txt").unwrap();
        assert!(prompter.prompts_seen[0].contains("secrets/password.txt"));
    }
}

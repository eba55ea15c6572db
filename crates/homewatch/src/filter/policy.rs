//! Include/exclude decision for candidate words.

use tracing::trace;

/// Outcome of checking a word against the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDecision {
    /// The word may be logged.
    Log,

    /// The word contains an excluded substring.
    ExcludedWord {
        /// The exclude entry that matched.
        pattern: String,
    },

    /// The foreground process is not on the include list.
    ProcessNotIncluded {
        /// Lower-cased process name that was checked.
        process: String,
    },
}

impl FilterDecision {
    /// Whether this decision allows logging.
    #[must_use]
    pub fn is_log(&self) -> bool {
        matches!(self, Self::Log)
    }
}

/// Immutable keyword filter policy.
///
/// Entries are lower-cased once at construction so every check is a plain
/// substring search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterPolicy {
    include_processes: Vec<String>,
    exclude_words: Vec<String>,
}

impl FilterPolicy {
    /// Build a policy from include-process and exclude-word substrings.
    ///
    /// Blank entries are ignored; an empty include list allows every process.
    #[must_use]
    pub fn new<I, E>(include_processes: &[I], exclude_words: &[E]) -> Self
    where
        I: AsRef<str>,
        E: AsRef<str>,
    {
        Self {
            include_processes: normalize(include_processes),
            exclude_words: normalize(exclude_words),
        }
    }

    /// Include-process substrings, lower-cased.
    #[must_use]
    pub fn include_processes(&self) -> &[String] {
        &self.include_processes
    }

    /// Exclude-word substrings, lower-cased.
    #[must_use]
    pub fn exclude_words(&self) -> &[String] {
        &self.exclude_words
    }

    /// Decide whether `word` typed into `active_process` should be logged.
    ///
    /// The exclude check runs first and wins over any include match.
    #[must_use]
    pub fn decide(&self, word: &str, active_process: &str) -> FilterDecision {
        let word = word.to_lowercase();
        if let Some(pattern) = self
            .exclude_words
            .iter()
            .find(|excluded| word.contains(excluded.as_str()))
        {
            trace!(pattern = %pattern, "Word dropped by exclude list");
            return FilterDecision::ExcludedWord {
                pattern: pattern.clone(),
            };
        }

        if self.include_processes.is_empty() {
            return FilterDecision::Log;
        }

        let process = active_process.to_lowercase();
        if self
            .include_processes
            .iter()
            .any(|included| process.contains(included.as_str()))
        {
            FilterDecision::Log
        } else {
            trace!(process = %process, "Word dropped, process not included");
            FilterDecision::ProcessNotIncluded { process }
        }
    }

    /// Shorthand for `decide(..).is_log()`.
    #[must_use]
    pub fn should_log(&self, word: &str, active_process: &str) -> bool {
        self.decide(word, active_process).is_log()
    }
}

fn normalize<S: AsRef<str>>(entries: &[S]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| entry.as_ref().trim().to_lowercase())
        .filter(|entry| !entry.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(include: &[&str], exclude: &[&str]) -> FilterPolicy {
        FilterPolicy::new(include, exclude)
    }

    #[test]
    fn test_exclude_rejects_word() {
        let p = policy(&[], &["secret"]);
        assert!(!p.should_log("secret123", "chrome"));
    }

    #[test]
    fn test_include_matches_process() {
        let p = policy(&["chrome"], &[]);
        assert!(p.should_log("weather", "chrome"));
    }

    #[test]
    fn test_include_rejects_other_process() {
        let p = policy(&["chrome"], &[]);
        assert!(!p.should_log("weather", "notepad"));
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let p = policy(&["chrome"], &["secret"]);
        assert_eq!(
            p.decide("topsecret", "chrome"),
            FilterDecision::ExcludedWord {
                pattern: "secret".to_string()
            }
        );
        assert!(!p.should_log("topsecret", "notepad"));
    }

    #[test]
    fn test_rejects_iff_excluded_when_include_empty() {
        let p = policy(&[], &["pass", "pin"]);
        for (word, expected) in [
            ("passport", false),
            ("spinach", false),
            ("hello", true),
            ("pa", true),
        ] {
            assert_eq!(p.should_log(word, "anything"), expected, "word {word}");
        }
    }

    #[test]
    fn test_empty_include_logs_any_process() {
        let p = policy(&[], &[]);
        assert!(p.should_log("weather", "unknown_process"));
        assert!(p.should_log("weather", ""));
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let p = policy(&["Chrome"], &["SECRET"]);
        assert!(!p.should_log("MySecret", "chrome.exe"));
        assert!(p.should_log("Weather", "Google Chrome"));
    }

    #[test]
    fn test_process_substring_match() {
        let p = policy(&["firefox"], &[]);
        assert!(p.should_log("hello", "firefox-esr"));
        assert_eq!(
            p.decide("hello", "Konsole"),
            FilterDecision::ProcessNotIncluded {
                process: "konsole".to_string()
            }
        );
    }

    #[test]
    fn test_blank_entries_ignored() {
        let p = policy(&["  ", ""], &[" "]);
        assert!(p.include_processes().is_empty());
        assert!(p.exclude_words().is_empty());
        assert!(p.should_log("anything", "anywhere"));
    }

    #[test]
    fn test_policy_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FilterPolicy>();
    }
}

//! Default filter lists.

/// Browsers and chat clients whose typing is logged by default.
#[must_use]
pub fn default_include_processes() -> Vec<&'static str> {
    vec!["chrome", "firefox", "slack", "msedge", "brave"]
}

/// Substrings that keep a word out of the log by default.
#[must_use]
pub fn default_exclude_words() -> Vec<&'static str> {
    vec!["password", "secret", "pswd"]
}

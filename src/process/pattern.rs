//! Wildcard patterns used to pick a fake handler for a command line.

use regex::Regex;

/// The pattern that matches every command.
pub const CATCH_ALL: &str = "*";

/// A command pattern where `*` matches any run of characters.
#[derive(Debug, Clone)]
pub struct CommandPattern {
    raw: String,
    regex: Option<Regex>,
    exact: bool,
}

impl CommandPattern {
    /// Compiles a pattern.
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let body = regex::escape(&raw).replace(r"\*", ".*");
        let regex = Regex::new(&format!("(?s)^{body}$")).ok();
        Self { raw, regex, exact: false }
    }

    /// A pattern matching `command` verbatim, where `*` is an ordinary character.
    pub fn exact(command: impl Into<String>) -> Self {
        Self { raw: command.into(), regex: None, exact: true }
    }

    /// The pattern as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether this is the catch-all pattern.
    #[must_use]
    pub fn is_catch_all(&self) -> bool {
        !self.exact && self.raw == CATCH_ALL
    }

    /// Whether this pattern only matches its own text.
    #[must_use]
    pub fn is_exact(&self) -> bool {
        self.exact
    }

    /// Whether `command` matches this pattern.
    #[must_use]
    pub fn matches(&self, command: &str) -> bool {
        if self.raw == command {
            return true;
        }
        self.regex.as_ref().is_some_and(|re| re.is_match(command))
    }
}

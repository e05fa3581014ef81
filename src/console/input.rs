//! Parsed arguments plus the stream prompts read answers from.

use std::io::{self, BufRead};

use clap::ArgMatches;

/// Input bound to a command for one invocation.
pub struct Input<'a> {
    matches: ArgMatches,
    reader: &'a mut dyn BufRead,
    interactive: bool,
}

impl<'a> Input<'a> {
    /// Wraps parsed arguments and the answer stream.
    pub fn new(matches: ArgMatches, reader: &'a mut dyn BufRead, interactive: bool) -> Self {
        Self { matches, reader, interactive }
    }

    /// The raw clap matches, for typed access.
    #[must_use]
    pub fn matches(&self) -> &ArgMatches {
        &self.matches
    }

    /// A string argument or option value.
    #[must_use]
    pub fn value(&self, id: &str) -> Option<&str> {
        self.matches.try_get_one::<String>(id).ok().flatten().map(String::as_str)
    }

    /// Every value of a multi-valued string argument or option.
    #[must_use]
    pub fn values(&self, id: &str) -> Vec<&str> {
        self.matches
            .try_get_many::<String>(id)
            .ok()
            .flatten()
            .map(|values| values.map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Whether a boolean flag was given.
    #[must_use]
    pub fn flag(&self, id: &str) -> bool {
        self.matches.try_get_one::<bool>(id).ok().flatten().copied().unwrap_or(false)
    }

    /// Whether prompts may read answers.
    #[must_use]
    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    /// Reads one line, without its line ending. `None` at end of input.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream cannot be read.
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    pub(crate) fn reader(&mut self) -> &mut dyn BufRead {
        &mut *self.reader
    }
}

#[cfg(test)]
mod tests {
    use clap::{Arg, ArgAction, Command};

    use super::*;

    fn parse(args: &[&str]) -> ArgMatches {
        Command::new("demo")
            .arg(Arg::new("name"))
            .arg(Arg::new("tag").long("tag").action(ArgAction::Append))
            .arg(Arg::new("force").long("force").action(ArgAction::SetTrue))
            .try_get_matches_from(args)
            .unwrap()
    }

    #[test]
    fn reads_values_and_flags() {
        let mut reader = io::empty();
        let input = Input::new(parse(&["demo", "alice", "--tag", "a", "--tag", "b", "--force"]), &mut reader, true);
        assert_eq!(input.value("name"), Some("alice"));
        assert_eq!(input.values("tag"), vec!["a", "b"]);
        assert!(input.flag("force"));
    }

    #[test]
    fn unknown_ids_are_absent_rather_than_panicking() {
        let mut reader = io::empty();
        let input = Input::new(parse(&["demo"]), &mut reader, true);
        assert_eq!(input.value("nope"), None);
        assert!(input.values("nope").is_empty());
        assert!(!input.flag("nope"));
        assert!(!input.flag("name"));
    }

    #[test]
    fn read_line_strips_line_endings() {
        let mut reader = io::Cursor::new("yes\r\nno\n");
        let mut input = Input::new(parse(&["demo"]), &mut reader, true);
        assert_eq!(input.read_line().unwrap().as_deref(), Some("yes"));
        assert_eq!(input.read_line().unwrap().as_deref(), Some("no"));
        assert_eq!(input.read_line().unwrap(), None);
    }
}

//! Whitespace tokenizer that splits a submitted command line into its command
//! name, positional arguments and flags.
//!
//! Parsing is total: every input, including the empty string, produces a
//! [`ParsedCommand`]. Quotes are not interpreted, so `"message"` stays a single
//! positional argument with its quote characters intact.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Value attached to a parsed flag or option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    /// Bare flag such as `-a` or `--amend`
    Flag(bool),
    /// `--key=value` option
    Text(String),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Flag(value) => write!(f, "{}", value),
            OptionValue::Text(value) => write!(f, "{}", value),
        }
    }
}

/// Structured view of one submitted command line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedCommand {
    pub command: String,
    pub args: Vec<String>,
    pub options: BTreeMap<String, OptionValue>,
}

impl ParsedCommand {
    /// Rebuild the command line with every flag and option removed.
    pub fn without_flags(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        if !self.command.is_empty() {
            parts.push(self.command.as_str());
        }
        parts.extend(self.args.iter().map(String::as_str));
        parts.join(" ")
    }

    pub fn has_option(&self, name: &str) -> bool {
        self.options.contains_key(name)
    }

    /// First positional argument; for git this is the sub-command.
    pub fn subcommand(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.command.is_empty()
    }
}

/// Parse a raw command line.
///
/// - `--key=value` stores `key -> "value"`, `--key` stores `key -> true`
/// - `-abc` stores `a`, `b` and `c` as boolean flags
/// - a lone `-` or `--` and everything else is positional
pub fn parse(input: &str) -> ParsedCommand {
    let mut tokens = input.split_whitespace();
    let mut parsed = ParsedCommand {
        command: tokens.next().unwrap_or_default().to_string(),
        ..ParsedCommand::default()
    };

    for token in tokens {
        if let Some(long) = token.strip_prefix("--") {
            let (key, value) = match long.split_once('=') {
                Some((key, value)) => (key, OptionValue::Text(value.to_string())),
                None => (long, OptionValue::Flag(true)),
            };
            if key.is_empty() {
                parsed.args.push(token.to_string());
            } else {
                parsed.options.insert(key.to_string(), value);
            }
        } else if let Some(short) = token.strip_prefix('-').filter(|rest| !rest.is_empty()) {
            for ch in short.chars() {
                parsed.options.insert(ch.to_string(), OptionValue::Flag(true));
            }
        } else {
            parsed.args.push(token.to_string());
        }
    }

    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_flags_and_keeps_quotes() {
        let parsed = parse("git commit -m \"message\" -a");
        assert_eq!(parsed.command, "git");
        assert_eq!(parsed.args, vec!["commit", "\"message\""]);
        assert_eq!(parsed.options.len(), 2);
        assert_eq!(parsed.options.get("m"), Some(&OptionValue::Flag(true)));
        assert_eq!(parsed.options.get("a"), Some(&OptionValue::Flag(true)));
    }

    #[test]
    fn empty_input_yields_empty_command() {
        for input in ["", "   ", "\t\n"] {
            let parsed = parse(input);
            assert!(parsed.is_empty());
            assert!(parsed.args.is_empty());
            assert!(parsed.options.is_empty());
        }
    }

    #[test]
    fn long_options_split_on_first_equals() {
        let parsed = parse("git log --format=%h=%s --oneline");
        assert_eq!(parsed.args, vec!["log"]);
        assert_eq!(
            parsed.options.get("format"),
            Some(&OptionValue::Text("%h=%s".to_string()))
        );
        assert_eq!(parsed.options.get("oneline"), Some(&OptionValue::Flag(true)));
    }

    #[test]
    fn combined_short_flags_expand_per_character() {
        let parsed = parse("git commit -am fix");
        assert!(parsed.has_option("a"));
        assert!(parsed.has_option("m"));
        assert_eq!(parsed.args, vec!["commit", "fix"]);
    }

    #[test]
    fn bare_dashes_are_positional() {
        let parsed = parse("git checkout -- README.md -");
        assert_eq!(parsed.args, vec!["checkout", "--", "README.md", "-"]);
        assert!(parsed.options.is_empty());
    }

    #[test]
    fn whitespace_runs_collapse() {
        let parsed = parse("  git    status\t ");
        assert_eq!(parsed.command, "git");
        assert_eq!(parsed.subcommand(), Some("status"));
    }

    #[test]
    fn without_flags_keeps_argument_order() {
        let parsed = parse("git -C repo push --force origin -u main");
        assert_eq!(parsed.without_flags(), "git repo push origin main");
        assert_eq!(parse("").without_flags(), "");
    }

    #[test]
    fn option_value_display() {
        assert_eq!(OptionValue::Flag(true).to_string(), "true");
        assert_eq!(OptionValue::Text("main".into()).to_string(), "main");
    }
}

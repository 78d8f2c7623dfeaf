//! Step pattern compiler and matcher.
//!
//! A step pattern is a regular expression with two extra forms:
//!
//! - `[segment]` marks an optional segment (zero or one occurrence)
//! - `<name>` is a capturing placeholder for one or more characters
//!
//! Whitespace in a pattern matches any run of whitespace in the command and
//! every compiled pattern is anchored at both ends. Any other character is
//! handed to the regex engine untouched, so authors can still write `(.+)`,
//! `^` or `$` directly.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::command::error::PatternError;
use crate::command::parser;

pub const MATCH_SUCCESS_MESSAGE: &str = "Command matches the expected pattern.";
pub const MATCH_FAILURE_MESSAGE: &str = "Command does not match the expected pattern.";

const WHITESPACE: &str = r"\s+";
const PLACEHOLDER: &str = "(.+?)";

/// Result of matching one command against one pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub is_valid: bool,
    pub message: String,
    /// Captured groups in left-to-right order; empty when nothing was captured.
    pub matches: Vec<String>,
}

/// A pattern compiled to an anchored regular expression.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    source: String,
    regex: Regex,
}

impl CompiledPattern {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn as_regex(&self) -> &Regex {
        &self.regex
    }

    /// Match an already prepared (trimmed or flag-stripped) command string.
    pub fn captures(&self, text: &str) -> Option<Vec<String>> {
        let caps = self.regex.captures(text)?;
        Some(
            caps.iter()
                .skip(1)
                .flatten()
                .map(|m| m.as_str().to_string())
                .collect(),
        )
    }
}

/// Compile a step pattern into an anchored regex.
pub fn compile_pattern(pattern: &str) -> Result<CompiledPattern, PatternError> {
    let expression = translate(pattern)?;
    let regex = Regex::new(&expression)?;
    Ok(CompiledPattern {
        source: pattern.to_string(),
        regex,
    })
}

/// Translate the pattern mini-syntax into regex source without compiling it.
pub fn translate(pattern: &str) -> Result<String, PatternError> {
    let body = strip_anchors(pattern.trim());
    let chars: Vec<char> = body.trim().chars().collect();
    let mut out = String::with_capacity(chars.len() * 2 + 8);
    out.push_str("^(?:");
    translate_segment(&chars, 0, true, &mut out)?;
    out.push_str(")$");
    Ok(out)
}

fn strip_anchors(pattern: &str) -> &str {
    let mut body = pattern.strip_prefix('^').unwrap_or(pattern);
    if body.ends_with('$') && !body.ends_with("\\$") {
        body = &body[..body.len() - 1];
    }
    body
}

/// Translate `chars`; `offset` is the position of `chars[0]` in the pattern
/// and only feeds error messages.
fn translate_segment(
    chars: &[char],
    offset: usize,
    top_level: bool,
    out: &mut String,
) -> Result<(), PatternError> {
    let mut pending_space = false;
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        match ch {
            c if c.is_whitespace() => {
                pending_space = true;
                i += 1;
            }
            '[' => {
                if !top_level {
                    return Err(PatternError::NestedSquareBracket(offset + i));
                }
                let close = find_closing_square(chars, i, offset)?;
                out.push_str("(?:");
                // Leading space belongs to the optional part so `add [<file>]` accepts `add`.
                if pending_space {
                    out.push_str(WHITESPACE);
                    pending_space = false;
                }
                translate_segment(&chars[i + 1..close], offset + i + 1, false, out)?;
                out.push_str(")?");
                i = close + 1;
            }
            ']' => return Err(PatternError::UnmatchedSquareBracket(offset + i)),
            '<' if !out.ends_with("(?") && !out.ends_with("(?P") => {
                flush_space(&mut pending_space, out);
                let close = chars[i + 1..]
                    .iter()
                    .position(|c| *c == '>')
                    .map(|pos| i + 1 + pos)
                    .ok_or(PatternError::UnclosedAngleBracket(offset + i))?;
                let name: String = chars[i + 1..close].iter().collect();
                if !is_placeholder_name(&name) {
                    return Err(PatternError::InvalidPlaceholder(name));
                }
                out.push_str(PLACEHOLDER);
                i = close + 1;
            }
            '\\' => {
                flush_space(&mut pending_space, out);
                out.push('\\');
                if let Some(next) = chars.get(i + 1) {
                    out.push(*next);
                }
                i += 2;
            }
            c => {
                flush_space(&mut pending_space, out);
                out.push(c);
                i += 1;
            }
        }
    }
    flush_space(&mut pending_space, out);
    Ok(())
}

fn flush_space(pending: &mut bool, out: &mut String) {
    if *pending {
        out.push_str(WHITESPACE);
        *pending = false;
    }
}

fn find_closing_square(chars: &[char], open: usize, offset: usize) -> Result<usize, PatternError> {
    let mut i = open + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '[' => return Err(PatternError::NestedSquareBracket(offset + i)),
            ']' => return Ok(i),
            _ => i += 1,
        }
    }
    Err(PatternError::UnclosedSquareBracket(offset + open))
}

fn is_placeholder_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
}

/// Match `command` against `pattern`.
///
/// With `ignore_flags` the command is re-parsed and matched as
/// `command arg1 arg2 ...`, so flags and options are invisible to the pattern.
pub fn validate_command_against_pattern(
    command: &str,
    pattern: &str,
    ignore_flags: bool,
) -> Result<ValidationOutcome, PatternError> {
    let compiled = compile_pattern(pattern)?;
    Ok(match_compiled(command, &compiled, ignore_flags))
}

pub fn match_compiled(command: &str, compiled: &CompiledPattern, ignore_flags: bool) -> ValidationOutcome {
    let subject = if ignore_flags {
        parser::parse(command).without_flags()
    } else {
        command.trim().to_string()
    };

    match compiled.captures(&subject) {
        Some(matches) => ValidationOutcome {
            is_valid: true,
            message: MATCH_SUCCESS_MESSAGE.to_string(),
            matches,
        },
        None => ValidationOutcome {
            is_valid: false,
            message: MATCH_FAILURE_MESSAGE.to_string(),
            matches: Vec::new(),
        },
    }
}

//! Command validation boundary.
//!
//! [`CommandValidator`] combines syntax checks, git-specific semantic checks
//! and pattern matching. Nothing here returns an error: pattern mistakes and
//! other faults are logged and reported as a failed validation so a player's
//! submission never aborts the request that carries it.

use log::{debug, error};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::command::parser::{self, ParsedCommand};
use crate::command::pattern;
use crate::config::ValidationConfig;
use crate::logutil::{escape_log, LogContext};
use crate::quest::types::{QuestCommandStep, StepStatus};

pub const SUCCESS_MESSAGE: &str = "Well done! That is the right command.";
pub const FAILURE_MESSAGE: &str =
    "That command does not solve this step. Check the expected pattern or ask for a hint.";
pub const SKIPPED_MESSAGE: &str = "Optional step skipped. Moving on.";
pub const INTERNAL_ERROR_MESSAGE: &str =
    "An error occurred while validating your command. Please try again later.";
pub const EMPTY_COMMAND_MESSAGE: &str = "Please enter a command.";

/// Why a validation did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    EmptyCommand,
    TooLong,
    NoMatch,
    /// The step's pattern is broken or validation faulted internally
    ValidationError,
}

impl FailureKind {
    pub fn code(self) -> &'static str {
        match self {
            FailureKind::EmptyCommand => "EMPTY_COMMAND",
            FailureKind::TooLong => "TOO_LONG",
            FailureKind::NoMatch => "NO_MATCH",
            FailureKind::ValidationError => "VALIDATION_ERROR",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Caller-facing result of [`CommandValidator::validate_command`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandValidation {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub matches: Vec<String>,
    #[serde(default)]
    pub failure: Option<FailureKind>,
}

impl CommandValidation {
    fn failed(kind: FailureKind, message: &str) -> Self {
        Self {
            success: false,
            message: message.to_string(),
            matches: Vec::new(),
            failure: Some(kind),
        }
    }
}

/// Input for [`CommandValidator::validate_quest_step`].
#[derive(Debug, Clone, Copy)]
pub struct QuestStepInput<'a> {
    pub quest_id: &'a str,
    pub step_id: &'a str,
    pub command: &'a str,
    pub step: &'a QuestCommandStep,
}

/// Verdict on a submission for a quest step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepValidation {
    /// True for a match and for a skipped optional step
    pub success: bool,
    pub message: String,
    /// `Completed`, `Skipped` or `Failed`
    pub status: StepStatus,
    #[serde(default)]
    pub matches: Vec<String>,
    #[serde(default)]
    pub failure: Option<FailureKind>,
}

#[derive(Debug, Clone)]
pub struct CommandValidator {
    ignore_flags_by_default: bool,
    max_command_length: usize,
}

impl Default for CommandValidator {
    fn default() -> Self {
        Self::new(&ValidationConfig::default())
    }
}

impl CommandValidator {
    pub fn new(config: &ValidationConfig) -> Self {
        Self {
            ignore_flags_by_default: config.ignore_flags_by_default,
            max_command_length: config.max_command_length,
        }
    }

    pub fn ignore_flags_by_default(&self) -> bool {
        self.ignore_flags_by_default
    }

    /// Match `command` against `pattern`. `None` uses the configured flag default.
    pub fn validate_command(
        &self,
        command: &str,
        pattern: &str,
        ignore_flags: Option<bool>,
    ) -> CommandValidation {
        let ignore_flags = ignore_flags.unwrap_or(self.ignore_flags_by_default);
        match pattern::validate_command_against_pattern(command, pattern, ignore_flags) {
            Ok(outcome) => CommandValidation {
                success: outcome.is_valid,
                message: outcome.message,
                matches: outcome.matches,
                failure: (!outcome.is_valid).then_some(FailureKind::NoMatch),
            },
            Err(e) => {
                error!(
                    "command validation failed: {} {}",
                    e,
                    LogContext::new()
                        .with("pattern", pattern)
                        .with("command", command)
                        .with("ignore_flags", ignore_flags)
                );
                CommandValidation::failed(FailureKind::ValidationError, INTERNAL_ERROR_MESSAGE)
            }
        }
    }

    /// Validate a submission for one quest step and decide the step's status.
    pub fn validate_quest_step(&self, input: QuestStepInput<'_>) -> StepValidation {
        let step = input.step;
        let ctx = LogContext::new()
            .with("quest", input.quest_id)
            .with("step", input.step_id)
            .with("command", input.command);

        let syntax = self.check_syntax(input.command);
        let validation = match syntax {
            Some(kind) => CommandValidation::failed(kind, self.syntax_message(kind).as_str()),
            None => self.validate_command(input.command, &step.command_regex, step.ignore_flags),
        };

        if validation.success {
            debug!("step validated {}", ctx);
            let message = if step.success_message.is_empty() {
                SUCCESS_MESSAGE.to_string()
            } else {
                step.success_message.clone()
            };
            return StepValidation {
                success: true,
                message,
                status: StepStatus::Completed,
                matches: validation.matches,
                failure: None,
            };
        }

        if step.is_optional {
            debug!("optional step skipped {}", ctx);
            return StepValidation {
                success: true,
                message: SKIPPED_MESSAGE.to_string(),
                status: StepStatus::Skipped,
                matches: Vec::new(),
                failure: validation.failure,
            };
        }

        let message = match validation.failure {
            Some(FailureKind::NoMatch) => {
                let parsed = parser::parse(input.command);
                diagnose(&parsed, step).unwrap_or_else(|| FAILURE_MESSAGE.to_string())
            }
            _ => validation.message,
        };
        debug!(
            "step rejected: {} {}",
            validation.failure.map(FailureKind::code).unwrap_or("UNKNOWN"),
            ctx
        );
        StepValidation {
            success: false,
            message,
            status: StepStatus::Failed,
            matches: Vec::new(),
            failure: validation.failure,
        }
    }

    fn check_syntax(&self, command: &str) -> Option<FailureKind> {
        let trimmed = command.trim();
        if trimmed.is_empty() {
            Some(FailureKind::EmptyCommand)
        } else if trimmed.chars().count() > self.max_command_length {
            debug!(
                "command over length limit: {}",
                escape_log(&trimmed.chars().take(40).collect::<String>())
            );
            Some(FailureKind::TooLong)
        } else {
            None
        }
    }

    fn syntax_message(&self, kind: FailureKind) -> String {
        match kind {
            FailureKind::TooLong => format!(
                "That command is too long (max {} characters).",
                self.max_command_length
            ),
            _ => EMPTY_COMMAND_MESSAGE.to_string(),
        }
    }
}

/// Explain a git-level mistake in a command that did not match its step.
pub fn diagnose(parsed: &ParsedCommand, step: &QuestCommandStep) -> Option<String> {
    if parsed.is_empty() {
        return None;
    }
    if parsed.command != "git" {
        return Some(format!(
            "`{}` is not a git command. Every answer starts with `git`.",
            parsed.command
        ));
    }

    let expected = step
        .command_name
        .trim()
        .strip_prefix("git ")
        .unwrap_or(step.command_name.trim());
    let actual = parsed.subcommand();
    let allowed = actual.is_some_and(|sub| pattern_mentions(&step.command_regex, sub));
    if !expected.is_empty() && actual != Some(expected) && !allowed {
        return Some(match actual {
            Some(actual) => format!("This step needs `git {}`, not `git {}`.", expected, actual),
            None => format!("This step needs `git {}`.", expected),
        });
    }

    if actual == Some("commit") && !commit_has_message(parsed) {
        return Some("`git commit` needs a message: add -m \"your message\".".to_string());
    }
    None
}

/// Whether `word` appears as a whole token in a step pattern, e.g. one branch
/// of `(switch|checkout)`.
fn pattern_mentions(pattern: &str, word: &str) -> bool {
    pattern
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
        .any(|token| token == word)
}

fn commit_has_message(parsed: &ParsedCommand) -> bool {
    ["m", "message", "F", "file", "amend", "no-edit", "C", "reuse-message"]
        .iter()
        .any(|name| parsed.has_option(name))
}

//! Command validation core: parser, pattern matcher and validator.
//!
//! The pieces are pure functions of their inputs. Persistence and progress
//! bookkeeping live in [`crate::quest`].

pub mod error;
pub mod parser;
pub mod pattern;
pub mod validator;

pub use error::PatternError;
pub use parser::{parse, OptionValue, ParsedCommand};
pub use pattern::{
    compile_pattern, validate_command_against_pattern, CompiledPattern, ValidationOutcome,
};
pub use validator::{
    CommandValidation, CommandValidator, FailureKind, QuestStepInput, StepValidation,
};

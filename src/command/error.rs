/// Author errors in a step pattern. These never reach the player as a crash;
/// the validator turns them into a `VALIDATION_ERROR` failure.
#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("unclosed square bracket at position {0}")]
    UnclosedSquareBracket(usize),
    #[error("unmatched closing square bracket at position {0}")]
    UnmatchedSquareBracket(usize),
    #[error("nested square brackets are not allowed (position {0})")]
    NestedSquareBracket(usize),
    #[error("unclosed angle bracket at position {0}")]
    UnclosedAngleBracket(usize),
    #[error("invalid placeholder name: <{0}>")]
    InvalidPlaceholder(String),
    #[error("pattern does not compile: {0}")]
    Regex(#[from] regex::Error),
}

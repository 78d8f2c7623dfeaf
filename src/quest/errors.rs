use thiserror::Error;

use crate::validation::UsernameError;

/// Errors raised by the quest store and the quest-progress service.
///
/// Command validation never produces these; a rejected or unmatchable command
/// is a normal result, not an error.
#[derive(Debug, Error)]
pub enum QuestError {
    /// Wrapper around sled's error type.
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// Wrapper around bincode serialization and deserialization errors.
    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Wrapper around IO errors (directory creation, seed files).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Seed file could not be parsed.
    #[error("seed parse error in {path}: {source}")]
    Seed {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// Returned when fetching a record that is not present.
    #[error("record not found: {0}")]
    NotFound(String),

    /// Returned when deserializing a record with an unexpected schema version.
    #[error("schema mismatch for {entity}: expected {expected}, got {found}")]
    SchemaMismatch {
        entity: &'static str,
        expected: u8,
        found: u8,
    },

    /// The requested transition is not allowed from the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Registration input rejected.
    #[error("invalid username: {0}")]
    InvalidUsername(#[from] UsernameError),

    /// Seed or authoring data is inconsistent.
    #[error("invalid quest data: {0}")]
    InvalidData(String),

    /// Internal error (poisoned locks, unexpected conditions)
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = QuestError::SchemaMismatch {
            entity: "quest",
            expected: 1,
            found: 7,
        };
        assert_eq!(err.to_string(), "schema mismatch for quest: expected 1, got 7");
        assert_eq!(
            QuestError::NotFound("player: bob".into()).to_string(),
            "record not found: player: bob"
        );
    }

    #[test]
    fn seed_error_keeps_source() {
        let source = serde_json::from_str::<Vec<u8>>("{").unwrap_err();
        let err = QuestError::Seed {
            path: "worlds.json".into(),
            source,
        };
        assert!(err.to_string().starts_with("seed parse error in worlds.json"));
        assert!(std::error::Error::source(&err).is_some());
    }
}

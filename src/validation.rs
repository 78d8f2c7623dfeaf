//! Input validation for player names and authoring identifiers.

use std::collections::HashSet;

/// Username validation errors with helpful messages
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UsernameError {
    #[error("Username is too short (minimum {min} characters)")]
    TooShort { min: usize },

    #[error("Username is too long (maximum {max} characters)")]
    TooLong { max: usize },

    #[error("Username cannot start or end with whitespace")]
    InvalidWhitespace,

    #[error("Username contains invalid characters: {chars}")]
    InvalidCharacters { chars: String },

    #[error("Username is a reserved name")]
    Reserved,
}

/// World, quest and step identifiers used as storage keys.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    #[error("identifier cannot be empty")]
    Empty,

    #[error("identifier too long (max {max} characters)")]
    TooLong { max: usize },

    #[error("identifier '{0}' may only contain lowercase letters, digits, '_' and '-'")]
    InvalidCharacters(String),
}

pub const USERNAME_MIN_LENGTH: usize = 2;
pub const USERNAME_MAX_LENGTH: usize = 30;
pub const IDENTIFIER_MAX_LENGTH: usize = 64;

/// Names that would be confusing on a leaderboard or collide with git vocabulary
fn reserved_names() -> HashSet<&'static str> {
    [
        "admin", "administrator", "root", "system", "operator", "moderator", "guest",
        "anonymous", "git", "head", "origin", "main", "master", "upstream", "null",
    ]
    .iter()
    .copied()
    .collect()
}

/// Validate a username for registration. Returns the accepted name.
///
/// Letters, digits, `_`, `-` and `.` are allowed; the name must not be
/// reserved (case-insensitive) or surrounded by whitespace.
pub fn validate_username(username: &str) -> Result<String, UsernameError> {
    let trimmed = username.trim();
    if trimmed != username {
        return Err(UsernameError::InvalidWhitespace);
    }

    let length = trimmed.chars().count();
    if length < USERNAME_MIN_LENGTH {
        return Err(UsernameError::TooShort {
            min: USERNAME_MIN_LENGTH,
        });
    }
    if length > USERNAME_MAX_LENGTH {
        return Err(UsernameError::TooLong {
            max: USERNAME_MAX_LENGTH,
        });
    }

    let mut invalid: Vec<char> = trimmed
        .chars()
        .filter(|&c| !(c.is_alphanumeric() || c == '_' || c == '-' || c == '.'))
        .collect();
    if !invalid.is_empty() {
        invalid.sort_unstable();
        invalid.dedup();
        let chars = invalid
            .into_iter()
            .map(|c| {
                if c.is_control() || c.is_whitespace() {
                    format!("\\u{{{:04x}}}", c as u32)
                } else {
                    c.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        return Err(UsernameError::InvalidCharacters { chars });
    }

    if trimmed.contains("..") || reserved_names().contains(trimmed.to_lowercase().as_str()) {
        return Err(UsernameError::Reserved);
    }

    Ok(trimmed.to_string())
}

/// Validate a world/quest identifier from seed or authoring data.
pub fn validate_identifier(id: &str) -> Result<&str, IdentifierError> {
    if id.is_empty() {
        return Err(IdentifierError::Empty);
    }
    if id.len() > IDENTIFIER_MAX_LENGTH {
        return Err(IdentifierError::TooLong {
            max: IDENTIFIER_MAX_LENGTH,
        });
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
    {
        return Err(IdentifierError::InvalidCharacters(id.to_string()));
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_usernames() {
        assert_eq!(validate_username("alice").unwrap(), "alice");
        assert!(validate_username("bob_42").is_ok());
        assert!(validate_username("jose.maria").is_ok());
        assert!(validate_username("José").is_ok());
    }

    #[test]
    fn test_length_limits() {
        assert_eq!(
            validate_username("a"),
            Err(UsernameError::TooShort { min: 2 })
        );
        assert_eq!(
            validate_username(&"x".repeat(31)),
            Err(UsernameError::TooLong { max: 30 })
        );
    }

    #[test]
    fn test_rejects_whitespace_and_symbols() {
        assert_eq!(
            validate_username(" alice"),
            Err(UsernameError::InvalidWhitespace)
        );
        assert!(matches!(
            validate_username("al ice"),
            Err(UsernameError::InvalidCharacters { .. })
        ));
        assert!(matches!(
            validate_username("user/file"),
            Err(UsernameError::InvalidCharacters { .. })
        ));
        match validate_username("a\u{1}b") {
            Err(UsernameError::InvalidCharacters { chars }) => assert_eq!(chars, "\\u{0001}"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_reserved_names() {
        assert_eq!(validate_username("HEAD"), Err(UsernameError::Reserved));
        assert_eq!(validate_username("admin"), Err(UsernameError::Reserved));
        assert_eq!(validate_username("a..b"), Err(UsernameError::Reserved));
    }

    #[test]
    fn test_identifiers() {
        assert_eq!(validate_identifier("first-commit_2"), Ok("first-commit_2"));
        assert_eq!(validate_identifier(""), Err(IdentifierError::Empty));
        assert!(matches!(
            validate_identifier("Basics"),
            Err(IdentifierError::InvalidCharacters(_))
        ));
        assert!(matches!(
            validate_identifier(&"a".repeat(65)),
            Err(IdentifierError::TooLong { max: 64 })
        ));
    }
}

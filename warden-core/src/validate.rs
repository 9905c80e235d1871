//! Syntax checks for server names, ports and JVM memory sizes.
//!
//! Every check runs before any external resource is touched.

use thiserror::Error;

pub const MAX_SERVER_NAME_LENGTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("server name cannot be empty")]
    EmptyName,

    #[error("server name is too long (max {MAX_SERVER_NAME_LENGTH} characters)")]
    NameTooLong,

    #[error(
        "server name '{0}' contains invalid characters; only letters, numbers, hyphens and underscores are allowed"
    )]
    InvalidNameCharacters(String),

    #[error("port must be between 1 and 65535, got {0}")]
    PortOutOfRange(i64),

    #[error("invalid memory size '{0}'; expected a number with an optional K, M, G or T suffix")]
    InvalidMemory(String),
}

/// `[A-Za-z0-9_-]+`, at most [`MAX_SERVER_NAME_LENGTH`] characters.
pub fn validate_server_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if name.chars().count() > MAX_SERVER_NAME_LENGTH {
        return Err(ValidationError::NameTooLong);
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ValidationError::InvalidNameCharacters(name.to_string()));
    }
    Ok(())
}

pub fn validate_port(port: i64) -> Result<u16, ValidationError> {
    match u16::try_from(port) {
        Ok(p) if p >= 1 => Ok(p),
        _ => Err(ValidationError::PortOutOfRange(port)),
    }
}

/// JVM heap syntax as accepted by `-Xmx`/`-Xms`: digits plus an optional unit.
pub fn validate_memory(value: &str) -> Result<(), ValidationError> {
    let digits = value
        .strip_suffix(|c: char| matches!(c.to_ascii_uppercase(), 'K' | 'M' | 'G' | 'T'))
        .unwrap_or(value);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidMemory(value.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("lobby")]
    #[case("survival_1")]
    #[case("creative-EU")]
    #[case("a")]
    #[case("abcdefghijklmnopqrstuvwxyz012345")]
    fn accepts_valid_names(#[case] name: &str) {
        assert_eq!(validate_server_name(name), Ok(()));
    }

    #[rstest]
    #[case("", ValidationError::EmptyName)]
    #[case("   ", ValidationError::EmptyName)]
    #[case("abcdefghijklmnopqrstuvwxyz0123456", ValidationError::NameTooLong)]
    #[case("bad name", ValidationError::InvalidNameCharacters("bad name".into()))]
    #[case("lobby;rm", ValidationError::InvalidNameCharacters("lobby;rm".into()))]
    #[case("../etc", ValidationError::InvalidNameCharacters("../etc".into()))]
    fn rejects_invalid_names(#[case] name: &str, #[case] expected: ValidationError) {
        assert_eq!(validate_server_name(name), Err(expected));
    }

    #[rstest]
    #[case(1, true)]
    #[case(25565, true)]
    #[case(65535, true)]
    #[case(0, false)]
    #[case(-1, false)]
    #[case(65536, false)]
    fn port_range(#[case] port: i64, #[case] ok: bool) {
        assert_eq!(validate_port(port).is_ok(), ok);
    }

    #[rstest]
    #[case("2G", true)]
    #[case("512M", true)]
    #[case("1024", true)]
    #[case("4g", true)]
    #[case("G", false)]
    #[case("2GB", false)]
    #[case("", false)]
    #[case("1.5G", false)]
    fn memory_syntax(#[case] value: &str, #[case] ok: bool) {
        assert_eq!(validate_memory(value).is_ok(), ok);
    }
}

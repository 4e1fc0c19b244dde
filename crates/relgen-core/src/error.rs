//! Error types for relgen.

use thiserror::Error;

/// Result type for relgen operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for relgen.
///
/// Parse and link failures carry a short summary only; the detailed,
/// position-annotated diagnostics accumulate in the configuration's
/// message queue.
#[derive(Error, Debug)]
pub enum Error {
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("link error: {0}")]
    Link(String),

    #[error("role not found: {0}")]
    UnknownRole(String),

    #[error("roles not enabled")]
    RolesNotEnabled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::UnknownRole("admin".into()).to_string(),
            "role not found: admin"
        );
        assert_eq!(Error::RolesNotEnabled.to_string(), "roles not enabled");
    }
}

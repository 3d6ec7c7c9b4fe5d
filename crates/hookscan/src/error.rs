use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid pattern token '{token}' at position {index}")]
    InvalidToken { token: String, index: usize },

    #[error("Empty pattern")]
    EmptyPattern,

    #[error("Expected {expected} matches, found {found}")]
    MatchCount { expected: usize, found: usize },

    #[error("Match index {index} out of range: {count} matches")]
    MatchIndex { index: usize, count: usize },

    #[error("Invalid scan range: start {start:#x} beyond end {end:#x}")]
    InvalidRange { start: usize, end: usize },

    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    #[error("Failed to query module {name}: {message}")]
    ModuleQueryFailed { name: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the underlying io error is a missing file.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_count_message_names_both_sides() {
        let err = Error::MatchCount {
            expected: 1,
            found: 3,
        };
        assert_eq!(err.to_string(), "Expected 1 matches, found 3");
    }
}

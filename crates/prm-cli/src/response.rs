//! Mapping of command outcomes to the JSON printed on stdout.

use prm_core::{ReviewError, StateViolation};
use serde::Serialize;
use serde_json::{json, Value};

/// Why a command produced no result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    Review(ReviewError),
    /// The request payload was not valid JSON for its shape.
    Parse(String),
    /// The command task panicked. Nothing about the panic is reported.
    Panicked,
}

impl From<ReviewError> for CommandError {
    fn from(err: ReviewError) -> Self {
        CommandError::Review(err)
    }
}

impl CommandError {
    pub fn invalid(message: impl Into<String>) -> Self {
        CommandError::Review(ReviewError::InvalidInput(message.into()))
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            CommandError::Review(err) => match err {
                ReviewError::AlreadyExists { entity: "team", .. } => "TEAM_EXISTS",
                ReviewError::AlreadyExists { entity: "user", .. } => "USER_EXISTS",
                ReviewError::AlreadyExists { .. } => "PR_EXISTS",
                ReviewError::NotFound { .. } => "NOT_FOUND",
                ReviewError::InvalidState(StateViolation::PullRequestMerged) => "PR_MERGED",
                ReviewError::InvalidInput(_) => "INVALID_INPUT",
                ReviewError::Cancelled => "CANCELLED",
                ReviewError::InvalidState(StateViolation::ConcurrentModification)
                | ReviewError::StoreFailure => "SERVER_ERROR",
            },
            CommandError::Parse(_) => "PARSE_DATA",
            CommandError::Panicked => "SERVER_ERROR",
        }
    }

    pub fn message(&self) -> String {
        match self {
            CommandError::Review(err) => err.to_string(),
            CommandError::Parse(detail) => format!("malformed payload: {detail}"),
            CommandError::Panicked => "internal server error".to_string(),
        }
    }

    /// `{"error": {"code": ..., "message": ...}}`
    pub fn to_json(&self) -> Value {
        json!({
            "error": {
                "code": self.code(),
                "message": self.message(),
            }
        })
    }
}

/// Serialize a successful result.
pub fn to_value<T: Serialize>(result: &T) -> Result<Value, CommandError> {
    serde_json::to_value(result).map_err(|e| {
        tracing::error!(error = %e, "failed to encode result");
        CommandError::Panicked
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_entity() {
        let cases = [
            (ReviewError::already_exists("team", "backend"), "TEAM_EXISTS"),
            (ReviewError::already_exists("user", "u1"), "USER_EXISTS"),
            (ReviewError::already_exists("pull request", "PR1"), "PR_EXISTS"),
            (ReviewError::not_found("user", "u9"), "NOT_FOUND"),
            (
                ReviewError::InvalidState(StateViolation::PullRequestMerged),
                "PR_MERGED",
            ),
            (ReviewError::InvalidInput("empty".into()), "INVALID_INPUT"),
            (ReviewError::Cancelled, "CANCELLED"),
            (ReviewError::StoreFailure, "SERVER_ERROR"),
        ];
        for (err, code) in cases {
            assert_eq!(CommandError::from(err).code(), code);
        }
    }

    #[test]
    fn parse_failure_has_own_code() {
        let body = CommandError::Parse("expected value at line 1 column 2".into()).to_json();
        assert_eq!(body["error"]["code"], "PARSE_DATA");
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .starts_with("malformed payload"));
    }

    #[test]
    fn panic_body_is_generic() {
        let body = CommandError::Panicked.to_json();
        assert_eq!(body["error"]["code"], "SERVER_ERROR");
        assert_eq!(body["error"]["message"], "internal server error");
    }

    #[test]
    fn not_found_body_names_key() {
        let body = CommandError::from(ReviewError::not_found("pull request", "PR7")).to_json();
        assert_eq!(body["error"]["code"], "NOT_FOUND");
        assert_eq!(body["error"]["message"], "pull request not found: PR7");
    }
}

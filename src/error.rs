use thiserror::Error;

/// Indicator printed when the input is not a supported join statement.
pub const NOT_A_JOIN_QUERY: &str = "NOT_A_JOIN_QUERY";
/// Indicator printed when a selected field does not exist on its relation.
pub const FIELD_REFERENCE_FAILURE: &str = "FAILURE";
/// Indicator printed when the external engine could not produce a table.
pub const SCAN_FAILURE: &str = "SCAN_FAILURE";
/// Indicator for configuration and I/O problems outside the query itself.
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";

#[derive(Error, Debug)]
pub enum JoinError {
    #[error("Not a join query: {query}")]
    NotAJoinQuery { query: String },

    #[error("Field reference error: {field}: {reason}{}", suggestion_suffix(.suggestion))]
    FieldReference {
        field: String,
        reason: String,
        suggestion: Option<String>,
    },

    #[error("Scan of '{relation}' failed: {reason}")]
    ScanFailure { relation: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl JoinError {
    pub fn scan_failure(relation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ScanFailure {
            relation: relation.into(),
            reason: reason.into(),
        }
    }

    /// Fixed token callers can branch on without parsing the message.
    pub fn indicator(&self) -> &'static str {
        match self {
            JoinError::NotAJoinQuery { .. } => NOT_A_JOIN_QUERY,
            JoinError::FieldReference { .. } => FIELD_REFERENCE_FAILURE,
            JoinError::ScanFailure { .. } => SCAN_FAILURE,
            JoinError::Config(_) | JoinError::Io(_) | JoinError::Json(_) => INTERNAL_ERROR,
        }
    }
}

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    suggestion
        .as_ref()
        .map(|s| format!(" (did you mean {}?)", s))
        .unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, JoinError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indicators_are_distinct() {
        let errors = [
            JoinError::NotAJoinQuery { query: "SELECT 1".to_string() },
            JoinError::FieldReference {
                field: "t1.age".to_string(),
                reason: "no such column".to_string(),
                suggestion: None,
            },
            JoinError::scan_failure("t1", "exit status 1"),
            JoinError::Config("bad".to_string()),
        ];
        let indicators: Vec<&str> = errors.iter().map(|e| e.indicator()).collect();
        assert_eq!(indicators, vec![NOT_A_JOIN_QUERY, FIELD_REFERENCE_FAILURE, SCAN_FAILURE, INTERNAL_ERROR]);
        assert!(indicators.iter().all(|i| !i.contains('|')));
    }

    #[test]
    fn test_field_reference_message_includes_suggestion() {
        let error = JoinError::FieldReference {
            field: "join_table_1.age".to_string(),
            reason: "relation 'join_table_1' has no column 'age'".to_string(),
            suggestion: Some("join_table_2.age".to_string()),
        };
        let msg = error.to_string();
        assert!(msg.contains("join_table_1.age"));
        assert!(msg.contains("did you mean join_table_2.age?"));
    }
}

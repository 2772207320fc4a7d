//! Error types shared across the Precedent-RS core.

use thiserror::Error;

/// Errors produced while compiling a proposition checklist.
#[derive(Debug, Error)]
pub enum ChecklistError {
    /// A relation references a hook group id that does not exist.
    #[error("relation '{relation_id}' references unknown hook group '{group_id}'")]
    UnknownHookGroup {
        relation_id: String,
        group_id: String,
    },

    /// Interaction was required but fewer than two required hook groups exist.
    #[error("interaction requires at least 2 required hook groups, found {found}")]
    InteractionUnderconstrained { found: usize },
}

/// Errors produced while parsing user-facing input.
#[derive(Debug, Error)]
pub enum InputError {
    /// The query was too short to profile.
    #[error("query too short: {length} chars (minimum {minimum})")]
    QueryTooShort { length: usize, minimum: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ChecklistError::UnknownHookGroup {
            relation_id: "rel_1".to_string(),
            group_id: "sec_5".to_string(),
        };
        assert!(err.to_string().contains("rel_1"));
        assert!(err.to_string().contains("sec_5"));
    }
}
